//! Photo metadata retrieval.
//!
//! [`MetadataFetcher`] asks the Mars Rover Photos API which photos one camera
//! took on one sol. A day's listing is a single request; any non-success
//! status fails with [`TimelapseError::MetadataRequest`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use rover_timelapse::{ApiKey, MetadataFetcher, ReqwestClient, Rover, TimelapseError};
//!
//! let client = Arc::new(ReqwestClient::new(Duration::from_secs(30))?);
//! let fetcher = MetadataFetcher::new(client, ApiKey::new("DEMO_KEY"));
//! let listing = fetcher.photos(Rover::Curiosity, "NAVCAM", 1000)?;
//! for photo in &listing.photos {
//!     println!("{} {}", photo.id, photo.source_url);
//! }
//! # Ok::<(), TimelapseError>(())
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::configuration::{ApiKey, Rover};
use crate::error::TimelapseError;
use crate::http::{HttpClient, HttpResponse};

/// Public endpoint of the Mars Rover Photos API.
pub const DEFAULT_BASE_URL: &str = "https://api.nasa.gov/mars-photos/api/v1/rovers";

/// Remaining-quota level below which a warning is logged.
pub const RATE_LIMIT_WARNING_THRESHOLD: u64 = 250;

const RATE_LIMIT_HEADER: &str = "x-ratelimit-remaining";

/// One photo as listed by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Photo {
    /// API identifier, unique per rover.
    pub id: u64,
    /// Where the full-resolution image can be downloaded.
    pub source_url: String,
    /// Rover that took the photo.
    pub rover: String,
    /// Camera that took the photo.
    pub camera: String,
    /// Sol the photo belongs to, when reported.
    pub sol: Option<u32>,
    /// Earth date (`YYYY-MM-DD`), when reported.
    pub earth_date: Option<String>,
}

/// The quota state reported by the `X-RateLimit-Remaining` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimit {
    /// Header missing or unparsable.
    Unknown,
    /// Fewer than [`RATE_LIMIT_WARNING_THRESHOLD`] calls remain.
    Low(u64),
    /// Plenty of calls remain.
    Ok(u64),
}

impl RateLimit {
    /// Classify a raw header value.
    pub fn from_header(value: Option<&str>) -> Self {
        match value.and_then(|v| v.trim().parse::<u64>().ok()) {
            None => RateLimit::Unknown,
            Some(remaining) if remaining < RATE_LIMIT_WARNING_THRESHOLD => RateLimit::Low(remaining),
            Some(remaining) => RateLimit::Ok(remaining),
        }
    }

    /// `true` when the state deserves a warning.
    pub fn is_warning(self) -> bool {
        !matches!(self, RateLimit::Ok(_))
    }
}

/// Photos available for one sol.
#[derive(Debug, Clone)]
pub struct PhotoListing {
    /// The sol that was requested.
    pub sol: u32,
    /// Photos in API response order.
    pub photos: Vec<Photo>,
    /// Quota state reported alongside the listing.
    pub rate_limit: RateLimit,
}

#[derive(Debug, Deserialize)]
struct PhotosResponse {
    photos: Vec<RawPhoto>,
}

#[derive(Debug, Deserialize)]
struct RawPhoto {
    id: u64,
    img_src: String,
    sol: Option<u32>,
    earth_date: Option<String>,
}

/// Fetches per-sol photo listings.
pub struct MetadataFetcher {
    client: Arc<dyn HttpClient>,
    api_key: ApiKey,
    base_url: String,
}

impl MetadataFetcher {
    /// Create a fetcher against the public API.
    pub fn new(client: Arc<dyn HttpClient>, api_key: ApiKey) -> Self {
        Self {
            client,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Point the fetcher at a different endpoint (mirrors, tests).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// List the photos `camera` on `rover` took on `sol`.
    ///
    /// Photos come back in API response order. Each photo is tagged with
    /// the requested rover and camera, which keeps cached file names stable
    /// however the API spells them.
    ///
    /// # Errors
    ///
    /// - [`TimelapseError::MetadataRequest`] on a non-success status, with
    ///   the response body attached.
    /// - [`TimelapseError::HttpError`] if no response was received.
    /// - [`TimelapseError::JsonError`] if the body is not a photo listing.
    pub fn photos(&self, rover: Rover, camera: &str, sol: u32) -> Result<PhotoListing, TimelapseError> {
        let url = format!("{}/{}/photos", self.base_url, rover);
        let query = [
            ("api_key", self.api_key.expose().to_string()),
            ("sol", sol.to_string()),
            ("camera", camera.to_string()),
        ];

        log::debug!("Requesting photo listing for {rover} {camera} sol {sol}");
        let response = self.client.get(&url, &query)?;

        if !response.is_success() {
            let status = response.status;
            let body = response.text()?;
            return Err(TimelapseError::MetadataRequest { sol, status, body });
        }

        let rate_limit = RateLimit::from_header(response.header(RATE_LIMIT_HEADER));
        match rate_limit {
            RateLimit::Low(remaining) => {
                log::warn!("{remaining} API requests remaining in your limit");
            }
            RateLimit::Unknown => {
                log::warn!("Unknown number of API requests remaining in your limit");
            }
            RateLimit::Ok(remaining) => {
                log::debug!("{remaining} API requests remaining");
            }
        }

        let photos = parse_photos(response, rover, camera)?;
        log::debug!("Sol {sol}: {} photo(s) listed", photos.len());

        Ok(PhotoListing {
            sol,
            photos,
            rate_limit,
        })
    }
}

fn parse_photos(response: HttpResponse, rover: Rover, camera: &str) -> Result<Vec<Photo>, TimelapseError> {
    let parsed: PhotosResponse = serde_json::from_reader(response.body)?;

    Ok(parsed
        .photos
        .into_iter()
        .map(|raw| Photo {
            id: raw.id,
            source_url: raw.img_src,
            rover: rover.as_str().to_string(),
            camera: camera.to_string(),
            sol: raw.sol,
            earth_date: raw.earth_date,
        })
        .collect())
}
