//! The timelapse pipeline.
//!
//! [`Timelapse`] walks the requested sols in ascending order, lists each
//! sol's photos, caches them through the [`ImageStore`], then hands the
//! cached files, in sol-then-response order, to selection, normalization and
//! encoding.
//!
//! Options are validated when the pipeline is built, so a bad sol range or a
//! missing key fails before any request is sent. A photo that cannot be
//! downloaded is logged and left out; every other failure ends the run.
//! Unless `keep_temp` is set the working directory is removed once the run is
//! over, whether or not a video was produced.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use rover_timelapse::{ApiKey, ReqwestClient, Rover, Timelapse, TimelapseError, TimelapseOptions};
//!
//! let options = TimelapseOptions::new(Rover::Perseverance, 100, 102)
//!     .with_min_aspect_ratio(1.2)
//!     .with_api_key(ApiKey::new("DEMO_KEY"));
//! let client = Arc::new(ReqwestClient::new(Duration::from_secs(60))?);
//!
//! let report = Timelapse::new(options, client)?.run()?;
//! println!("{}", report.video.path.display());
//! # Ok::<(), TimelapseError>(())
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use crate::configuration::TimelapseOptions;
use crate::encode::{TimelapseVideo, VideoEncoder, VideoEncoderOptions};
use crate::error::TimelapseError;
use crate::http::HttpClient;
use crate::metadata::MetadataFetcher;
use crate::progress::{ProgressTracker, Stage};
use crate::selection::Selection;
use crate::store::ImageStore;

/// Outcome of a successful run.
#[derive(Debug, Clone)]
pub struct TimelapseReport {
    /// The video that was written.
    pub video: TimelapseVideo,
    /// Photos listed by the API across all sols.
    pub photos_listed: usize,
    /// Ids of photos that could not be downloaded.
    pub photos_skipped: Vec<u64>,
    /// Images that passed the aspect-ratio filter.
    pub images_selected: usize,
}

/// Cached files gathered for a sol range.
#[derive(Debug, Clone, Default)]
pub struct CollectedImages {
    /// Local paths in sol order, then API response order.
    pub paths: Vec<PathBuf>,
    /// Photos listed by the API.
    pub photos_listed: usize,
    /// Ids of photos that could not be downloaded.
    pub photos_skipped: Vec<u64>,
}

/// A validated timelapse run.
pub struct Timelapse {
    options: TimelapseOptions,
    fetcher: MetadataFetcher,
    store: ImageStore,
}

impl Timelapse {
    /// Validate `options` and set up the fetcher and image store.
    ///
    /// No request is made here.
    ///
    /// # Errors
    ///
    /// Any error from [`TimelapseOptions::validate`].
    pub fn new(options: TimelapseOptions, client: Arc<dyn HttpClient>) -> Result<Self, TimelapseError> {
        options.validate()?;

        let api_key = options.api_key.clone().ok_or(TimelapseError::MissingApiKey)?;
        let fetcher = MetadataFetcher::new(client.clone(), api_key);
        let store = ImageStore::new(client, options.working_directory.clone());

        Ok(Self {
            options,
            fetcher,
            store,
        })
    }

    /// Query a different API endpoint.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.fetcher = self.fetcher.with_base_url(base_url);
        self
    }

    /// The options this run was built from.
    pub fn options(&self) -> &TimelapseOptions {
        &self.options
    }

    /// Run the whole pipeline and clean up the working directory.
    ///
    /// # Errors
    ///
    /// - [`TimelapseError::MetadataRequest`] if any sol's listing fails.
    /// - [`TimelapseError::EmptySelection`] if no image passes the filter.
    /// - Encoding, image and I/O errors from the later stages.
    pub fn run(&self) -> Result<TimelapseReport, TimelapseError> {
        let outcome = self.build();

        if self.options.keep_temp {
            log::info!("Keeping working directory {}", self.store.directory().display());
        } else if let Err(error) = self.store.clear() {
            log::warn!(
                "Could not remove working directory {}: {error}",
                self.store.directory().display(),
            );
        }

        outcome
    }

    fn build(&self) -> Result<TimelapseReport, TimelapseError> {
        let collected = self.collect()?;

        let selection = match Selection::from_candidates(&collected.paths, self.options.min_aspect_ratio) {
            Ok(selection) => selection,
            Err(error) => {
                log::error!("{error}");
                return Err(error);
            }
        };
        let frames = selection.normalize_with_progress(self.options.progress.clone())?;

        let encoder_options = VideoEncoderOptions::default()
            .fps(self.options.fps)
            .codec(self.options.codec);
        let video = VideoEncoder::new(encoder_options)
            .with_progress(self.options.progress.clone())
            .write(self.options.video_path(), &frames)?;

        log::info!("Video generated successfully: {}", video.path.display());

        Ok(TimelapseReport {
            video,
            photos_listed: collected.photos_listed,
            photos_skipped: collected.photos_skipped,
            images_selected: selection.images().len(),
        })
    }

    /// Fetch every sol in the range and cache its photos.
    ///
    /// Photos that fail to download are logged and skipped.
    ///
    /// # Errors
    ///
    /// Stops at the first failed sol listing.
    pub fn collect(&self) -> Result<CollectedImages, TimelapseError> {
        let options = &self.options;
        let mut collected = CollectedImages::default();

        for sol in options.sol_start..=options.sol_end {
            log::info!("Processing sol {sol}...");
            let listing = self.fetcher.photos(options.rover, &options.camera, sol)?;
            collected.photos_listed += listing.photos.len();

            let mut tracker = ProgressTracker::new(
                options.progress.clone(),
                Stage::Download,
                Some(listing.photos.len() as u64),
            );

            for photo in &listing.photos {
                match self.store.ensure(photo, options.force_download) {
                    Ok(path) => collected.paths.push(path),
                    Err(error) if !error.is_fatal() => {
                        log::warn!("{error}");
                        collected.photos_skipped.push(photo.id);
                    }
                    Err(error) => return Err(error),
                }
                tracker.advance();
            }
        }

        log::info!(
            "Cached {} of {} listed photo(s)",
            collected.paths.len(),
            collected.photos_listed,
        );
        Ok(collected)
    }
}

/// Build a timelapse in one call.
///
/// Equivalent to `Timelapse::new(options, client)?.run()`.
pub fn run(options: TimelapseOptions, client: Arc<dyn HttpClient>) -> Result<TimelapseReport, TimelapseError> {
    Timelapse::new(options, client)?.run()
}
