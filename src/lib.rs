//! # rover-timelapse
//!
//! Build timelapse videos from the daily imagery of a Mars rover camera.
//!
//! `rover-timelapse` queries the NASA Mars Rover Photos API for every sol in
//! a range, caches the listed photos locally, keeps the images wider than a
//! chosen aspect ratio, resizes them to a common size, and encodes them in
//! capture order with FFmpeg via the
//! [`ffmpeg-next`](https://crates.io/crates/ffmpeg-next) crate.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use rover_timelapse::{ApiKey, ReqwestClient, Rover, TimelapseError, TimelapseOptions};
//!
//! let options = TimelapseOptions::new(Rover::Curiosity, 1000, 1010)
//!     .with_camera("NAVCAM")
//!     .with_min_aspect_ratio(1.2)
//!     .with_fps(4.0)
//!     .with_api_key(ApiKey::new("DEMO_KEY"));
//!
//! let client = Arc::new(ReqwestClient::new(Duration::from_secs(60))?);
//! let report = rover_timelapse::run(options, client)?;
//! println!("wrote {}", report.video.path.display());
//! # Ok::<(), TimelapseError>(())
//! ```
//!
//! ## Pipeline
//!
//! - **Metadata** ([`MetadataFetcher`]): one request per sol, warns when the
//!   API quota runs low.
//! - **Cache** ([`ImageStore`]): one file per photo, reused across runs
//!   unless a refresh is forced.
//! - **Selection** ([`Selection`]): strict `width / height > threshold`
//!   filter, then Lanczos resize to the mean dimensions.
//! - **Encoding** ([`VideoEncoder`]): MPEG-4 in AVI by default, H.264 or
//!   H.265 in MP4 on request.
//!
//! ## Requirements
//!
//! FFmpeg development libraries must be installed on your system.

pub mod configuration;
pub mod encode;
pub mod error;
pub mod http;
pub mod metadata;
pub mod progress;
pub mod selection;
pub mod store;
pub mod timelapse;

pub use configuration::{
    ApiKey, DEFAULT_CAMERA, DEFAULT_FPS, DEFAULT_OUTPUT_DIRECTORY, DEFAULT_WORKING_DIRECTORY,
    Rover, TimelapseOptions,
};
pub use encode::{TimelapseVideo, VideoCodec, VideoEncoder, VideoEncoderOptions, set_ffmpeg_log_level};
pub use error::TimelapseError;
pub use http::{HttpClient, HttpResponse, ReqwestClient};
pub use metadata::{MetadataFetcher, Photo, PhotoListing, RateLimit};
pub use progress::{ProgressCallback, ProgressInfo, Stage};
pub use selection::{SelectedImage, Selection, normalized_path, select_and_normalize};
pub use store::ImageStore;
pub use timelapse::{CollectedImages, Timelapse, TimelapseReport, run};
