//! Error types for the `rover-timelapse` crate.
//!
//! This module defines [`TimelapseError`], the unified error type returned by
//! every fallible operation in the crate. Variants carry the sol, photo id, or
//! HTTP body that caused the failure so the binary can report them without
//! extra logging at the call site.

use std::io::Error as IoError;

use ffmpeg_next::Error as FfmpegError;
use image::ImageError;
use serde_json::Error as JsonError;
use thiserror::Error;

/// The unified error type for all `rover-timelapse` operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TimelapseError {
    /// The requested sol range is empty (`start > end`).
    #[error("Invalid sol range: start ({start}) must be less than or equal to end ({end})")]
    InvalidSolRange {
        /// First sol requested.
        start: u32,
        /// Last sol requested.
        end: u32,
    },

    /// A configuration value is malformed.
    #[error("Invalid option {name}: {reason}")]
    InvalidOption {
        /// Name of the offending option.
        name: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// No usable API key was supplied.
    #[error("Missing NASA API key (pass --key or set NASA_API_KEY)")]
    MissingApiKey,

    /// The photo listing for one sol returned a non-success status.
    #[error("Photo metadata request for sol {sol} failed with status {status}: {body}")]
    MetadataRequest {
        /// The sol that was requested.
        sol: u32,
        /// HTTP status code of the response.
        status: u16,
        /// Response body, as returned by the API.
        body: String,
    },

    /// One photo could not be downloaded. Never aborts a run.
    #[error("Failed to download photo {photo_id}: {reason}")]
    Download {
        /// API identifier of the photo.
        photo_id: u64,
        /// Status code or I/O failure description.
        reason: String,
    },

    /// No candidate image passed the aspect-ratio filter.
    #[error(
        "No images found: none of the {candidates} candidate image(s) has an aspect ratio above {min_aspect_ratio}"
    )]
    EmptySelection {
        /// Number of candidate files that were inspected.
        candidates: usize,
        /// The threshold that every candidate failed.
        min_aspect_ratio: f64,
    },

    /// The encoder could not be found, configured, or fed.
    #[error("Video encoding error: {0}")]
    VideoEncodeError(String),

    /// The output container could not be created or written.
    #[error("Video write error: {0}")]
    VideoWriteError(String),

    /// An error originating from the FFmpeg libraries.
    #[error("FFmpeg error: {0}")]
    FfmpegError(String),

    /// The HTTP client failed before a response was received.
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),

    /// An error from the `image` crate while reading or resizing images.
    #[error("Image processing error: {0}")]
    ImageError(#[from] ImageError),

    /// The API answered with JSON that does not match the expected shape.
    #[error("Invalid API response: {0}")]
    JsonError(#[from] JsonError),
}

impl TimelapseError {
    /// Returns `false` for errors that only drop a single photo from the run.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, TimelapseError::Download { .. })
    }
}

impl From<FfmpegError> for TimelapseError {
    fn from(error: FfmpegError) -> Self {
        TimelapseError::FfmpegError(error.to_string())
    }
}
