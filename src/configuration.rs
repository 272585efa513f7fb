//! Run configuration.
//!
//! [`TimelapseOptions`] is a builder that carries everything one timelapse
//! run needs: which rover and camera to query, the sol range, the selection
//! threshold, encoding settings, cache behaviour, and the API key.
//!
//! The key is resolved once by the caller (see [`ApiKey::resolve`]); nothing
//! in this crate reads environment variables.
//!
//! # Example
//!
//! ```
//! use rover_timelapse::{ApiKey, Rover, TimelapseOptions};
//!
//! let options = TimelapseOptions::new(Rover::Perseverance, 100, 110)
//!     .with_camera("NAVCAM_LEFT")
//!     .with_min_aspect_ratio(1.5)
//!     .with_fps(4.0)
//!     .with_api_key(ApiKey::new("DEMO_KEY"));
//!
//! assert!(options.validate().is_ok());
//! assert_eq!(
//!     options.video_name(),
//!     "perseverance-NAVCAM_LEFT-SOL100-110-4.0fps-1.5",
//! );
//! ```

use std::fmt::{Debug, Display, Formatter, Result as FmtResult};
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use crate::encode::VideoCodec;
use crate::error::TimelapseError;
use crate::progress::{NoOpProgress, ProgressCallback};

/// Default camera queried when none is given.
pub const DEFAULT_CAMERA: &str = "NAVCAM_LEFT";
/// Default frame rate of the generated video.
pub const DEFAULT_FPS: f64 = 2.0;
/// Default working directory for downloaded and derived images.
pub const DEFAULT_WORKING_DIRECTORY: &str = "temp";
/// Default directory the finished video is written to.
pub const DEFAULT_OUTPUT_DIRECTORY: &str = "output";

/// Rovers whose imagery can be turned into a timelapse.
///
/// Opportunity and Spirit are left out: their archives predate the
/// per-camera photo listings this tool depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rover {
    /// Mars 2020 rover, landed 2021.
    Perseverance,
    /// Mars Science Laboratory rover, landed 2012.
    Curiosity,
}

impl Rover {
    /// Every supported rover, in allow-list order.
    pub const ALL: [Rover; 2] = [Rover::Perseverance, Rover::Curiosity];

    /// The lower-case name used in API paths and file names.
    pub fn as_str(self) -> &'static str {
        match self {
            Rover::Perseverance => "perseverance",
            Rover::Curiosity => "curiosity",
        }
    }
}

impl Display for Rover {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for Rover {
    type Err = TimelapseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Rover::ALL
            .into_iter()
            .find(|rover| rover.as_str().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| TimelapseError::InvalidOption {
                name: "rover",
                reason: format!("unknown rover {value:?} (expected perseverance or curiosity)"),
            })
    }
}

/// A NASA API key.
///
/// The [`Debug`] output is redacted so keys never end up in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Wrap a key value.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Pick the explicit key if it is non-blank, else the fallback.
    ///
    /// The binary passes the `NASA_API_KEY` environment value as the
    /// fallback. Returns [`TimelapseError::MissingApiKey`] when neither
    /// holds a usable value.
    pub fn resolve(explicit: Option<&str>, fallback: Option<&str>) -> Result<Self, TimelapseError> {
        explicit
            .into_iter()
            .chain(fallback)
            .map(str::trim)
            .find(|key| !key.is_empty())
            .map(ApiKey::new)
            .ok_or(TimelapseError::MissingApiKey)
    }

    /// The raw key, for building request parameters.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl Debug for ApiKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str("ApiKey(***)")
    }
}

/// Configuration for one timelapse run.
///
/// All settings except the rover and sol range have defaults matching the
/// command-line tool: camera `NAVCAM_LEFT`, no aspect-ratio threshold,
/// 2 fps, MPEG-4 in AVI, `temp/` as working directory and `output/` for the
/// video.
#[derive(Clone)]
pub struct TimelapseOptions {
    pub(crate) rover: Rover,
    pub(crate) camera: String,
    pub(crate) sol_start: u32,
    pub(crate) sol_end: u32,
    pub(crate) min_aspect_ratio: f64,
    pub(crate) fps: f64,
    pub(crate) force_download: bool,
    pub(crate) keep_temp: bool,
    pub(crate) api_key: Option<ApiKey>,
    pub(crate) working_directory: PathBuf,
    pub(crate) output_directory: PathBuf,
    pub(crate) codec: VideoCodec,
    pub(crate) progress: Arc<dyn ProgressCallback>,
}

impl Debug for TimelapseOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("TimelapseOptions")
            .field("rover", &self.rover)
            .field("camera", &self.camera)
            .field("sol_start", &self.sol_start)
            .field("sol_end", &self.sol_end)
            .field("min_aspect_ratio", &self.min_aspect_ratio)
            .field("fps", &self.fps)
            .field("force_download", &self.force_download)
            .field("keep_temp", &self.keep_temp)
            .field("has_api_key", &self.api_key.is_some())
            .field("working_directory", &self.working_directory)
            .field("output_directory", &self.output_directory)
            .field("codec", &self.codec)
            .finish()
    }
}

impl TimelapseOptions {
    /// Create options for `rover` covering sols `sol_start..=sol_end`.
    pub fn new(rover: Rover, sol_start: u32, sol_end: u32) -> Self {
        Self {
            rover,
            camera: DEFAULT_CAMERA.to_string(),
            sol_start,
            sol_end,
            min_aspect_ratio: 0.0,
            fps: DEFAULT_FPS,
            force_download: false,
            keep_temp: false,
            api_key: None,
            working_directory: PathBuf::from(DEFAULT_WORKING_DIRECTORY),
            output_directory: PathBuf::from(DEFAULT_OUTPUT_DIRECTORY),
            codec: VideoCodec::Mpeg4,
            progress: Arc::new(NoOpProgress),
        }
    }

    /// Set the camera identifier (e.g. `NAVCAM_LEFT`, `FHAZ`).
    #[must_use]
    pub fn with_camera(mut self, camera: impl Into<String>) -> Self {
        self.camera = camera.into();
        self
    }

    /// Keep only images whose width/height ratio is strictly greater.
    #[must_use]
    pub fn with_min_aspect_ratio(mut self, ratio: f64) -> Self {
        self.min_aspect_ratio = ratio;
        self
    }

    /// Set the output frame rate.
    #[must_use]
    pub fn with_fps(mut self, fps: f64) -> Self {
        self.fps = fps;
        self
    }

    /// Re-download photos even when a cached copy exists.
    #[must_use]
    pub fn with_force_download(mut self, force: bool) -> Self {
        self.force_download = force;
        self
    }

    /// Leave the working directory in place after the run.
    #[must_use]
    pub fn with_keep_temp(mut self, keep: bool) -> Self {
        self.keep_temp = keep;
        self
    }

    /// Set the API key used for metadata requests.
    #[must_use]
    pub fn with_api_key(mut self, key: ApiKey) -> Self {
        self.api_key = Some(key);
        self
    }

    /// Set the directory holding downloaded and resized images.
    #[must_use]
    pub fn with_working_directory(mut self, path: impl Into<PathBuf>) -> Self {
        self.working_directory = path.into();
        self
    }

    /// Set the directory the video is written to.
    #[must_use]
    pub fn with_output_directory(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_directory = path.into();
        self
    }

    /// Set the output codec. The container follows the codec.
    #[must_use]
    pub fn with_codec(mut self, codec: VideoCodec) -> Self {
        self.codec = codec;
        self
    }

    /// Attach a progress callback for the download, resize and encode stages.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// The rover being queried.
    pub fn rover(&self) -> Rover {
        self.rover
    }

    /// The camera being queried.
    pub fn camera(&self) -> &str {
        &self.camera
    }

    /// The API key, if one was set.
    pub fn api_key(&self) -> Option<&ApiKey> {
        self.api_key.as_ref()
    }

    /// The working directory.
    pub fn working_directory(&self) -> &Path {
        &self.working_directory
    }

    /// Check every setting before any I/O happens.
    ///
    /// # Errors
    ///
    /// - [`TimelapseError::InvalidSolRange`] if `sol_start > sol_end`.
    /// - [`TimelapseError::InvalidOption`] for a malformed camera, frame rate
    ///   or aspect-ratio threshold, or a working directory that is removed at
    ///   the end of the run while holding the output directory or the
    ///   current directory.
    /// - [`TimelapseError::MissingApiKey`] if no key was set.
    pub fn validate(&self) -> Result<(), TimelapseError> {
        if self.sol_start > self.sol_end {
            return Err(TimelapseError::InvalidSolRange {
                start: self.sol_start,
                end: self.sol_end,
            });
        }

        if self.camera.is_empty()
            || !self
                .camera
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(TimelapseError::InvalidOption {
                name: "camera",
                reason: format!("{:?} must be non-empty and contain only A-Z, 0-9 or _", self.camera),
            });
        }

        if !self.fps.is_finite() || self.fps <= 0.0 {
            return Err(TimelapseError::InvalidOption {
                name: "fps",
                reason: format!("{} must be a positive number", self.fps),
            });
        }

        if !self.min_aspect_ratio.is_finite() || self.min_aspect_ratio < 0.0 {
            return Err(TimelapseError::InvalidOption {
                name: "min_aspect_ratio",
                reason: format!("{} must be zero or a positive number", self.min_aspect_ratio),
            });
        }

        self.validate_directories()?;

        match &self.api_key {
            Some(key) if !key.expose().trim().is_empty() => Ok(()),
            _ => Err(TimelapseError::MissingApiKey),
        }
    }

    // The working directory is deleted recursively after the run, so it must
    // not contain the video or the directory the process runs from.
    fn validate_directories(&self) -> Result<(), TimelapseError> {
        let invalid = |reason: String| TimelapseError::InvalidOption {
            name: "working_directory",
            reason,
        };

        if self.working_directory.as_os_str().is_empty() {
            return Err(invalid("must not be empty".to_string()));
        }

        let working = lexical_absolute(&self.working_directory)?;
        let output = lexical_absolute(&self.output_directory)?;

        if output.starts_with(&working) {
            return Err(invalid(format!(
                "{} contains the output directory {}",
                self.working_directory.display(),
                self.output_directory.display(),
            )));
        }

        let current = lexical_absolute(Path::new("."))?;
        if current.starts_with(&working) {
            return Err(invalid(format!(
                "{} contains the current directory",
                self.working_directory.display(),
            )));
        }

        Ok(())
    }

    /// The file stem identifying this run's video.
    ///
    /// Floats use their shortest round-trip form, so two different
    /// parameter sets never share a name.
    pub fn video_name(&self) -> String {
        format!(
            "{}-{}-SOL{}-{}-{:?}fps-{:?}",
            self.rover, self.camera, self.sol_start, self.sol_end, self.fps, self.min_aspect_ratio,
        )
    }

    /// Full path of the video this run produces.
    pub fn video_path(&self) -> PathBuf {
        self.output_directory
            .join(format!("{}.{}", self.video_name(), self.codec.extension()))
    }
}

/// Absolute form of `path` with `.` and `..` folded away, without touching
/// the filesystem beyond reading the current directory.
fn lexical_absolute(path: &Path) -> Result<PathBuf, TimelapseError> {
    let absolute = if path.as_os_str().is_empty() {
        std::env::current_dir()?
    } else {
        std::path::absolute(path)?
    };

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }
    Ok(normalized)
}
