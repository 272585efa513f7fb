//! Progress reporting.
//!
//! A run has three long stages: downloading photos, resizing the selected
//! images, and encoding frames. Attach a [`ProgressCallback`] through
//! [`TimelapseOptions::with_progress`](crate::TimelapseOptions::with_progress)
//! to observe them.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use rover_timelapse::{ProgressCallback, ProgressInfo, Rover, TimelapseOptions};
//!
//! struct PrintProgress;
//!
//! impl ProgressCallback for PrintProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         if let Some(pct) = info.percentage {
//!             println!("[{:?}] {pct:.1}% complete", info.stage);
//!         }
//!     }
//! }
//!
//! let options = TimelapseOptions::new(Rover::Curiosity, 1000, 1005)
//!     .with_progress(Arc::new(PrintProgress));
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

/// The pipeline stage currently in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Stage {
    /// Fetching photos for one sol into the image store.
    Download,
    /// Resizing selected images to the mean dimensions.
    Normalize,
    /// Writing frames to the video container.
    Encode,
}

/// A snapshot of stage progress.
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// Which stage is reporting.
    pub stage: Stage,
    /// Items (photos / images / frames) processed so far.
    pub current: u64,
    /// Total items expected in this stage, if known.
    pub total: Option<u64>,
    /// Completion percentage (0.0 – 100.0), if `total` is known.
    pub percentage: Option<f32>,
    /// Wall-clock time since the stage started.
    pub elapsed: Duration,
}

/// Receives progress updates during a run.
///
/// Callbacks observe the pipeline; they cannot stop it.
pub trait ProgressCallback: Send + Sync {
    /// Called after every processed item.
    fn on_progress(&self, info: &ProgressInfo);
}

/// Discards all notifications. Used when no callback is configured.
pub(crate) struct NoOpProgress;

impl ProgressCallback for NoOpProgress {
    fn on_progress(&self, _info: &ProgressInfo) {}
}

/// Tracks one stage and emits callbacks.
pub(crate) struct ProgressTracker {
    callback: Arc<dyn ProgressCallback>,
    stage: Stage,
    total: Option<u64>,
    current: u64,
    start_time: Instant,
}

impl ProgressTracker {
    pub(crate) fn new(callback: Arc<dyn ProgressCallback>, stage: Stage, total: Option<u64>) -> Self {
        Self {
            callback,
            stage,
            total,
            current: 0,
            start_time: Instant::now(),
        }
    }

    /// Record one completed item and report it.
    pub(crate) fn advance(&mut self) {
        self.current += 1;

        let percentage = self
            .total
            .filter(|&t| t > 0)
            .map(|t| (self.current as f32 / t as f32) * 100.0);

        self.callback.on_progress(&ProgressInfo {
            stage: self.stage,
            current: self.current,
            total: self.total,
            percentage,
            elapsed: self.start_time.elapsed(),
        });
    }
}
