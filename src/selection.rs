//! Image selection and normalization.
//!
//! Rover cameras mix full frames, thumbnails and sub-frames of different
//! shapes. Before encoding, candidates are filtered by aspect ratio and the
//! survivors are resized to their mean dimensions so every frame has the
//! same size.
//!
//! # Example
//!
//! ```no_run
//! use rover_timelapse::{TimelapseError, select_and_normalize};
//!
//! let candidates = ["temp/curiosity-NAVCAM-1.jpg", "temp/curiosity-NAVCAM-2.jpg"];
//! let frames = select_and_normalize(&candidates, 1.2)?;
//! println!("{} frame(s) ready", frames.len());
//! # Ok::<(), TimelapseError>(())
//! ```

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageReader};

use crate::error::TimelapseError;
use crate::progress::{NoOpProgress, ProgressCallback, ProgressTracker, Stage};

/// JPEG quality of the resized copies.
pub const NORMALIZED_JPEG_QUALITY: u8 = 95;

const NORMALIZED_PREFIX: &str = "_resized_";

/// A candidate that passed the aspect-ratio filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedImage {
    /// The original cached file.
    pub path: PathBuf,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl SelectedImage {
    /// Width divided by height.
    pub fn aspect_ratio(&self) -> f64 {
        self.width as f64 / self.height as f64
    }
}

/// The images selected for one run, in candidate order. Never empty.
#[derive(Debug, Clone)]
pub struct Selection {
    images: Vec<SelectedImage>,
    candidates: usize,
}

impl Selection {
    /// Filter `candidates` by `width / height > min_aspect_ratio`.
    ///
    /// The comparison is strict: an image whose ratio equals the threshold
    /// is dropped. Only the image header is read, and the format is taken
    /// from the file content rather than its name. Files that cannot be read
    /// are skipped with a warning. Order is preserved.
    ///
    /// # Errors
    ///
    /// Returns [`TimelapseError::EmptySelection`] if nothing survives.
    pub fn from_candidates<P: AsRef<Path>>(
        candidates: &[P],
        min_aspect_ratio: f64,
    ) -> Result<Self, TimelapseError> {
        let mut images = Vec::new();

        for candidate in candidates {
            let path = candidate.as_ref();
            let (width, height) = match read_dimensions(path) {
                Ok(dimensions) => dimensions,
                Err(error) => {
                    log::warn!("Skipping unreadable image {}: {error}", path.display());
                    continue;
                }
            };

            if height == 0 || (width as f64 / height as f64) <= min_aspect_ratio {
                log::debug!(
                    "Rejecting {} ({width}x{height}) below aspect ratio {min_aspect_ratio}",
                    path.display(),
                );
                continue;
            }

            images.push(SelectedImage {
                path: path.to_path_buf(),
                width,
                height,
            });
        }

        if images.is_empty() {
            return Err(TimelapseError::EmptySelection {
                candidates: candidates.len(),
                min_aspect_ratio,
            });
        }

        log::info!("Selected {} of {} image(s)", images.len(), candidates.len());
        Ok(Self {
            images,
            candidates: candidates.len(),
        })
    }

    /// The selected images, in candidate order.
    pub fn images(&self) -> &[SelectedImage] {
        &self.images
    }

    /// How many candidates were inspected.
    pub fn candidate_count(&self) -> usize {
        self.candidates
    }

    /// Mean `(width, height)` of the selected images, truncated to integers.
    pub fn mean_dimensions(&self) -> (u32, u32) {
        let count = self.images.len() as u64;
        let total_width: u64 = self.images.iter().map(|image| image.width as u64).sum();
        let total_height: u64 = self.images.iter().map(|image| image.height as u64).sum();
        ((total_width / count) as u32, (total_height / count) as u32)
    }

    /// Resize every selected image to the mean dimensions.
    ///
    /// Each result is written as a separate JPEG (quality 95, Lanczos
    /// resampling) next to its original, which is left untouched. Returns
    /// the derived paths in selection order.
    pub fn normalize(&self) -> Result<Vec<PathBuf>, TimelapseError> {
        self.normalize_with_progress(Arc::new(NoOpProgress))
    }

    /// Like [`normalize`](Selection::normalize), reporting each image.
    pub fn normalize_with_progress(
        &self,
        progress: Arc<dyn ProgressCallback>,
    ) -> Result<Vec<PathBuf>, TimelapseError> {
        let (width, height) = self.mean_dimensions();
        log::info!("Resizing {} image(s) to {width}x{height}", self.images.len());

        let mut tracker = ProgressTracker::new(progress, Stage::Normalize, Some(self.images.len() as u64));
        let mut normalized = Vec::with_capacity(self.images.len());

        for selected in &self.images {
            let target = normalized_path(&selected.path);
            let resized = open_image(&selected.path)?
                .resize_exact(width, height, FilterType::Lanczos3)
                .to_rgb8();

            let writer = BufWriter::new(File::create(&target)?);
            let encoder = JpegEncoder::new_with_quality(writer, NORMALIZED_JPEG_QUALITY);
            DynamicImage::ImageRgb8(resized).write_with_encoder(encoder)?;

            normalized.push(target);
            tracker.advance();
        }

        Ok(normalized)
    }
}

/// Path of the resized copy derived from `original`.
pub fn normalized_path(original: &Path) -> PathBuf {
    let file_name = original
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    original.with_file_name(format!("{NORMALIZED_PREFIX}{file_name}"))
}

/// Read an image's dimensions from its header, sniffing the format.
pub(crate) fn read_dimensions(path: &Path) -> Result<(u32, u32), TimelapseError> {
    Ok(ImageReader::open(path)?.with_guessed_format()?.into_dimensions()?)
}

/// Decode an image, sniffing the format.
pub(crate) fn open_image(path: &Path) -> Result<DynamicImage, TimelapseError> {
    Ok(ImageReader::open(path)?.with_guessed_format()?.decode()?)
}

/// Filter `candidates` and resize the survivors in one step.
///
/// See [`Selection::from_candidates`] and [`Selection::normalize`].
pub fn select_and_normalize<P: AsRef<Path>>(
    candidates: &[P],
    min_aspect_ratio: f64,
) -> Result<Vec<PathBuf>, TimelapseError> {
    Selection::from_candidates(candidates, min_aspect_ratio)?.normalize()
}
