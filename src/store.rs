//! Local image cache.
//!
//! [`ImageStore`] keeps one file per downloaded photo in the working
//! directory, named `{rover}-{camera}-{id}.jpg`. A file's existence is its
//! only state: [`ensure`](ImageStore::ensure) returns a cached file without
//! touching the network unless a refresh is forced.
//!
//! Downloads stream into a temporary file next to the target and are renamed
//! into place, so an interrupted transfer never leaves a truncated image at
//! the cached path.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::NamedTempFile;

use crate::error::TimelapseError;
use crate::http::HttpClient;
use crate::metadata::Photo;

/// Cache of downloaded photos inside a working directory.
pub struct ImageStore {
    client: Arc<dyn HttpClient>,
    directory: PathBuf,
}

impl ImageStore {
    /// Create a store rooted at `directory`. Nothing is created on disk yet.
    pub fn new(client: Arc<dyn HttpClient>, directory: impl Into<PathBuf>) -> Self {
        Self {
            client,
            directory: directory.into(),
        }
    }

    /// The working directory.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Deterministic file name for a photo.
    pub fn file_name(photo: &Photo) -> String {
        format!("{}-{}-{}.jpg", photo.rover, photo.camera, photo.id)
    }

    /// Where `photo` is (or would be) cached.
    pub fn path_for(&self, photo: &Photo) -> PathBuf {
        self.directory.join(Self::file_name(photo))
    }

    /// Make sure `photo` is cached locally and return its path.
    ///
    /// An existing file is returned as-is when `force` is `false`; its
    /// content is not re-validated. Calling this twice for the same photo
    /// performs at most one download.
    ///
    /// # Errors
    ///
    /// Returns [`TimelapseError::Download`] if the server answers with a
    /// non-success status or the transfer fails. No file is left behind in
    /// that case.
    pub fn ensure(&self, photo: &Photo, force: bool) -> Result<PathBuf, TimelapseError> {
        let path = self.path_for(photo);

        if !force && path.is_file() {
            log::debug!("Photo {} already cached at {}", photo.id, path.display());
            return Ok(path);
        }

        self.download(photo, &path)
            .map_err(|error| match error {
                download @ TimelapseError::Download { .. } => download,
                other => TimelapseError::Download {
                    photo_id: photo.id,
                    reason: other.to_string(),
                },
            })?;

        log::debug!("Downloaded photo {} to {}", photo.id, path.display());
        Ok(path)
    }

    fn download(&self, photo: &Photo, path: &Path) -> Result<(), TimelapseError> {
        let mut response = self.client.get(&photo.source_url, &[])?;
        if response.status != 200 {
            return Err(TimelapseError::Download {
                photo_id: photo.id,
                reason: format!("server answered with status {}", response.status),
            });
        }

        fs::create_dir_all(&self.directory)?;
        let mut partial = NamedTempFile::new_in(&self.directory)?;
        io::copy(&mut response.body, &mut partial)?;
        partial.persist(path).map_err(|error| error.error)?;
        Ok(())
    }

    /// Remove the working directory and everything in it.
    ///
    /// A directory that does not exist is not an error.
    pub fn clear(&self) -> Result<(), TimelapseError> {
        match fs::remove_dir_all(&self.directory) {
            Ok(()) => {
                log::info!("Removed working directory {}", self.directory.display());
                Ok(())
            }
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(error.into()),
        }
    }
}
