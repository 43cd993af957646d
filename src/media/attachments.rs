use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::compress::{compress_file, CompressError, CompressOptions};

/// Images a listing form may carry
pub const DEFAULT_MAX_IMAGES: usize = 5;

/// Per-file outcome of [`ImageAttachments::add_files`]
#[derive(Debug, Default)]
pub struct AddReport {
    /// Files compressed and appended
    pub added: Vec<PathBuf>,
    /// Files that could not be processed
    pub failed: Vec<(PathBuf, CompressError)>,
    /// Files left out because the form was already full
    pub skipped: Vec<PathBuf>,
}

impl AddReport {
    pub fn is_complete_success(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty()
    }
}

/// Inline image list of a listing form
///
/// Each entry is a ready-to-store data URI, kept in the order added.
#[derive(Debug, Clone)]
pub struct ImageAttachments {
    images: Vec<String>,
    max_images: usize,
    options: CompressOptions,
}

impl Default for ImageAttachments {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_IMAGES, CompressOptions::default())
    }
}

impl ImageAttachments {
    pub fn new(max_images: usize, options: CompressOptions) -> Self {
        Self {
            images: Vec::new(),
            max_images,
            options,
        }
    }

    /// Compress `paths` in order and append the successes
    ///
    /// A file that fails is reported and leaves the list untouched;
    /// files after it are still processed.
    pub async fn add_files<P: AsRef<Path>>(&mut self, paths: &[P]) -> AddReport {
        let mut report = AddReport::default();

        for path in paths {
            let path = path.as_ref();
            if self.is_full() {
                report.skipped.push(path.to_path_buf());
                continue;
            }

            match compress_file(path, self.options).await {
                Ok(compressed) => {
                    self.images.push(compressed.data_uri);
                    report.added.push(path.to_path_buf());
                }
                Err(e) => {
                    warn!("⚠️  Failed to process {}: {}", path.display(), e);
                    report.failed.push((path.to_path_buf(), e));
                }
            }
        }

        if !report.skipped.is_empty() {
            info!(
                "Image limit of {} reached, skipped {} files",
                self.max_images,
                report.skipped.len()
            );
        }

        report
    }

    /// Append an already encoded image; returns false when full
    pub fn push(&mut self, data_uri: String) -> bool {
        if self.is_full() {
            return false;
        }
        self.images.push(data_uri);
        true
    }

    /// Remove the image at `index`, if any
    pub fn remove(&mut self, index: usize) -> Option<String> {
        (index < self.images.len()).then(|| self.images.remove(index))
    }

    pub fn images(&self) -> &[String] {
        &self.images
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.images.len() >= self.max_images
    }

    /// Hand the list over to the listing record
    pub fn into_images(self) -> Vec<String> {
        self.images
    }
}
