//! Working directories for a run: `cache/` holds the downloaded intermediate file,
//! `completed/` holds the finished MP3s.

use std::path::PathBuf;

use crate::utils::sanitize_filename;
use crate::PipelineError;

pub const CACHE_DIR: &str = "cache";
pub const OUTPUT_DIR: &str = "completed";
pub const INTERMEDIATE_EXT: &str = "mp4";
pub const OUTPUT_EXT: &str = "mp3";

const DEFAULT_COVER_NAME: &str = "cover.png";
const DEFAULT_COVER: &[u8] = include_bytes!("../../assets/cover.png");

#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create both directories. Existing directories are left alone.
    pub fn ensure(&self) -> Result<(), PipelineError> {
        for dir in [self.cache_dir(), self.output_dir()] {
            fs_err::create_dir_all(&dir)
                .map_err(|e| PipelineError::Filesystem(e.to_string()))?;
            tracing::debug!("Directory ready: {}", dir.display());
        }
        Ok(())
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.root.join(CACHE_DIR)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root.join(OUTPUT_DIR)
    }

    /// `cache/<title>.mp4`
    pub fn cache_file_for(&self, title: &str) -> PathBuf {
        self.cache_dir()
            .join(format!("{}.{}", file_stem(title), INTERMEDIATE_EXT))
    }

    /// `completed/<title>.mp3`
    pub fn output_file_for(&self, title: &str) -> PathBuf {
        self.output_dir()
            .join(format!("{}.{}", file_stem(title), OUTPUT_EXT))
    }

    /// Path of the bundled default cover, written to the cache directory on first use.
    /// The pipeline never deletes it.
    pub fn default_cover(&self) -> crate::Result<PathBuf> {
        let path = self.cache_dir().join(DEFAULT_COVER_NAME);
        if !path.exists() {
            fs_err::write(&path, DEFAULT_COVER)?;
            tracing::debug!("Wrote bundled cover to {}", path.display());
        }
        Ok(path)
    }
}

fn file_stem(title: &str) -> String {
    let stem = sanitize_filename(title);
    if stem.is_empty() {
        "untitled".to_string()
    } else {
        stem
    }
}
