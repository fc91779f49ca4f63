use std::path::{Path, PathBuf};

use super::fetch::CacheFile;
use crate::providers::Transcoder;
use crate::{describe, PipelineError};

/// The finished MP3
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFile {
    pub path: PathBuf,
}

/// Convert `cache` into `dest`.
///
/// The transcoder writes to a staged file next to `dest`, which replaces `dest` only once
/// it holds output. On success the cache file is deleted. On failure it is kept for
/// diagnosis and `dest` is left as it was.
pub async fn transcode(
    transcoder: &dyn Transcoder,
    cache: CacheFile,
    dest: &Path,
) -> Result<OutputFile, PipelineError> {
    tracing::info!("Converting {} to {}", cache.path.display(), dest.display());

    let dir = dest.parent().unwrap_or_else(|| Path::new("."));
    let staged = tempfile::Builder::new()
        .prefix(".songdown-transcode")
        .suffix(".mp3")
        .tempfile_in(dir)
        .map_err(|e| {
            PipelineError::Transcode(format!("could not stage output in {}: {}", dir.display(), e))
        })?;

    let converted = transcoder
        .transcode(&cache.path, staged.path())
        .await
        .and_then(|_| {
            let written = fs_err::metadata(staged.path()).map(|m| m.len()).unwrap_or(0);
            if written > 0 {
                Ok(())
            } else {
                Err(anyhow::anyhow!("no output was written to {}", dest.display()))
            }
        });

    if let Err(e) = converted {
        tracing::debug!("Keeping {} for diagnosis", cache.path.display());
        return Err(PipelineError::Transcode(describe(&e)));
    }

    staged.persist(dest).map_err(|e| {
        PipelineError::Transcode(format!("could not move output to {}: {}", dest.display(), e))
    })?;

    fs_err::remove_file(&cache.path).map_err(|e| {
        PipelineError::Transcode(format!("converted, but could not remove cache file: {}", e))
    })?;
    tracing::debug!("Removed {}", cache.path.display());

    Ok(OutputFile {
        path: dest.to_path_buf(),
    })
}
