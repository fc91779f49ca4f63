use anyhow::Context;
use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::providers::{MediaFetcher, MediaLocator, MediaStream, MediaVariant};
use crate::workspace::INTERMEDIATE_EXT;
use crate::{describe, PipelineError};

/// Bytes received so far against the declared total
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressState {
    pub bytes_read: u64,
    pub total_bytes: Option<u64>,
}

impl ProgressState {
    pub fn new(total_bytes: Option<u64>) -> Self {
        Self {
            bytes_read: 0,
            total_bytes,
        }
    }

    pub fn advance(&mut self, chunk_len: u64) {
        self.bytes_read = self.bytes_read.saturating_add(chunk_len);
    }

    /// True when a declared length was not reached
    pub fn is_short(&self) -> bool {
        matches!(self.total_bytes, Some(total) if self.bytes_read < total)
    }
}

/// The downloaded intermediate file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheFile {
    pub path: PathBuf,
    pub bytes: u64,
}

/// Best variant in `container` that carries audio: highest audio bitrate, then highest
/// total bitrate.
pub fn select_variant<'a>(
    variants: &'a [MediaVariant],
    container: &str,
) -> Option<&'a MediaVariant> {
    variants
        .iter()
        .filter(|v| v.has_audio && v.container.eq_ignore_ascii_case(container))
        .max_by(|a, b| {
            let key = |v: &MediaVariant| {
                (
                    v.audio_bitrate.unwrap_or(0.0),
                    v.total_bitrate.unwrap_or(0.0),
                )
            };
            let (a_audio, a_total) = key(a);
            let (b_audio, b_total) = key(b);
            a_audio
                .total_cmp(&b_audio)
                .then_with(|| a_total.total_cmp(&b_total))
        })
}

/// Bar scaled to the total when it is known, a spinner otherwise
fn progress_indicator(total: Option<u64>, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }

    match total {
        Some(total) => {
            let bar = ProgressBar::new(total);
            let template =
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})";
            if let Ok(style) = ProgressStyle::default_bar().template(template) {
                bar.set_style(style.progress_chars("#>-"));
            }
            bar
        }
        None => {
            let spinner = ProgressBar::new_spinner();
            let template = "{spinner:.green} [{elapsed_precise}] {bytes} {msg}";
            if let Ok(style) = ProgressStyle::default_spinner().template(template) {
                spinner.set_style(style);
            }
            spinner.enable_steady_tick(std::time::Duration::from_millis(120));
            spinner
        }
    }
}

/// Write the stream to `dest` chunk by chunk, reporting progress after every chunk.
/// A stream that stops short of its declared length is an error.
pub async fn write_stream<F>(
    stream: MediaStream,
    dest: &Path,
    mut on_chunk: F,
) -> crate::Result<ProgressState>
where
    F: FnMut(&ProgressState),
{
    let mut file = fs_err::File::create(dest)?;
    let mut progress = ProgressState::new(stream.content_length);
    let mut chunks = stream.chunks;

    while let Some(chunk) = chunks.next().await {
        let chunk = chunk.with_context(|| {
            format!("connection interrupted after {} bytes", progress.bytes_read)
        })?;
        file.write_all(&chunk)?;
        progress.advance(chunk.len() as u64);
        on_chunk(&progress);
    }

    file.flush()?;
    drop(file);

    if progress.is_short() {
        anyhow::bail!(
            "stream ended after {} of {} bytes",
            progress.bytes_read,
            progress.total_bytes.unwrap_or_default()
        );
    }

    Ok(progress)
}

/// Download the best matching variant of `locator` into `dest`
pub async fn fetch(
    fetcher: &dyn MediaFetcher,
    locator: &MediaLocator,
    dest: &Path,
    show_progress: bool,
) -> Result<CacheFile, PipelineError> {
    let variant = select_variant(&locator.variants, INTERMEDIATE_EXT).ok_or_else(|| {
        PipelineError::Fetch(format!(
            "no {} variant with audio is available for '{}'",
            INTERMEDIATE_EXT, locator.title
        ))
    })?;
    tracing::debug!(
        "Selected {} variant ({:?} kbit/s audio)",
        variant.container,
        variant.audio_bitrate
    );

    let stream = fetcher
        .open(variant)
        .await
        .map_err(|e| PipelineError::Fetch(describe(&e)))?;

    tracing::info!("Downloading '{}' to {}", locator.title, dest.display());
    let indicator = progress_indicator(stream.content_length.or(variant.size_hint), show_progress);

    match write_stream(stream, dest, |progress| indicator.set_position(progress.bytes_read)).await {
        Ok(progress) => {
            indicator.finish_and_clear();
            tracing::debug!("Fetched {} bytes", progress.bytes_read);
            Ok(CacheFile {
                path: dest.to_path_buf(),
                bytes: progress.bytes_read,
            })
        }
        Err(e) => {
            indicator.abandon();
            Err(PipelineError::Fetch(describe(&e)))
        }
    }
}
