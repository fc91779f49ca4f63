use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub mod artwork;
pub mod ffmpeg;
pub mod http;
pub mod youtube;

use crate::pipeline::metadata::MetadataRecord;
use crate::Result;

/// One search result, in the provider's rank order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Provider-stable identifier
    pub id: String,

    /// Display title
    pub title: String,

    /// Channel or uploader name
    pub author: String,

    /// Length in seconds if the provider reports it
    pub duration: Option<u64>,
}

/// A fetchable address for a resolved candidate
#[derive(Debug, Clone, PartialEq)]
pub struct MediaLocator {
    /// Canonical title, used to name the cache and output files
    pub title: String,

    /// Delivery variants offered for the media
    pub variants: Vec<MediaVariant>,
}

/// A single delivery variant (container + codecs) of a media item
#[derive(Debug, Clone, PartialEq)]
pub struct MediaVariant {
    pub url: String,

    /// Container extension, e.g. `mp4`
    pub container: String,

    pub has_audio: bool,

    /// Audio bitrate in kbit/s
    pub audio_bitrate: Option<f64>,

    /// Total bitrate in kbit/s
    pub total_bitrate: Option<f64>,

    /// Size in bytes if known up front, used for progress when the host sends no length
    pub size_hint: Option<u64>,

    /// Request headers the host expects
    pub headers: BTreeMap<String, String>,
}

/// An open byte stream with its declared length
pub struct MediaStream {
    pub content_length: Option<u64>,
    pub chunks: BoxStream<'static, Result<Bytes>>,
}

impl std::fmt::Debug for MediaStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaStream")
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Free-text search returning candidates in rank order
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Candidate>>;
}

/// Turns a candidate id into a fetchable locator
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaResolver: Send + Sync {
    async fn resolve(&self, id: &str) -> Result<MediaLocator>;
}

/// Opens a chunked byte stream for a variant
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    async fn open(&self, variant: &MediaVariant) -> Result<MediaStream>;
}

/// Converts the intermediate file into the output format
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transcoder: Send + Sync {
    async fn transcode(&self, input: &Path, output: &Path) -> Result<()>;
}

/// Embeds metadata and attachments into an audio file, replacing previous tags
#[async_trait]
pub trait TagWriter: Send + Sync {
    async fn write_tags(
        &self,
        file: &Path,
        metadata: &MetadataRecord,
        attachments: &[PathBuf],
    ) -> Result<()>;
}

/// Album art search. `Ok(None)` means nothing was found.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ArtLookup: Send + Sync {
    async fn lookup(&self, artist: &str, album: &str, size: &str) -> Result<Option<String>>;
}

/// Downloads an image into a directory and returns the file path
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ImageDownloader: Send + Sync {
    async fn download(&self, url: &str, dest_dir: &Path) -> Result<PathBuf>;
}
