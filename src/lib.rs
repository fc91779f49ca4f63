//! Songdown - A Rust CLI tool for grabbing songs from YouTube
//!
//! This library searches YouTube, streams the chosen video's audio-bearing variant into a
//! cache directory, converts it to MP3 with ffmpeg and tags the result with user-supplied
//! metadata and cover art.

pub mod cli;
pub mod config;
pub mod pipeline;
pub mod providers;
pub mod session;
pub mod utils;
pub mod workspace;

pub use cli::{Cli, Commands};
pub use config::Config;
pub use pipeline::{Pipeline, RunOutcome, RunState};
pub use session::{Session, TerminalSession};
pub use workspace::Workspace;

/// Result type used by collaborator calls throughout the library
pub type Result<T> = anyhow::Result<T>;

/// One sequential unit of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Workspace,
    Search,
    Resolution,
    Fetch,
    Transcode,
    Tagging,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Workspace => write!(f, "workspace"),
            Stage::Search => write!(f, "search"),
            Stage::Resolution => write!(f, "resolution"),
            Stage::Fetch => write!(f, "fetch"),
            Stage::Transcode => write!(f, "transcode"),
            Stage::Tagging => write!(f, "tagging"),
        }
    }
}

/// Error types raised by the pipeline stages
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("Could not prepare directory: {0}")]
    Filesystem(String),

    #[error("Search provider failed: {0}")]
    SearchProvider(String),

    #[error("Could not resolve media: {0}")]
    Resolution(String),

    #[error("Download failed: {0}")]
    Fetch(String),

    #[error("Conversion failed: {0}")]
    Transcode(String),

    #[error("Invalid metadata entry: {0}")]
    TagParse(String),

    #[error("Album art lookup failed: {0}")]
    ArtLookup(String),

    #[error("Album art download failed: {0}")]
    ArtDownload(String),

    #[error("Error writing metadata: {0}")]
    TagWrite(String),

    #[error("Interactive prompt failed: {reason}")]
    Session { stage: Stage, reason: String },
}

impl PipelineError {
    /// Stage the error belongs to
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::Filesystem(_) => Stage::Workspace,
            PipelineError::SearchProvider(_) => Stage::Search,
            PipelineError::Resolution(_) => Stage::Resolution,
            PipelineError::Fetch(_) => Stage::Fetch,
            PipelineError::Transcode(_) => Stage::Transcode,
            PipelineError::TagParse(_)
            | PipelineError::ArtLookup(_)
            | PipelineError::ArtDownload(_)
            | PipelineError::TagWrite(_) => Stage::Tagging,
            PipelineError::Session { stage, .. } => *stage,
        }
    }
}

/// Render an anyhow error with its whole context chain on one line
pub(crate) fn describe(err: &anyhow::Error) -> String {
    format!("{:#}", err)
}
