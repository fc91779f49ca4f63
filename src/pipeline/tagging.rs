use std::path::PathBuf;
use url::Url;

use super::metadata::{parse_metadata, MetadataRecord};
use super::transcode::OutputFile;
use crate::config::{ArtConfig, TaggingConfig};
use crate::providers::{ArtLookup, ImageDownloader, TagWriter};
use crate::session::Session;
use crate::workspace::Workspace;
use crate::{describe, PipelineError, Stage};

pub const METADATA_PROMPT: &str = "Please enter the title, album name and artist name \
     separated by a comma. Eg. {song, album, artist}";

/// Where the cover comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtworkReference {
    Remote(Url),
    LocalDefault,
}

impl ArtworkReference {
    /// Only values that parse as an http(s) URL are treated as remote
    pub fn classify(raw: Option<&str>) -> Self {
        let Some(raw) = raw.map(str::trim) else {
            return Self::LocalDefault;
        };
        if !(raw.starts_with("http://") || raw.starts_with("https://")) {
            return Self::LocalDefault;
        }
        match Url::parse(raw) {
            Ok(url) => Self::Remote(url),
            Err(_) => Self::LocalDefault,
        }
    }
}

/// Swap the first low-resolution size token in `url` for the high-resolution one
pub fn upgrade_size_token(url: &Url, low_tokens: &[String], high_token: &str) -> Url {
    let raw = url.as_str();
    low_tokens
        .iter()
        .find(|token| raw.contains(token.as_str()))
        .and_then(|token| Url::parse(&raw.replace(token.as_str(), high_token)).ok())
        .unwrap_or_else(|| url.clone())
}

/// Ask for `{title, album, artist}` until it parses or the attempts run out
pub fn prompt_metadata(
    session: &mut dyn Session,
    attempts: u32,
) -> Result<MetadataRecord, PipelineError> {
    let attempts = attempts.max(1);
    let mut last_error = None;

    for attempt in 1..=attempts {
        let line = session
            .read_line(METADATA_PROMPT)
            .map_err(|e| PipelineError::Session {
                stage: Stage::Tagging,
                reason: describe(&e),
            })?;

        match parse_metadata(&line) {
            Ok(record) => return Ok(record),
            Err(e) => {
                tracing::warn!("Rejected metadata entry (attempt {}/{}): {}", attempt, attempts, e);
                if attempt < attempts {
                    session.notify(&format!("Invalid entry: {}. Please try again.", e));
                }
                last_error = Some(e);
            }
        }
    }

    Err(PipelineError::TagParse(
        last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no entry".to_string()),
    ))
}

/// Collaborators and settings the tagging stage needs
pub struct Tagger<'a> {
    pub art: &'a dyn ArtLookup,
    pub images: &'a dyn ImageDownloader,
    pub writer: &'a dyn TagWriter,
    pub art_config: &'a ArtConfig,
    pub tagging_config: &'a TaggingConfig,
    pub workspace: &'a Workspace,
}

/// Cover chosen for the tag write
#[derive(Debug, Clone, PartialEq, Eq)]
enum Cover {
    Downloaded(PathBuf),
    Default(PathBuf),
}

impl Cover {
    fn path(&self) -> &PathBuf {
        match self {
            Cover::Downloaded(path) | Cover::Default(path) => path,
        }
    }
}

impl Tagger<'_> {
    /// Prompt for metadata, pick a cover and embed both into `output`
    pub async fn tag(
        &self,
        session: &mut dyn Session,
        output: &OutputFile,
    ) -> Result<MetadataRecord, PipelineError> {
        let record = prompt_metadata(session, self.tagging_config.prompt_attempts)?;
        let reference = self.resolve_artwork(session, &record).await;
        let cover = self.choose_cover(session, reference).await?;

        tracing::info!(
            "Tagging {} as '{}' by '{}' ({})",
            output.path.display(),
            record.title,
            record.artist,
            record.album
        );
        let written = self
            .writer
            .write_tags(&output.path, &record, std::slice::from_ref(cover.path()))
            .await;

        if let Cover::Downloaded(path) = &cover {
            if let Err(e) = fs_err::remove_file(path) {
                tracing::warn!("Could not remove downloaded cover: {}", e);
            }
        }

        written.map_err(|e| {
            PipelineError::TagWrite(format!(
                "{} (the audio in {} is complete but untagged)",
                describe(&e),
                output.path.display()
            ))
        })?;

        session.notify("Download complete.");
        Ok(record)
    }

    /// Lookup failures fall back to the default cover
    pub async fn resolve_artwork(
        &self,
        session: &mut dyn Session,
        record: &MetadataRecord,
    ) -> ArtworkReference {
        match self
            .art
            .lookup(&record.artist, &record.album, &self.art_config.size_hint)
            .await
        {
            Ok(raw) => {
                let reference = ArtworkReference::classify(raw.as_deref());
                tracing::debug!("Artwork reference: {:?}", reference);
                reference
            }
            Err(e) => {
                let err = PipelineError::ArtLookup(describe(&e));
                tracing::warn!("{}", err);
                session.notify(&format!("{}. Using the default cover.", err));
                ArtworkReference::LocalDefault
            }
        }
    }

    async fn choose_cover(
        &self,
        session: &mut dyn Session,
        reference: ArtworkReference,
    ) -> Result<Cover, PipelineError> {
        if let ArtworkReference::Remote(url) = reference {
            let url = upgrade_size_token(
                &url,
                &self.art_config.low_resolution_tokens,
                &self.art_config.high_resolution_token,
            );
            match self
                .images
                .download(url.as_str(), &self.workspace.cache_dir())
                .await
            {
                Ok(path) => return Ok(Cover::Downloaded(path)),
                Err(e) => {
                    let err = PipelineError::ArtDownload(describe(&e));
                    tracing::warn!("{}", err);
                    session.notify(&format!("{}. Using the default cover.", err));
                }
            }
        }

        self.default_cover().map(Cover::Default)
    }

    fn default_cover(&self) -> Result<PathBuf, PipelineError> {
        match &self.tagging_config.default_cover {
            Some(path) => Ok(path.clone()),
            None => self.workspace.default_cover().map_err(|e| {
                PipelineError::TagWrite(format!(
                    "could not prepare default cover: {}",
                    describe(&e)
                ))
            }),
        }
    }
}
