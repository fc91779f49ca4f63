use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use super::{TagWriter, Transcoder};
use crate::pipeline::metadata::MetadataRecord;
use crate::Result;

/// MP3 conversion and ID3 tagging through ffmpeg
pub struct Ffmpeg {
    ffmpeg_path: String,
    bitrate: String,
}

impl Ffmpeg {
    pub fn new(ffmpeg_path: impl Into<String>, bitrate: impl Into<String>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            bitrate: bitrate.into(),
        }
    }

    fn transcode_args(&self, input: &Path, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-hide_banner".into(), "-y".into(), "-i".into()];
        args.push(input.into());
        args.extend(
            ["-vn", "-codec:a", "libmp3lame", "-b:a", self.bitrate.as_str()]
                .into_iter()
                .map(OsString::from),
        );
        args.push(output.into());
        args
    }

    /// `-map_metadata -1` drops whatever tags the input carried, so a rewrite fully
    /// replaces an earlier one.
    fn tag_args(
        input: &Path,
        output: &Path,
        metadata: &MetadataRecord,
        attachments: &[PathBuf],
    ) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-hide_banner".into(), "-y".into(), "-i".into()];
        args.push(input.into());
        for attachment in attachments {
            args.push("-i".into());
            args.push(attachment.into());
        }

        args.extend(["-map", "0:a"].into_iter().map(OsString::from));
        for index in 1..=attachments.len() {
            args.push("-map".into());
            args.push(format!("{}:v", index).into());
        }

        args.extend(
            ["-c", "copy", "-map_metadata", "-1", "-id3v2_version", "3"]
                .into_iter()
                .map(OsString::from),
        );
        for (key, value) in [
            ("title", &metadata.title),
            ("album", &metadata.album),
            ("artist", &metadata.artist),
        ] {
            args.push("-metadata".into());
            args.push(format!("{}={}", key, value).into());
        }
        if !attachments.is_empty() {
            args.extend(
                [
                    "-metadata:s:v",
                    "title=Album cover",
                    "-metadata:s:v",
                    "comment=Cover (front)",
                ]
                .into_iter()
                .map(OsString::from),
            );
        }

        // Output format has to be explicit: the temporary file has no .mp3 extension.
        args.extend(["-f", "mp3"].into_iter().map(OsString::from));
        args.push(output.into());
        args
    }

    async fn run(&self, args: Vec<OsString>) -> Result<()> {
        tracing::debug!("Running {} {:?}", self.ffmpeg_path, args);

        let output = Command::new(&self.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| anyhow::anyhow!("Could not start {}: {}", self.ffmpeg_path, e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let last_line = stderr.lines().last().unwrap_or("").trim();
            anyhow::bail!("ffmpeg exited with {}: {}", output.status, last_line);
        }

        Ok(())
    }
}

impl Default for Ffmpeg {
    fn default() -> Self {
        Self::new("ffmpeg", "192k")
    }
}

#[async_trait]
impl Transcoder for Ffmpeg {
    async fn transcode(&self, input: &Path, output: &Path) -> Result<()> {
        self.run(self.transcode_args(input, output)).await
    }
}

#[async_trait]
impl TagWriter for Ffmpeg {
    async fn write_tags(
        &self,
        file: &Path,
        metadata: &MetadataRecord,
        attachments: &[PathBuf],
    ) -> Result<()> {
        let dir = file
            .parent()
            .ok_or_else(|| anyhow::anyhow!("{} has no parent directory", file.display()))?;

        // Written next to the original and renamed over it once ffmpeg succeeds.
        let staged = tempfile::Builder::new()
            .prefix(".songdown-tag")
            .tempfile_in(dir)?;

        self.run(Self::tag_args(file, staged.path(), metadata, attachments))
            .await?;

        staged.persist(file)?;
        Ok(())
    }
}
