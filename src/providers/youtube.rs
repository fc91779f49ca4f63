use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::process::Stdio;
use tokio::process::Command;

use super::{Candidate, MediaLocator, MediaResolver, MediaVariant, SearchProvider};
use crate::Result;

/// YouTube search and media info through yt-dlp
pub struct YtDlp {
    yt_dlp_path: String,
}

/// Flat search entry as printed by `--flat-playlist --dump-json`
#[derive(Debug, Deserialize)]
struct SearchEntry {
    id: String,
    title: Option<String>,
    channel: Option<String>,
    uploader: Option<String>,
    duration: Option<f64>,
}

/// Subset of `--dump-json` output for a single video
#[derive(Debug, Deserialize)]
struct VideoInfo {
    title: String,
    #[serde(default)]
    formats: Vec<FormatInfo>,
}

#[derive(Debug, Deserialize)]
struct FormatInfo {
    url: Option<String>,
    ext: Option<String>,
    acodec: Option<String>,
    abr: Option<f64>,
    tbr: Option<f64>,
    filesize: Option<u64>,
    filesize_approx: Option<u64>,
    protocol: Option<String>,
    #[serde(default)]
    http_headers: BTreeMap<String, String>,
}

impl YtDlp {
    pub fn new(yt_dlp_path: impl Into<String>) -> Self {
        Self {
            yt_dlp_path: yt_dlp_path.into(),
        }
    }

    async fn run(&self, args: &[&str]) -> Result<String> {
        tracing::debug!("Running {} {}", self.yt_dlp_path, args.join(" "));

        let output = Command::new(&self.yt_dlp_path)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| anyhow::anyhow!("Could not start {}: {}", self.yt_dlp_path, e))?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("yt-dlp failed: {}", error.trim());
        }

        Ok(String::from_utf8(output.stdout)?)
    }
}

impl Default for YtDlp {
    fn default() -> Self {
        Self::new("yt-dlp")
    }
}

#[async_trait]
impl SearchProvider for YtDlp {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Candidate>> {
        let target = format!("ytsearch{}:{}", limit, query);
        let stdout = self
            .run(&["--flat-playlist", "--dump-json", "--no-warnings", &target])
            .await?;
        parse_search_output(&stdout)
    }
}

#[async_trait]
impl MediaResolver for YtDlp {
    async fn resolve(&self, id: &str) -> Result<MediaLocator> {
        let url = format!("https://www.youtube.com/watch?v={}", id);
        let stdout = self
            .run(&["--dump-json", "--no-playlist", "--no-warnings", &url])
            .await?;
        parse_video_info(&stdout)
    }
}

/// One JSON object per line, in rank order
fn parse_search_output(stdout: &str) -> Result<Vec<Candidate>> {
    stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| -> Result<Candidate> {
            let entry: SearchEntry = serde_json::from_str(line)?;
            Ok(Candidate {
                title: entry.title.unwrap_or_else(|| entry.id.clone()),
                author: entry
                    .channel
                    .or(entry.uploader)
                    .unwrap_or_else(|| "Unknown".to_string()),
                duration: entry.duration.map(|d| d.max(0.0) as u64),
                id: entry.id,
            })
        })
        .collect()
}

fn parse_video_info(stdout: &str) -> Result<MediaLocator> {
    let info: VideoInfo = serde_json::from_str(stdout.trim())?;

    let variants = info
        .formats
        .into_iter()
        .filter_map(|format| {
            // Segmented manifests cannot be fetched as a single byte stream
            let direct = format
                .protocol
                .as_deref()
                .map_or(true, |p| p == "http" || p == "https");
            if !direct {
                return None;
            }
            Some(MediaVariant {
                url: format.url?,
                container: format.ext.unwrap_or_default(),
                has_audio: format.acodec.as_deref().map_or(false, |c| c != "none"),
                audio_bitrate: format.abr,
                total_bitrate: format.tbr,
                size_hint: format.filesize.or(format.filesize_approx),
                headers: format.http_headers,
            })
        })
        .collect();

    Ok(MediaLocator {
        title: info.title,
        variants,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_search_output_keeps_rank_order() {
        let stdout = concat!(
            r#"{"id":"a1","title":"Lofi Beats","channel":"Chillhop","duration":185.0}"#,
            "\n",
            r#"{"id":"b2","title":"Study Mix","uploader":"Someone","duration":null}"#,
            "\n\n",
        );
        let candidates = parse_search_output(stdout).unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].id, "a1");
        assert_eq!(candidates[0].author, "Chillhop");
        assert_eq!(candidates[0].duration, Some(185));
        assert_eq!(candidates[1].author, "Someone");
        assert_eq!(candidates[1].duration, None);
    }

    #[test]
    fn test_parse_search_output_rejects_garbage() {
        assert!(parse_search_output("not json").is_err());
    }

    #[test]
    fn test_parse_video_info_keeps_direct_variants() {
        let stdout = r#"{
            "title": "Lofi Beats",
            "formats": [
                {"url": "https://cdn/a.m3u8", "ext": "mp4", "acodec": "mp4a.40.2", "protocol": "m3u8_native"},
                {"url": "https://cdn/v.mp4", "ext": "mp4", "acodec": "none", "tbr": 900.0, "protocol": "https"},
                {"url": "https://cdn/av.mp4", "ext": "mp4", "acodec": "mp4a.40.2", "abr": 128.0,
                 "filesize": 4096, "protocol": "https", "http_headers": {"User-Agent": "yt"}},
                {"ext": "webm", "acodec": "opus", "protocol": "https"}
            ]
        }"#;
        let locator = parse_video_info(stdout).unwrap();
        assert_eq!(locator.title, "Lofi Beats");
        assert_eq!(locator.variants.len(), 2);
        assert!(!locator.variants[0].has_audio);
        let av = &locator.variants[1];
        assert!(av.has_audio);
        assert_eq!(av.size_hint, Some(4096));
        assert_eq!(av.headers.get("User-Agent").map(String::as_str), Some("yt"));
    }
}
