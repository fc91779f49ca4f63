use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use url::Url;
use uuid::Uuid;

use super::{ArtLookup, ImageDownloader};
use crate::Result;

/// Album art lookup against the iTunes search API
pub struct ItunesArtLookup {
    client: Client,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct ItunesResponse {
    #[serde(default)]
    results: Vec<ItunesAlbum>,
}

#[derive(Debug, Deserialize)]
struct ItunesAlbum {
    #[serde(rename = "artworkUrl100")]
    artwork_url_100: Option<String>,
}

/// Size the iTunes API embeds in `artworkUrl100`
const ITUNES_THUMBNAIL_SIZE: &str = "100x100";

impl ItunesArtLookup {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl ArtLookup for ItunesArtLookup {
    async fn lookup(&self, artist: &str, album: &str, size: &str) -> Result<Option<String>> {
        let term = format!("{} {}", artist, album);
        tracing::debug!("Looking up album art for '{}'", term);

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("term", term.as_str()),
                ("entity", "album"),
                ("media", "music"),
                ("limit", "1"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            anyhow::bail!("Album art lookup failed: HTTP {}", response.status());
        }

        let body: ItunesResponse = response.json().await?;
        Ok(artwork_for_size(body, size))
    }
}

fn artwork_for_size(response: ItunesResponse, size: &str) -> Option<String> {
    response
        .results
        .into_iter()
        .find_map(|album| album.artwork_url_100)
        .map(|url| url.replace(ITUNES_THUMBNAIL_SIZE, size))
}

/// Saves remote images under a unique name
pub struct HttpImageDownloader {
    client: Client,
}

impl HttpImageDownloader {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }
}

impl Default for HttpImageDownloader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImageDownloader for HttpImageDownloader {
    async fn download(&self, url: &str, dest_dir: &Path) -> Result<PathBuf> {
        let parsed = Url::parse(url).map_err(|_| anyhow::anyhow!("Invalid URL format: {}", url))?;

        let response = self.client.get(parsed.clone()).send().await?;
        if !response.status().is_success() {
            anyhow::bail!("Failed to download image: HTTP {}", response.status());
        }

        let content = response.bytes().await?;
        let path = dest_dir.join(image_file_name(&parsed));
        fs_err::write(&path, &content)?;

        tracing::debug!("Saved {} bytes of album art to {}", content.len(), path.display());
        Ok(path)
    }
}

/// `art_<random>.<ext>`, keeping the URL's extension when it has a sensible one
fn image_file_name(url: &Url) -> String {
    let extension = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .and_then(|name| Path::new(name).extension())
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .filter(|ext| matches!(ext.as_str(), "jpg" | "jpeg" | "png" | "webp"))
        .unwrap_or_else(|| "jpg".to_string());

    format!("art_{}.{}", &Uuid::new_v4().simple().to_string()[..8], extension)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artwork_for_size_uses_first_album_with_art() {
        let body: ItunesResponse = serde_json::from_str(
            r#"{"resultCount": 2, "results": [
                {"collectionName": "No Art"},
                {"artworkUrl100": "https://is1.mzstatic.com/image/thumb/a/100x100bb.jpg"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(
            artwork_for_size(body, "300x300").as_deref(),
            Some("https://is1.mzstatic.com/image/thumb/a/300x300bb.jpg")
        );
    }

    #[test]
    fn test_artwork_for_size_with_no_results() {
        let body: ItunesResponse = serde_json::from_str(r#"{"resultCount": 0}"#).unwrap();
        assert_eq!(artwork_for_size(body, "300x300"), None);
    }

    #[test]
    fn test_image_file_name_keeps_extension() {
        let url = Url::parse("https://img.example.com/a/1080x1080bb.PNG").unwrap();
        let name = image_file_name(&url);
        assert!(name.starts_with("art_"));
        assert!(name.ends_with(".png"));

        let url = Url::parse("https://img.example.com/cover?id=1").unwrap();
        assert!(image_file_name(&url).ends_with(".jpg"));
    }

    #[tokio::test]
    async fn test_download_rejects_invalid_url() {
        let dir = tempfile::TempDir::new().unwrap();
        let downloader = HttpImageDownloader::new();
        assert!(downloader.download("not a url", dir.path()).await.is_err());
    }
}
