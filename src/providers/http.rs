use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;

use super::{MediaFetcher, MediaStream, MediaVariant};
use crate::Result;

/// Streams variants over HTTP(S)
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaFetcher for HttpFetcher {
    async fn open(&self, variant: &MediaVariant) -> Result<MediaStream> {
        let mut request = self.client.get(&variant.url);
        for (name, value) in &variant.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            anyhow::bail!("Failed to download media: HTTP {}", response.status());
        }

        let content_length = response.content_length();
        tracing::debug!("Media response declared {:?} bytes", content_length);

        let chunks = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(anyhow::Error::from))
            .boxed();

        Ok(MediaStream {
            content_length,
            chunks,
        })
    }
}
