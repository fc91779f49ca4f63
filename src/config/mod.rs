use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use url::Url;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// External programs
    pub tools: ToolsConfig,

    /// Search result window
    pub search: SearchConfig,

    /// MP3 conversion settings
    pub transcode: TranscodeConfig,

    /// Metadata entry settings
    pub tagging: TaggingConfig,

    /// Album art lookup
    pub art: ArtConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Path or name of the yt-dlp executable
    pub yt_dlp: String,

    /// Path or name of the ffmpeg executable
    pub ffmpeg: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Number of result pages to offer
    pub pages: usize,

    /// Results per page
    pub page_size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscodeConfig {
    /// Audio bitrate handed to the MP3 encoder
    pub bitrate: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaggingConfig {
    /// How many times the metadata prompt is shown before giving up
    pub prompt_attempts: u32,

    /// Cover used when no album art is found (the bundled one if unset)
    pub default_cover: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtConfig {
    /// Album search endpoint
    pub endpoint: String,

    /// Size requested from the lookup
    pub size_hint: String,

    /// Size tokens replaced before downloading
    pub low_resolution_tokens: Vec<String>,

    /// Replacement size token
    pub high_resolution_token: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            yt_dlp: "yt-dlp".to_string(),
            ffmpeg: "ffmpeg".to_string(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            pages: 5,
            page_size: 10,
        }
    }
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            bitrate: "192k".to_string(),
        }
    }
}

impl Default for TaggingConfig {
    fn default() -> Self {
        Self {
            prompt_attempts: 3,
            default_cover: None,
        }
    }
}

impl Default for ArtConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://itunes.apple.com/search".to_string(),
            size_hint: "300x300".to_string(),
            low_resolution_tokens: vec!["300x300".to_string(), "100x100".to_string()],
            high_resolution_token: "1080x1080".to_string(),
        }
    }
}

impl SearchConfig {
    /// Maximum number of candidates offered for selection
    pub fn result_limit(&self) -> usize {
        self.pages.saturating_mul(self.page_size)
    }
}

impl Config {
    /// Load configuration from file or create default
    pub async fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let content =
                fs_err::read_to_string(&config_path).context("Failed to read config file")?;

            let config: Config =
                serde_yaml::from_str(&content).context("Failed to parse config file")?;

            config.validate()?;
            Ok(config)
        } else {
            let config = Self::default();
            config.save().await?;
            Ok(config)
        }
    }

    /// Save configuration to file
    pub async fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self).context("Failed to serialize config")?;

        fs_err::write(&config_path, content).context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    pub fn config_path() -> Result<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir().context("Could not determine config directory")?;

        Ok(config_dir.join("songdown").join("config.yaml"))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.tools.yt_dlp.trim().is_empty() {
            anyhow::bail!("tools.yt_dlp must not be empty");
        }
        if self.tools.ffmpeg.trim().is_empty() {
            anyhow::bail!("tools.ffmpeg must not be empty");
        }

        if self.search.result_limit() == 0 {
            anyhow::bail!("search.pages and search.page_size must both be at least 1");
        }

        if self.transcode.bitrate.trim().is_empty() {
            anyhow::bail!("transcode.bitrate must not be empty");
        }

        if self.tagging.prompt_attempts == 0 {
            anyhow::bail!("tagging.prompt_attempts must be at least 1");
        }

        let endpoint = Url::parse(&self.art.endpoint)
            .with_context(|| format!("Invalid art.endpoint: {}", self.art.endpoint))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            anyhow::bail!("art.endpoint must use HTTP or HTTPS protocol");
        }

        let tokens = std::iter::once(&self.art.size_hint)
            .chain(self.art.low_resolution_tokens.iter())
            .chain(std::iter::once(&self.art.high_resolution_token));
        for token in tokens {
            if !is_size_token(token) {
                anyhow::bail!("Invalid image size token '{}', expected e.g. 300x300", token);
            }
        }

        Ok(())
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  yt-dlp: {}", self.tools.yt_dlp);
        println!("  ffmpeg: {}", self.tools.ffmpeg);
        println!(
            "  Search Window: {} pages x {} results",
            self.search.pages, self.search.page_size
        );
        println!("  MP3 Bitrate: {}", self.transcode.bitrate);
        println!("  Metadata Prompt Attempts: {}", self.tagging.prompt_attempts);
        match &self.tagging.default_cover {
            Some(path) => println!("  Default Cover: {}", path.display()),
            None => println!("  Default Cover: bundled"),
        }
        println!("  Art Endpoint: {}", self.art.endpoint);
        println!(
            "  Art Size: {} (upgraded to {})",
            self.art.size_hint, self.art.high_resolution_token
        );
    }
}

/// `<digits>x<digits>`, the form album art URLs embed their dimensions in
fn is_size_token(token: &str) -> bool {
    match token.split_once('x') {
        Some((width, height)) => {
            !width.is_empty()
                && !height.is_empty()
                && width.chars().all(|c| c.is_ascii_digit())
                && height.chars().all(|c| c.is_ascii_digit())
        }
        None => false,
    }
}
