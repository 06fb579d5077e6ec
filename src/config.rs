use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the lecture collector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Download and retrieval settings
    pub download: DownloadConfig,

    /// Subtitle selection settings
    pub subtitles: SubtitleConfig,

    /// Output and storage settings
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// yt-dlp binary name or path
    pub ytdlp_binary: String,

    /// Resolution cap (height in pixels)
    pub max_height: u32,

    /// Preferred container format
    pub container: String,

    /// Socket timeout passed to the fetcher (seconds)
    pub socket_timeout_secs: u64,

    /// User agent header for the fetch
    pub user_agent: String,

    /// Delay between batch rows (seconds)
    pub rate_limit_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubtitleConfig {
    /// Manual subtitle languages to request, in preference order
    pub languages: Vec<String>,

    /// Subtitle download format
    pub format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Base output directory for the collection
    pub base_dir: PathBuf,

    /// Log level
    pub log_level: String,
}

impl Config {
    /// Load configuration from file.
    pub fn load() -> Result<Self> {
        // Try to load from various locations
        let config_paths = [
            "lecture-collector.toml",
            "config/lecture-collector.toml",
            "~/.config/lecture-collector/config.toml",
        ];

        for path in &config_paths {
            if let Ok(config_str) = std::fs::read_to_string(path) {
                match toml::from_str(&config_str) {
                    Ok(config) => {
                        tracing::info!("📄 Loaded configuration from: {}", path);
                        return Ok(config);
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse config file {}: {}", path, e);
                    }
                }
            }
        }

        // Try environment variables
        if let Ok(config) = Self::from_env() {
            return Ok(config);
        }

        Err(anyhow!("No configuration file found"))
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(output_dir) = std::env::var("LECTURE_COLLECTOR_OUTPUT_DIR") {
            config.output.base_dir = PathBuf::from(output_dir);
        }

        if let Ok(max_height) = std::env::var("LECTURE_COLLECTOR_MAX_HEIGHT") {
            config.download.max_height = max_height.parse().unwrap_or(720);
        }

        if let Ok(rate_limit) = std::env::var("LECTURE_COLLECTOR_RATE_LIMIT") {
            config.download.rate_limit_secs = rate_limit.parse().unwrap_or(5);
        }

        if let Ok(binary) = std::env::var("LECTURE_COLLECTOR_YTDLP") {
            config.download.ytdlp_binary = binary;
        }

        if let Ok(log_level) = std::env::var("LECTURE_COLLECTOR_LOG_LEVEL") {
            config.output.log_level = log_level;
        }

        Ok(config)
    }

    /// Save configuration to file.
    pub fn save(&self, path: &str) -> Result<()> {
        let config_str = toml::to_string_pretty(self)?;
        std::fs::write(path, config_str)?;
        tracing::info!("💾 Configuration saved to: {}", path);
        Ok(())
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        if self.download.max_height == 0 {
            return Err(anyhow!("max_height must be greater than 0"));
        }

        if self.download.container.is_empty() {
            return Err(anyhow!("container must not be empty"));
        }

        if self.subtitles.languages.is_empty() {
            return Err(anyhow!("at least one subtitle language is required"));
        }

        if !self.output.base_dir.exists() {
            if let Err(e) = std::fs::create_dir_all(&self.output.base_dir) {
                return Err(anyhow!("Cannot create output directory: {}", e));
            }
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            download: DownloadConfig {
                ytdlp_binary: "yt-dlp".to_string(),
                max_height: 720,
                container: "mp4".to_string(),
                socket_timeout_secs: 30,
                user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36"
                    .to_string(),
                rate_limit_secs: 5,
            },
            subtitles: SubtitleConfig {
                languages: vec!["en".to_string()],
                format: "vtt".to_string(),
            },
            output: OutputConfig {
                base_dir: PathBuf::from("data/raw_videos"),
                log_level: "info".to_string(),
            },
        }
    }
}

/// Configuration builder for programmatic config creation.
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_output_dir(mut self, dir: PathBuf) -> Self {
        self.config.output.base_dir = dir;
        self
    }

    pub fn with_max_height(mut self, max_height: u32) -> Self {
        self.config.download.max_height = max_height;
        self
    }

    pub fn with_rate_limit(mut self, secs: u64) -> Self {
        self.config.download.rate_limit_secs = secs;
        self
    }

    pub fn with_ytdlp_binary(mut self, binary: String) -> Self {
        self.config.download.ytdlp_binary = binary;
        self
    }

    pub fn with_subtitle_languages(mut self, languages: Vec<String>) -> Self {
        self.config.subtitles.languages = languages;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
