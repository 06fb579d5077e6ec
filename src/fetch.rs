use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

use crate::config::{Config, DownloadConfig, SubtitleConfig};

/// Errors surfaced by the retrieval layer.
#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("failed to run {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("yt-dlp exited with status {status}: {stderr}")]
    CommandFailed { status: i32, stderr: String },

    #[error("info record not written: {}", .0.display())]
    MissingInfo(PathBuf),

    #[error("invalid info record: {0}")]
    InvalidInfo(#[from] serde_json::Error),
}

/// Structured view of the fetcher's info record.
///
/// Only the fields this pipeline consults are declared; everything is left
/// optional because upstream sites report wildly uneven metadata.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VideoInfo {
    pub id: Option<String>,
    pub webpage_url: Option<String>,
    pub title: Option<String>,
    pub duration: Option<f64>,
    pub upload_date: Option<String>,
    pub uploader: Option<String>,
    pub uploader_id: Option<String>,
    pub channel: Option<String>,
    pub view_count: Option<u64>,
    pub like_count: Option<u64>,
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fps: Option<f64>,
    pub vcodec: Option<String>,
    pub acodec: Option<String>,
    pub filesize: Option<u64>,
    /// Manual subtitle tracks keyed by language code
    #[serde(default)]
    pub subtitles: HashMap<String, serde_json::Value>,
}

/// Retrieval seam for the pipeline.
///
/// The orchestrator only depends on this contract; tests substitute a
/// scripted implementation so the full batch flow runs without the binary.
#[async_trait]
pub trait VideoFetcher: Send + Sync {
    /// Version string of the underlying tool, `None` when unavailable.
    async fn version(&self) -> Option<String>;

    /// Download `url` (media, manual subtitles, info sidecar) under
    /// `dest_stem` and return the parsed info record.
    ///
    /// `dest_stem` is the extension-less output path, e.g.
    /// `videos/001_ab12cd34ef56`; the implementation derives the output
    /// template and the info JSON path from it.
    async fn fetch(&self, url: &str, dest_stem: &Path) -> Result<VideoInfo, FetchError>;
}

/// Production fetcher driving the yt-dlp command-line tool.
#[derive(Debug, Clone)]
pub struct YtDlpFetcher {
    binary: String,
    download: DownloadConfig,
    subtitles: SubtitleConfig,
}

impl YtDlpFetcher {
    pub fn new(config: &Config) -> Self {
        Self {
            binary: config.download.ytdlp_binary.clone(),
            download: config.download.clone(),
            subtitles: config.subtitles.clone(),
        }
    }

    /// Build the full argument list for one download.
    ///
    /// Automatic captions stay disabled: the auto-caption request path is
    /// known to hang, and manual tracks are the only subtitle source this
    /// pipeline trusts. Videos without manual tracks are flagged for the
    /// external transcription stage instead.
    fn build_args(&self, url: &str, dest_stem: &Path) -> Vec<String> {
        let format_selector = format!(
            "bestvideo[height<={0}][ext={1}]+bestaudio[ext=m4a]/best[height<={0}][ext={1}]/best",
            self.download.max_height, self.download.container
        );
        let output_template = format!("{}.%(ext)s", dest_stem.display());

        let args = vec![
            "-f".to_string(),
            format_selector,
            "--output".to_string(),
            output_template,
            "--write-subs".to_string(),
            "--no-write-auto-subs".to_string(),
            "--sub-langs".to_string(),
            self.subtitles.languages.join(","),
            "--sub-format".to_string(),
            self.subtitles.format.clone(),
            "--write-info-json".to_string(),
            "--merge-output-format".to_string(),
            self.download.container.clone(),
            "--recode-video".to_string(),
            self.download.container.clone(),
            "--socket-timeout".to_string(),
            self.download.socket_timeout_secs.to_string(),
            "--user-agent".to_string(),
            self.download.user_agent.clone(),
            url.to_string(),
        ];

        args
    }
}

#[async_trait]
impl VideoFetcher for YtDlpFetcher {
    async fn version(&self) -> Option<String> {
        let output = Command::new(&self.binary)
            .arg("--version")
            .output()
            .await
            .ok()?;

        if !output.status.success() {
            return None;
        }

        let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if version.is_empty() {
            None
        } else {
            Some(version)
        }
    }

    async fn fetch(&self, url: &str, dest_stem: &Path) -> Result<VideoInfo, FetchError> {
        let args = self.build_args(url, dest_stem);
        debug!("🎬 {} {}", self.binary, args.join(" "));

        let output = Command::new(&self.binary)
            .args(&args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| FetchError::Spawn {
                binary: self.binary.clone(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FetchError::CommandFailed {
                status: output.status.code().unwrap_or(-1),
                stderr: error_line(&stderr),
            });
        }

        let info_path = dest_stem.with_extension("info.json");
        let raw = tokio::fs::read_to_string(&info_path)
            .await
            .map_err(|_| FetchError::MissingInfo(info_path.clone()))?;

        let info: VideoInfo = serde_json::from_str(&raw)?;
        Ok(info)
    }
}

/// Pick the most useful line out of yt-dlp's stderr for the failure log.
fn error_line(stderr: &str) -> String {
    stderr
        .lines()
        .rev()
        .find(|line| line.trim_start().starts_with("ERROR"))
        .map(|line| line.trim().to_string())
        .unwrap_or_else(|| stderr.trim().chars().take(300).collect())
}
