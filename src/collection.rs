use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::metadata::VideoRecord;

/// The cumulative JSON document recording every video collected across runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionLog {
    /// When the log was first created
    pub created_at: DateTime<Utc>,

    /// Version of this collector at creation time
    pub collector_version: String,

    /// Version reported by the retrieval tool at creation time
    pub ytdlp_version: Option<String>,

    /// Always equal to `videos.len()`
    pub total_videos: u64,

    /// Append-ordered records; append order is processing order
    pub videos: Vec<VideoRecord>,
}

impl CollectionLog {
    fn new(ytdlp_version: Option<String>) -> Self {
        Self {
            created_at: Utc::now(),
            collector_version: env!("CARGO_PKG_VERSION").to_string(),
            ytdlp_version,
            total_videos: 0,
            videos: Vec::new(),
        }
    }
}

/// Owns the collection log: loads it once at startup and rewrites the whole
/// file after every appended record.
///
/// The store is plain in-process state handed to the orchestrator; there is
/// no locking, the pipeline assumes a single process per output directory.
pub struct CollectionStore {
    path: PathBuf,
    log: CollectionLog,
}

impl CollectionStore {
    /// Load an existing log or initialize an empty one.
    ///
    /// `ytdlp_version` is only recorded when the log is first created; an
    /// existing log keeps whatever version it was created with.
    pub async fn open(path: &Path, ytdlp_version: Option<String>) -> Result<Self> {
        let log = if path.exists() {
            let content = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("reading collection log {}", path.display()))?;
            let mut log: CollectionLog = serde_json::from_str(&content)
                .with_context(|| format!("parsing collection log {}", path.display()))?;

            if log.total_videos as usize != log.videos.len() {
                warn!(
                    "Collection log count {} disagrees with {} records, repairing",
                    log.total_videos,
                    log.videos.len()
                );
                log.total_videos = log.videos.len() as u64;
            }

            info!("📋 Loaded collection log with {} videos", log.total_videos);
            log
        } else {
            info!("🆕 Starting a fresh collection log");
            CollectionLog::new(ytdlp_version)
        };

        Ok(Self {
            path: path.to_path_buf(),
            log,
        })
    }

    /// Linear dedup scan; batches are small enough that no index is kept.
    pub fn contains(&self, video_id: &str) -> bool {
        self.log.videos.iter().any(|v| v.video_id == video_id)
    }

    pub fn total(&self) -> u64 {
        self.log.total_videos
    }

    pub fn records(&self) -> &[VideoRecord] {
        &self.log.videos
    }

    pub fn ytdlp_version(&self) -> Option<&str> {
        self.log.ytdlp_version.as_deref()
    }

    /// Append a record and persist the whole log.
    pub async fn append(&mut self, record: VideoRecord) -> Result<()> {
        self.log.videos.push(record);
        self.log.total_videos += 1;
        self.save().await
    }

    /// Whole-file rewrite, pretty-printed.
    pub async fn save(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.log)?;
        tokio::fs::write(&self.path, json)
            .await
            .with_context(|| format!("writing collection log {}", self.path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::BatchRow;
    use crate::fetch::VideoInfo;
    use crate::metadata::{extract_metadata, video_id};
    use tempfile::TempDir;

    fn record_for(url: &str, index: u64) -> VideoRecord {
        let row = BatchRow {
            url: url.to_string(),
            subject: "physics".to_string(),
            difficulty: "beginner".to_string(),
            source: "youtube".to_string(),
        };
        let id = video_id(url);
        extract_metadata(
            &VideoInfo::default(),
            &row,
            index,
            &id,
            &["en".to_string()],
            "mp4",
        )
    }

    #[tokio::test]
    async fn test_open_missing_file_starts_empty() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("collection_log.json");

        let store = CollectionStore::open(&path, Some("2024.08.06".to_string()))
            .await
            .unwrap();

        assert_eq!(store.total(), 0);
        assert!(store.records().is_empty());
        assert_eq!(store.ytdlp_version(), Some("2024.08.06"));
        // Nothing is written until the first append
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_append_persists_and_reloads() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("collection_log.json");

        let mut store = CollectionStore::open(&path, None).await.unwrap();
        store
            .append(record_for("https://example.com/a", 1))
            .await
            .unwrap();
        store
            .append(record_for("https://example.com/b", 2))
            .await
            .unwrap();

        assert_eq!(store.total(), 2);
        assert!(path.exists());

        let reloaded = CollectionStore::open(&path, None).await.unwrap();
        assert_eq!(reloaded.total(), 2);
        assert_eq!(reloaded.records()[0].video_index, 1);
        assert_eq!(reloaded.records()[1].video_index, 2);
    }

    #[tokio::test]
    async fn test_contains_matches_by_video_id() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("collection_log.json");

        let mut store = CollectionStore::open(&path, None).await.unwrap();
        store
            .append(record_for("https://example.com/a", 1))
            .await
            .unwrap();

        assert!(store.contains(&video_id("https://example.com/a")));
        assert!(!store.contains(&video_id("https://example.com/other")));
    }

    #[tokio::test]
    async fn test_total_repaired_when_count_disagrees() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("collection_log.json");

        let mut store = CollectionStore::open(&path, None).await.unwrap();
        store
            .append(record_for("https://example.com/a", 1))
            .await
            .unwrap();

        // Simulate a hand-edited log with a wrong counter
        let mut doc: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        doc["total_videos"] = serde_json::json!(40);
        std::fs::write(&path, serde_json::to_string_pretty(&doc).unwrap()).unwrap();

        let reloaded = CollectionStore::open(&path, None).await.unwrap();
        assert_eq!(reloaded.total(), 1);
    }
}
