/// Lecture Collector - Rust Implementation
///
/// Batch-downloads educational videos, extracts manual subtitle transcripts,
/// and maintains per-video metadata plus aggregate statistics for a
/// dataset-building pipeline.

pub mod collection;
pub mod config;
pub mod downloader;
pub mod fetch;
pub mod metadata;
pub mod stats;
pub mod transcript;

// Re-export main types for easy access
pub use crate::collection::{CollectionLog, CollectionStore};
pub use crate::config::{Config, ConfigBuilder};
pub use crate::downloader::{
    BatchReport, BatchRow, DownloadError, DownloadOutcome, OutputLayout, VideoDownloader,
};
pub use crate::fetch::{FetchError, VideoFetcher, VideoInfo, YtDlpFetcher};
pub use crate::metadata::{extract_metadata, video_id, VideoRecord};
pub use crate::stats::CollectionStats;
pub use crate::transcript::{parse_vtt, TranscriptStatus};
