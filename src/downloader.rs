use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{error, info, warn};

use crate::collection::CollectionStore;
use crate::config::Config;
use crate::fetch::{FetchError, VideoFetcher};
use crate::metadata::{self, VideoRecord};
use crate::stats::CollectionStats;
use crate::transcript::{self, TranscriptStatus};

/// One data row from the input CSV. All four fields are opaque strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRow {
    pub url: String,
    pub subject: String,
    pub difficulty: String,
    pub source: String,
}

/// Per-video error kinds the orchestrator branches on.
#[derive(thiserror::Error, Debug)]
pub enum DownloadError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    /// Ctrl-c observed; never treated as a normal failure
    #[error("interrupted by user")]
    Interrupted,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serializing metadata: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("collection log: {0}")]
    Store(anyhow::Error),
}

/// Outcome of a single-row download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadOutcome {
    Downloaded { needs_whisper: bool },
    /// The identifier was already in the collection log; nothing was fetched
    Skipped,
}

/// End-of-batch accounting. Skipped duplicates count as successes, so
/// `failed == total - succeeded` holds for an uninterrupted run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub needs_whisper: usize,
    pub interrupted: bool,
}

/// Every filesystem location the pipeline touches, rooted at the configured
/// output directory.
pub struct OutputLayout {
    pub base: PathBuf,
    pub videos: PathBuf,
    pub metadata: PathBuf,
    pub transcripts: PathBuf,
    pub collection_log: PathBuf,
    pub failed_log: PathBuf,
    pub statistics: PathBuf,
}

impl OutputLayout {
    pub fn new(base: &Path) -> Self {
        Self {
            base: base.to_path_buf(),
            videos: base.join("videos"),
            metadata: base.join("metadata"),
            transcripts: base.join("transcripts"),
            collection_log: base.join("collection_log.json"),
            failed_log: base.join("failed_downloads.txt"),
            statistics: base.join("statistics.json"),
        }
    }

    /// Create every directory so later steps can assume the tree exists.
    pub async fn prepare(&self) -> Result<()> {
        for dir in [&self.base, &self.videos, &self.metadata, &self.transcripts] {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("creating {}", dir.display()))?;
        }
        Ok(())
    }
}

/// Batch orchestrator: walks CSV rows strictly sequentially, drives the
/// fetcher, and keeps the collection log and failure log current.
pub struct VideoDownloader {
    config: Config,
    layout: OutputLayout,
    store: CollectionStore,
    fetcher: Box<dyn VideoFetcher>,
}

impl VideoDownloader {
    pub async fn new(config: Config, fetcher: Box<dyn VideoFetcher>) -> Result<Self> {
        let layout = OutputLayout::new(&config.output.base_dir);
        layout.prepare().await?;

        let ytdlp_version = fetcher.version().await;
        match &ytdlp_version {
            Some(version) => info!("🛠  Retrieval tool version: {}", version),
            None => warn!("Retrieval tool not found on PATH; downloads will fail"),
        }

        let store = CollectionStore::open(&layout.collection_log, ytdlp_version).await?;

        Ok(Self {
            config,
            layout,
            store,
            fetcher,
        })
    }

    pub fn store(&self) -> &CollectionStore {
        &self.store
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    /// Download a single video with metadata and transcript extraction.
    ///
    /// Any failure is appended to the failure log before it is returned, so
    /// direct callers and the batch loop see identical bookkeeping. An
    /// interrupt is the one exception: it propagates unmodified.
    pub async fn download_video(
        &mut self,
        row: &BatchRow,
        video_index: u64,
    ) -> Result<DownloadOutcome, DownloadError> {
        match self.try_download(row, video_index).await {
            Err(err) if !matches!(err, DownloadError::Interrupted) => {
                self.log_failure(row, &err).await;
                Err(err)
            }
            other => other,
        }
    }

    async fn try_download(
        &mut self,
        row: &BatchRow,
        video_index: u64,
    ) -> Result<DownloadOutcome, DownloadError> {
        let video_id = metadata::video_id(&row.url);

        if self.store.contains(&video_id) {
            info!("⏭️  Video {} already collected, skipping", video_id);
            return Ok(DownloadOutcome::Skipped);
        }

        info!("⬇️  Downloading video {}: {}", video_index, row.url);
        info!(
            "    Subject: {} | Difficulty: {} | Source: {}",
            row.subject, row.difficulty, row.source
        );

        let dest_stem = self
            .layout
            .videos
            .join(format!("{:03}_{}", video_index, video_id));
        let video_info = self.fetcher.fetch(&row.url, &dest_stem).await?;

        let mut record = metadata::extract_metadata(
            &video_info,
            row,
            video_index,
            &video_id,
            &self.config.subtitles.languages,
            &self.config.download.container,
        );

        let metadata_path = self
            .layout
            .metadata
            .join(format!("{:03}_{}_metadata.json", video_index, video_id));
        write_record(&metadata_path, &record).await?;

        let status = match transcript::extract_transcript(
            &self.layout.videos,
            &self.layout.transcripts,
            video_index,
            &video_id,
        )
        .await
        {
            Ok(status) => status,
            Err(err) => {
                warn!("⚠️  Transcript extraction failed for {}: {}", video_id, err);
                TranscriptStatus::NotFound
            }
        };

        match &status {
            TranscriptStatus::Extracted { chars } => {
                info!("✅ Transcript extracted: {} characters", chars);
            }
            TranscriptStatus::NotFound => {
                info!("⚠️  No manual subtitles, flagging for external transcription");
            }
        }

        // Second phase of the needs-whisper write: the per-video file is
        // rewritten, the aggregate log sees the record only once
        record.needs_whisper_transcription = !status.found();
        write_record(&metadata_path, &record).await?;

        let needs_whisper = record.needs_whisper_transcription;
        info!(
            "✅ Collected: {} ({}:{:02}, {})",
            record.title,
            record.duration / 60,
            record.duration % 60,
            record.resolution
        );

        self.store
            .append(record)
            .await
            .map_err(DownloadError::Store)?;

        Ok(DownloadOutcome::Downloaded { needs_whisper })
    }

    /// Download every row of a CSV batch, one at a time.
    ///
    /// Indices start at `current_total + 1` and advance per row regardless of
    /// outcome. A ctrl-c during a download or the inter-row delay stops the
    /// loop with a partial-progress summary.
    pub async fn download_batch(&mut self, csv_path: &Path) -> Result<BatchReport> {
        let rows = read_batch_csv(csv_path).await?;

        info!("📋 Batch download: {} videos", rows.len());
        if let Some(version) = self.store.ytdlp_version() {
            info!("    Retrieval tool: {}", version);
        }
        info!("    Automatic captions are disabled; videos without manual subtitles are flagged for external transcription");

        let start_index = self.store.total() + 1;
        let mut report = BatchReport {
            total: rows.len(),
            ..BatchReport::default()
        };

        for (offset, row) in rows.iter().enumerate() {
            let video_index = start_index + offset as u64;

            let outcome = tokio::select! {
                result = self.download_video(row, video_index) => result,
                _ = interrupt_signal() => Err(DownloadError::Interrupted),
            };

            match outcome {
                Ok(DownloadOutcome::Downloaded { needs_whisper }) => {
                    report.succeeded += 1;
                    if needs_whisper {
                        report.needs_whisper += 1;
                    }
                }
                Ok(DownloadOutcome::Skipped) => {
                    report.succeeded += 1;
                    report.skipped += 1;
                }
                Err(DownloadError::Interrupted) => {
                    report.interrupted = true;
                    warn!(
                        "🛑 Interrupted by user: {}/{} rows processed, {} succeeded",
                        offset,
                        rows.len(),
                        report.succeeded
                    );
                    break;
                }
                Err(err) => {
                    report.failed += 1;
                    error!("❌ Failed to download {}: {}", row.url, err);
                }
            }

            // Rate limit between rows, not after the last one
            if offset + 1 < rows.len() && self.config.download.rate_limit_secs > 0 {
                let delay = self.config.download.rate_limit_secs;
                info!("⏳ Waiting {}s before next download...", delay);
                let interrupted = tokio::select! {
                    _ = tokio::time::sleep(Duration::from_secs(delay)) => false,
                    _ = interrupt_signal() => true,
                };
                if interrupted {
                    report.interrupted = true;
                    warn!(
                        "🛑 Interrupted by user: {}/{} rows processed, {} succeeded",
                        offset + 1,
                        rows.len(),
                        report.succeeded
                    );
                    break;
                }
            }
        }

        info!(
            "📊 Download complete: ✅ {}/{} succeeded, ❌ {} failed, 🎤 {} need external transcription",
            report.succeeded, report.total, report.failed, report.needs_whisper
        );

        Ok(report)
    }

    /// Compute the statistics snapshot, narrate it, and persist it.
    ///
    /// An empty log short-circuits: nothing is computed and no file is
    /// written.
    pub async fn generate_statistics(&self) -> Result<Option<CollectionStats>> {
        let stats = match CollectionStats::compute(self.store.records()) {
            Some(stats) => stats,
            None => {
                info!("No videos collected yet.");
                return Ok(None);
            }
        };

        info!("📊 Collection statistics");
        info!("    Total videos: {}", stats.total_videos);
        info!("    Total duration: {:.1} hours", stats.total_duration_hours);
        info!("    Average duration: {:.1} minutes", stats.avg_duration_minutes);
        info!(
            "    With manual subtitles: {} ({:.1}%)",
            stats.with_manual_subtitles,
            stats.percent_of(stats.with_manual_subtitles)
        );
        info!(
            "    Need external transcription: {} ({:.1}%)",
            stats.needs_whisper,
            stats.percent_of(stats.needs_whisper)
        );

        info!("    By subject:");
        for (subject, count) in &stats.by_subject {
            info!("      {}: {} ({:.1}%)", subject, count, stats.percent_of(*count));
        }
        info!("    By difficulty:");
        for (difficulty, count) in &stats.by_difficulty {
            info!("      {}: {} ({:.1}%)", difficulty, count, stats.percent_of(*count));
        }
        info!("    By source:");
        for (source, count) in &stats.by_source {
            info!("      {}: {} ({:.1}%)", source, count, stats.percent_of(*count));
        }

        let json = serde_json::to_string_pretty(&stats)?;
        tokio::fs::write(&self.layout.statistics, json)
            .await
            .with_context(|| format!("writing {}", self.layout.statistics.display()))?;
        info!("💾 Statistics saved to: {}", self.layout.statistics.display());

        Ok(Some(stats))
    }

    /// Append one pipe-delimited line to the failure log. Write-only; the
    /// pipeline never reads it back.
    async fn log_failure(&self, row: &BatchRow, err: &DownloadError) {
        let line = format!(
            "{}|{}|{}|{}\n",
            Utc::now().to_rfc3339(),
            row.url,
            row.subject,
            err
        );

        let result = async {
            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.layout.failed_log)
                .await?;
            file.write_all(line.as_bytes()).await
        }
        .await;

        if let Err(write_err) = result {
            warn!(
                "Could not record failure for {} in {}: {}",
                row.url,
                self.layout.failed_log.display(),
                write_err
            );
        }
    }
}

/// Resolves when the user hits ctrl-c. If the signal handler cannot be
/// installed the future never resolves, so a registration failure cannot be
/// mistaken for an interrupt.
async fn interrupt_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}

async fn write_record(path: &Path, record: &VideoRecord) -> Result<(), DownloadError> {
    let json = serde_json::to_string_pretty(record)?;
    tokio::fs::write(path, json).await?;
    Ok(())
}

/// Read and parse the input CSV. A missing file abandons the batch before any
/// row is processed.
async fn read_batch_csv(path: &Path) -> Result<Vec<BatchRow>> {
    if !path.exists() {
        bail!("video list file not found: {}", path.display());
    }

    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;

    parse_batch_csv(&content)
}

const EXPECTED_HEADER: [&str; 4] = ["url", "subject", "difficulty", "source"];

fn parse_batch_csv(content: &str) -> Result<Vec<BatchRow>> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let mut lines = content.lines();

    let header = lines.next().ok_or_else(|| anyhow!("CSV file is empty"))?;
    let header_fields = parse_csv_record(header);
    if header_fields != EXPECTED_HEADER {
        bail!(
            "unexpected CSV header {:?}: expected url,subject,difficulty,source",
            header_fields
        );
    }

    let mut rows = Vec::new();
    for (lineno, line) in lines.enumerate() {
        if line.trim().is_empty() {
            continue;
        }

        let fields = parse_csv_record(line);
        if fields.len() != 4 {
            bail!(
                "row {}: expected 4 fields, found {}",
                lineno + 2,
                fields.len()
            );
        }

        let mut fields = fields.into_iter();
        rows.push(BatchRow {
            url: fields.next().unwrap_or_default(),
            subject: fields.next().unwrap_or_default(),
            difficulty: fields.next().unwrap_or_default(),
            source: fields.next().unwrap_or_default(),
        });
    }

    Ok(rows)
}

/// Split one CSV line into fields, honoring double-quoted fields and doubled
/// quotes inside them. Small batches, no streaming needed.
fn parse_csv_record(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' if field.is_empty() => in_quotes = true,
            ',' if !in_quotes => fields.push(std::mem::take(&mut field)),
            _ => field.push(c),
        }
    }
    fields.push(field);

    fields
}
