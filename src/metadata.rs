use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::downloader::BatchRow;
use crate::fetch::VideoInfo;

/// Hard cap on the stored description length, in characters.
pub const MAX_DESCRIPTION_CHARS: usize = 500;

/// Hard cap on the number of stored tags.
pub const MAX_TAGS: usize = 10;

/// Metadata recorded for a single collected video.
///
/// One record is written per video as `{index:03}_{id}_metadata.json` and the
/// same record is appended to the collection log. Records are immutable once
/// appended, except for `needs_whisper_transcription` which is settled after
/// transcript extraction by rewriting the per-video file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VideoRecord {
    /// Sequence position in the collection, monotonic across runs
    pub video_index: u64,

    /// Deterministic identifier derived from the source URL
    pub video_id: String,

    /// Canonical URL reported by the fetcher (input URL when absent)
    pub url: String,

    pub title: String,

    /// Duration in seconds
    pub duration: u64,

    pub upload_date: String,
    pub uploader: String,
    pub uploader_id: String,
    pub channel: String,
    pub view_count: u64,
    pub like_count: u64,

    /// Truncated to `MAX_DESCRIPTION_CHARS` characters
    pub description: String,

    /// Truncated to the first `MAX_TAGS` entries
    pub tags: Vec<String>,

    pub categories: Vec<String>,

    /// "WxH" string, "0x0" when the fetcher reported no dimensions
    pub resolution: String,

    pub fps: f64,
    pub vcodec: String,
    pub acodec: String,
    pub filesize: u64,

    /// True iff the fetcher reported a manual subtitle track in one of the
    /// requested languages
    pub has_manual_subtitles: bool,

    /// True iff no manual subtitle file was found on disk after download
    pub needs_whisper_transcription: bool,

    /// On-disk media filename, `{index:03}_{id}.{container}`
    pub filename: String,

    // Caller annotations, carried through from the input CSV
    pub subject: String,
    pub difficulty: String,
    pub source: String,

    pub download_date: DateTime<Utc>,
}

/// Derive the 12-character identifier for a source URL.
///
/// First 12 lowercase hex characters of the MD5 digest of the URL bytes.
/// Used both as the dedup key and as a filename component, so it must stay
/// stable across runs.
pub fn video_id(url: &str) -> String {
    let digest = md5::compute(url.as_bytes());
    format!("{:x}", digest)[..12].to_string()
}

/// Map a fetcher info record plus the caller annotations into a `VideoRecord`.
///
/// Missing fields degrade to defaults ("Unknown", 0, empty) instead of
/// propagating absence. Numeric ranges are not validated.
pub fn extract_metadata(
    info: &VideoInfo,
    row: &BatchRow,
    video_index: u64,
    video_id: &str,
    subtitle_languages: &[String],
    container: &str,
) -> VideoRecord {
    let description = info
        .description
        .as_deref()
        .map(|text| truncate_chars(text, MAX_DESCRIPTION_CHARS))
        .unwrap_or_default();

    let has_manual_subtitles = subtitle_languages
        .iter()
        .any(|lang| info.subtitles.contains_key(lang));

    VideoRecord {
        video_index,
        video_id: video_id.to_string(),
        url: info.webpage_url.clone().unwrap_or_else(|| row.url.clone()),
        title: info.title.clone().unwrap_or_else(|| "Unknown".to_string()),
        duration: info.duration.unwrap_or(0.0).round() as u64,
        upload_date: info.upload_date.clone().unwrap_or_default(),
        uploader: info.uploader.clone().unwrap_or_else(|| "Unknown".to_string()),
        uploader_id: info.uploader_id.clone().unwrap_or_default(),
        channel: info.channel.clone().unwrap_or_else(|| "Unknown".to_string()),
        view_count: info.view_count.unwrap_or(0),
        like_count: info.like_count.unwrap_or(0),
        description,
        tags: info.tags.iter().take(MAX_TAGS).cloned().collect(),
        categories: info.categories.clone(),
        resolution: format!("{}x{}", info.width.unwrap_or(0), info.height.unwrap_or(0)),
        fps: info.fps.unwrap_or(0.0),
        vcodec: info.vcodec.clone().unwrap_or_default(),
        acodec: info.acodec.clone().unwrap_or_default(),
        filesize: info.filesize.unwrap_or(0),
        has_manual_subtitles,
        needs_whisper_transcription: false,
        filename: format!("{:03}_{}.{}", video_index, video_id, container),
        subject: row.subject.clone(),
        difficulty: row.difficulty.clone(),
        source: row.source.clone(),
        download_date: Utc::now(),
    }
}

/// Truncate on a character boundary, never mid-codepoint.
fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
