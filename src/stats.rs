use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::metadata::VideoRecord;

/// Derived, disposable snapshot over the collection log.
///
/// Histogram keys are whatever annotation strings appear in the records; no
/// fixed enumeration. BTreeMap keeps the JSON output deterministically
/// ordered.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CollectionStats {
    pub total_videos: usize,
    pub by_subject: BTreeMap<String, usize>,
    pub by_difficulty: BTreeMap<String, usize>,
    pub by_source: BTreeMap<String, usize>,
    pub total_duration_hours: f64,
    pub avg_duration_minutes: f64,
    pub with_manual_subtitles: usize,
    pub needs_whisper: usize,
}

impl CollectionStats {
    /// Recompute the snapshot from the full record list.
    ///
    /// `None` on an empty log; callers must not report or persist anything in
    /// that case, which also keeps the averages free of division by zero.
    pub fn compute(records: &[VideoRecord]) -> Option<Self> {
        if records.is_empty() {
            return None;
        }

        let mut by_subject: BTreeMap<String, usize> = BTreeMap::new();
        let mut by_difficulty: BTreeMap<String, usize> = BTreeMap::new();
        let mut by_source: BTreeMap<String, usize> = BTreeMap::new();
        let mut total_duration_secs: u64 = 0;
        let mut with_manual_subtitles = 0;
        let mut needs_whisper = 0;

        for record in records {
            *by_subject.entry(record.subject.clone()).or_insert(0) += 1;
            *by_difficulty.entry(record.difficulty.clone()).or_insert(0) += 1;
            *by_source.entry(record.source.clone()).or_insert(0) += 1;

            total_duration_secs += record.duration;

            if record.has_manual_subtitles {
                with_manual_subtitles += 1;
            }
            if record.needs_whisper_transcription {
                needs_whisper += 1;
            }
        }

        let total_duration_hours = total_duration_secs as f64 / 3600.0;
        let avg_duration_minutes = total_duration_hours * 60.0 / records.len() as f64;

        Some(Self {
            total_videos: records.len(),
            by_subject,
            by_difficulty,
            by_source,
            total_duration_hours,
            avg_duration_minutes,
            with_manual_subtitles,
            needs_whisper,
        })
    }

    /// Share of `count` over the collection, as a percentage.
    pub fn percent_of(&self, count: usize) -> f64 {
        count as f64 * 100.0 / self.total_videos as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::BatchRow;
    use crate::fetch::VideoInfo;
    use crate::metadata::{extract_metadata, video_id};

    fn record(url: &str, subject: &str, difficulty: &str, duration: f64, subs: bool) -> VideoRecord {
        let row = BatchRow {
            url: url.to_string(),
            subject: subject.to_string(),
            difficulty: difficulty.to_string(),
            source: "youtube".to_string(),
        };
        let info = VideoInfo {
            duration: Some(duration),
            subtitles: if subs {
                [("en".to_string(), serde_json::json!([]))].into_iter().collect()
            } else {
                Default::default()
            },
            ..VideoInfo::default()
        };
        let id = video_id(url);
        let mut rec = extract_metadata(&info, &row, 1, &id, &["en".to_string()], "mp4");
        rec.needs_whisper_transcription = !subs;
        rec
    }

    #[test]
    fn test_empty_log_yields_none() {
        assert!(CollectionStats::compute(&[]).is_none());
    }

    #[test]
    fn test_histograms_count_distinct_keys() {
        let records = vec![
            record("https://example.com/a", "math", "beginner", 600.0, true),
            record("https://example.com/b", "math", "advanced", 600.0, false),
            record("https://example.com/c", "physics", "beginner", 600.0, true),
        ];

        let stats = CollectionStats::compute(&records).unwrap();

        assert_eq!(stats.total_videos, 3);
        assert_eq!(stats.by_subject["math"], 2);
        assert_eq!(stats.by_subject["physics"], 1);
        assert_eq!(stats.by_difficulty["beginner"], 2);
        assert_eq!(stats.by_source["youtube"], 3);
    }

    #[test]
    fn test_duration_aggregates() {
        let records = vec![
            record("https://example.com/a", "math", "beginner", 1800.0, true),
            record("https://example.com/b", "math", "beginner", 5400.0, true),
        ];

        let stats = CollectionStats::compute(&records).unwrap();

        assert!((stats.total_duration_hours - 2.0).abs() < 1e-9);
        assert!((stats.avg_duration_minutes - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_subtitle_and_whisper_counts() {
        let records = vec![
            record("https://example.com/a", "math", "beginner", 60.0, true),
            record("https://example.com/b", "math", "beginner", 60.0, false),
            record("https://example.com/c", "math", "beginner", 60.0, false),
        ];

        let stats = CollectionStats::compute(&records).unwrap();

        assert_eq!(stats.with_manual_subtitles, 1);
        assert_eq!(stats.needs_whisper, 2);
        assert!((stats.percent_of(stats.needs_whisper) - 66.666).abs() < 0.01);
    }
}
