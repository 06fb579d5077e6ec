use anyhow::Result;
use regex::Regex;
use std::path::Path;
use tracing::debug;

/// Result of scanning for a manual subtitle file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptStatus {
    /// A subtitle file was found, copied, and parsed to plain text
    Extracted { chars: usize },
    /// No subtitle file matched the video's prefix
    NotFound,
}

impl TranscriptStatus {
    pub fn found(&self) -> bool {
        matches!(self, TranscriptStatus::Extracted { .. })
    }
}

/// Scan the videos directory for a subtitle file belonging to one video and
/// materialize the transcript pair under the transcripts directory.
///
/// When several subtitle files match the `{index:03}_{id}` prefix the
/// lexicographically first filename wins, so the pick is stable across
/// platforms and runs. A file that parses to an empty string still produces
/// both destination files.
pub async fn extract_transcript(
    videos_dir: &Path,
    transcripts_dir: &Path,
    video_index: u64,
    video_id: &str,
) -> Result<TranscriptStatus> {
    let prefix = format!("{:03}_{}", video_index, video_id);

    let mut candidates = Vec::new();
    let mut entries = tokio::fs::read_dir(videos_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with(&prefix) && name.ends_with(".vtt") {
            candidates.push(entry.path());
        }
    }

    if candidates.is_empty() {
        return Ok(TranscriptStatus::NotFound);
    }

    candidates.sort();
    let source = &candidates[0];
    debug!("📜 Using subtitle file: {}", source.display());

    let raw = tokio::fs::read_to_string(source).await?;

    let vtt_dest = transcripts_dir.join(format!("{}_transcript.vtt", prefix));
    let txt_dest = transcripts_dir.join(format!("{}_transcript.txt", prefix));

    tokio::fs::write(&vtt_dest, &raw).await?;

    let text = parse_vtt(&raw);
    tokio::fs::write(&txt_dest, &text).await?;

    Ok(TranscriptStatus::Extracted { chars: text.len() })
}

/// Flatten WebVTT content into a single space-joined plain-text string.
///
/// Drops the format header, timing lines, numeric cue indices, blank lines,
/// and `Kind:`/`Language:` metadata lines; strips angle-bracket markup from
/// the rest. Overlapping cues that repeat text are kept as-is.
pub fn parse_vtt(content: &str) -> String {
    let tag_pattern = Regex::new(r"<[^>]+>").ok();
    let mut transcript = Vec::new();

    for line in content.lines() {
        let line = line.trim();

        if line.is_empty()
            || line.starts_with("WEBVTT")
            || line.contains("-->")
            || line.chars().all(|c| c.is_ascii_digit())
            || line.starts_with("Kind:")
            || line.starts_with("Language:")
        {
            continue;
        }

        let stripped = match &tag_pattern {
            Some(re) => re.replace_all(line, "").to_string(),
            None => line.to_string(),
        };

        let stripped = stripped.trim();
        if stripped.is_empty() {
            continue;
        }

        transcript.push(stripped.to_string());
    }

    transcript.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE_VTT: &str =
        "WEBVTT\n\n1\n00:00:00.000 --> 00:00:02.000\nHello <c>world</c>\n";

    #[test]
    fn test_parse_vtt_strips_cue_markup() {
        assert_eq!(parse_vtt(SAMPLE_VTT), "Hello world");
    }

    #[test]
    fn test_parse_vtt_cue_only_file_is_empty() {
        let content = "WEBVTT\n\n1\n00:00:00.000 --> 00:00:02.000\n\n2\n00:00:02.000 --> 00:00:04.000\n";
        assert_eq!(parse_vtt(content), "");
    }

    #[test]
    fn test_parse_vtt_skips_metadata_lines() {
        let content = "WEBVTT\nKind: captions\nLanguage: en\n\n00:00:00.000 --> 00:00:02.000\nFirst line\n\n00:00:02.000 --> 00:00:04.000\nSecond line\n";
        assert_eq!(parse_vtt(content), "First line Second line");
    }

    #[test]
    fn test_parse_vtt_drops_lines_empty_after_stripping() {
        let content = "WEBVTT\n\n00:00:00.000 --> 00:00:02.000\n<v Speaker></v>\nSpoken words\n";
        assert_eq!(parse_vtt(content), "Spoken words");
    }

    #[test]
    fn test_parse_vtt_keeps_repeated_overlapping_text() {
        let content = "WEBVTT\n\n00:00:00.000 --> 00:00:02.000\nso today\n\n00:00:01.000 --> 00:00:03.000\nso today we cover\n";
        assert_eq!(parse_vtt(content), "so today so today we cover");
    }

    #[tokio::test]
    async fn test_extract_reports_not_found_without_subtitles() {
        let tmp = TempDir::new().unwrap();
        let videos = tmp.path().join("videos");
        let transcripts = tmp.path().join("transcripts");
        tokio::fs::create_dir_all(&videos).await.unwrap();
        tokio::fs::create_dir_all(&transcripts).await.unwrap();

        tokio::fs::write(videos.join("001_ab12cd34ef56.mp4"), b"media")
            .await
            .unwrap();

        let status = extract_transcript(&videos, &transcripts, 1, "ab12cd34ef56")
            .await
            .unwrap();

        assert_eq!(status, TranscriptStatus::NotFound);
        assert!(!transcripts.join("001_ab12cd34ef56_transcript.vtt").exists());
    }

    #[tokio::test]
    async fn test_extract_copies_and_parses_subtitle() {
        let tmp = TempDir::new().unwrap();
        let videos = tmp.path().join("videos");
        let transcripts = tmp.path().join("transcripts");
        tokio::fs::create_dir_all(&videos).await.unwrap();
        tokio::fs::create_dir_all(&transcripts).await.unwrap();

        tokio::fs::write(videos.join("001_ab12cd34ef56.en.vtt"), SAMPLE_VTT)
            .await
            .unwrap();

        let status = extract_transcript(&videos, &transcripts, 1, "ab12cd34ef56")
            .await
            .unwrap();

        assert_eq!(
            status,
            TranscriptStatus::Extracted {
                chars: "Hello world".len()
            }
        );

        let vtt = tokio::fs::read_to_string(transcripts.join("001_ab12cd34ef56_transcript.vtt"))
            .await
            .unwrap();
        assert_eq!(vtt, SAMPLE_VTT);

        let txt = tokio::fs::read_to_string(transcripts.join("001_ab12cd34ef56_transcript.txt"))
            .await
            .unwrap();
        assert_eq!(txt, "Hello world");
    }

    #[tokio::test]
    async fn test_extract_tie_break_is_lexicographic() {
        let tmp = TempDir::new().unwrap();
        let videos = tmp.path().join("videos");
        let transcripts = tmp.path().join("transcripts");
        tokio::fs::create_dir_all(&videos).await.unwrap();
        tokio::fs::create_dir_all(&transcripts).await.unwrap();

        tokio::fs::write(
            videos.join("001_ab12cd34ef56.en-GB.vtt"),
            "WEBVTT\n\n00:00:00.000 --> 00:00:01.000\nbritish\n",
        )
        .await
        .unwrap();
        tokio::fs::write(
            videos.join("001_ab12cd34ef56.en.vtt"),
            "WEBVTT\n\n00:00:00.000 --> 00:00:01.000\nplain\n",
        )
        .await
        .unwrap();

        extract_transcript(&videos, &transcripts, 1, "ab12cd34ef56")
            .await
            .unwrap();

        let txt = tokio::fs::read_to_string(transcripts.join("001_ab12cd34ef56_transcript.txt"))
            .await
            .unwrap();
        // "001_ab12cd34ef56.en-GB.vtt" sorts before "001_ab12cd34ef56.en.vtt"
        assert_eq!(txt, "british");
    }

    #[tokio::test]
    async fn test_extract_empty_transcript_still_writes_files() {
        let tmp = TempDir::new().unwrap();
        let videos = tmp.path().join("videos");
        let transcripts = tmp.path().join("transcripts");
        tokio::fs::create_dir_all(&videos).await.unwrap();
        tokio::fs::create_dir_all(&transcripts).await.unwrap();

        tokio::fs::write(
            videos.join("002_ab12cd34ef56.en.vtt"),
            "WEBVTT\n\n1\n00:00:00.000 --> 00:00:02.000\n",
        )
        .await
        .unwrap();

        let status = extract_transcript(&videos, &transcripts, 2, "ab12cd34ef56")
            .await
            .unwrap();

        assert_eq!(status, TranscriptStatus::Extracted { chars: 0 });
        let txt = tokio::fs::read_to_string(transcripts.join("002_ab12cd34ef56_transcript.txt"))
            .await
            .unwrap();
        assert_eq!(txt, "");
        assert!(transcripts.join("002_ab12cd34ef56_transcript.vtt").exists());
    }

    #[tokio::test]
    async fn test_extract_ignores_other_videos_subtitles() {
        let tmp = TempDir::new().unwrap();
        let videos = tmp.path().join("videos");
        let transcripts = tmp.path().join("transcripts");
        tokio::fs::create_dir_all(&videos).await.unwrap();
        tokio::fs::create_dir_all(&transcripts).await.unwrap();

        tokio::fs::write(videos.join("001_aaaaaaaaaaaa.en.vtt"), SAMPLE_VTT)
            .await
            .unwrap();

        let status = extract_transcript(&videos, &transcripts, 2, "bbbbbbbbbbbb")
            .await
            .unwrap();

        assert_eq!(status, TranscriptStatus::NotFound);
    }
}
