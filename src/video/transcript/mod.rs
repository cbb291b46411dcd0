//! Per-phrase subtitle timing.
//!
//! Timing comes from the speech-to-text collaborator when it cooperates and
//! from an even split of the script's phrases otherwise. Resolution never
//! fails: every transcriber problem turns into the fallback.

mod phrases;
mod whisper;

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

use crate::ui::prelude::{Level, emit};

use phrases::{even_split, split_phrases};
pub use whisper::CommandTranscriber;

#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptSegment {
    pub text: String,
    pub start: f64,
    pub end: f64,
}

impl TranscriptSegment {
    pub fn new(text: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            text: text.into(),
            start,
            end,
        }
    }
}

#[derive(Error, Debug)]
pub enum TranscriptionError {
    #[error("no transcriber is configured")]
    NotConfigured,

    #[error("failed to launch transcriber: {0}")]
    Launch(#[from] std::io::Error),

    #[error("transcriber exited with status {code:?}: {detail}")]
    ExitStatus { code: Option<i32>, detail: String },

    #[error("transcriber output is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("transcriber reported an error: {0}")]
    Reported(String),

    #[error("transcriber returned no usable segments")]
    Empty,

    #[error("transcriber did not finish within {seconds}s")]
    Timeout { seconds: u64 },
}

/// Speech-to-text collaborator: (audio path, language) to timed segments.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(
        &self,
        audio_path: &Path,
        language: &str,
    ) -> Result<Vec<TranscriptSegment>, TranscriptionError>;
}

/// Used when no transcriber is configured; always takes the fallback path.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTranscriber;

#[async_trait]
impl Transcriber for NoTranscriber {
    async fn transcribe(
        &self,
        _audio_path: &Path,
        _language: &str,
    ) -> Result<Vec<TranscriptSegment>, TranscriptionError> {
        Err(TranscriptionError::NotConfigured)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimingSource {
    Transcript,
    EvenSplit,
}

#[derive(Debug, Clone)]
pub struct TimingResolution {
    pub segments: Vec<TranscriptSegment>,
    pub source: TimingSource,
}

pub async fn resolve_timing(
    transcriber: &dyn Transcriber,
    audio_path: &Path,
    language: &str,
    script: &str,
    total_duration: f64,
) -> TimingResolution {
    let absolute = std::fs::canonicalize(audio_path).unwrap_or_else(|_| audio_path.to_path_buf());

    let transcribed = transcriber
        .transcribe(&absolute, language)
        .await
        .and_then(|raw| normalize_segments(raw, total_duration));

    match transcribed {
        Ok(segments) => {
            emit(
                Level::Info,
                "render.timing.transcript",
                &format!("Using {} transcribed segments for subtitles", segments.len()),
                None,
            );
            TimingResolution {
                segments,
                source: TimingSource::Transcript,
            }
        }
        Err(err) => {
            let level = if matches!(err, TranscriptionError::NotConfigured) {
                Level::Debug
            } else {
                Level::Warn
            };
            emit(
                level,
                "render.timing.fallback",
                &format!("Transcription unavailable ({err}); timing subtitles from the script"),
                None,
            );
            TimingResolution {
                segments: even_split(&split_phrases(script), total_duration),
                source: TimingSource::EvenSplit,
            }
        }
    }
}

/// Trim texts, drop empty ones, clamp into `[0, total]` and order by start.
fn normalize_segments(
    raw: Vec<TranscriptSegment>,
    total_duration: f64,
) -> Result<Vec<TranscriptSegment>, TranscriptionError> {
    let mut segments: Vec<TranscriptSegment> = raw
        .into_iter()
        .filter_map(|segment| {
            let text = segment.text.trim();
            if text.is_empty() || !segment.start.is_finite() || !segment.end.is_finite() {
                return None;
            }
            let start = segment.start.clamp(0.0, total_duration);
            let end = segment.end.clamp(start, total_duration);
            Some(TranscriptSegment::new(text, start, end))
        })
        .collect();

    if segments.is_empty() {
        return Err(TranscriptionError::Empty);
    }

    segments.sort_by(|a, b| a.start.total_cmp(&b.start));
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::testing::FakeTranscriber;
    use std::path::PathBuf;

    #[tokio::test]
    async fn failing_transcriber_falls_back_to_even_split() {
        let transcriber = FakeTranscriber::failing();
        let resolution = resolve_timing(
            &transcriber,
            &PathBuf::from("voice.mp3"),
            "en",
            "Hello world. This is great!",
            30.0,
        )
        .await;

        assert_eq!(resolution.source, TimingSource::EvenSplit);
        assert_eq!(resolution.segments.len(), 2);
        assert_eq!(resolution.segments[0].text, "Hello world.");
        assert_eq!(resolution.segments[1].end, 30.0);
    }

    #[tokio::test]
    async fn transcript_segments_are_trimmed_and_clamped() {
        let transcriber = FakeTranscriber::returning(vec![
            TranscriptSegment::new(" second ", 4.0, 12.0),
            TranscriptSegment::new("first", -1.0, 4.0),
            TranscriptSegment::new("   ", 12.0, 13.0),
        ]);
        let resolution =
            resolve_timing(&transcriber, &PathBuf::from("voice.mp3"), "vi", "unused", 10.0).await;

        assert_eq!(resolution.source, TimingSource::Transcript);
        assert_eq!(
            resolution.segments,
            vec![
                TranscriptSegment::new("first", 0.0, 4.0),
                TranscriptSegment::new("second", 4.0, 10.0),
            ]
        );
        assert_eq!(transcriber.languages(), vec!["vi".to_string()]);
    }

    #[tokio::test]
    async fn blank_transcript_counts_as_unavailable() {
        let transcriber = FakeTranscriber::returning(vec![TranscriptSegment::new(" ", 0.0, 1.0)]);
        let resolution =
            resolve_timing(&transcriber, &PathBuf::from("a.mp3"), "en", "One. Two. Three.", 9.0)
                .await;

        assert_eq!(resolution.source, TimingSource::EvenSplit);
        let starts: Vec<f64> = resolution.segments.iter().map(|s| s.start).collect();
        assert_eq!(starts, vec![0.0, 3.0, 6.0]);
    }

    #[tokio::test]
    async fn empty_script_without_transcript_yields_no_segments() {
        let resolution =
            resolve_timing(&NoTranscriber, &PathBuf::from("a.mp3"), "en", "  ", 9.0).await;
        assert!(resolution.segments.is_empty());
    }
}
