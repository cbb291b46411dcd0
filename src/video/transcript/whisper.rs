use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;

use crate::ui::prelude::{Level, emit};
use crate::video::config::TranscriberCommand;

use super::{TranscriptSegment, Transcriber, TranscriptionError};

/// Document printed by the transcription program on stdout.
#[derive(Debug, Deserialize)]
struct TranscriberOutput {
    #[serde(default)]
    segments: Vec<TranscriberSegment>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TranscriberSegment {
    #[serde(default)]
    text: String,
    #[serde(default)]
    start: Seconds,
    #[serde(default)]
    end: Seconds,
}

/// Timestamps arrive as numbers, though some scripts stringify them.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Seconds {
    Number(f64),
    Text(String),
}

impl Default for Seconds {
    fn default() -> Self {
        Seconds::Number(0.0)
    }
}

impl Seconds {
    fn value(&self) -> f64 {
        match self {
            Seconds::Number(value) => *value,
            Seconds::Text(text) => text.trim().parse().unwrap_or(f64::NAN),
        }
    }
}

/// Parse transcriber stdout into segments.
///
/// Diagnostic lines before the JSON document are tolerated: when the whole
/// output is not a document, the last line that parses as one is used.
pub fn parse_transcriber_output(stdout: &str) -> Result<Vec<TranscriptSegment>, TranscriptionError> {
    let output = parse_document(stdout)?;

    if let Some(error) = output.error.filter(|e| !e.trim().is_empty()) {
        return Err(TranscriptionError::Reported(error));
    }

    Ok(output
        .segments
        .into_iter()
        .map(|segment| {
            TranscriptSegment::new(segment.text.trim(), segment.start.value(), segment.end.value())
        })
        .collect())
}

fn parse_document(stdout: &str) -> Result<TranscriberOutput, TranscriptionError> {
    match serde_json::from_str::<TranscriberOutput>(stdout.trim()) {
        Ok(output) => Ok(output),
        Err(whole_err) => stdout
            .lines()
            .rev()
            .map(str::trim)
            .filter(|line| line.starts_with('{'))
            .find_map(|line| serde_json::from_str::<TranscriberOutput>(line).ok())
            .ok_or(TranscriptionError::Malformed(whole_err)),
    }
}

/// Runs an external speech-to-text program as
/// `program [args..] <absolute audio path> <language>`.
#[derive(Debug, Clone)]
pub struct CommandTranscriber {
    command: TranscriberCommand,
    timeout: Option<Duration>,
}

impl CommandTranscriber {
    pub fn new(command: TranscriberCommand, timeout: Option<Duration>) -> Self {
        Self { command, timeout }
    }
}

#[async_trait]
impl Transcriber for CommandTranscriber {
    async fn transcribe(
        &self,
        audio_path: &Path,
        language: &str,
    ) -> Result<Vec<TranscriptSegment>, TranscriptionError> {
        emit(
            Level::Info,
            "render.transcribe.start",
            &format!("Transcribing {} ({language})", audio_path.display()),
            None,
        );

        let mut command = Command::new(&self.command.program);
        command
            .args(&self.command.args)
            .arg(audio_path)
            .arg(language)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = match self.timeout {
            None => command.output().await?,
            Some(limit) => tokio::time::timeout(limit, command.output())
                .await
                .map_err(|_| TranscriptionError::Timeout {
                    seconds: limit.as_secs(),
                })??,
        };

        let stdout = String::from_utf8_lossy(&output.stdout);

        if !output.status.success() {
            let detail = match parse_document(&stdout) {
                Ok(doc) => doc.error.unwrap_or_default(),
                Err(_) => String::from_utf8_lossy(&output.stderr)
                    .lines()
                    .last()
                    .unwrap_or_default()
                    .to_string(),
            };
            return Err(TranscriptionError::ExitStatus {
                code: output.status.code(),
                detail,
            });
        }

        parse_transcriber_output(&stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_segments_and_ignores_words() {
        let json = r#"
        {
            "text": "Hello world. Next phrase.",
            "segments": [
                {
                    "text": " Hello world. ",
                    "start": 0.0,
                    "end": 2.0,
                    "words": [
                        {"text": "Hello", "start": "0.0", "end": "0.5"},
                        {"text": "world.", "start": "0.6", "end": "1.0"}
                    ]
                },
                {"text": "Next phrase.", "start": 2.0, "end": 4.5}
            ]
        }
        "#;

        let segments = parse_transcriber_output(json).expect("parse json");

        assert_eq!(
            segments,
            vec![
                TranscriptSegment::new("Hello world.", 0.0, 2.0),
                TranscriptSegment::new("Next phrase.", 2.0, 4.5),
            ]
        );
    }

    #[test]
    fn reported_errors_are_failures() {
        let json = r#"{"error": "Failed to import required modules: whisper", "text": "", "segments": []}"#;
        assert!(matches!(
            parse_transcriber_output(json),
            Err(TranscriptionError::Reported(msg)) if msg.contains("whisper")
        ));
    }

    #[test]
    fn diagnostic_lines_before_the_document_are_skipped() {
        let stdout = "Added venv to Python path\nUsing device: cpu\n{\"text\": \"x\", \"segments\": [{\"text\": \"x\", \"start\": \"1.5\", \"end\": 2}]}\n";
        let segments = parse_transcriber_output(stdout).unwrap();
        assert_eq!(segments, vec![TranscriptSegment::new("x", 1.5, 2.0)]);
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(
            parse_transcriber_output("Traceback (most recent call last):"),
            Err(TranscriptionError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn missing_program_is_a_launch_failure() {
        let transcriber = CommandTranscriber::new(
            TranscriberCommand {
                program: "shortgen-test-no-such-transcriber".to_string(),
                args: Vec::new(),
            },
            Some(Duration::from_secs(5)),
        );
        let result = transcriber.transcribe(Path::new("/tmp/a.mp3"), "en").await;
        assert!(matches!(result, Err(TranscriptionError::Launch(_))));
    }
}
