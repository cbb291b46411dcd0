//! In-process stand-ins for ffmpeg, ffprobe and the transcriber.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;

use super::support::ffmpeg::{FfmpegRunOptions, FfmpegRunner, MediaProbe};
use super::transcript::{TranscriptSegment, Transcriber, TranscriptionError};

pub struct FakeProbe {
    duration: Option<f64>,
}

impl FakeProbe {
    pub fn with_duration(seconds: f64) -> Self {
        Self {
            duration: Some(seconds),
        }
    }

    pub fn failing() -> Self {
        Self { duration: None }
    }
}

#[async_trait]
impl MediaProbe for FakeProbe {
    async fn duration_seconds(&self, path: &Path) -> Result<f64> {
        self.duration
            .ok_or_else(|| anyhow!("cannot read {}", path.display()))
    }
}

pub struct FakeTranscriber {
    segments: Option<Vec<TranscriptSegment>>,
    languages: Mutex<Vec<String>>,
}

impl FakeTranscriber {
    pub fn failing() -> Self {
        Self {
            segments: None,
            languages: Mutex::new(Vec::new()),
        }
    }

    pub fn returning(segments: Vec<TranscriptSegment>) -> Self {
        Self {
            segments: Some(segments),
            languages: Mutex::new(Vec::new()),
        }
    }

    pub fn languages(&self) -> Vec<String> {
        self.languages.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe(
        &self,
        _audio_path: &Path,
        language: &str,
    ) -> Result<Vec<TranscriptSegment>, TranscriptionError> {
        self.languages.lock().unwrap().push(language.to_string());
        self.segments
            .clone()
            .ok_or_else(|| TranscriptionError::Reported("model not installed".to_string()))
    }
}

/// Records every invocation; succeeds by writing a placeholder at the last
/// argument (the output path) unless a failure marker or stage matches.
#[derive(Default)]
pub struct FakeRunner {
    calls: Mutex<Vec<(String, Vec<String>)>>,
    fail_markers: Vec<String>,
    fail_stages: Vec<&'static str>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every invocation with an argument containing `marker`.
    pub fn failing_on(mut self, marker: &str) -> Self {
        self.fail_markers.push(marker.to_string());
        self
    }

    /// Fail every invocation made for `stage`.
    pub fn failing_stage(mut self, stage: &'static str) -> Self {
        self.fail_stages.push(stage);
        self
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, args)| args.clone())
            .collect()
    }

    pub fn stages(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(stage, _)| stage.clone())
            .collect()
    }

    pub fn calls_for(&self, stage: &str) -> Vec<Vec<String>> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(s, _)| s == stage)
            .map(|(_, args)| args.clone())
            .collect()
    }

    /// Value following the first `flag` in each call that has it.
    pub fn flag_values(&self, flag: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|args| {
                let pos = args.iter().position(|a| a == flag)?;
                args.get(pos + 1).cloned()
            })
            .collect()
    }
}

#[async_trait]
impl FfmpegRunner for FakeRunner {
    async fn run(&self, args: &[String], options: FfmpegRunOptions) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push((options.stage.to_string(), args.to_vec()));

        if self.fail_stages.contains(&options.stage) {
            bail!("simulated failure in stage '{}'", options.stage);
        }

        if let Some(marker) = self
            .fail_markers
            .iter()
            .find(|marker| args.iter().any(|arg| arg.contains(marker.as_str())))
        {
            bail!("simulated failure on '{marker}'");
        }

        let output = PathBuf::from(args.last().ok_or_else(|| anyhow!("no output argument"))?);
        std::fs::write(&output, b"fake media")?;
        Ok(())
    }
}

/// Read one token the way libavutil's `av_get_token` does: `\` escapes the
/// next character, `'...'` is copied literally, any of `delims` ends it.
/// Returns the token and the unread input, starting at the delimiter.
fn filter_token<'a>(input: &'a str, delims: &str) -> (String, &'a str) {
    let mut token = String::new();
    let mut chars = input.char_indices();
    while let Some((idx, ch)) = chars.next() {
        if delims.contains(ch) {
            return (token, &input[idx..]);
        }
        match ch {
            '\\' => {
                if let Some((_, next)) = chars.next() {
                    token.push(next);
                }
            }
            '\'' => {
                for (_, quoted) in chars.by_ref() {
                    if quoted == '\'' {
                        break;
                    }
                    token.push(quoted);
                }
            }
            _ => token.push(ch),
        }
    }
    (token, "")
}

/// Options of a single `name=key=value:...` filter after both the graph
/// and the option level have unescaped them.
pub fn parse_filter_options(filter: &str) -> Vec<(String, String)> {
    let (_, args) = filter.split_once('=').expect("filter without options");
    let (args, _) = filter_token(args, "[],;");

    let mut options = Vec::new();
    let mut rest = args.as_str();
    while !rest.is_empty() {
        let (key, after_key) = rest.split_once('=').expect("option without a key");
        let (value, after_value) = filter_token(after_key, ":");
        options.push((key.to_string(), value));
        rest = after_value.strip_prefix(':').unwrap_or(after_value);
    }
    options
}
