use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::common::paths;

use super::preset::FormatKind;

/// External transcription program invoked as `program [args..] <audio> <language>`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TranscriberCommand {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

/// Encoder knobs shared by every stage that re-encodes video or audio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeSettings {
    pub x264_preset: String,
    pub crf: u8,
    pub audio_bitrate: String,
}

impl Default for EncodeSettings {
    fn default() -> Self {
        RenderSettings::default().encode_settings()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    /// ffmpeg executable used for every encoding stage
    pub ffmpeg_program: String,
    /// ffprobe executable used to read the narration duration
    pub ffprobe_program: String,
    /// Language code passed to the transcriber when a request does not name one
    pub default_language: String,
    /// Preset selected when the caller does not choose one
    pub default_format: FormatKind,
    /// Root under which `<request_id>/video` and `<request_id>/script` are written
    pub content_dir: Option<PathBuf>,
    pub fps: u32,
    /// x264 speed/quality preset
    pub x264_preset: String,
    pub crf: u8,
    pub audio_bitrate: String,
    /// Per-stage limit for ffmpeg invocations in seconds (0 disables)
    pub stage_timeout_secs: u64,
    /// Limit for the transcriber in seconds (0 disables)
    pub transcriber_timeout_secs: u64,
    /// Title wrap width in characters
    pub title_max_line_chars: usize,
    pub font_family: String,
    /// Font file handed to drawtext; fontconfig lookup of `font_family` is used otherwise
    pub font_file: Option<PathBuf>,
    /// Fixed seed for the pan/zoom motion; random per run when unset
    pub motion_seed: Option<u64>,
    /// Speech-to-text collaborator; subtitles fall back to even phrase timing when unset
    pub transcriber: Option<TranscriberCommand>,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            ffmpeg_program: "ffmpeg".to_string(),
            ffprobe_program: "ffprobe".to_string(),
            default_language: Self::DEFAULT_LANGUAGE.to_string(),
            default_format: FormatKind::Shorts,
            content_dir: None,
            fps: Self::DEFAULT_FPS,
            x264_preset: "medium".to_string(),
            crf: Self::DEFAULT_CRF,
            audio_bitrate: "192k".to_string(),
            stage_timeout_secs: 900,
            transcriber_timeout_secs: 600,
            title_max_line_chars: Self::DEFAULT_TITLE_MAX_LINE_CHARS,
            font_family: "DejaVu Sans".to_string(),
            font_file: None,
            motion_seed: None,
            transcriber: None,
        }
    }
}

impl RenderSettings {
    pub const DEFAULT_LANGUAGE: &'static str = "vi";
    pub const DEFAULT_FPS: u32 = 30;
    pub const DEFAULT_CRF: u8 = 23;
    pub const DEFAULT_TITLE_MAX_LINE_CHARS: usize = 24;

    pub fn load() -> Result<Self> {
        Self::load_from_path(settings_path()?)
    }

    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            let settings = Self::default();
            settings.save_to_path(path)?;
            return Ok(settings);
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("reading render settings from {}", path.display()))?;
        let settings: Self = toml::from_str(&contents).context("parsing render settings")?;
        Ok(settings.sanitized())
    }

    pub fn save_to_path(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating settings directory {}", parent.display()))?;
        }

        let toml = toml::to_string_pretty(self).context("serializing render settings")?;
        fs::write(path, toml)
            .with_context(|| format!("writing render settings to {}", path.display()))?;
        Ok(())
    }

    /// Replace out-of-range values with their defaults.
    fn sanitized(mut self) -> Self {
        if self.fps == 0 || self.fps > 120 {
            self.fps = Self::DEFAULT_FPS;
        }
        if self.crf > 51 {
            self.crf = Self::DEFAULT_CRF;
        }
        if self.title_max_line_chars == 0 {
            self.title_max_line_chars = Self::DEFAULT_TITLE_MAX_LINE_CHARS;
        }
        if self.default_language.trim().is_empty() {
            self.default_language = Self::DEFAULT_LANGUAGE.to_string();
        }
        self
    }

    pub fn stage_timeout(&self) -> Option<Duration> {
        (self.stage_timeout_secs > 0).then(|| Duration::from_secs(self.stage_timeout_secs))
    }

    pub fn transcriber_timeout(&self) -> Option<Duration> {
        (self.transcriber_timeout_secs > 0)
            .then(|| Duration::from_secs(self.transcriber_timeout_secs))
    }

    pub fn encode_settings(&self) -> EncodeSettings {
        EncodeSettings {
            x264_preset: self.x264_preset.clone(),
            crf: self.crf,
            audio_bitrate: self.audio_bitrate.clone(),
        }
    }

    pub fn content_dir(&self) -> PathBuf {
        self.content_dir
            .clone()
            .unwrap_or_else(paths::default_content_dir)
    }
}

pub fn settings_path() -> Result<PathBuf> {
    Ok(paths::shortgen_config_dir()?.join("config.toml"))
}
