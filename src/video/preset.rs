use serde::{Deserialize, Serialize};

/// Output shape selected for a render
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum FormatKind {
    /// Vertical 9:16 short (1080x1920)
    #[default]
    Shorts,
    /// Landscape 16:9 video (1920x1080)
    Normal,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoFormatPreset {
    pub kind: FormatKind,
    pub name: &'static str,
    pub width: u32,
    pub height: u32,
    pub aspect_ratio: &'static str,
    /// Target length in seconds; `None` means the narration decides
    pub nominal_duration: Option<f64>,
}

const SHORTS: VideoFormatPreset = VideoFormatPreset {
    kind: FormatKind::Shorts,
    name: "shorts",
    width: 1080,
    height: 1920,
    aspect_ratio: "9:16",
    nominal_duration: Some(60.0),
};

const NORMAL: VideoFormatPreset = VideoFormatPreset {
    kind: FormatKind::Normal,
    name: "normal",
    width: 1920,
    height: 1080,
    aspect_ratio: "16:9",
    nominal_duration: None,
};

impl FormatKind {
    pub const ALL: [FormatKind; 2] = [FormatKind::Shorts, FormatKind::Normal];

    pub fn preset(self) -> VideoFormatPreset {
        match self {
            FormatKind::Shorts => SHORTS,
            FormatKind::Normal => NORMAL,
        }
    }

    pub fn is_vertical(self) -> bool {
        matches!(self, FormatKind::Shorts)
    }
}

/// Everything a stage needs to know about the output shape of one render.
///
/// Built once per render from the renderer's selected preset and the probed
/// narration length, then shared read-only by every stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderContext {
    pub preset: VideoFormatPreset,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub total_duration: f64,
}

impl RenderContext {
    pub fn new(kind: FormatKind, fps: u32, total_duration: f64) -> Self {
        let preset = kind.preset();
        Self {
            preset,
            width: preset.width,
            height: preset.height,
            fps,
            total_duration,
        }
    }

    pub fn resolution(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }

    pub fn frames_for(&self, seconds: f64) -> u64 {
        (seconds * self.fps as f64).round().max(1.0) as u64
    }

    /// Scale a pixel size tuned for a 1080-wide frame to this output.
    pub fn scaled(&self, pixels_at_1080: f64) -> f64 {
        pixels_at_1080 * self.width.min(self.height) as f64 / 1080.0
    }

    pub fn exceeds_nominal_duration(&self) -> bool {
        self.preset
            .nominal_duration
            .is_some_and(|nominal| self.total_duration > nominal)
    }
}
