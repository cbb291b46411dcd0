use std::path::PathBuf;

use thiserror::Error;

/// Failures surfaced by a render. Transcription and subtitle problems are
/// recovered inside the pipeline and never show up here.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Invalid request id '{0}': use letters, digits, '-' or '_'")]
    InvalidRequestId(String),

    #[error("No background images available (none given or none exist on disk)")]
    NoBackgroundImages,

    #[error("Could not determine duration of {}: {reason}", path.display())]
    DurationUnavailable { path: PathBuf, reason: String },

    #[error("{stage} failed: {message}")]
    ExternalTool { stage: &'static str, message: String },

    #[error("{stage} did not finish within {seconds}s")]
    Timeout { stage: &'static str, seconds: u64 },

    #[error("Failed to extract thumbnail from {}: {message}", video.display())]
    ThumbnailExtractionFailed { video: PathBuf, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RenderError {
    pub fn tool(stage: &'static str, err: anyhow::Error) -> Self {
        if let Some(timeout) = err.downcast_ref::<StageTimeout>() {
            return RenderError::Timeout {
                stage,
                seconds: timeout.seconds,
            };
        }
        RenderError::ExternalTool {
            stage,
            message: format!("{err:#}"),
        }
    }

    /// Input problems are rejected before any encoding starts.
    pub fn is_input_validation(&self) -> bool {
        matches!(
            self,
            RenderError::InvalidRequestId(_)
                | RenderError::NoBackgroundImages
                | RenderError::DurationUnavailable { .. }
        )
    }
}

/// Marker error raised by the process runners when a stage exceeds its limit.
#[derive(Error, Debug, Clone, Copy)]
#[error("process exceeded its {seconds}s time limit")]
pub struct StageTimeout {
    pub seconds: u64,
}
