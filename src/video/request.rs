use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use serde::Serialize;

use crate::ui::prelude::{Level, emit};

use super::error::RenderError;
use super::support::utils::remove_file_logged;

/// Everything one render consumes. Owned by the caller and never mutated.
#[derive(Debug, Clone)]
pub struct MediaRequest {
    pub audio_path: PathBuf,
    pub title: String,
    pub script: String,
    /// Transcriber language; the configured default is used when `None`
    pub language: Option<String>,
    pub background_images: Vec<PathBuf>,
    pub request_id: String,
}

/// The artifacts that outlive a render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderOutput {
    pub video_path: PathBuf,
    pub thumbnail_path: PathBuf,
    pub script_path: PathBuf,
}

/// Request-scoped output locations:
/// `<root>/<id>/video/<id>.mp4`, `<root>/<id>/video/<id>_thumbnail.jpg`,
/// `<root>/<id>/script/<id>.txt`.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    request_dir: PathBuf,
    request_id: String,
    /// Outputs this run has started to write
    written: Vec<PathBuf>,
}

impl OutputLayout {
    pub fn new(content_root: &Path, request_id: &str) -> Self {
        Self {
            request_dir: content_root.join(request_id),
            request_id: request_id.to_string(),
            written: Vec::new(),
        }
    }

    pub fn video_dir(&self) -> PathBuf {
        self.request_dir.join("video")
    }

    pub fn script_dir(&self) -> PathBuf {
        self.request_dir.join("script")
    }

    pub fn video_path(&self) -> PathBuf {
        self.video_dir().join(format!("{}.mp4", self.request_id))
    }

    pub fn thumbnail_path(&self) -> PathBuf {
        self.video_dir()
            .join(format!("{}_thumbnail.jpg", self.request_id))
    }

    pub fn script_path(&self) -> PathBuf {
        self.script_dir().join(format!("{}.txt", self.request_id))
    }

    pub fn ensure_directories(&self) -> std::io::Result<()> {
        fs::create_dir_all(self.video_dir())?;
        fs::create_dir_all(self.script_dir())
    }

    pub fn output(&self) -> RenderOutput {
        RenderOutput {
            video_path: self.video_path(),
            thumbnail_path: self.thumbnail_path(),
            script_path: self.script_path(),
        }
    }

    /// Record that `path` is about to be written, so `discard` owns it.
    pub fn mark_written(&mut self, path: &Path) {
        self.written.push(path.to_path_buf());
    }

    /// Remove the files this run wrote, then any request directory left
    /// empty. Outputs of earlier runs are not touched.
    pub fn discard(&self) {
        for path in &self.written {
            remove_file_logged(path, "render.output.discard_failed");
        }
        for dir in [self.video_dir(), self.script_dir(), self.request_dir.clone()] {
            remove_dir_if_empty(&dir);
        }
    }
}

fn remove_dir_if_empty(dir: &Path) {
    let is_empty = fs::read_dir(dir)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(false);
    if is_empty && let Err(err) = fs::remove_dir(dir) {
        emit(
            Level::Warn,
            "render.output.discard_failed",
            &format!("Failed to remove {}: {}", dir.display(), err),
            None,
        );
    }
}

/// Reject ids that would escape the content directory.
pub fn validate_request_id(request_id: &str) -> Result<(), RenderError> {
    let valid = !request_id.is_empty()
        && request_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid {
        return Err(RenderError::InvalidRequestId(request_id.to_string()));
    }
    Ok(())
}

/// Timestamp plus a random suffix, e.g. `20260118-142501-3fa9`.
pub fn generate_request_id() -> String {
    format!(
        "{}-{:04x}",
        Local::now().format("%Y%m%d-%H%M%S"),
        rand::random::<u16>()
    )
}
