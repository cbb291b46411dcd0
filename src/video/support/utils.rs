use std::fs;
use std::path::Path;

use crate::ui::prelude::{Level, emit};
use crate::video::config::EncodeSettings;

pub fn format_time(value: f64) -> String {
    format!("{value:.6}")
}

/// Escape text or a path for use inside a quoted filter argument.
///
/// The result is unquoted twice: once by the graph parser, which keeps
/// `'...'` contents literal, and once by the filter's option parser. A
/// quote closes the graph-level quoting and is emitted as `\\\'`, which
/// the two passes reduce to `\'` and then to `'`.
pub fn escape_filter_value(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('\'', "'\\\\\\''")
        .replace(':', "\\:")
}

pub fn escape_filter_path(path: &Path) -> String {
    escape_filter_value(&path.to_string_lossy())
}

/// Quote a path for a concat demuxer list entry.
pub fn concat_list_entry(path: &Path) -> String {
    format!("file '{}'", path.to_string_lossy().replace('\'', "'\\''"))
}

/// Re-encode `input` through a `-vf` chain, copying the audio stream.
pub fn video_filter_args(
    input: &Path,
    filter: &str,
    encode: &EncodeSettings,
    output: &Path,
) -> Vec<String> {
    vec![
        "-y".to_string(),
        "-i".to_string(),
        input.to_string_lossy().into_owned(),
        "-vf".to_string(),
        filter.to_string(),
        "-c:v".to_string(),
        "libx264".to_string(),
        "-preset".to_string(),
        encode.x264_preset.clone(),
        "-crf".to_string(),
        encode.crf.to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        "-c:a".to_string(),
        "copy".to_string(),
        output.to_string_lossy().into_owned(),
    ]
}

/// Best-effort removal; failures are reported as warnings only.
pub fn remove_file_logged(path: &Path, code: &str) {
    if !path.exists() {
        return;
    }
    if let Err(err) = fs::remove_file(path) {
        emit(
            Level::Warn,
            code,
            &format!("Failed to remove {}: {}", path.display(), err),
            None,
        );
    }
}
