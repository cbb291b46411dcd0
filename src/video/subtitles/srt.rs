//! SubRip output for the plain subtitle tier.

use crate::video::overlay::TextOverlay;

/// One numbered cue per overlay, in the order given.
pub fn generate_srt_file(overlays: &[TextOverlay]) -> String {
    let mut output = String::new();
    for (idx, overlay) in overlays.iter().enumerate() {
        output.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            idx + 1,
            format_srt_timestamp(overlay.start),
            format_srt_timestamp(overlay.end()),
            overlay.text.trim()
        ));
    }
    output
}

/// Format seconds as `HH:MM:SS,mmm`.
fn format_srt_timestamp(seconds: f64) -> String {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms % 3_600_000) / 60_000;
    let secs = (total_ms % 60_000) / 1000;
    let millis = total_ms % 1000;
    format!("{hours:02}:{minutes:02}:{secs:02},{millis:03}")
}
