//! Subtitle burning.
//!
//! Three strategies are tried in order until one succeeds:
//! - a styled ASS track (`ass` filter)
//! - a plain SRT track with one forced style (`subtitles` filter)
//! - hand-placed `drawbox`/`drawtext` panels
//!
//! The subtitle files only live in the render's work directory.

mod ass;
mod srt;
mod tiers;

pub use tiers::{SubtitleJob, SubtitleTier, apply_first_success, default_tiers};
