use clap::{Args, Subcommand, ValueHint};
use std::path::PathBuf;

use super::preset::FormatKind;

#[derive(Subcommand, Debug, Clone)]
pub enum ShortgenCommands {
    /// Render narration, a title, a script and background images into a video
    Render(RenderArgs),
    /// List the available output formats
    Formats,
    /// Verify that ffmpeg, ffprobe and the transcriber can be found
    Check,
    /// Inspect or initialise the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Args, Debug, Clone)]
pub struct RenderArgs {
    /// Narration audio file; its length decides the video length
    #[arg(short = 'a', long, value_hint = ValueHint::FilePath)]
    pub audio: PathBuf,

    /// Title burned into the top of the video
    #[arg(short = 't', long)]
    pub title: String,

    /// Narration script text
    #[arg(short = 's', long, conflicts_with = "script_file", required_unless_present = "script_file")]
    pub script: Option<String>,

    /// Read the narration script from a file
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub script_file: Option<PathBuf>,

    /// Background images, shown in order
    #[arg(short = 'i', long = "image", required = true, num_args = 1.., value_hint = ValueHint::FilePath)]
    pub images: Vec<PathBuf>,

    /// Transcriber language code (defaults to the configured language)
    #[arg(short = 'l', long)]
    pub language: Option<String>,

    /// Output format (defaults to the configured format)
    #[arg(short = 'f', long, value_enum)]
    pub format: Option<FormatKind>,

    /// Request id used for the output directory; generated when omitted
    #[arg(long)]
    pub request_id: Option<String>,

    /// Root directory for rendered content
    #[arg(long, value_hint = ValueHint::DirPath)]
    pub content_dir: Option<PathBuf>,

    /// Fixed seed for the pan/zoom motion
    #[arg(long)]
    pub seed: Option<u64>,

    /// Stream ffmpeg output while rendering
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Hide the progress bar
    #[arg(long)]
    pub no_progress: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommands {
    /// Print the effective configuration
    Show,
    /// Print the configuration file path
    Path,
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}
