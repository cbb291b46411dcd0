mod common;
mod ui;
mod video;

use clap::Parser;
use std::io::IsTerminal;

use crate::ui::prelude::*;
use crate::video::{ShortgenCommands, handle_command};

/// Render narrated short videos from audio, a script and still images
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Activate debug mode
    #[arg(short, long, global = true)]
    debug: bool,

    /// Output format for messages and results
    #[arg(long, value_enum, default_value = "text", global = true)]
    output: OutputFormat,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: ShortgenCommands,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    ui::init(cli.output, !cli.no_color && std::io::stdout().is_terminal());
    ui::set_debug_mode(cli.debug);

    if let Err(err) = handle_command(cli.command).await {
        emit(Level::Error, "shortgen.error", &format!("Error: {err:#}"), None);
        std::process::exit(1);
    }
}
