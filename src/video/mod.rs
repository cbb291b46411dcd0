pub mod cli;
pub mod commands;

mod check;
mod compositor;
mod config;
mod error;
mod overlay;
mod pipeline;
mod planner;
mod preset;
mod request;
mod segments;
mod subtitles;
mod support;
mod text;
mod thumbnail;
mod transcript;

#[cfg(test)]
mod testing;

pub use cli::ShortgenCommands;
pub use commands::handle_command;
