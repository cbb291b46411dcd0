use anyhow::{Result, bail};
use comfy_table::{Cell, Color, Table, presets::UTF8_FULL};
use serde::Serialize;
use std::path::PathBuf;

use crate::ui::prelude::*;

use super::config::RenderSettings;

#[derive(Debug, Clone, Serialize)]
pub struct ToolStatus {
    pub tool: &'static str,
    pub program: Option<String>,
    /// Missing tools the pipeline can still run without
    pub optional: bool,
    pub location: Option<PathBuf>,
}

impl ToolStatus {
    fn is_missing(&self) -> bool {
        self.program.is_some() && self.location.is_none()
    }
}

/// Resolve every external program the renderer shells out to.
pub fn tool_statuses(
    settings: &RenderSettings,
    lookup: impl Fn(&str) -> Option<PathBuf>,
) -> Vec<ToolStatus> {
    let mut statuses = vec![
        ToolStatus {
            tool: "ffmpeg",
            location: lookup(&settings.ffmpeg_program),
            program: Some(settings.ffmpeg_program.clone()),
            optional: false,
        },
        ToolStatus {
            tool: "ffprobe",
            location: lookup(&settings.ffprobe_program),
            program: Some(settings.ffprobe_program.clone()),
            optional: false,
        },
    ];

    let transcriber = settings.transcriber.as_ref().map(|t| t.program.clone());
    statuses.push(ToolStatus {
        tool: "transcriber",
        location: transcriber.as_deref().and_then(&lookup),
        program: transcriber,
        optional: true,
    });
    statuses
}

pub fn handle_check(settings: &RenderSettings) -> Result<()> {
    let statuses = tool_statuses(settings, |program| which::which(program).ok());

    match get_output_format() {
        OutputFormat::Json => emit(
            Level::Info,
            "check.tools",
            "External tools",
            serde_json::to_value(&statuses).ok(),
        ),
        OutputFormat::Text => println!("{}", status_table(&statuses)),
    }

    for status in statuses.iter().filter(|s| s.optional && s.is_missing()) {
        emit(
            Level::Warn,
            "check.optional_missing",
            &format!(
                "{} not found; subtitles will use evenly split script timing",
                status.tool
            ),
            None,
        );
    }

    let missing: Vec<_> = statuses
        .iter()
        .filter(|s| !s.optional && s.is_missing())
        .map(|s| s.tool)
        .collect();
    if !missing.is_empty() {
        bail!("Required tools not found: {}", missing.join(", "));
    }

    emit(
        Level::Success,
        "check.ok",
        "All required tools are available",
        None,
    );
    Ok(())
}

fn status_table(statuses: &[ToolStatus]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["Tool", "Program", "Status", "Location"]);

    for status in statuses {
        let (label, color) = match (&status.program, &status.location) {
            (None, _) => ("not configured", Color::DarkGrey),
            (Some(_), Some(_)) => ("found", Color::Green),
            (Some(_), None) if status.optional => ("missing", Color::Yellow),
            (Some(_), None) => ("missing", Color::Red),
        };
        table.add_row(vec![
            Cell::new(status.tool),
            Cell::new(status.program.as_deref().unwrap_or("-")),
            Cell::new(label).fg(color),
            Cell::new(
                status
                    .location
                    .as_ref()
                    .map(|path| path.display().to_string())
                    .unwrap_or_default(),
            ),
        ]);
    }
    table
}
