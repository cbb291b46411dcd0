use anyhow::{Context, Result, bail};
use comfy_table::{Cell, Table, presets::UTF8_FULL};
use std::fs;

use crate::common::progress::{create_percent_bar, finish_with_success};
use crate::ui::prelude::*;

use super::check::handle_check;
use super::cli::{ConfigCommands, RenderArgs, ShortgenCommands};
use super::config::{RenderSettings, settings_path};
use super::pipeline::Renderer;
use super::preset::FormatKind;
use super::request::{MediaRequest, RenderOutput, generate_request_id};

pub async fn handle_command(command: ShortgenCommands) -> Result<()> {
    match command {
        ShortgenCommands::Render(args) => handle_render(args).await,
        ShortgenCommands::Formats => handle_formats(),
        ShortgenCommands::Check => handle_check(&RenderSettings::load()?),
        ShortgenCommands::Config { command } => handle_config(command),
    }
}

async fn handle_render(args: RenderArgs) -> Result<()> {
    let mut settings = RenderSettings::load()?;
    apply_overrides(&mut settings, &args);

    let request = build_request(&args)?;
    let mut renderer = Renderer::from_settings(settings).with_verbose(args.verbose);
    if let Some(format) = args.format {
        renderer.set_format(format);
    }

    let show_bar = !args.no_progress && get_output_format() == OutputFormat::Text;
    let result = if show_bar {
        let pb = create_percent_bar(format!(
            "Rendering {} ({})",
            request.request_id,
            renderer.format().preset().name
        ));
        let result = renderer
            .render(&request, Some(&|percent: u8| pb.set_position(percent as u64)))
            .await;
        match &result {
            Ok(_) => finish_with_success(pb, format!("Rendered {}", request.request_id)),
            Err(_) => pb.abandon(),
        }
        result
    } else {
        renderer.render(&request, None).await
    };

    let output = match result {
        Ok(output) => output,
        Err(err) if err.is_input_validation() => {
            return Err(err).context("invalid render request; nothing was rendered");
        }
        Err(err) => {
            return Err(err).with_context(|| format!("rendering {}", request.request_id));
        }
    };

    report_output(&request.request_id, &output);
    Ok(())
}

fn apply_overrides(settings: &mut RenderSettings, args: &RenderArgs) {
    if let Some(dir) = &args.content_dir {
        settings.content_dir = Some(dir.clone());
    }
    if let Some(seed) = args.seed {
        settings.motion_seed = Some(seed);
    }
}

fn build_request(args: &RenderArgs) -> Result<MediaRequest> {
    let script = match (&args.script, &args.script_file) {
        (Some(script), _) => script.clone(),
        (None, Some(path)) => fs::read_to_string(path)
            .with_context(|| format!("reading script file {}", path.display()))?,
        (None, None) => bail!("Either --script or --script-file is required"),
    };

    Ok(MediaRequest {
        audio_path: args.audio.clone(),
        title: args.title.clone(),
        script: script.trim().to_string(),
        language: args.language.clone(),
        background_images: args.images.clone(),
        request_id: args
            .request_id
            .clone()
            .unwrap_or_else(generate_request_id),
    })
}

fn report_output(request_id: &str, output: &RenderOutput) {
    let data = serde_json::to_value(output).ok();
    emit(
        Level::Success,
        "render.output",
        &format!(
            "Video: {}\nThumbnail: {}\nScript: {}",
            output.video_path.display(),
            output.thumbnail_path.display(),
            output.script_path.display()
        ),
        data.map(|mut value| {
            value["request_id"] = serde_json::Value::from(request_id);
            value
        }),
    );
}

fn handle_formats() -> Result<()> {
    let settings = RenderSettings::load()?;

    match get_output_format() {
        OutputFormat::Json => {
            let formats: Vec<_> = FormatKind::ALL
                .iter()
                .map(|kind| {
                    let preset = kind.preset();
                    serde_json::json!({
                        "name": preset.name,
                        "width": preset.width,
                        "height": preset.height,
                        "aspect_ratio": preset.aspect_ratio,
                        "nominal_duration": preset.nominal_duration,
                        "default": *kind == settings.default_format,
                    })
                })
                .collect();
            emit(
                Level::Info,
                "formats.list",
                "Available formats",
                Some(serde_json::json!(formats)),
            );
        }
        OutputFormat::Text => println!("{}", formats_table(settings.default_format)),
    }
    Ok(())
}

fn formats_table(default: FormatKind) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["Format", "Resolution", "Aspect", "Length", ""]);

    for kind in FormatKind::ALL {
        let preset = kind.preset();
        let length = match preset.nominal_duration {
            Some(seconds) => format!("~{seconds:.0}s"),
            None => "narration".to_string(),
        };
        table.add_row(vec![
            Cell::new(preset.name),
            Cell::new(format!("{}x{}", preset.width, preset.height)),
            Cell::new(preset.aspect_ratio),
            Cell::new(length),
            Cell::new(if kind == default { "default" } else { "" }),
        ]);
    }
    table
}

fn handle_config(command: ConfigCommands) -> Result<()> {
    let path = settings_path()?;
    match command {
        ConfigCommands::Show => {
            let settings = RenderSettings::load_from_path(&path)?;
            match get_output_format() {
                OutputFormat::Json => emit(
                    Level::Info,
                    "config.show",
                    &path.display().to_string(),
                    serde_json::to_value(&settings).ok(),
                ),
                OutputFormat::Text => {
                    print!(
                        "{}",
                        toml::to_string_pretty(&settings).context("serializing render settings")?
                    );
                }
            }
        }
        ConfigCommands::Path => println!("{}", path.display()),
        ConfigCommands::Init { force } => {
            if path.exists() && !force {
                bail!(
                    "{} already exists (use --force to overwrite)",
                    path.display()
                );
            }
            RenderSettings::default().save_to_path(&path)?;
            emit(
                Level::Success,
                "config.init",
                &format!("Wrote default configuration to {}", path.display()),
                None,
            );
        }
    }
    Ok(())
}
