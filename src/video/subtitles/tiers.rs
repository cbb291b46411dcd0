use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::ui::prelude::{Level, emit};
use crate::video::config::EncodeSettings;
use crate::video::overlay::{TextOverlay, cluster_overlays};
use crate::video::preset::RenderContext;
use crate::video::support::ffmpeg::{FfmpegRunOptions, FfmpegRunner};
use crate::video::support::utils::{escape_filter_path, escape_filter_value, video_filter_args};
use crate::video::text::{DrawBox, DrawText, TextBlock, TextStyle, wrap_text};

use super::ass::{AssStyle, generate_ass_file};
use super::srt::generate_srt_file;

/// Inputs shared by every subtitle tier.
pub struct SubtitleJob<'a> {
    pub runner: &'a dyn FfmpegRunner,
    pub ctx: &'a RenderContext,
    pub style: &'a TextStyle,
    pub encode: &'a EncodeSettings,
    pub subtitles: &'a [TextOverlay],
    pub input: &'a Path,
    pub work_dir: &'a Path,
    pub verbose: bool,
}

impl SubtitleJob<'_> {
    fn output_for(&self, tier: &str) -> PathBuf {
        self.work_dir.join(format!("subtitled_{tier}.mp4"))
    }

    async fn burn(&self, stage: &'static str, filter: &str, output: &Path) -> Result<()> {
        let args = video_filter_args(self.input, filter, self.encode, output);
        self.runner
            .run(&args, FfmpegRunOptions::new(stage, self.verbose))
            .await
    }
}

/// One way of burning subtitles into the video.
#[async_trait]
pub trait SubtitleTier: Send + Sync {
    fn name(&self) -> &'static str;

    /// Burn the job's subtitles, returning the produced video.
    async fn apply(&self, job: &SubtitleJob<'_>) -> Result<PathBuf>;
}

/// Styled ASS track burnt with the `ass` filter.
pub struct AssTier;

#[async_trait]
impl SubtitleTier for AssTier {
    fn name(&self) -> &'static str {
        "ass"
    }

    async fn apply(&self, job: &SubtitleJob<'_>) -> Result<PathBuf> {
        let style = AssStyle::accent(job.ctx, job.style);
        let content = generate_ass_file(job.subtitles, &style, (job.ctx.width, job.ctx.height));
        let path = job.work_dir.join("subtitles.ass");
        fs::write(&path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;

        let output = job.output_for(self.name());
        let filter = format!("ass='{}'", escape_filter_path(&path));
        job.burn("subtitles-ass", &filter, &output).await?;
        Ok(output)
    }
}

/// Plain SRT track burnt with the `subtitles` filter and one global style.
pub struct SrtTier;

impl SrtTier {
    /// libass lays SRT out on a 384x288 script; sizes are given in that space.
    fn script_units(pixels: u32, frame_height: u32) -> u32 {
        ((pixels as f64 * 288.0 / frame_height as f64).round() as u32).max(1)
    }

    fn force_style(job: &SubtitleJob<'_>) -> String {
        let height = job.ctx.height;
        format!(
            "FontName={},FontSize={},PrimaryColour=&H00FFFFFF,OutlineColour=&H00000000,BackColour=&H99000000,BorderStyle=3,Outline=1,Shadow=0,Alignment=2,MarginV={}",
            escape_filter_value(&job.style.font_family),
            Self::script_units(job.style.subtitle_font_size, height),
            Self::script_units(job.style.subtitle_bottom, height),
        )
    }
}

#[async_trait]
impl SubtitleTier for SrtTier {
    fn name(&self) -> &'static str {
        "srt"
    }

    async fn apply(&self, job: &SubtitleJob<'_>) -> Result<PathBuf> {
        let path = job.work_dir.join("subtitles.srt");
        fs::write(&path, generate_srt_file(job.subtitles))
            .with_context(|| format!("Failed to write {}", path.display()))?;

        let output = job.output_for(self.name());
        let filter = format!(
            "subtitles='{}':force_style='{}'",
            escape_filter_path(&path),
            Self::force_style(job)
        );
        job.burn("subtitles-srt", &filter, &output).await?;
        Ok(output)
    }
}

/// Manual drawbox + drawtext overlay, one shared panel per cluster.
pub struct DrawtextTier;

impl DrawtextTier {
    pub fn filter(job: &SubtitleJob<'_>) -> String {
        let ctx = job.ctx;
        let style = job.style;
        let mut filters = Vec::new();

        for cluster in cluster_overlays(job.subtitles) {
            let timed_lines: Vec<(String, (f64, f64))> = cluster
                .members
                .iter()
                .flat_map(|overlay| {
                    let window = (overlay.start, overlay.end());
                    wrap_text(&overlay.text, style.subtitle_max_chars)
                        .into_iter()
                        .map(move |line| (line, window))
                })
                .collect();
            if timed_lines.is_empty() {
                continue;
            }

            let block = TextBlock {
                lines: timed_lines.iter().map(|(line, _)| line.clone()).collect(),
                font_size: style.subtitle_font_size,
                padding: style.padding,
            };
            let (panel_w, panel_h) = block.panel_size(ctx.width);
            let panel_x = (ctx.width - panel_w) as i64 / 2;
            let panel_y = (ctx.height as i64 - style.subtitle_bottom as i64 - panel_h as i64).max(0);

            filters.push(
                DrawBox {
                    x: panel_x,
                    y: panel_y,
                    width: panel_w,
                    height: panel_h,
                    color: "black@0.6".to_string(),
                    window: Some((cluster.start, cluster.end)),
                }
                .to_filter(),
            );

            for (index, (line, window)) in timed_lines.into_iter().enumerate() {
                filters.push(
                    DrawText {
                        text: line,
                        font: style.font.clone(),
                        font_size: style.subtitle_font_size,
                        color: "white".to_string(),
                        x: "(w-text_w)/2".to_string(),
                        y: block.line_y(panel_y, index).to_string(),
                        border_width: 2,
                        border_color: "black".to_string(),
                        window: Some(window),
                    }
                    .to_filter(),
                );
            }
        }

        filters.join(",")
    }
}

#[async_trait]
impl SubtitleTier for DrawtextTier {
    fn name(&self) -> &'static str {
        "drawtext"
    }

    async fn apply(&self, job: &SubtitleJob<'_>) -> Result<PathBuf> {
        let filter = Self::filter(job);
        if filter.is_empty() {
            anyhow::bail!("no subtitle text to draw");
        }
        let output = job.output_for(self.name());
        job.burn("subtitles-drawtext", &filter, &output).await?;
        Ok(output)
    }
}

/// Styled ASS, then plain SRT, then manual drawtext.
pub fn default_tiers() -> Vec<Box<dyn SubtitleTier>> {
    vec![Box::new(AssTier), Box::new(SrtTier), Box::new(DrawtextTier)]
}

/// The tier that burnt the subtitles and the video it produced.
#[derive(Debug, Clone, PartialEq)]
pub struct TierOutcome {
    pub tier: &'static str,
    pub output: PathBuf,
}

/// Try each tier in order; the first success wins.
///
/// Failures are logged and the next tier is attempted. `None` means every
/// tier failed and the caller continues without subtitles.
pub async fn apply_first_success(
    tiers: &[Box<dyn SubtitleTier>],
    job: &SubtitleJob<'_>,
) -> Option<TierOutcome> {
    for tier in tiers {
        match tier.apply(job).await {
            Ok(output) => {
                emit(
                    Level::Info,
                    "render.subtitles.applied",
                    &format!("Burned {} subtitles with the {} tier", job.subtitles.len(), tier.name()),
                    Some(serde_json::json!({ "tier": tier.name() })),
                );
                return Some(TierOutcome {
                    tier: tier.name(),
                    output,
                });
            }
            Err(err) => {
                emit(
                    Level::Warn,
                    "render.subtitles.tier_failed",
                    &format!("Subtitle tier '{}' failed: {err:#}", tier.name()),
                    Some(serde_json::json!({ "tier": tier.name() })),
                );
            }
        }
    }

    emit(
        Level::Warn,
        "render.subtitles.skipped",
        "Every subtitle tier failed; continuing without subtitles",
        None,
    );
    None
}
