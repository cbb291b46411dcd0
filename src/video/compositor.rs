//! Segment clips + narration + text layers into the final video.
//!
//! Stages run strictly in order:
//! `Concatenating → AudioMerged → TitleApplied? → SubtitlesApplied? → Finalized`.
//! Every stage writes a new intermediate into the work directory; only
//! Finalize touches the output path.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::ui::prelude::{Level, emit};

use super::config::EncodeSettings;
use super::error::RenderError;
use super::overlay::OverlayPlan;
use super::preset::RenderContext;
use super::subtitles::{SubtitleJob, SubtitleTier, apply_first_success};
use super::support::ffmpeg::{FfmpegRunOptions, FfmpegRunner};
use super::support::utils::{concat_list_entry, video_filter_args};
use super::text::{DrawBox, DrawText, TextBlock, TextStyle, wrap_text};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompositorStage {
    Concatenating,
    AudioMerged,
    TitleApplied,
    SubtitlesApplied,
    Finalized,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompositionReport {
    /// Stages reached, in order
    pub stages: Vec<CompositorStage>,
    /// Tier that burnt the subtitles, if any did
    pub subtitle_tier: Option<&'static str>,
}

pub fn concat_args(list: &Path, output: &Path) -> Vec<String> {
    vec![
        "-y".to_string(),
        "-f".to_string(),
        "concat".to_string(),
        "-safe".to_string(),
        "0".to_string(),
        "-i".to_string(),
        list.to_string_lossy().into_owned(),
        "-c".to_string(),
        "copy".to_string(),
        output.to_string_lossy().into_owned(),
    ]
}

/// Attach narration to the silent base clip, cut to the shorter stream.
pub fn merge_audio_args(video: &Path, audio: &Path, bitrate: &str, output: &Path) -> Vec<String> {
    vec![
        "-y".to_string(),
        "-i".to_string(),
        video.to_string_lossy().into_owned(),
        "-i".to_string(),
        audio.to_string_lossy().into_owned(),
        "-map".to_string(),
        "0:v:0".to_string(),
        "-map".to_string(),
        "1:a:0".to_string(),
        "-c:v".to_string(),
        "copy".to_string(),
        "-c:a".to_string(),
        "aac".to_string(),
        "-b:a".to_string(),
        bitrate.to_string(),
        "-shortest".to_string(),
        output.to_string_lossy().into_owned(),
    ]
}

/// Centered translucent panel near the top with the wrapped title lines.
///
/// Returns `None` when the title wraps to nothing.
pub fn title_filter(ctx: &RenderContext, style: &TextStyle, title: &str) -> Option<String> {
    let block = TextBlock {
        lines: wrap_text(title, style.title_max_chars),
        font_size: style.title_font_size,
        padding: style.padding,
    };
    if block.lines.is_empty() {
        return None;
    }

    let max_width = ctx.width.saturating_sub(2 * style.padding);
    let (panel_w, panel_h) = block.panel_size(max_width);
    let panel_x = (ctx.width - panel_w) as i64 / 2;
    let panel_y = style.title_top as i64;

    let mut filters = vec![
        DrawBox {
            x: panel_x,
            y: panel_y,
            width: panel_w,
            height: panel_h,
            color: "black@0.55".to_string(),
            window: None,
        }
        .to_filter(),
    ];

    for (index, line) in block.lines.iter().enumerate() {
        filters.push(
            DrawText {
                text: line.clone(),
                font: style.font.clone(),
                font_size: style.title_font_size,
                color: "white".to_string(),
                x: "(w-text_w)/2".to_string(),
                y: block.line_y(panel_y, index).to_string(),
                border_width: 2,
                border_color: "black".to_string(),
                window: None,
            }
            .to_filter(),
        );
    }

    Some(filters.join(","))
}

pub struct Compositor<'a> {
    pub runner: &'a dyn FfmpegRunner,
    pub ctx: &'a RenderContext,
    pub style: &'a TextStyle,
    pub encode: &'a EncodeSettings,
    pub tiers: &'a [Box<dyn SubtitleTier>],
    pub work_dir: &'a Path,
    pub verbose: bool,
}

impl Compositor<'_> {
    pub async fn compose(
        &self,
        segments: &[PathBuf],
        audio: &Path,
        overlays: &OverlayPlan,
        output: &Path,
        on_stage: &(dyn Fn(CompositorStage) + Sync),
    ) -> Result<CompositionReport, RenderError> {
        let mut report = CompositionReport {
            stages: Vec::new(),
            subtitle_tier: None,
        };
        let reach = |stage: CompositorStage, report: &mut CompositionReport| {
            emit(
                Level::Debug,
                "render.compose.stage",
                &format!("Compositor reached {stage:?}"),
                None,
            );
            report.stages.push(stage);
            on_stage(stage);
        };

        let mut current = self.concatenate(segments).await?;
        reach(CompositorStage::Concatenating, &mut report);

        current = self.merge_audio(&current, audio).await?;
        reach(CompositorStage::AudioMerged, &mut report);

        if let Some(title) = overlays.title()
            && let Some(titled) = self.apply_title(&current, &title.text).await?
        {
            current = titled;
            reach(CompositorStage::TitleApplied, &mut report);
        }

        if !overlays.subtitles().is_empty() {
            let job = SubtitleJob {
                runner: self.runner,
                ctx: self.ctx,
                style: self.style,
                encode: self.encode,
                subtitles: overlays.subtitles(),
                input: &current,
                work_dir: self.work_dir,
                verbose: self.verbose,
            };
            if let Some(outcome) = apply_first_success(self.tiers, &job).await {
                report.subtitle_tier = Some(outcome.tier);
                current = outcome.output;
                reach(CompositorStage::SubtitlesApplied, &mut report);
            }
        }

        fs::copy(&current, output)?;
        reach(CompositorStage::Finalized, &mut report);
        emit(
            Level::Info,
            "render.compose.finalized",
            &format!("Wrote {}", output.display()),
            None,
        );

        Ok(report)
    }

    async fn run(&self, stage: &'static str, args: Vec<String>) -> Result<(), RenderError> {
        self.runner
            .run(&args, FfmpegRunOptions::new(stage, self.verbose))
            .await
            .map_err(|err| RenderError::tool(stage, err))
    }

    async fn concatenate(&self, segments: &[PathBuf]) -> Result<PathBuf, RenderError> {
        let list = self.work_dir.join("concat_list.txt");
        let entries: Vec<String> = segments.iter().map(|p| concat_list_entry(p)).collect();
        fs::write(&list, entries.join("\n") + "\n")?;

        let output = self.work_dir.join("concat.mp4");
        emit(
            Level::Info,
            "render.compose.concat",
            &format!("Joining {} segments", segments.len()),
            None,
        );
        self.run("concat", concat_args(&list, &output)).await?;
        Ok(output)
    }

    async fn merge_audio(&self, video: &Path, audio: &Path) -> Result<PathBuf, RenderError> {
        let output = self.work_dir.join("merged.mp4");
        emit(
            Level::Info,
            "render.compose.audio",
            &format!("Merging narration {}", audio.display()),
            None,
        );
        self.run(
            "audio merge",
            merge_audio_args(video, audio, &self.encode.audio_bitrate, &output),
        )
        .await?;
        Ok(output)
    }

    async fn apply_title(&self, video: &Path, title: &str) -> Result<Option<PathBuf>, RenderError> {
        let Some(filter) = title_filter(self.ctx, self.style, title) else {
            return Ok(None);
        };
        let output = self.work_dir.join("titled.mp4");
        emit(
            Level::Info,
            "render.compose.title",
            &format!("Drawing title \"{title}\""),
            None,
        );
        self.run("title overlay", video_filter_args(video, &filter, self.encode, &output))
            .await?;
        Ok(Some(output))
    }
}
