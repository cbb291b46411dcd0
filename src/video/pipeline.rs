//! One render: validate → plan → time → overlays → segments → compose →
//! thumbnail → script.
//!
//! Each run works inside its own temporary directory which is removed on
//! every exit path. A failed run removes the outputs it had started to
//! write and leaves earlier renders of the same request id alone.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use tempfile::TempDir;

use crate::ui::prelude::{Level, emit};

use super::compositor::{Compositor, CompositorStage};
use super::config::{EncodeSettings, RenderSettings};
use super::error::RenderError;
use super::overlay::plan_overlays;
use super::planner::{plan_segments, probe_audio_duration, validate_background_images};
use super::preset::{FormatKind, RenderContext};
use super::request::{MediaRequest, OutputLayout, RenderOutput, validate_request_id};
use super::segments::{SegmentRenderer, motion_rng};
use super::subtitles::{SubtitleTier, default_tiers};
use super::support::ffmpeg::{FfmpegRunner, MediaProbe, SystemFfmpegRunner, SystemMediaProbe};
use super::text::TextStyle;
use super::thumbnail::extract_thumbnail;
use super::transcript::{CommandTranscriber, NoTranscriber, Transcriber, resolve_timing};

/// Progress callback receiving percentages in `0..=100`.
pub type ProgressCallback<'a> = &'a (dyn Fn(u8) + Send + Sync);

/// Forwards non-decreasing percentages to an optional callback.
struct Progress<'a> {
    callback: Option<ProgressCallback<'a>>,
    last: AtomicU8,
}

impl<'a> Progress<'a> {
    fn new(callback: Option<ProgressCallback<'a>>) -> Self {
        Self {
            callback,
            last: AtomicU8::new(0),
        }
    }

    fn report(&self, percent: u8) {
        let percent = percent.min(100);
        let previous = self.last.fetch_max(percent, Ordering::Relaxed);
        if percent > previous
            && let Some(callback) = self.callback
        {
            callback(percent);
        }
    }
}

const PROGRESS_PLANNED: u8 = 5;
const PROGRESS_TIMED: u8 = 15;
const PROGRESS_SEGMENTS_DONE: u8 = 60;

fn stage_progress(stage: CompositorStage) -> u8 {
    match stage {
        CompositorStage::Concatenating => 65,
        CompositorStage::AudioMerged => 72,
        CompositorStage::TitleApplied => 80,
        CompositorStage::SubtitlesApplied => 90,
        CompositorStage::Finalized => 100,
    }
}

pub struct Renderer {
    settings: RenderSettings,
    format: FormatKind,
    runner: Arc<dyn FfmpegRunner>,
    probe: Arc<dyn MediaProbe>,
    transcriber: Arc<dyn Transcriber>,
    tiers: Vec<Box<dyn SubtitleTier>>,
    verbose: bool,
}

impl Renderer {
    /// Renderer backed by the configured ffmpeg, ffprobe and transcriber.
    pub fn from_settings(settings: RenderSettings) -> Self {
        let runner = Arc::new(SystemFfmpegRunner::new(
            settings.ffmpeg_program.clone(),
            settings.stage_timeout(),
        ));
        let probe = Arc::new(SystemMediaProbe::new(
            settings.ffprobe_program.clone(),
            settings.stage_timeout(),
        ));
        let transcriber: Arc<dyn Transcriber> = match settings.transcriber.clone() {
            Some(command) => Arc::new(CommandTranscriber::new(
                command,
                settings.transcriber_timeout(),
            )),
            None => Arc::new(NoTranscriber),
        };
        Self::with_services(settings, runner, probe, transcriber)
    }

    pub fn with_services(
        settings: RenderSettings,
        runner: Arc<dyn FfmpegRunner>,
        probe: Arc<dyn MediaProbe>,
        transcriber: Arc<dyn Transcriber>,
    ) -> Self {
        Self {
            format: settings.default_format,
            settings,
            runner,
            probe,
            transcriber,
            tiers: default_tiers(),
            verbose: false,
        }
    }

    /// Stream ffmpeg stderr as debug events.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Select the output preset for subsequent renders.
    pub fn set_format(&mut self, kind: FormatKind) {
        emit(
            Level::Debug,
            "render.format.selected",
            &format!("Output format set to {}", kind.preset().name),
            None,
        );
        self.format = kind;
    }

    pub fn format(&self) -> FormatKind {
        self.format
    }

    /// Render `request` into the content directory.
    ///
    /// Returns all three output paths, or an error with nothing durable left
    /// behind for this request.
    pub async fn render(
        &self,
        request: &MediaRequest,
        progress: Option<ProgressCallback<'_>>,
    ) -> Result<RenderOutput, RenderError> {
        let progress = Progress::new(progress);

        validate_request_id(&request.request_id)?;
        let images = validate_background_images(&request.background_images)?;
        let total_duration = probe_audio_duration(self.probe.as_ref(), &request.audio_path).await?;

        let ctx = RenderContext::new(self.format, self.settings.fps, total_duration);
        emit(
            Level::Info,
            "render.start",
            &format!(
                "Rendering {} ({}, {}, {:.2}s, {} images)",
                request.request_id,
                ctx.preset.name,
                ctx.resolution(),
                total_duration,
                images.len()
            ),
            None,
        );
        if ctx.exceeds_nominal_duration() {
            emit(
                Level::Warn,
                "render.duration.long",
                &format!(
                    "Narration is {:.1}s, longer than the {} preset's nominal length",
                    total_duration, ctx.preset.name
                ),
                None,
            );
        }
        progress.report(PROGRESS_PLANNED);

        let mut layout = OutputLayout::new(&self.settings.content_dir(), &request.request_id);
        let work_dir = tempfile::Builder::new()
            .prefix(&format!("shortgen-{}-", request.request_id))
            .tempdir()?;

        let result = self
            .render_in(request, images, &ctx, work_dir.path(), &mut layout, &progress)
            .await;

        remove_work_dir(work_dir);
        if result.is_err() {
            layout.discard();
        }
        result
    }

    async fn render_in(
        &self,
        request: &MediaRequest,
        images: Vec<PathBuf>,
        ctx: &RenderContext,
        work_dir: &Path,
        layout: &mut OutputLayout,
        progress: &Progress<'_>,
    ) -> Result<RenderOutput, RenderError> {
        let language = request
            .language
            .as_deref()
            .map(str::trim)
            .filter(|lang| !lang.is_empty())
            .unwrap_or(&self.settings.default_language);

        let timing = resolve_timing(
            self.transcriber.as_ref(),
            &request.audio_path,
            language,
            &request.script,
            ctx.total_duration,
        )
        .await;
        let overlays = plan_overlays(&request.title, &timing.segments, ctx.total_duration);
        progress.report(PROGRESS_TIMED);

        let plan = plan_segments(images, ctx.total_duration)?;
        let encode: EncodeSettings = self.settings.encode_settings();
        let segment_count = plan.len();
        let segments = SegmentRenderer::new(self.runner.as_ref(), ctx, &encode, self.verbose)
            .render_all(
                &plan,
                work_dir,
                &mut motion_rng(self.settings.motion_seed),
                &|done| {
                    let span = (PROGRESS_SEGMENTS_DONE - PROGRESS_TIMED) as usize;
                    progress.report(PROGRESS_TIMED + (span * done / segment_count) as u8);
                },
            )
            .await?;

        layout.ensure_directories()?;
        let output = layout.output();

        let style = TextStyle::new(
            ctx,
            &self.settings.font_family,
            self.settings.font_file.clone(),
            self.settings.title_max_line_chars,
        );
        let compositor = Compositor {
            runner: self.runner.as_ref(),
            ctx,
            style: &style,
            encode: &encode,
            tiers: &self.tiers,
            work_dir,
            verbose: self.verbose,
        };
        layout.mark_written(&output.video_path);
        let report = compositor
            .compose(
                &segments,
                &request.audio_path,
                &overlays,
                &output.video_path,
                &|stage| progress.report(stage_progress(stage)),
            )
            .await?;

        layout.mark_written(&output.thumbnail_path);
        extract_thumbnail(
            self.runner.as_ref(),
            ctx,
            &output.video_path,
            &output.thumbnail_path,
            self.verbose,
        )
        .await?;

        layout.mark_written(&output.script_path);
        fs::write(&output.script_path, &request.script)?;

        emit(
            Level::Success,
            "render.done",
            &format!("Rendered {}", output.video_path.display()),
            Some(serde_json::json!({
                "request_id": request.request_id,
                "subtitle_tier": report.subtitle_tier,
                "stages": report.stages,
                "timing": format!("{:?}", timing.source),
            })),
        );
        Ok(output)
    }
}

/// Remove the run's temporary directory; failures are only logged.
fn remove_work_dir(work_dir: TempDir) {
    let path = work_dir.path().to_path_buf();
    if let Err(err) = work_dir.close() {
        emit(
            Level::Warn,
            "render.cleanup.failed",
            &format!("Failed to remove work directory {}: {err}", path.display()),
            None,
        );
    }
}
