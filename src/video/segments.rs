//! Still image to motion clip: scale/crop, slow zoom with eased pan, fades.

use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::ui::prelude::{Level, emit};

use super::config::EncodeSettings;
use super::error::RenderError;
use super::planner::{SegmentPlan, SegmentSlot};
use super::preset::RenderContext;
use super::support::ffmpeg::{FfmpegRunOptions, FfmpegRunner};
use super::support::utils::{format_time, remove_file_logged};

const ZOOM_CEILING: f64 = 1.15;
const FADE_SECONDS: f64 = 0.5;
/// Largest pan offset in source pixels, per axis
const MAX_PAN_PIXELS: f64 = 80.0;

/// Per-segment pan: `offset = amplitude * sin(frame / period_frames)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanMotion {
    pub amplitude_x: f64,
    pub amplitude_y: f64,
    pub period_frames: f64,
}

impl PanMotion {
    pub fn random(rng: &mut impl Rng, fps: u32) -> Self {
        Self {
            amplitude_x: signed_amplitude(rng, 20.0),
            amplitude_y: signed_amplitude(rng, 10.0),
            period_frames: fps as f64 * rng.gen_range(4.0..=8.0),
        }
    }
}

fn signed_amplitude(rng: &mut impl Rng, min: f64) -> f64 {
    let magnitude = rng.gen_range(min..=MAX_PAN_PIXELS);
    if rng.gen_bool(0.5) {
        magnitude
    } else {
        -magnitude
    }
}

/// Seeded when `seed` is set so renders can be reproduced.
pub fn motion_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

pub fn fade_duration(clip_seconds: f64) -> f64 {
    FADE_SECONDS.min(clip_seconds / 2.0)
}

pub fn segment_filter(ctx: &RenderContext, clip_seconds: f64, motion: &PanMotion) -> String {
    let (w, h) = (ctx.width, ctx.height);
    let frames = ctx.frames_for(clip_seconds);
    let zoom_rate = (ZOOM_CEILING - 1.0) / frames as f64;
    let fade = fade_duration(clip_seconds);

    format!(
        "scale={w}:{h}:force_original_aspect_ratio=increase,crop={w}:{h},\
zoompan=z='min(1+{rate:.8}*on,{ceil})':\
x='iw/2-(iw/zoom/2)+{ax:.2}*sin(on/{period:.2})':\
y='ih/2-(ih/zoom/2)+{ay:.2}*sin(on/{period:.2})':\
d=1:s={w}x{h}:fps={fps},\
fade=t=in:st=0:d={fade},fade=t=out:st={fade_out}:d={fade},format=yuv420p",
        rate = zoom_rate,
        ceil = ZOOM_CEILING,
        ax = motion.amplitude_x,
        ay = motion.amplitude_y,
        period = motion.period_frames,
        fps = ctx.fps,
        fade = format_time(fade),
        fade_out = format_time((clip_seconds - fade).max(0.0)),
    )
}

pub fn segment_args(
    ctx: &RenderContext,
    encode: &EncodeSettings,
    slot: &SegmentSlot,
    motion: &PanMotion,
    output: &Path,
) -> Vec<String> {
    vec![
        "-y".to_string(),
        "-loop".to_string(),
        "1".to_string(),
        "-framerate".to_string(),
        ctx.fps.to_string(),
        "-t".to_string(),
        format_time(slot.duration),
        "-i".to_string(),
        slot.image.to_string_lossy().into_owned(),
        "-vf".to_string(),
        segment_filter(ctx, slot.duration, motion),
        "-c:v".to_string(),
        "libx264".to_string(),
        "-preset".to_string(),
        encode.x264_preset.clone(),
        "-crf".to_string(),
        encode.crf.to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        "-r".to_string(),
        ctx.fps.to_string(),
        "-an".to_string(),
        output.to_string_lossy().into_owned(),
    ]
}

pub struct SegmentRenderer<'a> {
    runner: &'a dyn FfmpegRunner,
    ctx: &'a RenderContext,
    encode: &'a EncodeSettings,
    verbose: bool,
}

impl<'a> SegmentRenderer<'a> {
    pub fn new(
        runner: &'a dyn FfmpegRunner,
        ctx: &'a RenderContext,
        encode: &'a EncodeSettings,
        verbose: bool,
    ) -> Self {
        Self {
            runner,
            ctx,
            encode,
            verbose,
        }
    }

    /// Render every slot in order into `work_dir`.
    ///
    /// The first failure aborts the run; clips already written are removed
    /// before the error is returned. `on_rendered` receives the number of
    /// finished clips.
    pub async fn render_all(
        &self,
        plan: &SegmentPlan,
        work_dir: &Path,
        rng: &mut StdRng,
        on_rendered: &(dyn Fn(usize) + Sync),
    ) -> Result<Vec<PathBuf>, RenderError> {
        let motions: Vec<PanMotion> = plan
            .slots()
            .iter()
            .map(|_| PanMotion::random(rng, self.ctx.fps))
            .collect();

        let mut rendered: Vec<PathBuf> = Vec::with_capacity(plan.len());
        for (slot, motion) in plan.slots().iter().zip(&motions) {
            let output = work_dir.join(format!("segment_{:03}.mp4", slot.index));
            emit(
                Level::Info,
                "render.segment.start",
                &format!(
                    "Rendering segment {}/{} ({:.2}s at {:.2}s) from {}",
                    slot.index + 1,
                    plan.len(),
                    slot.duration,
                    slot.start,
                    slot.image.display()
                ),
                None,
            );

            let args = segment_args(self.ctx, self.encode, slot, motion, &output);
            let result = self
                .runner
                .run(&args, FfmpegRunOptions::new("segment", self.verbose))
                .await;

            if let Err(err) = result {
                emit(
                    Level::Error,
                    "render.segment.failed",
                    &format!("Segment {} failed: {err:#}", slot.index + 1),
                    None,
                );
                remove_file_logged(&output, "render.segment.cleanup_failed");
                for path in &rendered {
                    remove_file_logged(path, "render.segment.cleanup_failed");
                }
                return Err(RenderError::tool("segment render", err));
            }

            rendered.push(output);
            on_rendered(rendered.len());
        }

        Ok(rendered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::planner::plan_segments;
    use crate::video::preset::FormatKind;
    use crate::video::testing::FakeRunner;

    fn motion() -> PanMotion {
        PanMotion {
            amplitude_x: 40.0,
            amplitude_y: -20.0,
            period_frames: 150.0,
        }
    }

    #[test]
    fn filter_fills_crops_zooms_and_fades() {
        let ctx = RenderContext::new(FormatKind::Shorts, 30, 30.0);
        let filter = segment_filter(&ctx, 10.0, &motion());

        assert!(filter.starts_with(
            "scale=1080:1920:force_original_aspect_ratio=increase,crop=1080:1920,"
        ));
        assert!(filter.contains("zoompan=z='min(1+0.00050000*on,1.15)'"));
        assert!(filter.contains("+40.00*sin(on/150.00)"));
        assert!(filter.contains("+-20.00*sin(on/150.00)"));
        assert!(filter.contains("s=1080x1920:fps=30"));
        assert!(filter.contains("fade=t=in:st=0:d=0.500000"));
        assert!(filter.contains("fade=t=out:st=9.500000:d=0.500000"));
    }

    #[test]
    fn short_clips_get_shorter_fades() {
        assert_eq!(fade_duration(0.6), 0.3);
        assert_eq!(fade_duration(4.0), 0.5);
    }

    #[test]
    fn seeded_motion_is_reproducible_and_bounded() {
        let a: Vec<PanMotion> = {
            let mut rng = motion_rng(Some(7));
            (0..5).map(|_| PanMotion::random(&mut rng, 30)).collect()
        };
        let b: Vec<PanMotion> = {
            let mut rng = motion_rng(Some(7));
            (0..5).map(|_| PanMotion::random(&mut rng, 30)).collect()
        };
        assert_eq!(a, b);
        for m in a {
            assert!(m.amplitude_x.abs() >= 20.0 && m.amplitude_x.abs() <= MAX_PAN_PIXELS);
            assert!(m.amplitude_y.abs() >= 10.0 && m.amplitude_y.abs() <= MAX_PAN_PIXELS);
            assert!(m.period_frames >= 120.0 && m.period_frames <= 240.0);
        }
    }

    #[tokio::test]
    async fn renders_one_clip_per_slot_with_its_duration() {
        let dir = tempfile::tempdir().unwrap();
        let images = (0..3).map(|i| PathBuf::from(format!("/img/{i}.jpg"))).collect();
        let plan = plan_segments(images, 30.0).unwrap();
        let ctx = RenderContext::new(FormatKind::Shorts, 30, 30.0);
        let encode = EncodeSettings::default();
        let runner = FakeRunner::new();

        let clips = SegmentRenderer::new(&runner, &ctx, &encode, false)
            .render_all(&plan, dir.path(), &mut motion_rng(Some(1)), &|_| {})
            .await
            .unwrap();

        assert_eq!(clips.len(), 3);
        assert!(clips.iter().all(|c| c.exists()));
        assert_eq!(runner.flag_values("-t"), vec!["10.000000"; 3]);
        assert_eq!(runner.flag_values("-i"), vec!["/img/0.jpg", "/img/1.jpg", "/img/2.jpg"]);
    }

    #[tokio::test]
    async fn failure_removes_clips_already_rendered() {
        let dir = tempfile::tempdir().unwrap();
        let images = vec![
            PathBuf::from("/img/ok.jpg"),
            PathBuf::from("/img/broken.jpg"),
            PathBuf::from("/img/never.jpg"),
        ];
        let plan = plan_segments(images, 9.0).unwrap();
        let ctx = RenderContext::new(FormatKind::Normal, 30, 9.0);
        let encode = EncodeSettings::default();
        let runner = FakeRunner::new().failing_on("broken");

        let result = SegmentRenderer::new(&runner, &ctx, &encode, false)
            .render_all(&plan, dir.path(), &mut motion_rng(None), &|_| {})
            .await;

        assert!(matches!(result, Err(RenderError::ExternalTool { .. })));
        assert_eq!(runner.calls().len(), 2);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
