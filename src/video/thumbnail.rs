use std::path::Path;

use crate::ui::prelude::{Level, emit};

use super::error::RenderError;
use super::preset::RenderContext;
use super::support::ffmpeg::{FfmpegRunOptions, FfmpegRunner};
use super::support::utils::format_time;

/// Seek position for the thumbnail frame: 1 s in, or the midpoint of very
/// short videos.
pub fn thumbnail_time(video_duration: f64) -> f64 {
    if video_duration < 2.0 {
        (video_duration / 2.0).max(0.0)
    } else {
        1.0
    }
}

pub fn thumbnail_args(ctx: &RenderContext, video: &Path, output: &Path) -> Vec<String> {
    vec![
        "-y".to_string(),
        "-ss".to_string(),
        format_time(thumbnail_time(ctx.total_duration)),
        "-i".to_string(),
        video.to_string_lossy().into_owned(),
        "-frames:v".to_string(),
        "1".to_string(),
        "-vf".to_string(),
        format!("scale={}:{}", ctx.width, ctx.height),
        "-q:v".to_string(),
        "2".to_string(),
        output.to_string_lossy().into_owned(),
    ]
}

/// Grab one frame of the finished video as a JPEG at the preset resolution.
pub async fn extract_thumbnail(
    runner: &dyn FfmpegRunner,
    ctx: &RenderContext,
    video: &Path,
    output: &Path,
    verbose: bool,
) -> Result<(), RenderError> {
    let failed = |message: String| RenderError::ThumbnailExtractionFailed {
        video: video.to_path_buf(),
        message,
    };

    emit(
        Level::Info,
        "render.thumbnail.start",
        &format!("Extracting thumbnail to {}", output.display()),
        None,
    );

    runner
        .run(
            &thumbnail_args(ctx, video, output),
            FfmpegRunOptions::new("thumbnail", verbose),
        )
        .await
        .map_err(|err| failed(format!("{err:#}")))?;

    let written = std::fs::metadata(output).is_ok_and(|meta| meta.len() > 0);
    if !written {
        return Err(failed("no frame was written".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::preset::FormatKind;
    use crate::video::testing::FakeRunner;

    #[test]
    fn seeks_one_second_or_midpoint() {
        assert_eq!(thumbnail_time(30.0), 1.0);
        assert_eq!(thumbnail_time(2.0), 1.0);
        assert_eq!(thumbnail_time(1.0), 0.5);
    }

    #[test]
    fn scales_to_preset_resolution() {
        let ctx = RenderContext::new(FormatKind::Normal, 30, 12.0);
        let args = thumbnail_args(&ctx, Path::new("v.mp4"), Path::new("t.jpg"));
        assert!(args.contains(&"scale=1920:1080".to_string()));
        assert_eq!(args[2], "1.000000");
        assert_eq!(args.last().unwrap(), "t.jpg");
    }

    #[tokio::test]
    async fn tool_failure_is_surfaced() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = RenderContext::new(FormatKind::Shorts, 30, 30.0);
        let runner = FakeRunner::new().failing_stage("thumbnail");

        let result = extract_thumbnail(
            &runner,
            &ctx,
            Path::new("video.mp4"),
            &dir.path().join("thumb.jpg"),
            false,
        )
        .await;

        assert!(matches!(
            result,
            Err(RenderError::ThumbnailExtractionFailed { .. })
        ));
    }

    #[tokio::test]
    async fn writes_the_frame() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = RenderContext::new(FormatKind::Shorts, 30, 30.0);
        let output = dir.path().join("thumb.jpg");

        extract_thumbnail(&FakeRunner::new(), &ctx, Path::new("video.mp4"), &output, false)
            .await
            .unwrap();
        assert!(output.exists());
    }
}
