//! Narration length and its partition across background images.

use std::path::{Path, PathBuf};

use crate::ui::prelude::{Level, emit};

use super::error::RenderError;
use super::support::ffmpeg::MediaProbe;

/// One background image's share of the video.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentSlot {
    pub index: usize,
    pub image: PathBuf,
    pub start: f64,
    pub duration: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SegmentPlan {
    slots: Vec<SegmentSlot>,
}

impl SegmentPlan {
    pub fn slots(&self) -> &[SegmentSlot] {
        &self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }
}

/// Keep the images that exist as regular files, preserving order.
pub fn validate_background_images(images: &[PathBuf]) -> Result<Vec<PathBuf>, RenderError> {
    let mut usable = Vec::with_capacity(images.len());
    for image in images {
        if image.is_file() {
            usable.push(image.clone());
        } else {
            emit(
                Level::Warn,
                "render.images.missing",
                &format!("Skipping missing background image {}", image.display()),
                None,
            );
        }
    }

    if usable.is_empty() {
        return Err(RenderError::NoBackgroundImages);
    }
    Ok(usable)
}

pub async fn probe_audio_duration(
    probe: &dyn MediaProbe,
    audio_path: &Path,
) -> Result<f64, RenderError> {
    let unavailable = |reason: String| RenderError::DurationUnavailable {
        path: audio_path.to_path_buf(),
        reason,
    };

    if !audio_path.is_file() {
        return Err(unavailable("file does not exist".to_string()));
    }

    let duration = probe
        .duration_seconds(audio_path)
        .await
        .map_err(|err| unavailable(format!("{err:#}")))?;

    if !duration.is_finite() || duration <= 0.0 {
        return Err(unavailable(format!("reported duration {duration} is not positive")));
    }
    Ok(duration)
}

/// Per-image duration `total / count`; `None` when there is nothing to split.
pub fn segment_duration(total_duration: f64, image_count: usize) -> Option<f64> {
    (image_count > 0).then(|| total_duration / image_count as f64)
}

pub fn plan_segments(images: Vec<PathBuf>, total_duration: f64) -> Result<SegmentPlan, RenderError> {
    let duration =
        segment_duration(total_duration, images.len()).ok_or(RenderError::NoBackgroundImages)?;

    let last = images.len() - 1;
    let slots = images
        .into_iter()
        .enumerate()
        .map(|(index, image)| {
            let start = duration * index as f64;
            SegmentSlot {
                index,
                image,
                start,
                // last slot absorbs rounding so the plan ends at total_duration
                duration: if index == last {
                    total_duration - start
                } else {
                    duration
                },
            }
        })
        .collect();

    Ok(SegmentPlan { slots })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::testing::FakeProbe;
    use std::fs;

    #[test]
    fn durations_split_evenly_and_sum_to_total() {
        for (total, count) in [(30.0, 3usize), (59.7, 7), (1.0, 1), (12.345, 11)] {
            let images = (0..count)
                .map(|i| PathBuf::from(format!("{i}.jpg")))
                .collect();
            let plan = plan_segments(images, total).unwrap();

            assert_eq!(plan.len(), count);
            let sum: f64 = plan.slots().iter().map(|s| s.duration).sum();
            assert!((sum - total).abs() < 1e-9, "sum {sum} != {total}");
            for slot in plan.slots() {
                assert!((slot.duration - total / count as f64).abs() < 1e-12);
            }
            let last = plan.slots().last().unwrap();
            assert!((last.start + last.duration - total).abs() < 1e-9);
        }
    }

    #[test]
    fn empty_image_list_is_rejected() {
        assert!(matches!(
            plan_segments(Vec::new(), 10.0),
            Err(RenderError::NoBackgroundImages)
        ));
        assert!(matches!(
            validate_background_images(&[]),
            Err(RenderError::NoBackgroundImages)
        ));
    }

    #[test]
    fn missing_images_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("a.jpg");
        fs::write(&present, b"jpg").unwrap();
        let missing = dir.path().join("b.jpg");

        let usable = validate_background_images(&[missing.clone(), present.clone()]).unwrap();
        assert_eq!(usable, vec![present]);

        assert!(matches!(
            validate_background_images(&[missing]),
            Err(RenderError::NoBackgroundImages)
        ));
    }

    #[tokio::test]
    async fn zero_or_unreadable_duration_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let audio = dir.path().join("voice.mp3");
        fs::write(&audio, b"mp3").unwrap();

        let zero = FakeProbe::with_duration(0.0);
        assert!(matches!(
            probe_audio_duration(&zero, &audio).await,
            Err(RenderError::DurationUnavailable { .. })
        ));

        let broken = FakeProbe::failing();
        assert!(matches!(
            probe_audio_duration(&broken, &audio).await,
            Err(RenderError::DurationUnavailable { .. })
        ));

        let ok = FakeProbe::with_duration(30.0);
        assert_eq!(probe_audio_duration(&ok, &audio).await.unwrap(), 30.0);

        assert!(matches!(
            probe_audio_duration(&ok, &dir.path().join("missing.mp3")).await,
            Err(RenderError::DurationUnavailable { .. })
        ));
    }
}
