//! Title and subtitle overlays with their on-screen windows.

use super::text::sanitize_title;
use super::transcript::TranscriptSegment;

#[derive(Debug, Clone, PartialEq)]
pub struct TextOverlay {
    pub text: String,
    pub start: f64,
    pub duration: f64,
    pub is_title: bool,
}

impl TextOverlay {
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

/// The overlays of one render: an optional title followed by subtitles in
/// transcript order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverlayPlan {
    overlays: Vec<TextOverlay>,
}

impl OverlayPlan {
    pub fn title(&self) -> Option<&TextOverlay> {
        self.overlays.first().filter(|overlay| overlay.is_title)
    }

    pub fn subtitles(&self) -> &[TextOverlay] {
        match self.title() {
            Some(_) => &self.overlays[1..],
            None => &self.overlays,
        }
    }
}

/// Build the title overlay spanning `[0, total]` and one subtitle overlay per
/// segment, clamped to the video.
///
/// An empty (post-sanitize) title yields no title overlay; segments whose
/// clamped window is empty are dropped.
pub fn plan_overlays(title: &str, segments: &[TranscriptSegment], total_duration: f64) -> OverlayPlan {
    let mut overlays = Vec::with_capacity(segments.len() + 1);

    let title = sanitize_title(title);
    if !title.is_empty() {
        overlays.push(TextOverlay {
            text: title,
            start: 0.0,
            duration: total_duration,
            is_title: true,
        });
    }

    for segment in segments {
        let text = segment.text.trim();
        let start = segment.start.clamp(0.0, total_duration);
        let end = segment.end.clamp(start, total_duration);
        if text.is_empty() || end <= start {
            continue;
        }
        overlays.push(TextOverlay {
            text: text.to_string(),
            start,
            duration: end - start,
            is_title: false,
        });
    }

    OverlayPlan { overlays }
}

/// Overlays whose windows transitively overlap.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayCluster<'a> {
    pub start: f64,
    pub end: f64,
    pub members: Vec<&'a TextOverlay>,
}

/// Group overlays (in start order) into clusters.
///
/// An overlay joins the current cluster when it starts before the cluster's
/// running end, which then grows to the union of both windows. Overlays that
/// merely touch start a new cluster.
pub fn cluster_overlays(overlays: &[TextOverlay]) -> Vec<OverlayCluster<'_>> {
    let mut ordered: Vec<&TextOverlay> = overlays.iter().collect();
    ordered.sort_by(|a, b| a.start.total_cmp(&b.start));

    let mut clusters: Vec<OverlayCluster<'_>> = Vec::new();
    for overlay in ordered {
        match clusters.last_mut() {
            Some(cluster) if overlay.start < cluster.end => {
                cluster.end = cluster.end.max(overlay.end());
                cluster.members.push(overlay);
            }
            _ => clusters.push(OverlayCluster {
                start: overlay.start,
                end: overlay.end(),
                members: vec![overlay],
            }),
        }
    }
    clusters
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sub(text: &str, start: f64, end: f64) -> TextOverlay {
        TextOverlay {
            text: text.to_string(),
            start,
            duration: end - start,
            is_title: false,
        }
    }

    #[test]
    fn title_spans_video_and_precedes_subtitles() {
        let segments = vec![
            TranscriptSegment::new("Hello world.", 0.0, 15.0),
            TranscriptSegment::new("This is great!", 15.0, 30.0),
        ];
        let plan = plan_overlays("My\\nTitle", &segments, 30.0);

        let title = plan.title().unwrap();
        assert_eq!(title.text, "My Title");
        assert_eq!((title.start, title.end()), (0.0, 30.0));
        assert_eq!(plan.subtitles(), &[sub("Hello world.", 0.0, 15.0), sub("This is great!", 15.0, 30.0)]);
    }

    #[test]
    fn blank_title_is_omitted() {
        let plan = plan_overlays("  ", &[TranscriptSegment::new("a", 0.0, 1.0)], 5.0);
        assert!(plan.title().is_none());
        assert_eq!(plan.subtitles().len(), 1);
    }

    #[test]
    fn subtitles_stay_inside_the_video() {
        let segments = vec![
            TranscriptSegment::new("early", -2.0, 1.0),
            TranscriptSegment::new("late", 9.0, 14.0),
            TranscriptSegment::new("outside", 12.0, 13.0),
        ];
        let plan = plan_overlays("", &segments, 10.0);

        assert_eq!(plan.subtitles(), &[sub("early", 0.0, 1.0), sub("late", 9.0, 10.0)]);
        for overlay in plan.subtitles() {
            assert!(overlay.start >= 0.0 && overlay.end() <= 10.0);
        }
    }

    #[test]
    fn overlapping_overlays_share_a_cluster() {
        let overlays = vec![
            sub("a", 0.0, 2.0),
            sub("b", 1.0, 3.0),
            sub("c", 2.5, 4.0),
            sub("d", 4.0, 5.0),
        ];
        let clusters = cluster_overlays(&overlays);

        assert_eq!(clusters.len(), 2);
        assert_eq!((clusters[0].start, clusters[0].end), (0.0, 4.0));
        let texts: Vec<&str> = clusters[0].members.iter().map(|o| o.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "b", "c"]);
        assert_eq!(clusters[1].members.len(), 1);
    }

    #[test]
    fn contiguous_subtitles_get_their_own_clusters() {
        let overlays = vec![sub("x", 0.0, 15.0), sub("y", 15.0, 30.0)];
        assert_eq!(cluster_overlays(&overlays).len(), 2);
        assert!(cluster_overlays(&[]).is_empty());
    }
}
