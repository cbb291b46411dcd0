//! ASS (Advanced SubStation Alpha) file generation for the styled tier.

use crate::video::overlay::{TextOverlay, cluster_overlays};
use crate::video::preset::RenderContext;
use crate::video::text::TextStyle;

/// Style configuration for ASS subtitles.
#[derive(Debug, Clone)]
pub struct AssStyle {
    pub name: String,
    pub font_name: String,
    /// Font size in script pixels
    pub font_size: u32,
    /// Primary color in ABGR format (e.g., &H00FFFFFF for white)
    pub primary_color: String,
    pub outline_color: String,
    /// Background/shadow color in ABGR format
    pub back_color: String,
    pub bold: bool,
    /// Outline width in pixels
    pub outline: u32,
    /// Shadow depth in pixels
    pub shadow: u32,
    /// Alignment (numpad layout: 1-3=bottom, 4-6=mid, 7-9=top)
    pub alignment: u8,
    pub margin_l: u32,
    pub margin_r: u32,
    /// Distance from the bottom edge for bottom-aligned text
    pub margin_v: u32,
}

impl AssStyle {
    /// Bold gold text with a dark outline and soft shadow, bottom-centered.
    pub fn accent(ctx: &RenderContext, text: &TextStyle) -> Self {
        Self {
            name: "Accent".to_string(),
            font_name: text.font_family.clone(),
            font_size: text.subtitle_font_size,
            // #FFD700
            primary_color: "&H0000D7FF".to_string(),
            outline_color: "&H00000000".to_string(),
            back_color: "&H80000000".to_string(),
            bold: true,
            outline: ctx.scaled(4.0).round() as u32,
            shadow: ctx.scaled(2.0).round() as u32,
            alignment: 2,
            margin_l: ctx.scaled(60.0).round() as u32,
            margin_r: ctx.scaled(60.0).round() as u32,
            margin_v: text.subtitle_bottom,
        }
    }

    fn to_style_line(&self) -> String {
        let bold_val = if self.bold { -1 } else { 0 };
        format!(
            "Style: {name},{font},{size},{primary},{primary},{outline},{back},{bold},0,0,0,100,100,0,0,1,{outline_w},{shadow},{align},{ml},{mr},{mv},1",
            name = self.name,
            font = self.font_name,
            size = self.font_size,
            primary = self.primary_color,
            outline = self.outline_color,
            back = self.back_color,
            bold = bold_val,
            outline_w = self.outline,
            shadow = self.shadow,
            align = self.alignment,
            ml = self.margin_l,
            mr = self.margin_r,
            mv = self.margin_v,
        )
    }

    /// Vertical step between overlays stacked in one cluster.
    fn stack_step(&self) -> u32 {
        TextStyle::line_height(self.font_size)
    }
}

/// Generate ASS file content with one Dialogue line per overlay.
///
/// Overlays that overlap in time are stacked upwards: the n-th member of a
/// cluster sits `n` line heights above the style's bottom margin.
pub fn generate_ass_file(overlays: &[TextOverlay], style: &AssStyle, play_res: (u32, u32)) -> String {
    let mut lines = vec![
        "[Script Info]".to_string(),
        "ScriptType: v4.00+".to_string(),
        format!("PlayResX: {}", play_res.0),
        format!("PlayResY: {}", play_res.1),
        "WrapStyle: 0".to_string(),
        "ScaledBorderAndShadow: yes".to_string(),
        String::new(),
        "[V4+ Styles]".to_string(),
        "Format: Name, Fontname, Fontsize, PrimaryColour, SecondaryColour, OutlineColour, BackColour, Bold, Italic, Underline, StrikeOut, ScaleX, ScaleY, Spacing, Angle, BorderStyle, Outline, Shadow, Alignment, MarginL, MarginR, MarginV, Encoding".to_string(),
        style.to_style_line(),
        String::new(),
        "[Events]".to_string(),
        "Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text".to_string(),
    ];

    for cluster in cluster_overlays(overlays) {
        for (position, overlay) in cluster.members.iter().enumerate() {
            let margin_v = style.margin_v + position as u32 * style.stack_step();
            lines.push(format!(
                "Dialogue: 0,{start},{end},{style},,0,0,{margin_v},,{text}",
                start = format_ass_timestamp(overlay.start),
                end = format_ass_timestamp(overlay.end()),
                style = style.name,
                text = escape_ass_text(&overlay.text),
            ));
        }
    }

    let mut output = lines.join("\n");
    output.push('\n');
    output
}

/// Format seconds as an ASS timestamp (H:MM:SS.cc).
fn format_ass_timestamp(seconds: f64) -> String {
    let total_cs = (seconds.max(0.0) * 100.0).round() as u64;
    let hours = total_cs / 360_000;
    let minutes = (total_cs % 360_000) / 6_000;
    let secs = (total_cs % 6_000) / 100;
    let centiseconds = total_cs % 100;

    format!("{hours}:{minutes:02}:{secs:02}.{centiseconds:02}")
}

/// Escape special characters in ASS text.
fn escape_ass_text(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('{', "\\{")
        .replace('}', "\\}")
        .replace('\n', "\\N")
}
