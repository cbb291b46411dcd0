//! Text preparation and drawtext/drawbox filter construction.

use std::path::PathBuf;

use lazy_static::lazy_static;
use regex::Regex;

use super::preset::RenderContext;
use super::support::utils::{escape_filter_path, escape_filter_value, format_time};

lazy_static! {
    /// Literal `\n`, `\r`, `\t` escapes and any whitespace, in runs.
    static ref TITLE_WHITESPACE: Regex = Regex::new(r"(?:\\[nrt]|\s)+").unwrap();
}

/// Collapse escaped and literal line breaks, tabs and whitespace runs into
/// single spaces.
pub fn sanitize_title(title: &str) -> String {
    TITLE_WHITESPACE.replace_all(title, " ").trim().to_string()
}

/// Greedy word wrap to at most `max_chars` characters per line.
///
/// A word longer than the limit is hard-split into chunks of exactly
/// `max_chars`; its remainder may share a line with the following words.
pub fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let max = max_chars.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for word in text.split_whitespace() {
        let chars: Vec<char> = word.chars().collect();

        if current_len > 0 && current_len + 1 + chars.len() <= max {
            current.push(' ');
            current.push_str(word);
            current_len += 1 + chars.len();
            continue;
        }

        if current_len > 0 {
            lines.push(std::mem::take(&mut current));
        }

        let mut rest = chars.as_slice();
        while rest.len() > max {
            lines.push(rest[..max].iter().collect());
            rest = &rest[max..];
        }
        current = rest.iter().collect();
        current_len = rest.len();
    }

    if current_len > 0 {
        lines.push(current);
    }
    lines
}

/// Font selection for drawtext: an explicit file, or a fontconfig family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FontSpec {
    File(PathBuf),
    Family(String),
}

impl FontSpec {
    pub fn new(family: &str, file: Option<PathBuf>) -> Self {
        match file {
            Some(path) => FontSpec::File(path),
            None => FontSpec::Family(family.to_string()),
        }
    }

    fn to_option(&self) -> String {
        match self {
            FontSpec::File(path) => format!("fontfile='{}'", escape_filter_path(path)),
            FontSpec::Family(family) => format!("font='{}'", escape_filter_value(family)),
        }
    }
}

fn enable_option(window: Option<(f64, f64)>) -> Option<String> {
    window.map(|(start, end)| {
        format!(
            "enable='between(t,{},{})'",
            format_time(start),
            format_time(end)
        )
    })
}

/// Sizes and fonts for burnt-in text, resolved for one output shape.
#[derive(Debug, Clone, PartialEq)]
pub struct TextStyle {
    pub font: FontSpec,
    pub font_family: String,
    pub title_max_chars: usize,
    pub subtitle_max_chars: usize,
    pub title_font_size: u32,
    pub subtitle_font_size: u32,
    pub padding: u32,
    /// Top edge of the title panel
    pub title_top: u32,
    /// Distance between the subtitle block and the bottom edge
    pub subtitle_bottom: u32,
}

impl TextStyle {
    pub fn new(
        ctx: &RenderContext,
        font_family: &str,
        font_file: Option<PathBuf>,
        title_max_chars: usize,
    ) -> Self {
        let subtitle_max_chars = if ctx.preset.kind.is_vertical() { 28 } else { 42 };
        Self {
            font: FontSpec::new(font_family, font_file),
            font_family: font_family.to_string(),
            title_max_chars: title_max_chars.max(1),
            subtitle_max_chars,
            title_font_size: ctx.scaled(72.0).round() as u32,
            subtitle_font_size: ctx.scaled(60.0).round() as u32,
            padding: ctx.scaled(32.0).round() as u32,
            title_top: (ctx.height as f64 * 0.08).round() as u32,
            subtitle_bottom: (ctx.height as f64 * 0.12).round() as u32,
        }
    }

    pub fn line_height(font_size: u32) -> u32 {
        (font_size as f64 * 1.3).round() as u32
    }
}

/// One `drawtext` filter instance.
#[derive(Debug, Clone)]
pub struct DrawText {
    pub text: String,
    pub font: FontSpec,
    pub font_size: u32,
    pub color: String,
    /// x/y are filter expressions, e.g. `(w-text_w)/2`
    pub x: String,
    pub y: String,
    pub border_width: u32,
    pub border_color: String,
    pub window: Option<(f64, f64)>,
}

impl DrawText {
    pub fn to_filter(&self) -> String {
        let mut options = vec![
            self.font.to_option(),
            format!("text='{}'", escape_filter_value(&self.text)),
            "expansion=none".to_string(),
            format!("fontsize={}", self.font_size),
            format!("fontcolor={}", self.color),
            format!("x={}", self.x),
            format!("y={}", self.y),
        ];
        if self.border_width > 0 {
            options.push(format!("borderw={}", self.border_width));
            options.push(format!("bordercolor={}", self.border_color));
        }
        options.extend(enable_option(self.window));
        format!("drawtext={}", options.join(":"))
    }
}

/// One filled `drawbox` panel.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawBox {
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
    pub color: String,
    pub window: Option<(f64, f64)>,
}

impl DrawBox {
    pub fn to_filter(&self) -> String {
        let mut options = vec![
            format!("x={}", self.x),
            format!("y={}", self.y),
            format!("w={}", self.width),
            format!("h={}", self.height),
            format!("color={}", self.color),
            "t=fill".to_string(),
        ];
        options.extend(enable_option(self.window));
        format!("drawbox={}", options.join(":"))
    }
}

/// Width in pixels of `chars` glyphs, using an average advance of 0.55 em.
pub fn estimate_text_width(chars: usize, font_size: u32) -> u32 {
    (chars as u64 * font_size as u64 * 11).div_ceil(20) as u32
}

/// Lines stacked inside a padded panel.
#[derive(Debug, Clone, PartialEq)]
pub struct TextBlock {
    pub lines: Vec<String>,
    pub font_size: u32,
    pub padding: u32,
}

impl TextBlock {
    pub fn line_height(&self) -> u32 {
        TextStyle::line_height(self.font_size)
    }

    /// Panel width and height, the width capped at `max_width`.
    pub fn panel_size(&self, max_width: u32) -> (u32, u32) {
        let widest = self
            .lines
            .iter()
            .map(|line| line.chars().count())
            .max()
            .unwrap_or(0);
        let width = estimate_text_width(widest, self.font_size) + 2 * self.padding;
        let height = self.lines.len() as u32 * self.line_height() + 2 * self.padding;
        (width.min(max_width), height)
    }

    /// Top of line `index` for a panel whose top edge is `panel_y`.
    pub fn line_y(&self, panel_y: i64, index: usize) -> i64 {
        let line_height = self.line_height();
        panel_y
            + self.padding as i64
            + (index as u32 * line_height) as i64
            + (line_height.saturating_sub(self.font_size) / 2) as i64
    }
}
