//! Layout reconstruction: positioned characters → visual lines → blocks.
//!
//! The PDF engine hands us individual glyphs with bounding boxes. Everything
//! downstream (classifier, caption matcher, table engines) works on lines and
//! blocks, so this module rebuilds them:
//!
//! 1. Sort glyphs top-to-bottom, then left-to-right.
//! 2. Group glyphs whose baselines are within 0.4 × glyph height into a line.
//! 3. Insert spaces at horizontal gaps wider than 0.3 × average glyph width.
//! 4. Merge vertically adjacent, horizontally overlapping lines into blocks.
//!
//! All coordinates here are *layout* coordinates: PDF points with the origin
//! at the top-left corner and y growing downwards, so sorting by `(y, x)`
//! approximates reading order and "below an image" means "larger y".

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Font-name fragments that mark a monospace face.
const MONO_HINTS: [&str; 5] = ["mono", "courier", "consolas", "code", "menlo"];

/// Invisible characters that PDFs like to scatter through text runs.
const INVISIBLE: [char; 6] = [
    '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
];

/// Axis-aligned rectangle in layout coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x0: f32,
    pub top: f32,
    pub x1: f32,
    pub bottom: f32,
}

impl Rect {
    pub fn new(x0: f32, top: f32, x1: f32, bottom: f32) -> Self {
        Self {
            x0: x0.min(x1),
            top: top.min(bottom),
            x1: x0.max(x1),
            bottom: top.max(bottom),
        }
    }

    /// Convert a PDF rectangle (origin bottom-left) on a page of height
    /// `page_height` into layout coordinates.
    pub fn from_pdf(left: f32, bottom: f32, right: f32, top: f32, page_height: f32) -> Self {
        Self::new(left, page_height - top, right, page_height - bottom)
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    pub fn union(&self, other: &Rect) -> Rect {
        Rect {
            x0: self.x0.min(other.x0),
            top: self.top.min(other.top),
            x1: self.x1.max(other.x1),
            bottom: self.bottom.max(other.bottom),
        }
    }

    /// True when the horizontal extents share at least one point.
    pub fn overlaps_horizontally(&self, other: &Rect) -> bool {
        self.x0 <= other.x1 && other.x0 <= self.x1
    }

    pub fn contains_point(&self, x: f32, y: f32) -> bool {
        x >= self.x0 && x <= self.x1 && y >= self.top && y <= self.bottom
    }
}

/// One glyph as reported by the PDF engine.
#[derive(Debug, Clone, PartialEq)]
pub struct PdfChar {
    pub ch: char,
    /// Left edge.
    pub x: f32,
    /// Top edge.
    pub top: f32,
    pub width: f32,
    pub height: f32,
    /// Scaled font size in points.
    pub font_size: f32,
    pub font_name: String,
}

impl PdfChar {
    pub fn bottom(&self) -> f32 {
        self.top + self.height
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.top + self.height / 2.0)
    }

    /// Lay out `text` as a run of fixed-advance glyphs starting at `(x, top)`.
    ///
    /// Each glyph is `font_size × 0.5` wide and `font_size` high. Useful for
    /// building in-memory pages without a PDF engine.
    pub fn run(text: &str, x: f32, top: f32, font_size: f32, font_name: &str) -> Vec<PdfChar> {
        let advance = font_size * 0.5;
        text.chars()
            .enumerate()
            .map(|(i, ch)| PdfChar {
                ch,
                x: x + i as f32 * advance,
                top,
                width: advance,
                height: font_size,
                font_size,
                font_name: font_name.to_string(),
            })
            .collect()
    }
}

/// A visual line of text, the unit the classifier works on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextLine {
    pub text: String,
    pub font_size: f32,
    pub font_name: String,
    #[serde(rename = "x0")]
    pub x: f32,
    #[serde(rename = "y0")]
    pub y: f32,
    pub is_mono: bool,
}

/// A paragraph-ish group of lines; caption candidates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    pub rect: Rect,
    pub text: String,
}

/// A reconstructed line that still carries its glyphs.
#[derive(Debug, Clone)]
pub struct CharLine {
    pub text: String,
    pub rect: Rect,
    pub chars: Vec<PdfChar>,
}

impl CharLine {
    /// Collapse into the classifier's line record.
    pub fn to_text_line(&self) -> TextLine {
        let font_size = self
            .chars
            .iter()
            .map(|c| c.font_size)
            .fold(0.0_f32, f32::max);
        let font_name = self
            .chars
            .first()
            .map(|c| c.font_name.clone())
            .unwrap_or_default();
        let is_mono = self.chars.iter().any(|c| is_mono_font(&c.font_name));
        TextLine {
            text: self.text.clone(),
            font_size,
            font_name,
            x: self.rect.x0,
            y: self.rect.top,
            is_mono,
        }
    }
}

/// Does this font name look like a monospace face?
pub fn is_mono_font(font_name: &str) -> bool {
    let lower = font_name.to_lowercase();
    MONO_HINTS.iter().any(|hint| lower.contains(hint))
}

/// Map a raw glyph to the character we keep, if any.
///
/// Non-breaking spaces become plain spaces; invisible formatting characters
/// are dropped.
pub fn normalise_char(ch: char) -> Option<char> {
    if INVISIBLE.contains(&ch) {
        None
    } else if ch == '\u{00A0}' {
        Some(' ')
    } else {
        Some(ch)
    }
}

fn by_position(a: f32, b: f32) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

/// Group glyphs into visual lines, top to bottom.
pub fn group_lines(chars: &[PdfChar]) -> Vec<CharLine> {
    if chars.is_empty() {
        return Vec::new();
    }

    let mut sorted = chars.to_vec();
    sorted.sort_by(|a, b| by_position(a.bottom(), b.bottom()).then(by_position(a.x, b.x)));

    let mut lines = Vec::new();
    let mut current: Vec<PdfChar> = Vec::new();

    for ch in sorted {
        let same_line = current.first().is_some_and(|anchor| {
            let tolerance = (anchor.height * 0.4).max(1.0);
            (ch.bottom() - anchor.bottom()).abs() < tolerance
        });
        if !same_line && !current.is_empty() {
            lines.push(build_line(std::mem::take(&mut current)));
        }
        current.push(ch);
    }
    if !current.is_empty() {
        lines.push(build_line(current));
    }

    lines.sort_by(|a, b| by_position(a.rect.top, b.rect.top).then(by_position(a.rect.x0, b.rect.x0)));
    lines
}

/// Build a [`CharLine`] from glyphs on one baseline, inserting spaces at gaps.
fn build_line(mut chars: Vec<PdfChar>) -> CharLine {
    chars.sort_by(|a, b| by_position(a.x, b.x));

    let avg_width = chars.iter().map(|c| c.width).sum::<f32>() / chars.len() as f32;
    let space_threshold = avg_width * 0.3;

    let mut text = String::new();
    let mut rect = Rect::new(chars[0].x, chars[0].top, chars[0].right(), chars[0].bottom());
    for (i, ch) in chars.iter().enumerate() {
        if i > 0 {
            let prev = &chars[i - 1];
            let gap = ch.x - prev.right();
            if gap > space_threshold && !prev.ch.is_whitespace() && !ch.ch.is_whitespace() {
                text.push(' ');
            }
        }
        text.push(ch.ch);
        rect = rect.union(&Rect::new(ch.x, ch.top, ch.right(), ch.bottom()));
    }

    CharLine { text, rect, chars }
}

/// Classifier records for every line, in `(y, x)` order.
pub fn text_lines(lines: &[CharLine]) -> Vec<TextLine> {
    let mut out: Vec<TextLine> = lines.iter().map(CharLine::to_text_line).collect();
    sort_reading_order(&mut out);
    out
}

/// Stable sort by `(y, x)`.
pub fn sort_reading_order(lines: &mut [TextLine]) {
    lines.sort_by(|a, b| by_position(a.y, b.y).then(by_position(a.x, b.x)));
}

/// Merge lines into blocks: a line joins the open block when it starts no
/// further than half a line height below the previous line and overlaps the
/// block horizontally.
pub fn group_blocks(lines: &[CharLine]) -> Vec<TextBlock> {
    struct Open {
        rect: Rect,
        last: Rect,
        texts: Vec<String>,
    }

    let mut blocks = Vec::new();
    let mut open: Option<Open> = None;

    let close = |block: Open, blocks: &mut Vec<TextBlock>| {
        let text = block.texts.join(" ").trim().to_string();
        if !text.is_empty() {
            blocks.push(TextBlock {
                rect: block.rect,
                text,
            });
        }
    };

    for line in lines {
        let stripped = line.text.trim().to_string();
        match open.as_mut() {
            Some(block)
                if line.rect.top - block.last.bottom <= block.last.height() * 0.5
                    && line.rect.overlaps_horizontally(&block.rect) =>
            {
                block.rect = block.rect.union(&line.rect);
                block.last = line.rect;
                if !stripped.is_empty() {
                    block.texts.push(stripped);
                }
            }
            _ => {
                if let Some(done) = open.take() {
                    close(done, &mut blocks);
                }
                open = Some(Open {
                    rect: line.rect,
                    last: line.rect,
                    texts: if stripped.is_empty() {
                        Vec::new()
                    } else {
                        vec![stripped]
                    },
                });
            }
        }
    }
    if let Some(done) = open {
        close(done, &mut blocks);
    }
    blocks
}
