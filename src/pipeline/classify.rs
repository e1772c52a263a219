//! Line classification: heading, code, callout or plain text.
//!
//! Every decision here is a pure function of one [`TextLine`] and the page's
//! body font size. [`classify`] runs the rules in precedence order
//! (code > callout > heading) and falls through to plain text, so adding a
//! rule means adding one entry to [`RULES`].

use crate::pipeline::layout::TextLine;

/// Font-size ratios (line size / body size) for heading levels 1–3.
const HEADING_RATIOS: [(f32, u8); 3] = [(1.6, 1), (1.35, 2), (1.15, 3)];

/// Lines with a higher share of punctuation than this look like code.
const SYMBOL_DENSITY_THRESHOLD: f32 = 0.2;

/// Obsidian admonition kinds recognised from a `kind:` prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalloutKind {
    Note,
    Warning,
    Tip,
    Important,
}

impl CalloutKind {
    const ALL: [CalloutKind; 4] = [
        CalloutKind::Note,
        CalloutKind::Warning,
        CalloutKind::Tip,
        CalloutKind::Important,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CalloutKind::Note => "note",
            CalloutKind::Warning => "warning",
            CalloutKind::Tip => "tip",
            CalloutKind::Important => "important",
        }
    }
}

/// What a line renders as.
#[derive(Debug, Clone, PartialEq)]
pub enum LineKind {
    /// Whitespace only.
    Blank,
    /// Part of a fenced code block.
    Code,
    /// `> [!kind]` admonition with the text after the first colon.
    Callout { kind: CalloutKind, body: String },
    /// `#`-heading of level 1–3.
    Heading(u8),
    Plain,
}

type Rule = fn(&TextLine, f32) -> Option<LineKind>;

/// Classification rules in precedence order.
const RULES: [Rule; 3] = [code_rule, callout_rule, heading_rule];

/// Classify one line against the page's body size.
pub fn classify(line: &TextLine, body_size: f32) -> LineKind {
    if line.text.trim().is_empty() {
        return LineKind::Blank;
    }
    RULES
        .iter()
        .find_map(|rule| rule(line, body_size))
        .unwrap_or(LineKind::Plain)
}

fn code_rule(line: &TextLine, _body_size: f32) -> Option<LineKind> {
    is_code_line(line).then_some(LineKind::Code)
}

fn callout_rule(line: &TextLine, _body_size: f32) -> Option<LineKind> {
    let text = line.text.trim();
    let kind = callout_for(text)?;
    let body = text
        .split_once(':')
        .map(|(_, rest)| rest.trim())
        .unwrap_or_default()
        .to_string();
    Some(LineKind::Callout { kind, body })
}

fn heading_rule(line: &TextLine, body_size: f32) -> Option<LineKind> {
    heading_level(line.font_size, body_size).map(LineKind::Heading)
}

/// Median font size of all lines; 0 when there are none.
pub fn body_size(lines: &[TextLine]) -> f32 {
    let mut sizes: Vec<f32> = lines.iter().map(|l| l.font_size).collect();
    if sizes.is_empty() {
        return 0.0;
    }
    sizes.sort_by(|a, b| a.total_cmp(b));
    let mid = sizes.len() / 2;
    if sizes.len() % 2 == 0 {
        (sizes[mid - 1] + sizes[mid]) / 2.0
    } else {
        sizes[mid]
    }
}

/// Heading level for a font size, or `None` for body text.
pub fn heading_level(font_size: f32, body_size: f32) -> Option<u8> {
    if body_size <= 0.0 {
        return None;
    }
    HEADING_RATIOS
        .iter()
        .find(|(ratio, _)| font_size >= body_size * ratio)
        .map(|&(_, level)| level)
}

/// Fraction of characters that are neither alphanumeric nor whitespace.
pub fn symbol_density(text: &str) -> f32 {
    let total = text.chars().count();
    if total == 0 {
        return 0.0;
    }
    let symbols = text
        .chars()
        .filter(|c| !c.is_alphanumeric() && !c.is_whitespace())
        .count();
    symbols as f32 / total as f32
}

/// Monospace font, four-space indent, or punctuation-heavy text.
pub fn is_code_line(line: &TextLine) -> bool {
    line.is_mono
        || line.text.starts_with("    ")
        || (symbol_density(&line.text) > SYMBOL_DENSITY_THRESHOLD
            && line.text.chars().count() > 6)
}

/// Callout kind for a stripped line, matched case-insensitively on its prefix.
pub fn callout_for(text: &str) -> Option<CalloutKind> {
    let lowered = text.to_lowercase();
    CalloutKind::ALL
        .into_iter()
        .find(|kind| lowered.starts_with(&format!("{}:", kind.as_str())))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(text: &str, size: f32, mono: bool) -> TextLine {
        TextLine {
            text: text.to_string(),
            font_size: size,
            font_name: if mono { "Courier" } else { "Helvetica" }.to_string(),
            x: 72.0,
            y: 100.0,
            is_mono: mono,
        }
    }

    #[test]
    fn body_size_median_odd_and_even() {
        let odd = [line("a", 10.0, false), line("b", 18.0, false), line("c", 11.0, false)];
        assert_eq!(body_size(&odd), 11.0);
        let even = [line("a", 10.0, false), line("b", 12.0, false)];
        assert_eq!(body_size(&even), 11.0);
        assert_eq!(body_size(&[]), 0.0);
    }

    #[test]
    fn heading_thresholds() {
        assert_eq!(heading_level(16.0, 10.0), Some(1));
        assert_eq!(heading_level(13.5, 10.0), Some(2));
        assert_eq!(heading_level(11.5, 10.0), Some(3));
        assert_eq!(heading_level(11.4, 10.0), None);
        assert_eq!(heading_level(30.0, 0.0), None);
    }

    #[test]
    fn heading_level_never_increases_with_size() {
        let mut last = u8::MAX;
        for tenth in 100..250 {
            let level = heading_level(tenth as f32 / 10.0, 10.0).unwrap_or(4);
            assert!(level <= last, "level went up at size {tenth}");
            last = level;
        }
    }

    #[test]
    fn symbol_density_counts_punctuation() {
        assert_eq!(symbol_density(""), 0.0);
        assert_eq!(symbol_density("abcd"), 0.0);
        assert_eq!(symbol_density("a{}b"), 0.5);
    }

    #[test]
    fn code_detection() {
        assert!(is_code_line(&line("x", 10.0, true)));
        assert!(is_code_line(&line("    indented", 10.0, false)));
        assert!(is_code_line(&line("a = {b};", 10.0, false)));
        assert!(!is_code_line(&line("{};", 10.0, false)));
        assert!(!is_code_line(&line("Plain prose, mostly.", 10.0, false)));
    }

    #[test]
    fn callout_detection_is_case_insensitive() {
        assert_eq!(callout_for("NOTE: x"), Some(CalloutKind::Note));
        assert_eq!(callout_for("Important: y"), Some(CalloutKind::Important));
        assert_eq!(callout_for("Notes: z"), None);
    }

    #[test]
    fn classify_precedence() {
        // Mono beats callout.
        assert_eq!(classify(&line("Note: in code", 10.0, true), 10.0), LineKind::Code);
        // Callout beats heading.
        assert_eq!(
            classify(&line("Warning: Big", 20.0, false), 10.0),
            LineKind::Callout {
                kind: CalloutKind::Warning,
                body: "Big".into()
            }
        );
        assert_eq!(classify(&line("Title", 20.0, false), 10.0), LineKind::Heading(1));
        assert_eq!(classify(&line("Body text", 10.0, false), 10.0), LineKind::Plain);
        assert_eq!(classify(&line("   ", 10.0, true), 10.0), LineKind::Blank);
    }

    #[test]
    fn callout_body_is_text_after_first_colon() {
        match classify(&line("  tip: use a: colon ", 10.0, false), 10.0) {
            LineKind::Callout { kind, body } => {
                assert_eq!(kind, CalloutKind::Tip);
                assert_eq!(body, "use a: colon");
            }
            other => panic!("expected callout, got {other:?}"),
        }
    }
}
