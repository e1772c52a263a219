//! Table of contents: a nested link list built from the note's headings.
//!
//! The list is spliced in after the first `<!-- toc -->` marker. A list that a
//! previous run already placed there is replaced, so inserting twice gives
//! the same document as inserting once.

use once_cell::sync::Lazy;
use regex::Regex;

/// Marker line after which the list is inserted.
pub const TOC_MARKER: &str = "<!-- toc -->";

static RE_TOC_BULLET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:  )*- \[.*\]\(#.*\)$").unwrap());

/// One bullet per heading, indented two spaces per level below 1.
///
/// Lines inside fenced code blocks are not headings.
pub fn generate_toc<S: AsRef<str>>(lines: &[S]) -> Vec<String> {
    let mut toc = Vec::new();
    let mut in_fence = false;
    for line in lines {
        let line = line.as_ref();
        if line.trim_start().starts_with("```") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence || !line.starts_with('#') {
            continue;
        }
        let depth = line.chars().take_while(|&c| c == '#').count();
        let title = line.trim_start_matches('#').trim();
        let anchor = title.to_lowercase().replace(' ', "-");
        toc.push(format!(
            "{}- [{title}](#{anchor})",
            "  ".repeat(depth.saturating_sub(1))
        ));
    }
    toc
}

/// Insert (or refresh) the table of contents in a whole document.
///
/// Documents without a marker are returned unchanged. A trailing newline is
/// preserved.
pub fn insert_toc(document: &str) -> String {
    let lines: Vec<&str> = document.lines().collect();
    let Some(marker) = lines.iter().position(|l| l.trim() == TOC_MARKER) else {
        return document.to_string();
    };

    // Skip a list generated by an earlier run, plus its closing blank line.
    let mut resume = marker + 1;
    while resume < lines.len() && RE_TOC_BULLET.is_match(lines[resume]) {
        resume += 1;
    }
    if resume < lines.len() && lines[resume].is_empty() {
        resume += 1;
    }

    let rest: Vec<&str> = lines[..=marker]
        .iter()
        .chain(lines[resume..].iter())
        .copied()
        .collect();
    let toc = generate_toc(&rest);

    let mut out: Vec<String> = Vec::with_capacity(rest.len() + toc.len() + 1);
    out.extend(lines[..=marker].iter().map(|s| s.to_string()));
    out.extend(toc);
    out.push(String::new());
    out.extend(lines[resume..].iter().map(|s| s.to_string()));

    let mut joined = out.join("\n");
    if document.ends_with('\n') {
        joined.push('\n');
    }
    joined
}
