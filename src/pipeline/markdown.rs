//! Markdown rendering for one page.
//!
//! The renderer walks the page's lines in the order it is given and never
//! reorders them. Its output is a list of lines; the orchestrator joins them
//! with `\n` and appends a trailing newline when writing to `page.md`.
//!
//! ```text
//! <!-- page: N -->
//! [OCR callout]
//! classified lines (headings, callouts, fenced code, plain text)
//! [image links]
//! [tables]
//! ```

use crate::pipeline::classify::{body_size, classify, LineKind};
use crate::pipeline::layout::TextLine;
use serde::{Deserialize, Serialize};

/// An exported image, as referenced from the note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRef {
    /// Path relative to the output directory, e.g. `images/p0001_img01.png`.
    pub path: String,
    /// Caption taken from the nearest text block below the image.
    pub caption: Option<String>,
}

/// An extracted table, as referenced from the note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRef {
    pub markdown: Option<String>,
    /// Path relative to the output directory, e.g. `tables/p0001_table01.csv`.
    pub csv_path: Option<String>,
    /// Which table engine produced it.
    pub engine: String,
}

const OCR_NOTICE: [&str; 3] = ["> [!note]", "> OCR-derived content for this page.", ""];

/// Render one page into Markdown lines.
pub fn render_page(
    lines: &[TextLine],
    page_number: u32,
    images: &[ImageRef],
    tables: &[TableRef],
    ocr_used: bool,
    code_language: &str,
) -> Vec<String> {
    let body = body_size(lines);
    let mut out = vec![format!("<!-- page: {page_number} -->")];

    if ocr_used {
        out.extend(OCR_NOTICE.iter().map(|s| s.to_string()));
    }

    let mut in_code = false;
    for line in lines {
        let kind = classify(line, body);

        match kind {
            LineKind::Blank => {
                if in_code {
                    out.push(String::new());
                }
                continue;
            }
            LineKind::Code => {
                if !in_code {
                    out.push(format!("```{code_language}"));
                    in_code = true;
                }
                out.push(line.text.trim_end().to_string());
                continue;
            }
            _ => {}
        }

        if in_code {
            close_fence(&mut out);
            in_code = false;
        }

        let text = line.text.trim();
        match kind {
            LineKind::Callout { kind, body } => {
                out.push(format!("> [!{}]", kind.as_str()));
                out.push(format!("> {body}"));
                out.push(String::new());
            }
            LineKind::Heading(level) => {
                out.push(format!("{} {text}", "#".repeat(level as usize)));
            }
            _ => out.push(text.to_string()),
        }
    }
    if in_code {
        close_fence(&mut out);
    }

    if !images.is_empty() {
        out.push(String::new());
        for image in images {
            let alt = image
                .caption
                .as_deref()
                .filter(|c| !c.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| format!("Page {page_number} image"));
            out.push(format!("![{alt}]({})", image.path));
        }
        out.push(String::new());
    }

    if !tables.is_empty() {
        out.push(String::new());
        for table in tables {
            if let Some(md) = table.markdown.as_deref().filter(|m| !m.is_empty()) {
                out.push(md.to_string());
                out.push(String::new());
            } else if let Some(csv) = table.csv_path.as_deref().filter(|p| !p.is_empty()) {
                out.push(format!("[Table data]({csv})"));
                out.push(String::new());
            }
        }
    }

    out
}

fn close_fence(out: &mut Vec<String>) {
    out.push("```".to_string());
    out.push(String::new());
}
