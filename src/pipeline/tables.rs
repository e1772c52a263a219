//! Table extraction adapter.
//!
//! Two engines work on the page geometry: the lattice engine (ruled tables,
//! accurate mode only) and the stream engine (column alignment). The primary
//! engine runs first when allowed; if it finds nothing, fails, or is skipped,
//! the secondary engine runs. Every table found is written as a CSV file and
//! rendered as a Markdown pipe table.

use crate::capabilities::Capabilities;
use crate::config::Mode;
use crate::error::{PageWarning, Pdf2NoteError};
use crate::pipeline::layout::CharLine;
use crate::pipeline::markdown::TableRef;
use crate::pipeline::source::PageContent;
use crate::pipeline::table_lattice::LatticeEngine;
use crate::pipeline::table_stream::StreamEngine;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

/// Rows of cell strings; the first row is the header.
pub type TableGrid = Vec<Vec<String>>;

#[derive(Debug, Error)]
pub enum TableError {
    /// The page geometry cannot be turned into a table.
    #[error("malformed table geometry: {0}")]
    Malformed(String),
}

/// A table detector working on one page's geometry.
pub trait TableEngine: Send + Sync {
    /// Name recorded in the manifest's table entries.
    fn name(&self) -> &'static str;

    fn extract(&self, page: &PageContent, lines: &[CharLine]) -> Result<Vec<TableGrid>, TableError>;
}

/// Tables found on one page plus any engine failures.
#[derive(Debug, Default)]
pub struct PageTables {
    pub tables: Vec<TableRef>,
    pub warnings: Vec<PageWarning>,
}

/// Run the engines for one page and write each table's CSV into `tables_dir`.
///
/// Returned CSV paths are relative to the output directory
/// (`tables/p0001_table01.csv`). A CSV write failure is fatal.
pub fn extract_tables(
    page: &PageContent,
    lines: &[CharLine],
    mode: Mode,
    capabilities: &Capabilities,
    tables_dir: &Path,
) -> Result<PageTables, Pdf2NoteError> {
    let mut result = PageTables::default();

    let mut engines: Vec<&dyn TableEngine> = Vec::with_capacity(2);
    if mode == Mode::Accurate && capabilities.has_primary_table_engine {
        engines.push(&LatticeEngine);
    }
    if capabilities.has_secondary_table_engine {
        engines.push(&StreamEngine);
    }

    for engine in engines {
        let grids = match engine.extract(page, lines) {
            Ok(grids) => grids,
            Err(e) => {
                warn!(page = page.number, engine = engine.name(), "Table engine failed: {e}");
                result.warnings.push(PageWarning::TableEngineFailed {
                    page: page.number,
                    engine: engine.name().to_string(),
                    detail: e.to_string(),
                });
                continue;
            }
        };
        if grids.is_empty() {
            continue;
        }

        for (i, rows) in grids.iter().enumerate() {
            let file_name = format!("p{:04}_table{:02}.csv", page.number, i + 1);
            let csv_path = tables_dir.join(&file_name);
            std::fs::write(&csv_path, rows_to_csv(rows)).map_err(|e| {
                Pdf2NoteError::OutputWriteFailed {
                    path: csv_path.clone(),
                    source: e,
                }
            })?;
            result.tables.push(TableRef {
                markdown: rows_to_markdown(rows),
                csv_path: Some(format!("tables/{file_name}")),
                engine: engine.name().to_string(),
            });
        }
        debug!(page = page.number, engine = engine.name(), count = grids.len(), "Tables extracted");
        break;
    }

    Ok(result)
}

/// Markdown pipe table. Short body rows are padded to the header width.
pub fn rows_to_markdown(rows: &[Vec<String>]) -> Option<String> {
    let (header, body) = rows.split_first()?;

    let mut lines = vec![
        pipe_row(header.iter().map(String::as_str)),
        pipe_row(header.iter().map(|_| "---")),
    ];
    for row in body {
        let padding = header.len().saturating_sub(row.len());
        lines.push(pipe_row(
            row.iter()
                .map(String::as_str)
                .chain(std::iter::repeat_n("", padding)),
        ));
    }
    Some(lines.join("\n"))
}

fn pipe_row<'a>(cells: impl Iterator<Item = &'a str>) -> String {
    format!("| {} |", cells.map(str::trim).collect::<Vec<_>>().join(" | "))
}

/// RFC 4180 CSV with `\r\n` row endings.
pub fn rows_to_csv(rows: &[Vec<String>]) -> String {
    let mut out = String::new();
    for row in rows {
        let fields: Vec<String> = row.iter().map(|f| csv_field(f)).collect();
        out.push_str(&fields.join(","));
        out.push_str("\r\n");
    }
    out
}

fn csv_field(field: &str) -> String {
    if field.contains([',', '"', '\r', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
