//! Stream table engine: tables inferred from column alignment of text.
//!
//! 1. Find column gaps (large horizontal spaces) in each line
//! 2. Group consecutive lines whose gaps overlap column by column
//! 3. Runs of 3+ aligned lines are classified as tables
//! 4. Extract cell text by splitting inside the shared gaps
//!
//! Gaps are compared as intervals, not midpoints: in a left-aligned table
//! the gap after a short cell starts earlier than after a long one, but the
//! x where the next column begins stays put.
//!
//! Complexity: O(L * C) where L = lines, C = max columns per line.

use crate::pipeline::layout::CharLine;
use crate::pipeline::source::PageContent;
use crate::pipeline::tables::{TableEngine, TableError, TableGrid};

/// Minimum number of consecutive aligned rows to consider a table.
const MIN_TABLE_ROWS: usize = 3;

/// Tolerance (in PDF points) for column gap overlap.
const BOUNDARY_TOLERANCE: f32 = 5.0;

/// Gaps wider than this many average glyph widths separate columns.
const GAP_FACTOR: f32 = 2.0;

/// Secondary engine; runs in both modes.
#[derive(Debug, Default, Clone, Copy)]
pub struct StreamEngine;

impl TableEngine for StreamEngine {
    fn name(&self) -> &'static str {
        "stream"
    }

    fn extract(&self, _page: &PageContent, lines: &[CharLine]) -> Result<Vec<TableGrid>, TableError> {
        Ok(detect_tables(lines))
    }
}

/// Horizontal space between two cells of a line: from the right edge of
/// the left cell to the x where the next cell starts.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Gap {
    start: f32,
    end: f32,
}

impl Gap {
    fn overlaps(&self, other: &Gap, tolerance: f32) -> bool {
        self.start <= other.end + tolerance && other.start <= self.end + tolerance
    }

    fn intersect(&self, other: &Gap) -> Gap {
        Gap {
            start: self.start.max(other.start),
            end: self.end.min(other.end),
        }
    }

    /// Split position; glyphs left of it belong to the previous column.
    fn split_x(&self) -> f32 {
        (self.start + self.end) / 2.0
    }
}

/// Detect tables from reconstructed lines, top to bottom.
pub fn detect_tables(lines: &[CharLine]) -> Vec<TableGrid> {
    let line_gaps: Vec<Vec<Gap>> = lines.iter().map(find_column_gaps).collect();

    let mut tables = Vec::new();
    let mut run_start = 0;
    while run_start < lines.len() {
        // Gaps shared by every line of the run so far.
        let mut shared = line_gaps[run_start].clone();
        let mut run_end = run_start + 1;
        while run_end < lines.len() && gaps_align(&shared, &line_gaps[run_end], BOUNDARY_TOLERANCE) {
            shared = shared
                .iter()
                .zip(&line_gaps[run_end])
                .map(|(a, b)| a.intersect(b))
                .collect();
            run_end += 1;
        }

        if run_end - run_start >= MIN_TABLE_ROWS && !shared.is_empty() {
            let boundaries: Vec<f32> = shared.iter().map(Gap::split_x).collect();
            tables.push(
                lines[run_start..run_end]
                    .iter()
                    .map(|line| split_at_boundaries(line, &boundaries))
                    .collect(),
            );
        }
        run_start = run_end;
    }
    tables
}

/// Gaps between consecutive glyphs that are wide enough to separate columns.
fn find_column_gaps(line: &CharLine) -> Vec<Gap> {
    let chars: Vec<_> = line.chars.iter().filter(|c| !c.ch.is_whitespace()).collect();
    if chars.len() < 2 {
        return Vec::new();
    }

    let avg_width = chars.iter().map(|c| c.width).sum::<f32>() / chars.len() as f32;
    let gap_threshold = avg_width * GAP_FACTOR;

    chars
        .windows(2)
        .filter_map(|pair| {
            let gap = Gap {
                start: pair[0].right(),
                end: pair[1].x,
            };
            (gap.end - gap.start > gap_threshold).then_some(gap)
        })
        .collect()
}

/// Same number of gaps, each overlapping its counterpart within `tolerance`.
fn gaps_align(a: &[Gap], b: &[Gap], tolerance: f32) -> bool {
    if a.len() != b.len() || a.is_empty() {
        return false;
    }
    a.iter().zip(b).all(|(ga, gb)| ga.overlaps(gb, tolerance))
}

/// Split a line's glyphs at column boundaries into trimmed cell strings.
fn split_at_boundaries(line: &CharLine, boundaries: &[f32]) -> Vec<String> {
    let mut cells = vec![String::new(); boundaries.len() + 1];
    let mut prev_right: Option<(usize, f32)> = None;

    for ch in &line.chars {
        let col = boundaries
            .iter()
            .position(|&b| ch.x < b)
            .unwrap_or(boundaries.len());
        // Re-insert word spaces inside a cell.
        if let Some((prev_col, right)) = prev_right {
            if prev_col == col && ch.x - right > ch.width * 0.3 && !cells[col].ends_with(' ') {
                cells[col].push(' ');
            }
        }
        cells[col].push(ch.ch);
        prev_right = Some((col, ch.right()));
    }

    cells.into_iter().map(|s| s.trim().to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::layout::{group_lines, PdfChar};

    /// One row of cells, each cell starting at a fixed column x.
    fn row(cells: &[&str], top: f32) -> Vec<PdfChar> {
        cells
            .iter()
            .enumerate()
            .flat_map(|(i, cell)| PdfChar::run(cell, 72.0 + i as f32 * 120.0, top, 10.0, "Helvetica"))
            .collect()
    }

    #[test]
    fn finds_aligned_columns() {
        let mut chars = row(&["Name", "Age", "City"], 100.0);
        chars.extend(row(&["Alice", "30", "New York"], 112.0));
        chars.extend(row(&["Bob", "25", "LA"], 124.0));
        chars.extend(row(&["Carol", "35", "SF"], 136.0));
        let lines = group_lines(&chars);

        let tables = detect_tables(&lines);
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].len(), 4);
        assert_eq!(tables[0][0], vec!["Name", "Age", "City"]);
        assert_eq!(tables[0][1], vec!["Alice", "30", "New York"]);
    }

    #[test]
    fn two_aligned_rows_are_not_a_table() {
        let mut chars = row(&["a", "b"], 100.0);
        chars.extend(row(&["c", "d"], 112.0));
        assert!(detect_tables(&group_lines(&chars)).is_empty());
    }

    #[test]
    fn ignores_plain_text() {
        let mut chars = PdfChar::run("This is a paragraph of regular text.", 72.0, 100.0, 10.0, "Helvetica");
        chars.extend(PdfChar::run("Another line of plain text content.", 72.0, 112.0, 10.0, "Helvetica"));
        chars.extend(PdfChar::run("And one more line for good measure.", 72.0, 124.0, 10.0, "Helvetica"));
        assert!(detect_tables(&group_lines(&chars)).is_empty());
    }

    /// One row with cells starting at the given x positions.
    fn row_at(cells: &[&str], xs: &[f32], top: f32) -> Vec<PdfChar> {
        cells
            .iter()
            .zip(xs)
            .flat_map(|(cell, &x)| PdfChar::run(cell, x, top, 10.0, "Helvetica"))
            .collect()
    }

    #[test]
    fn left_aligned_cells_of_different_widths() {
        let mut chars = row_at(&["Name", "Age"], &[72.0, 200.0], 100.0);
        chars.extend(row_at(&["Ann", "31"], &[72.0, 200.0], 112.0));
        chars.extend(row_at(&["Bo", "42"], &[72.0, 200.0], 124.0));

        let tables = detect_tables(&group_lines(&chars));
        assert_eq!(tables.len(), 1);
        assert_eq!(
            tables[0],
            vec![vec!["Name", "Age"], vec!["Ann", "31"], vec!["Bo", "42"]]
        );
    }

    #[test]
    fn first_column_of_one_four_and_eight_chars() {
        let xs = [72.0, 200.0, 300.0];
        let mut chars = row_at(&["x", "1", "yes"], &xs, 100.0);
        chars.extend(row_at(&["abcd", "22", "no"], &xs, 112.0));
        chars.extend(row_at(&["abcdefgh", "333", "maybe"], &xs, 124.0));

        let tables = detect_tables(&group_lines(&chars));
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0][0], vec!["x", "1", "yes"]);
        assert_eq!(tables[0][1], vec!["abcd", "22", "no"]);
        assert_eq!(tables[0][2], vec!["abcdefgh", "333", "maybe"]);
    }

    #[test]
    fn shifted_column_ends_the_run() {
        let mut chars = row_at(&["a", "b"], &[72.0, 200.0], 100.0);
        chars.extend(row_at(&["c", "d"], &[72.0, 200.0], 112.0));
        chars.extend(row_at(&["e", "f"], &[72.0, 200.0], 124.0));
        // First cell runs across the shared gap.
        chars.extend(row_at(&["abcdefghijklmnopqrstuvwxyz0123", "g"], &[72.0, 260.0], 136.0));

        let tables = detect_tables(&group_lines(&chars));
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].len(), 3);
    }

    #[test]
    fn gap_alignment_rules() {
        let gap = |start, end| Gap { start, end };
        // Different starts, same next-column x.
        assert!(gaps_align(&[gap(80.0, 200.0)], &[gap(112.0, 200.0)], 5.0));
        assert!(gaps_align(&[gap(10.0, 20.0), gap(50.0, 60.0)], &[gap(12.0, 18.0), gap(58.0, 70.0)], 5.0));
        assert!(!gaps_align(&[gap(10.0, 20.0)], &[gap(10.0, 20.0), gap(50.0, 60.0)], 5.0));
        assert!(!gaps_align(&[gap(10.0, 20.0)], &[gap(30.0, 40.0)], 5.0));
        assert!(!gaps_align(&[], &[], 5.0));
    }
}
