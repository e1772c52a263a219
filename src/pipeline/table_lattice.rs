//! Lattice table engine: tables drawn with ruling lines.
//!
//! Path objects thinner than [`RULE_THICKNESS`] in one direction become
//! horizontal or vertical edges; larger rectangles contribute their four
//! sides. Edges that touch are clustered, and each cluster with enough
//! distinct x and y positions becomes a grid. Glyphs are assigned to the cell
//! that contains their centre.

use crate::pipeline::layout::{group_lines, CharLine, PdfChar, Rect};
use crate::pipeline::source::PageContent;
use crate::pipeline::tables::{TableEngine, TableError, TableGrid};

/// Paths thinner than this (points) are treated as single lines.
const RULE_THICKNESS: f32 = 2.0;

/// Snap and touch tolerance (points).
const TOLERANCE: f32 = 1.0;

/// Grids larger than this are rejected as noise (hatching, charts).
const MAX_CELLS: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Edge {
    Horizontal { y: f32, x0: f32, x1: f32 },
    Vertical { x: f32, top: f32, bottom: f32 },
}

impl Edge {
    fn bbox(&self) -> Rect {
        match *self {
            Edge::Horizontal { y, x0, x1 } => Rect::new(x0, y, x1, y),
            Edge::Vertical { x, top, bottom } => Rect::new(x, top, x, bottom),
        }
    }
}

/// Primary engine; used in accurate mode only.
#[derive(Debug, Default, Clone, Copy)]
pub struct LatticeEngine;

impl TableEngine for LatticeEngine {
    fn name(&self) -> &'static str {
        "lattice"
    }

    fn extract(&self, page: &PageContent, _lines: &[CharLine]) -> Result<Vec<TableGrid>, TableError> {
        let edges = edges_from_paths(&page.paths);
        let mut tables = Vec::new();
        for cluster in cluster_edges(&edges) {
            if let Some(grid) = build_grid(&cluster, &page.chars)? {
                tables.push(grid);
            }
        }
        Ok(tables)
    }
}

fn edges_from_paths(paths: &[Rect]) -> Vec<Edge> {
    let mut edges = Vec::new();
    for r in paths {
        let thin_h = r.height() <= RULE_THICKNESS;
        let thin_w = r.width() <= RULE_THICKNESS;
        match (thin_w, thin_h) {
            (false, true) => edges.push(Edge::Horizontal {
                y: (r.top + r.bottom) / 2.0,
                x0: r.x0,
                x1: r.x1,
            }),
            (true, false) => edges.push(Edge::Vertical {
                x: (r.x0 + r.x1) / 2.0,
                top: r.top,
                bottom: r.bottom,
            }),
            (false, false) => {
                edges.push(Edge::Horizontal { y: r.top, x0: r.x0, x1: r.x1 });
                edges.push(Edge::Horizontal { y: r.bottom, x0: r.x0, x1: r.x1 });
                edges.push(Edge::Vertical { x: r.x0, top: r.top, bottom: r.bottom });
                edges.push(Edge::Vertical { x: r.x1, top: r.top, bottom: r.bottom });
            }
            (true, true) => {}
        }
    }
    edges
}

fn touches(a: &Rect, b: &Rect) -> bool {
    a.x0 <= b.x1 + TOLERANCE
        && b.x0 <= a.x1 + TOLERANCE
        && a.top <= b.bottom + TOLERANCE
        && b.top <= a.bottom + TOLERANCE
}

/// Group edges into connected components of touching bounding boxes.
fn cluster_edges(edges: &[Edge]) -> Vec<Vec<Edge>> {
    let mut parent: Vec<usize> = (0..edges.len()).collect();

    fn find(parent: &mut [usize], mut i: usize) -> usize {
        while parent[i] != i {
            parent[i] = parent[parent[i]];
            i = parent[i];
        }
        i
    }

    let boxes: Vec<Rect> = edges.iter().map(Edge::bbox).collect();
    for i in 0..edges.len() {
        for j in (i + 1)..edges.len() {
            if touches(&boxes[i], &boxes[j]) {
                let (ri, rj) = (find(&mut parent, i), find(&mut parent, j));
                if ri != rj {
                    parent[rj] = ri;
                }
            }
        }
    }

    let mut clusters: Vec<(usize, Vec<Edge>)> = Vec::new();
    for (i, edge) in edges.iter().enumerate() {
        let root = find(&mut parent, i);
        match clusters.iter_mut().find(|(r, _)| *r == root) {
            Some((_, members)) => members.push(*edge),
            None => clusters.push((root, vec![*edge])),
        }
    }

    let mut clusters: Vec<Vec<Edge>> = clusters.into_iter().map(|(_, e)| e).collect();
    clusters.sort_by(|a, b| {
        let (ta, tb) = (cluster_top(a), cluster_top(b));
        ta.total_cmp(&tb)
    });
    clusters
}

fn cluster_top(edges: &[Edge]) -> f32 {
    edges
        .iter()
        .map(|e| e.bbox().top)
        .fold(f32::INFINITY, f32::min)
}

/// Sorted positions with values closer than [`TOLERANCE`] merged.
fn snap(mut values: Vec<f32>) -> Vec<f32> {
    values.sort_by(|a, b| a.total_cmp(b));
    let mut out: Vec<f32> = Vec::new();
    for v in values {
        match out.last() {
            Some(&last) if v - last <= TOLERANCE => {}
            _ => out.push(v),
        }
    }
    out
}

fn build_grid(edges: &[Edge], chars: &[PdfChar]) -> Result<Option<TableGrid>, TableError> {
    let xs = snap(
        edges
            .iter()
            .filter_map(|e| match e {
                Edge::Vertical { x, .. } => Some(*x),
                Edge::Horizontal { .. } => None,
            })
            .collect(),
    );
    let ys = snap(
        edges
            .iter()
            .filter_map(|e| match e {
                Edge::Horizontal { y, .. } => Some(*y),
                Edge::Vertical { .. } => None,
            })
            .collect(),
    );
    if xs.len() < 2 || ys.len() < 2 {
        return Ok(None);
    }

    let (rows, cols) = (ys.len() - 1, xs.len() - 1);
    let cells = rows * cols;
    if cells < 2 {
        return Ok(None);
    }
    if cells > MAX_CELLS {
        return Err(TableError::Malformed(format!(
            "{rows}x{cols} ruling grid is too large to be a table"
        )));
    }

    let mut buckets: Vec<Vec<PdfChar>> = vec![Vec::new(); cells];
    for ch in chars {
        let (cx, cy) = ch.center();
        let col = xs.windows(2).position(|w| cx >= w[0] && cx < w[1]);
        let row = ys.windows(2).position(|w| cy >= w[0] && cy < w[1]);
        if let (Some(r), Some(c)) = (row, col) {
            buckets[r * cols + c].push(ch.clone());
        }
    }

    let grid = buckets
        .chunks(cols)
        .map(|row| row.iter().map(|cell| cell_text(cell)).collect())
        .collect();
    Ok(Some(grid))
}

fn cell_text(chars: &[PdfChar]) -> String {
    group_lines(chars)
        .iter()
        .map(|l| l.text.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A ruled grid with `cols` columns 100pt wide and `rows` rows 20pt high.
    fn ruled_grid(x: f32, y: f32, cols: usize, rows: usize) -> Vec<Rect> {
        let mut paths = Vec::new();
        let width = cols as f32 * 100.0;
        let height = rows as f32 * 20.0;
        for r in 0..=rows {
            let ry = y + r as f32 * 20.0;
            paths.push(Rect::new(x, ry - 0.5, x + width, ry + 0.5));
        }
        for c in 0..=cols {
            let cx = x + c as f32 * 100.0;
            paths.push(Rect::new(cx - 0.5, y, cx + 0.5, y + height));
        }
        paths
    }

    fn text(s: &str, x: f32, top: f32) -> Vec<PdfChar> {
        PdfChar::run(s, x, top, 10.0, "Helvetica")
    }

    #[test]
    fn extracts_ruled_table() {
        let mut chars = text("Item", 110.0, 105.0);
        chars.extend(text("Qty", 210.0, 105.0));
        chars.extend(text("Apple", 110.0, 125.0));
        chars.extend(text("3", 210.0, 125.0));
        chars.extend(text("outside", 400.0, 300.0));
        let page = PageContent {
            number: 1,
            paths: ruled_grid(100.0, 100.0, 2, 2),
            chars,
            ..Default::default()
        };

        let tables = LatticeEngine.extract(&page, &[]).unwrap();
        assert_eq!(tables.len(), 1);
        assert_eq!(
            tables[0],
            vec![vec!["Item".to_string(), "Qty".into()], vec!["Apple".into(), "3".into()]]
        );
    }

    #[test]
    fn rectangle_paths_contribute_four_edges() {
        let paths = vec![
            Rect::new(100.0, 100.0, 200.0, 120.0),
            Rect::new(200.0, 100.0, 300.0, 120.0),
        ];
        let page = PageContent {
            paths,
            chars: text("A", 140.0, 105.0),
            ..Default::default()
        };
        let tables = LatticeEngine.extract(&page, &[]).unwrap();
        assert_eq!(tables, vec![vec![vec!["A".to_string(), String::new()]]]);
    }

    #[test]
    fn separate_grids_are_separate_tables() {
        let mut paths = ruled_grid(100.0, 100.0, 2, 1);
        paths.extend(ruled_grid(100.0, 400.0, 1, 2));
        let page = PageContent {
            paths,
            ..Default::default()
        };
        let tables = LatticeEngine.extract(&page, &[]).unwrap();
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].len(), 1);
        assert_eq!(tables[1].len(), 2);
    }

    #[test]
    fn lone_rule_is_not_a_table() {
        let page = PageContent {
            paths: vec![Rect::new(72.0, 400.0, 540.0, 400.5)],
            ..Default::default()
        };
        assert!(LatticeEngine.extract(&page, &[]).unwrap().is_empty());
    }

    #[test]
    fn huge_grid_is_an_error() {
        let page = PageContent {
            paths: ruled_grid(0.0, 0.0, 200, 60),
            ..Default::default()
        };
        assert!(matches!(
            LatticeEngine.extract(&page, &[]),
            Err(TableError::Malformed(_))
        ));
    }
}
