//! Positioned text fragments and row clustering
//!
//! Fragments arrive in no particular order. Rows are recovered purely from
//! Y positions using a tolerance derived from the page's own line pitch, so
//! dense and sparse statement templates group the same way.

use std::cmp::Ordering;

use crate::orchestrator::ParseOptions;

/// One contiguous glyph run extracted from a page
#[derive(Debug, Clone, PartialEq)]
pub struct PositionedFragment {
    /// The text content
    pub text: String,
    /// Left edge on the page
    pub x: f32,
    /// Baseline position (PDF coordinates, larger y is higher on the page)
    pub y: f32,
    /// Width of the run (0.0 when unknown)
    pub width: f32,
    /// Height of the run
    pub height: f32,
}

impl PositionedFragment {
    pub fn new(text: impl Into<String>, x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            text: text.into(),
            x,
            y,
            width,
            height,
        }
    }

    /// Right edge, never left of `x`
    pub fn right(&self) -> f32 {
        self.x + self.width.max(0.0)
    }
}

/// All fragments of one page
#[derive(Debug, Clone, Default)]
pub struct PageFragments {
    /// Page number (1-indexed)
    pub page_number: u32,
    pub fragments: Vec<PositionedFragment>,
}

impl PageFragments {
    pub fn new(page_number: u32, fragments: Vec<PositionedFragment>) -> Self {
        Self {
            page_number,
            fragments,
        }
    }
}

/// Fragments sharing a horizontal text line, sorted left to right
#[derive(Debug, Clone)]
pub struct Row {
    pub fragments: Vec<PositionedFragment>,
    /// Y of the topmost fragment (the row anchor)
    pub y: f32,
}

impl Row {
    pub fn text(&self) -> String {
        self.fragments
            .iter()
            .map(|f| f.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn lowercase_text(&self) -> String {
        self.text().to_lowercase()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }
}

/// Total order on fragments: top to bottom, then left to right, then text.
/// Sorting with this makes row building independent of input order.
fn reading_order(a: &PositionedFragment, b: &PositionedFragment) -> Ordering {
    b.y.total_cmp(&a.y)
        .then_with(|| a.x.total_cmp(&b.x))
        .then_with(|| a.text.cmp(&b.text))
        .then_with(|| a.width.total_cmp(&b.width))
        .then_with(|| a.height.total_cmp(&b.height))
}

/// Median of the consecutive y-gaps above the noise floor.
///
/// `ys` must be sorted descending. Returns `None` when every fragment sits
/// on (nearly) the same line.
pub fn line_pitch(ys: &[f32], noise_floor: f32) -> Option<f32> {
    let mut gaps: Vec<f32> = ys
        .windows(2)
        .map(|w| w[0] - w[1])
        .filter(|&gap| gap > noise_floor)
        .collect();

    if gaps.is_empty() {
        return None;
    }

    gaps.sort_by(f32::total_cmp);
    let mid = gaps.len() / 2;
    let median = if gaps.len() % 2 == 0 {
        (gaps[mid - 1] + gaps[mid]) / 2.0
    } else {
        gaps[mid]
    };
    Some(median)
}

/// Grouping tolerance for a page: a fraction of the line pitch, clamped
pub fn row_tolerance(pitch: Option<f32>, options: &ParseOptions) -> f32 {
    match pitch {
        Some(pitch) => (pitch * options.row_tolerance_factor)
            .clamp(options.min_row_tolerance, options.max_row_tolerance),
        // Single line: any positive tolerance groups it
        None => options.min_row_tolerance,
    }
}

/// Cluster one page's fragments into rows, top to bottom.
///
/// A new row starts whenever a fragment is further below the current row's
/// anchor than the adaptive tolerance.
pub fn build_rows(fragments: &[PositionedFragment], options: &ParseOptions) -> Vec<Row> {
    if fragments.is_empty() {
        return Vec::new();
    }

    let mut sorted: Vec<PositionedFragment> = fragments
        .iter()
        .filter(|f| !f.text.trim().is_empty())
        .cloned()
        .collect();
    sorted.sort_by(reading_order);

    let ys: Vec<f32> = sorted.iter().map(|f| f.y).collect();
    let tolerance = row_tolerance(line_pitch(&ys, options.gap_noise_floor), options);

    let mut rows: Vec<Row> = Vec::new();
    for fragment in sorted {
        let joins_current = rows
            .last()
            .is_some_and(|row| row.y - fragment.y <= tolerance);

        if joins_current {
            if let Some(row) = rows.last_mut() {
                row.fragments.push(fragment);
            }
        } else {
            rows.push(Row {
                y: fragment.y,
                fragments: vec![fragment],
            });
        }
    }

    for row in &mut rows {
        row.fragments.sort_by(|a, b| {
            a.x.total_cmp(&b.x)
                .then_with(|| a.text.cmp(&b.text))
                .then_with(|| b.y.total_cmp(&a.y))
        });
    }

    rows
}
