//! Column ranges and semantic column types
//!
//! A statement table is modeled as a partition of the horizontal axis into
//! labeled ranges. Every fragment maps to exactly one range, so a row can be
//! turned into cells without any delimiters.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::fragment::Row;
use crate::grammar::{self, has_word};

/// Semantic type of a column, drives merge policy and export formatting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Date,
    Amount,
    Text,
}

/// What an amount column records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmountRole {
    /// Money leaving the account (debit, withdrawal, dr)
    Debit,
    /// Money entering the account (credit, deposit, cr)
    Credit,
    /// Running balance
    Balance,
    /// Signed or unsided amount
    Generic,
}

/// A named column position, before ranges are computed
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnAnchor {
    pub label: String,
    /// Left edge of the header text (or cluster center for inferred columns)
    pub x: f32,
    pub column_type: ColumnType,
}

/// A horizontal interval `[start_x, end_x)` assigned to one column
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnRange {
    pub label: String,
    pub start_x: f32,
    pub end_x: f32,
    pub column_type: ColumnType,
    /// Position the range was derived from, used to break boundary ties
    pub anchor_x: f32,
}

impl ColumnRange {
    pub fn contains(&self, x: f32) -> bool {
        x >= self.start_x && x < self.end_x
    }

    pub fn amount_role(&self) -> Option<AmountRole> {
        match self.column_type {
            ColumnType::Amount => Some(amount_role(&self.label)),
            _ => None,
        }
    }
}

/// Infer a column's type from its header label
pub fn infer_column_type(label: &str) -> ColumnType {
    let lower = label.to_lowercase();
    if grammar::DATE_LABELS.iter().any(|l| lower.contains(l))
        || grammar::DATE_LABEL_ABBREVIATIONS
            .iter()
            .any(|l| has_word(&lower, l))
    {
        ColumnType::Date
    } else if is_amount_label(&lower) {
        ColumnType::Amount
    } else {
        ColumnType::Text
    }
}

fn is_amount_label(lower: &str) -> bool {
    grammar::DEBIT_LABELS
        .iter()
        .chain(grammar::CREDIT_LABELS)
        .chain(grammar::BALANCE_LABELS)
        .chain(grammar::AMOUNT_LABELS)
        .any(|l| lower.contains(l))
        || grammar::DEBIT_ABBREVIATIONS
            .iter()
            .chain(grammar::CREDIT_ABBREVIATIONS)
            .chain(grammar::AMOUNT_ABBREVIATIONS)
            .any(|l| has_word(lower, l))
}

/// Role of an amount column, from its label
pub fn amount_role(label: &str) -> AmountRole {
    let lower = label.to_lowercase();
    let any_of = |labels: &[&str], words: &[&str]| {
        labels.iter().any(|l| lower.contains(l)) || words.iter().any(|w| has_word(&lower, w))
    };

    if any_of(grammar::BALANCE_LABELS, &[]) {
        AmountRole::Balance
    } else if any_of(grammar::DEBIT_LABELS, grammar::DEBIT_ABBREVIATIONS) {
        AmountRole::Debit
    } else if any_of(grammar::CREDIT_LABELS, grammar::CREDIT_ABBREVIATIONS) {
        AmountRole::Credit
    } else {
        AmountRole::Generic
    }
}

/// Infer a column's type from sampled cell values (for unlabeled columns)
pub fn infer_type_from_samples<'a>(cells: impl IntoIterator<Item = &'a str>) -> ColumnType {
    let mut filled = 0usize;
    let mut dates = 0usize;
    let mut amounts = 0usize;

    for cell in cells {
        let cell = cell.trim();
        if cell.is_empty() {
            continue;
        }
        filled += 1;
        if grammar::is_date(cell) {
            dates += 1;
        } else if grammar::is_amount(cell) {
            amounts += 1;
        }
    }

    if filled == 0 {
        ColumnType::Text
    } else if dates * 2 > filled {
        ColumnType::Date
    } else if amounts * 2 > filled {
        ColumnType::Amount
    } else {
        ColumnType::Text
    }
}

/// Turn a header row into column anchors.
///
/// Fragments closer than `merge_gap` (right edge to next left edge) are one
/// label. Duplicate labels get a numeric suffix so labels stay unique keys.
pub fn anchors_from_header(header: &Row, merge_gap: f32) -> Vec<ColumnAnchor> {
    let mut groups: Vec<(f32, f32, Vec<&str>)> = Vec::new(); // (x, right, words)

    for fragment in &header.fragments {
        let text = fragment.text.trim();
        if text.is_empty() {
            continue;
        }
        let continues_label = groups.last().is_some_and(|(x, right, _)| {
            fragment.x - x < 0.5 || (fragment.width > 0.0 && fragment.x - right < merge_gap)
        });
        match groups.last_mut() {
            Some((_, right, words)) if continues_label => {
                *right = right.max(fragment.right());
                words.push(text);
            }
            _ => groups.push((fragment.x, fragment.right(), vec![text])),
        }
    }

    let mut seen: IndexMap<String, usize> = IndexMap::new();
    groups
        .into_iter()
        .map(|(x, _, words)| {
            let base = words.join(" ");
            let count = seen.entry(base.to_lowercase()).or_insert(0);
            *count += 1;
            let label = if *count == 1 {
                base
            } else {
                format!("{} {}", base, count)
            };
            ColumnAnchor {
                column_type: infer_column_type(&label),
                label,
                x,
            }
        })
        .collect()
}

/// Strategy for turning column anchors into ranges
pub trait ColumnModel: Send + Sync {
    /// Build ranges for `anchors` (sorted by x). `samples` are data rows that
    /// may be used to refine boundaries.
    fn build_ranges(&self, anchors: &[ColumnAnchor], samples: &[Row]) -> Vec<ColumnRange>;
}

/// Midpoint boundaries, moved off of content that straddles them.
///
/// Headers are often not centered over their data (right-aligned amounts
/// under a left-aligned label). When content in the sample rows covers the
/// raw midpoint, the boundary moves to the free space on the far side of
/// that content block. When the midpoint sits in a sliver of whitespace,
/// a wider gutter between two content blocks is preferred.
#[derive(Debug, Clone)]
pub struct GapAwareColumnModel {
    /// Minimum width of a gutter that counts as a genuine content gap
    pub min_gap: f32,
}

impl Default for GapAwareColumnModel {
    fn default() -> Self {
        Self { min_gap: 20.0 }
    }
}

impl GapAwareColumnModel {
    pub fn new(min_gap: f32) -> Self {
        Self { min_gap }
    }

    fn boundary_between(&self, left: f32, right: f32, samples: &[Row]) -> f32 {
        let midpoint = (left + right) / 2.0;

        let mut spans: Vec<(f32, f32)> = samples
            .iter()
            .flat_map(|row| row.fragments.iter())
            .filter(|f| f.right() > left && f.x < right)
            .map(|f| (f.x.max(left), f.right().min(right)))
            .collect();
        if spans.is_empty() {
            return midpoint;
        }
        spans.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.total_cmp(&b.1)));

        // Merge into occupied blocks
        let mut blocks: Vec<(f32, f32)> = Vec::new();
        for (start, end) in spans {
            match blocks.last_mut() {
                Some(last) if start <= last.1 => last.1 = last.1.max(end),
                _ => blocks.push((start, end)),
            }
        }

        if let Some(pos) = blocks
            .iter()
            .position(|&(start, end)| start < midpoint && midpoint < end)
        {
            let (start, end) = blocks[pos];
            let prev_end = if pos > 0 { blocks[pos - 1].1 } else { left };
            let next_start = blocks.get(pos + 1).map_or(right, |b| b.0);

            // The block belongs to whichever anchor its left edge is nearer to
            let belongs_left = start - left <= right - start;
            let after = (end < next_start).then(|| (end + next_start) / 2.0);
            let before = (prev_end < start).then(|| (prev_end + start) / 2.0);

            return if belongs_left {
                after.or(before).unwrap_or(midpoint)
            } else {
                before.or(after).unwrap_or(midpoint)
            };
        }

        // Midpoint is in free space: keep it unless the space is a sliver
        // and a real gutter exists between two content blocks
        let free_at_midpoint = {
            let lo = blocks
                .iter()
                .filter(|b| b.1 <= midpoint)
                .map(|b| b.1)
                .fold(left, f32::max);
            let hi = blocks
                .iter()
                .filter(|b| b.0 >= midpoint)
                .map(|b| b.0)
                .fold(right, f32::min);
            hi - lo
        };
        if free_at_midpoint >= self.min_gap {
            return midpoint;
        }

        blocks
            .windows(2)
            .map(|w| (w[0].1, w[1].0))
            .filter(|(gap_start, gap_end)| gap_end - gap_start >= self.min_gap)
            .max_by(|a, b| (a.1 - a.0).total_cmp(&(b.1 - b.0)))
            .map(|(gap_start, gap_end)| (gap_start + gap_end) / 2.0)
            .unwrap_or(midpoint)
    }
}

impl ColumnModel for GapAwareColumnModel {
    fn build_ranges(&self, anchors: &[ColumnAnchor], samples: &[Row]) -> Vec<ColumnRange> {
        let boundaries: Vec<f32> = anchors
            .windows(2)
            .map(|pair| self.boundary_between(pair[0].x, pair[1].x, samples))
            .collect();

        anchors
            .iter()
            .enumerate()
            .map(|(i, anchor)| ColumnRange {
                label: anchor.label.clone(),
                start_x: if i == 0 {
                    f32::NEG_INFINITY
                } else {
                    boundaries[i - 1]
                },
                end_x: boundaries.get(i).copied().unwrap_or(f32::INFINITY),
                column_type: anchor.column_type,
                anchor_x: anchor.x,
            })
            .collect()
    }
}

/// The established column structure of one document
#[derive(Debug, Clone, PartialEq)]
pub struct TableLayout {
    columns: Vec<ColumnRange>,
}

impl TableLayout {
    /// Returns `None` for an empty column set
    pub fn new(columns: Vec<ColumnRange>) -> Option<Self> {
        if columns.is_empty() {
            None
        } else {
            Some(Self { columns })
        }
    }

    pub fn columns(&self) -> &[ColumnRange] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn headers(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.label.clone()).collect()
    }

    pub fn column_types(&self) -> IndexMap<String, ColumnType> {
        self.columns
            .iter()
            .map(|c| (c.label.clone(), c.column_type))
            .collect()
    }

    /// Indices of columns with the given type, in order
    pub fn indices_of(&self, column_type: ColumnType) -> impl Iterator<Item = usize> + '_ {
        self.columns
            .iter()
            .enumerate()
            .filter(move |(_, c)| c.column_type == column_type)
            .map(|(i, _)| i)
    }

    /// Index of the first column with the given amount role
    pub fn index_of_role(&self, role: AmountRole) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.amount_role() == Some(role))
    }

    /// Column an x position belongs to. Every x maps to some column.
    pub fn column_index(&self, x: f32) -> usize {
        let last = self.columns.len() - 1;
        let i = self.columns.partition_point(|c| c.end_x <= x).min(last);

        // Exactly on a boundary: the closer anchor wins
        if i > 0 && x == self.columns[i].start_x {
            let left = &self.columns[i - 1];
            let right = &self.columns[i];
            if (x - left.anchor_x).abs() < (right.anchor_x - x).abs() {
                return i - 1;
            }
        }
        i
    }

    /// Distribute a row's fragments into cells, joined with single spaces
    pub fn assign_cells(&self, row: &Row) -> Vec<String> {
        let mut cells = vec![String::new(); self.columns.len()];
        for fragment in &row.fragments {
            let text = fragment.text.trim();
            if text.is_empty() {
                continue;
            }
            let cell = &mut cells[self.column_index(fragment.x)];
            if !cell.is_empty() {
                cell.push(' ');
            }
            cell.push_str(text);
        }
        cells
    }
}
