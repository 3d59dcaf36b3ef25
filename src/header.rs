//! Header row detection
//!
//! The header row is found by keyword scoring: column names score, data
//! tokens (dates, amounts) penalize. When no row scores high enough the
//! columns are inferred from the x-positions of data rows instead.

use crate::columns::{infer_type_from_samples, ColumnAnchor};
use crate::fragment::Row;
use crate::grammar::{contains_amount, contains_date, is_header_keyword, is_strict_footer};
use crate::orchestrator::ParseOptions;

/// Points per fragment naming a column
const KEYWORD_POINTS: i32 = 2;
/// A header row should not look like data
const DATA_TOKEN_PENALTY: i32 = 8;

/// Keyword score of one row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeaderScore {
    pub score: i32,
    /// Fragments containing a header keyword
    pub keyword_matches: usize,
}

/// Score a row as a header candidate
pub fn score_row(row: &Row) -> HeaderScore {
    let mut keyword_matches = 0usize;
    let mut has_data_token = false;

    for fragment in &row.fragments {
        let lower = fragment.text.trim().to_lowercase();
        if lower.is_empty() {
            continue;
        }
        if is_header_keyword(&lower) {
            keyword_matches += 1;
        }
        if contains_date(&lower) || contains_amount(&lower) {
            has_data_token = true;
        }
    }

    let mut score = keyword_matches as i32 * KEYWORD_POINTS;
    if has_data_token {
        score -= DATA_TOKEN_PENALTY;
    }
    score += match row.fragments.len() {
        n if n >= 5 => 2,
        n if n >= 3 => 1,
        _ => 0,
    };

    HeaderScore {
        score,
        keyword_matches,
    }
}

/// The chosen header row of a page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderMatch {
    /// Index into the rows passed to `detect`
    pub row_index: usize,
    pub score: HeaderScore,
}

/// Strategy for locating the column header and, failing that, inferring columns
pub trait HeaderDetector: Send + Sync {
    /// Find the header row among the leading rows of a page
    fn detect(&self, rows: &[Row]) -> Option<HeaderMatch>;

    /// Infer column anchors from data rows when no header was found
    fn detect_columns_from_data(&self, rows: &[Row]) -> Option<Vec<ColumnAnchor>>;
}

/// Keyword-scoring header detector with x-clustering fallback
#[derive(Debug, Clone)]
pub struct KeywordHeaderDetector {
    /// Leading rows scanned for a header
    pub scan_rows: usize,
    /// Minimum score for a row to qualify
    pub min_score: i32,
    /// Data rows sampled by the fallback
    pub sample_rows: usize,
    /// X distance that separates two column clusters
    pub cluster_gap: f32,
    /// Fraction of sampled rows a cluster must appear in
    pub min_support: f32,
}

impl Default for KeywordHeaderDetector {
    fn default() -> Self {
        Self::from_options(&ParseOptions::default())
    }
}

impl KeywordHeaderDetector {
    pub fn from_options(options: &ParseOptions) -> Self {
        Self {
            scan_rows: options.header_scan_rows,
            min_score: options.header_min_score,
            sample_rows: options.fallback_sample_rows,
            cluster_gap: options.fallback_cluster_gap,
            min_support: options.fallback_min_support,
        }
    }
}

impl HeaderDetector for KeywordHeaderDetector {
    fn detect(&self, rows: &[Row]) -> Option<HeaderMatch> {
        let mut best: Option<HeaderMatch> = None;

        for (row_index, row) in rows.iter().take(self.scan_rows).enumerate() {
            // Summary blocks ("Opening Balance | Total Debits ...") are not headers
            if is_strict_footer(&row.lowercase_text()) {
                continue;
            }
            let score = score_row(row);
            if score.score < self.min_score {
                continue;
            }
            // Strictly greater: the earliest row wins ties
            if best.map_or(true, |b| score.score > b.score.score) {
                best = Some(HeaderMatch { row_index, score });
            }
        }

        best
    }

    fn detect_columns_from_data(&self, rows: &[Row]) -> Option<Vec<ColumnAnchor>> {
        let samples: Vec<&Row> = rows
            .iter()
            .filter(|row| row.fragments.len() >= 2 && looks_like_data(row))
            .take(self.sample_rows)
            .collect();
        if samples.len() < 2 {
            return None;
        }

        // (x, sample row) sorted by x
        let mut positions: Vec<(f32, usize)> = samples
            .iter()
            .enumerate()
            .flat_map(|(ri, row)| row.fragments.iter().map(move |f| (f.x, ri)))
            .collect();
        positions.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        let mut clusters: Vec<Vec<(f32, usize)>> = Vec::new();
        for (x, ri) in positions {
            match clusters.last_mut() {
                Some(cluster)
                    if cluster
                        .last()
                        .is_some_and(|&(last_x, _)| x - last_x <= self.cluster_gap) =>
                {
                    cluster.push((x, ri))
                }
                _ => clusters.push(vec![(x, ri)]),
            }
        }

        let min_rows = self.min_support * samples.len() as f32;
        let centers: Vec<f32> = clusters
            .iter()
            .filter(|cluster| {
                let mut rows_hit: Vec<usize> = cluster.iter().map(|&(_, ri)| ri).collect();
                rows_hit.sort_unstable();
                rows_hit.dedup();
                rows_hit.len() as f32 >= min_rows
            })
            .map(|cluster| cluster.iter().map(|&(x, _)| x).sum::<f32>() / cluster.len() as f32)
            .collect();

        if centers.len() < 2 {
            return None;
        }

        // Sample cells by nearest center to type the columns
        let mut cells: Vec<Vec<String>> = vec![Vec::new(); centers.len()];
        for row in &samples {
            let mut row_cells = vec![String::new(); centers.len()];
            for fragment in &row.fragments {
                let nearest = nearest_center(&centers, fragment.x);
                let cell = &mut row_cells[nearest];
                if !cell.is_empty() {
                    cell.push(' ');
                }
                cell.push_str(fragment.text.trim());
            }
            for (column, cell) in row_cells.into_iter().enumerate() {
                cells[column].push(cell);
            }
        }

        Some(
            centers
                .iter()
                .zip(cells.iter())
                .enumerate()
                .map(|(i, (&x, column_cells))| ColumnAnchor {
                    label: format!("Column {}", i + 1),
                    x,
                    column_type: infer_type_from_samples(column_cells.iter().map(String::as_str)),
                })
                .collect(),
        )
    }
}

/// A row carrying at least one date or amount token
pub fn looks_like_data(row: &Row) -> bool {
    row.fragments
        .iter()
        .any(|f| contains_date(&f.text) || contains_amount(&f.text))
}

fn nearest_center(centers: &[f32], x: f32) -> usize {
    centers
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| (x - **a).abs().total_cmp(&(x - **b).abs()))
        .map(|(i, _)| i)
        .unwrap_or(0)
}
