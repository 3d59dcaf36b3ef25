//! Cross-page duplicate removal
//!
//! Statements sometimes reprint the last entry of a page at the top of the
//! next one. Each accepted transaction gets a canonical key; a key seen
//! earlier in the same document marks an exact repeat.

use std::collections::HashSet;

use log::debug;

use crate::assembler::Transaction;
use crate::columns::{ColumnType, TableLayout};

fn normalize(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Fingerprint of a transaction: `date | first amount | all fields`.
///
/// The date and first amount lead the key; the full field list keeps two
/// genuinely different entries on the same day for the same sum apart.
/// The cost: a boundary entry reprinted with truncated or re-wrapped
/// narration gets a different key and is kept twice.
pub fn canonical_key(transaction: &Transaction, layout: &TableLayout) -> String {
    let first_of = |column_type: ColumnType| {
        layout
            .indices_of(column_type)
            .map(|i| transaction.cell(i))
            .find(|v| !v.trim().is_empty())
            .map(normalize)
            .unwrap_or_default()
    };

    let mut key = format!("{}|{}", first_of(ColumnType::Date), first_of(ColumnType::Amount));
    for (_, value) in transaction.fields() {
        key.push('|');
        key.push_str(&normalize(value));
    }
    key
}

/// Remembers the keys of a document's transactions
#[derive(Debug, Default)]
pub struct Deduplicator {
    seen_keys: HashSet<String>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a transaction; `false` if an identical one was already seen
    pub fn insert(&mut self, transaction: &Transaction, layout: &TableLayout) -> bool {
        self.seen_keys.insert(canonical_key(transaction, layout))
    }

    /// Keep only transactions not seen before, preserving order
    pub fn retain_new(&mut self, transactions: Vec<Transaction>, layout: &TableLayout) -> Vec<Transaction> {
        let before = transactions.len();
        let kept: Vec<Transaction> = transactions
            .into_iter()
            .filter(|t| self.insert(t, layout))
            .collect();
        if kept.len() < before {
            debug!("dropped {} duplicate transactions", before - kept.len());
        }
        kept
    }

    pub fn len(&self) -> usize {
        self.seen_keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen_keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::columns::{infer_column_type, ColumnAnchor, ColumnModel, GapAwareColumnModel};

    fn layout() -> TableLayout {
        let anchors: Vec<ColumnAnchor> = [("Date", 0.0), ("Description", 80.0), ("Amount", 300.0)]
            .iter()
            .map(|(label, x)| ColumnAnchor {
                label: label.to_string(),
                x: *x,
                column_type: infer_column_type(label),
            })
            .collect();
        TableLayout::new(GapAwareColumnModel::default().build_ranges(&anchors, &[])).unwrap()
    }

    fn txn(layout: &TableLayout, values: [&str; 3]) -> Transaction {
        let cells: Vec<String> = values.iter().map(|v| v.to_string()).collect();
        Transaction::from_cells(layout, &cells)
    }

    #[test]
    fn test_canonical_key_normalizes() {
        let layout = layout();
        let a = txn(&layout, ["01/02/2024", "UPI  Grocer", "250.00"]);
        let b = txn(&layout, ["01/02/2024", "upi grocer", "250.00"]);
        assert_eq!(canonical_key(&a, &layout), canonical_key(&b, &layout));
        assert!(canonical_key(&a, &layout).starts_with("01/02/2024|250.00|"));
    }

    #[test]
    fn test_exact_repeat_dropped() {
        let layout = layout();
        let mut dedup = Deduplicator::new();
        let first = dedup.retain_new(vec![txn(&layout, ["01/02/2024", "ATM", "500.00"])], &layout);
        let second = dedup.retain_new(
            vec![
                txn(&layout, ["01/02/2024", "ATM", "500.00"]),
                txn(&layout, ["02/02/2024", "Rent", "900.00"]),
            ],
            &layout,
        );
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].get("Description"), Some("Rent"));
        assert_eq!(dedup.len(), 2);
    }

    #[test]
    fn test_same_day_same_amount_kept() {
        let layout = layout();
        let mut dedup = Deduplicator::new();
        let kept = dedup.retain_new(
            vec![
                txn(&layout, ["01/02/2024", "Coffee shop", "4.50"]),
                txn(&layout, ["01/02/2024", "Bus fare", "4.50"]),
            ],
            &layout,
        );
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn test_reprint_with_truncated_narration_kept() {
        let layout = layout();
        let mut dedup = Deduplicator::new();
        dedup.retain_new(vec![txn(&layout, ["01/02/2024", "UPI GROCER ref 8841", "250.00"])], &layout);
        let reprint = dedup.retain_new(vec![txn(&layout, ["01/02/2024", "UPI GROCER", "250.00"])], &layout);
        assert_eq!(reprint.len(), 1);
    }
}
