//! Multi-line transaction assembly
//!
//! A statement entry often wraps: the narration continues on one or more
//! lines below the row carrying the date and amounts. The assembler walks a
//! page's classified rows, opens a transaction at each start row and folds
//! the following continuation rows into it according to column type.

use indexmap::IndexMap;
use log::{debug, trace};
use serde::{Deserialize, Serialize};

use crate::classify::{MappedRow, RowClassifier, RowKind};
use crate::columns::{AmountRole, ColumnType, TableLayout};
use crate::grammar::{
    amount_tokens, contains_amount, find_date, is_boilerplate, is_date, is_monetary,
    is_opening_balance_only, parse_amount,
};

/// One statement entry: header label to cell text, in header order
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transaction(IndexMap<String, String>);

impl Transaction {
    /// A transaction with every header present and empty
    pub fn empty(headers: &[String]) -> Self {
        Self(headers.iter().map(|h| (h.clone(), String::new())).collect())
    }

    /// Build from cells aligned with the layout's columns
    pub fn from_cells(layout: &TableLayout, cells: &[String]) -> Self {
        Self(
            layout
                .columns()
                .iter()
                .zip(cells.iter().map(String::as_str).chain(std::iter::repeat("")))
                .map(|(column, cell)| (column.label.clone(), cell.trim().to_string()))
                .collect(),
        )
    }

    pub fn get(&self, label: &str) -> Option<&str> {
        self.0.get(label).map(String::as_str)
    }

    /// Set a field; unknown labels are ignored so keys stay the header set
    pub fn set(&mut self, label: &str, value: impl Into<String>) {
        if let Some(cell) = self.0.get_mut(label) {
            *cell = value.into();
        }
    }

    /// Value of the i-th column
    pub fn cell(&self, index: usize) -> &str {
        self.0.get_index(index).map_or("", |(_, v)| v.as_str())
    }

    fn cell_mut(&mut self, index: usize) -> Option<&mut String> {
        self.0.get_index_mut(index).map(|(_, v)| v)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn non_empty_count(&self) -> usize {
        self.0.values().filter(|v| !v.trim().is_empty()).count()
    }

    /// Non-empty values joined with spaces, in header order
    pub fn joined_text(&self) -> String {
        self.0
            .values()
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Which side of the account an unsided amount belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmountSide {
    Withdrawal,
    Deposit,
}

/// Decides the side of an amount when the row doesn't say
pub trait AmountSideResolver: Send + Sync {
    fn resolve(&self, amount: f64, balance: f64, previous_balance: Option<f64>) -> AmountSide;
}

/// Guess the side from how the running balance moved.
///
/// With a known previous balance, a rising balance means a deposit. Without
/// one, a balance larger than the amount is taken as a deposit. This is a
/// heuristic and misreads e.g. a large withdrawal from a small balance.
#[derive(Debug, Clone, Copy, Default)]
pub struct BalanceDeltaResolver;

impl AmountSideResolver for BalanceDeltaResolver {
    fn resolve(&self, amount: f64, balance: f64, previous_balance: Option<f64>) -> AmountSide {
        let deposit = match previous_balance {
            Some(previous) => balance > previous,
            None => balance > amount,
        };
        if deposit {
            AmountSide::Deposit
        } else {
            AmountSide::Withdrawal
        }
    }
}

/// Assembles the transactions of one page
pub struct TransactionAssembler<'a> {
    layout: &'a TableLayout,
    classifier: &'a dyn RowClassifier,
    side_resolver: Option<&'a dyn AmountSideResolver>,
    max_continuation_rows: usize,
}

impl<'a> TransactionAssembler<'a> {
    pub fn new(
        layout: &'a TableLayout,
        classifier: &'a dyn RowClassifier,
        max_continuation_rows: usize,
    ) -> Self {
        Self {
            layout,
            classifier,
            side_resolver: None,
            max_continuation_rows,
        }
    }

    pub fn with_side_resolver(mut self, resolver: Option<&'a dyn AmountSideResolver>) -> Self {
        self.side_resolver = resolver;
        self
    }

    /// Assemble a page's rows into accepted transactions.
    ///
    /// `last_balance` is the running balance carried across pages; it is
    /// read by the amount-side heuristic and updated from accepted entries.
    pub fn assemble(&self, rows: &[MappedRow<'_>], last_balance: &mut Option<f64>) -> Vec<Transaction> {
        let mut transactions = Vec::new();
        let mut started = false;
        let mut i = 0;

        while i < rows.len() {
            let row = &rows[i];
            match self.classifier.classify(row, self.layout) {
                RowKind::Header => i += 1,
                RowKind::Footer if started => {
                    debug!("footer row ends page: {:?}", row.lower_text());
                    break;
                }
                RowKind::Footer if is_opening_balance_only(row.lower_text()) => {
                    if let Some(balance) = last_amount(row) {
                        trace!("opening balance {}", balance);
                        *last_balance = Some(balance);
                    }
                    i += 1;
                }
                RowKind::Footer => {
                    debug!("footer row before any entry ends page: {:?}", row.lower_text());
                    break;
                }
                RowKind::Continuation => {
                    trace!("orphan continuation row skipped: {:?}", row.lower_text());
                    i += 1;
                }
                RowKind::TransactionStart => {
                    started = true;
                    let mut transaction = Transaction::from_cells(self.layout, &row.cells);
                    i = self.absorb_continuations(&mut transaction, rows, i + 1);

                    self.finalize(&mut transaction, *last_balance);
                    if is_valid_transaction(&transaction, self.layout) {
                        if let Some(balance) = self.balance_of(&transaction) {
                            *last_balance = Some(balance);
                        }
                        transactions.push(transaction);
                    } else {
                        trace!("rejected candidate: {:?}", transaction.joined_text());
                    }
                }
            }
        }

        transactions
    }

    /// Merge following continuation rows, returning the index of the first
    /// row not consumed
    fn absorb_continuations(
        &self,
        transaction: &mut Transaction,
        rows: &[MappedRow<'_>],
        mut next: usize,
    ) -> usize {
        let mut merged = 0;
        while next < rows.len() && merged < self.max_continuation_rows {
            let candidate = &rows[next];
            match self.classifier.classify(candidate, self.layout) {
                RowKind::Header | RowKind::Footer => break,
                _ if self.classifier.starts_new_transaction(candidate, self.layout) => break,
                _ => {}
            }
            trace!("continuation merged: {:?}", candidate.lower_text());
            merge_continuation(transaction, &candidate.cells, self.layout);
            merged += 1;
            next += 1;
        }
        next
    }

    fn finalize(&self, transaction: &mut Transaction, last_balance: Option<f64>) {
        normalize_date_cells(transaction, self.layout);
        if let Some(resolver) = self.side_resolver {
            resolve_amount_side(transaction, self.layout, resolver, last_balance);
        }
    }

    fn balance_of(&self, transaction: &Transaction) -> Option<f64> {
        let index = self.layout.index_of_role(AmountRole::Balance)?;
        amount_tokens(transaction.cell(index))
            .next()
            .and_then(parse_amount)
    }
}

fn last_amount(row: &MappedRow<'_>) -> Option<f64> {
    row.cells
        .iter()
        .flat_map(|cell| amount_tokens(cell))
        .filter_map(parse_amount)
        .last()
}

/// Fold a continuation row's cells into a transaction.
///
/// Text is appended unless already present. Dates and amounts only fill
/// empty cells, never overwrite.
pub fn merge_continuation(transaction: &mut Transaction, cells: &[String], layout: &TableLayout) {
    for (index, column) in layout.columns().iter().enumerate() {
        let value = cells.get(index).map_or("", |c| c.trim());
        if value.is_empty() {
            continue;
        }
        let Some(current) = transaction.cell_mut(index) else {
            continue;
        };

        match column.column_type {
            ColumnType::Text => {
                if current.is_empty() {
                    current.push_str(value);
                } else if !current.to_lowercase().contains(&value.to_lowercase()) {
                    current.push(' ');
                    current.push_str(value);
                }
            }
            ColumnType::Date | ColumnType::Amount => {
                if current.is_empty() {
                    current.push_str(value);
                }
            }
        }
    }
}

/// Keep only the date in DATE cells; other text moves to the first TEXT column
pub fn normalize_date_cells(transaction: &mut Transaction, layout: &TableLayout) {
    let text_column = layout.indices_of(ColumnType::Text).next();
    let date_columns: Vec<usize> = layout.indices_of(ColumnType::Date).collect();

    for index in date_columns {
        let cell = transaction.cell(index).trim().to_string();
        if cell.is_empty() || is_date(&cell) {
            continue;
        }

        let (date, rest) = match find_date(&cell) {
            Some((start, end)) => (
                cell[start..end].to_string(),
                format!("{} {}", &cell[..start], &cell[end..]),
            ),
            None => (String::new(), cell.clone()),
        };
        let rest = rest.split_whitespace().collect::<Vec<_>>().join(" ");

        if let Some(slot) = transaction.cell_mut(index) {
            *slot = date;
        }
        if rest.is_empty() {
            continue;
        }
        if let Some(slot) = text_column.and_then(|t| transaction.cell_mut(t)) {
            if slot.is_empty() {
                *slot = rest;
            } else if !slot.to_lowercase().contains(&rest.to_lowercase()) {
                *slot = format!("{} {}", rest, slot);
            }
        }
    }
}

/// Assign an unsided amount to the debit or credit column.
///
/// Applies only when both side columns are empty and exactly two monetary
/// tokens remain in non-date cells: the first is the amount, the second the
/// running balance.
pub fn resolve_amount_side(
    transaction: &mut Transaction,
    layout: &TableLayout,
    resolver: &dyn AmountSideResolver,
    previous_balance: Option<f64>,
) {
    let (Some(debit), Some(credit), Some(balance)) = (
        layout.index_of_role(AmountRole::Debit),
        layout.index_of_role(AmountRole::Credit),
        layout.index_of_role(AmountRole::Balance),
    ) else {
        return;
    };
    if !transaction.cell(debit).is_empty() || !transaction.cell(credit).is_empty() {
        return;
    }

    let tokens: Vec<(usize, String)> = layout
        .columns()
        .iter()
        .enumerate()
        .filter(|(_, c)| c.column_type != ColumnType::Date)
        .flat_map(|(i, _)| {
            transaction
                .cell(i)
                .split_whitespace()
                .filter(|t| is_monetary(t))
                .map(move |t| (i, t.to_string()))
                .collect::<Vec<_>>()
        })
        .collect();
    let [(amount_col, amount), (balance_col, balance_text)] = tokens.as_slice() else {
        return;
    };
    let (Some(amount_value), Some(balance_value)) = (parse_amount(amount), parse_amount(balance_text))
    else {
        return;
    };

    let side = resolver.resolve(amount_value, balance_value, previous_balance);
    trace!("unsided amount {} resolved as {:?}", amount, side);

    remove_token(transaction, *amount_col, amount);
    remove_token(transaction, *balance_col, balance_text);
    let target = match side {
        AmountSide::Withdrawal => debit,
        AmountSide::Deposit => credit,
    };
    if let Some(slot) = transaction.cell_mut(target) {
        *slot = amount.clone();
    }
    if let Some(slot) = transaction.cell_mut(balance) {
        *slot = balance_text.clone();
    }
}

fn remove_token(transaction: &mut Transaction, index: usize, token: &str) {
    if let Some(cell) = transaction.cell_mut(index) {
        let mut removed = false;
        let kept: Vec<&str> = cell
            .split_whitespace()
            .filter(|t| {
                if !removed && *t == token {
                    removed = true;
                    false
                } else {
                    true
                }
            })
            .collect();
        *cell = kept.join(" ");
    }
}

/// Accept a finished transaction: two or more fields, not statement
/// metadata, and a date or amount where the layout expects one
pub fn is_valid_transaction(transaction: &Transaction, layout: &TableLayout) -> bool {
    if transaction.non_empty_count() < 2 {
        return false;
    }
    if is_boilerplate(&transaction.joined_text().to_lowercase()) {
        return false;
    }
    let has_date = layout
        .indices_of(ColumnType::Date)
        .any(|i| is_date(transaction.cell(i)));
    let has_amount = layout
        .indices_of(ColumnType::Amount)
        .any(|i| contains_amount(transaction.cell(i)));
    has_date || has_amount
}
