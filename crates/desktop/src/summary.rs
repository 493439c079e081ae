//! Summary of a pending bulk receipt: one quantity input per selected item.

use serde::Serialize;

use challan_core::{DomainError, DomainResult, ItemCode, Quantity, RowKey};
use challan_records::Dataset;

use crate::gateway::ReceiveItem;
use crate::selection::Selection;

/// Quantity a freshly created summary line starts with.
pub const DEFAULT_LINE_QUANTITY: &str = "1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryLine {
    pub key: RowKey,
    pub item: String,
    pub ordered: i64,
    pub received: i64,
    /// Raw text of the quantity input, exactly as typed.
    pub input: String,
}

impl SummaryLine {
    /// The input read as a quantity; anything but a positive integer is 0.
    pub fn quantity(&self) -> u32 {
        Quantity::parse(&self.input).map(|q| q.get()).unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryTotals {
    /// Lines with a quantity above zero.
    pub total_items: usize,
    /// Sum of those quantities.
    pub total_qty: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryDraft {
    lines: Vec<SummaryLine>,
}

impl SummaryDraft {
    /// One line per selected row, in dataset order, each defaulted to 1.
    pub fn from_selection(dataset: &Dataset, selection: &Selection) -> DomainResult<Self> {
        if selection.is_empty() {
            return Err(DomainError::validation("Select at least one item first."));
        }
        let names = dataset.names();
        let lines: Vec<SummaryLine> = dataset
            .rows()
            .iter()
            .filter_map(|row| {
                let key = dataset.key_of(row)?;
                selection.contains(&key).then(|| SummaryLine {
                    key,
                    item: row.item(names),
                    ordered: row.ordered_qty(names),
                    received: row.received_qty(names),
                    input: DEFAULT_LINE_QUANTITY.to_string(),
                })
            })
            .collect();

        if lines.is_empty() {
            return Err(DomainError::validation("The selected items are no longer available."));
        }
        Ok(Self { lines })
    }

    pub fn lines(&self) -> &[SummaryLine] {
        &self.lines
    }

    pub fn set_quantity(&mut self, key: &RowKey, raw: impl Into<String>) -> DomainResult<SummaryTotals> {
        let line = self
            .lines
            .iter_mut()
            .find(|line| &line.key == key)
            .ok_or_else(|| DomainError::not_found(format!("summary line {key}")))?;
        line.input = raw.into();
        Ok(self.totals())
    }

    pub fn totals(&self) -> SummaryTotals {
        self.lines
            .iter()
            .map(SummaryLine::quantity)
            .filter(|&q| q > 0)
            .fold(SummaryTotals::default(), |acc, q| SummaryTotals {
                total_items: acc.total_items + 1,
                total_qty: acc.total_qty + u64::from(q),
            })
    }

    /// Items to submit: lines with a quantity above zero.
    pub fn items(&self) -> DomainResult<Vec<ReceiveItem>> {
        let items: Vec<ReceiveItem> = self
            .lines
            .iter()
            .filter_map(|line| {
                let quantity = Quantity::parse(&line.input).ok()?;
                Some(ReceiveItem {
                    code: ItemCode::from(line.key.clone()),
                    quantity,
                })
            })
            .collect();

        if items.is_empty() {
            return Err(DomainError::validation(
                "Please enter a quantity greater than 0 for at least one item.",
            ));
        }
        Ok(items)
    }
}
