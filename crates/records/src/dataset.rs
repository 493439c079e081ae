use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use challan_core::{DomainError, DomainResult, ItemCode, Quantity, RowKey, TransferId};

use crate::fields::FieldNames;
use crate::row::{CellValue, Row};
use crate::status::RowStatus;

/// Which view a dataset backs, and therefore which field keys its rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetKind {
    /// Purchase-order lines keyed by item `code`.
    PurchaseOrders,
    /// Delivery-challan parents keyed by `transferId`, with child line items.
    DeliveryChallans,
}

impl DatasetKind {
    pub fn key_field<'a>(&self, names: &'a FieldNames) -> &'a str {
        match self {
            DatasetKind::PurchaseOrders => &names.code,
            DatasetKind::DeliveryChallans => &names.transfer_id,
        }
    }
}

/// Serialized form of a dataset: exactly what is fetched and what is cached.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetSnapshot {
    pub rows: Vec<Row>,
    pub display_columns: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub line_items: Vec<Row>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub line_item_columns: Vec<String>,
}

/// In-memory dataset: ordered rows, ordered display schema, key index.
///
/// A dataset is only ever swapped as a whole, so observers see either the
/// previous or the next dataset, never a mix.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    kind: DatasetKind,
    names: FieldNames,
    rows: Vec<Row>,
    display_columns: Vec<String>,
    line_items: Vec<Row>,
    line_item_columns: Vec<String>,
    index: HashMap<RowKey, usize>,
    dropped_rows: usize,
}

impl Dataset {
    pub fn empty(kind: DatasetKind, names: FieldNames) -> Self {
        Self {
            kind,
            names,
            rows: Vec::new(),
            display_columns: Vec::new(),
            line_items: Vec::new(),
            line_item_columns: Vec::new(),
            index: HashMap::new(),
            dropped_rows: 0,
        }
    }

    /// Build a dataset from its serialized form.
    ///
    /// Rows with a blank key (e.g. trailing empty sheet rows) are dropped and
    /// counted; duplicate keys violate the dataset invariant and are rejected.
    pub fn from_snapshot(
        kind: DatasetKind,
        names: FieldNames,
        snapshot: DatasetSnapshot,
    ) -> DomainResult<Self> {
        let key_field = kind.key_field(&names).to_string();
        let mut rows = Vec::with_capacity(snapshot.rows.len());
        let mut index = HashMap::with_capacity(snapshot.rows.len());
        let mut dropped_rows = 0;

        for row in snapshot.rows {
            let key = match RowKey::parse(row.text(&key_field)) {
                Ok(key) => key,
                Err(_) => {
                    dropped_rows += 1;
                    continue;
                }
            };
            if index.insert(key.clone(), rows.len()).is_some() {
                return Err(DomainError::invariant(format!(
                    "duplicate {key_field} '{key}' in dataset"
                )));
            }
            rows.push(row);
        }

        Ok(Self {
            kind,
            names,
            rows,
            display_columns: snapshot.display_columns,
            line_items: snapshot.line_items,
            line_item_columns: snapshot.line_item_columns,
            index,
            dropped_rows,
        })
    }

    pub fn snapshot(&self) -> DatasetSnapshot {
        DatasetSnapshot {
            rows: self.rows.clone(),
            display_columns: self.display_columns.clone(),
            line_items: self.line_items.clone(),
            line_item_columns: self.line_item_columns.clone(),
        }
    }

    /// Swap in a new dataset atomically.
    pub fn replace(&mut self, next: Dataset) {
        *self = next;
    }

    pub fn kind(&self) -> DatasetKind {
        self.kind
    }

    pub fn names(&self) -> &FieldNames {
        &self.names
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn display_columns(&self) -> &[String] {
        &self.display_columns
    }

    pub fn line_items(&self) -> &[Row] {
        &self.line_items
    }

    /// Display schema of the line items; the sorted field names of the line
    /// items when the source sent none.
    pub fn line_item_columns(&self) -> Vec<String> {
        if !self.line_item_columns.is_empty() {
            return self.line_item_columns.clone();
        }
        let mut names: Vec<String> = self
            .line_items
            .iter()
            .flat_map(|r| r.field_names().map(str::to_string))
            .collect();
        names.sort();
        names.dedup();
        names
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn dropped_rows(&self) -> usize {
        self.dropped_rows
    }

    /// Key of a row under this dataset's keying rule.
    pub fn key_of(&self, row: &Row) -> Option<RowKey> {
        RowKey::parse(row.text(self.kind.key_field(&self.names))).ok()
    }

    pub fn contains_key(&self, key: &RowKey) -> bool {
        self.index.contains_key(key)
    }

    pub fn find_by_key(&self, key: &RowKey) -> Option<&Row> {
        self.index.get(key).map(|&i| &self.rows[i])
    }

    /// Optimistically record `quantity` more units of `code` as received.
    ///
    /// Increments the received quantity and recomputes the status from the
    /// ordered quantity. Returns the new status.
    pub fn apply_local_receive(&mut self, code: &ItemCode, quantity: Quantity) -> DomainResult<RowStatus> {
        if self.kind != DatasetKind::PurchaseOrders {
            return Err(DomainError::invariant(
                "receiving applies to purchase-order lines only",
            ));
        }
        let key = RowKey::from(code.clone());
        let idx = *self
            .index
            .get(&key)
            .ok_or_else(|| DomainError::not_found(format!("item {code}")))?;

        let names = &self.names;
        let row = &mut self.rows[idx];
        let ordered = row.ordered_qty(names);
        let received = row
            .received_qty(names)
            .checked_add(i64::from(quantity.get()))
            .ok_or_else(|| DomainError::validation(format!("received quantity of {code} is out of range")))?;
        let status = RowStatus::for_quantities(ordered, received);

        row.set(names.received_qty.clone(), CellValue::from(received));
        row.set(names.status.clone(), CellValue::Text(status.to_string()));
        Ok(status)
    }

    /// Line items of a delivery challan, in sheet order.
    pub fn children_of(&self, transfer_id: &TransferId) -> Vec<&Row> {
        self.line_items
            .iter()
            .filter(|item| item.transfer_id(&self.names).trim() == transfer_id.as_str())
            .collect()
    }

    /// Only draft challans may be finalized.
    pub fn can_finalize(&self, transfer_id: &TransferId) -> bool {
        self.kind == DatasetKind::DeliveryChallans
            && self
                .find_by_key(&RowKey::from(transfer_id.clone()))
                .is_some_and(|row| row.status(&self.names) == RowStatus::Draft)
    }
}
