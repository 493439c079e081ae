//! Delivery-challan and purchase-order records.
//!
//! This crate models the tabular data held in the backing spreadsheet: dynamic
//! rows, their lifecycle status and the dataset (rows + display schema) the
//! client works against. It is deterministic domain logic (no IO, no HTTP, no
//! storage).

pub mod dataset;
pub mod fields;
pub mod row;
pub mod status;

pub use dataset::{Dataset, DatasetKind, DatasetSnapshot};
pub use fields::FieldNames;
pub use row::{CellValue, Row};
pub use status::RowStatus;
