//! `challan-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! the error model, row identifiers and validated quantities.

pub mod error;
pub mod id;
pub mod value_object;

pub use error::{DomainError, DomainResult};
pub use id::{ItemCode, RowKey, TransferId};
pub use value_object::{Quantity, ValueObject};
