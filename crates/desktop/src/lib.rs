//! `challan-desktop`
//!
//! **Responsibility:** the receiving client for purchase-order lines and
//! delivery challans kept in a shared spreadsheet.
//!
//! This crate provides:
//! - A local cache of the last known dataset (instant first paint)
//! - Gateways to the remote sheet (read/write web app, read-only Sheets API)
//! - Search/status filtering, selection and bulk-receipt summaries
//! - Cache-first sync with byte-level staleness detection
//! - A pure `render(state) -> ViewModel` projection, drawn by the `challan` CLI
//!
//! The remote sheet stays the authority: local changes are never queued, and
//! every write is followed by a re-fetch.

pub mod app;
pub mod cache;
pub mod config;
pub mod display;
pub mod filter;
pub mod gateway;
pub mod offline;
pub mod progress;
pub mod render;
pub mod selection;
pub mod state;
pub mod summary;
pub mod sync;
pub mod types;

pub use app::{ActionError, App, AppSettings, ViewObserver};
pub use cache::{KeyValueStore, LocalCache, MemoryStore, SqliteStore};
pub use config::{ConfigError, DesktopConfig, SourceConfig};
pub use filter::{FilterState, StatusFilter};
pub use gateway::{
    Ack, AppsScriptGateway, DataSource, GatewayError, InMemoryGateway, PayloadDecoder, SheetsGateway,
    WriteGateway, WriteMode,
};
pub use offline::{ConnectivityState, OfflineMode};
pub use render::{RenderOptions, render};
pub use sync::{SyncController, SyncOutcome};
pub use types::ViewModel;
