//! View-model types produced by the renderer.
//!
//! These types are presentation-agnostic: the terminal front end prints them,
//! and any other host can serialize and draw them.

use chrono::{DateTime, Utc};
use serde::Serialize;

use challan_core::{RowKey, TransferId};
use challan_records::RowStatus;

use crate::summary::{SummaryLine, SummaryTotals};

/// Connectivity state of the client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectivityState {
    /// The last fetch succeeded.
    #[default]
    Online,
    /// The last fetch failed; anything shown may be stale.
    Offline,
}

/// Background refresh indicator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressState {
    #[default]
    Idle,
    Running,
    Done,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

/// A transient user-facing message (alert/toast).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// A run of cell text, highlighted when it matches the search term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Segment {
    pub text: String,
    pub highlighted: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Cell {
    pub segments: Vec<Segment>,
}

impl Cell {
    pub fn plain(text: impl Into<String>) -> Self {
        let text = text.into();
        if text.is_empty() {
            return Self::default();
        }
        Self {
            segments: vec![Segment {
                text,
                highlighted: false,
            }],
        }
    }

    pub fn text(&self) -> String {
        self.segments.iter().map(|s| s.text.as_str()).collect()
    }

    pub fn has_highlight(&self) -> bool {
        self.segments.iter().any(|s| s.highlighted)
    }
}

/// Per-row affordances; all false when the data source is read-only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RowActions {
    pub select: bool,
    pub receive: bool,
    pub finalize: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedRow {
    pub key: RowKey,
    pub status: RowStatus,
    pub cells: Vec<Cell>,
    pub selected: bool,
    pub actions: RowActions,
}

/// What the table area shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "lowercase")]
pub enum TableBody {
    Rows,
    Loading(String),
    Empty(String),
    Error(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Screen {
    Main,
    Summary,
    Challan,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryView {
    pub lines: Vec<SummaryLine>,
    pub totals: SummaryTotals,
    pub can_submit: bool,
}

/// Child items of one delivery challan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChallanView {
    pub transfer_id: TransferId,
    pub status: Option<RowStatus>,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
    pub empty_message: Option<String>,
    pub can_finalize: bool,
}

/// Everything a presentation layer needs to draw the current state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewModel {
    pub screen: Screen,
    pub columns: Vec<String>,
    pub rows: Vec<RenderedRow>,
    pub body: TableBody,
    pub writable: bool,
    pub select_all_checked: bool,
    pub selected_count: usize,
    pub create_summary_enabled: bool,
    pub progress: ProgressState,
    pub connectivity: ConnectivityState,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub offline_reason: Option<String>,
    pub notice: Option<Notice>,
    pub summary: Option<SummaryView>,
    pub challan: Option<ChallanView>,
}

impl ViewModel {
    pub fn row(&self, key: &str) -> Option<&RenderedRow> {
        self.rows.iter().find(|r| r.key.as_str() == key)
    }

    pub fn message(&self) -> Option<&str> {
        match &self.body {
            TableBody::Rows => None,
            TableBody::Loading(m) | TableBody::Empty(m) | TableBody::Error(m) => Some(m),
        }
    }
}
