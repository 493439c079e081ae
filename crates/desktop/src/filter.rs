//! Search and status filtering over the current dataset.

use core::str::FromStr;

use challan_records::{Dataset, Row, RowStatus};

use crate::config::DEFAULT_DATE_FORMAT;
use crate::render::{format_date, is_date_column};

/// Status selector of the main view.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StatusFilter {
    /// Default view (`all`): open rows only, hides received/completed noise.
    #[default]
    Open,
    /// Exact match on one status (e.g. `Received`).
    Only(RowStatus),
    /// `all-statuses`: no status filtering at all.
    Any,
}

impl StatusFilter {
    pub fn matches(&self, status: &RowStatus) -> bool {
        match self {
            StatusFilter::Open => status.is_open(),
            StatusFilter::Only(wanted) => wanted == status,
            StatusFilter::Any => true,
        }
    }
}

impl FromStr for StatusFilter {
    type Err = core::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let filter = match s.trim().to_ascii_lowercase().as_str() {
            "all" | "open" | "" => StatusFilter::Open,
            "all-statuses" | "any" => StatusFilter::Any,
            _ => StatusFilter::Only(RowStatus::from(s.to_string())),
        };
        Ok(filter)
    }
}

impl core::fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            StatusFilter::Open => f.write_str("all"),
            StatusFilter::Only(status) => f.write_str(status.as_str()),
            StatusFilter::Any => f.write_str("all-statuses"),
        }
    }
}

/// Transient filter state of the main view.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FilterState {
    pub search: String,
    pub status: StatusFilter,
}

impl FilterState {
    pub fn new(search: impl Into<String>, status: StatusFilter) -> Self {
        Self {
            search: search.into(),
            status,
        }
    }

    /// The effective search term; whitespace-only input means no search.
    pub fn term(&self) -> Option<&str> {
        let term = self.search.trim();
        (!term.is_empty()).then_some(term)
    }
}

/// True when any field of `row` contains `needle` (already lowercased),
/// either as stored or, for date columns, as displayed.
fn row_contains(row: &Row, needle: &str, date_format: &str) -> bool {
    row.fields().any(|(field, value)| {
        let raw = value.display();
        raw.to_lowercase().contains(needle)
            || (is_date_column(field)
                && format_date(&raw, date_format).is_some_and(|shown| shown.to_lowercase().contains(needle)))
    })
}

/// Rows of `dataset` visible under `filter`, in dataset order, with dates
/// shown in the default format.
pub fn apply<'a>(dataset: &'a Dataset, filter: &FilterState) -> Vec<&'a Row> {
    apply_displayed(dataset, filter, DEFAULT_DATE_FORMAT)
}

/// Like [`apply`], for a table that shows dates in `date_format`. A date
/// cell matches on its stored text or on its displayed text.
pub fn apply_displayed<'a>(dataset: &'a Dataset, filter: &FilterState, date_format: &str) -> Vec<&'a Row> {
    let needle = filter.term().map(str::to_lowercase);
    let names = dataset.names();

    dataset
        .rows()
        .iter()
        .filter(|row| needle.as_deref().is_none_or(|n| row_contains(row, n, date_format)))
        .filter(|row| filter.status.matches(&row.status(names)))
        .collect()
}
