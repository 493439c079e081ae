use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// Lifecycle status of a row.
///
/// PO lines move `Pending` → `Partial` → `Received`; DC parents move
/// `Draft` → `Completed`. Status text the client does not know is kept as-is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RowStatus {
    Pending,
    Partial,
    Received,
    Draft,
    Completed,
    Other(String),
}

impl RowStatus {
    /// Status implied by received vs ordered quantities.
    pub fn for_quantities(ordered: i64, received: i64) -> Self {
        if received <= 0 {
            RowStatus::Pending
        } else if received < ordered {
            RowStatus::Partial
        } else {
            RowStatus::Received
        }
    }

    /// Open rows still expect deliveries.
    pub fn is_open(&self) -> bool {
        matches!(self, RowStatus::Pending | RowStatus::Partial)
    }

    pub fn as_str(&self) -> &str {
        match self {
            RowStatus::Pending => "Pending",
            RowStatus::Partial => "Partial",
            RowStatus::Received => "Received",
            RowStatus::Draft => "Draft",
            RowStatus::Completed => "Completed",
            RowStatus::Other(text) => text,
        }
    }
}

impl FromStr for RowStatus {
    type Err = core::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let status = match trimmed.to_ascii_lowercase().as_str() {
            "pending" => RowStatus::Pending,
            "partial" => RowStatus::Partial,
            "received" => RowStatus::Received,
            "draft" => RowStatus::Draft,
            "completed" => RowStatus::Completed,
            _ => RowStatus::Other(trimmed.to_string()),
        };
        Ok(status)
    }
}

impl From<String> for RowStatus {
    fn from(value: String) -> Self {
        match value.parse() {
            Ok(status) => status,
            Err(never) => match never {},
        }
    }
}

impl From<RowStatus> for String {
    fn from(value: RowStatus) -> Self {
        value.as_str().to_string()
    }
}

impl core::fmt::Display for RowStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
