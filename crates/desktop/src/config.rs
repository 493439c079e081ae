//! Environment-driven configuration for the desktop client.

use std::path::PathBuf;
use std::time::Duration;

use challan_records::{DatasetKind, FieldNames};
use thiserror::Error;

use crate::gateway::WriteMode;

pub const DEFAULT_CACHE_KEY: &str = "challan.dataset.v1";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);
pub const DEFAULT_MIN_PROGRESS: Duration = Duration::from_millis(300);
pub const DEFAULT_DATE_FORMAT: &str = "%d/%m/%Y";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("no data source configured; set CHALLAN_SCRIPT_URL or CHALLAN_SHEETS_ID and CHALLAN_SHEETS_API_KEY")]
    MissingSource,
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("invalid value '{value}' for {var}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
    #[error("the configured data source is read-only; {0} requires a writable endpoint (CHALLAN_SCRIPT_URL)")]
    ReadOnly(&'static str),
}

/// Where the dataset comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceConfig {
    /// Serverless web-app endpoint wrapping the sheet (read/write).
    AppsScript { url: String, write_mode: WriteMode },
    /// Google Sheets API v4 with an API key (read-only).
    Sheets {
        base_url: String,
        spreadsheet_id: String,
        api_key: String,
        sheet: String,
        items_sheet: String,
    },
}

impl SourceConfig {
    pub fn is_writable(&self) -> bool {
        matches!(self, SourceConfig::AppsScript { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesktopConfig {
    pub source: SourceConfig,
    pub view: DatasetKind,
    pub fields: FieldNames,
    pub timeout: Duration,
    pub cache_key: String,
    pub cache_db: Option<PathBuf>,
    pub date_format: String,
    pub optimistic_receive: bool,
    pub min_progress: Duration,
    /// Columns used when the source sends rows without a display schema.
    pub default_columns: Vec<String>,
}

impl DesktopConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary lookup (used by tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let source = if let Some(url) = get("CHALLAN_SCRIPT_URL") {
            let write_mode = match get("CHALLAN_WRITE_MODE").as_deref() {
                None | Some("opaque") => WriteMode::Opaque,
                Some("acknowledged") => WriteMode::Acknowledged,
                Some(other) => {
                    return Err(ConfigError::Invalid {
                        var: "CHALLAN_WRITE_MODE",
                        value: other.to_string(),
                        reason: "expected 'opaque' or 'acknowledged'".to_string(),
                    });
                }
            };
            SourceConfig::AppsScript { url, write_mode }
        } else if let Some(spreadsheet_id) = get("CHALLAN_SHEETS_ID") {
            let api_key = get("CHALLAN_SHEETS_API_KEY").ok_or(ConfigError::Missing("CHALLAN_SHEETS_API_KEY"))?;
            SourceConfig::Sheets {
                base_url: get("CHALLAN_SHEETS_BASE_URL")
                    .unwrap_or_else(|| "https://sheets.googleapis.com".to_string()),
                spreadsheet_id,
                api_key,
                sheet: get("CHALLAN_SHEET").unwrap_or_else(|| "dc".to_string()),
                items_sheet: get("CHALLAN_ITEMS_SHEET").unwrap_or_else(|| "dc_items".to_string()),
            }
        } else {
            return Err(ConfigError::MissingSource);
        };

        let view = match get("CHALLAN_VIEW").as_deref() {
            None | Some("po") => DatasetKind::PurchaseOrders,
            Some("dc") => DatasetKind::DeliveryChallans,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    var: "CHALLAN_VIEW",
                    value: other.to_string(),
                    reason: "expected 'po' or 'dc'".to_string(),
                });
            }
        };

        let defaults = FieldNames::default();
        let fields = FieldNames {
            code: get("CHALLAN_FIELD_CODE").unwrap_or(defaults.code),
            item: get("CHALLAN_FIELD_ITEM").unwrap_or(defaults.item),
            ordered_qty: get("CHALLAN_FIELD_ORDERED_QTY").unwrap_or(defaults.ordered_qty),
            received_qty: get("CHALLAN_FIELD_RECEIVED_QTY").unwrap_or(defaults.received_qty),
            status: get("CHALLAN_FIELD_STATUS").unwrap_or(defaults.status),
            transfer_id: get("CHALLAN_FIELD_TRANSFER_ID").unwrap_or(defaults.transfer_id),
        };

        let timeout = match get("CHALLAN_TIMEOUT_SECS") {
            None => DEFAULT_TIMEOUT,
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError::Invalid {
                        var: "CHALLAN_TIMEOUT_SECS",
                        value: raw,
                        reason: "expected a positive number of seconds".to_string(),
                    });
                }
            },
        };

        let optimistic_receive = match get("CHALLAN_OPTIMISTIC_RECEIVE").as_deref() {
            None | Some("false") | Some("0") => false,
            Some("true") | Some("1") => true,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    var: "CHALLAN_OPTIMISTIC_RECEIVE",
                    value: other.to_string(),
                    reason: "expected true or false".to_string(),
                });
            }
        };

        let default_columns = get("CHALLAN_COLUMNS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|c| !c.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            source,
            view,
            fields,
            timeout,
            cache_key: get("CHALLAN_CACHE_KEY").unwrap_or_else(|| DEFAULT_CACHE_KEY.to_string()),
            cache_db: get("CHALLAN_CACHE_DB").map(PathBuf::from),
            date_format: get("CHALLAN_DATE_FORMAT").unwrap_or_else(|| DEFAULT_DATE_FORMAT.to_string()),
            optimistic_receive,
            min_progress: DEFAULT_MIN_PROGRESS,
            default_columns,
        })
    }

    /// Fail fast when a write-class command is configured against a read-only source.
    pub fn require_writable(&self, operation: &'static str) -> Result<(), ConfigError> {
        if self.source.is_writable() {
            Ok(())
        } else {
            Err(ConfigError::ReadOnly(operation))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn script_url_selects_writable_source_with_defaults() {
        let cfg = DesktopConfig::from_lookup(lookup(&[("CHALLAN_SCRIPT_URL", "https://example.test/exec")])).unwrap();
        assert_eq!(
            cfg.source,
            SourceConfig::AppsScript {
                url: "https://example.test/exec".to_string(),
                write_mode: WriteMode::Opaque,
            }
        );
        assert_eq!(cfg.view, DatasetKind::PurchaseOrders);
        assert_eq!(cfg.timeout, DEFAULT_TIMEOUT);
        assert_eq!(cfg.cache_key, DEFAULT_CACHE_KEY);
        assert!(cfg.require_writable("receive").is_ok());
    }

    #[test]
    fn sheets_source_requires_api_key() {
        let err = DesktopConfig::from_lookup(lookup(&[("CHALLAN_SHEETS_ID", "abc")])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("CHALLAN_SHEETS_API_KEY"));
    }

    #[test]
    fn sheets_source_is_read_only() {
        let cfg = DesktopConfig::from_lookup(lookup(&[
            ("CHALLAN_SHEETS_ID", "abc"),
            ("CHALLAN_SHEETS_API_KEY", "key"),
            ("CHALLAN_VIEW", "dc"),
        ]))
        .unwrap();
        assert_eq!(cfg.view, DatasetKind::DeliveryChallans);
        assert_eq!(cfg.require_writable("finalize"), Err(ConfigError::ReadOnly("finalize")));
    }

    #[test]
    fn field_overrides_and_columns_are_applied() {
        let cfg = DesktopConfig::from_lookup(lookup(&[
            ("CHALLAN_SCRIPT_URL", "https://example.test/exec"),
            ("CHALLAN_FIELD_CODE", "CODE"),
            ("CHALLAN_FIELD_STATUS", "PO Status"),
            ("CHALLAN_COLUMNS", "CODE, ITEM ,PO Status"),
        ]))
        .unwrap();
        assert_eq!(cfg.fields.code, "CODE");
        assert_eq!(cfg.fields.status, "PO Status");
        assert_eq!(cfg.fields.item, "item");
        assert_eq!(cfg.default_columns, vec!["CODE", "ITEM", "PO Status"]);
    }

    #[test]
    fn invalid_timeout_is_reported() {
        let err = DesktopConfig::from_lookup(lookup(&[
            ("CHALLAN_SCRIPT_URL", "https://example.test/exec"),
            ("CHALLAN_TIMEOUT_SECS", "0"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "CHALLAN_TIMEOUT_SECS", .. }));
    }

    #[test]
    fn missing_source_is_an_error() {
        assert_eq!(DesktopConfig::from_lookup(lookup(&[])).unwrap_err(), ConfigError::MissingSource);
    }
}
