//! Remote data gateway: reads the dataset and submits receipts.
//!
//! Reads and writes are separate traits. A gateway built on read-only
//! credentials implements [`DataSource`] only, so write operations against it
//! do not type-check.

pub mod apps_script;
pub mod memory;
pub mod sheets;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use challan_core::{DomainError, ItemCode, Quantity, TransferId};
use challan_records::{Dataset, DatasetKind, DatasetSnapshot, FieldNames, Row};

pub use apps_script::AppsScriptGateway;
pub use memory::{InMemoryGateway, Submission};
pub use sheets::SheetsGateway;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("request timed out")]
    Timeout,
    #[error("network error: {0}")]
    Network(String),
    #[error("Network response was not ok ({0}): {1}")]
    Api(u16, String),
    #[error("malformed response: {0}")]
    Parse(String),
    #[error("request rejected: {0}")]
    Rejected(String),
    #[error("inconsistent dataset: {0}")]
    Invalid(#[from] DomainError),
}

impl GatewayError {
    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GatewayError::Timeout
        } else if err.is_decode() {
            GatewayError::Parse(err.to_string())
        } else {
            GatewayError::Network(err.to_string())
        }
    }
}

/// How write responses are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Fire-and-forget: the response is never read; success is inferred.
    #[default]
    Opaque,
    /// The endpoint answers `{success, message?}` and the client reads it.
    Acknowledged,
}

/// Outcome of a write that did not fail at the transport level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ack {
    /// Sent, but the transport cannot report whether it was applied.
    Submitted,
    /// The endpoint confirmed the write.
    Confirmed { message: Option<String> },
}

impl Ack {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Ack::Confirmed { .. })
    }
}

/// One line of a receipt submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveItem {
    pub code: ItemCode,
    #[serde(rename = "qtyReceived")]
    pub quantity: Quantity,
}

#[derive(Debug, Serialize)]
pub(crate) struct ReceiveBody<'a> {
    pub code: &'a ItemCode,
    #[serde(rename = "qtyReceived")]
    pub quantity: Quantity,
}

#[derive(Debug, Serialize)]
pub(crate) struct BulkBody<'a> {
    pub items: &'a [ReceiveItem],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FinalizeBody<'a> {
    pub transfer_id: &'a TransferId,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WriteResponse {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

impl WriteResponse {
    pub(crate) fn into_ack(self) -> Result<Ack, GatewayError> {
        if self.success {
            Ok(Ack::Confirmed {
                message: self.message,
            })
        } else {
            Err(GatewayError::Rejected(
                self.message.unwrap_or_else(|| "the endpoint reported a failure".to_string()),
            ))
        }
    }
}

/// Read side of the remote source.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Idempotent read of the full dataset and display schema.
    async fn fetch_all(&self) -> Result<Dataset, GatewayError>;

    /// Whether this source also accepts writes; drives write affordances.
    fn writable(&self) -> bool {
        false
    }
}

/// Write side of the remote source. Only read/write credentials implement it.
#[async_trait]
pub trait WriteGateway: DataSource {
    async fn submit_receive(&self, code: &ItemCode, quantity: Quantity) -> Result<Ack, GatewayError>;

    async fn submit_bulk(&self, items: &[ReceiveItem]) -> Result<Ack, GatewayError>;

    /// Move a delivery challan from `Draft` to `Completed`.
    async fn finalize(&self, transfer_id: &TransferId) -> Result<Ack, GatewayError>;
}

/// Decodes read payloads into datasets for one view.
#[derive(Debug, Clone)]
pub struct PayloadDecoder {
    pub kind: DatasetKind,
    pub names: FieldNames,
    pub default_columns: Vec<String>,
}

impl PayloadDecoder {
    pub fn new(kind: DatasetKind, names: FieldNames) -> Self {
        Self {
            kind,
            names,
            default_columns: Vec::new(),
        }
    }

    pub fn with_default_columns(mut self, columns: Vec<String>) -> Self {
        self.default_columns = columns;
        self
    }

    /// Decode a read response body.
    ///
    /// Accepts `{rows|data, displayColumns|displayHeaders, lineItems?}` or a
    /// bare array of rows. A `{success: false, message}` body is a rejection.
    pub fn decode(&self, body: &[u8]) -> Result<Dataset, GatewayError> {
        let value: Value = serde_json::from_slice(body).map_err(|e| GatewayError::Parse(e.to_string()))?;
        let snapshot = self.snapshot_from_value(value)?;
        self.dataset(snapshot)
    }

    pub fn dataset(&self, snapshot: DatasetSnapshot) -> Result<Dataset, GatewayError> {
        Ok(Dataset::from_snapshot(self.kind, self.names.clone(), snapshot)?)
    }

    fn snapshot_from_value(&self, value: Value) -> Result<DatasetSnapshot, GatewayError> {
        match value {
            Value::Array(_) => {
                let rows: Vec<Row> = serde_json::from_value(value).map_err(|e| GatewayError::Parse(e.to_string()))?;
                let display_columns = self.fallback_columns(&rows);
                Ok(DatasetSnapshot {
                    rows,
                    display_columns,
                    line_items: Vec::new(),
                    line_item_columns: Vec::new(),
                })
            }
            Value::Object(mut map) => {
                if let Some(Value::Bool(false)) = map.get("success") {
                    let message = map
                        .get("message")
                        .and_then(Value::as_str)
                        .unwrap_or("the endpoint reported a failure")
                        .to_string();
                    return Err(GatewayError::Rejected(message));
                }

                let rows = take_list::<Row>(&mut map, &["rows", "data"])?
                    .ok_or_else(|| GatewayError::Parse("response has no rows".to_string()))?;
                let line_items = take_list::<Row>(&mut map, &["lineItems"])?.unwrap_or_default();
                let display_columns = match take_list::<Value>(&mut map, &["displayColumns", "displayHeaders"])? {
                    Some(columns) => column_names(columns),
                    None => self.fallback_columns(&rows),
                };
                let line_item_columns = take_list::<Value>(&mut map, &["lineItemColumns", "lineItemHeaders"])?
                    .map(column_names)
                    .unwrap_or_default();
                Ok(DatasetSnapshot {
                    rows,
                    display_columns,
                    line_items,
                    line_item_columns,
                })
            }
            other => Err(GatewayError::Parse(format!(
                "expected an object or an array, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// Schema for payloads that carry none: configured columns, else every
    /// field name seen, sorted.
    fn fallback_columns(&self, rows: &[Row]) -> Vec<String> {
        if !self.default_columns.is_empty() {
            return self.default_columns.clone();
        }
        let mut names: Vec<String> = rows
            .iter()
            .flat_map(|r| r.field_names().map(str::to_string))
            .collect();
        names.sort();
        names.dedup();
        names
    }
}

fn take_list<T: serde::de::DeserializeOwned>(
    map: &mut serde_json::Map<String, Value>,
    keys: &[&str],
) -> Result<Option<Vec<T>>, GatewayError> {
    for key in keys {
        if let Some(value) = map.remove(*key) {
            if value.is_null() {
                return Ok(Some(Vec::new()));
            }
            return serde_json::from_value(value)
                .map(Some)
                .map_err(|e| GatewayError::Parse(format!("field '{key}': {e}")));
        }
    }
    Ok(None)
}

fn column_names(columns: Vec<Value>) -> Vec<String> {
    columns
        .into_iter()
        .map(|c| match c {
            Value::String(s) => s,
            other => other.to_string(),
        })
        .collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decoder() -> PayloadDecoder {
        PayloadDecoder::new(DatasetKind::PurchaseOrders, FieldNames::default())
    }

    #[test]
    fn decodes_rows_with_explicit_schema() {
        let body = br#"{"rows":[{"code":"A","item":"Bolt"}],"displayColumns":["item","code","supplier"]}"#;
        let ds = decoder().decode(body).unwrap();
        assert_eq!(ds.len(), 1);
        assert_eq!(ds.display_columns(), ["item", "code", "supplier"]);
    }

    #[test]
    fn accepts_display_headers_alias() {
        let body = br#"{"data":[{"code":"A"}],"displayHeaders":["code"]}"#;
        let ds = decoder().decode(body).unwrap();
        assert_eq!(ds.display_columns(), ["code"]);
    }

    #[test]
    fn bare_array_uses_sorted_field_names() {
        let body = br#"[{"code":"A","item":"Bolt"},{"code":"B","note":"x"}]"#;
        let ds = decoder().decode(body).unwrap();
        assert_eq!(ds.display_columns(), ["code", "item", "note"]);
    }

    #[test]
    fn bare_array_prefers_configured_columns() {
        let body = br#"[{"code":"A","item":"Bolt"}]"#;
        let ds = decoder()
            .with_default_columns(vec!["item".into(), "code".into()])
            .decode(body)
            .unwrap();
        assert_eq!(ds.display_columns(), ["item", "code"]);
    }

    #[test]
    fn failure_body_is_a_rejection() {
        let err = decoder().decode(br#"{"success":false,"message":"sheet locked"}"#).unwrap_err();
        assert_eq!(err, GatewayError::Rejected("sheet locked".to_string()));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        assert!(matches!(decoder().decode(b"<html>"), Err(GatewayError::Parse(_))));
        assert!(matches!(decoder().decode(b"42"), Err(GatewayError::Parse(_))));
    }

    #[test]
    fn duplicate_codes_are_an_inconsistent_dataset() {
        let err = decoder().decode(br#"[{"code":"A"},{"code":"A"}]"#).unwrap_err();
        assert!(matches!(err, GatewayError::Invalid(DomainError::InvariantViolation(_))));
    }

    #[test]
    fn write_bodies_use_wire_field_names() {
        let code: ItemCode = "X1".parse().unwrap();
        let single = serde_json::to_value(ReceiveBody {
            code: &code,
            quantity: Quantity::new(3).unwrap(),
        })
        .unwrap();
        assert_eq!(single, serde_json::json!({"code": "X1", "qtyReceived": 3}));

        let items = vec![ReceiveItem {
            code: code.clone(),
            quantity: Quantity::new(2).unwrap(),
        }];
        let bulk = serde_json::to_value(BulkBody { items: &items }).unwrap();
        assert_eq!(bulk, serde_json::json!({"items": [{"code": "X1", "qtyReceived": 2}]}));

        let id: TransferId = "DC-1".parse().unwrap();
        let fin = serde_json::to_value(FinalizeBody { transfer_id: &id }).unwrap();
        assert_eq!(fin, serde_json::json!({"transferId": "DC-1"}));
    }

    #[test]
    fn write_response_maps_to_ack() {
        let ok: WriteResponse = serde_json::from_str(r#"{"success":true}"#).unwrap();
        assert_eq!(ok.into_ack().unwrap(), Ack::Confirmed { message: None });

        let failed: WriteResponse = serde_json::from_str(r#"{"success":false,"message":"no such code"}"#).unwrap();
        assert_eq!(failed.into_ack().unwrap_err(), GatewayError::Rejected("no such code".to_string()));
    }
}
