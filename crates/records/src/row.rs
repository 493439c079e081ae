use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::fields::FieldNames;
use crate::status::RowStatus;

/// A single primitive cell value as delivered by the sheet.
///
/// Nested JSON (arrays, objects) is not expected from a spreadsheet; if it
/// shows up it is kept as its JSON text so nothing is silently lost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum CellValue {
    Empty,
    Text(String),
    Number(serde_json::Number),
    Bool(bool),
}

impl CellValue {
    /// The string representation used for display and search.
    pub fn display(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Text(text) => text.clone(),
            CellValue::Number(n) => n.to_string(),
            CellValue::Bool(b) => b.to_string(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(text) => text.trim().is_empty(),
            _ => false,
        }
    }

    /// Integer reading of the cell (fractions are truncated).
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            CellValue::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
            CellValue::Text(text) => {
                let trimmed = text.trim();
                trimmed
                    .parse::<i64>()
                    .ok()
                    .or_else(|| trimmed.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
            }
            CellValue::Empty | CellValue::Bool(_) => None,
        }
    }
}

impl From<Value> for CellValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => CellValue::Empty,
            Value::String(s) => CellValue::Text(s),
            Value::Number(n) => CellValue::Number(n),
            Value::Bool(b) => CellValue::Bool(b),
            nested @ (Value::Array(_) | Value::Object(_)) => CellValue::Text(nested.to_string()),
        }
    }
}

impl From<CellValue> for Value {
    fn from(value: CellValue) -> Self {
        match value {
            CellValue::Empty => Value::Null,
            CellValue::Text(s) => Value::String(s),
            CellValue::Number(n) => Value::Number(n),
            CellValue::Bool(b) => Value::Bool(b),
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        CellValue::Number(value.into())
    }
}

impl From<i32> for CellValue {
    fn from(value: i32) -> Self {
        CellValue::Number(value.into())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        CellValue::Bool(value)
    }
}

/// One order/delivery line: a plain field-name → value map.
///
/// Fields are stored sorted by name so serialization is deterministic; the
/// display order comes from the dataset's display schema, never from here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row {
    fields: BTreeMap<String, CellValue>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, handy for fixtures.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<CellValue>) -> Self {
        self.set(field, value);
        self
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<CellValue>) {
        self.fields.insert(field.into(), value.into());
    }

    pub fn get(&self, field: &str) -> Option<&CellValue> {
        self.fields.get(field)
    }

    /// Display text of a field; missing fields render as empty.
    pub fn text(&self, field: &str) -> String {
        self.get(field).map(CellValue::display).unwrap_or_default()
    }

    /// Integer value of a field, 0 when missing or not numeric.
    pub fn quantity(&self, field: &str) -> i64 {
        self.get(field).and_then(CellValue::as_integer).unwrap_or(0)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &CellValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn item(&self, names: &FieldNames) -> String {
        self.text(&names.item)
    }

    pub fn ordered_qty(&self, names: &FieldNames) -> i64 {
        self.quantity(&names.ordered_qty)
    }

    pub fn received_qty(&self, names: &FieldNames) -> i64 {
        self.quantity(&names.received_qty)
    }

    pub fn transfer_id(&self, names: &FieldNames) -> String {
        self.text(&names.transfer_id)
    }

    pub fn status(&self, names: &FieldNames) -> RowStatus {
        RowStatus::from(self.text(&names.status))
    }
}

impl FromIterator<(String, CellValue)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, CellValue)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_read_as_empty_and_zero() {
        let row = Row::new().with("code", "X1");
        assert_eq!(row.text("item"), "");
        assert_eq!(row.quantity("orderedQty"), 0);
    }

    #[test]
    fn numeric_text_is_read_as_quantity() {
        let row = Row::new().with("orderedQty", " 12 ").with("receivedQty", "2.0");
        assert_eq!(row.quantity("orderedQty"), 12);
        assert_eq!(row.quantity("receivedQty"), 2);
    }

    #[test]
    fn deserializes_primitive_and_empty_values() {
        let row: Row =
            serde_json::from_str(r#"{"code":"X1","orderedQty":10,"note":null,"urgent":true}"#).unwrap();
        assert_eq!(row.get("note"), Some(&CellValue::Empty));
        assert_eq!(row.text("urgent"), "true");
        assert_eq!(row.quantity("orderedQty"), 10);
    }

    #[test]
    fn nested_values_are_kept_as_json_text() {
        let row: Row = serde_json::from_str(r#"{"tags":["a","b"]}"#).unwrap();
        assert_eq!(row.text("tags"), r#"["a","b"]"#);
    }

    #[test]
    fn status_goes_through_field_mapping() {
        let names = FieldNames {
            status: "PO Status".to_string(),
            ..FieldNames::default()
        };
        let row = Row::new().with("PO Status", "partial");
        assert_eq!(row.status(&names), RowStatus::Partial);
    }
}
