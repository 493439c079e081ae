use serde::{Deserialize, Serialize};

/// Mapping from logical field names to the physical column names of the sheet.
///
/// The defaults are the logical names themselves; deployments whose sheet uses
/// headers such as `CODE` or `PO Status` override them through configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FieldNames {
    pub code: String,
    pub item: String,
    pub ordered_qty: String,
    pub received_qty: String,
    pub status: String,
    pub transfer_id: String,
}

impl Default for FieldNames {
    fn default() -> Self {
        Self {
            code: "code".to_string(),
            item: "item".to_string(),
            ordered_qty: "orderedQty".to_string(),
            received_qty: "receivedQty".to_string(),
            status: "status".to_string(),
            transfer_id: "transferId".to_string(),
        }
    }
}
