//! Read-only gateway over the Google Sheets API v4 `values` endpoint.
//!
//! API keys only grant read access to public sheets, so this gateway
//! implements [`DataSource`] and nothing else.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use challan_records::{CellValue, Dataset, DatasetKind, DatasetSnapshot, Row};

use super::{DataSource, GatewayError, PayloadDecoder};

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// A sheet converted from its 2D `values` array: header row + keyed rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SheetTable {
    pub headers: Vec<String>,
    pub rows: Vec<Row>,
}

impl SheetTable {
    /// The first row is the header; later rows are zipped with it. Short rows
    /// leave their trailing fields absent, extra cells are ignored.
    pub fn from_values(mut values: Vec<Vec<Value>>) -> Self {
        if values.is_empty() {
            return Self::default();
        }
        let headers: Vec<String> = values
            .remove(0)
            .into_iter()
            .map(|h| CellValue::from(h).display().trim().to_string())
            .collect();

        let rows = values
            .into_iter()
            .map(|cells| {
                headers
                    .iter()
                    .zip(cells)
                    .filter(|(header, _)| !header.is_empty())
                    .map(|(header, cell)| (header.clone(), CellValue::from(cell)))
                    .collect::<Row>()
            })
            .collect();

        Self { headers, rows }
    }
}

#[derive(Debug, Clone)]
pub struct SheetsGateway {
    client: reqwest::Client,
    base_url: String,
    spreadsheet_id: String,
    api_key: String,
    sheet: String,
    items_sheet: String,
    decoder: PayloadDecoder,
}

impl SheetsGateway {
    pub fn new(
        base_url: impl Into<String>,
        spreadsheet_id: impl Into<String>,
        api_key: impl Into<String>,
        sheet: impl Into<String>,
        items_sheet: impl Into<String>,
        timeout: Duration,
        decoder: PayloadDecoder,
    ) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(GatewayError::from_reqwest)?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            spreadsheet_id: spreadsheet_id.into(),
            api_key: api_key.into(),
            sheet: sheet.into(),
            items_sheet: items_sheet.into(),
            decoder,
        })
    }

    fn values_url(&self, sheet: &str) -> Result<reqwest::Url, GatewayError> {
        let mut url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| GatewayError::Network(format!("invalid Sheets API base URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| GatewayError::Network("Sheets API base URL cannot carry a path".to_string()))?
            .pop_if_empty()
            .extend(["v4", "spreadsheets", self.spreadsheet_id.as_str(), "values", sheet]);
        Ok(url)
    }

    async fn fetch_sheet(&self, sheet: &str) -> Result<SheetTable, GatewayError> {
        let url = self.values_url(sheet)?;
        let resp = self
            .client
            .get(url)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await
            .map_err(GatewayError::from_reqwest)?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(GatewayError::Api(status.as_u16(), text));
        }

        let range: ValueRange = resp.json().await.map_err(|e| GatewayError::Parse(e.to_string()))?;
        tracing::debug!(sheet, rows = range.values.len(), "fetched sheet values");
        Ok(SheetTable::from_values(range.values))
    }
}

#[async_trait]
impl DataSource for SheetsGateway {
    async fn fetch_all(&self) -> Result<Dataset, GatewayError> {
        let snapshot = match self.decoder.kind {
            DatasetKind::PurchaseOrders => {
                let table = self.fetch_sheet(&self.sheet).await?;
                DatasetSnapshot {
                    rows: table.rows,
                    display_columns: table.headers,
                    line_items: Vec::new(),
                    line_item_columns: Vec::new(),
                }
            }
            DatasetKind::DeliveryChallans => {
                let (parents, children) =
                    tokio::try_join!(self.fetch_sheet(&self.sheet), self.fetch_sheet(&self.items_sheet))?;
                DatasetSnapshot {
                    rows: parents.rows,
                    display_columns: parents.headers,
                    line_items: children.rows,
                    line_item_columns: children.headers,
                }
            }
        };
        self.decoder.dataset(snapshot)
    }
}
