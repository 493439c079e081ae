//! Gateway for a serverless web-app endpoint that wraps the sheet.
//!
//! `GET <url>` returns the dataset; `POST <url>` with a JSON body records
//! receipts or finalizes a challan. The same URL serves every operation.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use challan_core::{ItemCode, Quantity, TransferId};
use challan_records::Dataset;

use super::{
    Ack, BulkBody, DataSource, FinalizeBody, GatewayError, PayloadDecoder, ReceiveBody, ReceiveItem,
    WriteGateway, WriteMode, WriteResponse,
};

/// Read/write HTTP gateway.
#[derive(Debug, Clone)]
pub struct AppsScriptGateway {
    client: reqwest::Client,
    url: String,
    write_mode: WriteMode,
    decoder: PayloadDecoder,
}

impl AppsScriptGateway {
    pub fn new(
        url: impl Into<String>,
        write_mode: WriteMode,
        timeout: Duration,
        decoder: PayloadDecoder,
    ) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(GatewayError::from_reqwest)?;
        Ok(Self {
            client,
            url: url.into(),
            write_mode,
            decoder,
        })
    }

    async fn post<B: Serialize + Sync>(&self, body: &B) -> Result<Ack, GatewayError> {
        let resp = self
            .client
            .post(&self.url)
            .json(body)
            .send()
            .await
            .map_err(GatewayError::from_reqwest)?;

        match self.write_mode {
            // The response is deliberately not inspected; the follow-up fetch
            // is what tells us whether the write landed.
            WriteMode::Opaque => Ok(Ack::Submitted),
            WriteMode::Acknowledged => {
                let status = resp.status();
                if !status.is_success() {
                    let text = resp.text().await.unwrap_or_default();
                    return Err(GatewayError::Api(status.as_u16(), text));
                }
                let parsed: WriteResponse = resp.json().await.map_err(|e| GatewayError::Parse(e.to_string()))?;
                parsed.into_ack()
            }
        }
    }
}

#[async_trait]
impl DataSource for AppsScriptGateway {
    async fn fetch_all(&self) -> Result<Dataset, GatewayError> {
        let resp = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(GatewayError::from_reqwest)?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(GatewayError::Api(status.as_u16(), text));
        }

        let body = resp.bytes().await.map_err(GatewayError::from_reqwest)?;
        self.decoder.decode(&body)
    }

    fn writable(&self) -> bool {
        true
    }
}

#[async_trait]
impl WriteGateway for AppsScriptGateway {
    async fn submit_receive(&self, code: &ItemCode, quantity: Quantity) -> Result<Ack, GatewayError> {
        tracing::info!(%code, %quantity, "submitting receipt");
        self.post(&ReceiveBody { code, quantity }).await
    }

    async fn submit_bulk(&self, items: &[ReceiveItem]) -> Result<Ack, GatewayError> {
        tracing::info!(items = items.len(), "submitting bulk receipt");
        self.post(&BulkBody { items }).await
    }

    async fn finalize(&self, transfer_id: &TransferId) -> Result<Ack, GatewayError> {
        tracing::info!(%transfer_id, "finalizing delivery challan");
        self.post(&FinalizeBody { transfer_id }).await
    }
}
