use std::sync::Mutex;

use async_trait::async_trait;

use challan_core::{ItemCode, Quantity, RowKey, TransferId};
use challan_records::{CellValue, Dataset, DatasetSnapshot, RowStatus};

use super::{Ack, DataSource, GatewayError, PayloadDecoder, ReceiveItem, WriteGateway};

/// A write recorded by [`InMemoryGateway`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    Receive { code: ItemCode, quantity: Quantity },
    Bulk(Vec<ReceiveItem>),
    Finalize(TransferId),
}

#[derive(Debug)]
struct Remote {
    snapshot: DatasetSnapshot,
    fetch_error: Option<GatewayError>,
    write_error: Option<GatewayError>,
    fetches: usize,
    submissions: Vec<Submission>,
}

/// In-memory stand-in for the remote sheet.
///
/// Intended for tests/dev. Writes are applied to the held snapshot the way
/// the real endpoint applies them, so a follow-up fetch observes them.
#[derive(Debug)]
pub struct InMemoryGateway {
    decoder: PayloadDecoder,
    remote: Mutex<Remote>,
}

impl InMemoryGateway {
    pub fn new(decoder: PayloadDecoder, snapshot: DatasetSnapshot) -> Self {
        Self {
            decoder,
            remote: Mutex::new(Remote {
                snapshot,
                fetch_error: None,
                write_error: None,
                fetches: 0,
                submissions: Vec::new(),
            }),
        }
    }

    fn with_remote<T>(&self, f: impl FnOnce(&mut Remote) -> T) -> T {
        let mut guard = match self.remote.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }

    pub fn set_snapshot(&self, snapshot: DatasetSnapshot) {
        self.with_remote(|r| r.snapshot = snapshot);
    }

    pub fn snapshot(&self) -> DatasetSnapshot {
        self.with_remote(|r| r.snapshot.clone())
    }

    /// Make every subsequent fetch fail with `err` (`None` to recover).
    pub fn fail_fetches(&self, err: Option<GatewayError>) {
        self.with_remote(|r| r.fetch_error = err);
    }

    /// Make every subsequent write fail with `err` (`None` to recover).
    pub fn fail_writes(&self, err: Option<GatewayError>) {
        self.with_remote(|r| r.write_error = err);
    }

    pub fn fetches(&self) -> usize {
        self.with_remote(|r| r.fetches)
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.with_remote(|r| r.submissions.clone())
    }

    fn apply(&self, submission: Submission) -> Result<Ack, GatewayError> {
        let decoder = self.decoder.clone();
        self.with_remote(|r| {
            if let Some(err) = r.write_error.clone() {
                return Err(err);
            }
            let mut dataset = decoder.dataset(r.snapshot.clone())?;
            match &submission {
                Submission::Receive { code, quantity } => {
                    dataset.apply_local_receive(code, *quantity)?;
                }
                Submission::Bulk(items) => {
                    for item in items {
                        dataset.apply_local_receive(&item.code, item.quantity)?;
                    }
                }
                Submission::Finalize(transfer_id) => {
                    finalize_in_place(&mut dataset, transfer_id, &mut r.snapshot)?;
                    r.submissions.push(submission);
                    return Ok(Ack::Confirmed { message: None });
                }
            }
            r.snapshot = dataset.snapshot();
            r.submissions.push(submission);
            Ok(Ack::Confirmed { message: None })
        })
    }
}

fn finalize_in_place(
    dataset: &mut Dataset,
    transfer_id: &TransferId,
    snapshot: &mut DatasetSnapshot,
) -> Result<(), GatewayError> {
    if !dataset.can_finalize(transfer_id) {
        return Err(GatewayError::Rejected(format!("{transfer_id} is not a draft challan")));
    }
    let key = RowKey::from(transfer_id.clone());
    let names = dataset.names().clone();
    for row in snapshot.rows.iter_mut() {
        if dataset.key_of(row).as_ref() == Some(&key) {
            row.set(names.status.clone(), CellValue::Text(RowStatus::Completed.to_string()));
        }
    }
    Ok(())
}

#[async_trait]
impl DataSource for InMemoryGateway {
    async fn fetch_all(&self) -> Result<Dataset, GatewayError> {
        let snapshot = self.with_remote(|r| {
            r.fetches += 1;
            match &r.fetch_error {
                Some(err) => Err(err.clone()),
                None => Ok(r.snapshot.clone()),
            }
        })?;
        self.decoder.dataset(snapshot)
    }

    fn writable(&self) -> bool {
        true
    }
}

#[async_trait]
impl WriteGateway for InMemoryGateway {
    async fn submit_receive(&self, code: &ItemCode, quantity: Quantity) -> Result<Ack, GatewayError> {
        self.apply(Submission::Receive {
            code: code.clone(),
            quantity,
        })
    }

    async fn submit_bulk(&self, items: &[ReceiveItem]) -> Result<Ack, GatewayError> {
        self.apply(Submission::Bulk(items.to_vec()))
    }

    async fn finalize(&self, transfer_id: &TransferId) -> Result<Ack, GatewayError> {
        self.apply(Submission::Finalize(transfer_id.clone()))
    }
}
