//! The single owner of client state.
//!
//! Everything the renderer reads lives here. Only `App` methods mutate it.

use chrono::{DateTime, Utc};

use challan_core::TransferId;
use challan_records::{Dataset, DatasetKind, FieldNames};

use crate::filter::{FilterState, StatusFilter};
use crate::selection::Selection;
use crate::summary::SummaryDraft;
use crate::types::{ConnectivityState, Notice, ProgressState};

/// Which screen is in front.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Main,
    Summary(SummaryDraft),
    Challan(TransferId),
}

/// How far the dataset got in the current activation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LoadState {
    /// Nothing attempted yet.
    #[default]
    Idle,
    /// Cache miss; waiting on the first fetch.
    Loading,
    Ready,
    /// The fetch failed and there was nothing to fall back to.
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct Session {
    pub dataset: Dataset,
    pub filter: FilterState,
    pub selection: Selection,
    pub mode: Mode,
    pub load: LoadState,
    pub notice: Option<Notice>,
    pub progress: ProgressState,
    pub connectivity: ConnectivityState,
    /// When the last fetch succeeded in this run.
    pub last_synced_at: Option<DateTime<Utc>>,
    /// Why the last fetch failed, while offline.
    pub offline_reason: Option<String>,
}

impl Session {
    /// Delivery challans list every parent by default; purchase orders start
    /// on the open-items view.
    pub fn new(kind: DatasetKind, names: FieldNames) -> Self {
        let status = match kind {
            DatasetKind::PurchaseOrders => StatusFilter::Open,
            DatasetKind::DeliveryChallans => StatusFilter::Any,
        };
        Self {
            dataset: Dataset::empty(kind, names),
            filter: FilterState::new("", status),
            selection: Selection::new(),
            mode: Mode::Main,
            load: LoadState::Idle,
            notice: None,
            progress: ProgressState::Idle,
            connectivity: ConnectivityState::Online,
            last_synced_at: None,
            offline_reason: None,
        }
    }

    /// Swap in a fresh dataset, dropping selected keys that vanished with it.
    pub fn install(&mut self, dataset: Dataset) {
        self.dataset.replace(dataset);
        let pruned = self.selection.prune(&self.dataset);
        if pruned > 0 {
            tracing::debug!(pruned, "dropped selected keys missing from refreshed dataset");
        }
        self.load = LoadState::Ready;
    }

    /// Forget the dataset, e.g. before re-running a sync from scratch.
    pub fn reset_dataset(&mut self) {
        self.dataset = Dataset::empty(self.dataset.kind(), self.dataset.names().clone());
        self.load = LoadState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use challan_records::{DatasetSnapshot, Row};

    fn dataset(codes: &[&str]) -> Dataset {
        Dataset::from_snapshot(
            DatasetKind::PurchaseOrders,
            FieldNames::default(),
            DatasetSnapshot {
                rows: codes.iter().map(|c| Row::new().with("code", *c)).collect(),
                display_columns: vec!["code".into()],
                ..DatasetSnapshot::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn install_prunes_vanished_selection() {
        let mut session = Session::new(DatasetKind::PurchaseOrders, FieldNames::default());
        session.install(dataset(&["A", "B"]));
        session.selection.toggle("A".parse().unwrap());
        session.selection.toggle("B".parse().unwrap());

        session.install(dataset(&["B", "C"]));
        assert_eq!(session.selection.len(), 1);
        assert!(session.selection.contains(&"B".parse().unwrap()));
        assert_eq!(session.load, LoadState::Ready);
    }

    #[test]
    fn reset_keeps_kind_and_field_names() {
        let names = FieldNames {
            transfer_id: "TransferID".into(),
            ..FieldNames::default()
        };
        let mut session = Session::new(DatasetKind::DeliveryChallans, names.clone());
        session.reset_dataset();
        assert_eq!(session.dataset.kind(), DatasetKind::DeliveryChallans);
        assert_eq!(session.dataset.names(), &names);
        assert!(session.dataset.is_empty());
        assert_eq!(session.filter.status, StatusFilter::Any);
    }
}
