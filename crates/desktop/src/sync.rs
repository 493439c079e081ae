//! Cache-first synchronization with the remote source.
//!
//! An activation runs two phases: the cache phase paints whatever was stored
//! last time, then the network phase fetches the dataset and replaces the
//! model only when the fetched payload differs from the cached one.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use challan_records::Dataset;

use crate::cache::{KeyValueStore, LocalCache, encode};
use crate::gateway::{DataSource, GatewayError};
use crate::offline::OfflineMode;
use crate::progress::ProgressIndicator;
use crate::state::{LoadState, Session};
use crate::types::ProgressState;

/// What the network phase did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// New data was installed and persisted.
    Updated { rows: usize },
    /// The fetched payload matched the cache byte for byte.
    Unchanged,
    /// The fetch failed; the previous model (if any) is still shown.
    Failed(GatewayError),
    /// Another network phase was already running.
    Skipped,
}

impl SyncOutcome {
    pub fn changed(&self) -> bool {
        matches!(self, SyncOutcome::Updated { .. })
    }
}

/// What the cache phase found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePhase {
    Hit { rows: usize },
    Miss,
}

/// Clears the in-flight flag when the network phase ends, even if the
/// future driving it is dropped.
struct FlightGuard(Arc<AtomicBool>);

impl FlightGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| FlightGuard(Arc::clone(flag)))
    }
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct SyncController<S> {
    cache: LocalCache<S>,
    timeout: Duration,
    progress: ProgressIndicator,
    offline: OfflineMode,
    in_flight: Arc<AtomicBool>,
    /// Exact text of the last cache entry read or written.
    cached_raw: Option<String>,
}

impl<S: KeyValueStore> SyncController<S> {
    pub fn new(cache: LocalCache<S>, timeout: Duration, min_progress: Duration) -> Self {
        Self {
            cache,
            timeout,
            progress: ProgressIndicator::new(min_progress),
            offline: OfflineMode::new(),
            in_flight: Arc::new(AtomicBool::new(false)),
            cached_raw: None,
        }
    }

    pub fn offline(&self) -> &OfflineMode {
        &self.offline
    }

    pub fn is_refreshing(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Cache phase: install the stored dataset, or mark the session loading.
    pub async fn load_cached(&mut self, session: &mut Session) -> CachePhase {
        let Some(entry) = self.cache.load().await else {
            self.cached_raw = None;
            if session.dataset.is_empty() {
                session.load = LoadState::Loading;
            }
            return CachePhase::Miss;
        };

        let kind = session.dataset.kind();
        let names = session.dataset.names().clone();
        match Dataset::from_snapshot(kind, names, entry.snapshot) {
            Ok(dataset) => {
                let rows = dataset.len();
                session.install(dataset);
                self.cached_raw = Some(entry.raw);
                tracing::info!(rows, "showing cached dataset");
                CachePhase::Hit { rows }
            }
            Err(err) => {
                tracing::warn!(key = %self.cache.key(), "ignoring inconsistent cache entry: {err}");
                self.cached_raw = None;
                if session.dataset.is_empty() {
                    session.load = LoadState::Loading;
                }
                CachePhase::Miss
            }
        }
    }

    /// Network phase: fetch, compare with the cache, install on change.
    ///
    /// `on_progress` observes the indicator as it starts and settles.
    pub async fn refresh<G, F>(&mut self, gateway: &G, session: &mut Session, mut on_progress: F) -> SyncOutcome
    where
        G: DataSource + ?Sized,
        F: FnMut(ProgressState),
    {
        let Some(_guard) = FlightGuard::acquire(&self.in_flight) else {
            tracing::debug!("refresh already in flight");
            return SyncOutcome::Skipped;
        };

        self.progress.begin();
        session.progress = self.progress.state();
        on_progress(session.progress);

        let fetched = match tokio::time::timeout(self.timeout, gateway.fetch_all()).await {
            Ok(result) => result,
            Err(_) => Err(GatewayError::Timeout),
        };

        let outcome = match fetched {
            Ok(dataset) => self.accept(dataset, session).await,
            Err(err) => self.degrade(err, session),
        };

        self.progress.finish(!matches!(outcome, SyncOutcome::Failed(_))).await;
        session.progress = self.progress.state();
        session.connectivity = self.offline.state();
        session.last_synced_at = self.offline.last_synced_at();
        session.offline_reason = self.offline.last_error().map(str::to_string);
        on_progress(session.progress);
        outcome
    }

    async fn accept(&mut self, dataset: Dataset, session: &mut Session) -> SyncOutcome {
        self.offline.set_online(Utc::now());

        let raw = match encode(&dataset.snapshot()) {
            Ok(raw) => raw,
            Err(err) => {
                tracing::error!("{err:#}");
                return SyncOutcome::Failed(GatewayError::Parse(err.to_string()));
            }
        };

        if self.cached_raw.as_deref() == Some(raw.as_str()) {
            tracing::info!("dataset is up to date");
            session.load = LoadState::Ready;
            return SyncOutcome::Unchanged;
        }

        let rows = dataset.len();
        if dataset.dropped_rows() > 0 {
            tracing::debug!(dropped = dataset.dropped_rows(), "skipped rows without a key");
        }
        session.install(dataset);
        self.cache.save_raw(&raw).await;
        self.cached_raw = Some(raw);
        tracing::info!(rows, "installed fresh dataset");
        SyncOutcome::Updated { rows }
    }

    fn degrade(&mut self, err: GatewayError, session: &mut Session) -> SyncOutcome {
        self.offline.set_offline(err.to_string());
        if session.dataset.is_empty() {
            tracing::error!("fetch failed with nothing to show: {err}");
            session.load = LoadState::Failed(err.to_string());
        } else {
            tracing::warn!(rows = session.dataset.len(), "fetch failed, keeping current data: {err}");
        }
        SyncOutcome::Failed(err)
    }

    /// Persist the current model, e.g. after an optimistic local change.
    pub async fn persist(&mut self, dataset: &Dataset) {
        match encode(&dataset.snapshot()) {
            Ok(raw) => {
                self.cache.save_raw(&raw).await;
                self.cached_raw = Some(raw);
            }
            Err(err) => tracing::error!("{err:#}"),
        }
    }

    /// Drop the cache entry so the next activation starts from scratch.
    pub async fn invalidate(&mut self) {
        self.cache.invalidate().await;
        self.cached_raw = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStore;
    use crate::gateway::{InMemoryGateway, PayloadDecoder};
    use crate::types::ConnectivityState;
    use challan_records::{DatasetKind, DatasetSnapshot, FieldNames, Row};

    fn snapshot(codes: &[&str]) -> DatasetSnapshot {
        DatasetSnapshot {
            rows: codes
                .iter()
                .map(|c| Row::new().with("code", *c).with("status", "Pending"))
                .collect(),
            display_columns: vec!["code".into(), "status".into()],
            ..DatasetSnapshot::default()
        }
    }

    fn gateway(codes: &[&str]) -> InMemoryGateway {
        InMemoryGateway::new(
            PayloadDecoder::new(DatasetKind::PurchaseOrders, FieldNames::default()),
            snapshot(codes),
        )
    }

    fn controller(store: MemoryStore) -> SyncController<MemoryStore> {
        SyncController::new(
            LocalCache::new(store, "test"),
            Duration::from_secs(5),
            Duration::from_millis(300),
        )
    }

    fn session() -> Session {
        Session::new(DatasetKind::PurchaseOrders, FieldNames::default())
    }

    #[tokio::test(start_paused = true)]
    async fn unchanged_payload_is_written_once() {
        let store = MemoryStore::new();
        let mut sync = controller(store.clone());
        let mut session = session();
        let remote = gateway(&["A", "B"]);

        assert_eq!(sync.load_cached(&mut session).await, CachePhase::Miss);
        assert_eq!(session.load, LoadState::Loading);

        let first = sync.refresh(&remote, &mut session, |_| {}).await;
        assert_eq!(first, SyncOutcome::Updated { rows: 2 });
        let second = sync.refresh(&remote, &mut session, |_| {}).await;
        assert_eq!(second, SyncOutcome::Unchanged);
        assert_eq!(store.writes(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cache_hit_then_identical_fetch_changes_nothing() {
        let store = MemoryStore::new();
        LocalCache::new(store.clone(), "test").save(&snapshot(&["A"])).await;

        let mut sync = controller(store.clone());
        let mut session = session();
        assert_eq!(sync.load_cached(&mut session).await, CachePhase::Hit { rows: 1 });

        let outcome = sync.refresh(&gateway(&["A"]), &mut session, |_| {}).await;
        assert_eq!(outcome, SyncOutcome::Unchanged);
        assert_eq!(store.writes(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_without_data_surfaces_reason() {
        let mut sync = controller(MemoryStore::new());
        let mut session = session();
        let remote = gateway(&[]);
        remote.fail_fetches(Some(GatewayError::Network("connection refused".into())));

        sync.load_cached(&mut session).await;
        let outcome = sync.refresh(&remote, &mut session, |_| {}).await;
        assert!(matches!(outcome, SyncOutcome::Failed(GatewayError::Network(_))));
        assert_eq!(
            session.load,
            LoadState::Failed("network error: connection refused".into())
        );
        assert!(sync.offline().is_offline());
        assert_eq!(session.progress, ProgressState::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_with_cached_rows_keeps_them() {
        let store = MemoryStore::new();
        LocalCache::new(store.clone(), "test")
            .save(&snapshot(&["A", "B", "C", "D", "E"]))
            .await;
        let mut sync = controller(store);
        let mut session = session();
        let remote = gateway(&[]);
        remote.fail_fetches(Some(GatewayError::Timeout));

        sync.load_cached(&mut session).await;
        sync.refresh(&remote, &mut session, |_| {}).await;
        assert_eq!(session.dataset.len(), 5);
        assert_eq!(session.load, LoadState::Ready);
    }

    #[tokio::test(start_paused = true)]
    async fn session_tracks_last_sync_and_offline_reason() {
        let mut sync = controller(MemoryStore::new());
        let mut session = session();
        let remote = gateway(&["A"]);

        sync.refresh(&remote, &mut session, |_| {}).await;
        let synced = session.last_synced_at.expect("sync time after a good fetch");
        assert_eq!(session.connectivity, ConnectivityState::Online);
        assert!(session.offline_reason.is_none());

        remote.fail_fetches(Some(GatewayError::Timeout));
        sync.refresh(&remote, &mut session, |_| {}).await;
        assert_eq!(session.connectivity, ConnectivityState::Offline);
        assert_eq!(session.last_synced_at, Some(synced));
        assert_eq!(session.offline_reason.as_deref(), Some("request timed out"));

        remote.fail_fetches(None);
        sync.refresh(&remote, &mut session, |_| {}).await;
        assert_eq!(session.connectivity, ConnectivityState::Online);
        assert!(session.offline_reason.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn progress_is_reported_running_then_done() {
        let mut sync = controller(MemoryStore::new());
        let mut session = session();
        let mut seen = Vec::new();
        sync.refresh(&gateway(&["A"]), &mut session, |p| seen.push(p)).await;
        assert_eq!(seen, vec![ProgressState::Running, ProgressState::Done]);
        assert!(!sync.is_refreshing());
    }

    #[tokio::test(start_paused = true)]
    async fn in_flight_flag_blocks_reentry() {
        let mut sync = controller(MemoryStore::new());
        let held = FlightGuard::acquire(&sync.in_flight);
        assert!(held.is_some());

        let mut session = session();
        let outcome = sync.refresh(&gateway(&["A"]), &mut session, |_| {}).await;
        assert_eq!(outcome, SyncOutcome::Skipped);

        drop(held);
        let outcome = sync.refresh(&gateway(&["A"]), &mut session, |_| {}).await;
        assert_eq!(outcome, SyncOutcome::Updated { rows: 1 });
    }
}
