//! The application: one owner of session state, one place for transitions.
//!
//! Every user action is an `App` method. Each method mutates the session,
//! re-renders through [`render::render`], and hands the view to the observer.
//! Write actions only exist when the gateway implements [`WriteGateway`].

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

use challan_core::{DomainError, ItemCode, Quantity, RowKey, TransferId};
use challan_records::{DatasetKind, FieldNames};

use crate::cache::{KeyValueStore, LocalCache};
use crate::config::{DEFAULT_DATE_FORMAT, DEFAULT_MIN_PROGRESS, DEFAULT_TIMEOUT, DesktopConfig};
use crate::filter::{self, StatusFilter};
use crate::gateway::{Ack, DataSource, GatewayError, WriteGateway};
use crate::render::{self, RenderOptions};
use crate::state::{Mode, Session};
use crate::summary::{SummaryDraft, SummaryTotals};
use crate::sync::{CachePhase, SyncController, SyncOutcome};
use crate::types::{Notice, ProgressState, ViewModel};

/// Receives every freshly rendered view.
pub trait ViewObserver: Send {
    fn render(&mut self, view: &ViewModel);

    /// The refresh indicator changed state.
    fn progress(&mut self, _state: ProgressState) {}
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ActionError {
    #[error("{}", .0.user_message())]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppSettings {
    pub view: DatasetKind,
    pub fields: FieldNames,
    pub date_format: String,
    pub optimistic_receive: bool,
    pub timeout: Duration,
    pub min_progress: Duration,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            view: DatasetKind::PurchaseOrders,
            fields: FieldNames::default(),
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            optimistic_receive: false,
            timeout: DEFAULT_TIMEOUT,
            min_progress: DEFAULT_MIN_PROGRESS,
        }
    }
}

impl From<&DesktopConfig> for AppSettings {
    fn from(config: &DesktopConfig) -> Self {
        Self {
            view: config.view,
            fields: config.fields.clone(),
            date_format: config.date_format.clone(),
            optimistic_receive: config.optimistic_receive,
            timeout: config.timeout,
            min_progress: config.min_progress,
        }
    }
}

pub struct App<G, S> {
    gateway: G,
    sync: SyncController<S>,
    session: Session,
    options: RenderOptions,
    optimistic_receive: bool,
    timeout: Duration,
    observer: Option<Box<dyn ViewObserver>>,
}

impl<G: DataSource, S: KeyValueStore> App<G, S> {
    pub fn new(gateway: G, cache: LocalCache<S>, settings: AppSettings) -> Self {
        let options = RenderOptions {
            date_format: settings.date_format,
            writable: gateway.writable(),
        };
        Self {
            sync: SyncController::new(cache, settings.timeout, settings.min_progress),
            session: Session::new(settings.view, settings.fields),
            options,
            optimistic_receive: settings.optimistic_receive,
            timeout: settings.timeout,
            observer: None,
            gateway,
        }
    }

    pub fn with_observer(mut self, observer: impl ViewObserver + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn sync(&self) -> &SyncController<S> {
        &self.sync
    }

    pub fn view(&self) -> ViewModel {
        render::render(&self.session, &self.options)
    }

    fn publish(&mut self) {
        let view = render::render(&self.session, &self.options);
        if let Some(observer) = self.observer.as_mut() {
            observer.render(&view);
        }
    }

    /// Record a failed action for the user and hand the error back.
    fn fail(&mut self, err: impl Into<ActionError>) -> ActionError {
        let err = err.into();
        tracing::warn!("action failed: {err}");
        self.session.notice = Some(Notice::error(err.to_string()));
        self.publish();
        err
    }

    /// Run both sync phases: paint from cache, then fetch.
    pub async fn activate(&mut self) -> SyncOutcome {
        match self.sync.load_cached(&mut self.session).await {
            CachePhase::Hit { rows } => tracing::debug!(rows, "painted from cache"),
            CachePhase::Miss => tracing::debug!("cache miss, waiting for network"),
        }
        self.publish();
        self.refresh().await
    }

    /// Network phase only.
    pub async fn refresh(&mut self) -> SyncOutcome {
        let observer = &mut self.observer;
        let outcome = self
            .sync
            .refresh(&self.gateway, &mut self.session, |state| {
                if let Some(observer) = observer.as_mut() {
                    observer.progress(state);
                }
            })
            .await;

        match &outcome {
            SyncOutcome::Updated { .. } => self.publish(),
            SyncOutcome::Failed(_) if self.session.dataset.is_empty() => self.publish(),
            _ => {}
        }
        outcome
    }

    pub fn set_search(&mut self, term: impl Into<String>) {
        self.session.filter.search = term.into();
        self.publish();
    }

    pub fn set_status_filter(&mut self, status: StatusFilter) {
        self.session.filter.status = status;
        self.publish();
    }

    fn require_selection(&self) -> Result<(), DomainError> {
        if !self.options.writable {
            return Err(DomainError::permission_denied(
                "The data source is read-only; items cannot be received.",
            ));
        }
        if self.session.dataset.kind() != DatasetKind::PurchaseOrders {
            return Err(DomainError::validation("Only purchase-order lines can be selected."));
        }
        Ok(())
    }

    /// Flip one row's selection. Returns whether it is now selected.
    pub fn toggle_row(&mut self, key: &str) -> Result<bool, ActionError> {
        let key = self.checked_key(key).map_err(|e| self.fail(e))?;
        let selected = self.session.selection.toggle(key);
        self.publish();
        Ok(selected)
    }

    fn checked_key(&self, key: &str) -> Result<RowKey, DomainError> {
        self.require_selection()?;
        let key = RowKey::parse(key)?;
        if !self.session.dataset.contains_key(&key) {
            return Err(DomainError::not_found(format!("item {key}")));
        }
        Ok(key)
    }

    /// The "select all" checkbox. Returns the resulting selection size.
    pub fn set_select_all(&mut self, checked: bool) -> Result<usize, ActionError> {
        self.require_selection().map_err(|e| self.fail(e))?;
        let dataset = &self.session.dataset;
        let visible: Vec<RowKey> = filter::apply_displayed(dataset, &self.session.filter, &self.options.date_format)
            .into_iter()
            .filter_map(|row| dataset.key_of(row))
            .collect();
        self.session.selection.set_all(checked, visible);
        self.publish();
        Ok(self.session.selection.len())
    }

    pub fn create_summary(&mut self) -> Result<SummaryTotals, ActionError> {
        self.require_selection().map_err(|e| self.fail(e))?;
        let draft = SummaryDraft::from_selection(&self.session.dataset, &self.session.selection)
            .map_err(|e| self.fail(e))?;
        let totals = draft.totals();
        self.session.mode = Mode::Summary(draft);
        self.publish();
        Ok(totals)
    }

    pub fn edit_summary_quantity(&mut self, key: &str, raw: impl Into<String>) -> Result<SummaryTotals, ActionError> {
        let key = RowKey::parse(key).map_err(|e| self.fail(e))?;
        let totals = match &mut self.session.mode {
            Mode::Summary(draft) => draft.set_quantity(&key, raw),
            _ => Err(DomainError::invariant("no summary is open")),
        }
        .map_err(|e| self.fail(e))?;
        self.publish();
        Ok(totals)
    }

    /// Discard the summary inputs; no network calls.
    pub fn cancel_summary(&mut self) {
        self.back_to_main();
    }

    pub fn back_to_main(&mut self) {
        self.session.mode = Mode::Main;
        self.session.selection.clear();
        self.publish();
    }

    pub fn open_challan(&mut self, transfer_id: &str) -> Result<(), ActionError> {
        let transfer_id = self.checked_challan(transfer_id).map_err(|e| self.fail(e))?;
        self.session.mode = Mode::Challan(transfer_id);
        self.publish();
        Ok(())
    }

    fn checked_challan(&self, transfer_id: &str) -> Result<TransferId, DomainError> {
        if self.session.dataset.kind() != DatasetKind::DeliveryChallans {
            return Err(DomainError::validation("Delivery challans are not loaded in this view."));
        }
        let transfer_id = TransferId::parse(transfer_id)?;
        if !self
            .session
            .dataset
            .contains_key(&RowKey::from(transfer_id.clone()))
        {
            return Err(DomainError::not_found(format!("delivery challan {transfer_id}")));
        }
        Ok(transfer_id)
    }

    pub fn dismiss_notice(&mut self) {
        if self.session.notice.take().is_some() {
            self.publish();
        }
    }

    async fn send<T, F>(&self, call: F) -> Result<T, GatewayError>
    where
        F: Future<Output = Result<T, GatewayError>>,
    {
        tokio::time::timeout(self.timeout, call)
            .await
            .unwrap_or(Err(GatewayError::Timeout))
    }
}

impl<G: WriteGateway, S: KeyValueStore> App<G, S> {
    /// Receive `raw_quantity` units of one item, then re-fetch.
    pub async fn receive(&mut self, code: &str, raw_quantity: &str) -> Result<Ack, ActionError> {
        let (code, quantity) = self.checked_receipt(code, raw_quantity).map_err(|e| self.fail(e))?;

        let sent = self.send(self.gateway.submit_receive(&code, quantity)).await;
        let ack = match sent {
            Ok(ack) => ack,
            Err(err) => return Err(self.fail(err)),
        };
        tracing::info!(code = %code, quantity = quantity.get(), confirmed = ack.is_confirmed(), "receipt submitted");

        if self.optimistic_receive {
            match self.session.dataset.apply_local_receive(&code, quantity) {
                Ok(status) => {
                    tracing::debug!(code = %code, %status, "applied receipt locally");
                    self.sync.persist(&self.session.dataset).await;
                }
                Err(err) => tracing::warn!("could not apply receipt locally: {err}"),
            }
        }

        let what = format!("receipt of {} x {code}", quantity.get());
        self.session.notice = Some(ack_notice(&ack, &what));
        self.publish();
        self.refresh().await;
        Ok(ack)
    }

    fn checked_receipt(&self, code: &str, raw_quantity: &str) -> Result<(ItemCode, Quantity), DomainError> {
        let quantity = Quantity::parse(raw_quantity)?;
        let code = ItemCode::parse(code)?;
        if self.session.dataset.kind() != DatasetKind::PurchaseOrders {
            return Err(DomainError::validation("Only purchase-order lines can be received."));
        }
        if !self.session.dataset.contains_key(&RowKey::from(code.clone())) {
            return Err(DomainError::not_found(format!("item {code}")));
        }
        Ok((code, quantity))
    }

    /// Submit the open summary as one bulk receipt and start over from the
    /// network. On failure the summary stays open with its inputs.
    pub async fn submit_summary(&mut self) -> Result<Ack, ActionError> {
        let items = match &self.session.mode {
            Mode::Summary(draft) => draft.items(),
            _ => Err(DomainError::invariant("no summary is open")),
        }
        .map_err(|e| self.fail(e))?;

        let sent = self.send(self.gateway.submit_bulk(&items)).await;
        let ack = match sent {
            Ok(ack) => ack,
            Err(err) => return Err(self.fail(err)),
        };
        tracing::info!(items = items.len(), confirmed = ack.is_confirmed(), "bulk receipt submitted");

        self.sync.invalidate().await;
        self.session.mode = Mode::Main;
        self.session.selection.clear();
        self.session.reset_dataset();
        self.session.notice = Some(ack_notice(&ack, &format!("receipt of {} items", items.len())));
        self.activate().await;
        Ok(ack)
    }

    /// Move a draft delivery challan to `Completed`, then re-fetch.
    pub async fn finalize(&mut self, transfer_id: &str) -> Result<Ack, ActionError> {
        let transfer_id = self
            .checked_challan(transfer_id)
            .and_then(|id| {
                if self.session.dataset.can_finalize(&id) {
                    Ok(id)
                } else {
                    Err(DomainError::validation("Only draft challans can be finalized."))
                }
            })
            .map_err(|e| self.fail(e))?;

        let sent = self.send(self.gateway.finalize(&transfer_id)).await;
        let ack = match sent {
            Ok(ack) => ack,
            Err(err) => return Err(self.fail(err)),
        };
        tracing::info!(transfer_id = %transfer_id, confirmed = ack.is_confirmed(), "finalize submitted");

        self.session.notice = Some(ack_notice(&ack, &format!("finalization of {transfer_id}")));
        self.publish();
        self.refresh().await;
        Ok(ack)
    }
}

/// Opaque writes only claim submission; the follow-up fetch is the truth.
fn ack_notice(ack: &Ack, what: &str) -> Notice {
    match ack {
        Ack::Submitted => Notice::info(format!("Submitted {what}; refreshing to confirm.")),
        Ack::Confirmed { message: Some(message) } => Notice::success(message.clone()),
        Ack::Confirmed { message: None } => Notice::success(format!("Recorded {what}.")),
    }
}
