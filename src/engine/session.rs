use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, watch};
use tracing::{info, warn};

use crate::engine::refresh::{RefreshCoordinator, RefreshError};
use crate::engine::ticker::Ticker;
use crate::engine::tracking::TrackedOrder;
use crate::models::order::Order;
use crate::models::route::Route;
use crate::models::snapshot::TimelineSnapshot;
use crate::observability::metrics::Metrics;
use crate::upstream::OrderBackend;

/// Owned handle for tracking one order: its state, its ticker and its
/// refresh coordinator. Stopping is final.
pub struct TrackingSession {
    order: Arc<TrackedOrder>,
    coordinator: RefreshCoordinator,
    events_tx: broadcast::Sender<TimelineSnapshot>,
    shutdown_tx: watch::Sender<bool>,
    ticker: Mutex<Option<Ticker>>,
    metrics: Metrics,
}

impl TrackingSession {
    pub fn new(
        order: Order,
        backend: Arc<dyn OrderBackend>,
        metrics: Metrics,
        event_buffer_size: usize,
    ) -> Self {
        let order = Arc::new(TrackedOrder::new(order, metrics.clone()));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (events_tx, _unused_rx) = broadcast::channel(event_buffer_size.max(1));
        let coordinator =
            RefreshCoordinator::new(order.clone(), backend, shutdown_rx, metrics.clone());

        Self {
            order,
            coordinator,
            events_tx,
            shutdown_tx,
            ticker: Mutex::new(None),
            metrics,
        }
    }

    pub fn order(&self) -> &Arc<TrackedOrder> {
        &self.order
    }

    pub fn id(&self) -> &str {
        self.order.id()
    }

    /// Starts the ticker. Returns false if it was already running or the
    /// session has been stopped.
    pub fn start(&self, period: Duration) -> bool {
        if self.is_stopped() {
            warn!(order_id = self.id(), "refusing to start a stopped tracking session");
            return false;
        }

        let mut ticker = self.ticker.lock().unwrap_or_else(PoisonError::into_inner);
        if ticker.as_ref().is_some_and(|t| !t.is_finished()) {
            return false;
        }

        *ticker = Some(Ticker::spawn(
            self.order.clone(),
            self.events_tx.clone(),
            period,
            self.shutdown_tx.subscribe(),
            self.metrics.clone(),
        ));
        info!(order_id = self.id(), "tracking started");
        true
    }

    pub fn stop(&self) {
        let already_stopped = self.shutdown_tx.send_replace(true);

        let ticker = self
            .ticker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(ticker) = ticker {
            ticker.stop();
        }

        if !already_stopped {
            info!(order_id = self.id(), "tracking stopped");
        }
    }

    pub fn is_stopped(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    pub fn is_refreshing(&self) -> bool {
        self.coordinator.is_refreshing()
    }

    pub async fn refresh(&self) -> Result<Route, RefreshError> {
        self.coordinator.refresh().await
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> TimelineSnapshot {
        self.order.snapshot(now)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TimelineSnapshot> {
        self.events_tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.events_tx.receiver_count()
    }
}

impl Drop for TrackingSession {
    fn drop(&mut self) {
        self.shutdown_tx.send_replace(true);
    }
}
