use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::engine::tracking::TrackedOrder;
use crate::models::route::Route;
use crate::observability::metrics::Metrics;
use crate::upstream::{OrderBackend, UpstreamError};

#[derive(Debug, Error)]
pub enum RefreshError {
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error("tracking of order {0} stopped before the refresh finished")]
    Cancelled(String),
}

/// Fetches fresh route data for one order on demand and merges it in.
///
/// Calls may overlap. Each response is merged atomically when it arrives,
/// so the last one to land wins. Nothing is written after the session's
/// shutdown signal fires.
pub struct RefreshCoordinator {
    order: Arc<TrackedOrder>,
    backend: Arc<dyn OrderBackend>,
    shutdown: watch::Receiver<bool>,
    in_flight: AtomicUsize,
    metrics: Metrics,
}

struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl RefreshCoordinator {
    pub fn new(
        order: Arc<TrackedOrder>,
        backend: Arc<dyn OrderBackend>,
        shutdown: watch::Receiver<bool>,
        metrics: Metrics,
    ) -> Self {
        Self {
            order,
            backend,
            shutdown,
            in_flight: AtomicUsize::new(0),
            metrics,
        }
    }

    pub fn is_refreshing(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    pub async fn refresh(&self) -> Result<Route, RefreshError> {
        let _in_flight = InFlight::enter(&self.in_flight);
        let start = Instant::now();

        let result = self.fetch_and_apply().await;
        let elapsed = start.elapsed().as_secs_f64();
        let order_id = self.order.id();

        match &result {
            Ok(route) => {
                self.metrics.record_refresh("success", elapsed);
                info!(
                    order_id,
                    duration_seconds = ?route.duration_seconds,
                    "route refreshed"
                );
            }
            Err(RefreshError::Cancelled(_)) => {
                self.metrics.record_refresh("cancelled", elapsed);
                info!(order_id, "discarding refresh for stopped session");
            }
            Err(err) => {
                self.metrics.record_refresh("error", elapsed);
                warn!(order_id, error = %err, "route refresh failed; keeping previous route");
            }
        }

        result
    }

    async fn fetch_and_apply(&self) -> Result<Route, RefreshError> {
        let mut shutdown = self.shutdown.clone();
        if *shutdown.borrow_and_update() {
            return Err(self.cancelled());
        }

        let update = tokio::select! {
            result = self.backend.refresh_route(self.order.id()) => result?,
            _ = shutdown.changed() => return Err(self.cancelled()),
        };

        if *self.shutdown.borrow() {
            return Err(self.cancelled());
        }

        Ok(self.order.apply_route_update(update))
    }

    fn cancelled(&self) -> RefreshError {
        RefreshError::Cancelled(self.order.id().to_string())
    }
}
