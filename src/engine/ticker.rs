use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::debug;

use crate::engine::status::DeliveryStatus;
use crate::engine::tracking::TrackedOrder;
use crate::models::snapshot::TimelineSnapshot;
use crate::observability::metrics::Metrics;

/// Periodically re-evaluates an order's timeline and publishes it.
///
/// A route change triggers an extra evaluation so subscribers see refreshed
/// ETAs without waiting for the next tick. Periodic ticks pause while the
/// order is delivered. The task ends when the shutdown signal fires or the
/// handle is dropped.
pub struct Ticker {
    handle: JoinHandle<()>,
}

impl Ticker {
    pub fn spawn(
        order: Arc<TrackedOrder>,
        events_tx: broadcast::Sender<TimelineSnapshot>,
        period: Duration,
        shutdown: watch::Receiver<bool>,
        metrics: Metrics,
    ) -> Self {
        let handle = tokio::spawn(run(order, events_tx, period, shutdown, metrics));
        Self { handle }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn stop(self) {
        drop(self);
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn run(
    order: Arc<TrackedOrder>,
    events_tx: broadcast::Sender<TimelineSnapshot>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
    metrics: Metrics,
) {
    let mut ticks = interval(period);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut route_rx = order.watch_route();

    debug!(order_id = order.id(), period_ms = period.as_millis() as u64, "ticker started");

    // Once delivered, the timeline only moves again if the route changes.
    let mut delivered = false;

    loop {
        tokio::select! {
            _ = ticks.tick(), if !delivered => {}
            changed = route_rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = shutdown.changed() => break,
        }

        if *shutdown.borrow() {
            break;
        }

        metrics.ticks_total.inc();
        let snapshot = order.snapshot(Utc::now());

        let now_delivered = snapshot.status == DeliveryStatus::Delivered;
        if now_delivered && !delivered {
            debug!(order_id = order.id(), "order delivered, ticker idle until the route changes");
        }
        delivered = now_delivered;

        // No subscribers is fine; the next tick recomputes anyway.
        let _ = events_tx.send(snapshot);
    }

    debug!(order_id = order.id(), "ticker stopped");
}
