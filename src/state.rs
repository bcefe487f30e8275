use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::time::{interval, MissedTickBehavior};
use tracing::info;

use crate::engine::session::TrackingSession;
use crate::engine::status::DeliveryStatus;
use crate::error::AppError;
use crate::models::order::Order;
use crate::observability::metrics::Metrics;
use crate::upstream::OrderBackend;

pub struct AppState {
    pub sessions: DashMap<String, Arc<TrackingSession>>,
    pub backend: Arc<dyn OrderBackend>,
    pub metrics: Metrics,
    pub tick_interval: Duration,
    pub event_buffer_size: usize,
}

impl AppState {
    pub fn new(
        backend: Arc<dyn OrderBackend>,
        tick_interval: Duration,
        event_buffer_size: usize,
    ) -> Self {
        Self {
            sessions: DashMap::new(),
            backend,
            metrics: Metrics::new(),
            tick_interval,
            event_buffer_size,
        }
    }

    fn new_session(&self, order: Order) -> Arc<TrackingSession> {
        Arc::new(TrackingSession::new(
            order,
            self.backend.clone(),
            self.metrics.clone(),
            self.event_buffer_size,
        ))
    }

    /// Starts tracking `order`, replacing any session for the same id.
    pub fn track(&self, order: Order) -> Arc<TrackingSession> {
        let session = self.new_session(order);
        session.start(self.tick_interval);

        if let Some(previous) = self.sessions.insert(session.id().to_string(), session.clone()) {
            previous.stop();
            info!(order_id = session.id(), "replaced existing tracking session");
        }
        self.metrics.tracked_orders.set(self.sessions.len() as i64);

        session
    }

    /// Returns the live session, fetching the order from the backend first
    /// if it is not tracked yet.
    pub async fn session(&self, order_id: &str) -> Result<Arc<TrackingSession>, AppError> {
        if let Some(session) = self.sessions.get(order_id) {
            return Ok(session.value().clone());
        }

        let record = self.backend.fetch_order(order_id).await?;
        let mut order = Order::try_from(record)?;
        order.id = order_id.to_string();

        // Concurrent first requests race here; only one of them inserts.
        let (session, inserted) = match self.sessions.entry(order_id.to_string()) {
            Entry::Occupied(entry) => (entry.get().clone(), false),
            Entry::Vacant(entry) => {
                let session = self.new_session(order);
                entry.insert(session.clone());
                (session, true)
            }
        };

        if inserted {
            session.start(self.tick_interval);
            self.metrics.tracked_orders.set(self.sessions.len() as i64);
        }

        Ok(session)
    }

    pub fn untrack(&self, order_id: &str) -> Result<(), AppError> {
        let (_, session) = self
            .sessions
            .remove(order_id)
            .ok_or_else(|| AppError::NotFound(format!("order {order_id} is not tracked")))?;

        session.stop();
        self.metrics.tracked_orders.set(self.sessions.len() as i64);
        Ok(())
    }

    /// Stops and removes sessions whose order has been delivered, unless a
    /// subscriber is still attached or a refresh is in flight. Returns how
    /// many were removed.
    pub fn evict_delivered(&self, now: DateTime<Utc>) -> usize {
        let mut evicted = Vec::new();

        self.sessions.retain(|_, session| {
            let idle = session.subscriber_count() == 0
                && !session.is_refreshing()
                && session.snapshot(now).status == DeliveryStatus::Delivered;
            if idle {
                evicted.push(session.clone());
            }
            !idle
        });

        for session in &evicted {
            session.stop();
        }
        if !evicted.is_empty() {
            self.metrics.tracked_orders.set(self.sessions.len() as i64);
            info!(evicted = evicted.len(), "evicted delivered tracking sessions");
        }

        evicted.len()
    }

    pub fn shutdown(&self) {
        for entry in self.sessions.iter() {
            entry.value().stop();
        }
    }
}

/// Runs `evict_delivered` every `period` until the task is aborted.
pub async fn sweep_delivered(state: Arc<AppState>, period: Duration) {
    let mut ticks = interval(period);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticks.tick().await;
        state.evict_delivered(Utc::now());
    }
}
