use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::warn;

use crate::engine::timeline::{evaluate, OrderFacts};
use crate::geo::polyline::{decode_partial, PolylineError};
use crate::geo::GeoPoint;
use crate::models::order::{Order, OrderItem};
use crate::models::route::{Route, RouteUpdate};
use crate::models::snapshot::TimelineSnapshot;
use crate::observability::metrics::Metrics;

/// The route together with the path decoded from its polyline.
#[derive(Debug, Clone)]
pub struct RouteState {
    pub route: Route,
    pub path: Arc<[GeoPoint]>,
    pub path_error: Option<PolylineError>,
}

impl RouteState {
    fn decode(order_id: &str, route: Route, metrics: &Metrics) -> Self {
        let (points, path_error) = match route.encoded_path() {
            Some(encoded) => decode_partial(encoded),
            None => (Vec::new(), None),
        };

        if let Some(err) = &path_error {
            metrics.polyline_decode_failures_total.inc();
            warn!(
                order_id,
                error = %err,
                kept_points = points.len(),
                "route polyline only partially decoded"
            );
        }

        Self {
            route,
            path: points.into(),
            path_error,
        }
    }
}

/// An order under tracking.
///
/// Creation time and items never change. The route sits in a single watch
/// cell: writers replace it as a whole, readers always see a complete value.
pub struct TrackedOrder {
    id: String,
    created_at: Option<DateTime<Utc>>,
    items: Vec<OrderItem>,
    prep_minutes: Vec<u32>,
    route: watch::Sender<RouteState>,
    metrics: Metrics,
}

impl TrackedOrder {
    pub fn new(order: Order, metrics: Metrics) -> Self {
        let prep_minutes = order.prep_minutes().collect();
        let state = RouteState::decode(&order.id, order.route, &metrics);
        let (route, _unused_rx) = watch::channel(state);

        Self {
            id: order.id,
            created_at: order.created_at,
            items: order.items,
            prep_minutes,
            route,
            metrics,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn route_state(&self) -> RouteState {
        self.route.borrow().clone()
    }

    pub fn watch_route(&self) -> watch::Receiver<RouteState> {
        self.route.subscribe()
    }

    /// Merges a refreshed route in one step and returns the new route.
    ///
    /// The path is decoded again only when the polyline actually changed.
    pub fn apply_route_update(&self, update: RouteUpdate) -> Route {
        let mut applied = Route::default();

        self.route.send_modify(|state| {
            let route = state.route.merged(update);

            if route.encoded_path() == state.route.encoded_path() {
                state.route = route;
            } else {
                *state = RouteState::decode(&self.id, route, &self.metrics);
            }

            applied = state.route.clone();
        });

        applied
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> TimelineSnapshot {
        let route = self.route.borrow();

        evaluate(
            OrderFacts {
                order_id: &self.id,
                created_at: self.created_at,
                prep_minutes: &self.prep_minutes,
            },
            &route.route,
            now,
        )
    }

    pub fn to_order(&self) -> Order {
        Order {
            id: self.id.clone(),
            created_at: self.created_at,
            items: self.items.clone(),
            route: self.route.borrow().route.clone(),
        }
    }
}
