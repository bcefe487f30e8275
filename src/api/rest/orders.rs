use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::geo::polyline::PolylineError;
use crate::geo::GeoPoint;
use crate::models::order::{Order, OrderRecord};
use crate::models::route::Route;
use crate::models::snapshot::TimelineSnapshot;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/orders", post(register_order))
        .route("/orders/:id", get(get_order).delete(untrack_order))
        .route("/orders/:id/timeline", get(get_timeline))
        .route("/orders/:id/path", get(get_path))
        .route("/orders/:id/refresh-eta", post(refresh_eta))
}

#[derive(Deserialize)]
pub struct TimelineQuery {
    pub at: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
pub struct TimelineResponse {
    #[serde(flatten)]
    pub snapshot: TimelineSnapshot,
    pub refreshing: bool,
}

#[derive(Serialize)]
pub struct PathResponse {
    pub order_id: String,
    pub points: Vec<GeoPoint>,
    pub decode_error: Option<String>,
}

#[derive(Serialize)]
pub struct RefreshResponse {
    pub id: String,
    pub route: Route,
}

async fn register_order(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<OrderRecord>,
) -> Result<Json<Order>, AppError> {
    let order = Order::try_from(payload)?;
    let session = state.track(order);

    Ok(Json(session.order().to_order()))
}

async fn get_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Order>, AppError> {
    let session = state.session(&id).await?;

    Ok(Json(session.order().to_order()))
}

async fn untrack_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.untrack(&id)?;

    Ok(StatusCode::NO_CONTENT)
}

async fn get_timeline(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<TimelineQuery>,
) -> Result<Json<TimelineResponse>, AppError> {
    let session = state.session(&id).await?;
    let now = query.at.unwrap_or_else(Utc::now);

    Ok(Json(TimelineResponse {
        snapshot: session.snapshot(now),
        refreshing: session.is_refreshing(),
    }))
}

async fn get_path(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<PathResponse>, AppError> {
    let session = state.session(&id).await?;
    let route = session.order().route_state();

    Ok(Json(PathResponse {
        order_id: id,
        points: route.path.to_vec(),
        decode_error: route.path_error.as_ref().map(PolylineError::to_string),
    }))
}

async fn refresh_eta(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<RefreshResponse>, AppError> {
    let session = state.session(&id).await?;
    let route = session.refresh().await?;

    Ok(Json(RefreshResponse { id, route }))
}
