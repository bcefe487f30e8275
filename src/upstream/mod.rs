pub mod http;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::models::order::OrderRecord;
use crate::models::route::RouteUpdate;

pub use http::HttpOrderBackend;

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("order {0} not found upstream")]
    NotFound(String),

    #[error("upstream returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("upstream rejected request: {0}")]
    Rejected(String),

    #[error("upstream request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("failed to parse upstream response: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Storefront response wrapper: `{ "success": bool, "data": .., "error": .. }`.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> Envelope<T> {
    pub fn into_data(self) -> Result<T, UpstreamError> {
        match (self.success, self.data) {
            (true, Some(data)) => Ok(data),
            (true, None) => Err(UpstreamError::Rejected("response carried no data".to_string())),
            (false, _) => Err(UpstreamError::Rejected(
                self.error.unwrap_or_else(|| "unknown error".to_string()),
            )),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RefreshPayload {
    #[serde(default)]
    pub id: Option<String>,
    pub route: RouteUpdate,
}

/// The storefront backend as seen by the tracker.
#[async_trait]
pub trait OrderBackend: Send + Sync {
    async fn fetch_order(&self, order_id: &str) -> Result<OrderRecord, UpstreamError>;

    async fn refresh_route(&self, order_id: &str) -> Result<RouteUpdate, UpstreamError>;
}
