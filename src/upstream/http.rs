use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, error};

use crate::models::order::OrderRecord;
use crate::models::route::RouteUpdate;
use crate::upstream::{Envelope, OrderBackend, RefreshPayload, UpstreamError};

/// Talks to the storefront REST API.
pub struct HttpOrderBackend {
    client: Client,
    base_url: Url,
}

impl HttpOrderBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, UpstreamError> {
        let base_url = Url::parse(base_url).map_err(|err| {
            UpstreamError::Rejected(format!("invalid upstream url {base_url}: {err}"))
        })?;

        if base_url.cannot_be_a_base() {
            return Err(UpstreamError::Rejected(format!(
                "upstream url {base_url} cannot carry a path"
            )));
        }

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self { client, base_url })
    }

    fn order_url(&self, order_id: &str, suffix: Option<&str>) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(["orders", order_id]);
            if let Some(suffix) = suffix {
                segments.push(suffix);
            }
        }
        url
    }

    async fn read<T: DeserializeOwned>(
        &self,
        order_id: &str,
        url: &Url,
        response: reqwest::Response,
    ) -> Result<T, UpstreamError> {
        let status = response.status();
        let text = response.text().await?;

        if status == StatusCode::NOT_FOUND {
            return Err(UpstreamError::NotFound(order_id.to_string()));
        }

        if !status.is_success() {
            let message = serde_json::from_str::<Envelope<serde_json::Value>>(&text)
                .ok()
                .and_then(|envelope| envelope.error)
                .unwrap_or(text);
            error!(%url, status = status.as_u16(), %message, "upstream returned non-success status");
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let envelope: Envelope<T> = serde_json::from_str(&text).map_err(|err| {
            error!(%url, error = %err, body = %text, "failed to parse upstream response");
            err
        })?;

        envelope.into_data()
    }
}

#[async_trait]
impl OrderBackend for HttpOrderBackend {
    async fn fetch_order(&self, order_id: &str) -> Result<OrderRecord, UpstreamError> {
        let url = self.order_url(order_id, None);
        debug!(%url, order_id, "fetching order");

        let response = self.client.get(url.clone()).send().await?;
        self.read(order_id, &url, response).await
    }

    async fn refresh_route(&self, order_id: &str) -> Result<RouteUpdate, UpstreamError> {
        let url = self.order_url(order_id, Some("refresh-eta"));
        debug!(%url, order_id, "requesting eta refresh");

        let response = self.client.post(url.clone()).send().await?;
        let payload: RefreshPayload = self.read(order_id, &url, response).await?;
        Ok(payload.route)
    }
}
