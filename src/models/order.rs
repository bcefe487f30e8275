use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::models::route::{usable_duration, Route};

#[derive(Debug, Error)]
pub enum OrderError {
    #[error("created_at must be an ISO-8601 string")]
    CreatedAtNotString,

    #[error("items must be a list")]
    ItemsNotList,

    #[error("item {index} is malformed: {source}")]
    Item {
        index: usize,
        source: serde_json::Error,
    },

    #[error("route is malformed: {0}")]
    Route(serde_json::Error),
}

/// Order as the storefront backend sends it. Fields stay loosely typed here
/// and are checked once in `Order::try_from`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderRecord {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub created_at: Option<Value>,
    #[serde(default)]
    pub items: Option<Value>,
    #[serde(default)]
    pub route: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ItemRecord {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    quantity: Option<u32>,
    #[serde(default)]
    prep_time_minutes: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderItem {
    pub id: Option<String>,
    pub name: Option<String>,
    pub quantity: u32,
    pub prep_time_minutes: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Order {
    pub id: String,
    pub created_at: Option<DateTime<Utc>>,
    pub items: Vec<OrderItem>,
    pub route: Route,
}

impl Order {
    pub fn prep_minutes(&self) -> impl Iterator<Item = u32> + '_ {
        self.items.iter().filter_map(|item| item.prep_time_minutes)
    }
}

impl TryFrom<OrderRecord> for Order {
    type Error = OrderError;

    fn try_from(record: OrderRecord) -> Result<Self, Self::Error> {
        let id = record
            .id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let created_at = match record.created_at {
            None | Some(Value::Null) => None,
            Some(Value::String(raw)) => parse_timestamp(&id, &raw),
            Some(_) => return Err(OrderError::CreatedAtNotString),
        };

        let items = match record.items {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(raw)) => raw
                .into_iter()
                .enumerate()
                .map(|(index, value)| {
                    serde_json::from_value::<ItemRecord>(value)
                        .map(into_item)
                        .map_err(|source| OrderError::Item { index, source })
                })
                .collect::<Result<Vec<_>, _>>()?,
            Some(_) => return Err(OrderError::ItemsNotList),
        };

        let mut route = match record.route {
            None | Some(Value::Null) => Route::default(),
            Some(raw) => serde_json::from_value::<Route>(raw).map_err(OrderError::Route)?,
        };
        route.duration_seconds = usable_duration(route.duration_seconds);

        Ok(Order {
            id,
            created_at,
            items,
            route,
        })
    }
}

fn into_item(record: ItemRecord) -> OrderItem {
    OrderItem {
        id: record.id,
        name: record.name,
        quantity: record.quantity.unwrap_or(1),
        prep_time_minutes: record
            .prep_time_minutes
            .filter(|minutes| *minutes >= 0)
            .map(|minutes| u32::try_from(minutes).unwrap_or(u32::MAX)),
    }
}

fn parse_timestamp(order_id: &str, raw: &str) -> Option<DateTime<Utc>> {
    match DateTime::parse_from_rfc3339(raw.trim()) {
        Ok(parsed) => Some(parsed.with_timezone(&Utc)),
        Err(err) => {
            warn!(order_id, created_at = raw, error = %err, "ignoring unparsable created_at");
            None
        }
    }
}
