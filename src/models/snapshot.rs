use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::engine::milestones::MilestoneSet;
use crate::engine::status::{DeliveryStatus, PhaseRemaining};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepState {
    Completed,
    Active,
    Pending,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineStep {
    pub status: DeliveryStatus,
    pub label: &'static str,
    pub state: StepState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timer: Option<String>,
}

/// Everything a renderer needs to draw the tracking view at one instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineSnapshot {
    pub order_id: String,
    pub evaluated_at: DateTime<Utc>,
    pub status: DeliveryStatus,
    pub status_index: usize,
    pub milestones: Option<MilestoneSet>,
    pub remaining: Option<PhaseRemaining>,
    pub eta: String,
    pub steps: Vec<TimelineStep>,
}
