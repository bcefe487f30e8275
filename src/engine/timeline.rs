use chrono::{DateTime, Utc};

use crate::engine::countdown::format_countdown;
use crate::engine::milestones;
use crate::engine::status::{resolve, DeliveryStatus, PhaseRemaining};
use crate::models::route::Route;
use crate::models::snapshot::{StepState, TimelineSnapshot, TimelineStep};

const ARRIVED_LABEL: &str = "Arrived";
const UNKNOWN_ETA_LABEL: &str = "--";

/// Immutable facts of an order that feed the timeline.
#[derive(Debug, Clone, Copy)]
pub struct OrderFacts<'a> {
    pub order_id: &'a str,
    pub created_at: Option<DateTime<Utc>>,
    pub prep_minutes: &'a [u32],
}

pub fn evaluate(facts: OrderFacts<'_>, route: &Route, now: DateTime<Utc>) -> TimelineSnapshot {
    let Some(created_at) = facts.created_at else {
        return snapshot(facts.order_id, now, DeliveryStatus::Placed, None, None);
    };

    let milestones = milestones::compute(
        created_at,
        facts.prep_minutes.iter().copied(),
        route.duration_seconds,
    );
    let resolution = resolve(now, created_at, &milestones);

    snapshot(
        facts.order_id,
        now,
        resolution.status,
        Some(milestones),
        Some(resolution.remaining),
    )
}

fn snapshot(
    order_id: &str,
    now: DateTime<Utc>,
    status: DeliveryStatus,
    milestones: Option<milestones::MilestoneSet>,
    remaining: Option<PhaseRemaining>,
) -> TimelineSnapshot {
    let eta = match (status, remaining) {
        (DeliveryStatus::Delivered, _) => ARRIVED_LABEL.to_string(),
        (_, Some(remaining)) => format_countdown(remaining.total as f64),
        (_, None) => UNKNOWN_ETA_LABEL.to_string(),
    };

    TimelineSnapshot {
        order_id: order_id.to_string(),
        evaluated_at: now,
        status,
        status_index: status.index(),
        milestones,
        remaining,
        eta,
        steps: steps(status, remaining),
    }
}

fn steps(current: DeliveryStatus, remaining: Option<PhaseRemaining>) -> Vec<TimelineStep> {
    DeliveryStatus::ALL
        .iter()
        .map(|&step| {
            let state = match step.cmp(&current) {
                std::cmp::Ordering::Less => StepState::Completed,
                std::cmp::Ordering::Equal => StepState::Active,
                std::cmp::Ordering::Greater => StepState::Pending,
            };

            // Only the kitchen phase shows its own countdown.
            let timer = match (step, state, remaining) {
                (DeliveryStatus::Preparing, StepState::Active, Some(r)) if r.prep > 0 => {
                    Some(format_countdown(r.prep as f64))
                }
                _ => None,
            };

            TimelineStep {
                status: step,
                label: step.label(),
                state,
                timer,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, TimeZone, Utc};

    use super::{evaluate, OrderFacts};
    use crate::engine::status::DeliveryStatus;
    use crate::models::route::Route;
    use crate::models::snapshot::StepState;

    fn created() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn facts(created_at: Option<DateTime<Utc>>) -> OrderFacts<'static> {
        OrderFacts {
            order_id: "ord-1",
            created_at,
            prep_minutes: &[10],
        }
    }

    fn route(duration_seconds: f64) -> Route {
        Route {
            duration_seconds: Some(duration_seconds),
            ..Route::default()
        }
    }

    #[test]
    fn preparing_step_carries_its_timer() {
        let now = created() + Duration::seconds(125);
        let snap = evaluate(facts(Some(created())), &route(300.0), now);

        assert_eq!(snap.status, DeliveryStatus::Preparing);
        assert_eq!(snap.status_index, 1);
        // 610 - 125 = 485s of prep, 1030 - 125 = 905s overall
        assert_eq!(snap.steps[1].timer.as_deref(), Some("8:05"));
        assert_eq!(snap.eta, "15:05");
        assert_eq!(snap.steps[0].state, StepState::Completed);
        assert_eq!(snap.steps[1].state, StepState::Active);
        assert_eq!(snap.steps[4].state, StepState::Pending);
        assert!(snap.steps.iter().filter(|s| s.timer.is_some()).count() == 1);
    }

    #[test]
    fn delivered_orders_read_arrived() {
        let now = created() + Duration::hours(3);
        let snap = evaluate(facts(Some(created())), &route(300.0), now);

        assert_eq!(snap.status, DeliveryStatus::Delivered);
        assert_eq!(snap.eta, "Arrived");
        assert!(snap.steps[..4].iter().all(|s| s.state == StepState::Completed));
        assert_eq!(snap.steps[4].state, StepState::Active);
    }

    #[test]
    fn missing_creation_time_degrades_to_placed() {
        let snap = evaluate(facts(None), &route(300.0), created());

        assert_eq!(snap.status, DeliveryStatus::Placed);
        assert_eq!(snap.eta, "--");
        assert!(snap.milestones.is_none());
        assert!(snap.remaining.is_none());
    }

    #[test]
    fn route_change_is_picked_up_on_next_evaluation() {
        let now = created() + Duration::seconds(100);
        let before = evaluate(facts(Some(created())), &route(900.0), now);
        let after = evaluate(facts(Some(created())), &route(300.0), now);

        let (b, a) = (before.milestones.unwrap(), after.milestones.unwrap());
        assert_eq!(b.prep_ends_at, a.prep_ends_at);
        assert_eq!(b.pickup_ends_at, a.pickup_ends_at);
        assert_eq!(b.delivery_ends_at - a.delivery_ends_at, Duration::seconds(600));
        assert_eq!(before.remaining.unwrap().total - after.remaining.unwrap().total, 600);
    }
}
