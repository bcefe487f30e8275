use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::engine::milestones::{MilestoneSet, CONFIRM_BUFFER_SECONDS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryStatus {
    Placed,
    Preparing,
    PickingUp,
    OnTheWay,
    Delivered,
}

impl DeliveryStatus {
    pub const ALL: [DeliveryStatus; 5] = [
        DeliveryStatus::Placed,
        DeliveryStatus::Preparing,
        DeliveryStatus::PickingUp,
        DeliveryStatus::OnTheWay,
        DeliveryStatus::Delivered,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn label(self) -> &'static str {
        match self {
            DeliveryStatus::Placed => "Order confirmed",
            DeliveryStatus::Preparing => "Preparing your order",
            DeliveryStatus::PickingUp => "Picking up order",
            DeliveryStatus::OnTheWay => "Heading to you",
            DeliveryStatus::Delivered => "Arrived",
        }
    }
}

/// Whole seconds left until each forward milestone, never negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PhaseRemaining {
    pub prep: i64,
    pub pickup: i64,
    pub total: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub status: DeliveryStatus,
    pub remaining: PhaseRemaining,
}

pub fn resolve(now: DateTime<Utc>, created_at: DateTime<Utc>, milestones: &MilestoneSet) -> Resolution {
    let elapsed_ms = (now - created_at).num_milliseconds();

    let status = if elapsed_ms < CONFIRM_BUFFER_SECONDS * 1000 {
        DeliveryStatus::Placed
    } else if now < milestones.prep_ends_at {
        DeliveryStatus::Preparing
    } else if now < milestones.pickup_ends_at {
        DeliveryStatus::PickingUp
    } else if now < milestones.delivery_ends_at {
        DeliveryStatus::OnTheWay
    } else {
        DeliveryStatus::Delivered
    };

    Resolution {
        status,
        remaining: PhaseRemaining {
            prep: seconds_until(now, milestones.prep_ends_at),
            pickup: seconds_until(now, milestones.pickup_ends_at),
            total: seconds_until(now, milestones.delivery_ends_at),
        },
    }
}

fn seconds_until(now: DateTime<Utc>, milestone: DateTime<Utc>) -> i64 {
    (milestone - now).num_milliseconds().div_euclid(1000).max(0)
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, TimeZone, Utc};

    use super::{resolve, DeliveryStatus};
    use crate::engine::milestones::{compute, MilestoneSet};

    fn created() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn milestones() -> MilestoneSet {
        // prep ends at +610s, pickup at +730s, delivery at +1030s
        compute(created(), [10], Some(300.0))
    }

    fn status_at(offset_ms: i64) -> DeliveryStatus {
        resolve(created() + Duration::milliseconds(offset_ms), created(), &milestones()).status
    }

    #[test]
    fn walks_through_every_phase() {
        assert_eq!(status_at(0), DeliveryStatus::Placed);
        assert_eq!(status_at(9_999), DeliveryStatus::Placed);
        assert_eq!(status_at(10_000), DeliveryStatus::Preparing);
        assert_eq!(status_at(609_999), DeliveryStatus::Preparing);
        assert_eq!(status_at(610_000), DeliveryStatus::PickingUp);
        assert_eq!(status_at(730_000), DeliveryStatus::OnTheWay);
        assert_eq!(status_at(1_029_999), DeliveryStatus::OnTheWay);
        assert_eq!(status_at(1_030_000), DeliveryStatus::Delivered);
        assert_eq!(status_at(10_000_000), DeliveryStatus::Delivered);
    }

    #[test]
    fn clock_before_creation_is_placed() {
        assert_eq!(status_at(-60_000), DeliveryStatus::Placed);
    }

    #[test]
    fn status_never_regresses_as_time_advances() {
        let mut previous = DeliveryStatus::Placed;

        for offset in (-5_000..1_200_000).step_by(1_337) {
            let current = status_at(offset);
            assert!(current >= previous, "regressed at {offset}ms");
            previous = current;
        }

        assert_eq!(previous, DeliveryStatus::Delivered);
    }

    #[test]
    fn delivered_exactly_at_the_last_milestone() {
        let m = milestones();
        let just_before = m.delivery_ends_at - Duration::milliseconds(1);

        assert_eq!(resolve(just_before, created(), &m).status, DeliveryStatus::OnTheWay);
        assert_eq!(resolve(m.delivery_ends_at, created(), &m).status, DeliveryStatus::Delivered);
    }

    #[test]
    fn remaining_seconds_are_floored_and_clamped() {
        let m = milestones();
        let now = created() + Duration::milliseconds(100_500);
        let remaining = resolve(now, created(), &m).remaining;

        assert_eq!(remaining.prep, 509);
        assert_eq!(remaining.pickup, 629);
        assert_eq!(remaining.total, 929);

        let late = resolve(created() + Duration::seconds(5_000), created(), &m).remaining;
        assert_eq!((late.prep, late.pickup, late.total), (0, 0, 0));
    }

    #[test]
    fn zero_length_phases_are_skipped() {
        let m = compute(created(), [1], Some(300.0));
        let tied = MilestoneSet {
            pickup_ends_at: m.prep_ends_at,
            delivery_ends_at: m.prep_ends_at,
            ..m
        };

        assert_eq!(
            resolve(tied.prep_ends_at, created(), &tied).status,
            DeliveryStatus::Delivered
        );
    }

    #[test]
    fn indices_follow_declaration_order() {
        let indices: Vec<usize> = DeliveryStatus::ALL.iter().map(|s| s.index()).collect();

        assert_eq!(indices, vec![0, 1, 2, 3, 4]);
    }
}
