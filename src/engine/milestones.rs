use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

pub const CONFIRM_BUFFER_SECONDS: i64 = 10;
pub const PICKUP_SECONDS: i64 = 120;
pub const DEFAULT_PREP_MINUTES: u32 = 15;
pub const DEFAULT_DRIVE_SECONDS: f64 = 900.0;

/// Absolute end times of each delivery phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MilestoneSet {
    pub confirmed_at: DateTime<Utc>,
    pub prep_ends_at: DateTime<Utc>,
    pub pickup_ends_at: DateTime<Utc>,
    pub delivery_ends_at: DateTime<Utc>,
}

/// Derives the milestones for an order.
///
/// Preparation lasts as long as the slowest item (15 minutes when no item
/// says), pickup is a fixed two minutes and the drive falls back to 15
/// minutes when the route has no usable duration.
pub fn compute<I>(
    created_at: DateTime<Utc>,
    item_prep_minutes: I,
    drive_duration_seconds: Option<f64>,
) -> MilestoneSet
where
    I: IntoIterator<Item = u32>,
{
    let prep = Duration::seconds(60 * i64::from(prep_minutes(item_prep_minutes)));
    let drive = Duration::milliseconds(drive_millis(drive_duration_seconds));

    let confirmed_at = add(created_at, Duration::seconds(CONFIRM_BUFFER_SECONDS));
    let prep_ends_at = add(confirmed_at, prep);
    let pickup_ends_at = add(prep_ends_at, Duration::seconds(PICKUP_SECONDS));
    let delivery_ends_at = add(pickup_ends_at, drive);

    MilestoneSet {
        confirmed_at,
        prep_ends_at,
        pickup_ends_at,
        delivery_ends_at,
    }
}

fn prep_minutes<I>(item_prep_minutes: I) -> u32
where
    I: IntoIterator<Item = u32>,
{
    item_prep_minutes
        .into_iter()
        .filter(|minutes| *minutes > 0)
        .max()
        .unwrap_or(DEFAULT_PREP_MINUTES)
}

fn drive_millis(drive_duration_seconds: Option<f64>) -> i64 {
    let seconds = drive_duration_seconds
        .filter(|seconds| seconds.is_finite() && *seconds > 0.0)
        .unwrap_or(DEFAULT_DRIVE_SECONDS);

    // Float to int casts saturate, so absurd durations clamp to i64::MAX.
    (seconds * 1000.0).round() as i64
}

fn add(at: DateTime<Utc>, delta: Duration) -> DateTime<Utc> {
    at.checked_add_signed(delta)
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, TimeZone, Utc};

    use super::compute;

    fn created() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn slowest_item_drives_preparation() {
        let m = compute(created(), [5, 20, 12], Some(600.0));

        assert_eq!(m.confirmed_at, created() + Duration::seconds(10));
        assert_eq!(m.prep_ends_at, created() + Duration::seconds(10 + 20 * 60));
        assert_eq!(m.pickup_ends_at, m.prep_ends_at + Duration::seconds(120));
        assert_eq!(m.delivery_ends_at, m.pickup_ends_at + Duration::seconds(600));
    }

    #[test]
    fn defaults_apply_when_data_is_missing() {
        let m = compute(created(), [], None);

        assert_eq!(m.prep_ends_at, created() + Duration::seconds(10 + 900));
        assert_eq!(m.delivery_ends_at, m.pickup_ends_at + Duration::seconds(900));
    }

    #[test]
    fn zero_prep_times_and_non_positive_drive_fall_back() {
        let zero = compute(created(), [0, 0], Some(0.0));
        let negative = compute(created(), [0], Some(-30.0));
        let nan = compute(created(), [0], Some(f64::NAN));
        let defaults = compute(created(), [], None);

        assert_eq!(zero, defaults);
        assert_eq!(negative, defaults);
        assert_eq!(nan, defaults);
    }

    #[test]
    fn milestones_never_decrease() {
        for prep in [0, 1, 15, 90] {
            for drive in [None, Some(0.0), Some(0.4), Some(300.0), Some(7200.5)] {
                let m = compute(created(), [prep], drive);

                assert!(created() < m.prep_ends_at);
                assert!(m.confirmed_at <= m.prep_ends_at);
                assert!(m.prep_ends_at <= m.pickup_ends_at);
                assert!(m.pickup_ends_at <= m.delivery_ends_at);
            }
        }
    }

    #[test]
    fn shorter_drive_moves_only_the_delivery_milestone() {
        let before = compute(created(), [10], Some(900.0));
        let after = compute(created(), [10], Some(300.0));

        assert_eq!(after.prep_ends_at, before.prep_ends_at);
        assert_eq!(after.pickup_ends_at, before.pickup_ends_at);
        assert_eq!(
            before.delivery_ends_at - after.delivery_ends_at,
            Duration::seconds(600)
        );
    }

    #[test]
    fn fractional_drive_keeps_millisecond_precision() {
        let m = compute(created(), [10], Some(90.25));

        assert_eq!(
            m.delivery_ends_at - m.pickup_ends_at,
            Duration::milliseconds(90_250)
        );
    }

    #[test]
    fn huge_drive_saturates_instead_of_panicking() {
        let m = compute(created(), [10], Some(f64::MAX));

        assert_eq!(m.delivery_ends_at, DateTime::<Utc>::MAX_UTC);
    }

    #[test]
    fn largest_prep_time_is_honoured() {
        let m = compute(created(), [u32::MAX], None);

        assert_eq!(
            m.prep_ends_at - m.confirmed_at,
            Duration::seconds(60 * i64::from(u32::MAX))
        );
    }
}
