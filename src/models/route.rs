use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Route {
    #[serde(default)]
    pub distance: Option<String>,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub duration_seconds: Option<f64>,
    #[serde(default)]
    pub polyline: Option<String>,
    #[serde(default)]
    pub eta_updated_at: Option<DateTime<Utc>>,
}

/// Partial route returned by an ETA refresh.
///
/// The outer `Option` tells whether the field was in the response at all,
/// so an explicit `null` clears the stored value while a missing key keeps it.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RouteUpdate {
    #[serde(default, deserialize_with = "present")]
    pub distance: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub duration: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub duration_seconds: Option<Option<f64>>,
    #[serde(default, deserialize_with = "present")]
    pub polyline: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub eta_updated_at: Option<Option<DateTime<Utc>>>,
}

fn present<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl Route {
    /// Applies the fields carried by `update`, leaving the rest untouched.
    pub fn merged(&self, update: RouteUpdate) -> Route {
        let mut next = self.clone();

        if let Some(distance) = update.distance {
            next.distance = distance;
        }
        if let Some(duration) = update.duration {
            next.duration = duration;
        }
        if let Some(duration_seconds) = update.duration_seconds {
            next.duration_seconds = usable_duration(duration_seconds);
        }
        if let Some(polyline) = update.polyline {
            next.polyline = polyline;
        }
        if let Some(eta_updated_at) = update.eta_updated_at {
            next.eta_updated_at = eta_updated_at;
        }

        next
    }

    /// The polyline to draw, ignoring the empty string some backends send
    /// when no geometry is known.
    pub fn encoded_path(&self) -> Option<&str> {
        self.polyline.as_deref().filter(|p| !p.is_empty())
    }
}

pub(crate) fn usable_duration(seconds: Option<f64>) -> Option<f64> {
    seconds.filter(|s| s.is_finite() && *s > 0.0)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{Route, RouteUpdate};

    fn route() -> Route {
        Route {
            distance: Some("3.1 km".to_string()),
            duration: Some("15 min".to_string()),
            duration_seconds: Some(900.0),
            polyline: Some("_p~iF~ps|U".to_string()),
            eta_updated_at: None,
        }
    }

    #[test]
    fn missing_keys_keep_previous_values() {
        let update: RouteUpdate = serde_json::from_value(json!({ "duration_seconds": 300 })).unwrap();
        let next = route().merged(update);

        assert_eq!(next.duration_seconds, Some(300.0));
        assert_eq!(next.polyline, route().polyline);
        assert_eq!(next.distance, route().distance);
    }

    #[test]
    fn explicit_null_clears_a_field() {
        let update: RouteUpdate =
            serde_json::from_value(json!({ "polyline": null, "duration_seconds": null })).unwrap();
        let next = route().merged(update);

        assert_eq!(next.polyline, None);
        assert_eq!(next.duration_seconds, None);
        assert_eq!(next.duration, route().duration);
    }

    #[test]
    fn unusable_durations_are_dropped_on_merge() {
        let update: RouteUpdate = serde_json::from_value(json!({ "duration_seconds": -4 })).unwrap();

        assert_eq!(route().merged(update).duration_seconds, None);
    }

    #[test]
    fn empty_polyline_is_not_a_path() {
        let mut r = route();
        r.polyline = Some(String::new());

        assert_eq!(r.encoded_path(), None);
        assert_eq!(route().encoded_path(), Some("_p~iF~ps|U"));
    }
}
