use crate::models::Distance;
use crate::time_codec::Duration;

const MILES_PER_KM: f64 = 0.621371;

pub fn km_to_miles(km: f64) -> f64 {
    km * MILES_PER_KM
}

/// Format kilometers with 2 decimal places
pub fn format_distance_km(km: f64) -> String {
    format!("{:.2} km", km)
}

/// Format kilometers as miles with 2 decimal places
pub fn format_distance_miles(km: f64) -> String {
    format!("{:.2} mi", km_to_miles(km))
}

/// Average pace over a race as fractional minutes per mile, for
/// [`crate::pace::format_pace`]. `None` for a zero time.
pub fn pace_per_mile(distance: Distance, time: &Duration) -> Option<f64> {
    if time.is_zero() {
        return None;
    }

    let minutes = time.total_seconds() as f64 / 60.0;
    Some(minutes / km_to_miles(distance.kilometers()))
}
