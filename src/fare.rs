use crate::models::rates::Rates;

/// Fare for the given time buckets. Callers guarantee non-negative seconds.
pub fn fare(stopped_seconds: f64, moving_seconds: f64, rates: Rates) -> f64 {
    stopped_seconds * rates.stopped + moving_seconds * rates.moving
}
