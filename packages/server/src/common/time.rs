//! Millisecond timestamps.
//!
//! Hot state stores Unix milliseconds; Postgres stores `timestamptz`.

use chrono::{DateTime, Utc};

/// Current wall-clock time in Unix milliseconds.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Convert a hot-state timestamp to a durable one. Zero and negative values
/// mean "unset".
pub fn datetime_from_millis(millis: i64) -> Option<DateTime<Utc>> {
    if millis <= 0 {
        return None;
    }
    DateTime::<Utc>::from_timestamp_millis(millis)
}

pub fn millis_from_datetime(value: DateTime<Utc>) -> i64 {
    value.timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_is_unset() {
        assert!(datetime_from_millis(0).is_none());
        assert!(datetime_from_millis(-5).is_none());
    }

    #[test]
    fn test_millis_survive_conversion() {
        let millis = 1_700_000_000_123;
        let dt = datetime_from_millis(millis).unwrap();
        assert_eq!(millis_from_datetime(dt), millis);
    }
}
