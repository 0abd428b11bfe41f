//! Health payload and its timestamp source.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::store::ConnectionState;

/// Body of both health endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    pub timestamp: String,
    pub environment: String,
    pub version: String,
    pub store: ConnectionState,
}

/// Hands out RFC 3339 timestamps that strictly increase.
///
/// Two calls within the same microsecond, or a wall clock stepping backwards,
/// still produce increasing values.
#[derive(Debug, Default)]
pub struct MonotonicTimestamp {
    last_micros: AtomicI64,
}

impl MonotonicTimestamp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> String {
        self.next_from(Utc::now().timestamp_micros())
    }

    fn next_from(&self, now_micros: i64) -> String {
        let mut last = self.last_micros.load(Ordering::Relaxed);
        let issued = loop {
            let candidate = now_micros.max(last + 1);
            match self.last_micros.compare_exchange_weak(
                last,
                candidate,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => break candidate,
                Err(actual) => last = actual,
            }
        };

        DateTime::<Utc>::from_timestamp_micros(issued)
            .unwrap_or_else(Utc::now)
            .to_rfc3339_opts(SecondsFormat::Micros, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(ts: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(ts).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn same_microsecond_still_increases() {
        let clock = MonotonicTimestamp::new();
        let now = Utc::now().timestamp_micros();

        let first = parse(&clock.next_from(now));
        let second = parse(&clock.next_from(now));
        assert!(second > first);
    }

    #[test]
    fn clock_stepping_back_does_not_reverse() {
        let clock = MonotonicTimestamp::new();
        let now = Utc::now().timestamp_micros();

        let first = parse(&clock.next_from(now));
        let second = parse(&clock.next_from(now - 5_000_000));
        assert!(second > first);
    }

    #[test]
    fn renders_microsecond_precision() {
        let clock = MonotonicTimestamp::new();
        let ts = clock.next_from(1_700_000_000_123_456);
        assert_eq!(ts, "2023-11-14T22:13:20.123456Z");
    }
}
