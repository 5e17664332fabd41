use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Source of "now" and of the pause between poll cycles.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    async fn sleep(&self, duration: Duration);
}

/// Wall clock backed by tokio's timer
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// ISO-8601 rendering used on the wire, e.g. `2024-03-09T16:00:00.000000+00:00`.
pub fn iso8601(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(chrono::SecondsFormat::Micros, false)
}

#[cfg(test)]
pub use manual::ManualClock;


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iso8601_has_utc_offset() {
        let at = DateTime::parse_from_rfc3339("2024-03-09T16:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(iso8601(at), "2024-03-09T16:00:00.000000+00:00");
    }

    #[tokio::test]
    async fn test_manual_clock_sleep_advances_now() {
        let start = Utc::now();
        let clock = ManualClock::new(start);
        clock.sleep(Duration::from_secs(10)).await;
        assert_eq!(clock.now() - start, chrono::Duration::seconds(10));
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(10)]);
    }
}
