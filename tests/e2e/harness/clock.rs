use chrono::{DateTime, TimeZone, Utc};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Controllable time for ordering and timestamp tests.
///
/// Passed to the stores via `with_time_provider()`. Every read advances the
/// clock by one millisecond so no two records share a timestamp.
#[derive(Clone)]
pub struct MockClock {
    micros: Arc<AtomicI64>,
}

impl MockClock {
    /// Create a clock starting at 2025-01-15T09:00:00Z.
    pub fn new() -> Self {
        let start = Utc
            .with_ymd_and_hms(2025, 1, 15, 9, 0, 0)
            .single()
            .expect("valid start instant");
        Self::starting_at(start)
    }

    pub fn starting_at(at: DateTime<Utc>) -> Self {
        Self {
            micros: Arc::new(AtomicI64::new(at.timestamp_micros())),
        }
    }

    /// Creates a time provider suitable for passing to the stores.
    pub fn as_provider(&self) -> impl Fn() -> DateTime<Utc> + Send + Sync + 'static {
        let micros = self.micros.clone();
        move || {
            let at = micros.fetch_add(1_000, Ordering::SeqCst);
            DateTime::from_timestamp_micros(at).expect("mock clock in range")
        }
    }

    /// Current instant, without advancing.
    pub fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_micros(self.micros.load(Ordering::SeqCst))
            .expect("mock clock in range")
    }

    /// Advance time by duration
    pub fn advance(&self, duration: Duration) {
        self.micros
            .fetch_add(duration.as_micros() as i64, Ordering::SeqCst);
    }

    pub fn advance_hours(&self, hours: u64) {
        self.advance(Duration::from_secs(hours * 3600));
    }

    pub fn advance_days(&self, days: u64) {
        self.advance(Duration::from_secs(days * 86400));
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}
