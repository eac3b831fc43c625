//! Injectable time source.
//!
//! All timestamp reads go through [`Clock`] so that token expiry, lateness,
//! and grace-window behavior are deterministic under test. Production code
//! uses [`SystemClock`]; tests use [`ManualClock`] (behind the `test-utils`
//! feature).

use chrono::{DateTime, Utc};

/// A source of wall-clock time.
pub trait Clock: Send + Sync {
    /// Current time as UTC.
    fn now_utc(&self) -> DateTime<Utc>;

    /// Current time as epoch milliseconds (the token wire unit).
    fn now_ms(&self) -> i64 {
        self.now_utc().timestamp_millis()
    }
}

/// Wall-clock time via `chrono::Utc`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A manually advanced clock for deterministic tests.
#[cfg(any(test, feature = "test-utils"))]
pub struct ManualClock {
    now_ms: std::sync::atomic::AtomicI64,
}

#[cfg(any(test, feature = "test-utils"))]
impl ManualClock {
    /// Create a clock frozen at the given instant.
    #[must_use]
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now_ms: std::sync::atomic::AtomicI64::new(start.timestamp_millis()),
        }
    }

    /// Create a clock frozen at the given epoch-millisecond timestamp.
    #[must_use]
    pub fn at_ms(start_ms: i64) -> Self {
        Self {
            now_ms: std::sync::atomic::AtomicI64::new(start_ms),
        }
    }

    /// Advance the clock by a duration.
    pub fn advance(&self, delta: chrono::Duration) {
        self.now_ms.fetch_add(
            delta.num_milliseconds(),
            std::sync::atomic::Ordering::SeqCst,
        );
    }

    /// Jump the clock to an absolute epoch-millisecond timestamp.
    pub fn set_ms(&self, now_ms: i64) {
        self.now_ms
            .store(now_ms, std::sync::atomic::Ordering::SeqCst);
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl Clock for ManualClock {
    fn now_utc(&self) -> DateTime<Utc> {
        let ms = self.now_ms.load(std::sync::atomic::Ordering::SeqCst);
        DateTime::<Utc>::from_timestamp_millis(ms).unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }

    fn now_ms(&self) -> i64 {
        self.now_ms.load(std::sync::atomic::Ordering::SeqCst)
    }
}
