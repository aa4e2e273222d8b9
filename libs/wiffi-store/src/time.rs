//! Time provider abstraction for point state timestamps
//!
//! Keeps clock access out of the store so tests can pin timestamps.

/// Time provider trait for generating timestamps
pub trait TimeProvider: Send + Sync + 'static {
    /// Get current timestamp in milliseconds since Unix epoch
    fn now_millis(&self) -> i64;
}

/// System time provider using the local clock
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Fixed time provider for testing
///
/// Returns a predetermined timestamp, useful for deterministic tests.
#[derive(Clone, Copy, Debug)]
pub struct FixedTimeProvider {
    timestamp_ms: i64,
}

impl FixedTimeProvider {
    /// Create a new fixed time provider with the given timestamp
    pub fn new(timestamp_ms: i64) -> Self {
        Self { timestamp_ms }
    }
}

impl TimeProvider for FixedTimeProvider {
    fn now_millis(&self) -> i64 {
        self.timestamp_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_time_provider_is_monotonic_enough() {
        let provider = SystemTimeProvider;
        let time1 = provider.now_millis();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let time2 = provider.now_millis();

        assert!(time1 > 1_600_000_000_000);
        assert!(time2 >= time1);
    }

    #[test]
    fn test_fixed_time_provider() {
        let provider = FixedTimeProvider::new(1_700_000_000_000);
        assert_eq!(provider.now_millis(), 1_700_000_000_000);
        assert_eq!(provider.now_millis(), 1_700_000_000_000);
    }
}
