//! Engine configuration.

use std::time::Duration;

/// Tunables for the sync engine.
///
/// Defaults are suitable for a handful of tenants against a rate-limited
/// remote API. All values can be overridden field by field.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Interval between scheduler scans for due tenants
    pub tick_interval: Duration,

    /// Maximum pending changes drained per outbound batch
    pub outbound_batch_size: u32,

    /// Push attempts before an outbound change is terminally failed
    pub max_outbound_attempts: i64,

    /// Whole-run attempts before a sync run is terminally failed
    pub max_run_attempts: u32,

    /// Base delay for run retry backoff (doubles per attempt)
    pub retry_base_delay: Duration,

    /// Upper bound on the run retry backoff delay
    pub retry_max_delay: Duration,

    /// Maximum wall-clock time a single step may take
    pub step_timeout: Duration,

    /// Buffer size of the sync request channel
    pub request_channel_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(60),
            outbound_batch_size: 50,
            max_outbound_attempts: 3,
            max_run_attempts: 3,
            retry_base_delay: Duration::from_millis(500),
            retry_max_delay: Duration::from_secs(30),
            step_timeout: Duration::from_secs(120),
            request_channel_capacity: 64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.outbound_batch_size, 50);
        assert_eq!(config.max_outbound_attempts, 3);
        assert_eq!(config.max_run_attempts, 3);
        assert_eq!(config.tick_interval, Duration::from_secs(60));
    }
}
