//! Configuration for the query cache.

use std::time::Duration;

use educamais_config::CacheSettings;

/// Default time a successful result stays fresh.
pub const DEFAULT_STALE_TIME: Duration = Duration::from_secs(5 * 60);

/// Default number of retries after a failed attempt.
pub const DEFAULT_RETRY: u32 = 2;

/// Default base delay between retries.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Default maximum number of cached keys.
pub const DEFAULT_MAX_ENTRIES: usize = 1000;

/// Configuration for a [`QueryCache`](crate::QueryCache).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryConfig {
    /// How long a fetched value is served without refetching.
    pub stale_time: Duration,

    /// Retries after the first failed attempt, for retryable errors only.
    pub retry: u32,

    /// Delay before the first retry; doubled for each further retry.
    pub retry_delay: Duration,

    /// Maximum number of keys kept before LRU eviction.
    pub max_entries: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            stale_time: DEFAULT_STALE_TIME,
            retry: DEFAULT_RETRY,
            retry_delay: DEFAULT_RETRY_DELAY,
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}

impl QueryConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = stale_time;
        self
    }

    pub fn with_retry(mut self, retry: u32) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_max_entries(mut self, max: usize) -> Self {
        self.max_entries = max;
        self
    }

    /// Delay before retry number `attempt` (zero-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.retry_delay
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}

impl From<&CacheSettings> for QueryConfig {
    fn from(settings: &CacheSettings) -> Self {
        Self {
            stale_time: settings.stale_time(),
            retry: settings.retry,
            retry_delay: settings.retry_delay(),
            max_entries: settings.max_entries,
        }
    }
}
