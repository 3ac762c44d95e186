//! Client configuration
//!
//! Connection settings for the job server and the policy for re-opening
//! an interrupted event stream.

use std::time::Duration;

/// Client configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Job server base URL (e.g., "http://localhost:8000")
    pub api_url: String,

    /// Timeout applied to each request/response call
    pub request_timeout: Duration,

    /// What to do when the event stream drops before the job ends
    pub reconnect: ReconnectPolicy,
}

impl Config {
    /// Creates a new configuration with defaults
    pub fn new(api_url: String) -> Self {
        Self {
            api_url,
            request_timeout: Duration::from_secs(60),
            reconnect: ReconnectPolicy::default(),
        }
    }

    /// Applies the optional tuning variables from the environment
    ///
    /// - JOBWATCH_REQUEST_TIMEOUT (seconds, default: 60)
    /// - JOBWATCH_RECONNECT_ATTEMPTS (default: 3)
    ///
    /// Unset or unparsable values keep the current setting.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(timeout) = std::env::var("JOBWATCH_REQUEST_TIMEOUT")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
        {
            self.request_timeout = Duration::from_secs(timeout);
        }

        if let Some(attempts) = std::env::var("JOBWATCH_RECONNECT_ATTEMPTS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
        {
            self.reconnect.max_attempts = attempts;
        }

        self
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_url.is_empty() {
            anyhow::bail!("api_url cannot be empty");
        }

        if !self.api_url.starts_with("http://") && !self.api_url.starts_with("https://") {
            anyhow::bail!("api_url must start with http:// or https://");
        }

        if self.request_timeout.is_zero() {
            anyhow::bail!("request_timeout must be greater than 0");
        }

        if self.reconnect.initial_delay > self.reconnect.max_delay {
            anyhow::bail!("reconnect initial_delay cannot exceed max_delay");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new("http://localhost:8000".to_string())
    }
}

/// Bounded re-open policy for an interrupted event stream
///
/// The stream client never reconnects on its own; the tracker consults
/// this policy after each transport error. `max_attempts = 0` only records
/// the advisory notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Consecutive re-open attempts allowed without a decoded event in between
    pub max_attempts: u32,
    /// Delay before the first re-open
    pub initial_delay: Duration,
    /// Cap for the doubling delay
    pub max_delay: Duration,
}

impl ReconnectPolicy {
    pub fn disabled() -> Self {
        Self {
            max_attempts: 0,
            ..Self::default()
        }
    }

    /// Delay before re-open attempt `attempt` (1-based), or `None` when exhausted
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.max_attempts {
            return None;
        }
        let factor = 2u32.saturating_pow(attempt - 1);
        Some(self.initial_delay.saturating_mul(factor).min(self.max_delay))
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(5),
        }
    }
}
