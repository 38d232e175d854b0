use std::env;
use std::time::Duration;

/// Runtime tuning for resolution and replay. All fields can be overridden
/// through `RETRACE_*` environment variables.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Minimum combined score a fuzzy match must reach.
    pub min_confidence: f64,
    /// Attempts per step before it fails terminally.
    pub max_attempts: u32,
    /// Delay between retry attempts.
    pub retry_backoff: Duration,
    /// Budget for one resolve pass (snapshot + mapping + lookup).
    pub resolve_timeout: Duration,
    /// Budget for the post-interaction verification check.
    pub verify_timeout: Duration,
    /// Pause between consecutive steps.
    pub step_delay: Duration,
    /// Keep executing remaining steps after a terminal step failure.
    pub continue_on_error: bool,
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            min_confidence: env_parse("RETRACE_MIN_CONFIDENCE", defaults.min_confidence),
            max_attempts: env_parse("RETRACE_MAX_ATTEMPTS", defaults.max_attempts),
            retry_backoff: env_millis("RETRACE_RETRY_BACKOFF_MS", defaults.retry_backoff),
            resolve_timeout: env_millis("RETRACE_RESOLVE_TIMEOUT_MS", defaults.resolve_timeout),
            verify_timeout: env_millis("RETRACE_VERIFY_TIMEOUT_MS", defaults.verify_timeout),
            step_delay: env_millis("RETRACE_STEP_DELAY_MS", defaults.step_delay),
            continue_on_error: env_parse("RETRACE_CONTINUE_ON_ERROR", defaults.continue_on_error),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.3,
            max_attempts: 3,
            retry_backoff: Duration::from_millis(500),
            resolve_timeout: Duration::from_secs(5),
            verify_timeout: Duration::from_secs(5),
            step_delay: Duration::from_millis(100),
            continue_on_error: false,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_millis(key: &str, default: Duration) -> Duration {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Duration::from_millis)
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = EngineConfig::default();
        assert!(config.min_confidence > 0.0 && config.min_confidence < 1.0);
        assert!(config.max_attempts >= 1);
        assert!(!config.continue_on_error);
    }
}
