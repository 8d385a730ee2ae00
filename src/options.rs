//! Run options configuration.
//!
//! [`RunOptions`] carries the per-invocation switches: dry run, step
//! filters, timeouts and the retry policy for idempotent fetches.

use crate::config::ProvisionConfig;
use crate::invoke::RetryPolicy;
use std::time::Duration;

/// Configuration options for a provisioning run.
///
/// # Example
///
/// ```rust
/// use workstation_provision::RunOptions;
///
/// let opts = RunOptions {
///     skip: vec!["spotify".to_string()],
///     ..Default::default()
/// };
/// assert!(opts.selects("nvm"));
/// assert!(!opts.selects("spotify"));
/// ```
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Evaluate guards and report what would run, without side effects.
    pub dry_run: bool,

    /// Steps to leave out of this run.
    pub skip: Vec<String>,

    /// When non-empty, run only these steps.
    pub only: Vec<String>,

    /// Maximum time for a guard probe or version query.
    ///
    /// Default: 5 seconds
    pub probe_timeout: Duration,

    /// Maximum time for a single install command.
    ///
    /// Default: 30 minutes
    pub command_timeout: Duration,

    /// Retry policy for idempotent network fetches.
    pub retry: RetryPolicy,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            skip: Vec::new(),
            only: Vec::new(),
            probe_timeout: Duration::from_secs(5),
            command_timeout: Duration::from_secs(1800),
            retry: RetryPolicy::default(),
        }
    }
}

impl RunOptions {
    /// Timeouts and retry policy taken from the configuration file.
    pub fn from_config(config: &ProvisionConfig) -> Self {
        Self {
            probe_timeout: Duration::from_secs(config.timeouts.probe_secs),
            command_timeout: Duration::from_secs(config.timeouts.command_secs),
            retry: RetryPolicy {
                attempts: config.network.retries.saturating_add(1),
                backoff: Duration::from_millis(config.network.retry_backoff_ms),
            },
            ..Default::default()
        }
    }

    /// Whether the step filters select this step.
    pub fn selects(&self, step: &str) -> bool {
        if !self.only.is_empty() {
            return self.only.iter().any(|s| s == step);
        }
        !self.skip.iter().any(|s| s == step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opts = RunOptions::default();
        assert!(!opts.dry_run);
        assert_eq!(opts.probe_timeout, Duration::from_secs(5));
        assert_eq!(opts.command_timeout, Duration::from_secs(1800));
        assert_eq!(opts.retry.attempts, 4);
    }

    #[test]
    fn test_only_filter() {
        let opts = RunOptions {
            only: vec!["rustup".to_string(), "nvm".to_string()],
            ..Default::default()
        };
        assert!(opts.selects("rustup"));
        assert!(!opts.selects("sdkman"));
    }

    #[test]
    fn test_no_filter_selects_everything() {
        assert!(RunOptions::default().selects("anything"));
    }

    #[test]
    fn test_from_config() {
        let mut config = ProvisionConfig::default();
        config.timeouts.probe_secs = 1;
        config.network.retries = 7;
        config.network.retry_backoff_ms = 10;
        let opts = RunOptions::from_config(&config);
        assert_eq!(opts.probe_timeout, Duration::from_secs(1));
        assert_eq!(opts.retry.attempts, 8);
        assert_eq!(opts.retry.backoff, Duration::from_millis(10));
    }

    #[test]
    fn test_retries_count_after_first_attempt() {
        let opts = RunOptions::from_config(&ProvisionConfig::default());
        assert_eq!(opts.retry, RetryPolicy::default());

        let mut config = ProvisionConfig::default();
        config.network.retries = 0;
        assert_eq!(RunOptions::from_config(&config).retry.attempts, 1);
    }
}
