//! Worker pool configuration and cell-failure policy.

use std::time::Duration;

use blockwork_core::ConfigError;

// ── PoolConfig ─────────────────────────────────────────────────────

/// Configuration for [`WorkerPool`](crate::pool::WorkerPool).
#[derive(Clone, Debug)]
pub struct PoolConfig {
    /// Number of worker threads. `None` = auto-detect
    /// (`available_parallelism / 2`, clamped to `[1, 16]`).
    pub workers: Option<usize>,
    /// Code run once in every fresh context, after the engine prelude.
    pub init: Option<String>,
    /// How long an idle worker blocks on the queue before re-checking the
    /// shutdown flag. Default: 10 ms.
    pub poll_interval: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: None,
            init: None,
            poll_interval: Duration::from_millis(10),
        }
    }
}

impl PoolConfig {
    /// `workers` explicit workers and defaults otherwise.
    pub fn with_workers(workers: usize) -> Self {
        Self {
            workers: Some(workers),
            ..Self::default()
        }
    }

    /// Set the init script.
    pub fn init(mut self, code: impl Into<String>) -> Self {
        self.init = Some(code.into());
        self
    }

    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == Some(0) {
            return Err(ConfigError::ZeroWorkers);
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError::InvalidPollInterval);
        }
        Ok(())
    }

    /// Resolve the actual worker count, applying auto-detection if `None`.
    pub fn resolved_worker_count(&self) -> usize {
        match self.workers {
            Some(n) => n.max(1),
            None => {
                let cpus = std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(2);
                (cpus / 2).clamp(1, 16)
            }
        }
    }
}

// ── FailurePolicy ──────────────────────────────────────────────────

/// What [`CacheLoader`](crate::loader::CacheLoader) does when a cell's task
/// fails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Log the failure and return the cell marked invalid.
    #[default]
    MarkInvalid,
    /// Return the failure to the caller.
    Propagate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let config = PoolConfig::default();
        assert!(config.validate().is_ok());
        let n = config.resolved_worker_count();
        assert!((1..=16).contains(&n));
    }

    #[test]
    fn zero_workers_rejected() {
        assert_eq!(
            PoolConfig::with_workers(0).validate(),
            Err(ConfigError::ZeroWorkers)
        );
    }

    #[test]
    fn zero_poll_interval_rejected() {
        let config = PoolConfig {
            poll_interval: Duration::ZERO,
            ..PoolConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::InvalidPollInterval));
    }

    #[test]
    fn explicit_count_is_used() {
        assert_eq!(PoolConfig::with_workers(3).resolved_worker_count(), 3);
    }
}
