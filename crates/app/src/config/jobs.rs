//! Generation Job Config

use std::time::Duration;

use clap::Args;

use crate::{
    config::ConfigError,
    jobs::{RetryPolicy, SchedulerConfig, WorkerConfig},
};

/// Generation job settings.
#[derive(Debug, Args)]
pub struct JobsConfig {
    /// Concurrent generation workers
    #[arg(long, env = "JOB_WORKERS", default_value_t = 2)]
    pub workers: usize,

    /// Idle wait between polls of an empty queue, in milliseconds
    #[arg(long, env = "JOB_POLL_INTERVAL_MS", default_value_t = 1_000)]
    pub poll_interval_ms: u64,

    /// Lease on the per-image generation lock, in seconds
    #[arg(long, env = "GENERATION_LOCK_LEASE_SECONDS", default_value_t = 600)]
    pub generation_lock_lease_seconds: u64,

    /// Wait before re-running a job whose image lease is still held, in seconds
    #[arg(long, env = "GENERATION_LOCK_RETRY_SECONDS", default_value_t = 15)]
    pub generation_lock_retry_seconds: u64,

    /// Upper bound on one generator call, in seconds
    #[arg(long, env = "GENERATION_TIMEOUT_SECONDS", default_value_t = 120)]
    pub generation_timeout_seconds: u64,

    /// Total attempts per job
    #[arg(long, env = "JOB_MAX_ATTEMPTS", default_value_t = 3)]
    pub max_attempts: u32,

    /// Comma separated delays before each retry, in seconds; the last one repeats
    #[arg(
        long,
        env = "JOB_BACKOFF_SECONDS",
        value_delimiter = ',',
        default_value = "30,120,300"
    )]
    pub backoff_seconds: Vec<u64>,
}

impl JobsConfig {
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.generation_lock_lease_seconds <= self.generation_timeout_seconds {
            return Err(ConfigError::LeaseTooShort {
                lease: self.generation_lock_lease_seconds,
                timeout: self.generation_timeout_seconds,
            });
        }

        if self.max_attempts == 0 || self.backoff_seconds.is_empty() {
            return Err(ConfigError::EmptyRetryPolicy);
        }

        Ok(())
    }

    #[must_use]
    pub fn lock_lease(&self) -> Duration {
        Duration::from_secs(self.generation_lock_lease_seconds)
    }

    #[must_use]
    pub fn worker(&self, public_base_url: &str) -> WorkerConfig {
        WorkerConfig {
            lock_lease: self.lock_lease(),
            generation_timeout: Duration::from_secs(self.generation_timeout_seconds),
            public_base_url: public_base_url.to_string(),
        }
    }

    /// Claims stay hidden for as long as the lock lease. The lease is taken shortly
    /// after the claim, so a reclaimed job can still find it held; such a job is
    /// deferred without spending an attempt until the lease expires.
    #[must_use]
    pub fn scheduler(&self) -> SchedulerConfig {
        SchedulerConfig {
            workers: self.workers,
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            claim_visibility: self.lock_lease(),
            lock_retry_delay: Duration::from_secs(self.generation_lock_retry_seconds),
            policy: RetryPolicy {
                max_attempts: self.max_attempts,
                backoff: self
                    .backoff_seconds
                    .iter()
                    .copied()
                    .map(Duration::from_secs)
                    .collect(),
            },
        }
    }
}
