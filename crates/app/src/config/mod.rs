//! Application configuration
//!
//! Grouped `clap` argument structs, each readable from the environment, flattened into
//! the CLI commands that need them.

use clap::Args;
use thiserror::Error;

pub mod catalog;
pub mod db;
pub mod gemini;
pub mod jobs;
pub mod logging;
pub mod telegram;

pub use catalog::CatalogConfig;
pub use db::DatabaseConfig;
pub use gemini::GeminiArgs;
pub use jobs::JobsConfig;
pub use logging::{LogFormat, LoggingConfig};
pub use telegram::TelegramArgs;

/// Settings that do not make sense together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("generation lock lease ({lease}s) must be longer than the generation timeout ({timeout}s)")]
    LeaseTooShort { lease: u64, timeout: u64 },

    #[error("at least one admin user id is required")]
    NoAdmins,

    #[error("job retry policy needs at least one attempt and one backoff delay")]
    EmptyRetryPolicy,
}

/// Everything needed to run the catalog services.
#[derive(Debug, Args)]
pub struct AppConfig {
    /// Application database settings.
    #[command(flatten)]
    pub database: DatabaseConfig,

    /// Catalog and operator settings.
    #[command(flatten)]
    pub catalog: CatalogConfig,

    /// Telegram Bot API settings.
    #[command(flatten)]
    pub telegram: TelegramArgs,

    /// Gemini image generation settings.
    #[command(flatten)]
    pub gemini: GeminiArgs,

    /// Generation job settings.
    #[command(flatten)]
    pub jobs: JobsConfig,
}

impl AppConfig {
    /// Check cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns the first constraint that does not hold.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.catalog.admin_user_ids.is_empty() {
            return Err(ConfigError::NoAdmins);
        }

        self.jobs.validate()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use clap::Parser;
    use testresult::TestResult;

    use super::*;

    #[derive(Debug, Parser)]
    struct Harness {
        #[command(flatten)]
        config: AppConfig,
    }

    const REQUIRED: [&str; 9] = [
        "boutique",
        "--database-url",
        "postgres://localhost/boutique",
        "--admin-user-ids",
        "11,22",
        "--telegram-bot-token",
        "123:abc",
        "--gemini-api-key",
        "key",
    ];

    #[test]
    fn defaults_fill_everything_but_secrets() -> TestResult {
        let Harness { config } = Harness::try_parse_from(REQUIRED)?;

        assert_eq!(config.catalog.admin_user_ids, vec![11, 22]);
        assert_eq!(config.jobs.max_attempts, 3);
        assert_eq!(config.jobs.backoff_seconds, vec![30, 120, 300]);
        assert_eq!(config.validate(), Ok(()));

        Ok(())
    }

    #[test]
    fn scheduler_hides_claims_for_the_lease_and_waits_out_held_locks() -> TestResult {
        let args = REQUIRED
            .into_iter()
            .chain(["--generation-lock-retry-seconds", "5"]);

        let Harness { config } = Harness::try_parse_from(args)?;
        let scheduler = config.jobs.scheduler();

        assert_eq!(scheduler.claim_visibility, Duration::from_secs(600));
        assert_eq!(scheduler.lock_retry_delay, Duration::from_secs(5));

        Ok(())
    }

    #[test]
    fn lease_must_outlive_the_generation_timeout() -> TestResult {
        let args = REQUIRED.into_iter().chain([
            "--generation-lock-lease-seconds",
            "60",
            "--generation-timeout-seconds",
            "60",
        ]);

        let Harness { config } = Harness::try_parse_from(args)?;

        assert_eq!(
            config.validate(),
            Err(ConfigError::LeaseTooShort {
                lease: 60,
                timeout: 60
            })
        );

        Ok(())
    }
}
