//! Settings errors.

use boutique::pricing::FxRateError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("invalid stored exchange rate")]
    InvalidRate(#[from] FxRateError),

    #[error("failed to encode setting")]
    Encode(#[from] serde_json::Error),

    #[error("storage error")]
    Sql(#[from] sqlx::Error),
}
