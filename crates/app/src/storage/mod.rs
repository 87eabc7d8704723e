//! Image Store
//!
//! Raw image bytes addressed by storage key. Catalog rows only ever hold the key.

use async_trait::async_trait;
use mockall::automock;
use thiserror::Error;

use crate::domain::catalog::records::ImageUuid;

mod postgres;

pub use postgres::PgImageStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no object stored under {0}")]
    NotFound(String),

    #[error("storage error")]
    Sql(#[from] sqlx::Error),
}

#[automock]
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Store `bytes` under `key`, replacing any previous object.
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), StoreError>;

    /// Fetch the object stored under `key`.
    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError>;

    /// Delete one object. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Delete several objects, returning how many existed.
    async fn delete_many(&self, keys: &[String]) -> Result<u64, StoreError>;
}

/// Public URL an image is served from.
#[must_use]
pub fn public_url(base: &str, image: ImageUuid) -> String {
    format!("{}/img/{image}", base.trim_end_matches('/'))
}
