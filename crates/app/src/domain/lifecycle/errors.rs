//! Lifecycle errors.

use thiserror::Error;

use crate::{domain::catalog::CatalogError, jobs::QueueError, storage::StoreError};

/// Infrastructure failures. Invalid requests are [`super::Decision::Rejected`] instead.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("catalog error")]
    Catalog(#[from] CatalogError),

    #[error("image store error")]
    Store(#[from] StoreError),

    #[error("failed to queue generation")]
    Queue(#[from] QueueError),
}
