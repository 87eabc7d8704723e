//! Generation Lock
//!
//! A lease per image id: acquiring never blocks, and an expired lease can be taken
//! over, so a crashed worker holds an image for at most one lease.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use mockall::automock;
use sqlx::{query, query_scalar};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{database::Db, domain::catalog::records::ImageUuid};

const ACQUIRE_LOCK_SQL: &str = include_str!("sql/acquire_lock.sql");
const RELEASE_LOCK_SQL: &str = include_str!("sql/release_lock.sql");

/// Proof of holding a lease; only the holder's token releases it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaseToken(Uuid);

impl LeaseToken {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for LeaseToken {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Error)]
pub enum LockError {
    #[error("storage error")]
    Sql(#[from] sqlx::Error),
}

#[automock]
#[async_trait]
pub trait GenerationLock: Send + Sync {
    /// Take the lease for `image` unless someone else holds an unexpired one.
    async fn try_acquire(
        &self,
        image: ImageUuid,
        lease: Duration,
    ) -> Result<Option<LeaseToken>, LockError>;

    /// Release a lease. Returns `false` when the lease had already been taken over.
    async fn release(&self, image: ImageUuid, token: LeaseToken) -> Result<bool, LockError>;
}

/// A held lease that is released on [`LeaseGuard::release`] or, failing that, on drop.
pub struct LeaseGuard {
    lock: Arc<dyn GenerationLock>,
    image: ImageUuid,
    token: Option<LeaseToken>,
}

impl LeaseGuard {
    #[must_use]
    pub fn new(lock: Arc<dyn GenerationLock>, image: ImageUuid, token: LeaseToken) -> Self {
        Self {
            lock,
            image,
            token: Some(token),
        }
    }

    /// Release the lease now.
    pub async fn release(mut self) {
        if let Some(token) = self.token.take() {
            release_logged(self.lock.as_ref(), self.image, token).await;
        }
    }
}

impl Drop for LeaseGuard {
    fn drop(&mut self) {
        let Some(token) = self.token.take() else {
            return;
        };

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(image = %self.image, "no runtime to release lease, it will expire");
            return;
        };

        let lock = Arc::clone(&self.lock);
        let image = self.image;

        runtime.spawn(async move { release_logged(lock.as_ref(), image, token).await });
    }
}

async fn release_logged(lock: &dyn GenerationLock, image: ImageUuid, token: LeaseToken) {
    match lock.release(image, token).await {
        Ok(true) => debug!(%image, "released generation lease"),
        Ok(false) => warn!(%image, "generation lease was taken over before release"),
        Err(error) => warn!(%image, %error, "failed to release generation lease"),
    }
}

/// [`GenerationLock`] over the `generation_locks` table.
#[derive(Debug, Clone)]
pub struct PgGenerationLock {
    db: Db,
}

impl PgGenerationLock {
    #[must_use]
    pub fn new(db: Db) -> Self {
        Self { db }
    }
}

#[async_trait]
impl GenerationLock for PgGenerationLock {
    #[tracing::instrument(name = "jobs.lock.try_acquire", skip(self), err)]
    async fn try_acquire(
        &self,
        image: ImageUuid,
        lease: Duration,
    ) -> Result<Option<LeaseToken>, LockError> {
        let token = LeaseToken::new();

        let acquired = query_scalar::<_, Uuid>(ACQUIRE_LOCK_SQL)
            .bind(image.into_uuid())
            .bind(token.0)
            .bind(lease.as_secs_f64())
            .fetch_optional(self.db.pool())
            .await?;

        Ok(acquired.map(LeaseToken))
    }

    #[tracing::instrument(name = "jobs.lock.release", skip(self, token), err)]
    async fn release(&self, image: ImageUuid, token: LeaseToken) -> Result<bool, LockError> {
        let released = query(RELEASE_LOCK_SQL)
            .bind(image.into_uuid())
            .bind(token.0)
            .execute(self.db.pool())
            .await?
            .rows_affected();

        Ok(released == 1)
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use crate::test::TestContext;

    use super::*;

    #[tokio::test]
    async fn dropping_a_guard_releases_the_lease() {
        let image = ImageUuid::new();
        let token = LeaseToken::new();
        let (released_tx, released_rx) = tokio::sync::oneshot::channel();
        let mut released_tx = Some(released_tx);

        let mut lock = MockGenerationLock::new();

        lock.expect_release()
            .withf(move |held, held_token| *held == image && *held_token == token)
            .times(1)
            .returning(move |_, _| {
                if let Some(sender) = released_tx.take() {
                    let _sent = sender.send(());
                }

                Ok(true)
            });

        drop(LeaseGuard::new(Arc::new(lock), image, token));

        assert!(released_rx.await.is_ok());
    }

    #[tokio::test]
    async fn explicit_release_happens_once() {
        let mut lock = MockGenerationLock::new();

        lock.expect_release().times(1).returning(|_, _| Ok(true));

        LeaseGuard::new(Arc::new(lock), ImageUuid::new(), LeaseToken::new())
            .release()
            .await;
    }

    #[tokio::test]
    async fn second_acquire_is_refused_until_release() -> TestResult {
        let ctx = TestContext::new().await;
        let image = ImageUuid::new();
        let lease = Duration::from_secs(600);

        let token = ctx.lock.try_acquire(image, lease).await?;

        assert!(token.is_some());
        assert!(ctx.lock.try_acquire(image, lease).await?.is_none());

        if let Some(token) = token {
            assert!(ctx.lock.release(image, token).await?);
        }

        assert!(ctx.lock.try_acquire(image, lease).await?.is_some());

        Ok(())
    }

    #[tokio::test]
    async fn expired_leases_can_be_taken_over() -> TestResult {
        let ctx = TestContext::new().await;
        let image = ImageUuid::new();

        let stale = ctx.lock.try_acquire(image, Duration::ZERO).await?;
        let fresh = ctx.lock.try_acquire(image, Duration::from_secs(600)).await?;

        assert!(fresh.is_some());
        assert_ne!(stale, fresh);

        if let Some(stale) = stale {
            assert!(!ctx.lock.release(image, stale).await?);
        }

        Ok(())
    }

    #[tokio::test]
    async fn different_images_lock_independently() -> TestResult {
        let ctx = TestContext::new().await;
        let lease = Duration::from_secs(600);

        assert!(ctx.lock.try_acquire(ImageUuid::new(), lease).await?.is_some());
        assert!(ctx.lock.try_acquire(ImageUuid::new(), lease).await?.is_some());

        Ok(())
    }
}
