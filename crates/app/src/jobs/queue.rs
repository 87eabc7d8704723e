//! Job Queue
//!
//! Jobs are rows in `generation_jobs`. Claiming uses `FOR UPDATE SKIP LOCKED`, so any
//! number of workers can poll concurrently, and a `RUNNING` row whose claim has
//! expired is claimable again.

use std::time::Duration;

use async_trait::async_trait;
use jiff_sqlx::Timestamp as SqlxTimestamp;
use mockall::automock;
use sqlx::{FromRow, Postgres, Row, postgres::PgRow, query, query_as};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::{
    database::Db,
    domain::catalog::records::{ImageUuid, ProductUuid},
    jobs::records::{GenerationJob, JobState, JobUuid, NewJob},
};

const ENQUEUE_JOB_SQL: &str = include_str!("sql/enqueue_job.sql");
const CLAIM_JOB_SQL: &str = include_str!("sql/claim_job.sql");
const COMPLETE_JOB_SQL: &str = include_str!("sql/complete_job.sql");
const RETRY_JOB_SQL: &str = include_str!("sql/retry_job.sql");
const DEFER_JOB_SQL: &str = include_str!("sql/defer_job.sql");
const FAIL_JOB_SQL: &str = include_str!("sql/fail_job.sql");
const GET_JOB_SQL: &str = include_str!("sql/get_job.sql");

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("job version is out of range")]
    InvalidVersion,

    /// The job was no longer in a state this worker could move it from, typically
    /// because its claim expired and another worker took it.
    #[error("job {0} is no longer held by this worker")]
    LostClaim(JobUuid),

    #[error("storage error")]
    Sql(#[from] sqlx::Error),
}

#[automock]
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Queue a generation. Enqueueing the same image twice returns the existing job.
    async fn enqueue(&self, job: NewJob) -> Result<GenerationJob, QueueError>;

    /// Claim the next runnable job for `visibility`, counting the attempt.
    async fn claim(&self, visibility: Duration) -> Result<Option<GenerationJob>, QueueError>;

    /// Mark a running job as done.
    async fn complete(&self, job: JobUuid) -> Result<(), QueueError>;

    /// Put a running job back in the queue after `delay`.
    async fn retry(&self, job: JobUuid, delay: Duration, reason: &str) -> Result<(), QueueError>;

    /// Put a running job back in the queue after `delay` without counting its claim as
    /// an attempt.
    async fn defer(&self, job: JobUuid, delay: Duration) -> Result<(), QueueError>;

    /// Mark a job as permanently failed.
    async fn fail(&self, job: JobUuid, reason: &str) -> Result<(), QueueError>;

    /// Load a job.
    async fn find(&self, job: JobUuid) -> Result<Option<GenerationJob>, QueueError>;
}

#[derive(Debug, Clone)]
pub struct PgJobQueue {
    db: Db,
}

impl PgJobQueue {
    #[must_use]
    pub fn new(db: Db) -> Self {
        Self { db }
    }
}

#[async_trait]
impl JobQueue for PgJobQueue {
    #[tracing::instrument(
        name = "jobs.queue.enqueue",
        skip(self, job),
        fields(image = %job.image, version = job.version, job = tracing::field::Empty),
        err
    )]
    async fn enqueue(&self, job: NewJob) -> Result<GenerationJob, QueueError> {
        let version = i32::try_from(job.version).map_err(|_overflow| QueueError::InvalidVersion)?;

        let record = query_as::<Postgres, GenerationJob>(ENQUEUE_JOB_SQL)
            .bind(JobUuid::new().into_uuid())
            .bind(job.product.into_uuid())
            .bind(job.image.into_uuid())
            .bind(&job.source_storage_key)
            .bind(version)
            .fetch_one(self.db.pool())
            .await?;

        tracing::Span::current().record("job", tracing::field::display(record.uuid));

        debug!(state = %record.state, "enqueued generation job");

        Ok(record)
    }

    #[tracing::instrument(
        name = "jobs.queue.claim",
        skip(self),
        fields(job = tracing::field::Empty, attempts = tracing::field::Empty),
        err
    )]
    async fn claim(&self, visibility: Duration) -> Result<Option<GenerationJob>, QueueError> {
        let claimed = query_as::<Postgres, GenerationJob>(CLAIM_JOB_SQL)
            .bind(visibility.as_secs_f64())
            .fetch_optional(self.db.pool())
            .await?;

        if let Some(job) = &claimed {
            let span = tracing::Span::current();

            span.record("job", tracing::field::display(job.uuid));
            span.record("attempts", job.attempts);
        }

        Ok(claimed)
    }

    #[tracing::instrument(name = "jobs.queue.complete", skip(self), err)]
    async fn complete(&self, job: JobUuid) -> Result<(), QueueError> {
        let updated = query(COMPLETE_JOB_SQL)
            .bind(job.into_uuid())
            .execute(self.db.pool())
            .await?
            .rows_affected();

        held(job, updated)
    }

    #[tracing::instrument(name = "jobs.queue.retry", skip(self), err)]
    async fn retry(&self, job: JobUuid, delay: Duration, reason: &str) -> Result<(), QueueError> {
        let updated = query(RETRY_JOB_SQL)
            .bind(job.into_uuid())
            .bind(delay.as_secs_f64())
            .bind(reason)
            .execute(self.db.pool())
            .await?
            .rows_affected();

        held(job, updated)
    }

    #[tracing::instrument(name = "jobs.queue.defer", skip(self), err)]
    async fn defer(&self, job: JobUuid, delay: Duration) -> Result<(), QueueError> {
        let updated = query(DEFER_JOB_SQL)
            .bind(job.into_uuid())
            .bind(delay.as_secs_f64())
            .execute(self.db.pool())
            .await?
            .rows_affected();

        held(job, updated)
    }

    #[tracing::instrument(name = "jobs.queue.fail", skip(self), err)]
    async fn fail(&self, job: JobUuid, reason: &str) -> Result<(), QueueError> {
        let updated = query(FAIL_JOB_SQL)
            .bind(job.into_uuid())
            .bind(reason)
            .execute(self.db.pool())
            .await?
            .rows_affected();

        held(job, updated)
    }

    async fn find(&self, job: JobUuid) -> Result<Option<GenerationJob>, QueueError> {
        Ok(query_as::<Postgres, GenerationJob>(GET_JOB_SQL)
            .bind(job.into_uuid())
            .fetch_optional(self.db.pool())
            .await?)
    }
}

fn held(job: JobUuid, updated: u64) -> Result<(), QueueError> {
    if updated == 0 {
        return Err(QueueError::LostClaim(job));
    }

    Ok(())
}

fn decode_error(
    column: &str,
    source: impl std::error::Error + Send + Sync + 'static,
) -> sqlx::Error {
    sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(source),
    }
}

impl<'r> FromRow<'r, PgRow> for GenerationJob {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        let state = row
            .try_get::<String, _>("state")?
            .parse::<JobState>()
            .map_err(|e| decode_error("state", e))?;

        let version = u32::try_from(row.try_get::<i32, _>("version")?)
            .map_err(|e| decode_error("version", e))?;

        let attempts = u32::try_from(row.try_get::<i32, _>("attempts")?)
            .map_err(|e| decode_error("attempts", e))?;

        Ok(Self {
            uuid: JobUuid::from_uuid(row.try_get::<Uuid, _>("uuid")?),
            product_uuid: ProductUuid::from_uuid(row.try_get::<Uuid, _>("product_uuid")?),
            image_uuid: ImageUuid::from_uuid(row.try_get::<Uuid, _>("image_uuid")?),
            source_storage_key: row.try_get("source_storage_key")?,
            version,
            state,
            attempts,
            run_at: row.try_get::<SqlxTimestamp, _>("run_at")?.to_jiff(),
            claimed_until: row
                .try_get::<Option<SqlxTimestamp>, _>("claimed_until")?
                .map(SqlxTimestamp::to_jiff),
            last_error: row.try_get("last_error")?,
            created_at: row.try_get::<SqlxTimestamp, _>("created_at")?.to_jiff(),
            updated_at: row.try_get::<SqlxTimestamp, _>("updated_at")?.to_jiff(),
        })
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use crate::test::TestContext;

    use super::*;

    fn new_job() -> NewJob {
        let product = ProductUuid::new();

        NewJob {
            product,
            image: ImageUuid::new(),
            source_storage_key: format!("products/{product}/original/v1"),
            version: 1,
        }
    }

    #[tokio::test]
    async fn enqueue_is_idempotent_per_image() -> TestResult {
        let ctx = TestContext::new().await;
        let job = new_job();

        let first = ctx.queue.enqueue(job.clone()).await?;
        let second = ctx.queue.enqueue(job).await?;

        assert_eq!(first.uuid, second.uuid);
        assert_eq!(first.state, JobState::Queued);

        Ok(())
    }

    #[tokio::test]
    async fn claim_counts_attempts_and_hides_the_job() -> TestResult {
        let ctx = TestContext::new().await;
        let queued = ctx.queue.enqueue(new_job()).await?;

        let claimed = ctx.queue.claim(Duration::from_secs(60)).await?;

        assert_eq!(claimed.as_ref().map(|job| job.uuid), Some(queued.uuid));
        assert_eq!(claimed.as_ref().map(|job| job.attempts), Some(1));
        assert!(ctx.queue.claim(Duration::from_secs(60)).await?.is_none());

        Ok(())
    }

    #[tokio::test]
    async fn expired_claims_are_reclaimed() -> TestResult {
        let ctx = TestContext::new().await;
        let queued = ctx.queue.enqueue(new_job()).await?;

        ctx.queue.claim(Duration::ZERO).await?;

        let reclaimed = ctx.queue.claim(Duration::from_secs(60)).await?;

        assert_eq!(reclaimed.as_ref().map(|job| job.uuid), Some(queued.uuid));
        assert_eq!(reclaimed.map(|job| job.attempts), Some(2));

        Ok(())
    }

    #[tokio::test]
    async fn retried_jobs_wait_for_their_backoff() -> TestResult {
        let ctx = TestContext::new().await;
        let queued = ctx.queue.enqueue(new_job()).await?;

        ctx.queue.claim(Duration::from_secs(60)).await?;
        ctx.queue
            .retry(queued.uuid, Duration::from_secs(30), "timeout")
            .await?;

        assert!(ctx.queue.claim(Duration::from_secs(60)).await?.is_none());

        let stored = ctx.queue.find(queued.uuid).await?;

        assert_eq!(stored.as_ref().map(|job| job.state), Some(JobState::Queued));
        assert_eq!(
            stored.and_then(|job| job.last_error),
            Some("timeout".to_string())
        );

        Ok(())
    }

    #[tokio::test]
    async fn completed_and_failed_jobs_are_not_claimed() -> TestResult {
        let ctx = TestContext::new().await;
        let done = ctx.queue.enqueue(new_job()).await?;
        let failed = ctx.queue.enqueue(new_job()).await?;

        ctx.queue.claim(Duration::from_secs(60)).await?;
        ctx.queue.claim(Duration::from_secs(60)).await?;
        ctx.queue.complete(done.uuid).await?;
        ctx.queue.fail(failed.uuid, "terminal").await?;

        assert!(ctx.queue.claim(Duration::ZERO).await?.is_none());
        assert_eq!(
            ctx.queue.find(done.uuid).await?.map(|job| job.state),
            Some(JobState::Succeeded)
        );
        assert_eq!(
            ctx.queue.find(failed.uuid).await?.map(|job| job.state),
            Some(JobState::Failed)
        );

        Ok(())
    }

    #[tokio::test]
    async fn deferred_jobs_keep_their_attempt_count() -> TestResult {
        let ctx = TestContext::new().await;
        let queued = ctx.queue.enqueue(new_job()).await?;

        ctx.queue.claim(Duration::from_secs(60)).await?;
        ctx.queue.defer(queued.uuid, Duration::ZERO).await?;

        let reclaimed = ctx.queue.claim(Duration::from_secs(60)).await?;

        assert_eq!(reclaimed.as_ref().map(|job| job.uuid), Some(queued.uuid));
        assert_eq!(reclaimed.map(|job| job.attempts), Some(1));

        Ok(())
    }

    #[tokio::test]
    async fn settling_a_job_twice_reports_the_lost_claim() -> TestResult {
        let ctx = TestContext::new().await;
        let queued = ctx.queue.enqueue(new_job()).await?;

        ctx.queue.claim(Duration::from_secs(60)).await?;
        ctx.queue.complete(queued.uuid).await?;

        let again = ctx.queue.complete(queued.uuid).await;
        let retried = ctx
            .queue
            .retry(queued.uuid, Duration::from_secs(30), "timeout")
            .await;

        assert!(matches!(again, Err(QueueError::LostClaim(job)) if job == queued.uuid));
        assert!(matches!(retried, Err(QueueError::LostClaim(_))));

        Ok(())
    }
}
