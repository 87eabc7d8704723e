//! Generation Worker
//!
//! Runs one generation job end to end: idempotency checks, the per-image lease, the
//! generator call, persistence, and the operator preview. The scheduler decides what
//! happens to the job from the returned [`JobOutcome`].

use std::{fmt, sync::Arc, time::Duration};

use boutique::{
    images::{ImageStatus, sniff_format},
    pricing::FxRate,
    products::ProductStatus,
};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::{
    domain::{
        catalog::{
            CatalogError, CatalogService,
            records::{ImageRecord, ProductAggregate, ProductRef},
        },
        settings::SettingsService,
    },
    generator::ImageGenerator,
    jobs::{
        lock::{GenerationLock, LeaseGuard},
        records::GenerationJob,
    },
    messaging::{
        MessagingGateway,
        notifications::{
            approval_keyboard, fallback_keyboard, generation_failed_text, original_caption,
            preview_caption,
        },
    },
    storage::{ImageStore, StoreError, public_url},
};

/// Settings for a [`GenerationWorker`].
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Lease taken on the image while generating.
    pub lock_lease: Duration,

    /// Upper bound on a single generator call.
    pub generation_timeout: Duration,

    /// Base URL images are publicly served from.
    pub public_base_url: String,
}

/// Why a job finished without generating anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    AlreadyReady,
    AlreadyFailed,
    LockHeld,

    /// The image no longer exists, usually because its draft was discarded.
    Removed,

    /// The image was settled or removed while this attempt was generating.
    Superseded,
}

/// Result of one attempt, as seen by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed,
    Skipped(SkipReason),
    Retryable(String),
    Terminal(String),
}

impl fmt::Display for JobOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => f.write_str("completed"),
            Self::Skipped(reason) => write!(f, "skipped ({reason:?})"),
            Self::Retryable(reason) => write!(f, "retryable: {reason}"),
            Self::Terminal(reason) => write!(f, "terminal: {reason}"),
        }
    }
}

/// Preview buttons only act on drafts.
fn actionable(status: ProductStatus) -> bool {
    status == ProductStatus::Draft
}

fn settled(status: ImageStatus) -> Option<SkipReason> {
    match status {
        ImageStatus::Pending => None,
        ImageStatus::Ready => Some(SkipReason::AlreadyReady),
        ImageStatus::Failed => Some(SkipReason::AlreadyFailed),
    }
}

/// Generates the AI image for one queued job at a time.
pub struct GenerationWorker {
    catalog: Arc<dyn CatalogService>,
    images: Arc<dyn ImageStore>,
    generator: Arc<dyn ImageGenerator>,
    gateway: Arc<dyn MessagingGateway>,
    settings: Arc<dyn SettingsService>,
    lock: Arc<dyn GenerationLock>,
    config: WorkerConfig,
}

impl GenerationWorker {
    #[must_use]
    pub fn new(
        catalog: Arc<dyn CatalogService>,
        images: Arc<dyn ImageStore>,
        generator: Arc<dyn ImageGenerator>,
        gateway: Arc<dyn MessagingGateway>,
        settings: Arc<dyn SettingsService>,
        lock: Arc<dyn GenerationLock>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            catalog,
            images,
            generator,
            gateway,
            settings,
            lock,
            config,
        }
    }

    /// Run one attempt of `job`.
    ///
    /// Terminal failures mark the image `FAILED` and notify the operator before
    /// returning. If that bookkeeping itself fails the outcome is downgraded to
    /// retryable so it is attempted again.
    #[tracing::instrument(
        name = "jobs.worker.run",
        skip(self, job),
        fields(
            job = %job.uuid,
            image = %job.image_uuid,
            version = job.version,
            attempt = job.attempts,
        )
    )]
    pub async fn run(&self, job: &GenerationJob) -> JobOutcome {
        let outcome = self.attempt(job).await;

        match &outcome {
            JobOutcome::Completed => info!("generated image"),
            JobOutcome::Skipped(reason) => info!(?reason, "skipped generation"),
            JobOutcome::Retryable(reason) => warn!(%reason, "generation attempt failed"),
            JobOutcome::Terminal(reason) => {
                error!(%reason, "generation failed permanently");

                if let Err(source) = self.exhaust(job, reason).await {
                    return JobOutcome::Retryable(format!(
                        "failed to record terminal failure: {source}"
                    ));
                }
            }
        }

        outcome
    }

    /// Give up on `job`: mark its image `FAILED` (if still `PENDING`) and offer the
    /// operator the fallback options.
    ///
    /// # Errors
    ///
    /// Returns an error when the image status cannot be written. Notification
    /// failures are only logged.
    pub async fn exhaust(&self, job: &GenerationJob, reason: &str) -> Result<(), CatalogError> {
        let failed = self
            .catalog
            .fail_image(job.image_uuid, reason.to_string())
            .await?;

        if failed.is_none() {
            debug!(image = %job.image_uuid, "image already settled, not notifying");

            return Ok(());
        }

        self.notify_failure(job, reason).await;

        Ok(())
    }

    async fn attempt(&self, job: &GenerationJob) -> JobOutcome {
        match self.catalog.find_image(job.image_uuid).await {
            Err(source) => return JobOutcome::Retryable(format!("failed to load image: {source}")),
            Ok(None) => return JobOutcome::Skipped(SkipReason::Removed),
            Ok(Some(image)) => {
                if let Some(reason) = settled(image.status) {
                    return JobOutcome::Skipped(reason);
                }
            }
        }

        let token = match self
            .lock
            .try_acquire(job.image_uuid, self.config.lock_lease)
            .await
        {
            Err(source) => return JobOutcome::Retryable(format!("failed to take lease: {source}")),
            Ok(None) => return JobOutcome::Skipped(SkipReason::LockHeld),
            Ok(Some(token)) => token,
        };

        let guard = LeaseGuard::new(Arc::clone(&self.lock), job.image_uuid, token);
        let outcome = self.generate_locked(job).await;

        guard.release().await;

        outcome
    }

    async fn generate_locked(&self, job: &GenerationJob) -> JobOutcome {
        let image = match self.catalog.find_image(job.image_uuid).await {
            Err(source) => return JobOutcome::Retryable(format!("failed to load image: {source}")),
            Ok(None) => return JobOutcome::Skipped(SkipReason::Removed),
            Ok(Some(image)) => image,
        };

        if let Some(reason) = settled(image.status) {
            return JobOutcome::Skipped(reason);
        }

        let product = match self
            .catalog
            .find_product(ProductRef::Uuid(job.product_uuid))
            .await
        {
            Err(source) => {
                return JobOutcome::Retryable(format!("failed to load product: {source}"));
            }
            Ok(None) => return JobOutcome::Terminal("product not found".to_string()),
            Ok(Some(product)) => product,
        };

        let source = match self.images.get(&job.source_storage_key).await {
            Err(StoreError::NotFound(key)) => {
                return JobOutcome::Terminal(format!("original image bytes missing at {key}"));
            }
            Err(source) => {
                return JobOutcome::Retryable(format!("failed to read original: {source}"));
            }
            Ok(bytes) => bytes,
        };

        let generated = match timeout(
            self.config.generation_timeout,
            self.generator.generate(source),
        )
        .await
        {
            Err(_elapsed) => {
                return JobOutcome::Retryable(format!(
                    "generation timed out after {}s",
                    self.config.generation_timeout.as_secs()
                ));
            }
            Ok(Err(source)) => return JobOutcome::Retryable(source.to_string()),
            Ok(Ok(bytes)) => bytes,
        };

        if sniff_format(&generated).is_none() {
            return JobOutcome::Retryable("generator returned bytes that are not an image".into());
        }

        if let Err(source) = self.images.put(&image.storage_key, generated).await {
            return JobOutcome::Retryable(format!("failed to store generated image: {source}"));
        }

        let url = public_url(&self.config.public_base_url, image.uuid);

        let ready = match self.catalog.complete_image(image.uuid, url).await {
            Err(source) => {
                return JobOutcome::Retryable(format!("failed to mark image ready: {source}"));
            }
            Ok(None) => {
                // nothing will ever point at these bytes
                if let Err(error) = self.images.delete(&image.storage_key).await {
                    warn!(%error, key = %image.storage_key, "failed to purge superseded image");
                }

                return JobOutcome::Skipped(SkipReason::Superseded);
            }
            Ok(Some(ready)) => ready,
        };

        self.send_preview(&product, &ready).await;

        JobOutcome::Completed
    }

    async fn send_preview(&self, aggregate: &ProductAggregate, ready: &ImageRecord) {
        let product = &aggregate.product;

        let Some(conversation) = product.conversation else {
            debug!(product = %product.uuid, "no conversation to preview in");

            return;
        };

        if let Some(original) = aggregate.original_image() {
            let url = self.image_url(original);

            if let Err(error) = self
                .gateway
                .send_photo(conversation, &url, Some(original_caption(product.code)), None)
                .await
            {
                warn!(%error, "failed to send original photo");
            }
        }

        let rate = self.settings.fx_rate().await.unwrap_or_else(|error| {
            warn!(%error, "failed to load fx rate, using default");

            FxRate::default()
        });

        // approved or published from the original while this job was queued
        let keyboard = actionable(product.status).then(|| approval_keyboard(product.uuid));

        let sent = self
            .gateway
            .send_photo(
                conversation,
                &self.image_url(ready),
                Some(preview_caption(product, ready.version, rate)),
                keyboard,
            )
            .await;

        match sent {
            Ok(message) => {
                if let Err(error) = self
                    .catalog
                    .record_preview_message(product.uuid, message)
                    .await
                {
                    warn!(%error, "failed to record preview message");
                }
            }
            Err(error) => warn!(%error, "failed to send preview"),
        }
    }

    async fn notify_failure(&self, job: &GenerationJob, reason: &str) {
        let product = match self
            .catalog
            .find_product(ProductRef::Uuid(job.product_uuid))
            .await
        {
            Ok(Some(aggregate)) => aggregate.product,
            Ok(None) => return,
            Err(error) => {
                warn!(%error, "failed to load product for failure notice");

                return;
            }
        };

        let Some(conversation) = product.conversation else {
            return;
        };

        if let Err(error) = self
            .gateway
            .send_text(
                conversation,
                &generation_failed_text(product.code, reason),
                actionable(product.status).then(|| fallback_keyboard(product.uuid)),
            )
            .await
        {
            warn!(%error, "failed to send failure notice");
        }
    }

    fn image_url(&self, image: &ImageRecord) -> String {
        image
            .url
            .clone()
            .unwrap_or_else(|| public_url(&self.config.public_base_url, image.uuid))
    }
}
