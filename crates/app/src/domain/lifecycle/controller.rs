//! Lifecycle Controller

use std::sync::Arc;

use async_trait::async_trait;
use boutique::{
    images::{original_storage_key, sniff_format},
    products::{Price, Transition},
};
use mockall::automock;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::{
    domain::{
        audit::records::ActorId,
        catalog::{
            CatalogService,
            data::{NewDraft, PriceChange, StatusChange},
            records::{ImageUuid, ProductRecord, ProductRef, ProductUuid},
        },
        lifecycle::{
            data::{Discarded, DraftSubmission, PriceEdited, Regenerated, SubmittedDraft},
            decision::{Decision, Rejection},
            errors::LifecycleError,
        },
    },
    jobs::{GenerationJob, JobQueue, NewJob},
    storage::{ImageStore, public_url},
};

#[derive(Clone)]
pub struct LifecycleController {
    catalog: Arc<dyn CatalogService>,
    images: Arc<dyn ImageStore>,
    queue: Arc<dyn JobQueue>,
    public_base_url: String,
}

impl LifecycleController {
    #[must_use]
    pub fn new(
        catalog: Arc<dyn CatalogService>,
        images: Arc<dyn ImageStore>,
        queue: Arc<dyn JobQueue>,
        public_base_url: String,
    ) -> Self {
        Self {
            catalog,
            images,
            queue,
            public_base_url,
        }
    }

    async fn resolve(&self, product: ProductRef) -> Result<Option<ProductRecord>, LifecycleError> {
        Ok(self
            .catalog
            .find_product(product)
            .await?
            .map(|aggregate| aggregate.product))
    }

    async fn transition(
        &self,
        product: ProductRef,
        transition: Transition,
        actor: ActorId,
        payload: Value,
    ) -> Result<Decision<ProductRecord>, LifecycleError> {
        let Some(current) = self.resolve(product).await? else {
            return Ok(Decision::not_found());
        };

        if !transition.permits(current.status) {
            debug!(?transition, from = %current.status, "transition rejected");

            return Ok(Decision::not_found());
        }

        let changed = self
            .catalog
            .change_status(StatusChange {
                product: current.uuid,
                transition,
                actor,
                payload,
            })
            .await?;

        Ok(changed.into())
    }

    /// Queue generation for a freshly allocated image. If queueing fails the image is
    /// marked `FAILED` so it is not left pending with no job behind it.
    async fn enqueue(&self, job: NewJob) -> Result<GenerationJob, LifecycleError> {
        let image = job.image;

        match self.queue.enqueue(job).await {
            Ok(queued) => Ok(queued),
            Err(source) => {
                if let Err(error) = self
                    .catalog
                    .fail_image(image, "failed to queue generation".to_string())
                    .await
                {
                    warn!(%image, %error, "failed to mark unqueued image as failed");
                }

                Err(source.into())
            }
        }
    }
}

#[async_trait]
impl LifecycleService for LifecycleController {
    #[tracing::instrument(
        name = "lifecycle.submit_draft",
        skip(self, submission),
        fields(actor = %submission.actor, product = tracing::field::Empty),
        err
    )]
    async fn submit_draft(
        &self,
        submission: DraftSubmission,
    ) -> Result<Decision<SubmittedDraft>, LifecycleError> {
        if sniff_format(&submission.original).is_none() {
            return Ok(Decision::Rejected(Rejection::UnsupportedImage));
        }

        let product = ProductUuid::new();
        let original_image = ImageUuid::new();
        let ai_image = ImageUuid::new();
        let original_key = original_storage_key(&product);

        tracing::Span::current().record("product", tracing::field::display(product));

        self.images.put(&original_key, submission.original).await?;

        let created = self
            .catalog
            .create_draft(NewDraft {
                uuid: product,
                metadata: submission.metadata,
                conversation: submission.conversation,
                actor: submission.actor,
                original_image,
                original_url: public_url(&self.public_base_url, original_image),
                ai_image,
            })
            .await;

        let created = match created {
            Ok(created) => created,
            Err(source) => {
                if let Err(error) = self.images.delete(&original_key).await {
                    warn!(%error, "failed to remove orphaned original");
                }

                return Err(source.into());
            }
        };

        let job = self
            .enqueue(NewJob {
                product,
                image: ai_image,
                source_storage_key: original_key,
                version: 1,
            })
            .await?;

        info!(code = %created.product.code, "draft created");

        Ok(Decision::Applied(SubmittedDraft {
            product: created,
            job,
        }))
    }

    async fn approve(
        &self,
        product: ProductUuid,
        actor: ActorId,
    ) -> Result<Decision<ProductRecord>, LifecycleError> {
        let Some(aggregate) = self.catalog.find_product(product.into()).await? else {
            return Ok(Decision::not_found());
        };

        let ai_version = aggregate.current_ai_image().map(|image| image.version);

        self.transition(
            product.into(),
            Transition::ApprovePublish,
            actor,
            json!({ "ai_version": ai_version }),
        )
        .await
    }

    async fn publish_original(
        &self,
        product: ProductUuid,
        actor: ActorId,
    ) -> Result<Decision<ProductRecord>, LifecycleError> {
        self.transition(product.into(), Transition::PublishOriginal, actor, json!({}))
            .await
    }

    #[tracing::instrument(name = "lifecycle.discard", skip(self), err)]
    async fn discard(
        &self,
        product: ProductUuid,
        actor: ActorId,
    ) -> Result<Decision<Discarded>, LifecycleError> {
        let Some(current) = self.resolve(product.into()).await? else {
            return Ok(Decision::not_found());
        };

        let Some(storage_keys) = self.catalog.discard_draft(product, actor).await? else {
            return Ok(Decision::not_found());
        };

        let purged = self
            .images
            .delete_many(&storage_keys)
            .await
            .unwrap_or_else(|error| {
                warn!(%error, keys = storage_keys.len(), "failed to purge discarded images");

                0
            });

        Ok(Decision::Applied(Discarded {
            product: current,
            storage_keys,
            purged,
        }))
    }

    #[tracing::instrument(name = "lifecycle.regenerate", skip(self), err)]
    async fn regenerate(
        &self,
        product: ProductUuid,
        actor: ActorId,
    ) -> Result<Decision<Regenerated>, LifecycleError> {
        let Some(current) = self.resolve(product.into()).await? else {
            return Ok(Decision::not_found());
        };

        let Some(allocated) = self.catalog.allocate_ai_version(product, actor).await? else {
            return Ok(Decision::not_found());
        };

        let job = self
            .enqueue(NewJob {
                product,
                image: allocated.image.uuid,
                source_storage_key: allocated.source_storage_key,
                version: allocated.image.version,
            })
            .await?;

        info!(version = allocated.image.version, "regeneration queued");

        Ok(Decision::Applied(Regenerated {
            product: current,
            image: allocated.image,
            job,
        }))
    }

    async fn mark_sold_out(
        &self,
        product: ProductRef,
        actor: ActorId,
    ) -> Result<Decision<ProductRecord>, LifecycleError> {
        self.transition(product, Transition::MarkSoldOut, actor, json!({}))
            .await
    }

    async fn hide(
        &self,
        product: ProductRef,
        actor: ActorId,
    ) -> Result<Decision<ProductRecord>, LifecycleError> {
        self.transition(product, Transition::Hide, actor, json!({}))
            .await
    }

    async fn unhide(
        &self,
        product: ProductRef,
        actor: ActorId,
    ) -> Result<Decision<ProductRecord>, LifecycleError> {
        self.transition(product, Transition::Unhide, actor, json!({}))
            .await
    }

    async fn edit_price(
        &self,
        product: ProductRef,
        price: Price,
        actor: ActorId,
    ) -> Result<Decision<PriceEdited>, LifecycleError> {
        let Some(current) = self.resolve(product).await? else {
            return Ok(Decision::not_found());
        };

        let changed = self
            .catalog
            .change_price(PriceChange {
                product: current.uuid,
                price,
                actor,
            })
            .await?;

        Ok(changed
            .map(|changed| PriceEdited {
                product: current,
                old: changed.old,
                new: changed.new,
            })
            .into())
    }
}

#[automock]
#[async_trait]
pub trait LifecycleService: Send + Sync {
    /// Store the original, create the draft with AI v1 pending, and queue generation.
    async fn submit_draft(
        &self,
        submission: DraftSubmission,
    ) -> Result<Decision<SubmittedDraft>, LifecycleError>;

    /// DRAFT → PUBLISHED, recording the current AI version.
    async fn approve(
        &self,
        product: ProductUuid,
        actor: ActorId,
    ) -> Result<Decision<ProductRecord>, LifecycleError>;

    /// DRAFT → PUBLISHED without an AI image.
    async fn publish_original(
        &self,
        product: ProductUuid,
        actor: ActorId,
    ) -> Result<Decision<ProductRecord>, LifecycleError>;

    /// Delete a draft and purge its image bytes.
    async fn discard(
        &self,
        product: ProductUuid,
        actor: ActorId,
    ) -> Result<Decision<Discarded>, LifecycleError>;

    /// Allocate and queue the next AI version of a draft.
    async fn regenerate(
        &self,
        product: ProductUuid,
        actor: ActorId,
    ) -> Result<Decision<Regenerated>, LifecycleError>;

    /// PUBLISHED or HIDDEN → SOLD_OUT.
    async fn mark_sold_out(
        &self,
        product: ProductRef,
        actor: ActorId,
    ) -> Result<Decision<ProductRecord>, LifecycleError>;

    /// PUBLISHED → HIDDEN.
    async fn hide(
        &self,
        product: ProductRef,
        actor: ActorId,
    ) -> Result<Decision<ProductRecord>, LifecycleError>;

    /// HIDDEN → PUBLISHED.
    async fn unhide(
        &self,
        product: ProductRef,
        actor: ActorId,
    ) -> Result<Decision<ProductRecord>, LifecycleError>;

    /// Change the price, in any status.
    async fn edit_price(
        &self,
        product: ProductRef,
        price: Price,
        actor: ActorId,
    ) -> Result<Decision<PriceEdited>, LifecycleError>;
}

#[cfg(test)]
mod tests {
    use boutique::{
        caption::parse_caption,
        images::{ImageKind, ImageStatus},
        products::{DressCode, ProductStatus},
    };
    use jiff::Timestamp;
    use mockall::predicate::eq;
    use testresult::TestResult;

    use crate::{
        domain::catalog::{
            CatalogError, MockCatalogService,
            data::{AllocatedImage, PriceChanged},
            records::ProductAggregate,
        },
        jobs::{JobState, JobUuid, QueueError, queue::MockJobQueue},
        storage::{MockImageStore, StoreError},
        test::helpers::{self, CONVERSATION},
    };

    use super::*;

    const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0];
    const OPERATOR: ActorId = ActorId(7);

    fn controller(
        catalog: MockCatalogService,
        images: MockImageStore,
        queue: MockJobQueue,
    ) -> LifecycleController {
        LifecycleController::new(
            Arc::new(catalog),
            Arc::new(images),
            Arc::new(queue),
            "https://shop.example".to_string(),
        )
    }

    fn queued(job: &NewJob) -> GenerationJob {
        GenerationJob {
            uuid: JobUuid::new(),
            product_uuid: job.product,
            image_uuid: job.image,
            source_storage_key: job.source_storage_key.clone(),
            version: job.version,
            state: JobState::Queued,
            attempts: 0,
            run_at: Timestamp::UNIX_EPOCH,
            claimed_until: None,
            last_error: None,
            created_at: Timestamp::UNIX_EPOCH,
            updated_at: Timestamp::UNIX_EPOCH,
        }
    }

    fn finds(catalog: &mut MockCatalogService, aggregate: ProductAggregate) {
        catalog
            .expect_find_product()
            .returning(move |_| Ok(Some(aggregate.clone())));
    }

    fn submission(original: &[u8]) -> TestResult<DraftSubmission> {
        Ok(DraftSubmission {
            metadata: parse_caption("Title: Silk Saree\nPrice: 5000")?,
            original: original.to_vec(),
            conversation: Some(CONVERSATION),
            actor: OPERATOR,
        })
    }

    fn created(draft: &NewDraft) -> ProductAggregate {
        let mut product = helpers::product(1001, ProductStatus::Draft);

        product.uuid = draft.uuid;

        helpers::aggregate(product, &[ImageStatus::Pending])
    }

    #[tokio::test]
    async fn submit_rejects_non_images_before_writing() -> TestResult {
        let controller = controller(
            MockCatalogService::new(),
            MockImageStore::new(),
            MockJobQueue::new(),
        );

        let decision = controller.submit_draft(submission(b"GIF89a")?).await?;

        assert_eq!(decision, Decision::Rejected(Rejection::UnsupportedImage));

        Ok(())
    }

    #[tokio::test]
    async fn submit_stores_creates_and_queues_version_one() -> TestResult {
        let mut catalog = MockCatalogService::new();
        let mut images = MockImageStore::new();
        let mut queue = MockJobQueue::new();

        images
            .expect_put()
            .withf(|key, bytes| key.ends_with("/original/v1") && bytes == JPEG)
            .times(1)
            .returning(|_, _| Ok(()));
        catalog
            .expect_create_draft()
            .withf(|draft| {
                draft.actor == OPERATOR
                    && draft.original_url
                        == format!("https://shop.example/img/{}", draft.original_image)
            })
            .times(1)
            .returning(|draft| Ok(created(&draft)));
        queue
            .expect_enqueue()
            .withf(|job| job.version == 1 && job.source_storage_key.ends_with("/original/v1"))
            .times(1)
            .returning(|job| Ok(queued(&job)));

        let decision = controller(catalog, images, queue)
            .submit_draft(submission(JPEG)?)
            .await?;

        let Decision::Applied(submitted) = decision else {
            return Err("expected the draft to be created".into());
        };

        assert_eq!(submitted.product.product.status, ProductStatus::Draft);
        assert_eq!(submitted.job.product_uuid, submitted.product.product.uuid);

        Ok(())
    }

    #[tokio::test]
    async fn submit_removes_the_original_when_the_draft_is_not_created() -> TestResult {
        let mut catalog = MockCatalogService::new();
        let mut images = MockImageStore::new();

        images.expect_put().times(1).returning(|_, _| Ok(()));
        images.expect_delete().times(1).returning(|_| Ok(()));
        catalog
            .expect_create_draft()
            .times(1)
            .returning(|_| Err(CatalogError::InvalidData));

        let result = controller(catalog, images, MockJobQueue::new())
            .submit_draft(submission(JPEG)?)
            .await;

        assert!(matches!(
            result,
            Err(LifecycleError::Catalog(CatalogError::InvalidData))
        ));

        Ok(())
    }

    #[tokio::test]
    async fn failed_enqueue_marks_the_image_failed() -> TestResult {
        let mut catalog = MockCatalogService::new();
        let mut images = MockImageStore::new();
        let mut queue = MockJobQueue::new();

        images.expect_put().returning(|_, _| Ok(()));
        catalog
            .expect_create_draft()
            .returning(|draft| Ok(created(&draft)));
        catalog
            .expect_fail_image()
            .times(1)
            .returning(|_, _| Ok(None));
        queue
            .expect_enqueue()
            .returning(|_| Err(QueueError::Sql(sqlx::Error::PoolTimedOut)));

        let result = controller(catalog, images, queue)
            .submit_draft(submission(JPEG)?)
            .await;

        assert!(matches!(result, Err(LifecycleError::Queue(_))));

        Ok(())
    }

    #[tokio::test]
    async fn approve_records_the_current_ai_version() -> TestResult {
        let draft = helpers::aggregate(
            helpers::product(1001, ProductStatus::Draft),
            &[ImageStatus::Ready, ImageStatus::Failed],
        );
        let uuid = draft.product.uuid;
        let published = ProductRecord {
            status: ProductStatus::Published,
            ..draft.product.clone()
        };
        let mut catalog = MockCatalogService::new();

        finds(&mut catalog, draft);
        catalog
            .expect_change_status()
            .withf(move |change| {
                change.product == uuid
                    && change.transition == Transition::ApprovePublish
                    && change.payload == json!({ "ai_version": 1 })
            })
            .times(1)
            .returning(move |_| Ok(Some(published.clone())));

        let decision = controller(catalog, MockImageStore::new(), MockJobQueue::new())
            .approve(uuid, OPERATOR)
            .await?;

        assert_eq!(
            decision.applied().map(|product| product.status),
            Some(ProductStatus::Published)
        );

        Ok(())
    }

    #[tokio::test]
    async fn approve_without_ready_ai_records_null() -> TestResult {
        let draft = helpers::aggregate(
            helpers::product(1001, ProductStatus::Draft),
            &[ImageStatus::Pending],
        );
        let uuid = draft.product.uuid;
        let mut catalog = MockCatalogService::new();

        finds(&mut catalog, draft.clone());
        catalog
            .expect_change_status()
            .withf(|change| change.payload == json!({ "ai_version": null }))
            .times(1)
            .returning(move |_| Ok(Some(draft.product.clone())));

        controller(catalog, MockImageStore::new(), MockJobQueue::new())
            .approve(uuid, OPERATOR)
            .await?;

        Ok(())
    }

    #[tokio::test]
    async fn invalid_source_state_is_rejected_without_writes() -> TestResult {
        let draft = helpers::aggregate(helpers::product(1001, ProductStatus::Draft), &[]);
        let code = draft.product.code;
        let mut catalog = MockCatalogService::new();

        finds(&mut catalog, draft);

        let controller = controller(catalog, MockImageStore::new(), MockJobQueue::new());

        assert_eq!(
            controller.mark_sold_out(code.into(), OPERATOR).await?,
            Decision::not_found()
        );
        assert_eq!(
            controller.unhide(code.into(), OPERATOR).await?,
            Decision::not_found()
        );

        Ok(())
    }

    #[tokio::test]
    async fn unknown_products_are_rejected() -> TestResult {
        let mut catalog = MockCatalogService::new();

        catalog.expect_find_product().returning(|_| Ok(None));

        let controller = controller(catalog, MockImageStore::new(), MockJobQueue::new());

        assert_eq!(
            controller.hide(DressCode::from_sequence(9).into(), OPERATOR).await?,
            Decision::not_found()
        );
        assert_eq!(
            controller.discard(ProductUuid::new(), OPERATOR).await?,
            Decision::not_found()
        );

        Ok(())
    }

    #[tokio::test]
    async fn discard_purges_keys_best_effort() -> TestResult {
        let draft = helpers::aggregate(
            helpers::product(1001, ProductStatus::Draft),
            &[ImageStatus::Ready],
        );
        let uuid = draft.product.uuid;
        let keys: Vec<String> = draft
            .images
            .iter()
            .map(|image| image.storage_key.clone())
            .collect();
        let mut catalog = MockCatalogService::new();
        let mut images = MockImageStore::new();

        finds(&mut catalog, draft);
        catalog
            .expect_discard_draft()
            .with(eq(uuid), eq(OPERATOR))
            .times(1)
            .returning({
                let keys = keys.clone();

                move |_, _| Ok(Some(keys.clone()))
            });
        images
            .expect_delete_many()
            .times(1)
            .returning(|_| Err(StoreError::Sql(sqlx::Error::PoolTimedOut)));

        let decision = controller(catalog, images, MockJobQueue::new())
            .discard(uuid, OPERATOR)
            .await?;

        let Decision::Applied(discarded) = decision else {
            return Err("expected the draft to be discarded".into());
        };

        assert_eq!(discarded.storage_keys, keys);
        assert_eq!(discarded.purged, 0);

        Ok(())
    }

    #[tokio::test]
    async fn regenerate_queues_the_allocated_version() -> TestResult {
        let draft = helpers::aggregate(
            helpers::product(1001, ProductStatus::Draft),
            &[ImageStatus::Ready, ImageStatus::Failed],
        );
        let uuid = draft.product.uuid;
        let allocated = AllocatedImage {
            image: helpers::image(uuid, ImageKind::AiGenerated, 3, ImageStatus::Pending),
            source_storage_key: original_storage_key(&uuid),
        };
        let mut catalog = MockCatalogService::new();
        let mut queue = MockJobQueue::new();

        finds(&mut catalog, draft);
        catalog
            .expect_allocate_ai_version()
            .times(1)
            .returning(move |_, _| Ok(Some(allocated.clone())));
        queue
            .expect_enqueue()
            .withf(|job| job.version == 3)
            .times(1)
            .returning(|job| Ok(queued(&job)));

        let decision = controller(catalog, MockImageStore::new(), queue)
            .regenerate(uuid, OPERATOR)
            .await?;

        assert_eq!(decision.applied().map(|regenerated| regenerated.image.version), Some(3));

        Ok(())
    }

    #[tokio::test]
    async fn regenerate_outside_draft_is_rejected() -> TestResult {
        let published = helpers::aggregate(helpers::product(1001, ProductStatus::Published), &[]);
        let uuid = published.product.uuid;
        let mut catalog = MockCatalogService::new();

        finds(&mut catalog, published);
        catalog
            .expect_allocate_ai_version()
            .returning(|_, _| Ok(None));

        let decision = controller(catalog, MockImageStore::new(), MockJobQueue::new())
            .regenerate(uuid, OPERATOR)
            .await?;

        assert_eq!(decision, Decision::not_found());

        Ok(())
    }

    #[tokio::test]
    async fn edit_price_reports_old_and_new() -> TestResult {
        let sold_out = helpers::aggregate(helpers::product(1042, ProductStatus::SoldOut), &[]);
        let old = sold_out.product.price;
        let new = Price::from_major(15_000)?;
        let mut catalog = MockCatalogService::new();

        finds(&mut catalog, sold_out);
        catalog
            .expect_change_price()
            .withf(move |change| change.price == new && change.actor == OPERATOR)
            .times(1)
            .returning(move |_| Ok(Some(PriceChanged { old, new })));

        let decision = controller(catalog, MockImageStore::new(), MockJobQueue::new())
            .edit_price(DressCode::from_sequence(1042).into(), new, OPERATOR)
            .await?;

        let Decision::Applied(edited) = decision else {
            return Err("expected the price to change".into());
        };

        assert_eq!((edited.old, edited.new), (old, new));

        Ok(())
    }

    #[tokio::test]
    async fn infrastructure_failures_are_errors_not_rejections() -> TestResult {
        let mut catalog = MockCatalogService::new();

        catalog
            .expect_find_product()
            .returning(|_| Err(CatalogError::Sql(sqlx::Error::PoolTimedOut)));

        let result = controller(catalog, MockImageStore::new(), MockJobQueue::new())
            .publish_original(ProductUuid::new(), OPERATOR)
            .await;

        assert!(matches!(result, Err(LifecycleError::Catalog(_))));

        Ok(())
    }
}
