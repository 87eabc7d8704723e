//! Catalog service.

use async_trait::async_trait;
use boutique::{
    audit::AuditAction,
    images::{self, ImageKind, ImageStatus},
    products::{ProductStatus, Transition},
};
use mockall::automock;
use serde_json::json;

use crate::{
    database::Db,
    domain::{
        audit::{
            records::{ActorId, AuditRecord, NewAuditEntry},
            repository::PgAuditRepository,
        },
        catalog::{
            data::{AllocatedImage, NewDraft, PriceChange, PriceChanged, StatusChange},
            errors::CatalogError,
            records::{
                ImageRecord, ImageUuid, ProductAggregate, ProductRecord, ProductRef, ProductUuid,
            },
            repository::{NewImage, PgCatalogRepository},
        },
    },
    messaging::MessageRef,
};

#[derive(Debug, Clone)]
pub struct PgCatalogService {
    db: Db,
    repository: PgCatalogRepository,
    audit: PgAuditRepository,
}

impl PgCatalogService {
    #[must_use]
    pub fn new(db: Db) -> Self {
        Self {
            db,
            repository: PgCatalogRepository::new(),
            audit: PgAuditRepository::new(),
        }
    }
}

#[async_trait]
impl CatalogService for PgCatalogService {
    async fn create_draft(&self, draft: NewDraft) -> Result<ProductAggregate, CatalogError> {
        let mut tx = self.db.begin().await?;

        let product = self
            .repository
            .create_product(&mut tx, draft.uuid, &draft.metadata, draft.conversation)
            .await?;

        let variants = self
            .repository
            .create_variants(&mut tx, draft.uuid, &draft.metadata.variants)
            .await?;

        let original_key = images::original_storage_key(&draft.uuid);
        let ai_key = images::ai_storage_key(&draft.uuid, 1);

        let original = self
            .repository
            .create_image(
                &mut tx,
                NewImage {
                    uuid: draft.original_image,
                    product: draft.uuid,
                    kind: ImageKind::Original,
                    version: 1,
                    storage_key: &original_key,
                    url: Some(&draft.original_url),
                    status: ImageStatus::Ready,
                },
            )
            .await?;

        let ai = self
            .repository
            .create_image(
                &mut tx,
                NewImage {
                    uuid: draft.ai_image,
                    product: draft.uuid,
                    kind: ImageKind::AiGenerated,
                    version: 1,
                    storage_key: &ai_key,
                    url: None,
                    status: ImageStatus::Pending,
                },
            )
            .await?;

        self.audit
            .append(
                &mut tx,
                NewAuditEntry {
                    actor: draft.actor,
                    action: AuditAction::CreateDraft,
                    product_uuid: Some(product.uuid),
                    payload: json!({
                        "code": product.code.to_string(),
                        "title": product.title,
                    }),
                },
            )
            .await?;

        tx.commit().await?;

        Ok(ProductAggregate {
            product,
            images: vec![original, ai],
            variants,
        })
    }

    async fn find_product(
        &self,
        product: ProductRef,
    ) -> Result<Option<ProductAggregate>, CatalogError> {
        let mut tx = self.db.begin().await?;

        let Some(product) = self.repository.get_product(&mut tx, product).await? else {
            return Ok(None);
        };

        let images = self.repository.list_images(&mut tx, product.uuid).await?;
        let variants = self.repository.list_variants(&mut tx, product.uuid).await?;

        tx.commit().await?;

        Ok(Some(ProductAggregate {
            product,
            images,
            variants,
        }))
    }

    async fn find_image(&self, image: ImageUuid) -> Result<Option<ImageRecord>, CatalogError> {
        let mut tx = self.db.begin().await?;

        let image = self.repository.get_image(&mut tx, image).await?;

        tx.commit().await?;

        Ok(image)
    }

    async fn change_status(
        &self,
        change: StatusChange,
    ) -> Result<Option<ProductRecord>, CatalogError> {
        let target = change
            .transition
            .fixed_target()
            .ok_or(CatalogError::InvalidData)?;

        let mut tx = self.db.begin().await?;

        let Some(product) = self
            .repository
            .update_status(&mut tx, change.product, target, change.transition.sources())
            .await?
        else {
            return Ok(None);
        };

        self.audit
            .append(
                &mut tx,
                NewAuditEntry {
                    actor: change.actor,
                    action: change.transition.audit_action(),
                    product_uuid: Some(product.uuid),
                    payload: change.payload,
                },
            )
            .await?;

        tx.commit().await?;

        Ok(Some(product))
    }

    async fn change_price(
        &self,
        change: PriceChange,
    ) -> Result<Option<PriceChanged>, CatalogError> {
        let mut tx = self.db.begin().await?;

        let Some((old, new)) = self
            .repository
            .update_price(&mut tx, change.product, change.price)
            .await?
        else {
            return Ok(None);
        };

        self.audit
            .append(
                &mut tx,
                NewAuditEntry {
                    actor: change.actor,
                    action: Transition::EditPrice.audit_action(),
                    product_uuid: Some(change.product),
                    payload: json!({
                        "old_minor": old.minor_units(),
                        "new_minor": new.minor_units(),
                    }),
                },
            )
            .await?;

        tx.commit().await?;

        Ok(Some(PriceChanged { old, new }))
    }

    async fn discard_draft(
        &self,
        product: ProductUuid,
        actor: ActorId,
    ) -> Result<Option<Vec<String>>, CatalogError> {
        let mut tx = self.db.begin().await?;

        let Some(record) = self.repository.lock_product(&mut tx, product).await? else {
            return Ok(None);
        };

        if !Transition::Discard.permits(record.status) {
            return Ok(None);
        }

        let storage_keys: Vec<String> = self
            .repository
            .list_images(&mut tx, product)
            .await?
            .into_iter()
            .map(|image| image.storage_key)
            .collect();

        self.audit
            .append(
                &mut tx,
                NewAuditEntry {
                    actor,
                    action: AuditAction::Discard,
                    product_uuid: Some(product),
                    payload: json!({
                        "code": record.code.to_string(),
                        "storage_keys": storage_keys,
                    }),
                },
            )
            .await?;

        if self.repository.delete_draft(&mut tx, product).await? == 0 {
            return Ok(None);
        }

        tx.commit().await?;

        Ok(Some(storage_keys))
    }

    async fn allocate_ai_version(
        &self,
        product: ProductUuid,
        actor: ActorId,
    ) -> Result<Option<AllocatedImage>, CatalogError> {
        let mut tx = self.db.begin().await?;

        let Some(record) = self.repository.lock_product(&mut tx, product).await? else {
            return Ok(None);
        };

        if !Transition::Regenerate.permits(record.status) {
            return Ok(None);
        }

        let source_storage_key = self
            .repository
            .list_images(&mut tx, product)
            .await?
            .into_iter()
            .find(|image| image.kind == ImageKind::Original)
            .map(|image| image.storage_key)
            .ok_or(CatalogError::MissingRequiredData)?;

        let version = self.repository.next_ai_version(&mut tx, product).await?;
        let storage_key = images::ai_storage_key(&product, version);

        let image = self
            .repository
            .create_image(
                &mut tx,
                NewImage {
                    uuid: ImageUuid::new(),
                    product,
                    kind: ImageKind::AiGenerated,
                    version,
                    storage_key: &storage_key,
                    url: None,
                    status: ImageStatus::Pending,
                },
            )
            .await?;

        self.audit
            .append(
                &mut tx,
                NewAuditEntry {
                    actor,
                    action: Transition::Regenerate.audit_action(),
                    product_uuid: Some(product),
                    payload: json!({ "new_version": version }),
                },
            )
            .await?;

        tx.commit().await?;

        Ok(Some(AllocatedImage {
            image,
            source_storage_key,
        }))
    }

    async fn complete_image(
        &self,
        image: ImageUuid,
        url: String,
    ) -> Result<Option<ImageRecord>, CatalogError> {
        let mut tx = self.db.begin().await?;

        let Some(record) = self
            .repository
            .settle_image(&mut tx, image, ImageStatus::Ready, Some(&url))
            .await?
        else {
            return Ok(None);
        };

        self.audit
            .append(
                &mut tx,
                NewAuditEntry {
                    actor: ActorId::SYSTEM,
                    action: AuditAction::AiImageReady,
                    product_uuid: Some(record.product_uuid),
                    payload: json!({
                        "image": record.uuid.to_string(),
                        "version": record.version,
                    }),
                },
            )
            .await?;

        tx.commit().await?;

        Ok(Some(record))
    }

    async fn fail_image(
        &self,
        image: ImageUuid,
        reason: String,
    ) -> Result<Option<ImageRecord>, CatalogError> {
        let mut tx = self.db.begin().await?;

        let Some(record) = self
            .repository
            .settle_image(&mut tx, image, ImageStatus::Failed, None)
            .await?
        else {
            return Ok(None);
        };

        self.audit
            .append(
                &mut tx,
                NewAuditEntry {
                    actor: ActorId::SYSTEM,
                    action: AuditAction::AiImageFailed,
                    product_uuid: Some(record.product_uuid),
                    payload: json!({
                        "image": record.uuid.to_string(),
                        "version": record.version,
                        "reason": reason,
                    }),
                },
            )
            .await?;

        tx.commit().await?;

        Ok(Some(record))
    }

    async fn record_preview_message(
        &self,
        product: ProductUuid,
        message: MessageRef,
    ) -> Result<(), CatalogError> {
        let mut tx = self.db.begin().await?;

        let rows_affected = self
            .repository
            .set_preview_message(&mut tx, product, message)
            .await?;

        if rows_affected == 0 {
            return Err(CatalogError::NotFound);
        }

        tx.commit().await?;

        Ok(())
    }

    async fn append_audit(&self, entry: NewAuditEntry) -> Result<AuditRecord, CatalogError> {
        let mut tx = self.db.begin().await?;

        let record = self.audit.append(&mut tx, entry).await?;

        tx.commit().await?;

        Ok(record)
    }

    async fn list_audit(
        &self,
        product: Option<ProductUuid>,
        limit: u32,
    ) -> Result<Vec<AuditRecord>, CatalogError> {
        let mut tx = self.db.begin().await?;

        let records = self.audit.list(&mut tx, product, limit).await?;

        tx.commit().await?;

        Ok(records)
    }

    async fn status_counts(&self) -> Result<Vec<(ProductStatus, u64)>, CatalogError> {
        let mut tx = self.db.begin().await?;

        let counts = self.repository.count_by_status(&mut tx).await?;

        tx.commit().await?;

        Ok(counts)
    }
}

#[automock]
#[async_trait]
pub trait CatalogService: Send + Sync {
    /// Create a draft with its original image (`READY`), AI v1 (`PENDING`) and variants.
    async fn create_draft(&self, draft: NewDraft) -> Result<ProductAggregate, CatalogError>;

    /// Load a product with its images and variants.
    async fn find_product(
        &self,
        product: ProductRef,
    ) -> Result<Option<ProductAggregate>, CatalogError>;

    /// Load a single image.
    async fn find_image(&self, image: ImageUuid) -> Result<Option<ImageRecord>, CatalogError>;

    /// Apply a status-only transition. `None` when the product is missing or not in a
    /// source status; nothing is written in that case.
    async fn change_status(
        &self,
        change: StatusChange,
    ) -> Result<Option<ProductRecord>, CatalogError>;

    /// Change the price in place. `None` when the product is missing.
    async fn change_price(&self, change: PriceChange)
    -> Result<Option<PriceChanged>, CatalogError>;

    /// Delete a draft and return the storage keys of its images. Bytes are not touched.
    async fn discard_draft(
        &self,
        product: ProductUuid,
        actor: ActorId,
    ) -> Result<Option<Vec<String>>, CatalogError>;

    /// Allocate the next AI version for a draft as a `PENDING` image.
    async fn allocate_ai_version(
        &self,
        product: ProductUuid,
        actor: ActorId,
    ) -> Result<Option<AllocatedImage>, CatalogError>;

    /// Mark a `PENDING` image `READY` with its public URL.
    async fn complete_image(
        &self,
        image: ImageUuid,
        url: String,
    ) -> Result<Option<ImageRecord>, CatalogError>;

    /// Mark a `PENDING` image `FAILED`.
    async fn fail_image(
        &self,
        image: ImageUuid,
        reason: String,
    ) -> Result<Option<ImageRecord>, CatalogError>;

    /// Remember the preview message so later edits happen in place.
    async fn record_preview_message(
        &self,
        product: ProductUuid,
        message: MessageRef,
    ) -> Result<(), CatalogError>;

    /// Append a standalone audit entry.
    async fn append_audit(&self, entry: NewAuditEntry) -> Result<AuditRecord, CatalogError>;

    /// Most recent audit entries, newest first.
    async fn list_audit(
        &self,
        product: Option<ProductUuid>,
        limit: u32,
    ) -> Result<Vec<AuditRecord>, CatalogError>;

    /// Product counts per status.
    async fn status_counts(&self) -> Result<Vec<(ProductStatus, u64)>, CatalogError>;
}
