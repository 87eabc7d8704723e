//! Catalog Repository

use std::error::Error as StdError;

use boutique::{
    caption::{DraftMetadata, VariantSpec},
    images::{ImageKind, ImageStatus},
    products::{DressCode, Price, ProductStatus},
};
use jiff_sqlx::Timestamp as SqlxTimestamp;
use sqlx::{FromRow, Postgres, Row, Transaction, postgres::PgRow, query, query_as, query_scalar};
use tracing::debug;
use uuid::Uuid;

use crate::{
    domain::catalog::records::{
        ImageRecord, ImageUuid, ProductRecord, ProductRef, ProductUuid, VariantRecord,
        VariantUuid,
    },
    messaging::{ConversationId, MessageRef},
};

const CREATE_PRODUCT_SQL: &str = include_str!("sql/create_product.sql");
const CREATE_VARIANTS_SQL: &str = include_str!("sql/create_variants.sql");
const CREATE_IMAGE_SQL: &str = include_str!("sql/create_image.sql");
const GET_PRODUCT_SQL: &str = include_str!("sql/get_product.sql");
const GET_PRODUCT_BY_CODE_SQL: &str = include_str!("sql/get_product_by_code.sql");
const LOCK_PRODUCT_SQL: &str = include_str!("sql/lock_product.sql");
const LIST_PRODUCT_IMAGES_SQL: &str = include_str!("sql/list_product_images.sql");
const LIST_PRODUCT_VARIANTS_SQL: &str = include_str!("sql/list_product_variants.sql");
const GET_IMAGE_SQL: &str = include_str!("sql/get_image.sql");
const UPDATE_PRODUCT_STATUS_SQL: &str = include_str!("sql/update_product_status.sql");
const UPDATE_PRODUCT_PRICE_SQL: &str = include_str!("sql/update_product_price.sql");
const DELETE_PRODUCT_SQL: &str = include_str!("sql/delete_product.sql");
const NEXT_AI_VERSION_SQL: &str = include_str!("sql/next_ai_version.sql");
const SETTLE_IMAGE_SQL: &str = include_str!("sql/settle_image.sql");
const SET_PREVIEW_MESSAGE_SQL: &str = include_str!("sql/set_preview_message.sql");
const COUNT_PRODUCTS_BY_STATUS_SQL: &str = include_str!("sql/count_products_by_status.sql");

/// Image row to insert.
#[derive(Debug, Clone)]
pub(crate) struct NewImage<'a> {
    pub(crate) uuid: ImageUuid,
    pub(crate) product: ProductUuid,
    pub(crate) kind: ImageKind,
    pub(crate) version: u32,
    pub(crate) storage_key: &'a str,
    pub(crate) url: Option<&'a str>,
    pub(crate) status: ImageStatus,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct PgCatalogRepository;

impl PgCatalogRepository {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self
    }

    #[tracing::instrument(
        name = "catalog.repository.create_product",
        skip(self, tx, metadata),
        fields(product = %product, code = tracing::field::Empty),
        err
    )]
    pub(crate) async fn create_product(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        product: ProductUuid,
        metadata: &DraftMetadata,
        conversation: Option<ConversationId>,
    ) -> Result<ProductRecord, sqlx::Error> {
        let record = query_as::<Postgres, ProductRecord>(CREATE_PRODUCT_SQL)
            .bind(product.into_uuid())
            .bind(&metadata.title)
            .bind(&metadata.description)
            .bind(metadata.categories.as_slice())
            .bind(&metadata.tags)
            .bind(encode_price(metadata.price)?)
            .bind(conversation.map(|conversation| conversation.0))
            .fetch_one(&mut **tx)
            .await?;

        tracing::Span::current().record("code", tracing::field::display(record.code));

        debug!("created product");

        Ok(record)
    }

    #[tracing::instrument(
        name = "catalog.repository.create_variants",
        skip(self, tx, variants),
        fields(product = %product, variant_count = variants.len()),
        err
    )]
    pub(crate) async fn create_variants(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        product: ProductUuid,
        variants: &[VariantSpec],
    ) -> Result<Vec<VariantRecord>, sqlx::Error> {
        if variants.is_empty() {
            return Ok(Vec::new());
        }

        let uuids: Vec<Uuid> = variants
            .iter()
            .map(|_| VariantUuid::new().into_uuid())
            .collect();
        let kinds: Vec<&str> = variants.iter().map(|v| v.kind.as_str()).collect();
        let values: Vec<&str> = variants.iter().map(|v| v.value.as_str()).collect();
        let sort_orders = (0..variants.len())
            .map(i32::try_from)
            .collect::<Result<Vec<i32>, _>>()
            .map_err(|e| decode_error("sort_order", e))?;

        let mut records: Vec<VariantRecord> = query_as(CREATE_VARIANTS_SQL)
            .bind(product.into_uuid())
            .bind(&uuids)
            .bind(&kinds)
            .bind(&values)
            .bind(&sort_orders)
            .fetch_all(&mut **tx)
            .await?;

        records.sort_by_key(|record| record.sort_order);

        Ok(records)
    }

    #[tracing::instrument(
        name = "catalog.repository.create_image",
        skip(self, tx, image),
        fields(
            image = %image.uuid,
            product = %image.product,
            kind = %image.kind,
            version = image.version
        ),
        err
    )]
    pub(crate) async fn create_image(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        image: NewImage<'_>,
    ) -> Result<ImageRecord, sqlx::Error> {
        query_as::<Postgres, ImageRecord>(CREATE_IMAGE_SQL)
            .bind(image.uuid.into_uuid())
            .bind(image.product.into_uuid())
            .bind(image.kind.as_str())
            .bind(encode_version(image.version)?)
            .bind(image.storage_key)
            .bind(image.url)
            .bind(image.status.as_str())
            .fetch_one(&mut **tx)
            .await
    }

    pub(crate) async fn get_product(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        product: ProductRef,
    ) -> Result<Option<ProductRecord>, sqlx::Error> {
        match product {
            ProductRef::Uuid(uuid) => {
                query_as::<Postgres, ProductRecord>(GET_PRODUCT_SQL)
                    .bind(uuid.into_uuid())
                    .fetch_optional(&mut **tx)
                    .await
            }
            ProductRef::Code(code) => {
                let Ok(code) = i64::try_from(code.sequence()) else {
                    return Ok(None);
                };

                query_as::<Postgres, ProductRecord>(GET_PRODUCT_BY_CODE_SQL)
                    .bind(code)
                    .fetch_optional(&mut **tx)
                    .await
            }
        }
    }

    /// Load a product and hold its row lock until the transaction ends.
    pub(crate) async fn lock_product(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        product: ProductUuid,
    ) -> Result<Option<ProductRecord>, sqlx::Error> {
        query_as::<Postgres, ProductRecord>(LOCK_PRODUCT_SQL)
            .bind(product.into_uuid())
            .fetch_optional(&mut **tx)
            .await
    }

    pub(crate) async fn list_images(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        product: ProductUuid,
    ) -> Result<Vec<ImageRecord>, sqlx::Error> {
        query_as::<Postgres, ImageRecord>(LIST_PRODUCT_IMAGES_SQL)
            .bind(product.into_uuid())
            .fetch_all(&mut **tx)
            .await
    }

    pub(crate) async fn list_variants(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        product: ProductUuid,
    ) -> Result<Vec<VariantRecord>, sqlx::Error> {
        query_as::<Postgres, VariantRecord>(LIST_PRODUCT_VARIANTS_SQL)
            .bind(product.into_uuid())
            .fetch_all(&mut **tx)
            .await
    }

    pub(crate) async fn get_image(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        image: ImageUuid,
    ) -> Result<Option<ImageRecord>, sqlx::Error> {
        query_as::<Postgres, ImageRecord>(GET_IMAGE_SQL)
            .bind(image.into_uuid())
            .fetch_optional(&mut **tx)
            .await
    }

    #[tracing::instrument(
        name = "catalog.repository.update_status",
        skip(self, tx, sources),
        fields(product = %product, target = %target, updated = tracing::field::Empty),
        err
    )]
    pub(crate) async fn update_status(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        product: ProductUuid,
        target: ProductStatus,
        sources: &[ProductStatus],
    ) -> Result<Option<ProductRecord>, sqlx::Error> {
        let sources: Vec<&str> = sources.iter().map(|status| status.as_str()).collect();

        let record = query_as::<Postgres, ProductRecord>(UPDATE_PRODUCT_STATUS_SQL)
            .bind(product.into_uuid())
            .bind(target.as_str())
            .bind(&sources)
            .fetch_optional(&mut **tx)
            .await?;

        tracing::Span::current().record("updated", record.is_some());

        Ok(record)
    }

    /// Returns the previous and new price when the product exists.
    #[tracing::instrument(
        name = "catalog.repository.update_price",
        skip(self, tx),
        fields(product = %product),
        err
    )]
    pub(crate) async fn update_price(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        product: ProductUuid,
        price: Price,
    ) -> Result<Option<(Price, Price)>, sqlx::Error> {
        let row: Option<(i64, i64)> = query_as(UPDATE_PRODUCT_PRICE_SQL)
            .bind(product.into_uuid())
            .bind(encode_price(price)?)
            .fetch_optional(&mut **tx)
            .await?;

        let Some((old, new)) = row else {
            return Ok(None);
        };

        Ok(Some((
            decode_price("old_price_minor", old)?,
            decode_price("price_minor", new)?,
        )))
    }

    #[tracing::instrument(
        name = "catalog.repository.delete_draft",
        skip(self, tx),
        fields(product = %product),
        err
    )]
    pub(crate) async fn delete_draft(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        product: ProductUuid,
    ) -> Result<u64, sqlx::Error> {
        let rows_affected = query(DELETE_PRODUCT_SQL)
            .bind(product.into_uuid())
            .execute(&mut **tx)
            .await?
            .rows_affected();

        Ok(rows_affected)
    }

    /// Next AI version for a product, counting every status. Callers hold the product lock.
    pub(crate) async fn next_ai_version(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        product: ProductUuid,
    ) -> Result<u32, sqlx::Error> {
        let version: i32 = query_scalar(NEXT_AI_VERSION_SQL)
            .bind(product.into_uuid())
            .fetch_one(&mut **tx)
            .await?;

        u32::try_from(version).map_err(|e| decode_error("version", e))
    }

    /// Move a `PENDING` image to `status`. Returns `None` if it was already settled.
    #[tracing::instrument(
        name = "catalog.repository.settle_image",
        skip(self, tx, url),
        fields(image = %image, status = %status, settled = tracing::field::Empty),
        err
    )]
    pub(crate) async fn settle_image(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        image: ImageUuid,
        status: ImageStatus,
        url: Option<&str>,
    ) -> Result<Option<ImageRecord>, sqlx::Error> {
        let record = query_as::<Postgres, ImageRecord>(SETTLE_IMAGE_SQL)
            .bind(image.into_uuid())
            .bind(status.as_str())
            .bind(url)
            .fetch_optional(&mut **tx)
            .await?;

        tracing::Span::current().record("settled", record.is_some());

        Ok(record)
    }

    pub(crate) async fn set_preview_message(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        product: ProductUuid,
        message: MessageRef,
    ) -> Result<u64, sqlx::Error> {
        let rows_affected = query(SET_PREVIEW_MESSAGE_SQL)
            .bind(product.into_uuid())
            .bind(message.0)
            .execute(&mut **tx)
            .await?
            .rows_affected();

        Ok(rows_affected)
    }

    pub(crate) async fn count_by_status(
        &self,
        tx: &mut Transaction<'_, Postgres>,
    ) -> Result<Vec<(ProductStatus, u64)>, sqlx::Error> {
        let rows: Vec<(String, i64)> = query_as(COUNT_PRODUCTS_BY_STATUS_SQL)
            .fetch_all(&mut **tx)
            .await?;

        rows.into_iter()
            .map(|(status, count)| -> Result<(ProductStatus, u64), sqlx::Error> {
                let status = status
                    .parse::<ProductStatus>()
                    .map_err(|e| decode_error("status", e))?;
                let count = u64::try_from(count).map_err(|e| decode_error("product_count", e))?;

                Ok((status, count))
            })
            .collect()
    }
}

fn decode_error(index: &str, source: impl StdError + Send + Sync + 'static) -> sqlx::Error {
    sqlx::Error::ColumnDecode {
        index: index.to_string(),
        source: Box::new(source),
    }
}

fn encode_price(price: Price) -> Result<i64, sqlx::Error> {
    i64::try_from(price.minor_units()).map_err(|e| decode_error("price_minor", e))
}

fn decode_price(index: &str, minor: i64) -> Result<Price, sqlx::Error> {
    let minor = u64::try_from(minor).map_err(|e| decode_error(index, e))?;

    Price::from_minor(minor).map_err(|e| decode_error(index, e))
}

fn encode_version(version: u32) -> Result<i32, sqlx::Error> {
    i32::try_from(version).map_err(|e| decode_error("version", e))
}

impl<'r> FromRow<'r, PgRow> for ProductRecord {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        let code: i64 = row.try_get("code")?;
        let status: String = row.try_get("status")?;

        Ok(Self {
            uuid: ProductUuid::from_uuid(row.try_get("uuid")?),
            code: DressCode::from_sequence(
                u64::try_from(code).map_err(|e| decode_error("code", e))?,
            ),
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            categories: row.try_get("categories")?,
            tags: row.try_get("tags")?,
            price: decode_price("price_minor", row.try_get("price_minor")?)?,
            status: status
                .parse()
                .map_err(|e| decode_error("status", e))?,
            conversation: row
                .try_get::<Option<i64>, _>("conversation_id")?
                .map(ConversationId),
            preview_message: row
                .try_get::<Option<i64>, _>("preview_message_id")?
                .map(MessageRef),
            created_at: row.try_get::<SqlxTimestamp, _>("created_at")?.to_jiff(),
            updated_at: row.try_get::<SqlxTimestamp, _>("updated_at")?.to_jiff(),
        })
    }
}

impl<'r> FromRow<'r, PgRow> for ImageRecord {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        let kind: String = row.try_get("kind")?;
        let status: String = row.try_get("status")?;
        let version: i32 = row.try_get("version")?;

        Ok(Self {
            uuid: ImageUuid::from_uuid(row.try_get("uuid")?),
            product_uuid: ProductUuid::from_uuid(row.try_get("product_uuid")?),
            kind: kind.parse().map_err(|e| decode_error("kind", e))?,
            version: u32::try_from(version).map_err(|e| decode_error("version", e))?,
            storage_key: row.try_get("storage_key")?,
            url: row.try_get("url")?,
            status: status.parse().map_err(|e| decode_error("status", e))?,
            created_at: row.try_get::<SqlxTimestamp, _>("created_at")?.to_jiff(),
            updated_at: row.try_get::<SqlxTimestamp, _>("updated_at")?.to_jiff(),
        })
    }
}

impl<'r> FromRow<'r, PgRow> for VariantRecord {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        Ok(Self {
            uuid: VariantUuid::from_uuid(row.try_get("uuid")?),
            kind: row.try_get("kind")?,
            value: row.try_get("value")?,
            sort_order: row.try_get("sort_order")?,
        })
    }
}
