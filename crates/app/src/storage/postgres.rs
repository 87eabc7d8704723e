//! Postgres-backed image store.

use async_trait::async_trait;
use sqlx::{query, query_scalar};
use tracing::debug;

use crate::{
    database::Db,
    storage::{ImageStore, StoreError},
};

const PUT_BLOB_SQL: &str = include_str!("sql/put_blob.sql");
const GET_BLOB_SQL: &str = include_str!("sql/get_blob.sql");
const DELETE_BLOBS_SQL: &str = include_str!("sql/delete_blobs.sql");

/// Keeps image bytes in the `image_blobs` table.
#[derive(Debug, Clone)]
pub struct PgImageStore {
    db: Db,
}

impl PgImageStore {
    #[must_use]
    pub fn new(db: Db) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ImageStore for PgImageStore {
    #[tracing::instrument(
        name = "storage.put",
        skip(self, bytes),
        fields(size = bytes.len()),
        err
    )]
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), StoreError> {
        query(PUT_BLOB_SQL)
            .bind(key)
            .bind(bytes)
            .execute(self.db.pool())
            .await?;

        debug!("stored image bytes");

        Ok(())
    }

    #[tracing::instrument(name = "storage.get", skip(self), err)]
    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        query_scalar::<_, Vec<u8>>(GET_BLOB_SQL)
            .bind(key)
            .fetch_optional(self.db.pool())
            .await?
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.delete_many(&[key.to_string()]).await.map(|_deleted| ())
    }

    #[tracing::instrument(
        name = "storage.delete_many",
        skip(self, keys),
        fields(keys = keys.len(), deleted = tracing::field::Empty),
        err
    )]
    async fn delete_many(&self, keys: &[String]) -> Result<u64, StoreError> {
        let deleted = query(DELETE_BLOBS_SQL)
            .bind(keys)
            .execute(self.db.pool())
            .await?
            .rows_affected();

        tracing::Span::current().record("deleted", deleted);

        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use crate::test::TestContext;

    use super::*;

    #[tokio::test]
    async fn put_then_get_returns_the_bytes() -> TestResult {
        let ctx = TestContext::new().await;

        ctx.images.put("products/p/original/v1", vec![1, 2, 3]).await?;
        ctx.images.put("products/p/original/v1", vec![4, 5]).await?;

        assert_eq!(ctx.images.get("products/p/original/v1").await?, vec![4, 5]);

        Ok(())
    }

    #[tokio::test]
    async fn missing_keys_are_not_found() -> TestResult {
        let ctx = TestContext::new().await;

        let result = ctx.images.get("products/p/ai/v9").await;

        assert!(matches!(result, Err(StoreError::NotFound(key)) if key == "products/p/ai/v9"));

        ctx.images.delete("products/p/ai/v9").await?;

        Ok(())
    }

    #[tokio::test]
    async fn delete_many_counts_existing_objects() -> TestResult {
        let ctx = TestContext::new().await;

        ctx.images.put("a", vec![1]).await?;
        ctx.images.put("b", vec![2]).await?;

        let deleted = ctx
            .images
            .delete_many(&["a".to_string(), "b".to_string(), "c".to_string()])
            .await?;

        assert_eq!(deleted, 2);

        Ok(())
    }
}
