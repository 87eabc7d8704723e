//! Audit Repository

use boutique::audit::AuditAction;
use jiff_sqlx::Timestamp as SqlxTimestamp;
use serde_json::Value;
use sqlx::{FromRow, Postgres, Row, Transaction, postgres::PgRow, query_as};
use tracing::debug;
use uuid::Uuid;

use crate::domain::{
    audit::records::{ActorId, AuditRecord, NewAuditEntry},
    catalog::records::ProductUuid,
};

const INSERT_AUDIT_SQL: &str = include_str!("sql/insert_audit.sql");
const LIST_AUDIT_SQL: &str = include_str!("sql/list_audit.sql");

#[derive(Debug, Clone, Default)]
pub(crate) struct PgAuditRepository;

impl PgAuditRepository {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self
    }

    #[tracing::instrument(
        name = "audit.repository.append",
        skip(self, tx, entry),
        fields(action = %entry.action, actor = %entry.actor),
        err
    )]
    pub(crate) async fn append(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        entry: NewAuditEntry,
    ) -> Result<AuditRecord, sqlx::Error> {
        let record = query_as::<Postgres, AuditRecord>(INSERT_AUDIT_SQL)
            .bind(entry.actor.0)
            .bind(entry.action.as_str())
            .bind(entry.product_uuid.map(ProductUuid::into_uuid))
            .bind(entry.payload)
            .fetch_one(&mut **tx)
            .await?;

        debug!(audit_id = record.id, "appended audit entry");

        Ok(record)
    }

    pub(crate) async fn list(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        product: Option<ProductUuid>,
        limit: u32,
    ) -> Result<Vec<AuditRecord>, sqlx::Error> {
        query_as::<Postgres, AuditRecord>(LIST_AUDIT_SQL)
            .bind(product.map(ProductUuid::into_uuid))
            .bind(i64::from(limit))
            .fetch_all(&mut **tx)
            .await
    }
}

impl<'r> FromRow<'r, PgRow> for AuditRecord {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        let action: String = row.try_get("action")?;

        let action = action
            .parse::<AuditAction>()
            .map_err(|e| sqlx::Error::ColumnDecode {
                index: "action".to_string(),
                source: Box::new(e),
            })?;

        Ok(Self {
            id: row.try_get("id")?,
            actor: ActorId(row.try_get("actor_id")?),
            action,
            product_uuid: row
                .try_get::<Option<Uuid>, _>("product_uuid")?
                .map(ProductUuid::from_uuid),
            payload: row.try_get::<Value, _>("payload")?,
            created_at: row.try_get::<SqlxTimestamp, _>("created_at")?.to_jiff(),
        })
    }
}
