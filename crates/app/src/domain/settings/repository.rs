//! Settings Repository

use sqlx::{Postgres, Transaction, query, query_scalar};
use tracing::debug;

const GET_SETTING_SQL: &str = include_str!("sql/get_setting.sql");
const LOCK_SETTING_SQL: &str = include_str!("sql/lock_setting.sql");
const UPSERT_SETTING_SQL: &str = include_str!("sql/upsert_setting.sql");

#[derive(Debug, Clone, Default)]
pub(crate) struct PgSettingsRepository;

impl PgSettingsRepository {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self
    }

    pub(crate) async fn get(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        key: &str,
    ) -> Result<Option<String>, sqlx::Error> {
        query_scalar(GET_SETTING_SQL)
            .bind(key)
            .fetch_optional(&mut **tx)
            .await
    }

    /// Like [`Self::get`], holding the row until the transaction ends.
    pub(crate) async fn get_for_update(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        key: &str,
    ) -> Result<Option<String>, sqlx::Error> {
        query_scalar(LOCK_SETTING_SQL)
            .bind(key)
            .fetch_optional(&mut **tx)
            .await
    }

    #[tracing::instrument(name = "settings.repository.set", skip(self, tx), err)]
    pub(crate) async fn set(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        key: &str,
        value: &str,
    ) -> Result<(), sqlx::Error> {
        query(UPSERT_SETTING_SQL)
            .bind(key)
            .bind(value)
            .execute(&mut **tx)
            .await?;

        debug!("stored setting");

        Ok(())
    }
}
