//! Settings service.

use async_trait::async_trait;
use boutique::{audit::AuditAction, pricing::FxRate};
use mockall::automock;
use serde_json::json;
use sqlx::{Postgres, Transaction};
use tracing::warn;

use crate::{
    database::Db,
    domain::{
        audit::{
            records::{ActorId, NewAuditEntry},
            repository::PgAuditRepository,
        },
        settings::{
            data::{
                CONTACT_NUMBER_KEY, ContactNumber, INSTAGRAM_POSTS_KEY, InstagramPost,
                InstagramPosts, USD_FX_RATE_KEY,
            },
            errors::SettingsError,
            repository::PgSettingsRepository,
        },
    },
};

#[derive(Debug, Clone)]
pub struct PgSettingsService {
    db: Db,
    repository: PgSettingsRepository,
    audit: PgAuditRepository,
}

impl PgSettingsService {
    #[must_use]
    pub fn new(db: Db) -> Self {
        Self {
            db,
            repository: PgSettingsRepository::new(),
            audit: PgAuditRepository::new(),
        }
    }

    async fn store(
        &self,
        key: &str,
        value: &str,
        entry: NewAuditEntry,
    ) -> Result<(), SettingsError> {
        let mut tx = self.db.begin().await?;

        self.write(&mut tx, key, value, entry).await?;

        tx.commit().await?;

        Ok(())
    }

    async fn write(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        key: &str,
        value: &str,
        entry: NewAuditEntry,
    ) -> Result<(), SettingsError> {
        self.repository.set(tx, key, value).await?;
        self.audit.append(tx, entry).await?;

        Ok(())
    }

    async fn locked_posts(
        &self,
        tx: &mut Transaction<'_, Postgres>,
    ) -> Result<InstagramPosts, SettingsError> {
        let stored = self.repository.get_for_update(tx, INSTAGRAM_POSTS_KEY).await?;

        Ok(decode_posts(stored))
    }
}

fn decode_posts(stored: Option<String>) -> InstagramPosts {
    let Some(value) = stored else {
        return InstagramPosts::default();
    };

    serde_json::from_str(&value).unwrap_or_else(|error| {
        warn!(%error, "stored instagram posts are invalid, starting over");

        InstagramPosts::default()
    })
}

#[async_trait]
impl SettingsService for PgSettingsService {
    async fn fx_rate(&self) -> Result<FxRate, SettingsError> {
        let mut tx = self.db.begin().await?;

        let stored = self.repository.get(&mut tx, USD_FX_RATE_KEY).await?;

        tx.commit().await?;

        match stored {
            Some(value) => Ok(value.parse()?),
            None => Ok(FxRate::default()),
        }
    }

    async fn set_fx_rate(&self, rate: FxRate, actor: ActorId) -> Result<(), SettingsError> {
        self.store(
            USD_FX_RATE_KEY,
            &rate.to_string(),
            NewAuditEntry {
                actor,
                action: AuditAction::SetUsdRate,
                product_uuid: None,
                payload: json!({ "rate": rate.to_string() }),
            },
        )
        .await
    }

    async fn contact_number(&self) -> Result<ContactNumber, SettingsError> {
        let mut tx = self.db.begin().await?;

        let stored = self.repository.get(&mut tx, CONTACT_NUMBER_KEY).await?;

        tx.commit().await?;

        let Some(value) = stored else {
            return Ok(ContactNumber::default());
        };

        Ok(value.parse().unwrap_or_else(|_invalid| {
            warn!(%value, "stored contact number is invalid, using default");

            ContactNumber::default()
        }))
    }

    async fn set_contact_number(
        &self,
        number: ContactNumber,
        actor: ActorId,
    ) -> Result<(), SettingsError> {
        self.store(
            CONTACT_NUMBER_KEY,
            number.as_str(),
            NewAuditEntry {
                actor,
                action: AuditAction::SetContact,
                product_uuid: None,
                payload: json!({ "number": number.as_str() }),
            },
        )
        .await
    }

    async fn instagram_posts(&self) -> Result<InstagramPosts, SettingsError> {
        let mut tx = self.db.begin().await?;

        let stored = self.repository.get(&mut tx, INSTAGRAM_POSTS_KEY).await?;

        tx.commit().await?;

        Ok(decode_posts(stored))
    }

    #[tracing::instrument(name = "settings.service.add_instagram_post", skip(self), err)]
    async fn add_instagram_post(
        &self,
        post: InstagramPost,
        actor: ActorId,
    ) -> Result<InstagramPosts, SettingsError> {
        let mut tx = self.db.begin().await?;
        let mut posts = self.locked_posts(&mut tx).await?;

        if posts.add(post.clone()) {
            let entry = NewAuditEntry {
                actor,
                action: AuditAction::AddInstagram,
                product_uuid: None,
                payload: json!({ "url": post.as_str() }),
            };

            let value = serde_json::to_string(&posts)?;

            self.write(&mut tx, INSTAGRAM_POSTS_KEY, &value, entry).await?;
        }

        tx.commit().await?;

        Ok(posts)
    }

    #[tracing::instrument(name = "settings.service.remove_instagram_post", skip(self), err)]
    async fn remove_instagram_post(
        &self,
        selector: &str,
        actor: ActorId,
    ) -> Result<Option<InstagramPost>, SettingsError> {
        let mut tx = self.db.begin().await?;
        let mut posts = self.locked_posts(&mut tx).await?;

        let Some(removed) = posts.remove(selector) else {
            return Ok(None);
        };

        let entry = NewAuditEntry {
            actor,
            action: AuditAction::RemoveInstagram,
            product_uuid: None,
            payload: json!({ "url": removed.as_str() }),
        };

        let value = serde_json::to_string(&posts)?;

        self.write(&mut tx, INSTAGRAM_POSTS_KEY, &value, entry).await?;

        tx.commit().await?;

        Ok(Some(removed))
    }
}

#[automock]
#[async_trait]
pub trait SettingsService: Send + Sync {
    /// Current INR per USD rate, or the default when unset.
    async fn fx_rate(&self) -> Result<FxRate, SettingsError>;

    /// Store a new rate.
    async fn set_fx_rate(&self, rate: FxRate, actor: ActorId) -> Result<(), SettingsError>;

    /// Current contact number, or the default when unset.
    async fn contact_number(&self) -> Result<ContactNumber, SettingsError>;

    /// Store a new contact number.
    async fn set_contact_number(
        &self,
        number: ContactNumber,
        actor: ActorId,
    ) -> Result<(), SettingsError>;

    /// Instagram posts featured on the catalog page, newest first.
    async fn instagram_posts(&self) -> Result<InstagramPosts, SettingsError>;

    /// Feature a post. Returns the list afterwards; adding a listed post changes nothing.
    async fn add_instagram_post(
        &self,
        post: InstagramPost,
        actor: ActorId,
    ) -> Result<InstagramPosts, SettingsError>;

    /// Stop featuring the post at a 1-based position or whose link contains
    /// `selector`. `None` when nothing matched.
    async fn remove_instagram_post(
        &self,
        selector: &str,
        actor: ActorId,
    ) -> Result<Option<InstagramPost>, SettingsError>;
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use crate::{domain::catalog::CatalogService, test::TestContext};

    use super::*;

    #[tokio::test]
    async fn defaults_apply_until_set() -> TestResult {
        let ctx = TestContext::new().await;

        assert_eq!(ctx.settings.fx_rate().await?, FxRate::default());
        assert_eq!(ctx.settings.contact_number().await?, ContactNumber::default());

        Ok(())
    }

    #[tokio::test]
    async fn set_rate_is_persisted_and_audited() -> TestResult {
        let ctx = TestContext::new().await;
        let rate: FxRate = "84.25".parse()?;

        ctx.settings.set_fx_rate(rate, ActorId(7)).await?;

        assert_eq!(ctx.settings.fx_rate().await?, rate);

        let audit = ctx.catalog.list_audit(None, 1).await?;

        assert_eq!(
            audit.first().map(|entry| entry.action),
            Some(AuditAction::SetUsdRate)
        );

        Ok(())
    }

    #[tokio::test]
    async fn instagram_posts_are_added_listed_and_removed_with_audit() -> TestResult {
        let ctx = TestContext::new().await;
        let first: InstagramPost = "https://www.instagram.com/p/AAA/".parse()?;
        let second: InstagramPost = "https://www.instagram.com/reel/BBB".parse()?;

        assert!(ctx.settings.instagram_posts().await?.is_empty());

        ctx.settings
            .add_instagram_post(first.clone(), ActorId(7))
            .await?;

        let listed = ctx.settings.add_instagram_post(second.clone(), ActorId(7)).await?;

        assert_eq!(
            listed.iter().cloned().collect::<Vec<_>>(),
            [second, first.clone()]
        );
        assert_eq!(ctx.settings.instagram_posts().await?, listed);

        let removed = ctx.settings.remove_instagram_post("2", ActorId(7)).await?;

        assert_eq!(removed, Some(first));
        assert_eq!(ctx.settings.remove_instagram_post("CCC", ActorId(7)).await?, None);
        assert_eq!(ctx.settings.instagram_posts().await?.len(), 1);

        let actions: Vec<AuditAction> = ctx
            .catalog
            .list_audit(None, 10)
            .await?
            .into_iter()
            .map(|entry| entry.action)
            .collect();

        assert_eq!(
            actions,
            [
                AuditAction::RemoveInstagram,
                AuditAction::AddInstagram,
                AuditAction::AddInstagram
            ]
        );

        Ok(())
    }

    #[tokio::test]
    async fn adding_a_featured_post_again_writes_nothing() -> TestResult {
        let ctx = TestContext::new().await;
        let post: InstagramPost = "https://www.instagram.com/p/AAA".parse()?;

        ctx.settings
            .add_instagram_post(post.clone(), ActorId(7))
            .await?;

        let listed = ctx.settings.add_instagram_post(post, ActorId(7)).await?;

        assert_eq!(listed.len(), 1);
        assert_eq!(ctx.catalog.list_audit(None, 10).await?.len(), 1);

        Ok(())
    }
}
