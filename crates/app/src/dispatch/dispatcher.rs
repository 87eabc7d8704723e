//! Dispatcher

use std::sync::Arc;

use boutique::{caption::parse_caption, pricing::format_inr, products::ProductStatus};
use rustc_hash::FxHashSet;
use tracing::{debug, info, warn};

use crate::{
    dispatch::{DispatchError, Dispatched, Inbound, parse::Command},
    domain::{
        audit::records::ActorId,
        catalog::{CatalogService, records::ProductRecord},
        lifecycle::{Decision, LifecycleService, data::DraftSubmission},
        settings::SettingsService,
    },
    messaging::{
        ConversationId, GatewayError, MessagingGateway,
        notifications::{PreviewAction, PreviewCallback},
    },
};

pub const HELP_TEXT: &str = "Boutique Admin Bot\n\
\n\
Upload a dress: send a photo with this caption:\n\
  Title: Red Banarasi Saree\n\
  Price: 12500\n\
  Category: saree, silk\n\
  Tags: bridal, festive\n\
  Size: S, M, L\n\
\n\
Commands:\n\
  /soldout D-1042: mark as sold out\n\
  /hide D-1042: hide from catalog\n\
  /unhide D-1042: show in catalog again\n\
  /editprice D-1042 15000: change price\n\
  /setrate 83.5: set the USD rate\n\
  /setwhatsapp 919876543210: set the contact number\n\
  /addinsta <url>: feature an Instagram post\n\
  /removeinsta 1: stop featuring a post\n\
  /listinsta: list featured posts\n\
  /stats: product counts\n\
  /help: this message";

pub const CAPTION_FORMAT_TEXT: &str = "Please include a caption with the photo:\n\
\n\
Title: Red Banarasi Saree\n\
Price: 12500\n\
Category: saree, silk\n\
Tags: bridal, festive";

const CAPTION_REQUIRED_TEXT: &str = "Caption must include at least Title and Price.";

const UNSUPPORTED_IMAGE_TEXT: &str =
    "Image error: unsupported format. Send a JPEG, PNG or WebP photo.";

/// Routes authenticated operator input to the lifecycle controller and settings.
#[derive(Clone)]
pub struct Dispatcher {
    admins: FxHashSet<ActorId>,
    lifecycle: Arc<dyn LifecycleService>,
    catalog: Arc<dyn CatalogService>,
    settings: Arc<dyn SettingsService>,
    gateway: Arc<dyn MessagingGateway>,
}

impl Dispatcher {
    #[must_use]
    pub fn new(
        admins: impl IntoIterator<Item = ActorId>,
        lifecycle: Arc<dyn LifecycleService>,
        catalog: Arc<dyn CatalogService>,
        settings: Arc<dyn SettingsService>,
        gateway: Arc<dyn MessagingGateway>,
    ) -> Self {
        Self {
            admins: admins.into_iter().collect(),
            lifecycle,
            catalog,
            settings,
            gateway,
        }
    }

    /// Handle one inbound operator action.
    ///
    /// Input from actors outside the allowlist is acknowledged as [`Dispatched::Ignored`]
    /// without any reply or state change.
    ///
    /// # Errors
    ///
    /// Returns an error when an infrastructure dependency fails. Validation failures
    /// and rejected transitions are answered to the operator instead.
    #[tracing::instrument(
        name = "dispatch.inbound",
        skip(self, inbound),
        fields(actor = %inbound.actor(), kind = inbound.kind()),
        err
    )]
    pub async fn dispatch(&self, inbound: Inbound) -> Result<Dispatched, DispatchError> {
        let actor = inbound.actor();

        if !self.admins.contains(&actor) {
            info!("rejected input from non-admin actor");

            return Ok(Dispatched::Ignored);
        }

        match inbound {
            Inbound::Photo {
                conversation,
                caption,
                bytes,
                ..
            } => self.photo(actor, conversation, caption, bytes).await?,
            Inbound::Text {
                conversation, text, ..
            } => self.text(actor, conversation, &text).await?,
            Inbound::Interaction {
                conversation,
                id,
                data,
                ..
            } => self.interaction(actor, conversation, &id, &data).await?,
        }

        Ok(Dispatched::Handled)
    }

    async fn photo(
        &self,
        actor: ActorId,
        conversation: ConversationId,
        caption: Option<String>,
        bytes: Vec<u8>,
    ) -> Result<(), DispatchError> {
        let Some(caption) = caption.filter(|caption| !caption.trim().is_empty()) else {
            self.reply(conversation, CAPTION_FORMAT_TEXT).await;

            return Ok(());
        };

        let metadata = match parse_caption(&caption) {
            Ok(metadata) => metadata,
            Err(error) => {
                debug!(%error, "caption rejected");

                self.reply(conversation, CAPTION_REQUIRED_TEXT).await;

                return Ok(());
            }
        };

        let decision = self
            .lifecycle
            .submit_draft(DraftSubmission {
                metadata,
                original: bytes,
                conversation: Some(conversation),
                actor,
            })
            .await?;

        match decision {
            Decision::Applied(submitted) => {
                let product = &submitted.product.product;

                let text = format!(
                    "Draft {} created: {}\nGenerating the AI preview...",
                    product.code, product.title
                );

                self.reply(conversation, &text).await;
            }
            Decision::Rejected(_) => self.reply(conversation, UNSUPPORTED_IMAGE_TEXT).await,
        }

        Ok(())
    }

    async fn text(
        &self,
        actor: ActorId,
        conversation: ConversationId,
        text: &str,
    ) -> Result<(), DispatchError> {
        if text.trim().is_empty() {
            return Ok(());
        }

        let command = match text.parse::<Command>() {
            Ok(command) => command,
            Err(error) => {
                debug!(%error, "command rejected");

                self.reply(conversation, &error.to_string()).await;

                return Ok(());
            }
        };

        let reply = match command {
            Command::SoldOut(code) => status_reply(
                self.lifecycle.mark_sold_out(code.into(), actor).await?,
                |product| format!("{} marked as SOLD OUT", product.code),
                format!("{code} not found or not in a valid state."),
            ),
            Command::Hide(code) => status_reply(
                self.lifecycle.hide(code.into(), actor).await?,
                |product| format!("{} hidden from catalog", product.code),
                format!("{code} not found or not PUBLISHED."),
            ),
            Command::Unhide(code) => status_reply(
                self.lifecycle.unhide(code.into(), actor).await?,
                |product| format!("{} is now visible again", product.code),
                format!("{code} not found or not HIDDEN."),
            ),
            Command::EditPrice(code, price) => {
                match self.lifecycle.edit_price(code.into(), price, actor).await? {
                    Decision::Applied(edited) => format!(
                        "{} price updated to {}",
                        edited.product.code,
                        format_inr(edited.new)
                    ),
                    Decision::Rejected(_) => format!("{code} not found."),
                }
            }
            Command::SetRate(rate) => {
                self.settings.set_fx_rate(rate, actor).await?;

                format!("USD rate set to {rate}")
            }
            Command::SetContact(number) => {
                let reply = format!("WhatsApp number set to {number}");

                self.settings.set_contact_number(number, actor).await?;

                reply
            }
            Command::AddInstagram(post) => {
                let posts = self.settings.add_instagram_post(post, actor).await?;

                format!("Instagram post added ({} total on catalog).", posts.len())
            }
            Command::RemoveInstagram(selector) => {
                match self.settings.remove_instagram_post(&selector, actor).await? {
                    Some(removed) => format!("Removed: {removed}"),
                    None => "Post not found. Use /listinsta to see current posts.".to_string(),
                }
            }
            Command::ListInstagram => self.instagram_posts().await?,
            Command::Stats => self.stats().await?,
            Command::Help => HELP_TEXT.to_string(),
        };

        self.reply(conversation, &reply).await;

        Ok(())
    }

    async fn instagram_posts(&self) -> Result<String, DispatchError> {
        let posts = self.settings.instagram_posts().await?;

        if posts.is_empty() {
            return Ok("No Instagram posts on catalog.\nAdd with: /addinsta <url>".to_string());
        }

        let mut lines = vec![format!("Instagram posts ({}):", posts.len())];

        lines.extend(
            (1..)
                .zip(posts.iter())
                .map(|(position, post)| format!("  {position}. {post}")),
        );
        lines.push("\nRemove with: /removeinsta <number>".to_string());

        Ok(lines.join("\n"))
    }

    async fn stats(&self) -> Result<String, DispatchError> {
        let mut counts = self.catalog.status_counts().await?;

        counts.retain(|(_, count)| *count > 0);

        if counts.is_empty() {
            return Ok("No products yet.".to_string());
        }

        counts.sort_by_key(|(status, _)| {
            ProductStatus::ALL
                .iter()
                .position(|known| known == status)
        });

        let total: u64 = counts.iter().map(|(_, count)| count).sum();

        let mut lines = vec!["Catalog Stats".to_string()];

        lines.extend(
            counts
                .iter()
                .map(|(status, count)| format!("  {status}: {count}")),
        );
        lines.push(format!("  Total: {total}"));

        Ok(lines.join("\n"))
    }

    async fn interaction(
        &self,
        actor: ActorId,
        conversation: ConversationId,
        id: &str,
        data: &str,
    ) -> Result<(), DispatchError> {
        let callback = match data.parse::<PreviewCallback>() {
            Ok(callback) => callback,
            Err(error) => {
                debug!(%error, data, "callback rejected");

                self.answer(id, &error.to_string()).await;

                return Ok(());
            }
        };

        let Some(current) = self.catalog.find_product(callback.product.into()).await? else {
            self.answer(id, "Product not found").await;

            return Ok(());
        };

        let product = current.product;

        let (caption, answer) = match callback.action {
            PreviewAction::Approve => {
                match self.lifecycle.approve(product.uuid, actor).await? {
                    Decision::Applied(published) => (
                        Some(format!("PUBLISHED: {} - {}", published.code, published.title)),
                        format!("{} published!", published.code),
                    ),
                    Decision::Rejected(_) => (None, "Not in DRAFT state".to_string()),
                }
            }
            PreviewAction::Regenerate => {
                match self.lifecycle.regenerate(product.uuid, actor).await? {
                    Decision::Applied(regenerated) => {
                        let version = regenerated.image.version;

                        (
                            Some(format!(
                                "Regenerating AI v{version} for {}...",
                                regenerated.product.code
                            )),
                            format!("Regenerating v{version}..."),
                        )
                    }
                    Decision::Rejected(_) => (None, "Not in DRAFT state".to_string()),
                }
            }
            PreviewAction::PublishOriginal => {
                match self.lifecycle.publish_original(product.uuid, actor).await? {
                    Decision::Applied(published) => (
                        Some(format!("PUBLISHED (original): {}", published.code)),
                        format!("{} published with original!", published.code),
                    ),
                    Decision::Rejected(_) => (None, "Not in DRAFT state".to_string()),
                }
            }
            PreviewAction::Discard => match self.lifecycle.discard(product.uuid, actor).await? {
                Decision::Applied(discarded) => (
                    Some(format!("DISCARDED: {}", discarded.product.code)),
                    format!("{} discarded", discarded.product.code),
                ),
                Decision::Rejected(_) => (None, "Not in DRAFT state".to_string()),
            },
            PreviewAction::EditMetadata => {
                let target = product.conversation.unwrap_or(conversation);

                let text = format!(
                    "To edit {code}, send:\n  /editprice {code} <new_price>",
                    code = product.code
                );

                self.reply(target, &text).await;

                (None, "Send edit commands".to_string())
            }
        };

        if let Some(caption) = caption {
            self.edit_preview(&product, &caption).await;
        }

        self.answer(id, &answer).await;

        Ok(())
    }

    /// Rewrite the preview caption and drop its buttons.
    async fn edit_preview(&self, product: &ProductRecord, caption: &str) {
        let (Some(conversation), Some(message)) = (product.conversation, product.preview_message)
        else {
            debug!(product = %product.code, "no preview message to edit");

            return;
        };

        match self
            .gateway
            .edit_caption(conversation, message, caption, None)
            .await
        {
            Ok(()) => {}
            Err(GatewayError::NotFound) => {
                debug!(product = %product.code, "preview message no longer exists");
            }
            Err(error) => warn!(product = %product.code, %error, "failed to edit preview"),
        }
    }

    async fn reply(&self, conversation: ConversationId, text: &str) {
        if let Err(error) = self.gateway.send_text(conversation, text, None).await {
            warn!(conversation = conversation.0, %error, "failed to send reply");
        }
    }

    async fn answer(&self, id: &str, text: &str) {
        if let Err(error) = self
            .gateway
            .answer_interaction(id, Some(text.to_string()))
            .await
        {
            warn!(interaction = id, %error, "failed to answer interaction");
        }
    }
}

fn status_reply(
    decision: Decision<ProductRecord>,
    applied: impl FnOnce(&ProductRecord) -> String,
    rejected: String,
) -> String {
    match decision {
        Decision::Applied(product) => applied(&product),
        Decision::Rejected(_) => rejected,
    }
}
