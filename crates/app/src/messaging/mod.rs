//! Messaging
//!
//! Outbound operator messaging. Every call is best-effort from the catalog's point of
//! view: callers log failures and never undo committed state because of them.

use async_trait::async_trait;
use mockall::automock;
use serde::Serialize;
use thiserror::Error;

pub mod notifications;
mod telegram;

pub use telegram::{TelegramConfig, TelegramGateway};

/// Chat the operator talks to the bot in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConversationId(pub i64);

/// Identifier of a sent message, used for in-place edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageRef(pub i64);

/// Inline button attached to a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Button {
    pub text: String,
    pub callback_data: String,
}

/// Rows of inline buttons.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Keyboard {
    pub inline_keyboard: Vec<Vec<Button>>,
}

impl Keyboard {
    /// Every button's callback data, in row order.
    pub fn callbacks(&self) -> impl Iterator<Item = &str> {
        self.inline_keyboard
            .iter()
            .flatten()
            .map(|button| button.callback_data.as_str())
    }
}

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Transport failure, including timeouts.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The target message no longer exists.
    #[error("message not found")]
    NotFound,

    /// The messaging API refused the call.
    #[error("messaging api error: {0}")]
    Api(String),
}

#[automock]
#[async_trait]
pub trait MessagingGateway: Send + Sync {
    /// Send a text message.
    async fn send_text(
        &self,
        conversation: ConversationId,
        text: &str,
        keyboard: Option<Keyboard>,
    ) -> Result<MessageRef, GatewayError>;

    /// Send a photo by public URL.
    async fn send_photo(
        &self,
        conversation: ConversationId,
        photo_url: &str,
        caption: Option<String>,
        keyboard: Option<Keyboard>,
    ) -> Result<MessageRef, GatewayError>;

    /// Replace the caption (and keyboard) of a sent photo.
    async fn edit_caption(
        &self,
        conversation: ConversationId,
        message: MessageRef,
        caption: &str,
        keyboard: Option<Keyboard>,
    ) -> Result<(), GatewayError>;

    /// Acknowledge a button press, optionally with a short toast.
    async fn answer_interaction(
        &self,
        interaction: &str,
        text: Option<String>,
    ) -> Result<(), GatewayError>;
}
