//! Command Dispatch
//!
//! Inbound operator input from the messaging channel, checked against the admin
//! allowlist before anything reaches the lifecycle controller.

use thiserror::Error;

use crate::{
    domain::{
        audit::records::ActorId, catalog::CatalogError, lifecycle::LifecycleError,
        settings::SettingsError,
    },
    messaging::ConversationId,
};

mod dispatcher;
pub mod parse;

pub use dispatcher::{CAPTION_FORMAT_TEXT, Dispatcher, HELP_TEXT};

/// One authenticated action from the messaging channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A photo, with the caption holding the product metadata.
    Photo {
        actor: ActorId,
        conversation: ConversationId,
        caption: Option<String>,
        bytes: Vec<u8>,
    },

    /// A text message, usually a slash command.
    Text {
        actor: ActorId,
        conversation: ConversationId,
        text: String,
    },

    /// A press on an inline button.
    Interaction {
        actor: ActorId,
        conversation: ConversationId,
        id: String,
        data: String,
    },
}

impl Inbound {
    #[must_use]
    pub const fn actor(&self) -> ActorId {
        match self {
            Self::Photo { actor, .. }
            | Self::Text { actor, .. }
            | Self::Interaction { actor, .. } => *actor,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Photo { .. } => "photo",
            Self::Text { .. } => "text",
            Self::Interaction { .. } => "interaction",
        }
    }
}

/// What happened to an inbound action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatched {
    /// Processed and answered.
    Handled,

    /// Dropped: the actor is not an admin.
    Ignored,
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Settings(#[from] SettingsError),
}
