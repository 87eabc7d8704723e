//! Catalog Data

use boutique::{
    caption::DraftMetadata,
    products::{Price, Transition},
};
use serde_json::Value;

use crate::{
    domain::{
        audit::records::ActorId,
        catalog::records::{ImageRecord, ImageUuid, ProductUuid},
    },
    messaging::ConversationId,
};

/// New Draft Data
#[derive(Debug, Clone, PartialEq)]
pub struct NewDraft {
    pub uuid: ProductUuid,
    pub metadata: DraftMetadata,
    pub conversation: Option<ConversationId>,
    pub actor: ActorId,
    pub original_image: ImageUuid,
    pub original_url: String,
    pub ai_image: ImageUuid,
}

/// A pure status change, applied only if the product is in one of the transition's
/// source statuses.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusChange {
    pub product: ProductUuid,
    pub transition: Transition,
    pub actor: ActorId,
    pub payload: Value,
}

/// Price Change Data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceChange {
    pub product: ProductUuid,
    pub price: Price,
    pub actor: ActorId,
}

/// Result of a committed price change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceChanged {
    pub old: Price,
    pub new: Price,
}

/// A freshly allocated `PENDING` AI image and the original it derives from.
#[derive(Debug, Clone, PartialEq)]
pub struct AllocatedImage {
    pub image: ImageRecord,
    pub source_storage_key: String,
}
