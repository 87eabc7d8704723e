//! Lifecycle Data

use boutique::{caption::DraftMetadata, products::Price};

use crate::{
    domain::{
        audit::records::ActorId,
        catalog::records::{ImageRecord, ProductAggregate, ProductRecord},
    },
    jobs::GenerationJob,
    messaging::ConversationId,
};

/// A new photo plus parsed caption from the operator.
#[derive(Debug, Clone, PartialEq)]
pub struct DraftSubmission {
    pub metadata: DraftMetadata,
    pub original: Vec<u8>,
    pub conversation: Option<ConversationId>,
    pub actor: ActorId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubmittedDraft {
    pub product: ProductAggregate,
    pub job: GenerationJob,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Discarded {
    pub product: ProductRecord,
    pub storage_keys: Vec<String>,

    /// Objects removed from the image store; purging is best-effort.
    pub purged: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Regenerated {
    pub product: ProductRecord,
    pub image: ImageRecord,
    pub job: GenerationJob,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PriceEdited {
    pub product: ProductRecord,
    pub old: Price,
    pub new: Price,
}
