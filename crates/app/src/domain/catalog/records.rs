//! Catalog Records

use boutique::{
    images::{self, ImageKind, ImageStatus, VersionedImage},
    products::{DressCode, Price, ProductStatus},
};
use jiff::Timestamp;

use crate::{
    messaging::{ConversationId, MessageRef},
    uuids::TypedUuid,
};

/// Product UUID
pub type ProductUuid = TypedUuid<ProductRecord>;

/// Image UUID
pub type ImageUuid = TypedUuid<ImageRecord>;

/// Variant Option UUID
pub type VariantUuid = TypedUuid<VariantRecord>;

/// Product Record
#[derive(Debug, Clone, PartialEq)]
pub struct ProductRecord {
    pub uuid: ProductUuid,
    pub code: DressCode,
    pub title: String,
    pub description: String,
    pub categories: Vec<String>,
    pub tags: Vec<String>,
    pub price: Price,
    pub status: ProductStatus,
    pub conversation: Option<ConversationId>,
    pub preview_message: Option<MessageRef>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Image Record
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRecord {
    pub uuid: ImageUuid,
    pub product_uuid: ProductUuid,
    pub kind: ImageKind,
    pub version: u32,
    pub storage_key: String,
    pub url: Option<String>,
    pub status: ImageStatus,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl VersionedImage for ImageRecord {
    fn kind(&self) -> ImageKind {
        self.kind
    }

    fn version(&self) -> u32 {
        self.version
    }

    fn status(&self) -> ImageStatus {
        self.status
    }
}

/// Variant Option Record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantRecord {
    pub uuid: VariantUuid,
    pub kind: String,
    pub value: String,
    pub sort_order: i32,
}

/// A product loaded together with its images and variant options.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductAggregate {
    pub product: ProductRecord,
    pub images: Vec<ImageRecord>,
    pub variants: Vec<VariantRecord>,
}

impl ProductAggregate {
    /// The original photo.
    #[must_use]
    pub fn original_image(&self) -> Option<&ImageRecord> {
        images::original(&self.images)
    }

    /// The highest-versioned `READY` AI image.
    #[must_use]
    pub fn current_ai_image(&self) -> Option<&ImageRecord> {
        images::current_ai(&self.images)
    }

    /// The most recently allocated AI image, in any status.
    #[must_use]
    pub fn latest_ai_image(&self) -> Option<&ImageRecord> {
        images::latest_ai(&self.images)
    }

    /// Version the next regenerate will allocate.
    #[must_use]
    pub fn next_ai_version(&self) -> u32 {
        images::next_ai_version(&self.images)
    }
}

/// A product reference as operators give it: by id (buttons) or by code (commands).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductRef {
    Uuid(ProductUuid),
    Code(DressCode),
}

impl From<ProductUuid> for ProductRef {
    fn from(value: ProductUuid) -> Self {
        Self::Uuid(value)
    }
}

impl From<DressCode> for ProductRef {
    fn from(value: DressCode) -> Self {
        Self::Code(value)
    }
}
