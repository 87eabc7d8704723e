//! Test Helpers

use boutique::{
    images::{ImageKind, ImageStatus, ai_storage_key, original_storage_key},
    products::{DressCode, Price, ProductStatus},
};
use jiff::Timestamp;

use crate::{
    domain::catalog::records::{
        ImageRecord, ImageUuid, ProductAggregate, ProductRecord, ProductUuid,
    },
    messaging::ConversationId,
};

/// Conversation every fixture product was submitted from.
pub(crate) const CONVERSATION: ConversationId = ConversationId(42);

pub(crate) fn product(code: u64, status: ProductStatus) -> ProductRecord {
    ProductRecord {
        uuid: ProductUuid::new(),
        code: DressCode::from_sequence(code),
        title: "Red Banarasi Saree".to_string(),
        description: String::new(),
        categories: vec!["saree".to_string()],
        tags: vec!["silk".to_string()],
        price: Price::from_major(12_500).expect("positive price"),
        status,
        conversation: Some(CONVERSATION),
        preview_message: None,
        created_at: Timestamp::UNIX_EPOCH,
        updated_at: Timestamp::UNIX_EPOCH,
    }
}

pub(crate) fn image(
    product: ProductUuid,
    kind: ImageKind,
    version: u32,
    status: ImageStatus,
) -> ImageRecord {
    let uuid = ImageUuid::new();

    ImageRecord {
        uuid,
        product_uuid: product,
        kind,
        version,
        storage_key: match kind {
            ImageKind::Original => original_storage_key(&product),
            ImageKind::AiGenerated => ai_storage_key(&product, version),
        },
        url: (status == ImageStatus::Ready).then(|| format!("https://shop.example/img/{uuid}")),
        status,
        created_at: Timestamp::UNIX_EPOCH,
        updated_at: Timestamp::UNIX_EPOCH,
    }
}

/// A product with its original and the given AI image statuses, versions from 1.
pub(crate) fn aggregate(product: ProductRecord, ai: &[ImageStatus]) -> ProductAggregate {
    let mut images = vec![image(product.uuid, ImageKind::Original, 1, ImageStatus::Ready)];

    for (version, status) in (1..).zip(ai) {
        images.push(image(product.uuid, ImageKind::AiGenerated, version, *status));
    }

    ProductAggregate {
        product,
        images,
        variants: Vec::new(),
    }
}
