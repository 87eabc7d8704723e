//! Lifecycle walk-throughs across the domain core.

use boutique::{
    audit::AuditAction,
    caption::parse_caption,
    images::{self, ImageKind, ImageStatus, VersionedImage},
    products::{DressCode, ProductStatus, Transition},
};
use testresult::TestResult;

#[derive(Debug, Clone)]
struct Image {
    kind: ImageKind,
    version: u32,
    status: ImageStatus,
}

impl VersionedImage for Image {
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

fn new_draft() -> Vec<Image> {
    vec![
        Image {
            kind: ImageKind::Original,
            version: 1,
            status: ImageStatus::Ready,
        },
        Image {
            kind: ImageKind::AiGenerated,
            version: 1,
            status: ImageStatus::Pending,
        },
    ]
}

#[test]
fn failed_versions_are_skipped_by_regenerate() -> TestResult {
    let mut set = new_draft();

    if let Some(v1) = set.iter_mut().find(|image| image.kind == ImageKind::AiGenerated) {
        v1.status = ImageStatus::Failed;
    }

    let status = ProductStatus::Draft
        .apply(Transition::Regenerate)?
        .ok_or("regenerate removed the product")?;

    assert_eq!(status, ProductStatus::Draft);

    let next = images::next_ai_version(&set);

    assert_eq!(next, 2);

    set.push(Image {
        kind: ImageKind::AiGenerated,
        version: next,
        status: ImageStatus::Pending,
    });

    assert!(images::ai_versions_contiguous(&set));
    assert!(images::current_ai(&set).is_none());

    Ok(())
}

#[test]
fn published_product_walks_through_visibility_states() -> TestResult {
    let mut status = ProductStatus::Draft;

    for transition in [
        Transition::ApprovePublish,
        Transition::Hide,
        Transition::Unhide,
        Transition::EditPrice,
        Transition::MarkSoldOut,
        Transition::EditPrice,
    ] {
        status = status.apply(transition)?.ok_or("product removed")?;
    }

    assert_eq!(status, ProductStatus::SoldOut);

    Ok(())
}

#[test]
fn rejected_transitions_leave_status_untouched() {
    let status = ProductStatus::Published;

    for transition in [
        Transition::ApprovePublish,
        Transition::PublishOriginal,
        Transition::Discard,
        Transition::Regenerate,
        Transition::Unhide,
    ] {
        let result = status.apply(transition);

        assert!(
            result.is_err(),
            "expected {transition:?} to be rejected from PUBLISHED, got {result:?}"
        );
    }
}

#[test]
fn every_transition_maps_to_an_audit_action() {
    let actions: Vec<AuditAction> = [
        Transition::ApprovePublish,
        Transition::PublishOriginal,
        Transition::Discard,
        Transition::Regenerate,
        Transition::MarkSoldOut,
        Transition::Hide,
        Transition::Unhide,
        Transition::EditPrice,
    ]
    .into_iter()
    .map(Transition::audit_action)
    .collect();

    assert_eq!(actions.len(), 8);
    assert!(!actions.contains(&AuditAction::CreateDraft));
}

#[test]
fn caption_to_code_round_trip() -> TestResult {
    let metadata = parse_caption("Title: Red Saree\nPrice: 125")?;
    let code = DressCode::from_sequence(1042);

    assert_eq!(metadata.price.minor_units(), 12_500);
    assert_eq!(code.to_string(), "D-1042");
    assert_eq!(DressCode::find_in(&format!("/editprice {code} 150")), Some(code));

    Ok(())
}
