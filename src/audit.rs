//! Audit vocabulary

use std::{fmt, str::FromStr};

use thiserror::Error;

/// Kind of administrative mutation recorded in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuditAction {
    /// Draft created from an operator submission.
    CreateDraft,

    /// Draft published with its AI image.
    Publish,

    /// Draft published with the original photo only.
    PublishOriginalOnly,

    /// New AI image version requested.
    RegenerateAi,

    /// Draft deleted.
    Discard,

    /// Product marked sold out.
    MarkSoldOut,

    /// Product hidden.
    Hide,

    /// Product shown again.
    Unhide,

    /// Price changed.
    EditPrice,

    /// FX rate setting changed.
    SetUsdRate,

    /// Contact number setting changed.
    SetContact,

    /// Instagram post added to the catalog page.
    AddInstagram,

    /// Instagram post removed from the catalog page.
    RemoveInstagram,

    /// Background generation stored an AI image.
    AiImageReady,

    /// Background generation gave up on an AI image.
    AiImageFailed,
}

impl AuditAction {
    /// Persisted representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CreateDraft => "CREATE_DRAFT",
            Self::Publish => "PUBLISH",
            Self::PublishOriginalOnly => "PUBLISH_ORIGINAL_ONLY",
            Self::RegenerateAi => "REGENERATE_AI",
            Self::Discard => "DISCARD",
            Self::MarkSoldOut => "MARK_SOLD_OUT",
            Self::Hide => "HIDE",
            Self::Unhide => "UNHIDE",
            Self::EditPrice => "EDIT_PRICE",
            Self::SetUsdRate => "SET_USD_RATE",
            Self::SetContact => "SET_CONTACT",
            Self::AddInstagram => "ADD_INSTAGRAM",
            Self::RemoveInstagram => "REMOVE_INSTAGRAM",
            Self::AiImageReady => "AI_IMAGE_READY",
            Self::AiImageFailed => "AI_IMAGE_FAILED",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditAction {
    type Err = UnknownAuditAction;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(match value {
            "CREATE_DRAFT" => Self::CreateDraft,
            "PUBLISH" => Self::Publish,
            "PUBLISH_ORIGINAL_ONLY" => Self::PublishOriginalOnly,
            "REGENERATE_AI" => Self::RegenerateAi,
            "DISCARD" => Self::Discard,
            "MARK_SOLD_OUT" => Self::MarkSoldOut,
            "HIDE" => Self::Hide,
            "UNHIDE" => Self::Unhide,
            "EDIT_PRICE" => Self::EditPrice,
            "SET_USD_RATE" => Self::SetUsdRate,
            "SET_CONTACT" => Self::SetContact,
            "ADD_INSTAGRAM" => Self::AddInstagram,
            "REMOVE_INSTAGRAM" => Self::RemoveInstagram,
            "AI_IMAGE_READY" => Self::AiImageReady,
            "AI_IMAGE_FAILED" => Self::AiImageFailed,
            other => return Err(UnknownAuditAction(other.to_owned())),
        })
    }
}

/// Raised when a persisted action string is not a known [`AuditAction`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown audit action `{0}`")]
pub struct UnknownAuditAction(pub String);
