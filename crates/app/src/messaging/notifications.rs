//! Operator notifications
//!
//! Captions and inline keyboards shown to the operator around a draft, and the
//! callback vocabulary those keyboards carry (`<action>:<product-uuid>`).

use std::{fmt, str::FromStr};

use boutique::{
    pricing::{FxRate, format_inr, usd_estimate},
    products::DressCode,
};
use thiserror::Error;

use crate::{
    domain::catalog::records::{ProductRecord, ProductUuid},
    messaging::{Button, Keyboard},
};

/// Button actions offered on a draft preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PreviewAction {
    Approve,
    Regenerate,
    EditMetadata,
    PublishOriginal,
    Discard,
}

impl PreviewAction {
    /// Callback prefix for the action.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Regenerate => "regen",
            Self::EditMetadata => "edit_meta",
            Self::PublishOriginal => "pub_orig",
            Self::Discard => "discard",
        }
    }

    const fn label(self) -> &'static str {
        match self {
            Self::Approve => "Approve & Publish",
            Self::Regenerate => "Regenerate",
            Self::EditMetadata => "Edit Metadata",
            Self::PublishOriginal => "Publish Original Only",
            Self::Discard => "Discard Draft",
        }
    }

    fn button(self, product: ProductUuid) -> Button {
        self.button_labelled(self.label(), product)
    }

    fn button_labelled(self, label: &str, product: ProductUuid) -> Button {
        Button {
            text: label.to_string(),
            callback_data: PreviewCallback {
                action: self,
                product,
            }
            .to_string(),
        }
    }
}

impl FromStr for PreviewAction {
    type Err = CallbackError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "approve" => Ok(Self::Approve),
            "regen" => Ok(Self::Regenerate),
            "edit_meta" => Ok(Self::EditMetadata),
            "pub_orig" => Ok(Self::PublishOriginal),
            "discard" => Ok(Self::Discard),
            _ => Err(CallbackError::UnknownAction),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CallbackError {
    #[error("Invalid action")]
    Malformed,

    #[error("Invalid product ID")]
    InvalidProduct,

    #[error("Unknown action")]
    UnknownAction,
}

/// Parsed callback data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreviewCallback {
    pub action: PreviewAction,
    pub product: ProductUuid,
}

impl fmt::Display for PreviewCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.action.prefix(), self.product)
    }
}

impl FromStr for PreviewCallback {
    type Err = CallbackError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (action, product) = value.split_once(':').ok_or(CallbackError::Malformed)?;
        let product = product
            .parse()
            .map_err(|_uuid| CallbackError::InvalidProduct)?;
        let action = action.parse()?;

        Ok(Self { action, product })
    }
}

/// Keyboard attached to a fresh AI preview.
#[must_use]
pub fn approval_keyboard(product: ProductUuid) -> Keyboard {
    Keyboard {
        inline_keyboard: vec![
            vec![
                PreviewAction::Approve.button(product),
                PreviewAction::Regenerate.button(product),
            ],
            vec![
                PreviewAction::EditMetadata.button(product),
                PreviewAction::PublishOriginal.button(product),
            ],
            vec![PreviewAction::Discard.button(product)],
        ],
    }
}

/// Keyboard offered when generation gave up.
#[must_use]
pub fn fallback_keyboard(product: ProductUuid) -> Keyboard {
    Keyboard {
        inline_keyboard: vec![
            vec![
                PreviewAction::PublishOriginal.button(product),
                PreviewAction::Regenerate.button_labelled("Retry AI", product),
            ],
            vec![PreviewAction::Discard.button(product)],
        ],
    }
}

/// Caption for the AI preview photo.
#[must_use]
pub fn preview_caption(product: &ProductRecord, ai_version: u32, rate: FxRate) -> String {
    let mut lines = vec![
        format!("{}: {}", product.code, product.title),
        format!(
            "Price: {} (~${})",
            format_inr(product.price),
            usd_estimate(product.price, rate)
        ),
    ];

    if !product.categories.is_empty() {
        lines.push(format!("Categories: {}", product.categories.join(", ")));
    }

    if !product.tags.is_empty() {
        lines.push(format!("Tags: {}", product.tags.join(", ")));
    }

    lines.push(format!("AI: v{ai_version}"));

    lines.join("\n")
}

/// Caption for the original photo sent ahead of the preview.
#[must_use]
pub fn original_caption(code: DressCode) -> String {
    format!("Original: {code}")
}

/// Text sent when generation gave up for good.
#[must_use]
pub fn generation_failed_text(code: DressCode, reason: &str) -> String {
    format!("AI generation failed for {code}: {reason}\nChoose how to continue:")
}
