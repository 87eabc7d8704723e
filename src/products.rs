//! Products
//!
//! Product identity, price and the lifecycle state machine. Every status change a
//! product can undergo is a [`Transition`]; a transition is only legal from the
//! statuses returned by [`Transition::sources`] and is never "corrected" into a
//! different one.

use std::{fmt, num::NonZeroU64, str::FromStr};

use thiserror::Error;

use crate::audit::AuditAction;

/// Product lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProductStatus {
    /// Not yet visible to shoppers, pending operator approval.
    Draft,

    /// Visible in the public catalog.
    Published,

    /// Temporarily removed from the public catalog.
    Hidden,

    /// Visible but no longer purchasable.
    SoldOut,
}

impl ProductStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [Self; 4] = [Self::Draft, Self::Published, Self::Hidden, Self::SoldOut];

    /// Persisted representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Published => "PUBLISHED",
            Self::Hidden => "HIDDEN",
            Self::SoldOut => "SOLD_OUT",
        }
    }

    /// Whether shoppers can see the product.
    #[must_use]
    pub const fn is_visible(self) -> bool {
        matches!(self, Self::Published)
    }

    /// Apply `transition` to this status.
    ///
    /// Returns `Ok(None)` when the transition removes the product (discard).
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] when the transition is not legal from this status.
    pub fn apply(self, transition: Transition) -> Result<Option<Self>, TransitionError> {
        if !transition.permits(self) {
            return Err(TransitionError {
                transition,
                from: self,
            });
        }

        Ok(transition.target(self))
    }
}

impl fmt::Display for ProductStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProductStatus {
    type Err = UnknownStatus;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "DRAFT" => Ok(Self::Draft),
            "PUBLISHED" => Ok(Self::Published),
            "HIDDEN" => Ok(Self::Hidden),
            "SOLD_OUT" => Ok(Self::SoldOut),
            other => Err(UnknownStatus(other.to_owned())),
        }
    }
}

/// Raised when a persisted status string is not a known [`ProductStatus`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown product status `{0}`")]
pub struct UnknownStatus(pub String);

/// Operator-driven product transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transition {
    /// Publish a draft, recording which AI image version shipped.
    ApprovePublish,

    /// Publish a draft with only its original photo.
    PublishOriginal,

    /// Delete a draft and its images.
    Discard,

    /// Request a new AI image version for a draft.
    Regenerate,

    /// Mark a listed product as sold out.
    MarkSoldOut,

    /// Hide a published product.
    Hide,

    /// Show a hidden product again.
    Unhide,

    /// Change the price in place.
    EditPrice,
}

impl Transition {
    /// Statuses this transition may start from.
    #[must_use]
    pub const fn sources(self) -> &'static [ProductStatus] {
        match self {
            Self::ApprovePublish | Self::PublishOriginal | Self::Discard | Self::Regenerate => {
                &[ProductStatus::Draft]
            }
            Self::MarkSoldOut => &[ProductStatus::Published, ProductStatus::Hidden],
            Self::Hide => &[ProductStatus::Published],
            Self::Unhide => &[ProductStatus::Hidden],
            Self::EditPrice => &ProductStatus::ALL,
        }
    }

    /// Whether this transition may start from `from`.
    #[must_use]
    pub fn permits(self, from: ProductStatus) -> bool {
        self.sources().contains(&from)
    }

    /// Status after the transition, or `None` when the product is removed.
    #[must_use]
    pub const fn target(self, from: ProductStatus) -> Option<ProductStatus> {
        match self {
            Self::Discard => None,
            Self::Regenerate | Self::EditPrice => Some(from),
            Self::ApprovePublish
            | Self::PublishOriginal
            | Self::Unhide
            | Self::MarkSoldOut
            | Self::Hide => self.fixed_target(),
        }
    }

    /// The status a pure status-change transition moves to.
    ///
    /// `None` for transitions that keep the status or remove the product.
    #[must_use]
    pub const fn fixed_target(self) -> Option<ProductStatus> {
        match self {
            Self::ApprovePublish | Self::PublishOriginal | Self::Unhide => {
                Some(ProductStatus::Published)
            }
            Self::MarkSoldOut => Some(ProductStatus::SoldOut),
            Self::Hide => Some(ProductStatus::Hidden),
            Self::Discard | Self::Regenerate | Self::EditPrice => None,
        }
    }

    /// Audit action recorded when this transition commits.
    #[must_use]
    pub const fn audit_action(self) -> AuditAction {
        match self {
            Self::ApprovePublish => AuditAction::Publish,
            Self::PublishOriginal => AuditAction::PublishOriginalOnly,
            Self::Discard => AuditAction::Discard,
            Self::Regenerate => AuditAction::RegenerateAi,
            Self::MarkSoldOut => AuditAction::MarkSoldOut,
            Self::Hide => AuditAction::Hide,
            Self::Unhide => AuditAction::Unhide,
            Self::EditPrice => AuditAction::EditPrice,
        }
    }
}

/// A transition attempted from a status it does not permit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{transition:?} is not permitted from {from}")]
pub struct TransitionError {
    /// Attempted transition.
    pub transition: Transition,

    /// Status the product was in.
    pub from: ProductStatus,
}

/// Human-facing sequential product code, rendered as `D-<n>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DressCode(u64);

impl DressCode {
    /// Code prefix.
    pub const PREFIX: &'static str = "D-";

    /// Build a code from an allocated sequence value.
    #[must_use]
    pub const fn from_sequence(value: u64) -> Self {
        Self(value)
    }

    /// The underlying sequence value.
    #[must_use]
    pub const fn sequence(self) -> u64 {
        self.0
    }

    /// Find the first `D-<n>` code anywhere in `text`, case-insensitively.
    #[must_use]
    pub fn find_in(text: &str) -> Option<Self> {
        text.split(|c: char| !(c.is_ascii_alphanumeric() || c == '-'))
            .find_map(|word| word.parse().ok())
    }
}

impl fmt::Display for DressCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", Self::PREFIX, self.0)
    }
}

impl FromStr for DressCode {
    type Err = DressCodeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();

        let digits = value
            .strip_prefix(Self::PREFIX)
            .or_else(|| value.strip_prefix("d-"))
            .ok_or(DressCodeError)?;

        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(DressCodeError);
        }

        digits.parse().map(Self).map_err(|_parse| DressCodeError)
    }
}

/// Raised when text is not a `D-<n>` code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("expected a code like D-1042")]
pub struct DressCodeError;

/// A strictly positive price in minor currency units (paise).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Price(NonZeroU64);

impl Price {
    /// Minor units per major unit.
    pub const MINOR_PER_MAJOR: u64 = 100;

    /// Build a price from minor units.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::NotPositive`] for zero.
    pub fn from_minor(minor: u64) -> Result<Self, PriceError> {
        NonZeroU64::new(minor).map(Self).ok_or(PriceError::NotPositive)
    }

    /// Build a price from whole major units (rupees).
    ///
    /// # Errors
    ///
    /// Returns [`PriceError`] for zero or when the minor amount overflows.
    pub fn from_major(major: u64) -> Result<Self, PriceError> {
        let minor = major
            .checked_mul(Self::MINOR_PER_MAJOR)
            .ok_or(PriceError::Overflow)?;

        Self::from_minor(minor)
    }

    /// Amount in minor units.
    #[must_use]
    pub const fn minor_units(self) -> u64 {
        self.0.get()
    }
}

/// Price construction errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PriceError {
    /// Price was zero.
    #[error("price must be a positive amount")]
    NotPositive,

    /// Price does not fit in minor units.
    #[error("price is too large")]
    Overflow,
}
