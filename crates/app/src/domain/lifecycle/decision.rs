//! Controller decisions.

/// Why a requested transition was not applied. Nothing is written when rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Unknown product, or a product whose status does not permit the transition.
    NotFoundOrInvalidState,

    /// The submitted photo is not a supported image.
    UnsupportedImage,
}

/// Result of an operator action that passed infrastructure checks.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision<T> {
    Applied(T),
    Rejected(Rejection),
}

impl<T> Decision<T> {
    pub(crate) const fn not_found() -> Self {
        Self::Rejected(Rejection::NotFoundOrInvalidState)
    }

    /// The applied value, if any.
    pub fn applied(self) -> Option<T> {
        match self {
            Self::Applied(value) => Some(value),
            Self::Rejected(_) => None,
        }
    }
}

impl<T> From<Option<T>> for Decision<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or_else(Self::not_found, Self::Applied)
    }
}
