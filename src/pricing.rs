//! Pricing
//!
//! Display helpers for catalog prices. Prices are stored in INR minor units; the USD
//! figure is an estimate derived from the operator-configured exchange rate.

use std::{fmt, str::FromStr};

use num_traits::ToPrimitive;
use rust_decimal::Decimal;
use rusty_money::{Money, iso};
use thiserror::Error;

use crate::products::Price;

/// Upper bound accepted for the INR per USD rate.
const MAX_FX_RATE: Decimal = Decimal::from_parts(500, 0, 0, false, 0);

/// Errors raised while reading an exchange rate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FxRateError {
    /// Input is not a decimal number.
    #[error("rate must be a number")]
    Invalid,

    /// Rate is zero, negative or implausibly large.
    #[error("rate must be between 0 and 500")]
    OutOfRange,
}

/// INR per USD exchange rate, strictly positive and at most 500.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FxRate(Decimal);

impl FxRate {
    /// Default rate used until an operator sets one.
    pub const DEFAULT: Self = Self(Decimal::from_parts(8300, 0, 0, false, 2));

    /// Validate a rate.
    ///
    /// # Errors
    ///
    /// Returns [`FxRateError::OutOfRange`] unless `0 < rate <= 500`.
    pub fn new(rate: Decimal) -> Result<Self, FxRateError> {
        if rate <= Decimal::ZERO || rate > MAX_FX_RATE {
            return Err(FxRateError::OutOfRange);
        }

        Ok(Self(rate.normalize()))
    }

    /// The rate as a decimal.
    #[must_use]
    pub const fn as_decimal(self) -> Decimal {
        self.0
    }
}

impl Default for FxRate {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for FxRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for FxRate {
    type Err = FxRateError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let rate = Decimal::from_str(value.trim()).map_err(|_parse| FxRateError::Invalid)?;

        Self::new(rate)
    }
}

/// Render a price as INR money, e.g. `₹12,500.00`.
#[must_use]
pub fn format_inr(price: Price) -> String {
    match i64::try_from(price.minor_units()) {
        Ok(minor) => Money::from_minor(minor, iso::INR).to_string(),
        Err(_overflow) => format!("INR {} paise", price.minor_units()),
    }
}

/// Approximate USD amount for `price`, rounded to whole dollars.
#[must_use]
pub fn usd_estimate(price: Price, rate: FxRate) -> u64 {
    let rupees = Decimal::from(price.minor_units()) / Decimal::ONE_HUNDRED;

    rupees
        .checked_div(rate.as_decimal())
        .and_then(|usd| usd.round().to_u64())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    #[test]
    fn rate_bounds_are_enforced() {
        assert_eq!("0".parse::<FxRate>(), Err(FxRateError::OutOfRange));
        assert_eq!("-3".parse::<FxRate>(), Err(FxRateError::OutOfRange));
        assert_eq!("500.01".parse::<FxRate>(), Err(FxRateError::OutOfRange));
        assert_eq!("abc".parse::<FxRate>(), Err(FxRateError::Invalid));
        assert!("500".parse::<FxRate>().is_ok());
    }

    #[test]
    fn default_rate_is_eighty_three() {
        assert_eq!(FxRate::default().to_string(), "83.00");
    }

    #[test]
    fn usd_estimate_rounds_to_whole_dollars() -> TestResult {
        let price = Price::from_major(12_500)?;
        let rate: FxRate = "83".parse()?;

        // 12500 / 83 = 150.6
        assert_eq!(usd_estimate(price, rate), 151);

        Ok(())
    }

    #[test]
    fn inr_display_contains_amount() -> TestResult {
        let formatted = format_inr(Price::from_major(12_500)?);

        assert!(formatted.contains("500"), "unexpected display {formatted}");

        Ok(())
    }
}
