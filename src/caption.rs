//! Caption metadata
//!
//! Operators describe a new item in the caption of the photo they send:
//!
//! ```text
//! Title: Red Banarasi Silk Saree
//! Price: 12500
//! Category: saree, lehenga
//! Tags: silk, banarasi, red
//! Variants: Size: Free Size; Color: Red
//! Description: Handwoven
//! ```
//!
//! Keys are case-insensitive, unknown lines are ignored, and the price is given in whole
//! rupees. A caption without a title or a positive price is rejected.

use serde::Serialize;
use smallvec::SmallVec;
use thiserror::Error;

use crate::products::{Price, PriceError};

/// Caption parsing errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CaptionError {
    /// No non-empty `Title:` line.
    #[error("caption must include a Title")]
    MissingTitle,

    /// No `Price:` line with a positive amount.
    #[error("caption must include a positive Price")]
    MissingPrice,

    /// Price too large to represent.
    #[error("price is too large")]
    PriceOverflow,
}

/// A single variant option, e.g. `Size: M`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariantSpec {
    /// Option kind, e.g. `Size`.
    pub kind: String,

    /// Option value, e.g. `M`.
    pub value: String,
}

/// Validated draft metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftMetadata {
    /// Product title.
    pub title: String,

    /// Free-form description; may be empty.
    pub description: String,

    /// Lowercased categories.
    pub categories: SmallVec<[String; 3]>,

    /// Lowercased tags.
    pub tags: Vec<String>,

    /// Variant options in caption order.
    pub variants: Vec<VariantSpec>,

    /// Price.
    pub price: Price,
}

/// Parse an operator caption into [`DraftMetadata`].
///
/// # Errors
///
/// Returns [`CaptionError`] when the title or price is missing or invalid.
pub fn parse_caption(caption: &str) -> Result<DraftMetadata, CaptionError> {
    let mut title = String::new();
    let mut description = String::new();
    let mut categories = SmallVec::new();
    let mut tags = Vec::new();
    let mut variants = Vec::new();
    let mut price_rupees: Option<u64> = None;
    let mut price_overflowed = false;

    for line in caption.lines().map(str::trim).filter(|line| !line.is_empty()) {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };

        let value = value.trim();

        match key.trim().to_ascii_lowercase().as_str() {
            "title" => value.clone_into(&mut title),
            "price" => {
                let digits: String = value.chars().filter(char::is_ascii_digit).collect();

                match digits.parse::<u64>() {
                    Ok(rupees) => price_rupees = Some(rupees),
                    Err(_parse) if digits.is_empty() => price_rupees = None,
                    Err(_overflow) => price_overflowed = true,
                }
            }
            "category" | "categories" => categories = split_list(value).collect(),
            "tag" | "tags" => tags = split_list(value).collect(),
            "variant" | "variants" => variants = parse_variants(value).collect(),
            "description" | "desc" => value.clone_into(&mut description),
            _ => {}
        }
    }

    if title.is_empty() {
        return Err(CaptionError::MissingTitle);
    }

    if price_overflowed {
        return Err(CaptionError::PriceOverflow);
    }

    let price = match price_rupees.map(Price::from_major) {
        Some(Ok(price)) => price,
        Some(Err(PriceError::Overflow)) => return Err(CaptionError::PriceOverflow),
        Some(Err(PriceError::NotPositive)) | None => return Err(CaptionError::MissingPrice),
    };

    Ok(DraftMetadata {
        title,
        description,
        categories,
        tags,
        variants,
        price,
    })
}

fn split_list(value: &str) -> impl Iterator<Item = String> + '_ {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_lowercase)
}

fn parse_variants(value: &str) -> impl Iterator<Item = VariantSpec> + '_ {
    value.split(';').filter_map(|part| {
        let (kind, value) = part.split_once(':')?;

        Some(VariantSpec {
            kind: kind.trim().to_owned(),
            value: value.trim().to_owned(),
        })
    })
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    #[test]
    fn parses_full_caption() -> TestResult {
        let metadata = parse_caption(
            "Title: Red Saree\n\
             Price: 12,500\n\
             Categories: Saree, Lehenga\n\
             Tags: Silk, , Red\n\
             Variants: Size: Free Size; Color: Red with Gold\n\
             Desc: Handwoven",
        )?;

        assert_eq!(metadata.title, "Red Saree");
        assert_eq!(metadata.price.minor_units(), 1_250_000);
        assert_eq!(metadata.categories.as_slice(), ["saree", "lehenga"]);
        assert_eq!(metadata.tags, ["silk", "red"]);
        assert_eq!(
            metadata.variants,
            [
                VariantSpec {
                    kind: "Size".to_owned(),
                    value: "Free Size".to_owned()
                },
                VariantSpec {
                    kind: "Color".to_owned(),
                    value: "Red with Gold".to_owned()
                },
            ]
        );
        assert_eq!(metadata.description, "Handwoven");

        Ok(())
    }

    #[test]
    fn keys_are_case_insensitive() -> TestResult {
        let metadata = parse_caption("TITLE: Kurta\nprice: 999")?;

        assert_eq!(metadata.title, "Kurta");
        assert_eq!(metadata.price.minor_units(), 99_900);

        Ok(())
    }

    #[test]
    fn rejects_missing_title() {
        assert_eq!(parse_caption("Price: 100"), Err(CaptionError::MissingTitle));
        assert_eq!(
            parse_caption("Title:   \nPrice: 100"),
            Err(CaptionError::MissingTitle)
        );
    }

    #[test]
    fn rejects_missing_or_zero_price() {
        assert_eq!(parse_caption("Title: Kurta"), Err(CaptionError::MissingPrice));
        assert_eq!(
            parse_caption("Title: Kurta\nPrice: 0"),
            Err(CaptionError::MissingPrice)
        );
        assert_eq!(
            parse_caption("Title: Kurta\nPrice: free"),
            Err(CaptionError::MissingPrice)
        );
    }

    #[test]
    fn rejects_overflowing_price() {
        assert_eq!(
            parse_caption("Title: Kurta\nPrice: 999999999999999999999"),
            Err(CaptionError::PriceOverflow)
        );
    }
}
