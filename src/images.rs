//! Images
//!
//! Image kinds, statuses and the versioning rules for a product's image set. The rules
//! operate over any loaded collection implementing [`VersionedImage`], so callers decide
//! how images are stored and the accessors stay pure.

use std::{fmt, str::FromStr};

use thiserror::Error;

/// Whether an image is the operator's photo or a generated rendition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageKind {
    /// Photo uploaded with the draft. Always version 1.
    Original,

    /// Generated rendition. Versions start at 1 and are never reused.
    AiGenerated,
}

impl ImageKind {
    /// Persisted representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Original => "ORIGINAL",
            Self::AiGenerated => "AI_GENERATED",
        }
    }
}

impl fmt::Display for ImageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageKind {
    type Err = UnknownImageValue;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "ORIGINAL" => Ok(Self::Original),
            "AI_GENERATED" => Ok(Self::AiGenerated),
            other => Err(UnknownImageValue(other.to_owned())),
        }
    }
}

/// Image processing status. Moves out of `Pending` exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageStatus {
    /// Generation requested but not finished.
    Pending,

    /// Bytes stored and URL assigned.
    Ready,

    /// Generation gave up. Never retried in place.
    Failed,
}

impl ImageStatus {
    /// Persisted representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Ready => "READY",
            Self::Failed => "FAILED",
        }
    }

    /// Whether the status can still change.
    #[must_use]
    pub const fn is_settled(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for ImageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageStatus {
    type Err = UnknownImageValue;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "PENDING" => Ok(Self::Pending),
            "READY" => Ok(Self::Ready),
            "FAILED" => Ok(Self::Failed),
            other => Err(UnknownImageValue(other.to_owned())),
        }
    }
}

/// Raised when a persisted kind or status string is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown image value `{0}`")]
pub struct UnknownImageValue(pub String);

/// Common view over image records for versioning rules.
pub trait VersionedImage {
    /// Image kind.
    fn kind(&self) -> ImageKind;

    /// Version number, starting at 1.
    fn version(&self) -> u32;

    /// Processing status.
    fn status(&self) -> ImageStatus;
}

/// The product's original photo, if loaded.
pub fn original<I: VersionedImage>(images: &[I]) -> Option<&I> {
    images
        .iter()
        .find(|image| image.kind() == ImageKind::Original)
}

/// The current AI image: the `Ready` AI image with the highest version.
pub fn current_ai<I: VersionedImage>(images: &[I]) -> Option<&I> {
    images
        .iter()
        .filter(|image| image.kind() == ImageKind::AiGenerated && image.status() == ImageStatus::Ready)
        .max_by_key(|image| image.version())
}

/// The most recently allocated AI image, whatever its status.
pub fn latest_ai<I: VersionedImage>(images: &[I]) -> Option<&I> {
    images
        .iter()
        .filter(|image| image.kind() == ImageKind::AiGenerated)
        .max_by_key(|image| image.version())
}

/// Version the next AI image must use. Failed versions count, so they are never reused.
pub fn next_ai_version<I: VersionedImage>(images: &[I]) -> u32 {
    latest_ai(images).map_or(1, |image| image.version().saturating_add(1))
}

/// Whether the AI versions form the contiguous run `1..=n`.
pub fn ai_versions_contiguous<I: VersionedImage>(images: &[I]) -> bool {
    let mut versions: Vec<u32> = images
        .iter()
        .filter(|image| image.kind() == ImageKind::AiGenerated)
        .map(VersionedImage::version)
        .collect();

    versions.sort_unstable();

    versions
        .iter()
        .zip(1_u32..)
        .all(|(version, expected)| *version == expected)
}

/// Storage key for a product's original photo.
pub fn original_storage_key(product: &impl fmt::Display) -> String {
    format!("products/{product}/original/v1")
}

/// Storage key for a product's AI image at `version`.
pub fn ai_storage_key(product: &impl fmt::Display, version: u32) -> String {
    format!("products/{product}/ai/v{version}")
}

/// Encoded image formats accepted from uploads and the generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    /// JPEG / JFIF.
    Jpeg,

    /// PNG.
    Png,

    /// WebP (RIFF container).
    Webp,
}

impl ImageFormat {
    /// MIME type for the format.
    #[must_use]
    pub const fn mime_type(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Webp => "image/webp",
        }
    }
}

const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF];
const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Identify the image format from its leading bytes.
///
/// Only the container signature is checked; it rejects empty payloads, text and JSON
/// error bodies, which are the failure shapes seen from generators.
#[must_use]
pub fn sniff_format(bytes: &[u8]) -> Option<ImageFormat> {
    if bytes.starts_with(JPEG_MAGIC) {
        return Some(ImageFormat::Jpeg);
    }

    if bytes.starts_with(PNG_MAGIC) {
        return Some(ImageFormat::Png);
    }

    match (bytes.get(0..4), bytes.get(8..12)) {
        (Some(b"RIFF"), Some(b"WEBP")) => Some(ImageFormat::Webp),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Img(ImageKind, u32, ImageStatus);

    impl VersionedImage for Img {
        fn kind(&self) -> ImageKind {
            self.0
        }

        fn version(&self) -> u32 {
            self.1
        }

        fn status(&self) -> ImageStatus {
            self.2
        }
    }

    fn set() -> Vec<Img> {
        vec![
            Img(ImageKind::Original, 1, ImageStatus::Ready),
            Img(ImageKind::AiGenerated, 1, ImageStatus::Failed),
            Img(ImageKind::AiGenerated, 2, ImageStatus::Ready),
            Img(ImageKind::AiGenerated, 3, ImageStatus::Pending),
        ]
    }

    #[test]
    fn current_ai_is_highest_ready_version() {
        let images = set();

        assert_eq!(current_ai(&images).map(VersionedImage::version), Some(2));
        assert_eq!(latest_ai(&images).map(VersionedImage::version), Some(3));
    }

    #[test]
    fn next_version_counts_failed_and_pending() {
        let images = set();

        assert_eq!(next_ai_version(&images), 4);
        assert_eq!(next_ai_version::<Img>(&[]), 1);
    }

    #[test]
    fn original_is_found_by_kind() {
        let images = set();

        assert!(original(&images).is_some_and(|image| image.version() == 1));
        assert!(original::<Img>(&[]).is_none());
    }

    #[test]
    fn contiguity_detects_gaps() {
        let mut images = set();

        assert!(ai_versions_contiguous(&images));

        images.push(Img(ImageKind::AiGenerated, 6, ImageStatus::Pending));

        assert!(!ai_versions_contiguous(&images));
    }

    #[test]
    fn storage_keys_are_namespaced_by_product() {
        assert_eq!(original_storage_key(&"p1"), "products/p1/original/v1");
        assert_eq!(ai_storage_key(&"p1", 3), "products/p1/ai/v3");
    }

    #[test]
    fn sniffing_accepts_known_signatures_only() {
        assert_eq!(sniff_format(&[0xFF, 0xD8, 0xFF, 0xE0, 0x00]), Some(ImageFormat::Jpeg));
        assert_eq!(sniff_format(PNG_MAGIC), Some(ImageFormat::Png));
        assert_eq!(sniff_format(b"RIFF\x10\x00\x00\x00WEBPVP8 "), Some(ImageFormat::Webp));
        assert_eq!(sniff_format(b"{\"error\":\"quota\"}"), None);
        assert_eq!(sniff_format(&[]), None);
    }
}
