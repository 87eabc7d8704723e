//! Derived-image generation
//!
//! Turns an original garment photo into a studio-style preview. Generator output is
//! untrusted: it only counts as an image once its bytes sniff as a known format.

use async_trait::async_trait;
use mockall::automock;
use thiserror::Error;

mod gemini;

pub use gemini::{GeminiConfig, GeminiGenerator};

#[derive(Debug, Error)]
pub enum GeneratorError {
    /// Transport failure, including client timeouts.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected response from generator: {0}")]
    UnexpectedResponse(String),

    #[error("generator response did not contain an image")]
    NoImage,

    #[error("generator returned bytes that are not an image")]
    NotAnImage,
}

#[automock]
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Generate a derived image from the original photo bytes.
    async fn generate(&self, source: Vec<u8>) -> Result<Vec<u8>, GeneratorError>;
}
