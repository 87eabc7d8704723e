//! Gemini `generateContent` client.

use std::time::Duration;

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use boutique::images::sniff_format;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::generator::{GeneratorError, ImageGenerator};

const PROMPT: &str = "\
Produce a photorealistic studio photograph of an Indian woman, aged 25 to 35, wearing \
exactly the garment in the reference image.

Keep the garment unchanged: the same pattern, colour, texture, weave, embroidery, \
drape, pleats and silhouette. It must look as if the reference garment itself was \
photographed on a person.

Standing pose, slightly angled, hands relaxed. Plain cream studio backdrop with soft \
diffused light. Full-length framing that shows the whole garment.

Avoid: revealing poses, added logos or text or watermarks, malformed hands, \
unrealistic proportions, props or outdoor scenery, accessories that are not part of \
the garment, colour shifts and artistic filters.";

/// Configuration for the Gemini API.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// API root, e.g. `"https://generativelanguage.googleapis.com"`.
    pub endpoint: String,

    pub api_key: String,

    /// Image-capable model name.
    pub model: String,

    /// Per-request timeout.
    pub timeout: Duration,
}

/// [`ImageGenerator`] backed by Gemini image generation.
#[derive(Debug, Clone)]
pub struct GeminiGenerator {
    config: GeminiConfig,
    http: Client,
}

impl GeminiGenerator {
    /// Create a new generator from the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: GeminiConfig) -> Result<Self, GeneratorError> {
        let http = Client::builder().timeout(config.timeout).build()?;

        Ok(Self { config, http })
    }
}

#[async_trait]
impl ImageGenerator for GeminiGenerator {
    #[tracing::instrument(
        name = "generator.gemini.generate",
        skip(self, source),
        fields(model = %self.config.model, source_size = source.len()),
        err
    )]
    async fn generate(&self, source: Vec<u8>) -> Result<Vec<u8>, GeneratorError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.endpoint, self.config.model
        );

        let body = request_body(&source);

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();

            return Err(GeneratorError::UnexpectedResponse(format!(
                "generateContent failed with status {status}: {text}"
            )));
        }

        let parsed: GenerateResponse = response.json().await?;
        let bytes = first_image(parsed)?;

        debug!(size = bytes.len(), "received generated image");

        Ok(bytes)
    }
}

fn request_body(source: &[u8]) -> Value {
    let mime_type = sniff_format(source).map_or("image/jpeg", |format| format.mime_type());

    json!({
        "contents": [{
            "parts": [
                { "text": PROMPT },
                { "inline_data": { "mime_type": mime_type, "data": BASE64.encode(source) } },
            ],
        }],
        "generationConfig": { "responseModalities": ["TEXT", "IMAGE"] },
    })
}

fn first_image(response: GenerateResponse) -> Result<Vec<u8>, GeneratorError> {
    let data = response
        .candidates
        .into_iter()
        .flat_map(|candidate| candidate.content.parts)
        .find_map(|part| part.inline_data)
        .ok_or(GeneratorError::NoImage)?
        .data;

    let bytes = BASE64.decode(data.as_bytes()).map_err(|error| {
        GeneratorError::UnexpectedResponse(format!("image data is not base64: {error}"))
    })?;

    if sniff_format(&bytes).is_none() {
        return Err(GeneratorError::NotAnImage);
    }

    Ok(bytes)
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Content,
}

#[derive(Debug, Default, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
struct InlineData {
    data: String,
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

    fn response(parts: &Value) -> TestResult<GenerateResponse> {
        Ok(serde_json::from_value(json!({
            "candidates": [{ "content": { "parts": parts } }],
        }))?)
    }

    #[test]
    fn request_carries_prompt_and_source() -> TestResult {
        let body = request_body(PNG);

        assert_eq!(body["contents"][0]["parts"][0]["text"], PROMPT);
        assert_eq!(
            body["contents"][0]["parts"][1]["inline_data"]["mime_type"],
            "image/png"
        );
        assert_eq!(
            BASE64.decode(
                body["contents"][0]["parts"][1]["inline_data"]["data"]
                    .as_str()
                    .unwrap_or_default()
            )?,
            PNG
        );

        Ok(())
    }

    #[test]
    fn first_inline_image_is_returned() -> TestResult {
        let parsed = response(&json!([
            { "text": "here you go" },
            { "inlineData": { "mimeType": "image/png", "data": BASE64.encode(PNG) } },
        ]))?;

        assert_eq!(first_image(parsed)?, PNG);

        Ok(())
    }

    #[test]
    fn text_only_responses_have_no_image() -> TestResult {
        let parsed = response(&json!([{ "text": "I cannot help with that" }]))?;

        assert!(matches!(first_image(parsed), Err(GeneratorError::NoImage)));

        Ok(())
    }

    #[test]
    fn non_image_payloads_are_rejected() -> TestResult {
        let parsed = response(&json!([
            { "inlineData": { "mimeType": "image/png", "data": BASE64.encode(b"<html>") } },
        ]))?;

        assert!(matches!(first_image(parsed), Err(GeneratorError::NotAnImage)));

        Ok(())
    }
}
