//! Gemini Config

use std::time::Duration;

use clap::Args;

use crate::generator::GeminiConfig;

/// Gemini image generation settings.
#[derive(Debug, Args)]
pub struct GeminiArgs {
    /// Gemini API key
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub gemini_api_key: String,

    /// Gemini API root
    #[arg(
        long,
        env = "GEMINI_ENDPOINT",
        default_value = "https://generativelanguage.googleapis.com"
    )]
    pub gemini_endpoint: String,

    /// Image-capable model
    #[arg(long, env = "GEMINI_MODEL", default_value = "gemini-2.5-flash-image")]
    pub gemini_model: String,

    /// HTTP timeout for one generation request, in seconds
    #[arg(long, env = "GEMINI_TIMEOUT_SECONDS", default_value_t = 90)]
    pub gemini_timeout_seconds: u64,
}

impl From<&GeminiArgs> for GeminiConfig {
    fn from(args: &GeminiArgs) -> Self {
        Self {
            endpoint: args.gemini_endpoint.trim_end_matches('/').to_string(),
            api_key: args.gemini_api_key.clone(),
            model: args.gemini_model.clone(),
            timeout: Duration::from_secs(args.gemini_timeout_seconds),
        }
    }
}
