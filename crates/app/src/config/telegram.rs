//! Telegram Config

use std::time::Duration;

use clap::Args;

use crate::messaging::TelegramConfig;

/// Telegram Bot API settings.
#[derive(Debug, Args)]
pub struct TelegramArgs {
    /// Bot token issued by `@BotFather`
    #[arg(long, env = "TELEGRAM_BOT_TOKEN", hide_env_values = true)]
    pub telegram_bot_token: String,

    /// Bot API root
    #[arg(long, env = "TELEGRAM_API_BASE", default_value = "https://api.telegram.org")]
    pub telegram_api_base: String,

    /// Per-request timeout in seconds
    #[arg(long, env = "TELEGRAM_TIMEOUT_SECONDS", default_value_t = 10)]
    pub telegram_timeout_seconds: u64,
}

impl From<&TelegramArgs> for TelegramConfig {
    fn from(args: &TelegramArgs) -> Self {
        Self {
            api_base: args.telegram_api_base.trim_end_matches('/').to_string(),
            bot_token: args.telegram_bot_token.clone(),
            timeout: Duration::from_secs(args.telegram_timeout_seconds),
        }
    }
}
