//! Telegram Bot API gateway.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::{Value, json};
use tracing::debug;

use crate::messaging::{ConversationId, GatewayError, Keyboard, MessageRef, MessagingGateway};

/// Configuration for talking to the Bot API.
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    /// API root, e.g. `"https://api.telegram.org"`.
    pub api_base: String,

    /// Bot token issued by `@BotFather`.
    pub bot_token: String,

    /// Per-request timeout.
    pub timeout: Duration,
}

/// [`MessagingGateway`] over the Telegram Bot API.
#[derive(Debug, Clone)]
pub struct TelegramGateway {
    config: TelegramConfig,
    http: Client,
}

impl TelegramGateway {
    /// Create a new gateway from the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: TelegramConfig) -> Result<Self, GatewayError> {
        let http = Client::builder().timeout(config.timeout).build()?;

        Ok(Self { config, http })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: &Value,
    ) -> Result<T, GatewayError> {
        let url = format!(
            "{}/bot{}/{method}",
            self.config.api_base, self.config.bot_token
        );

        debug!(method, "calling bot api");

        let response = self.http.post(&url).json(body).send().await?;
        let status = response.status();
        let parsed: ApiResponse<T> = response.json().await?;

        if parsed.ok {
            return parsed.result.ok_or_else(|| {
                GatewayError::Api(format!("{method} returned ok without a result"))
            });
        }

        let description = parsed.description.unwrap_or_default();

        if is_missing_message(&description) {
            return Err(GatewayError::NotFound);
        }

        Err(GatewayError::Api(format!(
            "{method} failed with status {status}: {description}"
        )))
    }
}

#[async_trait]
impl MessagingGateway for TelegramGateway {
    async fn send_text(
        &self,
        conversation: ConversationId,
        text: &str,
        keyboard: Option<Keyboard>,
    ) -> Result<MessageRef, GatewayError> {
        let body = with_markup(
            json!({ "chat_id": conversation.0, "text": text }),
            keyboard.as_ref(),
        );

        let sent: SentMessage = self.call("sendMessage", &body).await?;

        Ok(MessageRef(sent.message_id))
    }

    async fn send_photo(
        &self,
        conversation: ConversationId,
        photo_url: &str,
        caption: Option<String>,
        keyboard: Option<Keyboard>,
    ) -> Result<MessageRef, GatewayError> {
        let mut body = json!({ "chat_id": conversation.0, "photo": photo_url });

        if let Some(caption) = caption {
            body["caption"] = Value::String(caption);
        }

        let sent: SentMessage = self
            .call("sendPhoto", &with_markup(body, keyboard.as_ref()))
            .await?;

        Ok(MessageRef(sent.message_id))
    }

    async fn edit_caption(
        &self,
        conversation: ConversationId,
        message: MessageRef,
        caption: &str,
        keyboard: Option<Keyboard>,
    ) -> Result<(), GatewayError> {
        let body = with_markup(
            json!({
                "chat_id": conversation.0,
                "message_id": message.0,
                "caption": caption,
            }),
            keyboard.as_ref(),
        );

        // Returns the edited message, or `true` for inline messages.
        let _edited: Value = self.call("editMessageCaption", &body).await?;

        Ok(())
    }

    async fn answer_interaction(
        &self,
        interaction: &str,
        text: Option<String>,
    ) -> Result<(), GatewayError> {
        let mut body = json!({ "callback_query_id": interaction });

        if let Some(text) = text {
            body["text"] = Value::String(text);
        }

        let _answered: bool = self.call("answerCallbackQuery", &body).await?;

        Ok(())
    }
}

fn with_markup(mut body: Value, keyboard: Option<&Keyboard>) -> Value {
    if let Some(keyboard) = keyboard {
        body["reply_markup"] = json!(keyboard);
    }

    body
}

fn is_missing_message(description: &str) -> bool {
    let description = description.to_ascii_lowercase();

    description.contains("message to edit not found") || description.contains("message not found")
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use crate::messaging::Button;

    use super::*;

    #[test]
    fn markup_serializes_as_inline_keyboard() {
        let keyboard = Keyboard {
            inline_keyboard: vec![vec![Button {
                text: "Discard Draft".to_string(),
                callback_data: "discard:abc".to_string(),
            }]],
        };

        let body = with_markup(json!({ "chat_id": 1 }), Some(&keyboard));

        assert_eq!(
            body["reply_markup"],
            json!({
                "inline_keyboard": [[{ "text": "Discard Draft", "callback_data": "discard:abc" }]]
            })
        );
    }

    #[test]
    fn markup_is_omitted_without_a_keyboard() {
        let body = with_markup(json!({ "chat_id": 1 }), None);

        assert!(body.get("reply_markup").is_none());
    }

    #[test]
    fn error_responses_carry_the_description() -> TestResult {
        let parsed: ApiResponse<SentMessage> = serde_json::from_value(json!({
            "ok": false,
            "error_code": 400,
            "description": "Bad Request: message to edit not found",
        }))?;

        assert!(!parsed.ok);
        assert!(is_missing_message(&parsed.description.unwrap_or_default()));

        Ok(())
    }

    #[test]
    fn other_failures_are_not_treated_as_missing() {
        assert!(!is_missing_message("Bad Request: chat not found"));
    }
}
