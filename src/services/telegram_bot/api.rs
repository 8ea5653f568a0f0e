//! Bot API wire types and the HTTP client behind [`ChatTransport`].

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::bot::screen::Screen;
use crate::core::config::TelegramSettings;

const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
/// Slack on top of the long-poll timeout before the HTTP request gives up.
const REQUEST_TIMEOUT_MARGIN_SECONDS: u64 = 10;

#[derive(Debug, Deserialize)]
pub(crate) struct TgResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TgUpdate {
    pub(crate) update_id: i64,
    pub(crate) message: Option<TgMessage>,
    pub(crate) callback_query: Option<TgCallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TgMessage {
    pub(crate) message_id: i64,
    pub(crate) chat: TgChat,
    pub(crate) from: Option<TgUser>,
    pub(crate) text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TgCallbackQuery {
    pub(crate) id: String,
    pub(crate) from: TgUser,
    pub(crate) message: Option<TgMessage>,
    pub(crate) data: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TgChat {
    pub(crate) id: i64,
    #[serde(rename = "type")]
    pub(crate) chat_type: String,
}

impl TgChat {
    pub(crate) fn is_private(&self) -> bool {
        self.chat_type == "private"
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TgUser {
    pub(crate) id: i64,
    pub(crate) username: Option<String>,
    pub(crate) first_name: Option<String>,
    pub(crate) last_name: Option<String>,
}

impl TgUser {
    pub(crate) fn display_name(&self) -> String {
        let full = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if !full.is_empty() {
            return full;
        }
        self.username.clone().unwrap_or_else(|| self.id.to_string())
    }
}

/// Outbound side of the chat API as the runtime needs it.
#[async_trait]
pub(crate) trait ChatTransport: Send + Sync {
    async fn get_updates(&self, offset: i64) -> Result<Vec<TgUpdate>>;

    async fn send_message(&self, chat_id: i64, screen: &Screen) -> Result<()>;

    async fn edit_message(&self, chat_id: i64, message_id: i64, screen: &Screen) -> Result<()>;

    async fn answer_callback(&self, callback_id: &str, text: Option<&str>) -> Result<()>;

    async fn send_document(
        &self,
        chat_id: i64,
        filename: &str,
        bytes: Vec<u8>,
        caption: &str,
    ) -> Result<()>;
}

pub(crate) struct TelegramClient {
    client: Client,
    base_url: String,
    poll_timeout_seconds: u64,
}

impl TelegramClient {
    pub(crate) fn new(settings: &TelegramSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(
                settings.poll_timeout_seconds + REQUEST_TIMEOUT_MARGIN_SECONDS,
            ))
            .build()
            .context("Failed to build bot API HTTP client")?;

        Ok(Self {
            client,
            base_url: format!(
                "{}/bot{}",
                settings.api_base_url.trim_end_matches('/'),
                settings.token
            ),
            poll_timeout_seconds: settings.poll_timeout_seconds,
        })
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{method}", self.base_url)
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, body: Value) -> Result<T> {
        let response = self
            .client
            .post(self.url(method))
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Bot API {method} request failed"))?;

        unwrap_response(method, response).await
    }
}

async fn unwrap_response<T: DeserializeOwned>(
    method: &str,
    response: reqwest::Response,
) -> Result<T> {
    let payload: TgResponse<T> = response
        .json()
        .await
        .with_context(|| format!("Failed to decode bot API {method} payload"))?;

    if !payload.ok {
        let description =
            payload.description.unwrap_or_else(|| "unknown bot API error".to_string());
        return Err(anyhow!("Bot API {method} returned ok=false: {description}"));
    }

    payload.result.ok_or_else(|| anyhow!("Bot API {method} returned no result"))
}

/// `reply_markup` for a screen; an empty keyboard clears the previous one.
pub(crate) fn inline_keyboard(screen: &Screen) -> Value {
    let rows = screen
        .keyboard
        .iter()
        .map(|row| {
            row.iter()
                .map(|button| {
                    json!({ "text": button.label, "callback_data": button.action.encode() })
                })
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();

    json!({ "inline_keyboard": rows })
}

fn is_not_modified(error: &anyhow::Error) -> bool {
    error.to_string().contains("message is not modified")
}

#[async_trait]
impl ChatTransport for TelegramClient {
    async fn get_updates(&self, offset: i64) -> Result<Vec<TgUpdate>> {
        let response = self
            .client
            .get(self.url("getUpdates"))
            .query(&[
                ("timeout", self.poll_timeout_seconds.to_string()),
                ("offset", offset.to_string()),
                ("allowed_updates", r#"["message","callback_query"]"#.to_string()),
            ])
            .send()
            .await
            .context("Bot API getUpdates request failed")?;

        unwrap_response("getUpdates", response).await
    }

    async fn send_message(&self, chat_id: i64, screen: &Screen) -> Result<()> {
        let _: Value = self
            .call(
                "sendMessage",
                json!({
                    "chat_id": chat_id,
                    "text": screen.text,
                    "reply_markup": inline_keyboard(screen),
                }),
            )
            .await?;
        Ok(())
    }

    async fn edit_message(&self, chat_id: i64, message_id: i64, screen: &Screen) -> Result<()> {
        let result: Result<Value> = self
            .call(
                "editMessageText",
                json!({
                    "chat_id": chat_id,
                    "message_id": message_id,
                    "text": screen.text,
                    "reply_markup": inline_keyboard(screen),
                }),
            )
            .await;

        match result {
            Ok(_) => Ok(()),
            // Refreshing an unchanged screen is not a failure.
            Err(error) if is_not_modified(&error) => Ok(()),
            Err(error) => Err(error),
        }
    }

    async fn answer_callback(&self, callback_id: &str, text: Option<&str>) -> Result<()> {
        let mut body = json!({ "callback_query_id": callback_id });
        if let Some(text) = text {
            body["text"] = Value::from(text);
        }
        let _: Value = self.call("answerCallbackQuery", body).await?;
        Ok(())
    }

    async fn send_document(
        &self,
        chat_id: i64,
        filename: &str,
        bytes: Vec<u8>,
        caption: &str,
    ) -> Result<()> {
        let document = Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str(XLSX_MIME)
            .context("Invalid document MIME type")?;
        let form = Form::new()
            .text("chat_id", chat_id.to_string())
            .text("caption", caption.to_string())
            .part("document", document);

        let response = self
            .client
            .post(self.url("sendDocument"))
            .multipart(form)
            .send()
            .await
            .context("Bot API sendDocument request failed")?;

        let _: Value = unwrap_response("sendDocument", response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::action::{GroupAction, Nav};

    #[test]
    fn keyboard_rows_carry_encoded_actions() {
        let screen = Screen::new("menu")
            .button("Groups", GroupAction::Open)
            .main_menu_button();

        let markup = inline_keyboard(&screen);

        assert_eq!(markup["inline_keyboard"][0][0]["text"], "Groups");
        assert_eq!(markup["inline_keyboard"][0][0]["callback_data"], "gr:open");
        assert_eq!(
            markup["inline_keyboard"][1][0]["callback_data"],
            crate::bot::action::Action::from(Nav::MainMenu).encode()
        );
    }

    #[test]
    fn display_name_prefers_full_name() {
        let user: TgUser = serde_json::from_value(json!({
            "id": 5, "first_name": "Ada", "last_name": "Lovelace", "username": "ada"
        }))
        .unwrap();
        assert_eq!(user.display_name(), "Ada Lovelace");

        let user: TgUser = serde_json::from_value(json!({ "id": 5, "username": "ada" })).unwrap();
        assert_eq!(user.display_name(), "ada");
    }

    #[test]
    fn failed_response_surfaces_description() {
        let payload: TgResponse<Value> = serde_json::from_value(json!({
            "ok": false, "description": "Bad Request: message is not modified"
        }))
        .unwrap();
        assert!(!payload.ok);
        let error = anyhow!(
            "Bot API editMessageText returned ok=false: {}",
            payload.description.unwrap_or_default()
        );
        assert!(is_not_modified(&error));
    }
}
