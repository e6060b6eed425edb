use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, Secret};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time;

use crate::utils::error_chain_fmt;

const REQUEST_TIMEOUT: time::Duration = time::Duration::from_secs(10);

/// Client for the Telegram Bot API. Messages are always sent with the HTML parse mode.
pub struct TelegramClient {
    http_client: Client,
    base_url: String,
    bot_token: Secret<String>,
}

#[derive(Serialize)]
struct SendMessageBody<'a> {
    chat_id: i64,
    text: &'a str,
    parse_mode: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<&'a InlineKeyboard>,
}

#[derive(Serialize)]
struct GetUpdatesBody {
    offset: Option<i64>,
    timeout: u64,
    allowed_updates: [&'static str; 2],
}

#[derive(Serialize)]
struct AnswerCallbackQueryBody<'a> {
    callback_query_id: &'a str,
}

#[derive(Serialize)]
struct SetMyCommandsBody<'a> {
    commands: &'a [BotCommand],
}

#[derive(Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct BotCommand {
    pub command: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct InlineKeyboard {
    pub inline_keyboard: Vec<Vec<InlineButton>>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct InlineButton {
    pub text: String,
    pub callback_data: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Message {
    pub message_id: i64,
    pub from: Option<User>,
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    pub message: Option<Message>,
    pub data: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub first_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Chat {
    pub id: i64,
}

#[derive(thiserror::Error)]
pub enum ChatError {
    #[error("Failed to reach the Telegram API.")]
    Unreachable(#[source] reqwest::Error),
    #[error("The Telegram API rejected the request with status {status}: {description}")]
    Rejected {
        status: StatusCode,
        description: String,
    },
    #[error("The Telegram API returned a body that could not be decoded.")]
    InvalidBody(#[source] reqwest::Error),
}

impl std::fmt::Debug for ChatError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl InlineKeyboard {
    /// One button per row.
    pub fn single_column(buttons: Vec<InlineButton>) -> InlineKeyboard {
        InlineKeyboard {
            inline_keyboard: buttons.into_iter().map(|button| vec![button]).collect(),
        }
    }
}

impl InlineButton {
    pub fn new(text: impl Into<String>, callback_data: impl Into<String>) -> InlineButton {
        InlineButton {
            text: text.into(),
            callback_data: callback_data.into(),
        }
    }
}

impl TelegramClient {
    pub fn new(
        base_url: String,
        bot_token: Secret<String>,
        timeout: Option<time::Duration>,
    ) -> Result<TelegramClient, reqwest::Error> {
        let http_client = Client::builder()
            .timeout(timeout.unwrap_or(REQUEST_TIMEOUT))
            .build()?;

        Ok(TelegramClient {
            http_client,
            base_url,
            bot_token,
        })
    }

    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), ChatError> {
        self.send(chat_id, text, None).await
    }

    pub async fn send_message_with_keyboard(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: &InlineKeyboard,
    ) -> Result<(), ChatError> {
        self.send(chat_id, text, Some(keyboard)).await
    }

    /// Long polls for new updates. `offset` must be the last seen `update_id + 1`.
    pub async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout_seconds: u64,
    ) -> Result<Vec<Update>, ChatError> {
        let body = GetUpdatesBody {
            offset,
            timeout: timeout_seconds,
            allowed_updates: ["message", "callback_query"],
        };

        let updates: Option<Vec<Update>> = self.call("getUpdates", &body).await?;

        Ok(updates.unwrap_or_default())
    }

    pub async fn answer_callback_query(&self, callback_query_id: &str) -> Result<(), ChatError> {
        let body = AnswerCallbackQueryBody { callback_query_id };

        self.call::<_, serde_json::Value>("answerCallbackQuery", &body)
            .await
            .map(|_| ())
    }

    pub async fn set_my_commands(&self, commands: &[BotCommand]) -> Result<(), ChatError> {
        let body = SetMyCommandsBody { commands };

        self.call::<_, serde_json::Value>("setMyCommands", &body)
            .await
            .map(|_| ())
    }

    async fn send(
        &self,
        chat_id: i64,
        text: &str,
        reply_markup: Option<&InlineKeyboard>,
    ) -> Result<(), ChatError> {
        let body = SendMessageBody {
            chat_id,
            text,
            parse_mode: "HTML",
            reply_markup,
        };

        self.call::<_, serde_json::Value>("sendMessage", &body)
            .await
            .map(|_| ())
    }

    async fn call<B, T>(&self, api_method: &str, body: &B) -> Result<Option<T>, ChatError>
    where
        B: Serialize,
        T: DeserializeOwned,
    {
        let url = format!(
            "{}/bot{}/{}",
            self.base_url,
            self.bot_token.expose_secret(),
            api_method
        );

        let response = self
            .http_client
            .post(&url)
            .json(body)
            .send()
            .await
            // The URL carries the bot token and must never reach the logs
            .map_err(|err| ChatError::Unreachable(err.without_url()))?;
        let status = response.status();

        // A blocked or unknown recipient comes back as 4xx with an `ok: false` body
        if !status.is_success() {
            let description = response
                .json::<ApiResponse<serde_json::Value>>()
                .await
                .ok()
                .and_then(|body| body.description)
                .unwrap_or_default();

            return Err(ChatError::Rejected {
                status,
                description,
            });
        }

        let body: ApiResponse<T> = response
            .json()
            .await
            .map_err(|err| ChatError::InvalidBody(err.without_url()))?;

        if !body.ok {
            return Err(ChatError::Rejected {
                status,
                description: body.description.unwrap_or_default(),
            });
        }

        Ok(body.result)
    }
}

/// Escapes the characters Telegram's HTML parse mode treats as markup.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
