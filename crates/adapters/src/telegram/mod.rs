//! Telegram Bot API adapters

mod formatter;
mod retriever;
mod sender;

pub use retriever::{TelegramRetriever, TelegramRetrieverConfig};
pub use sender::{TelegramSender, TelegramSenderConfig};

use crosspost_domain::{RetrieveError, SendError};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const TELEGRAM_API_URL: &str = "https://api.telegram.org";

/// Failure of a single Bot API call
#[derive(Debug, thiserror::Error)]
pub(crate) enum TelegramError {
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("API returned error {code}: {description}")]
    Api { code: u16, description: String },
    #[error("rate limited, retry after {0:?}")]
    RateLimited(Option<Duration>),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl From<TelegramError> for SendError {
    fn from(error: TelegramError) -> Self {
        match error {
            TelegramError::Http(e) => SendError::Network(e),
            TelegramError::RateLimited(retry_after) => SendError::RateLimited(retry_after),
            TelegramError::Unauthorized(e) => SendError::Auth(e),
            other => SendError::Api(other.to_string()),
        }
    }
}

impl From<TelegramError> for RetrieveError {
    fn from(error: TelegramError) -> Self {
        match error {
            TelegramError::Http(e) => RetrieveError::Network(e),
            TelegramError::RateLimited(retry_after) => RetrieveError::RateLimited(retry_after),
            TelegramError::Unauthorized(e) => RetrieveError::Auth(e),
            TelegramError::Decode(e) => RetrieveError::InvalidResponse(e),
            other => RetrieveError::Api(other.to_string()),
        }
    }
}

#[derive(Deserialize)]
struct ApiResponse<T> {
    #[serde(default)]
    ok: bool,
    result: Option<T>,
    error_code: Option<u16>,
    description: Option<String>,
    parameters: Option<ResponseParameters>,
}

#[derive(Deserialize)]
struct ResponseParameters {
    retry_after: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Message {
    pub message_id: i64,
    #[serde(default)]
    pub chat: Option<Chat>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub photo: Vec<PhotoSize>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Chat {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PhotoSize {
    pub file_id: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Update {
    #[serde(default)]
    pub channel_post: Option<Message>,
}

#[derive(Debug, Deserialize)]
struct File {
    file_path: Option<String>,
}

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
    disable_notification: bool,
}

#[derive(Serialize)]
struct SendPhotoRequest<'a> {
    chat_id: &'a str,
    photo: &'a str,
    caption: &'a str,
    parse_mode: &'static str,
    disable_notification: bool,
}

#[derive(Serialize)]
struct SendPollRequest<'a> {
    chat_id: &'a str,
    question: &'a str,
    options: Vec<PollOptionRequest<'a>>,
    is_anonymous: bool,
    allows_multiple_answers: bool,
    disable_notification: bool,
}

#[derive(Serialize)]
struct PollOptionRequest<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GetUpdatesRequest {
    limit: u32,
    allowed_updates: [&'static str; 1],
}

#[derive(Serialize)]
struct GetFileRequest<'a> {
    file_id: &'a str,
}

/// Thin Bot API client
pub(crate) struct TelegramApi {
    client: Client,
    token: SecretString,
    base_url: String,
}

impl TelegramApi {
    pub(crate) fn new(client: Client, token: SecretString, base_url: String) -> Self {
        Self {
            client,
            token,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn call<B: Serialize, T: DeserializeOwned>(
        &self,
        method: &str,
        body: &B,
    ) -> Result<T, TelegramError> {
        let url = format!(
            "{}/bot{}/{}",
            self.base_url,
            self.token.expose_secret(),
            method
        );

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| TelegramError::Http(e.without_url().to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TelegramError::Http(e.without_url().to_string()))?;

        let parsed: ApiResponse<T> = match serde_json::from_str(&body) {
            Ok(parsed) => parsed,
            Err(_) if status.as_u16() == 429 => return Err(TelegramError::RateLimited(None)),
            Err(e) => {
                return Err(TelegramError::Decode(format!(
                    "{} (HTTP {}): {}",
                    method, status, e
                )));
            }
        };

        if parsed.ok {
            if let Some(result) = parsed.result {
                return Ok(result);
            }
        }

        let code = parsed.error_code.unwrap_or(status.as_u16());
        let description = parsed
            .description
            .unwrap_or_else(|| format!("{} failed", method));

        match code {
            429 => Err(TelegramError::RateLimited(
                parsed
                    .parameters
                    .and_then(|p| p.retry_after)
                    .map(Duration::from_secs),
            )),
            401 | 403 => Err(TelegramError::Unauthorized(description)),
            _ => Err(TelegramError::Api { code, description }),
        }
    }

    pub(crate) async fn send_message(
        &self,
        chat_id: &str,
        text: &str,
        notify: bool,
    ) -> Result<i64, TelegramError> {
        let message: Message = self
            .call(
                "sendMessage",
                &SendMessageRequest {
                    chat_id,
                    text,
                    parse_mode: "HTML",
                    disable_notification: !notify,
                },
            )
            .await?;
        Ok(message.message_id)
    }

    pub(crate) async fn send_photo(
        &self,
        chat_id: &str,
        photo: &str,
        caption: &str,
        notify: bool,
    ) -> Result<i64, TelegramError> {
        let message: Message = self
            .call(
                "sendPhoto",
                &SendPhotoRequest {
                    chat_id,
                    photo,
                    caption,
                    parse_mode: "HTML",
                    disable_notification: !notify,
                },
            )
            .await?;
        Ok(message.message_id)
    }

    pub(crate) async fn send_poll(
        &self,
        chat_id: &str,
        question: &str,
        options: &[&str],
        multiple: bool,
        notify: bool,
    ) -> Result<i64, TelegramError> {
        let message: Message = self
            .call(
                "sendPoll",
                &SendPollRequest {
                    chat_id,
                    question,
                    options: options
                        .iter()
                        .map(|text| PollOptionRequest { text: *text })
                        .collect(),
                    // Channels only allow anonymous polls
                    is_anonymous: true,
                    allows_multiple_answers: multiple,
                    disable_notification: !notify,
                },
            )
            .await?;
        Ok(message.message_id)
    }

    pub(crate) async fn get_updates(&self, limit: u32) -> Result<Vec<Update>, TelegramError> {
        self.call(
            "getUpdates",
            &GetUpdatesRequest {
                limit,
                allowed_updates: ["channel_post"],
            },
        )
        .await
    }

    /// Download URL of a file the bot can access
    pub(crate) async fn file_url(&self, file_id: &str) -> Result<String, TelegramError> {
        let file: File = self.call("getFile", &GetFileRequest { file_id }).await?;
        let path = file
            .file_path
            .ok_or_else(|| TelegramError::Decode("getFile returned no file_path".to_string()))?;
        Ok(format!(
            "{}/file/bot{}/{}",
            self.base_url,
            self.token.expose_secret(),
            path
        ))
    }
}
