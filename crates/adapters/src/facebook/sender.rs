//! Facebook sender - publishes to a page feed or photo album

use async_trait::async_trait;
use crosspost_domain::usecases::{Delivery, SuccessHook};
use crosspost_domain::{RetryPolicy, SendError, Sender, TransferPost};
use regex::Regex;
use secrecy::SecretString;
use serde::Deserialize;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use time::OffsetDateTime;

use super::{GRAPH_API_URL, GraphApi};
use crate::http::{DEFAULT_TIMEOUT, build_client};
use crate::text::{char_len, decode_entities, strip_tags};

/// Longest message accepted by a page feed
pub const MAX_POST_LEN: usize = 63206;
/// Longest text published as a photo caption
pub const MAX_CAPTION_LEN: usize = 2200;

static BLANK_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("Valid regex"));

/// Facebook sender configuration
#[derive(Debug, Clone)]
pub struct FacebookSenderConfig {
    pub page_id: String,
    pub timeout: Duration,
}

impl FacebookSenderConfig {
    pub fn new(page_id: impl Into<String>) -> Self {
        Self {
            page_id: page_id.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Published {
    id: Option<String>,
    /// Photo uploads report the feed story here
    post_id: Option<String>,
}

impl Published {
    fn into_id(self) -> Option<String> {
        self.post_id.or(self.id)
    }
}

pub struct FacebookSender {
    api: GraphApi,
    config: FacebookSenderConfig,
    system_name: String,
    hook: Arc<SuccessHook>,
    retry: RetryPolicy,
}

/// Plain text for a page post: no markup, decoded entities, tidy line breaks
pub fn format_message(text: &str) -> String {
    let text = decode_entities(&strip_tags(text)).replace("\r\n", "\n").replace('\r', "\n");
    BLANK_LINES.replace_all(&text, "\n\n").trim().to_string()
}

impl FacebookSender {
    pub fn new(
        token: SecretString,
        config: FacebookSenderConfig,
        system_name: impl Into<String>,
        hook: Arc<SuccessHook>,
    ) -> Self {
        Self::with_base_url(token, GRAPH_API_URL.to_string(), config, system_name, hook)
    }

    pub fn with_base_url(
        token: SecretString,
        base_url: String,
        config: FacebookSenderConfig,
        system_name: impl Into<String>,
        hook: Arc<SuccessHook>,
    ) -> Self {
        let client = build_client(config.timeout);
        Self {
            api: GraphApi::new(client, token, base_url),
            config,
            system_name: system_name.into(),
            hook,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn publish(&self, edge: &str, params: &[(&str, String)]) -> Result<String, SendError> {
        let path = format!("{}/{}", self.config.page_id, edge);
        let path = path.as_str();

        let published = self
            .retry
            .run(edge, move || async move {
                self.api
                    .post::<Published>(path, params)
                    .await
                    .map_err(SendError::from)
            })
            .await?;

        published
            .into_id()
            .ok_or_else(|| SendError::Api(format!("{} response carried no id", edge)))
    }

    async fn send_photo(&self, photo_url: &str, message: &str) -> Result<String, SendError> {
        self.publish(
            "photos",
            &[
                ("url", photo_url.to_string()),
                ("message", message.to_string()),
                ("published", "true".to_string()),
            ],
        )
        .await
    }

    async fn send_text(&self, message: &str) -> Result<String, SendError> {
        self.publish(
            "feed",
            &[
                ("message", message.to_string()),
                ("published", "true".to_string()),
            ],
        )
        .await
    }
}

#[async_trait]
impl Sender for FacebookSender {
    fn system_name(&self) -> &str {
        &self.system_name
    }

    fn supports_polls(&self) -> bool {
        false
    }

    async fn send_post(&self, transfer: &mut TransferPost<'_>) -> Result<(), SendError> {
        let message = format_message(&transfer.post.text_with_poll(OffsetDateTime::now_utc()));
        let message_len = char_len(&message);

        let photo = transfer.post.first_photo().map(String::from);
        if let Some(photo_url) = photo.filter(|_| message_len <= MAX_CAPTION_LEN) {
            match self.send_photo(&photo_url, &message).await {
                Ok(id) => {
                    transfer.record_sent(id);
                    self.hook
                        .handle_successful_send(transfer, Delivery::photo())
                        .await;
                    return Ok(());
                }
                Err(e) if e.is_rate_limited() => return Err(e),
                Err(e) => {
                    tracing::warn!(
                        post = %transfer.post.ids,
                        error = %e,
                        "Photo post failed, publishing text to feed instead"
                    );
                }
            }
        }

        if message.is_empty() {
            return Ok(());
        }
        if message_len > MAX_POST_LEN {
            tracing::warn!(
                post = %transfer.post.ids,
                length = message_len,
                limit = MAX_POST_LEN,
                "Facebook post exceeds character limit, skipping"
            );
            return Ok(());
        }

        let id = self.send_text(&message).await?;
        transfer.record_sent(id);
        self.hook
            .handle_successful_send(transfer, Delivery::text())
            .await;
        Ok(())
    }
}
