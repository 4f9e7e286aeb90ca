//! Telegram sender - publishes posts to a channel through the Bot API

use async_trait::async_trait;
use crosspost_domain::usecases::{Delivery, SuccessHook};
use crosspost_domain::{MessageSplitter, Poll, RetryPolicy, SendError, Sender, TransferPost};
use secrecy::SecretString;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;

use super::formatter::TelegramFormatter;
use super::{TELEGRAM_API_URL, TelegramApi};
use crate::http::{DEFAULT_TIMEOUT, build_client};
use crate::text::{char_len, escape_html};

pub const MAX_POLL_OPTIONS: usize = 10;
pub const MAX_POLL_QUESTION_LEN: usize = 300;
pub const MESSAGE_SPLIT_LEN: usize = 4000;

/// Telegram sender configuration
#[derive(Debug, Clone)]
pub struct TelegramSenderConfig {
    /// Numeric chat id or `@channelusername`
    pub chat_id: String,
    pub enable_notification: bool,
    /// Author never credited under photo captions
    pub excluded_author: Option<String>,
    pub timeout: Duration,
}

impl TelegramSenderConfig {
    pub fn new(chat_id: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
            enable_notification: false,
            excluded_author: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

pub struct TelegramSender {
    api: TelegramApi,
    config: TelegramSenderConfig,
    system_name: String,
    hook: Arc<SuccessHook>,
    formatter: TelegramFormatter,
    splitter: MessageSplitter,
    retry: RetryPolicy,
}

enum PollOutcome {
    /// Poll sent, or deliberately skipped
    Handled,
    /// Poll unusable here; deliver the post as text
    Fallback,
}

impl TelegramSender {
    pub fn new(
        token: SecretString,
        config: TelegramSenderConfig,
        system_name: impl Into<String>,
        hook: Arc<SuccessHook>,
    ) -> Self {
        Self::with_base_url(token, TELEGRAM_API_URL.to_string(), config, system_name, hook)
    }

    pub fn with_base_url(
        token: SecretString,
        base_url: String,
        config: TelegramSenderConfig,
        system_name: impl Into<String>,
        hook: Arc<SuccessHook>,
    ) -> Self {
        let client = build_client(config.timeout);
        Self {
            api: TelegramApi::new(client, token, base_url),
            formatter: TelegramFormatter::new(config.excluded_author.clone()),
            config,
            system_name: system_name.into(),
            hook,
            splitter: MessageSplitter::new(MESSAGE_SPLIT_LEN),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn notify(&self) -> bool {
        self.config.enable_notification
    }

    async fn send_poll(
        &self,
        transfer: &mut TransferPost<'_>,
        poll: &Poll,
    ) -> Result<PollOutcome, SendError> {
        if poll.option_count() > MAX_POLL_OPTIONS {
            tracing::warn!(
                post = %transfer.post.ids,
                options = poll.option_count(),
                max_allowed = MAX_POLL_OPTIONS,
                "Poll has too many options for Telegram, skipping post"
            );
            return Ok(PollOutcome::Handled);
        }

        if poll.option_count() < 2 {
            tracing::warn!(
                post = %transfer.post.ids,
                options = poll.option_count(),
                "Poll needs at least 2 options, falling back to text message"
            );
            return Ok(PollOutcome::Fallback);
        }

        let question_len = char_len(&poll.question);
        if question_len > MAX_POLL_QUESTION_LEN {
            tracing::warn!(
                post = %transfer.post.ids,
                question_len,
                max_allowed = MAX_POLL_QUESTION_LEN,
                "Poll question too long for Telegram, skipping post"
            );
            return Ok(PollOutcome::Handled);
        }

        let text = self.formatter.message_text(transfer.post);
        self.send_text(transfer, &text).await?;

        let options: Vec<&str> = poll.options.iter().map(|o| o.text.as_str()).collect();
        let options = options.as_slice();
        let question = poll.question.as_str();
        let multiple = poll.is_multiple_choice;

        let sent = self
            .retry
            .run("sendPoll", move || async move {
                self.api
                    .send_poll(&self.config.chat_id, question, options, multiple, self.notify())
                    .await
                    .map_err(SendError::from)
            })
            .await;

        match sent {
            Ok(message_id) => {
                transfer.record_sent(message_id.to_string());
                self.hook
                    .handle_successful_send(transfer, Delivery::text())
                    .await;
            }
            Err(e) if e.is_rate_limited() => return Err(e),
            Err(e) => {
                tracing::warn!(
                    post = %transfer.post.ids,
                    error = %e,
                    "Failed to send poll, falling back to text message"
                );
                // Lead text is already out; only the poll itself goes as text
                let poll_text = escape_html(&poll.formatted_text(OffsetDateTime::now_utc()));
                self.send_text(transfer, &poll_text).await?;
            }
        }
        Ok(PollOutcome::Handled)
    }

    async fn send_photo(
        &self,
        transfer: &mut TransferPost<'_>,
        photo: &str,
        caption: &str,
    ) -> Result<(), SendError> {
        let message_id = self
            .retry
            .run("sendPhoto", move || async move {
                self.api
                    .send_photo(&self.config.chat_id, photo, caption, self.notify())
                    .await
                    .map_err(SendError::from)
            })
            .await?;

        transfer.record_sent(message_id.to_string());
        self.hook
            .handle_successful_send(transfer, Delivery::photo())
            .await;
        Ok(())
    }

    /// Send text as one or more messages.
    ///
    /// Every part is attempted and recorded on its own; the first failure is
    /// returned once all parts have been tried.
    async fn send_text(&self, transfer: &mut TransferPost<'_>, text: &str) -> Result<(), SendError> {
        let parts = self.splitter.split(text);
        let total = parts.len();
        let mut first_error = None;

        for (index, part) in parts.iter().enumerate() {
            let part = part.as_str();
            let sent = self
                .retry
                .run("sendMessage", move || async move {
                    self.api
                        .send_message(&self.config.chat_id, part, self.notify())
                        .await
                        .map_err(SendError::from)
                })
                .await;

            match sent {
                Ok(message_id) => {
                    transfer.record_sent(message_id.to_string());
                    self.hook
                        .handle_successful_send(transfer, Delivery::chunk(index + 1, total))
                        .await;
                }
                Err(e) => {
                    tracing::warn!(
                        post = %transfer.post.ids,
                        part = index + 1,
                        total,
                        error = %e,
                        "Failed to send message part"
                    );
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Sender for TelegramSender {
    fn system_name(&self) -> &str {
        &self.system_name
    }

    fn supports_polls(&self) -> bool {
        true
    }

    async fn send_post(&self, transfer: &mut TransferPost<'_>) -> Result<(), SendError> {
        if let Some(poll) = transfer.post.poll.clone() {
            match self.send_poll(transfer, &poll).await? {
                PollOutcome::Handled => return Ok(()),
                PollOutcome::Fallback => {}
            }
        }

        if let Some(caption) = self.formatter.photo_caption(transfer.post) {
            let photo = transfer.post.first_photo().unwrap_or_default().to_string();
            match self.send_photo(transfer, &photo, &caption).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_rate_limited() => return Err(e),
                Err(e) => {
                    tracing::warn!(
                        post = %transfer.post.ids,
                        photo = %photo,
                        error = %e,
                        "Failed to send photo, falling back to text message"
                    );
                }
            }
        }

        let text = self.formatter.message_text(transfer.post);
        self.send_text(transfer, &text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crosspost_domain::{PollOption, Post, PostId, PostIdRepository};
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::repository::InMemoryRepository;

    fn ok_message(id: i64) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "ok": true,
            "result": {"message_id": id, "chat": {"id": -100}}
        }))
    }

    fn sender(server: &MockServer, repository: Arc<InMemoryRepository>) -> TelegramSender {
        TelegramSender::with_base_url(
            SecretString::new("TOKEN".into()),
            server.uri(),
            TelegramSenderConfig::new("@channel"),
            "tg",
            Arc::new(SuccessHook::new(repository)),
        )
        .with_retry_policy(RetryPolicy::immediate())
    }

    #[tokio::test]
    async fn test_single_photo_sent_as_captioned_photo() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botTOKEN/sendPhoto"))
            .and(body_partial_json(serde_json::json!({
                "chat_id": "@channel",
                "photo": "https://example.com/a.jpg",
                "caption": "Short caption",
                "parse_mode": "HTML"
            })))
            .respond_with(ok_message(501))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/botTOKEN/sendMessage"))
            .respond_with(ok_message(1))
            .expect(0)
            .mount(&server)
            .await;

        let repository = Arc::new(InMemoryRepository::new());
        let sender = sender(&server, repository.clone());

        let mut post = Post::new(PostId::new("1", "vk"), "Short caption");
        post.photos = vec!["https://example.com/a.jpg".to_string()];
        let mut transfer = TransferPost::new(&mut post, "vk", "tg");

        sender.send_post(&mut transfer).await.unwrap();

        assert_eq!(transfer.transferred_ids().len(), 1);
        assert_eq!(
            transfer.transferred_ids().first(),
            Some(&PostId::new("501", "tg"))
        );
        let stored = repository
            .find(&PostId::new("501", "tg"))
            .await
            .unwrap()
            .unwrap();
        assert!(stored.contains(&PostId::new("1", "vk")));
    }

    #[tokio::test]
    async fn test_long_text_sent_in_parts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botTOKEN/sendMessage"))
            .respond_with(ok_message(7))
            .expect(2)
            .mount(&server)
            .await;

        let repository = Arc::new(InMemoryRepository::new());
        let sender = sender(&server, repository);

        let sentence = "This sentence is repeated many times. ";
        let text = sentence.repeat(MESSAGE_SPLIT_LEN / sentence.len() + 10);
        let mut post = Post::new(PostId::new("1", "vk"), text);
        let mut transfer = TransferPost::new(&mut post, "vk", "tg");

        sender.send_post(&mut transfer).await.unwrap();

        // Both parts answered with the same id, which is recorded once
        assert_eq!(transfer.transferred_ids().len(), 1);
    }

    #[tokio::test]
    async fn test_rate_limit_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botTOKEN/sendMessage"))
            .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
                "ok": false,
                "error_code": 429,
                "description": "Too Many Requests: retry after 1",
                "parameters": {"retry_after": 1}
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/botTOKEN/sendMessage"))
            .respond_with(ok_message(9))
            .mount(&server)
            .await;

        let sender = sender(&server, Arc::new(InMemoryRepository::new()));
        let mut post = Post::new(PostId::new("1", "vk"), "Hello");
        let mut transfer = TransferPost::new(&mut post, "vk", "tg");

        sender.send_post(&mut transfer).await.unwrap();

        assert_eq!(
            transfer.transferred_ids().first(),
            Some(&PostId::new("9", "tg"))
        );
    }

    #[tokio::test]
    async fn test_api_error_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botTOKEN/sendMessage"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "ok": false,
                "error_code": 400,
                "description": "Bad Request: chat not found"
            })))
            .mount(&server)
            .await;

        let sender = sender(&server, Arc::new(InMemoryRepository::new()));
        let mut post = Post::new(PostId::new("1", "vk"), "Hello");
        let mut transfer = TransferPost::new(&mut post, "vk", "tg");

        let result = sender.send_post(&mut transfer).await;

        assert!(matches!(result, Err(SendError::Api(ref e)) if e.contains("chat not found")));
        assert!(transfer.transferred_ids().is_empty());
    }

    fn poll(options: usize) -> Poll {
        Poll {
            question: "Where to?".to_string(),
            options: (0..options)
                .map(|i| PollOption {
                    text: format!("Option {}", i + 1),
                    votes: 0,
                })
                .collect(),
            total_votes: None,
            is_anonymous: true,
            is_multiple_choice: false,
            end_date: None,
        }
    }

    #[tokio::test]
    async fn test_poll_preceded_by_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botTOKEN/sendMessage"))
            .respond_with(ok_message(10))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/botTOKEN/sendPoll"))
            .and(body_partial_json(serde_json::json!({
                "question": "Where to?",
                "options": [{"text": "Option 1"}, {"text": "Option 2"}],
                "is_anonymous": true
            })))
            .respond_with(ok_message(11))
            .expect(1)
            .mount(&server)
            .await;

        let sender = sender(&server, Arc::new(InMemoryRepository::new()));
        let mut post = Post::new(PostId::new("1", "vk"), "Vote below");
        post.poll = Some(poll(2));
        let mut transfer = TransferPost::new(&mut post, "vk", "tg");

        sender.send_post(&mut transfer).await.unwrap();

        assert_eq!(transfer.transferred_ids().len(), 2);
        assert_eq!(
            transfer.transferred_ids().last(),
            Some(&PostId::new("11", "tg"))
        );
    }

    #[tokio::test]
    async fn test_poll_with_too_many_options_sends_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ok_message(1))
            .expect(0)
            .mount(&server)
            .await;

        let sender = sender(&server, Arc::new(InMemoryRepository::new()));
        let mut post = Post::new(PostId::new("1", "vk"), "Vote");
        post.poll = Some(poll(MAX_POLL_OPTIONS + 1));
        let mut transfer = TransferPost::new(&mut post, "vk", "tg");

        sender.send_post(&mut transfer).await.unwrap();

        assert!(transfer.transferred_ids().is_empty());
    }

    #[tokio::test]
    async fn test_single_option_poll_falls_back_to_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botTOKEN/sendMessage"))
            .respond_with(ok_message(3))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/botTOKEN/sendPoll"))
            .respond_with(ok_message(4))
            .expect(0)
            .mount(&server)
            .await;

        let sender = sender(&server, Arc::new(InMemoryRepository::new()));
        let mut post = Post::new(PostId::new("1", "vk"), "Vote");
        post.poll = Some(poll(1));
        let mut transfer = TransferPost::new(&mut post, "vk", "tg");

        sender.send_post(&mut transfer).await.unwrap();

        assert_eq!(transfer.transferred_ids().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_part_does_not_stop_later_parts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botTOKEN/sendMessage"))
            .respond_with(ok_message(20))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/botTOKEN/sendMessage"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "ok": false,
                "error_code": 400,
                "description": "Bad Request: message is too long"
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/botTOKEN/sendMessage"))
            .respond_with(ok_message(22))
            .mount(&server)
            .await;

        let repository = Arc::new(InMemoryRepository::new());
        let sender = sender(&server, repository.clone());

        let sentence = "This sentence is repeated many times. ";
        let text = sentence.repeat(MESSAGE_SPLIT_LEN * 2 / sentence.len() + 10);
        let mut post = Post::new(PostId::new("1", "vk"), text);
        let mut transfer = TransferPost::new(&mut post, "vk", "tg");

        let result = sender.send_post(&mut transfer).await;

        assert!(matches!(result, Err(SendError::Api(ref e)) if e.contains("too long")));
        assert_eq!(server.received_requests().await.unwrap().len(), 3);
        assert_eq!(transfer.transferred_ids().len(), 2);
        assert!(transfer
            .transferred_ids()
            .contains(&PostId::new("22", "tg")));
        let stored = repository
            .find(&PostId::new("22", "tg"))
            .await
            .unwrap()
            .unwrap();
        assert!(stored.contains(&PostId::new("20", "tg")));
        assert!(stored.contains(&PostId::new("1", "vk")));
    }

    #[tokio::test]
    async fn test_failed_poll_falls_back_to_poll_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botTOKEN/sendMessage"))
            .respond_with(ok_message(10))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/botTOKEN/sendMessage"))
            .respond_with(ok_message(12))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/botTOKEN/sendPoll"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "ok": false,
                "error_code": 400,
                "description": "Bad Request: poll can't be sent"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let sender = sender(&server, Arc::new(InMemoryRepository::new()));
        let mut post = Post::new(PostId::new("1", "vk"), "Vote below");
        post.poll = Some(poll(2));
        let mut transfer = TransferPost::new(&mut post, "vk", "tg");

        sender.send_post(&mut transfer).await.unwrap();

        let texts: Vec<String> = server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .filter(|request| request.url.path().ends_with("/sendMessage"))
            .map(|request| {
                let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
                body["text"].as_str().unwrap_or_default().to_string()
            })
            .collect();
        assert_eq!(texts.len(), 2);
        assert_eq!(texts[0], "Vote below");
        assert!(texts[1].contains("Where to?"));
        assert!(texts[1].contains("Option 2"));
        assert!(!texts[1].contains("Vote below"));
        assert_eq!(transfer.transferred_ids().len(), 2);
    }

    #[tokio::test]
    async fn test_rate_limited_poll_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botTOKEN/sendMessage"))
            .respond_with(ok_message(10))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/botTOKEN/sendPoll"))
            .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
                "ok": false,
                "error_code": 429,
                "description": "Too Many Requests: retry after 1",
                "parameters": {"retry_after": 1}
            })))
            .mount(&server)
            .await;

        let sender = sender(&server, Arc::new(InMemoryRepository::new()));
        let mut post = Post::new(PostId::new("1", "vk"), "Vote below");
        post.poll = Some(poll(2));
        let mut transfer = TransferPost::new(&mut post, "vk", "tg");

        let result = sender.send_post(&mut transfer).await;

        assert!(matches!(result, Err(SendError::RateLimited(_))));
        assert_eq!(transfer.transferred_ids().len(), 1);
    }
}
