//! Telegram retriever - reads recent channel posts from `getUpdates`

use async_trait::async_trait;
use crosspost_domain::{IgnoreTag, Post, PostId, RetrieveError, Retriever};
use secrecy::SecretString;
use std::time::Duration;

use super::{Message, TELEGRAM_API_URL, TelegramApi};
use crate::http::{DEFAULT_TIMEOUT, build_client};
use crate::text::extract_urls;

/// Telegram retriever configuration
#[derive(Debug, Clone)]
pub struct TelegramRetrieverConfig {
    /// Numeric chat id or `@channelusername`
    pub chat_id: String,
    /// Maximum number of posts returned per pass
    pub item_count: usize,
    pub ignore_tag: IgnoreTag,
    pub timeout: Duration,
}

pub struct TelegramRetriever {
    api: TelegramApi,
    config: TelegramRetrieverConfig,
    system_name: String,
}

impl TelegramRetriever {
    pub fn new(
        token: SecretString,
        config: TelegramRetrieverConfig,
        system_name: impl Into<String>,
    ) -> Self {
        Self::with_base_url(token, TELEGRAM_API_URL.to_string(), config, system_name)
    }

    pub fn with_base_url(
        token: SecretString,
        base_url: String,
        config: TelegramRetrieverConfig,
        system_name: impl Into<String>,
    ) -> Self {
        let client = build_client(config.timeout);
        Self {
            api: TelegramApi::new(client, token, base_url),
            config,
            system_name: system_name.into(),
        }
    }

    fn is_configured_chat(&self, message: &Message) -> bool {
        let Some(chat) = &message.chat else {
            return false;
        };
        let wanted = self.config.chat_id.as_str();
        chat.id.to_string() == wanted
            || chat
                .username
                .as_deref()
                .is_some_and(|name| wanted.trim_start_matches('@').eq_ignore_ascii_case(name))
    }

    async fn to_post(&self, message: Message) -> Option<Post> {
        let text = message.text.or(message.caption).unwrap_or_default();

        if self.config.ignore_tag.is_match(&text) {
            tracing::debug!(
                message_id = message.message_id,
                tag = %self.config.ignore_tag.tag(),
                "Skipping post with ignore tag"
            );
            return None;
        }

        let mut photos = Vec::new();
        let largest = message
            .photo
            .iter()
            .max_by_key(|size| u64::from(size.width) * u64::from(size.height));
        if let Some(size) = largest {
            match self.api.file_url(&size.file_id).await {
                Ok(url) => photos.push(url),
                Err(e) => {
                    tracing::warn!(
                        message_id = message.message_id,
                        error = %e,
                        "Failed to resolve photo, continuing without it"
                    );
                }
            }
        }

        if text.trim().is_empty() && photos.is_empty() {
            return None;
        }

        let mut post = Post::new(
            PostId::new(message.message_id.to_string(), self.system_name.as_str()),
            text,
        );
        post.links = extract_urls(&post.text)
            .into_iter()
            .map(|url| (url.clone(), url))
            .collect();
        post.photos = photos;
        Some(post)
    }
}

#[async_trait]
impl Retriever for TelegramRetriever {
    fn system_name(&self) -> &str {
        &self.system_name
    }

    fn channel_id(&self) -> &str {
        &self.config.chat_id
    }

    async fn retrieve_posts(&self) -> Result<Vec<Post>, RetrieveError> {
        let updates = self.api.get_updates(100).await?;

        let mut messages: Vec<Message> = updates
            .into_iter()
            .filter_map(|update| update.channel_post)
            .filter(|message| self.is_configured_chat(message))
            .collect();
        messages.sort_by_key(|message| message.message_id);

        let skip = messages.len().saturating_sub(self.config.item_count);
        let mut posts = Vec::new();
        for message in messages.into_iter().skip(skip) {
            if let Some(post) = self.to_post(message).await {
                posts.push(post);
            }
        }

        Ok(posts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crosspost_domain::DEFAULT_IGNORE_TAG;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn retriever(server: &MockServer, item_count: usize) -> TelegramRetriever {
        TelegramRetriever::with_base_url(
            SecretString::new("TOKEN".into()),
            server.uri(),
            TelegramRetrieverConfig {
                chat_id: "@news".to_string(),
                item_count,
                ignore_tag: IgnoreTag::new(DEFAULT_IGNORE_TAG).unwrap(),
                timeout: DEFAULT_TIMEOUT,
            },
            "tg",
        )
    }

    fn channel_post(id: i64, username: &str, body: serde_json::Value) -> serde_json::Value {
        let mut message = serde_json::json!({
            "message_id": id,
            "chat": {"id": -1001, "username": username, "type": "channel"},
        });
        for (key, value) in body.as_object().unwrap() {
            message[key] = value.clone();
        }
        serde_json::json!({"update_id": id + 1000, "channel_post": message})
    }

    #[tokio::test]
    async fn test_retrieves_channel_posts_oldest_first() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botTOKEN/getUpdates"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": true,
                "result": [
                    channel_post(12, "news", serde_json::json!({"text": "Second https://example.com/x"})),
                    channel_post(11, "news", serde_json::json!({"text": "First"})),
                    channel_post(13, "other", serde_json::json!({"text": "Elsewhere"})),
                    channel_post(14, "news", serde_json::json!({"text": "Mine only #local"})),
                    {"update_id": 1, "message": {"message_id": 1}}
                ]
            })))
            .mount(&server)
            .await;

        let posts = retriever(&server, 10).retrieve_posts().await.unwrap();

        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].text, "First");
        assert_eq!(posts[1].ids.first(), Some(&PostId::new("12", "tg")));
        assert_eq!(
            posts[1].links,
            vec![(
                "https://example.com/x".to_string(),
                "https://example.com/x".to_string()
            )]
        );
    }

    #[tokio::test]
    async fn test_resolves_largest_photo() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botTOKEN/getUpdates"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": true,
                "result": [channel_post(5, "news", serde_json::json!({
                    "caption": "Look",
                    "photo": [
                        {"file_id": "small", "width": 90, "height": 90},
                        {"file_id": "big", "width": 1280, "height": 960}
                    ]
                }))]
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/botTOKEN/getFile"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": true,
                "result": {"file_id": "big", "file_path": "photos/file_1.jpg"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let posts = retriever(&server, 10).retrieve_posts().await.unwrap();

        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].text, "Look");
        assert_eq!(
            posts[0].photos,
            vec![format!("{}/file/botTOKEN/photos/file_1.jpg", server.uri())]
        );
    }

    #[tokio::test]
    async fn test_caps_to_most_recent_items() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botTOKEN/getUpdates"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": true,
                "result": [
                    channel_post(1, "news", serde_json::json!({"text": "a"})),
                    channel_post(2, "news", serde_json::json!({"text": "b"})),
                    channel_post(3, "news", serde_json::json!({"text": "c"}))
                ]
            })))
            .mount(&server)
            .await;

        let posts = retriever(&server, 2).retrieve_posts().await.unwrap();

        let texts: Vec<_> = posts.iter().map(|p| p.text.as_str()).collect();
        assert_eq!(texts, vec!["b", "c"]);
    }

    #[tokio::test]
    async fn test_unauthorized_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botTOKEN/getUpdates"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "ok": false,
                "error_code": 401,
                "description": "Unauthorized"
            })))
            .mount(&server)
            .await;

        let result = retriever(&server, 10).retrieve_posts().await;

        assert!(matches!(result, Err(RetrieveError::Auth(_))));
    }
}
