//! VK retriever - reads a community wall with `wall.get`

use async_trait::async_trait;
use crosspost_domain::{IgnoreTag, Poll, PollOption, Post, PostId, RetrieveError, Retriever};
use secrecy::SecretString;
use std::time::Duration;
use time::OffsetDateTime;

use super::{Attachment, User, VK_API_URL, VkApi, WallItem, WallItems, is_truthy};
use crate::http::{DEFAULT_TIMEOUT, build_client};

/// VK retriever configuration
#[derive(Debug, Clone)]
pub struct VkRetrieverConfig {
    /// Community owner id (negative for groups)
    pub group_id: i64,
    pub item_count: usize,
    pub ignore_tag: IgnoreTag,
    /// Native post ids never to cross-post
    pub exclude_post_ids: Vec<i64>,
    pub timeout: Duration,
}

impl VkRetrieverConfig {
    pub fn new(group_id: i64, ignore_tag: IgnoreTag) -> Self {
        Self {
            group_id,
            item_count: 10,
            ignore_tag,
            exclude_post_ids: vec![],
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

pub struct VkRetriever {
    api: VkApi,
    config: VkRetrieverConfig,
    channel_id: String,
    system_name: String,
}

impl VkRetriever {
    pub fn new(token: SecretString, config: VkRetrieverConfig, system_name: impl Into<String>) -> Self {
        Self::with_base_url(token, VK_API_URL.to_string(), config, system_name)
    }

    pub fn with_base_url(
        token: SecretString,
        base_url: String,
        config: VkRetrieverConfig,
        system_name: impl Into<String>,
    ) -> Self {
        let client = build_client(config.timeout);
        Self {
            api: VkApi::new(client, token, base_url),
            channel_id: config.group_id.to_string(),
            config,
            system_name: system_name.into(),
        }
    }

    /// Reason to drop a wall item, if any
    fn skip_reason(&self, item: &WallItem) -> Option<&'static str> {
        if item.from_id != self.config.group_id {
            return Some("post by alien");
        }
        if self.config.exclude_post_ids.contains(&item.id) {
            return Some("excluded post id");
        }
        if is_truthy(&item.marked_as_ads) {
            return Some("marked as ads");
        }
        if self.config.ignore_tag.is_match(&item.text) {
            return Some("tagged with ignore tag");
        }
        if item.copy_history.is_some() {
            return Some("repost");
        }
        None
    }

    async fn author(&self, item: &WallItem) -> Option<String> {
        let user_id = match (item.signer_id, &item.post_author_data) {
            (Some(signer), _) => signer,
            (None, Some(data)) if !is_truthy(&item.check_sign) => data.author?,
            _ => return None,
        };

        let users: Vec<User> = match self
            .api
            .call("users.get", &[("user_ids", user_id.to_string())])
            .await
        {
            Ok(users) => users,
            Err(e) => {
                tracing::warn!(user_id, error = %e, "Failed to get author");
                return None;
            }
        };

        let user = users.into_iter().next()?;
        let full_name = format!("{} {}", user.first_name, user.last_name)
            .trim()
            .to_string();
        if full_name.is_empty() || full_name == "DELETED" {
            return None;
        }
        Some(full_name)
    }

    async fn to_post(&self, item: WallItem) -> Post {
        let author = self.author(&item).await;

        let mut post = Post::new(
            PostId::new(item.id.to_string(), self.system_name.as_str()),
            item.text,
        );
        post.photos = parse_photos(&item.attachments);
        post.videos = parse_videos(&item.attachments);
        post.links = parse_links(&item.attachments);
        post.poll = parse_poll(&item.attachments);
        post.author = author;
        post
    }
}

fn parse_photos(attachments: &[Attachment]) -> Vec<String> {
    attachments
        .iter()
        .filter(|a| a.kind == "photo")
        .filter_map(|a| a.photo.as_ref())
        .filter_map(|photo| photo.sizes.last().map(|size| size.url.clone()))
        .collect()
}

fn parse_videos(attachments: &[Attachment]) -> Vec<String> {
    attachments
        .iter()
        .filter(|a| a.kind == "video")
        .filter_map(|a| a.video.as_ref())
        .map(|video| format!("https://vk.com/video{}_{}", video.owner_id, video.id))
        .collect()
}

fn parse_links(attachments: &[Attachment]) -> Vec<(String, String)> {
    attachments
        .iter()
        .filter(|a| a.kind == "link")
        .filter_map(|a| a.link.as_ref())
        .map(|link| {
            let title = if link.title.is_empty() {
                link.url.clone()
            } else {
                link.title.clone()
            };
            (title, link.url.clone())
        })
        .collect()
}

fn parse_poll(attachments: &[Attachment]) -> Option<Poll> {
    let poll = attachments
        .iter()
        .filter(|a| a.kind == "poll")
        .find_map(|a| a.poll.as_ref())?;

    Some(Poll {
        question: poll.question.clone().unwrap_or_else(|| "Poll".to_string()),
        options: poll
            .answers
            .iter()
            .map(|answer| PollOption {
                text: answer.text.clone(),
                votes: answer.votes,
            })
            .collect(),
        total_votes: poll.votes,
        is_anonymous: poll.anonymous.unwrap_or(true),
        is_multiple_choice: poll.multiple.unwrap_or(false),
        // Zero means the poll never closes
        end_date: poll
            .end_date
            .filter(|ts| *ts > 0)
            .and_then(|ts| OffsetDateTime::from_unix_timestamp(ts).ok()),
    })
}

#[async_trait]
impl Retriever for VkRetriever {
    fn system_name(&self) -> &str {
        &self.system_name
    }

    fn channel_id(&self) -> &str {
        &self.channel_id
    }

    async fn retrieve_posts(&self) -> Result<Vec<Post>, RetrieveError> {
        let wall: WallItems = self
            .api
            .call(
                "wall.get",
                &[
                    ("owner_id", self.config.group_id.to_string()),
                    ("offset", "0".to_string()),
                    ("count", self.config.item_count.to_string()),
                ],
            )
            .await?;

        let mut posts = Vec::new();
        // Newest first on the wall; deliver oldest first
        for item in wall.items.into_iter().rev() {
            if let Some(reason) = self.skip_reason(&item) {
                tracing::debug!(vk_id = item.id, reason, "Skip post");
                continue;
            }
            posts.push(self.to_post(item).await);
        }

        Ok(posts)
    }
}
