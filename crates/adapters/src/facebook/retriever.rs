//! Facebook retriever - reads recent page posts from the Graph API

use async_trait::async_trait;
use crosspost_domain::{IgnoreTag, Post, PostId, RetrieveError, Retriever};
use secrecy::SecretString;
use serde::Deserialize;
use std::time::Duration;

use super::{GRAPH_API_URL, GraphApi};
use crate::http::{DEFAULT_TIMEOUT, build_client};
use crate::text::extract_urls;

const POST_FIELDS: &str = "id,message,full_picture,attachments{media,url}";

/// Facebook retriever configuration
#[derive(Debug, Clone)]
pub struct FacebookRetrieverConfig {
    pub page_id: String,
    pub item_count: usize,
    pub ignore_tag: IgnoreTag,
    pub timeout: Duration,
}

impl FacebookRetrieverConfig {
    pub fn new(page_id: impl Into<String>, ignore_tag: IgnoreTag) -> Self {
        Self {
            page_id: page_id.into(),
            item_count: 10,
            ignore_tag,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PagePosts {
    #[serde(default)]
    data: Vec<PagePost>,
}

#[derive(Debug, Deserialize)]
struct PagePost {
    id: String,
    #[serde(default)]
    message: String,
    full_picture: Option<String>,
    attachments: Option<Attachments>,
}

#[derive(Debug, Deserialize)]
struct Attachments {
    #[serde(default)]
    data: Vec<AttachmentData>,
}

#[derive(Debug, Deserialize)]
struct AttachmentData {
    media: Option<Media>,
}

#[derive(Debug, Deserialize)]
struct Media {
    image: Option<Image>,
}

#[derive(Debug, Deserialize)]
struct Image {
    src: String,
}

pub struct FacebookRetriever {
    api: GraphApi,
    config: FacebookRetrieverConfig,
    system_name: String,
}

impl FacebookRetriever {
    pub fn new(
        token: SecretString,
        config: FacebookRetrieverConfig,
        system_name: impl Into<String>,
    ) -> Self {
        Self::with_base_url(token, GRAPH_API_URL.to_string(), config, system_name)
    }

    pub fn with_base_url(
        token: SecretString,
        base_url: String,
        config: FacebookRetrieverConfig,
        system_name: impl Into<String>,
    ) -> Self {
        let client = build_client(config.timeout);
        Self {
            api: GraphApi::new(client, token, base_url),
            config,
            system_name: system_name.into(),
        }
    }

    fn to_post(&self, page_post: PagePost) -> Option<Post> {
        if self.config.ignore_tag.is_match(&page_post.message) {
            tracing::debug!(fb_id = %page_post.id, "Skipping post with ignore tag");
            return None;
        }

        let attachment_images = page_post
            .attachments
            .into_iter()
            .flat_map(|attachments| attachments.data)
            .filter_map(|attachment| attachment.media?.image)
            .map(|image| image.src);

        let mut photos: Vec<String> = Vec::new();
        for src in page_post.full_picture.into_iter().chain(attachment_images) {
            if !src.is_empty() && !photos.contains(&src) {
                photos.push(src);
            }
        }

        if page_post.message.trim().is_empty() && photos.is_empty() {
            tracing::debug!(fb_id = %page_post.id, "Skipping empty post");
            return None;
        }

        let mut post = Post::new(
            PostId::new(page_post.id, self.system_name.as_str()),
            page_post.message,
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
impl Retriever for FacebookRetriever {
    fn system_name(&self) -> &str {
        &self.system_name
    }

    fn channel_id(&self) -> &str {
        &self.config.page_id
    }

    async fn retrieve_posts(&self) -> Result<Vec<Post>, RetrieveError> {
        let page: PagePosts = self
            .api
            .get(
                &format!("{}/posts", self.config.page_id),
                &[
                    ("fields", POST_FIELDS.to_string()),
                    ("limit", self.config.item_count.to_string()),
                ],
            )
            .await?;

        // The feed lists newest first
        let posts: Vec<Post> = page
            .data
            .into_iter()
            .rev()
            .filter_map(|page_post| self.to_post(page_post))
            .collect();

        tracing::debug!(
            page_id = %self.config.page_id,
            count = posts.len(),
            "Facebook posts retrieved"
        );
        Ok(posts)
    }
}
