//! VK sender - publishes wall posts, uploading the first photo if present

use async_trait::async_trait;
use crosspost_domain::usecases::{Delivery, SuccessHook};
use crosspost_domain::{RetryPolicy, SendError, Sender, TransferPost};
use reqwest::multipart::{Form, Part};
use secrecy::SecretString;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;

use super::{
    GroupsResponse, PageTypeCache, SavedPhoto, UploadServer, UploadedPhoto, VK_API_URL, VkApi,
    VkError, WallPostResult,
};
use crate::http::{DEFAULT_TIMEOUT, build_client};
use crate::text::{char_len, clean_plain_text};

/// Post length limit for groups
pub const GROUP_MAX_POST_LEN: usize = 2000;
/// Post length limit for public pages
pub const PUBLIC_PAGE_MAX_POST_LEN: usize = 4096;

/// VK sender configuration
#[derive(Debug, Clone)]
pub struct VkSenderConfig {
    /// Community owner id (negative for groups)
    pub group_id: i64,
    pub timeout: Duration,
}

impl VkSenderConfig {
    pub fn new(group_id: i64) -> Self {
        Self {
            group_id,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

pub struct VkSender {
    api: VkApi,
    config: VkSenderConfig,
    system_name: String,
    hook: Arc<SuccessHook>,
    page_types: Arc<PageTypeCache>,
    retry: RetryPolicy,
}

impl VkSender {
    pub fn new(
        token: SecretString,
        config: VkSenderConfig,
        system_name: impl Into<String>,
        hook: Arc<SuccessHook>,
        page_types: Arc<PageTypeCache>,
    ) -> Self {
        Self::with_base_url(
            token,
            VK_API_URL.to_string(),
            config,
            system_name,
            hook,
            page_types,
        )
    }

    pub fn with_base_url(
        token: SecretString,
        base_url: String,
        config: VkSenderConfig,
        system_name: impl Into<String>,
        hook: Arc<SuccessHook>,
        page_types: Arc<PageTypeCache>,
    ) -> Self {
        let client = build_client(config.timeout);
        Self {
            api: VkApi::new(client, token, base_url),
            config,
            system_name: system_name.into(),
            hook,
            page_types,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn community_id(&self) -> i64 {
        self.config.group_id.abs()
    }

    async fn is_public_page(&self) -> bool {
        let group_id = self.community_id();
        if let Some(is_public) = self.page_types.get(group_id) {
            return is_public;
        }

        let is_public = match self
            .api
            .call::<GroupsResponse>(
                "groups.getById",
                &[
                    ("group_id", group_id.to_string()),
                    ("fields", "type".to_string()),
                ],
            )
            .await
        {
            Ok(response) => {
                let groups = response.into_groups();
                let kind = groups.first().map(|g| g.kind.as_str()).unwrap_or("unknown");
                tracing::debug!(group_id, kind = %kind, "Detected VK page type");
                kind == "page"
            }
            Err(e) => {
                tracing::warn!(
                    group_id,
                    error = %e,
                    "Failed to detect VK page type, using group limits"
                );
                false
            }
        };

        self.page_types.set(group_id, is_public);
        is_public
    }

    async fn max_post_len(&self) -> usize {
        if self.is_public_page().await {
            PUBLIC_PAGE_MAX_POST_LEN
        } else {
            GROUP_MAX_POST_LEN
        }
    }

    /// Upload a photo to the community wall album, returning its attachment id
    async fn upload_photo(&self, photo_url: &str) -> Result<String, VkError> {
        let group_id = self.community_id().to_string();

        let server: UploadServer = self
            .api
            .call(
                "photos.getWallUploadServer",
                &[("group_id", group_id.clone())],
            )
            .await?;

        let bytes = self
            .api
            .client()
            .get(photo_url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| VkError::Http(format!("Failed to download photo: {}", e)))?
            .bytes()
            .await
            .map_err(|e| VkError::Http(format!("Failed to download photo: {}", e)))?;

        let part = Part::bytes(bytes.to_vec())
            .file_name("photo.jpg")
            .mime_str("image/jpeg")
            .map_err(|e| VkError::Decode(e.to_string()))?;

        let uploaded: UploadedPhoto = self
            .api
            .client()
            .post(&server.upload_url)
            .multipart(Form::new().part("photo", part))
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| VkError::Http(format!("Failed to upload photo: {}", e.without_url())))?
            .json()
            .await
            .map_err(|e| VkError::Decode(format!("Invalid upload response: {}", e)))?;

        if uploaded.photo.is_empty() || uploaded.photo == "[]" {
            return Err(VkError::Decode(
                "upload server returned empty photo data".to_string(),
            ));
        }

        let saved: Vec<SavedPhoto> = self
            .api
            .call(
                "photos.saveWallPhoto",
                &[
                    ("group_id", group_id),
                    ("photo", uploaded.photo),
                    ("server", uploaded.server.to_string().trim_matches('"').to_string()),
                    ("hash", uploaded.hash),
                ],
            )
            .await?;

        let photo = saved
            .first()
            .ok_or_else(|| VkError::Decode("saveWallPhoto returned no photos".to_string()))?;
        Ok(format!("photo{}_{}", photo.owner_id, photo.id))
    }

    async fn wall_post(&self, message: &str, attachment: Option<&str>) -> Result<i64, SendError> {
        let mut params = vec![
            ("owner_id", self.config.group_id.to_string()),
            ("from_group", "1".to_string()),
            ("message", message.to_string()),
        ];
        if let Some(attachment) = attachment {
            params.push(("attachments", attachment.to_string()));
        }
        let params = params.as_slice();

        let result = self
            .retry
            .run("wall.post", move || async move {
                self.api
                    .call::<WallPostResult>("wall.post", params)
                    .await
                    .map_err(SendError::from)
            })
            .await?;
        Ok(result.post_id)
    }
}

#[async_trait]
impl Sender for VkSender {
    fn system_name(&self) -> &str {
        &self.system_name
    }

    fn supports_polls(&self) -> bool {
        false
    }

    async fn send_post(&self, transfer: &mut TransferPost<'_>) -> Result<(), SendError> {
        let text = clean_plain_text(&transfer.post.text_with_poll(OffsetDateTime::now_utc()));
        let text_len = char_len(&text);
        let max_len = self.max_post_len().await;

        if text_len > max_len {
            tracing::warn!(
                post = %transfer.post.ids,
                text_len,
                max_allowed = max_len,
                has_photo = transfer.post.has_photo(),
                "Post text exceeds length limit, skipping"
            );
            return Ok(());
        }

        let photo = transfer.post.first_photo().map(String::from);
        let post_id = match photo {
            Some(photo_url) => {
                let attachment = self
                    .upload_photo(&photo_url)
                    .await
                    .map_err(SendError::from)?;
                self.wall_post(&text, Some(&attachment)).await?
            }
            None if text.is_empty() => {
                tracing::debug!(post = %transfer.post.ids, "Nothing to post after cleaning");
                return Ok(());
            }
            None => self.wall_post(&text, None).await?,
        };

        transfer.record_sent(post_id.to_string());
        let delivery = if transfer.post.has_photo() {
            Delivery::photo()
        } else {
            Delivery::text()
        };
        self.hook.handle_successful_send(transfer, delivery).await;
        Ok(())
    }
}
