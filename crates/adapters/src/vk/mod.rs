//! VK API adapters

mod page_type;
mod retriever;
mod sender;

pub use page_type::PageTypeCache;
pub use retriever::{VkRetriever, VkRetrieverConfig};
pub use sender::{VkSender, VkSenderConfig};

use crosspost_domain::{RetrieveError, SendError};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;

pub const VK_API_URL: &str = "https://api.vk.com";
pub const VK_API_VERSION: &str = "5.199";

/// Failure of a single VK API call
#[derive(Debug, thiserror::Error)]
pub(crate) enum VkError {
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("VK error {code}: {message}")]
    Api { code: i64, message: String },
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("authorization failed: {0}")]
    Auth(String),
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl From<VkError> for SendError {
    fn from(error: VkError) -> Self {
        match error {
            VkError::Http(e) => SendError::Network(e),
            VkError::RateLimited(_) => SendError::RateLimited(None),
            VkError::Auth(e) => SendError::Auth(e),
            other => SendError::Api(other.to_string()),
        }
    }
}

impl From<VkError> for RetrieveError {
    fn from(error: VkError) -> Self {
        match error {
            VkError::Http(e) => RetrieveError::Network(e),
            VkError::RateLimited(_) => RetrieveError::RateLimited(None),
            VkError::Auth(e) => RetrieveError::Auth(e),
            VkError::Decode(e) => RetrieveError::InvalidResponse(e),
            other => RetrieveError::Api(other.to_string()),
        }
    }
}

#[derive(Deserialize)]
struct ApiResponse<T> {
    response: Option<T>,
    error: Option<ApiError>,
}

#[derive(Deserialize)]
struct ApiError {
    error_code: i64,
    #[serde(default)]
    error_msg: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WallItems {
    #[serde(default)]
    pub items: Vec<WallItem>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WallItem {
    pub id: i64,
    pub from_id: i64,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub marked_as_ads: serde_json::Value,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub copy_history: Option<serde_json::Value>,
    #[serde(default)]
    pub signer_id: Option<i64>,
    #[serde(default)]
    pub check_sign: serde_json::Value,
    #[serde(default)]
    pub post_author_data: Option<PostAuthorData>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PostAuthorData {
    pub author: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Attachment {
    #[serde(rename = "type")]
    pub kind: String,
    pub photo: Option<Photo>,
    pub video: Option<Video>,
    pub link: Option<Link>,
    pub poll: Option<VkPoll>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Photo {
    #[serde(default)]
    pub sizes: Vec<PhotoSize>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PhotoSize {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Video {
    pub id: i64,
    pub owner_id: i64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Link {
    #[serde(default)]
    pub title: String,
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct VkPoll {
    pub question: Option<String>,
    #[serde(default)]
    pub answers: Vec<PollAnswer>,
    pub votes: Option<u64>,
    pub anonymous: Option<bool>,
    pub multiple: Option<bool>,
    pub end_date: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PollAnswer {
    pub text: String,
    #[serde(default)]
    pub votes: u64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct User {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Group {
    #[serde(rename = "type", default)]
    pub kind: String,
}

/// `groups.getById` answers with a bare list or, in newer versions, `{groups: [...]}`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum GroupsResponse {
    Wrapped { groups: Vec<Group> },
    List(Vec<Group>),
}

impl GroupsResponse {
    pub(crate) fn into_groups(self) -> Vec<Group> {
        match self {
            GroupsResponse::Wrapped { groups } => groups,
            GroupsResponse::List(groups) => groups,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct WallPostResult {
    pub post_id: i64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UploadServer {
    pub upload_url: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UploadedPhoto {
    #[serde(default)]
    pub photo: String,
    pub server: serde_json::Value,
    pub hash: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SavedPhoto {
    pub id: i64,
    pub owner_id: i64,
}

/// Thin VK API client
pub(crate) struct VkApi {
    client: Client,
    token: SecretString,
    base_url: String,
}

impl VkApi {
    pub(crate) fn new(client: Client, token: SecretString, base_url: String) -> Self {
        Self {
            client,
            token,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub(crate) fn client(&self) -> &Client {
        &self.client
    }

    pub(crate) async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: &[(&str, String)],
    ) -> Result<T, VkError> {
        let mut query: Vec<(&str, &str)> = params.iter().map(|(k, v)| (*k, v.as_str())).collect();
        query.push(("access_token", self.token.expose_secret()));
        query.push(("v", VK_API_VERSION));

        // Parameters travel in the form body; post texts are too long for a URL
        let response = self
            .client
            .post(format!("{}/method/{}", self.base_url, method))
            .form(&query)
            .send()
            .await
            .map_err(|e| VkError::Http(e.without_url().to_string()))?;

        if response.status() == 429 {
            return Err(VkError::RateLimited(format!("{} returned HTTP 429", method)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| VkError::Http(e.without_url().to_string()))?;

        let parsed: ApiResponse<T> = serde_json::from_str(&body)
            .map_err(|e| VkError::Decode(format!("{}: {}", method, e)))?;

        if let Some(error) = parsed.error {
            return Err(match error.error_code {
                5 => VkError::Auth(error.error_msg),
                6 | 9 | 29 => VkError::RateLimited(error.error_msg),
                code => VkError::Api {
                    code,
                    message: error.error_msg,
                },
            });
        }

        parsed
            .response
            .ok_or_else(|| VkError::Decode(format!("{} returned neither response nor error", method)))
    }
}

/// VK flags arrive as `0`/`1` or booleans
pub(crate) fn is_truthy(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::Number(n) => n.as_i64().is_some_and(|n| n != 0),
        serde_json::Value::String(s) => !s.is_empty() && s != "0",
        _ => false,
    }
}
