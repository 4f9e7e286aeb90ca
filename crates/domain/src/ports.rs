//! Port definitions (traits) for external dependencies
//!
//! These traits define the boundaries between the domain and external systems.
//! Adapters implement these traits to connect to real platforms and storage.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::model::{Post, PostId, PostIdCollection, TransferPost};

/// Error type for retriever operations
#[derive(Debug, Error)]
pub enum RetrieveError {
    #[error("API error: {0}")]
    Api(String),
    #[error("Rate limited, retry after: {0:?}")]
    RateLimited(Option<Duration>),
    #[error("Authentication failed: {0}")]
    Auth(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Port for pulling new posts from one source platform
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Short system name the retrieved ids belong to (e.g., "vk")
    fn system_name(&self) -> &str;

    /// Channel/group/page the retriever reads from (diagnostics only)
    fn channel_id(&self) -> &str;

    /// Fetch recent posts, oldest first, with platform pre-filters applied
    async fn retrieve_posts(&self) -> Result<Vec<Post>, RetrieveError>;
}

/// Error type for sender operations
#[derive(Debug, Error)]
pub enum SendError {
    #[error("API error: {0}")]
    Api(String),
    #[error("Rate limited, retry after: {0:?}")]
    RateLimited(Option<Duration>),
    #[error("Authentication failed: {0}")]
    Auth(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Invalid post: {0}")]
    InvalidPost(String),
}

impl SendError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, SendError::RateLimited(_))
    }
}

/// Port for pushing posts to one destination platform
///
/// On success a sender records every message it created through
/// [`TransferPost::record_sent`] and reports it to the success hook, so the
/// identity collection and the repository grow together.
#[async_trait]
pub trait Sender: Send + Sync {
    /// Short system name new ids are recorded under (e.g., "tg")
    fn system_name(&self) -> &str;

    /// Whether the destination can publish native polls
    fn supports_polls(&self) -> bool;

    /// Deliver one post
    async fn send_post(&self, transfer: &mut TransferPost<'_>) -> Result<(), SendError>;
}

/// Error type for the identity repository
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Port for the durable cross-system identity store
#[async_trait]
pub trait PostIdRepository: Send + Sync {
    /// Full identity collection of the logical post `id` belongs to
    async fn find(&self, id: &PostId) -> Result<Option<PostIdCollection>, RepositoryError>;

    /// Merge `new_ids` into the record containing `criteria_id` and persist
    async fn add_collection(
        &self,
        criteria_id: &PostId,
        new_ids: &PostIdCollection,
    ) -> Result<(), RepositoryError>;

    /// Number of logical posts stored
    async fn record_count(&self) -> Result<usize, RepositoryError>;
}
