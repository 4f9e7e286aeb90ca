//! Offline retriever and sender for tests and local runs

use async_trait::async_trait;
use crosspost_domain::usecases::{Delivery, SuccessHook};
use crosspost_domain::{Post, RetrieveError, Retriever, SendError, Sender, TransferPost};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Retriever returning a fixed set of posts
pub struct StubRetriever {
    system_name: String,
    posts: Vec<Post>,
}

impl StubRetriever {
    /// Create an empty stub
    pub fn empty(system_name: impl Into<String>) -> Self {
        Self::with_posts(system_name, vec![])
    }

    /// Create a stub with predefined posts
    pub fn with_posts(system_name: impl Into<String>, posts: Vec<Post>) -> Self {
        Self {
            system_name: system_name.into(),
            posts,
        }
    }
}

#[async_trait]
impl Retriever for StubRetriever {
    fn system_name(&self) -> &str {
        &self.system_name
    }

    fn channel_id(&self) -> &str {
        "stub"
    }

    async fn retrieve_posts(&self) -> Result<Vec<Post>, RetrieveError> {
        Ok(self.posts.clone())
    }
}

/// Sender that keeps published texts in memory and mints sequential ids
pub struct StubSender {
    system_name: String,
    hook: Arc<SuccessHook>,
    next_id: AtomicU64,
    published: Mutex<Vec<String>>,
}

impl StubSender {
    pub fn new(system_name: impl Into<String>, hook: Arc<SuccessHook>) -> Self {
        Self {
            system_name: system_name.into(),
            hook,
            next_id: AtomicU64::new(1),
            published: Mutex::new(vec![]),
        }
    }

    /// Texts published so far, in order
    pub fn published(&self) -> Vec<String> {
        self.published
            .lock()
            .map(|published| published.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Sender for StubSender {
    fn system_name(&self) -> &str {
        &self.system_name
    }

    fn supports_polls(&self) -> bool {
        true
    }

    async fn send_post(&self, transfer: &mut TransferPost<'_>) -> Result<(), SendError> {
        self.published
            .lock()
            .map_err(|e| SendError::Api(e.to_string()))?
            .push(transfer.post.text.clone());

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        transfer.record_sent(format!("stub_{}", id));
        let delivery = if transfer.post.has_photo() {
            Delivery::photo()
        } else {
            Delivery::text()
        };
        self.hook.handle_successful_send(transfer, delivery).await;
        Ok(())
    }
}
