//! In-process port implementations shared by use case tests

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::model::{Post, PostId, PostIdCollection, TransferPost};
use crate::ports::{
    PostIdRepository, RepositoryError, RetrieveError, Retriever, SendError, Sender,
};
use crate::usecases::success_hook::{Delivery, SuccessHook};

#[derive(Default)]
pub struct FakeRepository {
    records: Mutex<Vec<PostIdCollection>>,
    fail: bool,
}

impl FakeRepository {
    pub fn failing() -> Self {
        Self {
            records: Mutex::new(vec![]),
            fail: true,
        }
    }
}

#[async_trait]
impl PostIdRepository for FakeRepository {
    async fn find(&self, id: &PostId) -> Result<Option<PostIdCollection>, RepositoryError> {
        if self.fail {
            return Err(RepositoryError::Io("disk on fire".to_string()));
        }
        let records = self.records.lock().unwrap();
        Ok(records.iter().find(|record| record.contains(id)).cloned())
    }

    async fn add_collection(
        &self,
        criteria_id: &PostId,
        new_ids: &PostIdCollection,
    ) -> Result<(), RepositoryError> {
        if self.fail {
            return Err(RepositoryError::Io("disk on fire".to_string()));
        }
        let mut records = self.records.lock().unwrap();
        let mut merged = PostIdCollection::single(criteria_id.clone());
        merged.merge(new_ids);
        let (linked, mut rest): (Vec<_>, Vec<_>) = records.drain(..).partition(|record| {
            merged.iter().any(|id| record.contains(id))
        });
        let mut joined = PostIdCollection::new();
        for record in &linked {
            joined.merge(record);
        }
        joined.merge(&merged);
        rest.push(joined);
        *records = rest;
        Ok(())
    }

    async fn record_count(&self) -> Result<usize, RepositoryError> {
        Ok(self.records.lock().unwrap().len())
    }
}

pub struct FakeRetriever {
    system: String,
    posts: Vec<Post>,
    fail: bool,
}

impl FakeRetriever {
    pub fn new(system: &str, posts: Vec<Post>) -> Self {
        Self {
            system: system.to_string(),
            posts,
            fail: false,
        }
    }

    pub fn failing(system: &str) -> Self {
        Self {
            system: system.to_string(),
            posts: vec![],
            fail: true,
        }
    }
}

#[async_trait]
impl Retriever for FakeRetriever {
    fn system_name(&self) -> &str {
        &self.system
    }

    fn channel_id(&self) -> &str {
        "fake"
    }

    async fn retrieve_posts(&self) -> Result<Vec<Post>, RetrieveError> {
        if self.fail {
            return Err(RetrieveError::Network("connection refused".to_string()));
        }
        Ok(self.posts.clone())
    }
}

/// Sender that records every call and mints sequential ids
pub struct RecordingSender {
    system: String,
    hook: Arc<SuccessHook>,
    fail: bool,
    decline: bool,
    next_id: AtomicU64,
    pub sent: Mutex<Vec<String>>,
}

impl RecordingSender {
    pub fn new(system: &str, hook: Arc<SuccessHook>) -> Self {
        Self {
            system: system.to_string(),
            hook,
            fail: false,
            decline: false,
            next_id: AtomicU64::new(100),
            sent: Mutex::new(vec![]),
        }
    }

    pub fn failing(system: &str, hook: Arc<SuccessHook>) -> Self {
        Self {
            fail: true,
            ..Self::new(system, hook)
        }
    }

    /// Accepts every post and publishes nothing, like an over-limit skip
    pub fn declining(system: &str, hook: Arc<SuccessHook>) -> Self {
        Self {
            decline: true,
            ..Self::new(system, hook)
        }
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl Sender for RecordingSender {
    fn system_name(&self) -> &str {
        &self.system
    }

    fn supports_polls(&self) -> bool {
        false
    }

    async fn send_post(&self, transfer: &mut TransferPost<'_>) -> Result<(), SendError> {
        self.sent.lock().unwrap().push(transfer.post.text.clone());
        if self.fail {
            return Err(SendError::Api("destination down".to_string()));
        }
        if self.decline {
            return Ok(());
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        transfer.record_sent(id.to_string());
        self.hook
            .handle_successful_send(transfer, Delivery::text())
            .await;
        Ok(())
    }
}
