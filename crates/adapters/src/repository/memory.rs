//! In-memory identity repository for testing and dry runs

use async_trait::async_trait;
use crosspost_domain::{PostId, PostIdCollection, PostIdRepository, RepositoryError};
use std::sync::RwLock;

use super::RecordSet;

/// In-memory repository implementation
#[derive(Default)]
pub struct InMemoryRepository {
    records: RwLock<RecordSet>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PostIdRepository for InMemoryRepository {
    async fn find(&self, id: &PostId) -> Result<Option<PostIdCollection>, RepositoryError> {
        let records = self
            .records
            .read()
            .map_err(|e| RepositoryError::Io(e.to_string()))?;
        Ok(records.find(id).cloned())
    }

    async fn add_collection(
        &self,
        criteria_id: &PostId,
        new_ids: &PostIdCollection,
    ) -> Result<(), RepositoryError> {
        let mut records = self
            .records
            .write()
            .map_err(|e| RepositoryError::Io(e.to_string()))?;
        records.add_collection(criteria_id, new_ids);
        Ok(())
    }

    async fn record_count(&self) -> Result<usize, RepositoryError> {
        let records = self
            .records
            .read()
            .map_err(|e| RepositoryError::Io(e.to_string()))?;
        Ok(records.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_union_is_order_independent() {
        let repo = InMemoryRepository::new();
        let vk = PostId::new("1", "vk");
        let tg = PostId::new("9", "tg");
        let fb = PostId::new("3_4", "fb");

        repo.add_collection(&vk, &PostIdCollection::single(fb.clone()))
            .await
            .unwrap();
        repo.add_collection(&fb, &PostIdCollection::single(tg.clone()))
            .await
            .unwrap();

        for id in [&vk, &tg, &fb] {
            let found = repo.find(id).await.unwrap().unwrap();
            assert_eq!(found.len(), 3);
            assert!(found.contains(&vk) && found.contains(&tg) && found.contains(&fb));
        }
        assert_eq!(repo.record_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_id_is_never_split_across_records() {
        let repo = InMemoryRepository::new();
        let vk = PostId::new("1", "vk");
        let tg = PostId::new("9", "tg");
        let fb = PostId::new("5", "fb");

        repo.add_collection(&vk, &PostIdCollection::single(tg.clone()))
            .await
            .unwrap();
        repo.add_collection(&fb, &PostIdCollection::single(vk.clone()))
            .await
            .unwrap();

        assert_eq!(repo.record_count().await.unwrap(), 1);
        let found = repo.find(&tg).await.unwrap().unwrap();
        assert!(found.contains(&fb) && found.contains(&vk));
    }

    #[tokio::test]
    async fn test_unknown_id() {
        let repo = InMemoryRepository::new();

        assert!(repo.find(&PostId::new("1", "vk")).await.unwrap().is_none());
    }
}
