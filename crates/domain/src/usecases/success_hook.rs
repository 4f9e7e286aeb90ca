//! Persistence and reporting of a successful delivery

use std::sync::Arc;

use crate::{model::TransferPost, ports::PostIdRepository};

/// What kind of message a sender just created
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    pub photo: bool,
    /// 1-based index of this part
    pub part: usize,
    pub total: usize,
}

impl Delivery {
    pub fn text() -> Self {
        Self {
            photo: false,
            part: 1,
            total: 1,
        }
    }

    pub fn photo() -> Self {
        Self {
            photo: true,
            ..Self::text()
        }
    }

    pub fn chunk(part: usize, total: usize) -> Self {
        Self {
            photo: false,
            part,
            total,
        }
    }
}

/// Called by senders after every message they create
pub struct SuccessHook {
    repository: Arc<dyn PostIdRepository>,
}

impl SuccessHook {
    pub fn new(repository: Arc<dyn PostIdRepository>) -> Self {
        Self { repository }
    }

    /// Persist the ids the post gained under the destination and log the event
    ///
    /// Failures are logged and swallowed; the next pass retries the edge.
    pub async fn handle_successful_send(&self, transfer: &TransferPost<'_>, delivery: Delivery) {
        let transferred = transfer.transferred_ids();
        let Some(to_id) = transferred.last() else {
            tracing::error!(
                from = %transfer.source_system,
                to = %transfer.destination_system,
                post = %transfer.post.ids,
                "Transferred post id not found"
            );
            return;
        };

        let criteria = match transfer.search_criteria_id() {
            Ok(id) => id,
            Err(e) => {
                tracing::error!(post = %transfer.post.ids, error = %e, "Cannot persist delivery");
                return;
            }
        };

        if let Err(e) = self.repository.add_collection(criteria, &transferred).await {
            tracing::error!(
                from_id = %criteria,
                to_id = %to_id,
                error = %e,
                "Failed to persist transferred ids"
            );
        }

        let channels = format!(
            "from {} to {}",
            transfer.source_system, transfer.destination_system
        );
        let message = if delivery.photo {
            "Send new photo"
        } else {
            "Send new post"
        };

        if delivery.total > 1 {
            tracing::info!(
                channels = %channels,
                from_id = %criteria.external_id,
                to_id = %to_id.external_id,
                photo = delivery.photo,
                parts = %format!("{}/{}", delivery.part, delivery.total),
                "{}",
                message
            );
        } else {
            tracing::info!(
                channels = %channels,
                from_id = %criteria.external_id,
                to_id = %to_id.external_id,
                photo = delivery.photo,
                "{}",
                message
            );
        }
    }
}
