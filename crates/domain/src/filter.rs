//! Eligibility rules for a single transfer edge

use crate::model::TransferPost;

/// Why an edge must not be dispatched
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FilterRejection {
    /// Source and destination are the same system
    #[error("No need to post to source system")]
    SameSystem,
    /// The post already has an id under the destination system
    #[error("Already posted before")]
    AlreadyDelivered,
}

/// Stateless filter deciding whether a post should travel along an edge
#[derive(Debug, Clone, Copy, Default)]
pub struct PostFilter;

impl PostFilter {
    pub fn new() -> Self {
        Self
    }

    pub fn validate(&self, transfer: &TransferPost<'_>) -> Result<(), FilterRejection> {
        if transfer.source_system == transfer.destination_system {
            return Err(FilterRejection::SameSystem);
        }
        if transfer.post.ids.has_system(transfer.destination_system) {
            return Err(FilterRejection::AlreadyDelivered);
        }
        Ok(())
    }
}
