//! Synchronization pass - retrieves, hydrates, filters and dispatches posts

use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

use crate::{
    filter::{FilterRejection, PostFilter},
    model::{PassReport, Post, TransferPost},
    ports::{PostIdRepository, Retriever, Sender},
};

/// Configuration for the synchronizer
#[derive(Debug, Clone, Default)]
pub struct SyncConfig {
    /// Log eligible edges instead of calling senders
    pub dry_run: bool,
}

/// Pass orchestrator over every (source, destination) pair
pub struct Synchronizer {
    retrievers: Vec<Arc<dyn Retriever>>,
    senders: Vec<Arc<dyn Sender>>,
    repository: Arc<dyn PostIdRepository>,
    filter: PostFilter,
    config: SyncConfig,
}

impl Synchronizer {
    pub fn new(
        retrievers: Vec<Arc<dyn Retriever>>,
        senders: Vec<Arc<dyn Sender>>,
        repository: Arc<dyn PostIdRepository>,
        config: SyncConfig,
    ) -> Self {
        Self {
            retrievers,
            senders,
            repository,
            filter: PostFilter::new(),
            config,
        }
    }

    /// Run one full pass; individual failures are logged and counted
    pub async fn run_pass(&self) -> PassReport {
        let pass_id = Uuid::new_v4();
        let span = tracing::info_span!("sync_pass", pass_id = %pass_id);
        self.pass().instrument(span).await
    }

    async fn pass(&self) -> PassReport {
        tracing::info!(
            sources = self.retrievers.len(),
            destinations = self.senders.len(),
            dry_run = self.config.dry_run,
            "Starting sync pass"
        );

        let mut report = PassReport::default();

        for retriever in &self.retrievers {
            let source = retriever.system_name();
            tracing::info!(
                system = %source,
                channel = %retriever.channel_id(),
                "Retrieving posts"
            );

            let posts = match retriever.retrieve_posts().await {
                Ok(posts) => posts,
                Err(e) => {
                    tracing::error!(system = %source, error = %e, "Failed to retrieve posts");
                    report.failed_sources.push(source.to_string());
                    continue;
                }
            };

            tracing::info!(system = %source, count = posts.len(), "Retrieved posts");
            report.retrieved += posts.len();

            for mut post in posts {
                self.hydrate(&mut post, source).await;
                for sender in &self.senders {
                    self.dispatch(&mut post, source, sender.as_ref(), &mut report)
                        .await;
                }
            }
        }

        tracing::info!(
            retrieved = report.retrieved,
            delivered = report.delivered,
            skipped = report.skipped,
            failed = report.failed,
            planned = report.planned,
            failed_sources = report.failed_sources.len(),
            "Sync pass finished"
        );

        report
    }

    /// Merge the stored identity collection into the post's ids
    async fn hydrate(&self, post: &mut Post, source: &str) {
        let Some(source_id) = post
            .ids
            .iter()
            .find(|id| id.system_name == source)
            .cloned()
        else {
            tracing::warn!(post = %post.ids, system = %source, "Post has no id for its source");
            return;
        };

        match self.repository.find(&source_id).await {
            Ok(Some(known)) => post.ids.merge(&known),
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(
                    post = %source_id,
                    error = %e,
                    "Failed to look up known ids, continuing"
                );
            }
        }
    }

    async fn dispatch(
        &self,
        post: &mut Post,
        source: &str,
        sender: &dyn Sender,
        report: &mut PassReport,
    ) {
        let destination = sender.system_name();
        let mut transfer = TransferPost::new(post, source, destination);

        match self.filter.validate(&transfer) {
            Ok(()) => {}
            Err(FilterRejection::SameSystem) => return,
            Err(rejection @ FilterRejection::AlreadyDelivered) => {
                tracing::debug!(
                    post = %transfer.post.ids,
                    to = %destination,
                    reason = %rejection,
                    "Skipping post"
                );
                report.skipped += 1;
                return;
            }
        }

        if self.config.dry_run {
            tracing::info!(
                post = %transfer.post.ids,
                from = %source,
                to = %destination,
                "[DRY RUN] Would send post"
            );
            report.planned += 1;
            return;
        }

        let sent_before = transfer.transferred_ids().len();
        match sender.send_post(&mut transfer).await {
            Ok(()) if transfer.transferred_ids().len() > sent_before => report.delivered += 1,
            Ok(()) => {
                tracing::debug!(
                    post = %transfer.post.ids,
                    to = %destination,
                    "Sender delivered nothing"
                );
                report.skipped += 1;
            }
            Err(e) => {
                tracing::error!(
                    post = %transfer.post.ids,
                    from = %source,
                    to = %destination,
                    error = %e,
                    "Failed to send post"
                );
                report.failed += 1;
            }
        }
    }
}
