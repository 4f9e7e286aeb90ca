//! Domain models and value objects

use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;

/// Identifier of a post inside one external system
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PostId {
    /// Platform-specific post/message ID
    pub external_id: String,
    /// Short system name (e.g., "vk", "tg", "fb")
    pub system_name: String,
}

impl PostId {
    pub fn new(external_id: impl Into<String>, system_name: impl Into<String>) -> Self {
        Self {
            external_id: external_id.into(),
            system_name: system_name.into(),
        }
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.system_name, self.external_id)
    }
}

/// Ordered, duplicate-free set of ids denoting one logical post across systems
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostIdCollection {
    items: Vec<PostId>,
}

impl PostIdCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a collection holding a single id
    pub fn single(id: PostId) -> Self {
        Self { items: vec![id] }
    }

    /// Append an id, returns false if it was already present
    pub fn add(&mut self, id: PostId) -> bool {
        if self.contains(&id) {
            return false;
        }
        self.items.push(id);
        true
    }

    pub fn contains(&self, id: &PostId) -> bool {
        self.items.iter().any(|item| item == id)
    }

    /// Ids known under the given system, in insertion order
    pub fn filter_by_system(&self, system_name: &str) -> PostIdCollection {
        Self {
            items: self
                .items
                .iter()
                .filter(|id| id.system_name == system_name)
                .cloned()
                .collect(),
        }
    }

    /// Whether any id belongs to the given system
    pub fn has_system(&self, system_name: &str) -> bool {
        self.items.iter().any(|id| id.system_name == system_name)
    }

    /// Distinct system names in first-seen order
    pub fn systems(&self) -> Vec<&str> {
        let mut systems: Vec<&str> = Vec::new();
        for id in &self.items {
            if !systems.contains(&id.system_name.as_str()) {
                systems.push(&id.system_name);
            }
        }
        systems
    }

    /// Add every id from `other` that is not already present
    pub fn merge(&mut self, other: &PostIdCollection) {
        for id in &other.items {
            self.add(id.clone());
        }
    }

    pub fn first(&self) -> Option<&PostId> {
        self.items.first()
    }

    pub fn last(&self) -> Option<&PostId> {
        self.items.last()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PostId> {
        self.items.iter()
    }
}

impl FromIterator<PostId> for PostIdCollection {
    fn from_iter<I: IntoIterator<Item = PostId>>(iter: I) -> Self {
        let mut collection = Self::new();
        for id in iter {
            collection.add(id);
        }
        collection
    }
}

impl<'a> IntoIterator for &'a PostIdCollection {
    type Item = &'a PostId;
    type IntoIter = std::slice::Iter<'a, PostId>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl fmt::Display for PostIdCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, id) in self.items.iter().enumerate() {
            if index > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", id)?;
        }
        Ok(())
    }
}

/// A single answer option of a poll
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollOption {
    pub text: String,
    #[serde(default)]
    pub votes: u64,
}

/// Poll attached to a post
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Poll {
    pub question: String,
    pub options: Vec<PollOption>,
    pub total_votes: Option<u64>,
    pub is_anonymous: bool,
    pub is_multiple_choice: bool,
    /// When voting closes, if the source platform reports it
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub end_date: Option<OffsetDateTime>,
}

impl Poll {
    pub fn has_options(&self) -> bool {
        !self.options.is_empty()
    }

    pub fn option_count(&self) -> usize {
        self.options.len()
    }

    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        self.end_date.is_some_and(|end| end < now)
    }

    /// Plain-text rendering for destinations without native polls
    pub fn formatted_text(&self, now: OffsetDateTime) -> String {
        let mut text = format!("📊 {}\n\n", self.question);

        for (index, option) in self.options.iter().enumerate() {
            text.push_str(&format!("{}. {}", index + 1, option.text));
            if let Some(total) = self.total_votes.filter(|total| *total > 0) {
                let percentage = option.votes as f64 / total as f64 * 100.0;
                text.push_str(&format!(" ({} votes, {:.1}%)", option.votes, percentage));
            }
            text.push('\n');
        }

        if let Some(total) = self.total_votes {
            text.push_str(&format!("\n👥 Total votes: {}", total));
        }

        if self.is_expired(now) {
            text.push_str("\n⏰ Poll closed");
        }

        text
    }
}

/// Normalized content pulled from a source system
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    /// Every id this logical post is known under; grows as sends succeed
    pub ids: PostIdCollection,
    pub text: String,
    /// Photo references (URLs or platform file ids), in display order
    #[serde(default)]
    pub photos: Vec<String>,
    #[serde(default)]
    pub videos: Vec<String>,
    /// Link attachments as (title, url) pairs, in display order
    #[serde(default)]
    pub links: Vec<(String, String)>,
    pub author: Option<String>,
    pub poll: Option<Poll>,
}

impl Post {
    /// Create a text-only post known under a single id
    pub fn new(id: PostId, text: impl Into<String>) -> Self {
        Self {
            ids: PostIdCollection::single(id),
            text: text.into(),
            photos: vec![],
            videos: vec![],
            links: vec![],
            author: None,
            poll: None,
        }
    }

    pub fn has_photo(&self) -> bool {
        !self.photos.is_empty()
    }

    pub fn first_photo(&self) -> Option<&str> {
        self.photos.first().map(String::as_str)
    }

    pub fn has_poll(&self) -> bool {
        self.poll.is_some()
    }

    /// Text followed by the rendered poll, for destinations without native polls
    pub fn text_with_poll(&self, now: OffsetDateTime) -> String {
        match &self.poll {
            Some(poll) if self.text.trim().is_empty() => poll.formatted_text(now),
            Some(poll) => format!("{}\n\n{}", self.text, poll.formatted_text(now)),
            None => self.text.clone(),
        }
    }
}

/// Per-edge transfer context: one post travelling from one system to another
#[derive(Debug)]
pub struct TransferPost<'a> {
    pub post: &'a mut Post,
    pub source_system: &'a str,
    pub destination_system: &'a str,
}

impl<'a> TransferPost<'a> {
    pub fn new(post: &'a mut Post, source_system: &'a str, destination_system: &'a str) -> Self {
        Self {
            post,
            source_system,
            destination_system,
        }
    }

    /// The post's id under its source system, used as the repository lookup key
    pub fn search_criteria_id(&self) -> Result<&PostId, MissingSourceId> {
        self.post
            .ids
            .iter()
            .find(|id| id.system_name == self.source_system)
            .ok_or_else(|| MissingSourceId(self.source_system.to_string()))
    }

    /// Ids the post has gained under the destination system
    pub fn transferred_ids(&self) -> PostIdCollection {
        self.post.ids.filter_by_system(self.destination_system)
    }

    /// Record a newly created destination message id
    pub fn record_sent(&mut self, external_id: impl Into<String>) -> PostId {
        let id = PostId::new(external_id, self.destination_system);
        self.post.ids.add(id.clone());
        id
    }
}

/// The post carries no id for the system it was retrieved from
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("search criteria id not found for system: {0}")]
pub struct MissingSourceId(pub String);

/// Summary of one synchronization pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PassReport {
    /// Posts retrieved across all sources
    pub retrieved: usize,
    /// Edges whose send succeeded and recorded at least one new id
    pub delivered: usize,
    /// Edges rejected as already delivered, or that the sender declined
    pub skipped: usize,
    /// Edges whose send returned an error
    pub failed: usize,
    /// Eligible edges left unsent because of dry-run mode
    pub planned: usize,
    /// Sources whose retrieval failed this pass
    pub failed_sources: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_collection_rejects_duplicates() {
        let mut ids = PostIdCollection::new();
        assert!(ids.add(PostId::new("1", "vk")));
        assert!(!ids.add(PostId::new("1", "vk")));
        assert!(ids.add(PostId::new("1", "tg")));

        assert_eq!(ids.len(), 2);
        assert_eq!(ids.to_string(), "vk:1,tg:1");
    }

    #[test]
    fn test_collection_systems_in_first_seen_order() {
        let ids: PostIdCollection = vec![
            PostId::new("5", "tg"),
            PostId::new("1", "vk"),
            PostId::new("6", "tg"),
        ]
        .into_iter()
        .collect();

        assert_eq!(ids.systems(), vec!["tg", "vk"]);
        assert_eq!(ids.filter_by_system("tg").len(), 2);
        assert_eq!(ids.last(), Some(&PostId::new("6", "tg")));
    }

    #[test]
    fn test_transfer_derives_ids() {
        let mut post = Post::new(PostId::new("10", "vk"), "hello");
        let mut transfer = TransferPost::new(&mut post, "vk", "tg");

        assert!(transfer.transferred_ids().is_empty());
        transfer.record_sent("77");

        assert_eq!(
            transfer.search_criteria_id().unwrap(),
            &PostId::new("10", "vk")
        );
        assert_eq!(
            transfer.transferred_ids().first(),
            Some(&PostId::new("77", "tg"))
        );
    }

    #[test]
    fn test_transfer_without_source_id() {
        let mut post = Post::new(PostId::new("10", "fb"), "hello");
        let transfer = TransferPost::new(&mut post, "vk", "tg");

        assert_eq!(
            transfer.search_criteria_id(),
            Err(MissingSourceId("vk".to_string()))
        );
    }

    #[test]
    fn test_poll_formatted_text() {
        let poll = Poll {
            question: "Lunch?".to_string(),
            options: vec![
                PollOption {
                    text: "Soup".to_string(),
                    votes: 3,
                },
                PollOption {
                    text: "Salad".to_string(),
                    votes: 1,
                },
            ],
            total_votes: Some(4),
            is_anonymous: true,
            is_multiple_choice: false,
            end_date: Some(datetime!(2024-01-01 00:00 UTC)),
        };

        let text = poll.formatted_text(datetime!(2024-06-01 00:00 UTC));

        assert!(text.starts_with("📊 Lunch?"));
        assert!(text.contains("1. Soup (3 votes, 75.0%)"));
        assert!(text.contains("Total votes: 4"));
        assert!(text.contains("Poll closed"));

        let mut post = Post::new(PostId::new("1", "vk"), "Vote!");
        assert_eq!(post.text_with_poll(datetime!(2024-06-01 00:00 UTC)), "Vote!");
        post.poll = Some(poll);
        assert!(
            post.text_with_poll(datetime!(2024-06-01 00:00 UTC))
                .starts_with("Vote!\n\n📊 Lunch?")
        );
    }
}
