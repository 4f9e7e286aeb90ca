//! Identity repositories
//!
//! Both stores keep an ordered list of records, each record being the full
//! identity collection of one logical post. Lookups are linear scans.

mod json;
mod memory;

pub use json::JsonFileRepository;
pub use memory::InMemoryRepository;

use crosspost_domain::{PostId, PostIdCollection};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// On-disk document: `{"items": [{"vk": "1,2", "tg": "9"}]}`
#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct StoredDocument {
    #[serde(default)]
    items: Vec<Map<String, Value>>,
}

#[derive(Debug, Default, Clone)]
pub(crate) struct RecordSet {
    records: Vec<PostIdCollection>,
}

impl RecordSet {
    pub(crate) fn find(&self, id: &PostId) -> Option<&PostIdCollection> {
        self.records.iter().find(|record| record.contains(id))
    }

    /// Merge `new_ids` into the record holding `criteria_id`, or start a new one.
    ///
    /// Every record sharing an id with `criteria_id` or `new_ids` is folded
    /// into the first of them, so an id never lives in two records.
    pub(crate) fn add_collection(&mut self, criteria_id: &PostId, new_ids: &PostIdCollection) {
        let touched: Vec<usize> = self
            .records
            .iter()
            .enumerate()
            .filter(|(_, record)| {
                record.contains(criteria_id) || new_ids.iter().any(|id| record.contains(id))
            })
            .map(|(index, _)| index)
            .collect();

        let Some((&target, rest)) = touched.split_first() else {
            let mut record = PostIdCollection::single(criteria_id.clone());
            record.merge(new_ids);
            self.records.push(record);
            return;
        };

        // Highest index first so earlier indices stay valid
        for &index in rest.iter().rev() {
            let absorbed = self.records.remove(index);
            self.records[target].merge(&absorbed);
        }
        let record = &mut self.records[target];
        record.add(criteria_id.clone());
        record.merge(new_ids);
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    /// Number of records holding at least one id of each system, in first-seen order
    pub(crate) fn system_counts(&self) -> Vec<(String, usize)> {
        let mut counts: Vec<(String, usize)> = Vec::new();
        for record in &self.records {
            for system in record.systems() {
                match counts.iter_mut().find(|(name, _)| name == system) {
                    Some((_, count)) => *count += 1,
                    None => counts.push((system.to_string(), 1)),
                }
            }
        }
        counts
    }

    pub(crate) fn from_document(document: StoredDocument) -> Self {
        let records = document
            .items
            .into_iter()
            .map(|item| {
                let mut record = PostIdCollection::new();
                for (system, value) in item {
                    for external_id in stored_ids(&system, &value) {
                        record.add(PostId::new(external_id, system.as_str()));
                    }
                }
                record
            })
            .filter(|record| !record.is_empty())
            .collect();
        Self { records }
    }

    pub(crate) fn to_document(&self) -> StoredDocument {
        let items = self
            .records
            .iter()
            .map(|record| {
                let mut item = Map::new();
                for system in record.systems() {
                    let joined = record
                        .filter_by_system(system)
                        .iter()
                        .map(|id| id.external_id.as_str())
                        .collect::<Vec<_>>()
                        .join(",");
                    item.insert(system.to_string(), Value::String(joined));
                }
                item
            })
            .collect();
        StoredDocument { items }
    }
}

fn stored_ids(system: &str, value: &Value) -> Vec<String> {
    match value {
        Value::String(joined) => joined
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(String::from)
            .collect(),
        Value::Number(number) => vec![number.to_string()],
        other => {
            tracing::warn!(system = %system, value = %other, "Ignoring malformed stored id");
            vec![]
        }
    }
}
