//! Memoized "is this community a public page?" lookups

use std::collections::HashMap;
use std::sync::Mutex;

/// Page type per group id; shared by every VK sender in the process
#[derive(Debug, Default)]
pub struct PageTypeCache {
    entries: Mutex<HashMap<i64, bool>>,
}

impl PageTypeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, group_id: i64) -> Option<bool> {
        self.entries
            .lock()
            .ok()
            .and_then(|entries| entries.get(&group_id).copied())
    }

    pub fn set(&self, group_id: i64, is_public_page: bool) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(group_id, is_public_page);
        }
    }
}
