//! Blocklist gate. Every code path that shells out to the provisioner or the
//! host OS checks this filter first.
//!
//! Matching is deliberately token based, not pattern based: operators add
//! ad-hoc forbidden words at runtime without redeploying any regex logic.

use std::collections::HashSet;
use tokio::sync::RwLock;

pub struct CommandFilter {
    blocked: RwLock<HashSet<String>>,
}

impl CommandFilter {
    /// Builds the in-memory set from the durable blocklist loaded at manager
    /// startup. Entries are kept lowercase.
    #[must_use]
    pub fn new(entries: impl IntoIterator<Item = String>) -> Self {
        let blocked = entries
            .into_iter()
            .map(|entry| entry.to_lowercase())
            .collect();

        Self {
            blocked: RwLock::new(blocked),
        }
    }

    /// Returns false if the whole string or any whitespace-delimited token
    /// case-insensitively matches a blocked entry.
    pub async fn allow(&self, raw: &str) -> bool {
        let blocked = self.blocked.read().await;

        if blocked.contains(&raw.to_lowercase()) {
            return false;
        }

        !raw
            .split_whitespace()
            .any(|token| blocked.contains(&token.to_lowercase()))
    }

    /// Extends the in-memory set. The caller persists the entry first; this
    /// must only run after the durable write succeeded.
    pub async fn insert(&self, command: &str) {
        self.blocked.write().await.insert(command.to_lowercase());
    }
}
