//! Session event feed
//!
//! The feed is the shared ticker shown to the whole classroom: joins, phase
//! changes, scenario events, notable participant choices and terminal
//! outcomes. It is bounded and ordered newest first.

use crate::models::new_id;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Severity / category of a feed entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedKind {
    Info,
    Phase,
    Alert,
    Critical,
    Broadcast,
}

/// One feed entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: FeedKind,
    pub text: String,
    pub at: u64,
}

/// Bounded, newest-first event feed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventFeed {
    capacity: usize,
    entries: VecDeque<FeedEvent>,
}

impl EventFeed {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: VecDeque::new(),
        }
    }

    /// Prepend an entry, evicting the oldest past capacity
    pub fn push(&mut self, kind: FeedKind, text: impl Into<String>, at: u64) {
        self.entries.push_front(FeedEvent {
            id: new_id(8),
            kind,
            text: text.into(),
            at,
        });
        self.entries.truncate(self.capacity);
    }

    /// Newest `n` entries
    pub fn recent(&self, n: usize) -> Vec<FeedEvent> {
        self.entries.iter().take(n).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FeedEvent> {
        self.entries.iter()
    }

    /// Count entries of a kind whose text contains `needle`
    pub fn count_matching(&self, kind: FeedKind, needle: &str) -> usize {
        self.entries
            .iter()
            .filter(|e| e.kind == kind && e.text.contains(needle))
            .count()
    }
}
