//! Session list shown beside the transcript.
use std::collections::HashSet;

use crate::history::SessionEntry;

pub const LOAD_FAILED_LABEL: &str = "Failed to load sessions";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// A session created during this run.
    Front,
    /// A historical session, kept in server order.
    Back,
}

#[derive(Debug, Clone, Default)]
pub struct SessionDirectory {
    entries: Vec<SessionEntry>,
    seen: HashSet<String>,
    load_failed: bool,
}

impl SessionDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `entry` unless its id is already listed in this load cycle.
    pub fn add(&mut self, entry: SessionEntry, placement: Placement) -> bool {
        if !self.seen.insert(entry.id.clone()) {
            return false;
        }
        match placement {
            Placement::Front => self.entries.insert(0, entry),
            Placement::Back => self.entries.push(entry),
        }
        true
    }

    /// Starts a new load cycle from a full list fetch.
    pub fn replace_all(&mut self, entries: impl IntoIterator<Item = SessionEntry>) {
        self.entries.clear();
        self.seen.clear();
        self.load_failed = false;
        for entry in entries {
            self.add(entry, Placement::Back);
        }
    }

    pub fn mark_load_failed(&mut self) {
        self.load_failed = true;
    }

    pub fn load_failed(&self) -> bool {
        self.load_failed
    }

    pub fn entries(&self) -> &[SessionEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 1-based lookup, matching the numbering shown to the user.
    pub fn select(&self, position: usize) -> Option<&SessionEntry> {
        self.entries.get(position.checked_sub(1)?)
    }
}
