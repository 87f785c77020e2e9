//! Last-fetched watcher and investigation collections.
//!
//! Every refresh takes a ticket before its request goes out. A completion is
//! applied only when its ticket is newer than the last one applied to that
//! collection, so an overtaken response cannot overwrite fresher data.

use crate::error::PanelError;
use crate::models::{Investigation, Watcher};
use serde::{Deserialize, Serialize};
use std::fmt;

pub type RefreshSequence = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Watchers,
    Investigations,
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Collection::Watchers => f.write_str("watchers"),
            Collection::Investigations => f.write_str("investigations"),
        }
    }
}

/// Handle for one in-flight refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshTicket {
    pub collection: Collection,
    pub sequence: RefreshSequence,
}

/// What happened to a refresh completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The collection was replaced; carries the new length
    Replaced(usize),
    /// The request failed and the collection was cleared
    Cleared(String),
    /// A newer refresh already landed
    Stale,
    /// The panel was detached before the request completed
    Detached,
}

#[derive(Debug)]
struct Slot<T> {
    items: Vec<T>,
    issued: RefreshSequence,
    applied: RefreshSequence,
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            issued: 0,
            applied: 0,
        }
    }
}

impl<T> Slot<T> {
    fn issue(&mut self) -> RefreshSequence {
        self.issued += 1;
        self.issued
    }

    fn apply(&mut self, sequence: RefreshSequence, result: Result<Vec<T>, PanelError>) -> RefreshOutcome {
        if sequence <= self.applied {
            return RefreshOutcome::Stale;
        }
        self.applied = sequence;

        match result {
            Ok(items) => {
                self.items = items;
                RefreshOutcome::Replaced(self.items.len())
            }
            Err(err) => {
                self.items.clear();
                RefreshOutcome::Cleared(err.reason())
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct StateStore {
    watchers: Slot<Watcher>,
    investigations: Slot<Investigation>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_refresh(&mut self, collection: Collection) -> RefreshTicket {
        let sequence = match collection {
            Collection::Watchers => self.watchers.issue(),
            Collection::Investigations => self.investigations.issue(),
        };
        RefreshTicket {
            collection,
            sequence,
        }
    }

    pub fn apply_watchers(
        &mut self,
        ticket: RefreshTicket,
        result: Result<Vec<Watcher>, PanelError>,
    ) -> RefreshOutcome {
        debug_assert_eq!(ticket.collection, Collection::Watchers);
        self.watchers.apply(ticket.sequence, result)
    }

    pub fn apply_investigations(
        &mut self,
        ticket: RefreshTicket,
        result: Result<Vec<Investigation>, PanelError>,
    ) -> RefreshOutcome {
        debug_assert_eq!(ticket.collection, Collection::Investigations);
        self.investigations.apply(ticket.sequence, result)
    }

    pub fn watchers(&self) -> &[Watcher] {
        &self.watchers.items
    }

    pub fn investigations(&self) -> &[Investigation] {
        &self.investigations.items
    }

    pub fn find_watcher(&self, watcher_id: &str) -> Option<&Watcher> {
        self.watchers.items.iter().find(|w| w.id == watcher_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WatcherState;

    fn watcher(id: &str) -> Watcher {
        Watcher {
            id: id.to_string(),
            name: format!("watcher-{}", id),
            directory: "/var/log".to_string(),
            file_pattern: None,
            prompt: String::new(),
            error_patterns: Vec::new(),
            state: WatcherState::Active,
            is_running: true,
            investigation_count: 0,
            recent_investigations: Vec::new(),
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn test_new_store_is_empty() {
        let store = StateStore::default();
        assert!(store.watchers().is_empty());
        assert!(store.investigations().is_empty());

        let slot: Slot<Watcher> = Slot::default();
        assert_eq!((slot.issued, slot.applied), (0, 0));
    }

    #[test]
    fn test_success_replaces_wholesale() {
        let mut store = StateStore::new();

        let ticket = store.begin_refresh(Collection::Watchers);
        store.apply_watchers(ticket, Ok(vec![watcher("a"), watcher("b")]));

        let ticket = store.begin_refresh(Collection::Watchers);
        let outcome = store.apply_watchers(ticket, Ok(vec![watcher("c")]));

        assert_eq!(outcome, RefreshOutcome::Replaced(1));
        assert_eq!(store.watchers().len(), 1);
        assert!(store.find_watcher("a").is_none());
        assert!(store.find_watcher("c").is_some());
    }

    #[test]
    fn test_failure_clears_collection() {
        let mut store = StateStore::new();
        let ticket = store.begin_refresh(Collection::Watchers);
        store.apply_watchers(ticket, Ok(vec![watcher("a")]));

        let ticket = store.begin_refresh(Collection::Watchers);
        let outcome = store.apply_watchers(
            ticket,
            Err(PanelError::Other("connection reset".to_string())),
        );

        assert_eq!(outcome, RefreshOutcome::Cleared("connection reset".to_string()));
        assert!(store.watchers().is_empty());
    }

    #[test]
    fn test_overtaken_response_is_discarded() {
        let mut store = StateStore::new();

        let first = store.begin_refresh(Collection::Watchers);
        let second = store.begin_refresh(Collection::Watchers);

        // The second request lands first
        store.apply_watchers(second, Ok(vec![watcher("fresh")]));
        let outcome = store.apply_watchers(first, Ok(vec![watcher("stale")]));

        assert_eq!(outcome, RefreshOutcome::Stale);
        assert_eq!(store.watchers()[0].id, "fresh");

        // A stale failure does not clear fresher data either
        let outcome = store.apply_watchers(first, Err(PanelError::Other("late".to_string())));
        assert_eq!(outcome, RefreshOutcome::Stale);
        assert_eq!(store.watchers().len(), 1);
    }

    #[test]
    fn test_collections_sequence_independently() {
        let mut store = StateStore::new();

        let w = store.begin_refresh(Collection::Watchers);
        let i = store.begin_refresh(Collection::Investigations);
        assert_eq!(w.sequence, 1);
        assert_eq!(i.sequence, 1);

        store.apply_investigations(i, Err(PanelError::Other("down".to_string())));
        let outcome = store.apply_watchers(w, Ok(vec![watcher("a")]));
        assert_eq!(outcome, RefreshOutcome::Replaced(1));
        assert!(store.investigations().is_empty());
    }
}
