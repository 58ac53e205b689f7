//! Playlist browser state: fetched entries and the user's picks.

use std::collections::HashSet;

use crate::backend::PlaylistEntry;

pub const PLAYLIST_FETCH_FAILED: &str = "Failed to fetch playlist";

/// Watch URL synthesized for a playlist entry id.
pub fn entry_watch_url(entry_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={entry_id}")
}

/// Ticket for one fetch. A result only lands if the URL has not moved on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket(u64);

#[derive(Debug, Clone, Default)]
pub struct PlaylistSession {
    entries: Vec<PlaylistEntry>,
    selected: HashSet<String>,
    has_tried_fetch: bool,
    is_fetching: bool,
    generation: u64,
}

impl PlaylistSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[PlaylistEntry] {
        &self.entries
    }

    pub fn selected(&self) -> &HashSet<String> {
        &self.selected
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.selected.contains(id)
    }

    pub fn has_tried_fetch(&self) -> bool {
        self.has_tried_fetch
    }

    pub fn is_fetching(&self) -> bool {
        self.is_fetching
    }

    /// Forget everything tied to the previous URL.
    pub fn reset_for_url_change(&mut self) {
        self.entries.clear();
        self.selected.clear();
        self.has_tried_fetch = false;
        self.is_fetching = false;
        self.generation += 1;
    }

    pub fn begin_fetch(&mut self) -> FetchTicket {
        self.has_tried_fetch = true;
        self.is_fetching = true;
        self.entries.clear();
        self.selected.clear();
        FetchTicket(self.generation)
    }

    pub fn is_current(&self, ticket: FetchTicket) -> bool {
        ticket.0 == self.generation
    }

    /// Store fetched entries. Returns false for a stale ticket.
    pub fn finish_fetch(&mut self, ticket: FetchTicket, entries: Vec<PlaylistEntry>) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        self.entries = entries;
        self.selected.clear();
        self.is_fetching = false;
        true
    }

    /// Record a failed fetch. Returns false for a stale ticket.
    pub fn fail_fetch(&mut self, ticket: FetchTicket) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        self.entries.clear();
        self.is_fetching = false;
        true
    }

    /// Flip one entry in or out of the selection. Unknown ids are ignored.
    pub fn toggle_entry(&mut self, id: &str) -> bool {
        if !self.entries.iter().any(|e| e.id == id) {
            return false;
        }
        if !self.selected.remove(id) {
            self.selected.insert(id.to_string());
        }
        true
    }

    /// Deselect everything if everything is selected, otherwise select everything.
    pub fn toggle_all(&mut self) {
        if self.entries.is_empty() {
            return;
        }
        if self.selected.len() == self.entries.len() {
            self.selected = HashSet::new();
        } else {
            self.selected = self.entries.iter().map(|e| e.id.clone()).collect();
        }
    }

    /// Selected entries in playlist order.
    pub fn selected_entries(&self) -> Vec<PlaylistEntry> {
        self.entries.iter().filter(|e| self.selected.contains(&e.id)).cloned().collect()
    }
}
