//! Arena-style registry keyed by monotonically increasing ids.
//!
//! Both the PTY session manager and the LSP connection registry keep their
//! live entries in a [`SessionTable`]. Ids are handed out in creation order
//! and never reused within a process lifetime, so a stale id from a client
//! can never address a newer entry.

use std::collections::HashMap;

/// A registry of live entries keyed by `u64` ids.
pub struct SessionTable<T> {
    entries: HashMap<u64, T>,
    next_id: u64,
}

impl<T> SessionTable<T> {
    /// Create an empty table. The first allocated id is 1.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            next_id: 1,
        }
    }

    /// Reserve the next id without inserting anything.
    ///
    /// Lets callers hand the id to the entry being constructed (reader
    /// threads tag their events with it) before storing it via
    /// [`SessionTable::insert_at`]. A reserved id is consumed even if the
    /// construction fails, so ids stay monotonic.
    pub fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Store an entry under a previously allocated id.
    pub fn insert_at(&mut self, id: u64, value: T) {
        self.entries.insert(id, value);
    }

    /// Insert a new entry under a freshly allocated id and return the id.
    pub fn insert(&mut self, value: T) -> u64 {
        let id = self.allocate_id();
        self.entries.insert(id, value);
        id
    }

    /// Remove and return the entry for `id`, if present.
    pub fn remove(&mut self, id: u64) -> Option<T> {
        self.entries.remove(&id)
    }

    pub fn get(&self, id: u64) -> Option<&T> {
        self.entries.get(&id)
    }

    pub fn get_mut(&mut self, id: u64) -> Option<&mut T> {
        self.entries.get_mut(&id)
    }

    pub fn contains(&self, id: u64) -> bool {
        self.entries.contains_key(&id)
    }

    /// Ids of all live entries, in no particular order.
    pub fn ids(&self) -> Vec<u64> {
        self.entries.keys().copied().collect()
    }

    /// Remove all entries, yielding them for teardown.
    pub fn drain(&mut self) -> Vec<(u64, T)> {
        self.entries.drain().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T> Default for SessionTable<T> {
    fn default() -> Self {
        Self::new()
    }
}
