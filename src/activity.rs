//! Bounded, newest-first activity feed

use chrono::{DateTime, Utc};

use crate::protocol::ActivityEntry;

/// Default feed capacity
pub const DEFAULT_MAX_ENTRIES: usize = 50;

#[derive(Debug, Clone)]
struct Slot {
    entry: ActivityEntry,
    seq: u64,
}

impl Slot {
    // Dated entries outrank undated ones (`Some > None`); ties go to the
    // later append.
    fn key(&self) -> (Option<DateTime<Utc>>, u64) {
        (self.entry.timestamp, self.seq)
    }
}

/// Activity feed sorted non-increasing by timestamp.
///
/// Entries whose timestamp could not be parsed sort after every dated
/// entry, most recent append first, and are therefore evicted first.
#[derive(Debug, Clone)]
pub struct ActivityLog {
    slots: Vec<Slot>,
    max_entries: usize,
    next_seq: u64,
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}

impl ActivityLog {
    pub fn new(max_entries: usize) -> Self {
        Self {
            slots: Vec::with_capacity(max_entries.min(DEFAULT_MAX_ENTRIES) + 1),
            max_entries,
            next_seq: 0,
        }
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Insert an entry, re-sort, and drop the oldest beyond capacity.
    ///
    /// An entry whose id is already in the feed replaces the earlier copy.
    pub fn append(&mut self, entry: ActivityEntry) {
        self.slots.retain(|slot| slot.entry.id != entry.id);

        let seq = self.next_seq;
        self.next_seq += 1;
        self.slots.push(Slot { entry, seq });

        self.slots.sort_by(|a, b| b.key().cmp(&a.key()));
        self.slots.truncate(self.max_entries);
    }

    pub fn list(&self) -> Vec<ActivityEntry> {
        self.iter().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActivityEntry> {
        self.slots.iter().map(|slot| &slot.entry)
    }

    pub fn latest(&self) -> Option<&ActivityEntry> {
        self.slots.first().map(|slot| &slot.entry)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }
}
