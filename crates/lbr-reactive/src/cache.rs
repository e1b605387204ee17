//! Flow dedup cache
//!
//! Maps each flow key to the intent installed for it. A key is reserved
//! atomically before any path computation, so concurrent triggers for the
//! same flow produce exactly one installation. Locking is per shard, never
//! across the whole table.

use crate::intent::IntentId;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use lbr_common::FlowKey;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    /// Reserved, installation in progress
    Pending,
    /// Intent submitted
    Installed(IntentId),
}

/// Outcome of [`FlowCache::try_reserve`]
#[derive(Debug)]
pub enum Reserve<'a> {
    /// Key was absent and is now held by the caller
    Reserved(Reservation<'a>),
    /// Key is pending or installed already
    Duplicate,
    /// Cache is draining; no new flows are accepted
    Closed,
}

/// Exclusive claim on a flow key
///
/// Dropping it without [`commit`](Reservation::commit) releases the key.
#[derive(Debug)]
#[must_use = "dropping a reservation releases the flow key"]
pub struct Reservation<'a> {
    cache: &'a FlowCache,
    key: FlowKey,
    committed: bool,
}

impl Reservation<'_> {
    /// Reserved key
    pub fn key(&self) -> &FlowKey {
        &self.key
    }

    /// Record the installed intent
    ///
    /// Returns the id back if the cache was drained in the meantime; the
    /// caller then owns the intent and must withdraw it.
    pub fn commit(mut self, id: IntentId) -> Result<(), IntentId> {
        self.committed = true;

        let Some(mut slot) = self.cache.entries.get_mut(&self.key) else {
            return Err(id);
        };
        if self.cache.closed.load(Ordering::SeqCst) {
            drop(slot);
            self.cache.entries.remove(&self.key);
            return Err(id);
        }
        *slot = Slot::Installed(id);
        Ok(())
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.cache
                .entries
                .remove_if(&self.key, |_, slot| *slot == Slot::Pending);
        }
    }
}

/// Concurrent flow key -> intent map
#[derive(Debug, Default)]
pub struct FlowCache {
    entries: DashMap<FlowKey, Slot>,
    closed: AtomicBool,
}

impl FlowCache {
    /// Create empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically claim `key` if nobody holds it
    pub fn try_reserve(&self, key: FlowKey) -> Reserve<'_> {
        match self.entries.entry(key) {
            Entry::Occupied(_) => Reserve::Duplicate,
            Entry::Vacant(vacant) => {
                // Checked under the shard lock so drain() sees every reservation
                if self.closed.load(Ordering::SeqCst) {
                    return Reserve::Closed;
                }
                vacant.insert(Slot::Pending);
                Reserve::Reserved(Reservation {
                    cache: self,
                    key,
                    committed: false,
                })
            }
        }
    }

    /// Installed intent for a key
    pub fn get(&self, key: &FlowKey) -> Option<IntentId> {
        match *self.entries.get(key)? {
            Slot::Installed(id) => Some(id),
            Slot::Pending => None,
        }
    }

    /// Whether the key is reserved or installed
    pub fn contains(&self, key: &FlowKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Forget an installed flow, returning its intent
    ///
    /// Pending reservations are left to their holder.
    pub fn remove(&self, key: &FlowKey) -> Option<IntentId> {
        let (_, slot) = self
            .entries
            .remove_if(key, |_, slot| matches!(slot, Slot::Installed(_)))?;
        match slot {
            Slot::Installed(id) => Some(id),
            Slot::Pending => None,
        }
    }

    /// Number of reserved or installed keys
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no keys
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether drain() has run
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Close the cache and take every installed intent
    ///
    /// Later reservations are refused; outstanding ones fail to commit.
    pub fn drain(&self) -> Vec<(FlowKey, IntentId)> {
        self.closed.store(true, Ordering::SeqCst);

        let mut installed = Vec::new();
        self.entries.retain(|key, slot| {
            if let Slot::Installed(id) = slot {
                installed.push((*key, *id));
            }
            false
        });
        installed
    }
}
