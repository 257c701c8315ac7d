// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Task lookup table.
//!
//! Handlers are registered once at startup and looked up by id on every
//! inbound frame. The table is a fixed array of `TABLE_SLOTS` chain heads
//! (`id % TABLE_SLOTS`); collisions are resolved by walking a singly linked
//! chain built from a separate fixed arena of `TABLE_CAP` entries, indexed
//! rather than pointed to, so the whole structure lives in `'static`
//! storage with no allocator involved.

use crate::error::TableError;

struct Entry<H> {
    id: u8,
    handler: H,
    /// Exact payload length this task expects, checked against every
    /// inbound frame addressed to it. Negative means "do not check".
    expected_len: i16,
    next: Option<usize>,
}

/// A fixed-capacity, hash-chained map from task id to handler.
pub struct TaskTable<H, const TABLE_SLOTS: usize, const TABLE_CAP: usize> {
    heads: [Option<usize>; TABLE_SLOTS],
    entries: [Option<Entry<H>>; TABLE_CAP],
    free_head: Option<usize>,
}

impl<H, const TABLE_SLOTS: usize, const TABLE_CAP: usize> Default
    for TaskTable<H, TABLE_SLOTS, TABLE_CAP>
{
    fn default() -> Self {
        Self::new()
    }
}

impl<H, const TABLE_SLOTS: usize, const TABLE_CAP: usize>
    TaskTable<H, TABLE_SLOTS, TABLE_CAP>
{
    pub fn new() -> Self {
        debug_assert!(TABLE_SLOTS > 0, "a table with no chain slots can never look anything up");
        let entries = core::array::from_fn(|_| None);
        let free_head = if TABLE_CAP == 0 { None } else { Some(0) };
        Self {
            heads: [None; TABLE_SLOTS],
            entries,
            free_head,
        }
    }

    fn hash(id: u8) -> usize {
        id as usize % TABLE_SLOTS
    }

    /// Registers `handler` under `id`, refusing if `id` is already present.
    ///
    /// `expected_len` negative means "do not check the inbound payload
    /// size for this task".
    ///
    /// Returns `true` if the task was newly registered, `false` if `id`
    /// already had a handler (the existing registration is left
    /// untouched), and an error only if the entry arena is exhausted.
    pub fn register(
        &mut self,
        id: u8,
        handler: H,
        expected_len: i16,
    ) -> Result<bool, TableError> {
        if self.is_registered(id) {
            return Ok(false);
        }

        let slot = self.free_head.ok_or(TableError::TableFull)?;
        let bucket = Self::hash(id);
        self.free_head = self.entries[slot].as_ref().and_then(|e| e.next);
        self.entries[slot] = Some(Entry {
            id,
            handler,
            expected_len,
            next: self.heads[bucket],
        });
        self.heads[bucket] = Some(slot);
        Ok(true)
    }

    fn entry(&self, id: u8) -> Option<&Entry<H>> {
        let mut cur = self.heads[Self::hash(id)];
        while let Some(idx) = cur {
            let entry = self.entries[idx].as_ref().expect("chain index always occupied");
            if entry.id == id {
                return Some(entry);
            }
            cur = entry.next;
        }
        None
    }

    /// Looks up the handler registered for `id`, returning its expected
    /// payload length (negative: no check) alongside a copy of the handler.
    pub fn lookup(&self, id: u8) -> Option<(H, i16)>
    where
        H: Copy,
    {
        self.entry(id).map(|e| (e.handler, e.expected_len))
    }

    pub fn is_registered(&self, id: u8) -> bool {
        self.entry(id).is_some()
    }
}
