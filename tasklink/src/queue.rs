// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Dual-priority scheduling queues.
//!
//! Outbound work waits in one of two FIFOs: a normal queue and a priority
//! queue that always drains first. Both are built from one fixed pool of
//! `QUEUE_SIZE` entries; entries move between a free list and the two
//! FIFOs by relinking array indices, never by copying buffers between
//! separate containers.

use heapless::Vec;

use crate::error::QueueError;

ringbuf::ringbuf!(QueueEvent, 8, QueueEvent::Idle);

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum QueueEvent {
    Idle,
    Pushed { id: u8 },
    Popped { id: u8 },
    Full,
}

struct Entry<const MAX_ENCODED: usize> {
    id: Option<u8>,
    rescheduled: bool,
    buf: Vec<u8, MAX_ENCODED>,
    next: Option<usize>,
}

impl<const MAX_ENCODED: usize> Entry<MAX_ENCODED> {
    const fn empty() -> Self {
        Self {
            id: None,
            rescheduled: false,
            buf: Vec::new(),
            next: None,
        }
    }
}

/// A task and its pending frame, dequeued and owned by the caller.
pub struct Dequeued<const MAX_ENCODED: usize> {
    pub id: u8,
    pub buf: Vec<u8, MAX_ENCODED>,
    pub rescheduled: bool,
}

#[derive(Copy, Clone, Default)]
struct Fifo {
    head: Option<usize>,
    tail: Option<usize>,
}

impl Fifo {
    fn push_back<const MAX_ENCODED: usize>(&mut self, pool: &mut [Entry<MAX_ENCODED>], idx: usize) {
        pool[idx].next = None;
        match self.tail {
            Some(t) => pool[t].next = Some(idx),
            None => self.head = Some(idx),
        }
        self.tail = Some(idx);
    }

    fn push_front<const MAX_ENCODED: usize>(&mut self, pool: &mut [Entry<MAX_ENCODED>], idx: usize) {
        pool[idx].next = self.head;
        self.head = Some(idx);
        if self.tail.is_none() {
            self.tail = Some(idx);
        }
    }

    fn pop_front<const MAX_ENCODED: usize>(&mut self, pool: &mut [Entry<MAX_ENCODED>]) -> Option<usize> {
        let idx = self.head?;
        self.head = pool[idx].next;
        if self.head.is_none() {
            self.tail = None;
        }
        pool[idx].next = None;
        Some(idx)
    }

    fn contains<const MAX_ENCODED: usize>(&self, pool: &[Entry<MAX_ENCODED>], id: u8) -> bool {
        let mut cur = self.head;
        while let Some(idx) = cur {
            if pool[idx].id == Some(id) {
                return true;
            }
            cur = pool[idx].next;
        }
        false
    }

    fn len<const MAX_ENCODED: usize>(&self, pool: &[Entry<MAX_ENCODED>]) -> usize {
        let mut n = 0;
        let mut cur = self.head;
        while let Some(idx) = cur {
            n += 1;
            cur = pool[idx].next;
        }
        n
    }
}

/// The fixed pool of pending-frame slots and the two FIFOs built from it.
pub struct SchedulingQueues<const QUEUE_SIZE: usize, const MAX_ENCODED: usize> {
    pool: [Entry<MAX_ENCODED>; QUEUE_SIZE],
    free: Fifo,
    normal: Fifo,
    priority: Fifo,
}

impl<const QUEUE_SIZE: usize, const MAX_ENCODED: usize> Default
    for SchedulingQueues<QUEUE_SIZE, MAX_ENCODED>
{
    fn default() -> Self {
        Self::new()
    }
}

impl<const QUEUE_SIZE: usize, const MAX_ENCODED: usize> SchedulingQueues<QUEUE_SIZE, MAX_ENCODED> {
    pub fn new() -> Self {
        let mut pool = core::array::from_fn(|_| Entry::empty());
        let mut free = Fifo::default();
        for idx in 0..QUEUE_SIZE {
            free.push_back(&mut pool, idx);
        }
        Self {
            pool,
            free,
            normal: Fifo::default(),
            priority: Fifo::default(),
        }
    }

    /// `true` once the free list (and so the whole pool) is exhausted.
    pub fn is_full(&self) -> bool {
        self.free.head.is_none()
    }

    pub fn is_empty(&self) -> bool {
        self.normal.head.is_none() && self.priority.head.is_none()
    }

    pub fn priority_is_empty(&self) -> bool {
        self.priority.head.is_none()
    }

    pub fn contains(&self, id: u8) -> bool {
        self.normal.contains(&self.pool, id) || self.priority.contains(&self.pool, id)
    }

    /// Total number of entries waiting in either FIFO (not counting the
    /// free list).
    pub fn len(&self) -> usize {
        self.normal.len(&self.pool) + self.priority.len(&self.pool)
    }

    fn push_to(&mut self, id: u8, payload: &[u8], priority: bool, front: bool) -> Result<(), QueueError> {
        let Some(idx) = self.free.pop_front(&mut self.pool) else {
            ringbuf::ringbuf_entry!(QueueEvent::Full);
            return Err(QueueError::QueuesFull);
        };

        let entry = &mut self.pool[idx];
        entry.id = Some(id);
        entry.rescheduled = false;
        entry.buf.clear();
        if entry.buf.extend_from_slice(payload).is_err() {
            // The frame was already bounds-checked against MAX_ENCODED by
            // the codec; this would mean a caller bypassed that.
            entry.id = None;
            self.free.push_back(&mut self.pool, idx);
            return Err(QueueError::IncorrectPayloadSize);
        }

        let fifo = if priority { &mut self.priority } else { &mut self.normal };
        if front {
            fifo.push_front(&mut self.pool, idx);
        } else {
            fifo.push_back(&mut self.pool, idx);
        }
        ringbuf::ringbuf_entry!(QueueEvent::Pushed { id });
        Ok(())
    }

    /// Appends to the back of the normal FIFO.
    pub fn push_normal(&mut self, id: u8, payload: &[u8]) -> Result<(), QueueError> {
        self.push_to(id, payload, false, false)
    }

    /// Appends to the back of the priority FIFO.
    pub fn push_priority(&mut self, id: u8, payload: &[u8]) -> Result<(), QueueError> {
        self.push_to(id, payload, true, false)
    }

    /// Places at the *front* of the priority FIFO: the escalation path for
    /// a fast, immediate send.
    pub fn push_fast(&mut self, id: u8, payload: &[u8]) -> Result<(), QueueError> {
        self.push_to(id, payload, true, true)
    }

    /// Detaches the head of the chosen FIFO and returns it to the free
    /// list, clearing its `rescheduled` flag.
    pub fn pop(&mut self, priority: bool) -> Option<Dequeued<MAX_ENCODED>> {
        let fifo = if priority { &mut self.priority } else { &mut self.normal };
        let idx = fifo.pop_front(&mut self.pool)?;
        let entry = &mut self.pool[idx];
        let id = entry.id.take().expect("dequeued entry always carries an id");
        let rescheduled = entry.rescheduled;
        entry.rescheduled = false;
        let buf = core::mem::replace(&mut entry.buf, Vec::new());
        self.free.push_back(&mut self.pool, idx);
        ringbuf::ringbuf_entry!(QueueEvent::Popped { id });
        Some(Dequeued { id, buf, rescheduled })
    }

    /// Moves the current head of the chosen FIFO to its own tail, setting
    /// its `rescheduled` flag to `rescheduled`. Used to time-box retries
    /// without losing the frame already encoded into the entry's buffer.
    pub fn reschedule(&mut self, priority: bool, rescheduled: bool) -> bool {
        let fifo = if priority { &mut self.priority } else { &mut self.normal };
        let Some(idx) = fifo.pop_front(&mut self.pool) else {
            return false;
        };
        self.pool[idx].rescheduled = rescheduled;
        fifo.push_back(&mut self.pool, idx);
        true
    }

    /// Moves the head of the normal FIFO to the front of the priority
    /// FIFO, clearing `rescheduled` since that FIFO is fire-and-forget.
    pub fn prioritize_normal(&mut self) -> bool {
        let Some(idx) = self.normal.pop_front(&mut self.pool) else {
            return false;
        };
        self.pool[idx].rescheduled = false;
        self.priority.push_front(&mut self.pool, idx);
        true
    }

    /// Read-only view of the head of the chosen FIFO: its id, whether it
    /// has already been rescheduled once, and its pending frame.
    pub fn peek(&self, priority: bool) -> Option<(u8, bool, &[u8])> {
        let fifo = if priority { &self.priority } else { &self.normal };
        let idx = fifo.head?;
        let entry = &self.pool[idx];
        Some((
            entry.id.expect("queued entry always carries an id"),
            entry.rescheduled,
            &entry.buf,
        ))
    }
}
