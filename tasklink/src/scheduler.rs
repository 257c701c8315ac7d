// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The scheduler core: wires the codec, task table, and scheduling queues
//! together into the inbound (`ingest_byte`) and outbound (`send_task`)
//! halves of one cooperative main loop.

use crate::checksum;
use crate::cobs;
use crate::config::{Config, DECODED_HDR_SIZE};
use crate::error::SchedulerError;
use crate::packet::{self, PacketBuffer};
use crate::table::TaskTable;
use crate::queue::SchedulingQueues;

ringbuf::ringbuf!(SchedulerEvent, 16, SchedulerEvent::Idle);

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SchedulerEvent {
    Idle,
    InboundError(SchedulerError),
    IncorrectPayloadSize { id: u8, expected: u16, received: u16 },
    FirstTimeout { id: u8 },
    PeerNonresponsive { id: u8 },
    AlertReceived { id: u8, return_code: u8 },
}

/// Transmits one already-framed outbound buffer.
pub trait Transmit {
    fn transmit(&mut self, frame: &[u8]);
}

/// Supplies the current time, in whatever units the configured
/// `short_timer`/`long_timer` windows are expressed in.
pub trait Clock {
    fn now(&mut self) -> u32;
}

/// Runs the application handler registered for an inbound task, returning
/// its u8 completion code (`0` for success; any other value triggers the
/// retry path on the peer that scheduled it).
pub trait Dispatch<H> {
    fn dispatch(&mut self, id: u8, handler: H, payload: &[u8]) -> u8;
}

/// Whether a frame addresses an application task or the scheduler's own
/// control protocol.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum TaskKind {
    External = 0,
    Internal = 1,
}

/// The closed set of internal control message ids.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum InternalId {
    AlertSystem = 0,
    PrintMessage = 1,
    UnscheduleTask = 2,
    ModifyTaskVal = 3,
    PktDecode = 4,
    PktEncode = 5,
    TaskLookup = 6,
    TaskRegister = 7,
}

/// `value_id` arguments to a `PKT_DECODE`-scoped `MODIFY_TASK_VAL`,
/// annotating a payload-size mismatch with the decoded frame size (header
/// included) on each side.
const EXPECTED_PKT_SIZE: u8 = 0;
const RECEIVED_PKT_SIZE: u8 = 1;

/// Microcontroller-side task scheduler for a reliable request/response
/// serial link.
///
/// `H` is the handler token registered per task id (commonly a function
/// pointer or a small `Copy` enum the caller's `Dispatch` impl switches
/// on). The four const generics size the fixed, no-heap arenas the core
/// never grows past construction: `TABLE_SLOTS`/`TABLE_CAP` for the task
/// table, `QUEUE_SIZE` for the scheduling queue pool, and `MAX_ENCODED`
/// for every frame buffer (the rx buffer and each queue entry).
pub struct Scheduler<
    H: Copy,
    Tx: Transmit,
    Ck: Clock,
    Rx: Dispatch<H>,
    const TABLE_SLOTS: usize,
    const TABLE_CAP: usize,
    const QUEUE_SIZE: usize,
    const MAX_ENCODED: usize,
> {
    config: Config,
    table: TaskTable<H, TABLE_SLOTS, TABLE_CAP>,
    queues: SchedulingQueues<QUEUE_SIZE, MAX_ENCODED>,
    rx: PacketBuffer<MAX_ENCODED>,
    prev_task: Option<u8>,
    start_time: u32,
    tx: Tx,
    clock: Ck,
    dispatch: Rx,
}

impl<
        H: Copy,
        Tx: Transmit,
        Ck: Clock,
        Rx: Dispatch<H>,
        const TABLE_SLOTS: usize,
        const TABLE_CAP: usize,
        const QUEUE_SIZE: usize,
        const MAX_ENCODED: usize,
    > Scheduler<H, Tx, Ck, Rx, TABLE_SLOTS, TABLE_CAP, QUEUE_SIZE, MAX_ENCODED>
{
    /// Builds a scheduler, refusing a `config` whose maximum frame size
    /// does not fit in `MAX_ENCODED`, or whose timer windows are inverted.
    pub fn new(config: Config, tx: Tx, clock: Ck, dispatch: Rx) -> Option<Self> {
        if !config.validate(MAX_ENCODED) {
            return None;
        }
        Some(Self {
            config,
            table: TaskTable::new(),
            queues: SchedulingQueues::new(),
            rx: PacketBuffer::new(),
            prev_task: None,
            start_time: 0,
            tx,
            clock,
            dispatch,
        })
    }

    /// Borrows the transmit callback, e.g. to inspect what has been sent
    /// so far in tests.
    pub fn transmitter(&self) -> &Tx {
        &self.tx
    }

    /// Mutably borrows the clock callback.
    pub fn clock_mut(&mut self) -> &mut Ck {
        &mut self.clock
    }

    /// Borrows the dispatch callback, e.g. to inspect which handlers have
    /// run so far in tests.
    pub fn dispatcher(&self) -> &Rx {
        &self.dispatch
    }

    /// `true` if `id` is currently waiting in either FIFO.
    pub fn queue_contains(&self, id: u8) -> bool {
        self.queues.contains(id)
    }

    /// Number of entries currently waiting in either FIFO.
    pub fn queue_len(&self) -> usize {
        self.queues.len()
    }

    /// Registers `handler` for `id`, expecting payloads of exactly
    /// `expected_len` bytes, or any size if `expected_len` is negative.
    /// See [`TaskTable::register`].
    pub fn register_task(
        &mut self,
        id: u8,
        handler: H,
        expected_len: i16,
    ) -> Result<bool, SchedulerError> {
        self.table.register(id, handler, expected_len).map_err(SchedulerError::from)
    }

    fn encode_frame(&self, id: u8, kind: TaskKind, payload: &[u8]) -> Result<heapless::Vec<u8, MAX_ENCODED>, SchedulerError> {
        let mut decoded = [0u8; MAX_ENCODED];
        let body_len = DECODED_HDR_SIZE + payload.len();
        if body_len > decoded.len() {
            return Err(SchedulerError::OversizedPayload);
        }
        decoded[2] = id;
        decoded[3] = kind as u8;
        decoded[DECODED_HDR_SIZE..body_len].copy_from_slice(payload);
        let cksum = checksum::compute(&decoded[2..body_len]);
        decoded[0..2].copy_from_slice(&cksum.to_le_bytes());

        let mut encoded = heapless::Vec::<u8, MAX_ENCODED>::new();
        let _ = encoded.resize_default(MAX_ENCODED);
        let elen = cobs::encode(&decoded[..body_len], encoded.as_mut_slice())
            .map_err(SchedulerError::from)?;
        encoded.truncate(elen);
        Ok(encoded)
    }

    /// Schedules one frame for transmission.
    ///
    /// If `id` is already waiting in either FIFO, the new request is
    /// dropped silently: the copy already queued will be retried, and a
    /// stable correlation handle (the normal FIFO head's identity) is what
    /// makes the retry protocol work at all.
    pub fn schedule(
        &mut self,
        id: u8,
        kind: TaskKind,
        payload: &[u8],
        priority: bool,
        fast: bool,
    ) -> Result<(), SchedulerError> {
        if self.queues.contains(id) {
            return Ok(());
        }

        let encoded = self.encode_frame(id, kind, payload)?;

        if self.queues.is_full() {
            if self.queues.priority_is_empty() {
                self.queues.prioritize_normal();
            }
            self.send_task();
        }

        let pushed = if fast {
            self.queues.push_fast(id, &encoded)
        } else if priority {
            self.queues.push_priority(id, &encoded)
        } else {
            self.queues.push_normal(id, &encoded)
        };
        pushed.map_err(SchedulerError::from)?;

        if fast {
            self.send_task();
        }
        Ok(())
    }

    pub fn schedule_normal(&mut self, id: u8, payload: &[u8]) -> Result<(), SchedulerError> {
        self.schedule(id, TaskKind::External, payload, false, false)
    }

    pub fn schedule_priority(&mut self, id: u8, payload: &[u8]) -> Result<(), SchedulerError> {
        self.schedule(id, TaskKind::External, payload, true, false)
    }

    pub fn schedule_fast(&mut self, id: u8, kind: TaskKind, payload: &[u8]) -> Result<(), SchedulerError> {
        self.schedule(id, kind, payload, true, true)
    }

    /// Tells the peer how a just-run handler completed, so it can advance
    /// or retry its own copy of that task.
    pub fn alert_task_completion(&mut self, id: u8, return_code: u8) -> Result<(), SchedulerError> {
        self.schedule_fast(InternalId::AlertSystem as u8, TaskKind::Internal, &[id, return_code])
    }

    /// Feeds one byte received from the link. Runs the full inbound
    /// pipeline once a complete frame has been assembled.
    pub fn ingest_byte(&mut self, byte: u8) -> Result<(), SchedulerError> {
        let Some(frame) = self.rx.ingest_byte(byte) else {
            return Ok(());
        };
        self.process_inbound(&frame)
    }

    fn process_inbound(&mut self, frame: &[u8]) -> Result<(), SchedulerError> {
        let mut decoded = [0u8; MAX_ENCODED];
        let len = match packet::decode_frame(frame, &mut decoded) {
            Ok(len) => len,
            Err(e) => {
                let err = SchedulerError::from(e);
                ringbuf::ringbuf_entry!(SchedulerEvent::InboundError(err));
                self.report_decode_error(0, err);
                return Err(err);
            }
        };

        let id = decoded[2];
        let kind = decoded[3];
        let payload = &decoded[DECODED_HDR_SIZE..len];

        if kind == TaskKind::Internal as u8 {
            self.handle_internal(id, payload);
            return Ok(());
        }

        let Some((handler, expected_len)) = self.table.lookup(id) else {
            let err = SchedulerError::TaskNotRegistered;
            ringbuf::ringbuf_entry!(SchedulerEvent::InboundError(err));
            self.report_decode_error(id, err);
            return Err(err);
        };

        if expected_len >= 0 && expected_len as usize != payload.len() {
            let err = SchedulerError::IncorrectPayloadSize;
            let expected = (DECODED_HDR_SIZE + expected_len as usize) as u16;
            let received = len as u16;
            ringbuf::ringbuf_entry!(SchedulerEvent::IncorrectPayloadSize { id, expected, received });
            self.report_payload_size_mismatch(id, expected, received);
            self.report_decode_error(id, err);
            return Err(err);
        }

        let return_code = self.dispatch.dispatch(id, handler, payload);
        // A best-effort notification: if the reply itself can't be queued
        // (pool momentarily exhausted), the peer simply times the task out
        // and retries, same as any other dropped ALERT.
        let _ = self.alert_task_completion(id, return_code);
        Ok(())
    }

    /// Annotates a payload-size mismatch with the decoded frame size
    /// (header included) expected and received, one `MODIFY_TASK_VAL` per
    /// value, ahead of the `PRINT_MESSAGE(PKT_DECODE, INCORRECT_PAYLOAD_SIZE)`
    /// report. Each value is carried as a little-endian `u16`.
    fn report_payload_size_mismatch(&mut self, task_id: u8, expected: u16, received: u16) {
        let expected = expected.to_le_bytes();
        let received = received.to_le_bytes();
        let _ = self.schedule_fast(
            InternalId::ModifyTaskVal as u8,
            TaskKind::Internal,
            &[task_id, InternalId::PktDecode as u8, RECEIVED_PKT_SIZE, 2, received[0], received[1]],
        );
        let _ = self.schedule_fast(
            InternalId::ModifyTaskVal as u8,
            TaskKind::Internal,
            &[task_id, InternalId::PktDecode as u8, EXPECTED_PKT_SIZE, 2, expected[0], expected[1]],
        );
    }

    /// Tells the peer an inbound frame was rejected, so its logger/
    /// value-inspector side can surface it. Best-effort: if the queues are
    /// momentarily full this notification is simply dropped.
    fn report_decode_error(&mut self, task_id: u8, error: SchedulerError) {
        let _ = self.schedule_fast(
            InternalId::PrintMessage as u8,
            TaskKind::Internal,
            &[task_id, InternalId::PktDecode as u8, error as u8],
        );
    }

    fn handle_internal(&mut self, internal_id: u8, payload: &[u8]) {
        let is_alert = internal_id == InternalId::AlertSystem as u8
            || internal_id == InternalId::UnscheduleTask as u8;
        if !is_alert {
            // PRINT_MESSAGE, MODIFY_TASK_VAL, and the remaining reserved
            // ids are opaque on this side: this scheduler emits them but
            // does not consume them.
            return;
        }
        if payload.len() < 2 {
            return;
        }
        let orig_id = payload[0];
        let return_code = payload[1];

        let Some((head_id, rescheduled, _)) = self.queues.peek(false) else {
            return;
        };
        if head_id != orig_id {
            return;
        }

        ringbuf::ringbuf_entry!(SchedulerEvent::AlertReceived { id: orig_id, return_code });
        if return_code != 0 && !rescheduled {
            self.queues.reschedule(false, true);
        } else {
            self.queues.pop(false);
        }
        self.prev_task = None;
    }

    /// Drains one outbound slot. Call once per main-loop iteration.
    ///
    /// Priority always wins: a non-empty priority FIFO sends and pops its
    /// head, fire-and-forget. Otherwise the normal FIFO head is the single
    /// outstanding request tracked against `prev_task`; a first send
    /// records `start_time`, and a second `send_task` after it times out
    /// either re-arms the retry (short window) or gives up (long window).
    pub fn send_task(&mut self) {
        if let Some((_id, _rescheduled, buf)) = self.queues.peek(true) {
            let mut scratch = [0u8; MAX_ENCODED];
            let len = buf.len();
            scratch[..len].copy_from_slice(buf);
            self.tx.transmit(&scratch[..len]);
            self.queues.pop(true);
            return;
        }

        // A reschedule/drop below relinks the normal head; re-check once
        // more within the same call so a solitary retried entry is resent
        // immediately instead of waiting for the next main-loop iteration.
        for _ in 0..2 {
            let Some((id, rescheduled, buf)) = self.queues.peek(false) else {
                return;
            };
            let now = self.clock.now();

            if self.prev_task != Some(id) {
                self.prev_task = Some(id);
                self.start_time = now;
                let mut scratch = [0u8; MAX_ENCODED];
                let len = buf.len();
                scratch[..len].copy_from_slice(buf);
                self.tx.transmit(&scratch[..len]);
                return;
            }

            let window = if rescheduled {
                self.config.long_timer
            } else {
                self.config.short_timer
            };
            if now.wrapping_sub(self.start_time) < window {
                return;
            }

            if rescheduled {
                ringbuf::ringbuf_entry!(SchedulerEvent::PeerNonresponsive { id });
                self.queues.pop(false);
            } else {
                ringbuf::ringbuf_entry!(SchedulerEvent::FirstTimeout { id });
                self.queues.reschedule(false, true);
            }
            self.prev_task = None;
        }
    }
}
