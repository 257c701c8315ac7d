// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! End-to-end exercises driving a full [`Scheduler`] through `ingest_byte`
//! and `send_task` exactly as a real main loop would, with fake `tx`,
//! `clock`, and `rx_dispatch` callbacks standing in for the link and the
//! application.

use tasklink::config::Config;
use tasklink::scheduler::{Clock, Dispatch, InternalId, Scheduler, TaskKind, Transmit};
use tasklink::SchedulerError;

const TABLE_SLOTS: usize = 4;
const TABLE_CAP: usize = 8;
const QUEUE_SIZE: usize = 5;
const MAX_ENCODED: usize = 16;

struct RecordingTx {
    sent: Vec<std::vec::Vec<u8>>,
}

impl Transmit for RecordingTx {
    fn transmit(&mut self, frame: &[u8]) {
        self.sent.push(frame.to_vec());
    }
}

struct FakeClock {
    now: u32,
}

impl Clock for FakeClock {
    fn now(&mut self) -> u32 {
        self.now
    }
}

struct RecordingDispatch {
    calls: std::vec::Vec<(u8, std::vec::Vec<u8>)>,
    return_code: u8,
}

impl Dispatch<u8> for RecordingDispatch {
    fn dispatch(&mut self, id: u8, _handler: u8, payload: &[u8]) -> u8 {
        self.calls.push((id, payload.to_vec()));
        self.return_code
    }
}

type TestScheduler = Scheduler<
    u8,
    RecordingTx,
    FakeClock,
    RecordingDispatch,
    TABLE_SLOTS,
    TABLE_CAP,
    QUEUE_SIZE,
    MAX_ENCODED,
>;

fn new_scheduler(return_code: u8) -> TestScheduler {
    Scheduler::new(
        Config {
            max_payload: 8,
            ..Config::default()
        },
        RecordingTx { sent: vec![] },
        FakeClock { now: 0 },
        RecordingDispatch {
            calls: vec![],
            return_code,
        },
    )
    .expect("default-sized config fits MAX_ENCODED")
}

type SmallQueueScheduler =
    Scheduler<u8, RecordingTx, FakeClock, RecordingDispatch, TABLE_SLOTS, TABLE_CAP, 2, MAX_ENCODED>;

fn new_small_queue_scheduler() -> SmallQueueScheduler {
    Scheduler::new(
        Config {
            max_payload: 8,
            ..Config::default()
        },
        RecordingTx { sent: vec![] },
        FakeClock { now: 0 },
        RecordingDispatch {
            calls: vec![],
            return_code: 0,
        },
    )
    .expect("default-sized config fits MAX_ENCODED")
}

/// Encodes a wire frame the way a peer would, for feeding into
/// `ingest_byte` byte by byte.
fn wire_frame(id: u8, kind: TaskKind, payload: &[u8]) -> std::vec::Vec<u8> {
    let mut decoded = [0u8; MAX_ENCODED];
    decoded[2] = id;
    decoded[3] = kind as u8;
    decoded[4..4 + payload.len()].copy_from_slice(payload);
    let body_len = 4 + payload.len();
    let cksum = tasklink::checksum::compute(&decoded[2..body_len]);
    decoded[0..2].copy_from_slice(&cksum.to_le_bytes());

    let mut encoded = [0u8; MAX_ENCODED];
    let n = tasklink::cobs::encode(&decoded[..body_len], &mut encoded).unwrap();
    encoded[..n].to_vec()
}

fn feed(sched: &mut TestScheduler, frame: &[u8]) {
    for &b in frame {
        sched.ingest_byte(b).ok();
    }
}

/// Decodes a frame this crate itself encoded and sent, for asserting on
/// its `(id, kind, payload)` in tests.
fn decode_sent(frame: &[u8]) -> (u8, u8, std::vec::Vec<u8>) {
    let mut decoded = [0u8; MAX_ENCODED];
    let len = tasklink::cobs::decode(frame, &mut decoded).unwrap();
    (decoded[2], decoded[3], decoded[4..len].to_vec())
}

#[test]
fn single_success_runs_handler_and_alerts() {
    let mut sched = new_scheduler(0);
    sched.register_task(10, 7u8, 1).unwrap();

    let frame = wire_frame(10, TaskKind::External, &[0x7f]);
    feed(&mut sched, &frame);

    assert_eq!(sched.dispatcher().calls, vec![(10, vec![0x7f])]);

    sched.send_task();
    assert_eq!(sched.transmitter().sent.len(), 1);
}

#[test]
fn wrong_size_payload_is_rejected_without_invoking_handler() {
    let mut sched = new_scheduler(0);
    sched.register_task(10, 7u8, 1).unwrap();

    let frame = wire_frame(10, TaskKind::External, &[1, 2]);
    feed(&mut sched, &frame);

    assert!(sched.dispatcher().calls.is_empty());

    // Annotated per scenario: task=10, expected=5 (4-byte header + the
    // registered 1-byte payload), received=6 (4-byte header + the 2 bytes
    // actually sent).
    let sent: std::vec::Vec<_> = sched.transmitter().sent.iter().map(|f| decode_sent(f)).collect();
    assert_eq!(
        sent,
        vec![
            (InternalId::ModifyTaskVal as u8, TaskKind::Internal as u8, vec![10, InternalId::PktDecode as u8, 1, 2, 6, 0]),
            (InternalId::ModifyTaskVal as u8, TaskKind::Internal as u8, vec![10, InternalId::PktDecode as u8, 0, 2, 5, 0]),
            (InternalId::PrintMessage as u8, TaskKind::Internal as u8, vec![10, InternalId::PktDecode as u8, SchedulerError::IncorrectPayloadSize as u8]),
        ]
    );
}

#[test]
fn table_exhaustion_is_distinct_from_queue_exhaustion() {
    let mut sched = new_scheduler(0);
    for id in 0..TABLE_CAP as u8 {
        sched.register_task(id, 0u8, -1).unwrap();
    }
    assert_eq!(
        sched.register_task(TABLE_CAP as u8, 0u8, -1),
        Err(SchedulerError::TableFull)
    );
}

#[test]
fn negative_expected_len_accepts_any_payload_size() {
    let mut sched = new_scheduler(0);
    sched.register_task(10, 7u8, -1).unwrap();

    let frame = wire_frame(10, TaskKind::External, &[1, 2, 3]);
    feed(&mut sched, &frame);

    assert_eq!(sched.dispatcher().calls, vec![(10, vec![1, 2, 3])]);
}

#[test]
fn queue_full_eviction_promotes_oldest_normal_task() {
    let mut sched = new_small_queue_scheduler();
    sched.schedule_normal(1, &[1]).unwrap();
    sched.schedule_normal(2, &[2]).unwrap();
    // Pool (QUEUE_SIZE=2) is now full with ids 1 and 2. Scheduling a third
    // forces schedule() to promote the normal head (id 1) into priority
    // and drain it via send_task before the new entry can be pushed.
    sched.schedule_normal(3, &[3]).unwrap();

    assert_eq!(sched.transmitter().sent.len(), 1, "id 1 was transmitted and popped");
    assert!(!sched.queue_contains(1));
    assert!(sched.queue_contains(2));
    assert!(sched.queue_contains(3));

    sched.send_task();
    assert_eq!(sched.transmitter().sent.len(), 2, "next send_task starts on id 2");
}

#[test]
fn dedup_drops_a_repeated_schedule_request() {
    let mut sched = new_scheduler(0);
    sched.schedule_normal(42, &[1]).unwrap();
    sched.schedule_normal(42, &[2]).unwrap();
    assert!(sched.queue_contains(42));
    assert_eq!(sched.queue_len(), 1);
}

#[test]
fn two_stage_timeout_reschedules_then_drops() {
    let mut sched = new_scheduler(0);
    sched.schedule_normal(9, &[1]).unwrap();

    sched.send_task();
    assert_eq!(sched.transmitter().sent.len(), 1, "first send_task transmits immediately");

    sched.clock_mut().now = 349;
    sched.send_task();
    assert_eq!(sched.transmitter().sent.len(), 1, "window still open at t=349");

    sched.clock_mut().now = 350;
    sched.send_task();
    assert_eq!(sched.transmitter().sent.len(), 2, "short-timer retry retransmits");

    sched.clock_mut().now = 849;
    sched.send_task();
    assert_eq!(sched.transmitter().sent.len(), 2, "long-timer window still open at t=849");

    sched.clock_mut().now = 850;
    sched.send_task();
    assert_eq!(sched.transmitter().sent.len(), 2, "entry is dropped, not retransmitted");
    assert!(!sched.queue_contains(9));
}

#[test]
fn priority_overtakes_normal_without_disturbing_its_retry_clock() {
    let mut sched = new_scheduler(0);
    sched.schedule_normal(1, &[1]).unwrap();
    sched.send_task();
    assert_eq!(sched.transmitter().sent.len(), 1);

    sched.clock_mut().now = 100;
    sched.schedule_priority(2, &[2]).unwrap();
    sched.send_task();
    assert_eq!(sched.transmitter().sent.len(), 2, "priority head sends immediately");
    assert!(sched.queue_contains(1), "normal head is untouched");
    assert!(!sched.queue_contains(2), "priority head was popped after sending");

    // Normal retry clock still counts from t=0: short timer at t=350.
    sched.clock_mut().now = 349;
    sched.send_task();
    assert_eq!(sched.transmitter().sent.len(), 2);
    sched.clock_mut().now = 350;
    sched.send_task();
    assert_eq!(sched.transmitter().sent.len(), 3);
}

#[test]
fn alert_correlation_advances_or_retries_the_matching_head() {
    let mut sched = new_scheduler(0);
    sched.schedule_normal(7, &[1]).unwrap();
    sched.send_task();

    // Peer reports failure (return_code=1): first ALERT escalates.
    let alert_fail = wire_frame(0, TaskKind::Internal, &[7, 1]);
    feed(&mut sched, &alert_fail);
    assert!(sched.queue_contains(7));

    // A second failing ALERT for the now-rescheduled head pops it.
    let alert_fail_again = wire_frame(0, TaskKind::Internal, &[7, 1]);
    feed(&mut sched, &alert_fail_again);
    assert!(!sched.queue_contains(7));
}

#[test]
fn alert_success_pops_immediately() {
    let mut sched = new_scheduler(0);
    sched.schedule_normal(7, &[1]).unwrap();
    sched.send_task();

    let alert_ok = wire_frame(0, TaskKind::Internal, &[7, 0]);
    feed(&mut sched, &alert_ok);
    assert!(!sched.queue_contains(7));
}
