// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error taxonomy for the scheduler core.
//!
//! Every fallible operation returns a plain `Copy` error enum rather than
//! panicking; callers decide whether a failure is worth surfacing further.
//! The top-level [`SchedulerError`] composes the per-module errors produced
//! while handling one inbound byte or one outbound send.

/// Errors from the COBS/checksum frame codec.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CodecError {
    /// The decoded frame is shorter than the fixed header.
    ShortPacketHeader,
    /// The checksum carried in the header does not match the payload.
    ChecksumMismatch,
    /// The encoded frame would not fit in the caller's buffer.
    OversizedPayload,
}

/// Errors from the task lookup table.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TableError {
    /// No entry for this task id has been registered.
    TaskNotRegistered,
    /// The entry arena has no free slots left.
    TableFull,
}

/// Errors from the scheduling queues.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum QueueError {
    /// Both the normal and priority FIFOs (and the free list) are full.
    QueuesFull,
    /// The payload supplied does not match the task's registered size.
    IncorrectPayloadSize,
}

/// The closed set of failures the scheduler core can report to a caller.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum SchedulerError {
    ShortPacketHeader = 0,
    ChecksumMismatch = 1,
    TaskNotRegistered = 2,
    IncorrectPayloadSize = 3,
    QueuesFull = 4,
    OversizedPayload = 5,
    /// The peer never replied to the escalated (long-timer) retry.
    PeerNonresponsive = 6,
    /// The task lookup table's entry arena has no free slots left. Distinct
    /// from `QueuesFull`: this only ever comes from `register_task` at
    /// startup, has no `prioritize_normal`-style recovery, and should be
    /// treated as fatal by the caller.
    TableFull = 7,
}

impl From<CodecError> for SchedulerError {
    fn from(e: CodecError) -> Self {
        match e {
            CodecError::ShortPacketHeader => SchedulerError::ShortPacketHeader,
            CodecError::ChecksumMismatch => SchedulerError::ChecksumMismatch,
            CodecError::OversizedPayload => SchedulerError::OversizedPayload,
        }
    }
}

impl From<TableError> for SchedulerError {
    fn from(e: TableError) -> Self {
        match e {
            TableError::TaskNotRegistered => SchedulerError::TaskNotRegistered,
            TableError::TableFull => SchedulerError::TableFull,
        }
    }
}

impl From<QueueError> for SchedulerError {
    fn from(e: QueueError) -> Self {
        match e {
            QueueError::QueuesFull => SchedulerError::QueuesFull,
            QueueError::IncorrectPayloadSize => SchedulerError::IncorrectPayloadSize,
        }
    }
}
