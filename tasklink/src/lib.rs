// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A no-heap task scheduler for a reliable request/response serial link.
//!
//! One side frames application data behind a COBS/CRC16 header, hands it
//! to a fixed-size dual-priority queue pool, and retries unacknowledged
//! normal-priority work through a two-stage timeout before giving up.
//! Everything after construction runs out of statically sized arenas; the
//! scheduler never allocates.
//!
//! The pieces: [`cobs`] and [`checksum`] frame the wire protocol,
//! [`packet`] assembles inbound bytes into frames, [`table`] maps task ids
//! to handlers, [`queue`] holds outbound work, and [`scheduler`] drives
//! all of it through [`Scheduler::ingest_byte`] and [`Scheduler::send_task`].
//! [`fsm`] is a small reusable state-machine skeleton exposed for
//! application handlers to build on; it is not part of the wire protocol.

#![cfg_attr(not(test), no_std)]

pub mod checksum;
pub mod cobs;
pub mod config;
pub mod error;
pub mod fsm;
pub mod packet;
pub mod queue;
pub mod scheduler;
pub mod table;

pub use config::Config;
pub use error::SchedulerError;
pub use scheduler::{Clock, Dispatch, InternalId, Scheduler, TaskKind, Transmit};
pub use table::TaskTable;

static_assertions::const_assert!(config::DEFAULT_SHORT_TIMER <= config::DEFAULT_LONG_TIMER);
