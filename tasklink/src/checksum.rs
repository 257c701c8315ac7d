// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Frame checksum.
//!
//! The original wire format reserves two header bytes for a checksum but
//! never computed one; here they carry a real CRC-16/XMODEM over the rest
//! of the decoded frame (task id, task type, and payload).

use crc::{Crc, CRC_16_XMODEM};

const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);

/// Computes the checksum over `body` (everything in a decoded frame after
/// the two checksum bytes).
pub fn compute(body: &[u8]) -> u16 {
    CRC16.checksum(body)
}
