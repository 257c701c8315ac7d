// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Accumulates incoming bytes into COBS-delimited frames.
//!
//! A frame boundary is any `0x00` byte. If the buffer fills up without one
//! ever arriving, the link has dropped a terminator (noise, a dropped byte
//! upstream, a peer reset mid-frame); rather than wedge permanently, the
//! buffer resyncs by discarding everything gathered so far and restarting
//! from the byte that overflowed it.

use heapless::Vec;

use crate::config;
use crate::error::CodecError;

ringbuf::ringbuf!(PacketEvent, 8, PacketEvent::Idle);

/// Diagnostic events recorded while assembling inbound frames.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PacketEvent {
    Idle,
    FrameComplete { len: u16 },
    Resync,
}

/// Assembles raw bytes from the link into complete, still-encoded frames.
pub struct PacketBuffer<const MAX_ENCODED: usize> {
    buf: Vec<u8, MAX_ENCODED>,
}

impl<const MAX_ENCODED: usize> Default for PacketBuffer<MAX_ENCODED> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const MAX_ENCODED: usize> PacketBuffer<MAX_ENCODED> {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Feeds one more byte from the link into the buffer.
    ///
    /// Returns the completed, still COBS-encoded frame (terminator
    /// included) once one is seen. Returns `None` while a frame is still
    /// being assembled, after a resync, or when fed an empty buffer's
    /// terminator (nothing to decode).
    pub fn ingest_byte(&mut self, byte: u8) -> Option<Vec<u8, MAX_ENCODED>> {
        // The terminator always wins, even if the buffer is already full:
        // it closes out whatever was gathered rather than being folded into
        // a resync.
        if byte == 0 {
            if self.buf.is_empty() {
                // A lone terminator with nothing preceding it: not a frame.
                return None;
            }
            let _ = self.buf.push(0);
            ringbuf::ringbuf_entry!(PacketEvent::FrameComplete {
                len: self.buf.len() as u16
            });
            return Some(core::mem::take(&mut self.buf));
        }

        if self.buf.push(byte).is_err() {
            ringbuf::ringbuf_entry!(PacketEvent::Resync);
            self.buf.clear();
            // The overflowing byte itself starts the next frame attempt.
            let _ = self.buf.push(byte);
        }

        None
    }
}

/// Decodes and checksum-validates a complete COBS frame into `decoded`,
/// returning the number of header+payload bytes written.
pub fn decode_frame(
    encoded: &[u8],
    decoded: &mut [u8],
) -> Result<usize, CodecError> {
    let len = crate::cobs::decode(encoded, decoded)?;
    if len < config::DECODED_HDR_SIZE {
        return Err(CodecError::ShortPacketHeader);
    }
    let want = u16::from_le_bytes([decoded[0], decoded[1]]);
    let got = crate::checksum::compute(&decoded[2..len]);
    if want != got {
        return Err(CodecError::ChecksumMismatch);
    }
    Ok(len)
}
