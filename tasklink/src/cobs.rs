// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Consistent Overhead Byte Stuffing.
//!
//! Frames on the wire never contain a `0x00` byte except as the final
//! terminator, so a receiver can always find frame boundaries by scanning
//! for zero regardless of what the payload contains.

use crate::error::CodecError;

/// Upper bound on the encoded length of a `len`-byte frame, including its
/// trailing zero terminator.
pub const fn max_encoded_len(len: usize) -> usize {
    len + len.div_ceil(254) + 1
}

/// Encodes `input` into `output`, appending the zero terminator.
///
/// Returns the number of bytes written. Fails if `output` is too small to
/// hold the encoded frame; this can only happen if a caller misconfigured
/// its buffer sizes, since [`max_encoded_len`] is exact.
pub fn encode(input: &[u8], output: &mut [u8]) -> Result<usize, CodecError> {
    if output.len() < max_encoded_len(input.len()) {
        return Err(CodecError::OversizedPayload);
    }

    let mut out_idx = 1;
    let mut code_idx = 0;
    let mut code: u8 = 1;

    for &byte in input {
        if byte == 0 {
            output[code_idx] = code;
            code_idx = out_idx;
            out_idx += 1;
            code = 1;
        } else {
            output[out_idx] = byte;
            out_idx += 1;
            code += 1;
            if code == 0xff {
                output[code_idx] = code;
                code_idx = out_idx;
                out_idx += 1;
                code = 1;
            }
        }
    }

    output[code_idx] = code;
    output[out_idx] = 0;
    out_idx += 1;
    Ok(out_idx)
}

/// Decodes a COBS frame (including its trailing zero terminator, which is
/// not copied to `output`) back into raw bytes.
///
/// Returns the number of bytes written to `output`. A frame that runs out
/// of input before its code bytes say it should, or that would overflow
/// `output`, is refused rather than partially decoded.
pub fn decode(input: &[u8], output: &mut [u8]) -> Result<usize, CodecError> {
    let mut in_idx = 0;
    let mut out_idx = 0;

    while in_idx < input.len() {
        let code = input[in_idx];
        if code == 0 {
            break;
        }
        in_idx += 1;

        for _ in 1..code {
            if in_idx >= input.len() {
                return Err(CodecError::ShortPacketHeader);
            }
            if out_idx >= output.len() {
                return Err(CodecError::OversizedPayload);
            }
            output[out_idx] = input[in_idx];
            out_idx += 1;
            in_idx += 1;
        }

        if code < 0xff && in_idx < input.len() && input[in_idx] != 0 {
            if out_idx >= output.len() {
                return Err(CodecError::OversizedPayload);
            }
            output[out_idx] = 0;
            out_idx += 1;
        }
    }

    Ok(out_idx)
}
