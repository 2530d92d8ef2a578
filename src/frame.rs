// Copyright (C) 2026 Brian Johnson
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! Frame codec: builds control and information frames and byte-stuffs the
//! information field. Destuffing happens byte by byte in the receiver.

use crate::error::LinkError;
use crate::protocol::*;

/// Length of a control frame on the wire
pub const CONTROL_FRAME_LEN: usize = 5;

/// XOR-fold of the payload, 0 for an empty payload
pub fn bcc2(payload: &[u8]) -> u8 {
    payload.iter().fold(0u8, |acc, &b| acc ^ b)
}

pub fn control_frame(address: u8, control: u8) -> [u8; CONTROL_FRAME_LEN] {
    [FLAG, address, control, address ^ control, FLAG]
}

/// Append `bytes` to `out`, escaping FLAG and ESC.
pub fn stuff_into(out: &mut Vec<u8>, bytes: &[u8]) {
    for &b in bytes {
        match b {
            FLAG => out.extend_from_slice(&[ESC, ESC_FLAG]),
            ESC => out.extend_from_slice(&[ESC, ESC_ESC]),
            _ => out.push(b),
        }
    }
}

/// Build a complete information frame.
///
/// The header (FLAG, address, sequence control byte, BCC1) and the closing
/// FLAG are written literally; only the payload and BCC2 are stuffed.
pub fn information_frame(
    address: u8,
    sequence: u8,
    payload: &[u8],
    max_payload: usize,
) -> Result<Vec<u8>, LinkError> {
    if payload.len() > max_payload {
        return Err(LinkError::PayloadTooLarge {
            size: payload.len(),
            max: max_payload,
        });
    }

    let control = information(sequence);
    // Worst case every payload byte and BCC2 doubles in size
    let mut frame = Vec::with_capacity(6 + 2 * (payload.len() + 1));
    frame.extend_from_slice(&[FLAG, address, control, address ^ control]);
    stuff_into(&mut frame, payload);
    stuff_into(&mut frame, &[bcc2(payload)]);
    frame.push(FLAG);
    Ok(frame)
}
