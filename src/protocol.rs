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

//! Link protocol constants

use std::time::Duration;

/// Frame delimiter, opens and closes every frame
pub const FLAG: u8 = 0x7E;

/// Escape marker used by byte stuffing
pub const ESC: u8 = 0x7D;

/// Second byte of an escaped FLAG
pub const ESC_FLAG: u8 = 0x5E;

/// Second byte of an escaped ESC
pub const ESC_ESC: u8 = 0x5D;

/// Escaped bytes are recovered by XOR with this mask
pub const ESC_MASK: u8 = 0x20;

/// Address of frames sent from the initiator to the responder
pub const ADDRESS_TX: u8 = 0x03;

/// Address of frames sent from the responder to the initiator
pub const ADDRESS_RX: u8 = 0x01;

/// Set up - initiator requests a connection
pub const SET: u8 = 0x03;

/// Unnumbered acknowledgement - reply to SET, and final reply to DISC
pub const UA: u8 = 0x07;

/// Disconnect - either side tears the connection down
pub const DISC: u8 = 0x0B;

/// Receiver ready, expecting sequence 0
pub const RR0: u8 = 0xAA;

/// Receiver ready, expecting sequence 1
pub const RR1: u8 = 0xAB;

/// Reject, retransmit sequence 0
pub const REJ0: u8 = 0x54;

/// Reject, retransmit sequence 1
pub const REJ1: u8 = 0x55;

/// Control byte of an information frame carrying sequence 0
pub const I0: u8 = 0x00;

/// Control byte of an information frame carrying sequence 1
pub const I1: u8 = 0x80;

/// Every acknowledgement a sender may see while a frame is outstanding
pub const ACKNOWLEDGEMENTS: [u8; 4] = [RR0, RR1, REJ0, REJ1];

/// Largest payload the application may hand to a single send
pub const MAX_PAYLOAD_SIZE: usize = 1000;

/// Ceiling for a configured payload size: a DATA packet's 4-byte header plus
/// the most its 16-bit length field can describe
pub const MAX_PAYLOAD_LIMIT: usize = 4 + u16::MAX as usize;

/// Upper bound on a single byte-channel wait
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub fn rr(sequence: u8) -> u8 {
    if sequence == 0 { RR0 } else { RR1 }
}

pub fn rej(sequence: u8) -> u8 {
    if sequence == 0 { REJ0 } else { REJ1 }
}

pub fn information(sequence: u8) -> u8 {
    if sequence == 0 { I0 } else { I1 }
}

/// Sequence bit carried by an information control byte, if it is one
pub fn sequence_of(control: u8) -> Option<u8> {
    match control {
        I0 => Some(0),
        I1 => Some(1),
        _ => None,
    }
}

/// Human readable name of a control byte, for logging
pub fn control_name(control: u8) -> &'static str {
    match control {
        SET => "SET",
        UA => "UA",
        DISC => "DISC",
        RR0 => "RR0",
        RR1 => "RR1",
        REJ0 => "REJ0",
        REJ1 => "REJ1",
        I0 => "I0",
        I1 => "I1",
        _ => "?",
    }
}
