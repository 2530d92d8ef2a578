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

//! Byte-at-a-time frame recognizer.
//!
//! The same machine recognizes SET, UA, DISC, the RR/REJ acknowledgements and
//! information frames; what it accepts is described by an [`Expect`] passed
//! with every byte. Destuffing happens inline while the information field is
//! accumulated, since its length is only known once the closing flag shows up.

use log::{debug, warn};
use crate::frame::bcc2;
use crate::protocol::*;

// ============================================================================
// Frames
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Control {
        address: u8,
        control: u8,
    },
    Information {
        address: u8,
        sequence: u8,
        payload: Vec<u8>,
        /// BCC2 recomputed over the destuffed payload matched the trailer
        valid: bool,
    },
}

/// What the caller is waiting for: frames from `address` whose control byte is
/// one of `controls`, and information frames when `information` is set.
#[derive(Debug, Clone, Copy)]
pub struct Expect<'a> {
    pub address: u8,
    pub controls: &'a [u8],
    pub information: bool,
}

impl<'a> Expect<'a> {
    pub fn control(address: u8, controls: &'a [u8]) -> Self {
        Expect { address, controls, information: false }
    }

    pub fn with_information(mut self) -> Self {
        self.information = true;
        self
    }
}

// ============================================================================
// States
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    SawFlag,
    SawAddress,
    SawControl { control: u8 },
    /// Control frame header checked, closing flag pending
    SawBcc1 { control: u8 },
    /// Information field; the accumulator holds the destuffed bytes so far
    InPayload { sequence: u8, escaped: bool },
}

pub struct FrameReceiver {
    state: State,
    buffer: Vec<u8>,
    max_payload: usize,
    dropped: u64,
}

impl FrameReceiver {
    pub fn new(max_payload: usize) -> Self {
        FrameReceiver {
            state: State::Idle,
            buffer: accumulator(max_payload),
            max_payload,
            dropped: 0,
        }
    }

    /// Forget any partially received frame.
    pub fn reset(&mut self) {
        self.state = State::Idle;
        self.buffer.clear();
    }

    /// Number of information frames discarded for exceeding the size limit.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Consume one byte. Returns a frame once its closing flag has been seen;
    /// the machine is then back in Idle for the next one.
    pub fn feed(&mut self, byte: u8, expect: &Expect<'_>) -> Option<Frame> {
        match self.state {
            State::Idle => {
                if byte == FLAG {
                    self.state = State::SawFlag;
                }
                None
            }
            State::SawFlag => {
                if byte == expect.address {
                    self.state = State::SawAddress;
                } else if byte != FLAG {
                    self.state = State::Idle;
                }
                None
            }
            State::SawAddress => {
                let accepted = expect.controls.contains(&byte)
                    || (expect.information && sequence_of(byte).is_some());
                self.state = if accepted {
                    State::SawControl { control: byte }
                } else if byte == FLAG {
                    State::SawFlag
                } else {
                    State::Idle
                };
                None
            }
            State::SawControl { control } => {
                self.state = if byte == expect.address ^ control {
                    match sequence_of(control) {
                        Some(sequence) if expect.information => {
                            self.buffer.clear();
                            State::InPayload { sequence, escaped: false }
                        }
                        _ => State::SawBcc1 { control },
                    }
                } else if byte == FLAG {
                    State::SawFlag
                } else {
                    State::Idle
                };
                None
            }
            State::SawBcc1 { control } => {
                if byte == FLAG {
                    self.state = State::Idle;
                    debug!("Received: {}", control_name(control));
                    Some(Frame::Control { address: expect.address, control })
                } else {
                    self.state = State::Idle;
                    None
                }
            }
            State::InPayload { sequence, escaped } => self.payload_byte(byte, sequence, escaped, expect),
        }
    }

    fn payload_byte(&mut self, byte: u8, sequence: u8, escaped: bool, expect: &Expect<'_>) -> Option<Frame> {
        if byte == FLAG {
            if escaped {
                // ESC directly before a flag: the frame is broken, resync on this flag
                self.buffer.clear();
                self.state = State::SawFlag;
                return None;
            }
            self.state = State::Idle;
            return Some(self.finish(sequence, expect.address));
        }

        if !escaped && byte == ESC {
            self.state = State::InPayload { sequence, escaped: true };
            return None;
        }

        if self.buffer.len() > self.max_payload {
            warn!("Dropping frame: information field exceeds {} bytes", self.max_payload);
            self.dropped += 1;
            self.reset();
            return None;
        }

        let real = if escaped { byte ^ ESC_MASK } else { byte };
        self.buffer.push(real);
        self.state = State::InPayload { sequence, escaped: false };
        None
    }

    fn finish(&mut self, sequence: u8, address: u8) -> Frame {
        let mut payload = std::mem::take(&mut self.buffer);
        let valid = match payload.pop() {
            Some(received) => bcc2(&payload) == received,
            None => false,
        };
        self.buffer = accumulator(self.max_payload);
        debug!(
            "Received: I{} ({} bytes, {})",
            sequence,
            payload.len(),
            if valid { "BCC2 ok" } else { "BCC2 mismatch" }
        );
        Frame::Information { address, sequence, payload, valid }
    }
}

// ============================================================================
// Tests
// ============================================================================

/// Room for a payload plus its trailing BCC2, capped at the largest frame any
/// DATA packet can produce.
fn accumulator(max_payload: usize) -> Vec<u8> {
    Vec::with_capacity(max_payload.min(MAX_PAYLOAD_LIMIT).saturating_add(1))
}
