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

//! Error types for the link and application layers.

use thiserror::Error;

/// Fatal link errors. Anything recoverable (checksum mismatch, garbage on the
/// line, a rejected frame) is handled inside the link and never shows up here.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("no UA received after {attempts} SET transmissions")]
    HandshakeTimeout { attempts: u32 },

    #[error("no acknowledgement received after {attempts} transmissions")]
    MaxRetransmissionsExceeded { attempts: u32 },

    #[error("serial channel I/O error: {0}")]
    ChannelIo(#[from] std::io::Error),

    #[error("payload of {size} bytes exceeds the maximum of {max}")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("peer disconnected")]
    Disconnected,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Link(#[from] LinkError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed packet: {0}")]
    Malformed(&'static str),

    #[error("unexpected packet type 0x{0:02X}")]
    UnexpectedPacket(u8),

    #[error("data packet out of order: expected {expected}, got {actual}")]
    OutOfOrder { expected: u8, actual: u8 },

    #[error("file size mismatch: announced {expected} bytes, received {actual}")]
    SizeMismatch { expected: u64, actual: u64 },

    #[error("unusable file name: {0:?}")]
    InvalidName(String),
}
