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

//! File transfer on top of the link: a START packet announcing name and size,
//! numbered DATA packets, and an END packet.

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use log::{debug, info};
use crate::error::AppError;
use crate::link::{Established, Link};

/// Packet announcing a file
pub const START: u8 = 0x01;

/// Packet carrying a chunk of file data
pub const DATA: u8 = 0x02;

/// Packet closing a file
pub const END: u8 = 0x03;

/// START/END parameter: file size, big-endian
pub const PARAM_SIZE: u8 = 0x00;

/// START/END parameter: file name
pub const PARAM_NAME: u8 = 0x01;

/// DATA packet header: type, sequence, length high, length low
pub const DATA_HEADER_LEN: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Start { size: u64, name: String },
    Data { sequence: u8, data: Vec<u8> },
    End { size: u64, name: String },
}

impl Packet {
    pub fn kind(&self) -> u8 {
        match self {
            Packet::Start { .. } => START,
            Packet::Data { .. } => DATA,
            Packet::End { .. } => END,
        }
    }

    /// Names longer than 255 bytes and data longer than 65535 bytes are the
    /// caller's responsibility.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Packet::Start { size, name } | Packet::End { size, name } => {
                let mut out = Vec::with_capacity(13 + name.len());
                out.push(self.kind());
                out.extend_from_slice(&[PARAM_SIZE, 8]);
                out.extend_from_slice(&size.to_be_bytes());
                out.extend_from_slice(&[PARAM_NAME, name.len() as u8]);
                out.extend_from_slice(name.as_bytes());
                out
            }
            Packet::Data { sequence, data } => {
                let mut out = Vec::with_capacity(DATA_HEADER_LEN + data.len());
                let len = data.len() as u16;
                out.extend_from_slice(&[DATA, *sequence]);
                out.extend_from_slice(&len.to_be_bytes());
                out.extend_from_slice(data);
                out
            }
        }
    }

    pub fn decode(bytes: &[u8]) -> Result<Packet, AppError> {
        match bytes.first() {
            Some(&DATA) => {
                if bytes.len() < DATA_HEADER_LEN {
                    return Err(AppError::Malformed("truncated data header"));
                }
                let len = u16::from_be_bytes([bytes[2], bytes[3]]) as usize;
                let data = &bytes[DATA_HEADER_LEN..];
                if data.len() != len {
                    return Err(AppError::Malformed("data length does not match header"));
                }
                Ok(Packet::Data { sequence: bytes[1], data: data.to_vec() })
            }
            Some(&kind) if kind == START || kind == END => {
                let (size, name) = decode_params(&bytes[1..])?;
                Ok(if kind == START {
                    Packet::Start { size, name }
                } else {
                    Packet::End { size, name }
                })
            }
            Some(&other) => Err(AppError::UnexpectedPacket(other)),
            None => Err(AppError::Malformed("empty packet")),
        }
    }
}

fn decode_params(mut params: &[u8]) -> Result<(u64, String), AppError> {
    let mut size = None;
    let mut name = None;

    while let [kind, len, rest @ ..] = params {
        let len = *len as usize;
        if rest.len() < len {
            return Err(AppError::Malformed("truncated parameter"));
        }
        let (value, tail) = rest.split_at(len);
        match *kind {
            PARAM_SIZE if len <= 8 => {
                size = Some(value.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64));
            }
            PARAM_SIZE => return Err(AppError::Malformed("file size wider than 64 bits")),
            PARAM_NAME => {
                let text = std::str::from_utf8(value)
                    .map_err(|_| AppError::Malformed("file name is not UTF-8"))?;
                name = Some(text.to_string());
            }
            // Unknown parameters are skipped
            _ => {}
        }
        params = tail;
    }

    if !params.is_empty() {
        return Err(AppError::Malformed("trailing byte after parameters"));
    }

    match (size, name) {
        (Some(size), Some(name)) => Ok((size, name)),
        _ => Err(AppError::Malformed("missing file size or name")),
    }
}

/// Send one file over an established link. Returns the number of file bytes sent.
pub fn send_file(link: &mut Link<Established>, path: &Path) -> Result<u64, AppError> {
    let mut file = File::open(path)?;
    let size = file.metadata()?.len();

    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| n.len() <= u8::MAX as usize)
        .ok_or_else(|| AppError::InvalidName(path.display().to_string()))?
        .to_string();

    let chunk_size = link
        .config()
        .max_payload
        .saturating_sub(DATA_HEADER_LEN)
        .min(u16::MAX as usize);
    if chunk_size == 0 {
        return Err(AppError::Malformed("maximum payload too small for data packets"));
    }

    info!("Sending {} ({} bytes)", name, size);
    link.send(&Packet::Start { size, name: name.clone() }.encode())?;

    let mut buffer = vec![0u8; chunk_size];
    let mut sequence = 0u8;
    let mut sent = 0u64;
    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        link.send(&Packet::Data { sequence, data: buffer[..n].to_vec() }.encode())?;
        sequence = sequence.wrapping_add(1);
        sent += n as u64;
        debug!("Sent {}/{} bytes", sent, size);
    }

    link.send(&Packet::End { size: sent, name }.encode())?;
    Ok(sent)
}

/// Receive one file into `output_dir`. Returns the path written.
pub fn receive_file(link: &mut Link<Established>, output_dir: &Path) -> Result<PathBuf, AppError> {
    let (size, name) = match Packet::decode(&link.receive()?)? {
        Packet::Start { size, name } => (size, name),
        other => return Err(AppError::UnexpectedPacket(other.kind())),
    };

    // Only the final component of the announced name is used
    let file_name = Path::new(&name)
        .file_name()
        .ok_or_else(|| AppError::InvalidName(name.clone()))?;
    let path = output_dir.join(file_name);
    info!("Receiving {} ({} bytes) into {}", name, size, path.display());

    let mut file = BufWriter::new(File::create(&path)?);
    let mut expected = 0u8;
    let mut received = 0u64;

    loop {
        match Packet::decode(&link.receive()?)? {
            Packet::Data { sequence, data } => {
                if sequence != expected {
                    return Err(AppError::OutOfOrder { expected, actual: sequence });
                }
                file.write_all(&data)?;
                expected = expected.wrapping_add(1);
                received += data.len() as u64;
                debug!("Received {}/{} bytes", received, size);
            }
            Packet::End { .. } => break,
            Packet::Start { .. } => return Err(AppError::UnexpectedPacket(START)),
        }
    }
    file.flush()?;

    if received != size {
        return Err(AppError::SizeMismatch { expected: size, actual: received });
    }
    Ok(path)
}

// ============================================================================
// Tests
// ============================================================================
