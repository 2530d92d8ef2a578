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

use std::io::ErrorKind;
use std::time::Duration;
use serialport::{SerialPort as SerialPortTrait, DataBits, Parity, StopBits};

// ============================================================================
// SerialPort Trait
// ============================================================================

/// Byte channel the link runs over
pub trait SerialPort: Send {
    fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()>;

    /// Wait at most `timeout` for one byte. `Ok(None)` means nothing arrived.
    fn read_byte(&mut self, timeout: Duration) -> std::io::Result<Option<u8>>;
}

// ============================================================================
// Real Serial Port Implementation
// ============================================================================

/// Real serial port implementation that wraps the serialport crate.
/// The device is closed when this is dropped.
pub struct RealSerialPort {
    port: Box<dyn SerialPortTrait>,
    timeout: Duration,
}

impl RealSerialPort {
    pub fn open(
        port_name: &str,
        baud_rate: u32,
        data_bits: DataBits,
        parity: Parity,
        stop_bits: StopBits,
    ) -> Result<Self, serialport::Error> {
        let timeout = Duration::from_millis(100);
        let port = serialport::new(port_name, baud_rate)
            .data_bits(data_bits)
            .parity(parity)
            .stop_bits(stop_bits)
            .timeout(timeout)
            .open()?;

        Ok(RealSerialPort { port, timeout })
    }
}

impl SerialPort for RealSerialPort {
    fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        self.port.write_all(buf)?;
        self.port.flush()?;
        Ok(())
    }

    fn read_byte(&mut self, timeout: Duration) -> std::io::Result<Option<u8>> {
        if timeout != self.timeout {
            self.port.set_timeout(timeout)
                .map_err(|e| std::io::Error::new(ErrorKind::Other, e))?;
            self.timeout = timeout;
        }

        let mut buf = [0u8; 1];
        match self.port.read(&mut buf) {
            Ok(0) => Ok(None),
            Ok(_) => Ok(Some(buf[0])),
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::Interrupted) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

// ============================================================================
// Mock Serial Port for Testing
// ============================================================================

#[cfg(test)]
pub struct MockSerialPort {
    // Data to return on reads (None = timeout)
    read_buffer: Vec<Option<u8>>,
    read_pos: usize,
    // Track what was written
    write_log: Vec<u8>,
    // Expected writes for verification
    expected_writes: Vec<u8>,
    // Advanced by the requested wait on every timeout
    clock: Option<crate::timer::ManualClock>,
}

#[cfg(test)]
impl MockSerialPort {
    pub fn new(responses: Vec<Option<u8>>, expected_writes: Vec<u8>) -> Self {
        MockSerialPort {
            read_buffer: responses,
            read_pos: 0,
            write_log: Vec::new(),
            expected_writes,
            clock: None,
        }
    }

    pub fn with_clock(mut self, clock: crate::timer::ManualClock) -> Self {
        self.clock = Some(clock);
        self
    }

    fn timeout(&self, waited: Duration) -> std::io::Result<Option<u8>> {
        if let Some(clock) = &self.clock {
            clock.advance(waited);
        }
        Ok(None)
    }
}

#[cfg(test)]
impl SerialPort for MockSerialPort {
    fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        self.write_log.extend_from_slice(buf);
        Ok(())
    }

    fn read_byte(&mut self, timeout: Duration) -> std::io::Result<Option<u8>> {
        // Out of responses = timeout
        if self.read_pos >= self.read_buffer.len() {
            return self.timeout(timeout);
        }

        let response = self.read_buffer[self.read_pos];
        self.read_pos += 1;
        match response {
            Some(byte) => Ok(Some(byte)),
            None => self.timeout(timeout),
        }
    }
}

#[cfg(test)]
impl Drop for MockSerialPort {
    fn drop(&mut self) {
        if std::thread::panicking() {
            return;
        }

        assert_eq!(
            self.read_pos,
            self.read_buffer.len(),
            "MockSerialPort dropped with {} unconsumed responses (read {} of {} bytes)",
            self.read_buffer.len() - self.read_pos,
            self.read_pos,
            self.read_buffer.len()
        );

        assert_eq!(
            &self.write_log,
            &self.expected_writes,
            "MockSerialPort write log mismatch!\nExpected {} bytes:\n{:02X?}\nGot {} bytes:\n{:02X?}",
            self.expected_writes.len(),
            self.expected_writes,
            self.write_log.len(),
            self.write_log
        );
    }
}

/// Script helper: every byte of `bytes` arrives without delay.
#[cfg(test)]
pub fn arriving(bytes: &[u8]) -> Vec<Option<u8>> {
    bytes.iter().map(|&b| Some(b)).collect()
}

// ============================================================================
// In-memory Loopback Pair for Testing
// ============================================================================

/// One end of a crossed pair of byte queues. Individual `write_all` calls can
/// be dropped or have one byte flipped to simulate a noisy line.
#[cfg(test)]
pub struct LoopbackPort {
    tx: std::sync::mpsc::Sender<u8>,
    rx: std::sync::mpsc::Receiver<u8>,
    writes: usize,
    drop_writes: Vec<usize>,
    corrupt_writes: Vec<(usize, usize)>,
}

#[cfg(test)]
impl LoopbackPort {
    pub fn pair() -> (LoopbackPort, LoopbackPort) {
        let (a_tx, b_rx) = std::sync::mpsc::channel();
        let (b_tx, a_rx) = std::sync::mpsc::channel();
        let end = |tx, rx| LoopbackPort {
            tx,
            rx,
            writes: 0,
            drop_writes: Vec::new(),
            corrupt_writes: Vec::new(),
        };
        (end(a_tx, a_rx), end(b_tx, b_rx))
    }

    /// Lose the `n`th write (0-based) entirely.
    pub fn dropping(mut self, n: usize) -> Self {
        self.drop_writes.push(n);
        self
    }

    /// Flip the low bit of byte `offset` in the `n`th write.
    pub fn corrupting(mut self, n: usize, offset: usize) -> Self {
        self.corrupt_writes.push((n, offset));
        self
    }
}

#[cfg(test)]
impl SerialPort for LoopbackPort {
    fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        let n = self.writes;
        self.writes += 1;
        if self.drop_writes.contains(&n) {
            return Ok(());
        }

        for (i, &byte) in buf.iter().enumerate() {
            let byte = if self.corrupt_writes.contains(&(n, i)) { byte ^ 0x01 } else { byte };
            // A vanished peer is just a silent line
            let _ = self.tx.send(byte);
        }
        Ok(())
    }

    fn read_byte(&mut self, timeout: Duration) -> std::io::Result<Option<u8>> {
        use std::sync::mpsc::RecvTimeoutError;

        match self.rx.recv_timeout(timeout) {
            Ok(byte) => Ok(Some(byte)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => {
                std::thread::sleep(timeout);
                Ok(None)
            }
        }
    }
}
