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

//! Connection lifecycle (SET/UA open, DISC/DISC/UA close) and stop-and-wait
//! transfer of information frames.
//!
//! A link is a typestate: `Link<Disconnected>` can only `open`, and the
//! resulting `Link<Established>` is the only thing that can `send`, `receive`
//! or `close`. Operations take `&mut self` or `self`, so at most one of them
//! is ever in progress on a connection.

use std::fmt;
use std::marker::PhantomData;
use std::time::Duration;
use log::{debug, info, warn};
use crate::error::LinkError;
use crate::frame::{control_frame, information_frame};
use crate::protocol::*;
use crate::receiver::{Expect, Frame, FrameReceiver};
use crate::serial::SerialPort;
use crate::timer::{Clock, Retransmission, SystemClock, Tick};

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Initiator,
    Responder,
}

impl Role {
    /// Address placed on frames this side sends
    pub fn address(self) -> u8 {
        match self {
            Role::Initiator => ADDRESS_TX,
            Role::Responder => ADDRESS_RX,
        }
    }

    /// Address expected on frames from the other side
    pub fn peer_address(self) -> u8 {
        match self {
            Role::Initiator => ADDRESS_RX,
            Role::Responder => ADDRESS_TX,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LinkConfig {
    pub port: String,
    pub role: Role,
    pub baud_rate: u32,
    /// Transmissions allowed per open/send/close before giving up
    pub retransmissions: u32,
    /// How long to wait for a reply after each transmission
    pub timeout: Duration,
    pub max_payload: usize,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Statistics {
    pub frames_sent: u64,
    pub retransmissions: u64,
    pub timeouts: u64,
    pub rejects_sent: u64,
    pub rejects_received: u64,
    pub duplicates: u64,
    pub frames_dropped: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

impl fmt::Display for Statistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} payload bytes sent, {} received; {} frames sent, {} retransmissions, \
             {} timeouts, {} REJ sent, {} REJ received, {} duplicates, {} frames dropped",
            self.bytes_sent,
            self.bytes_received,
            self.frames_sent,
            self.retransmissions,
            self.timeouts,
            self.rejects_sent,
            self.rejects_received,
            self.duplicates,
            self.frames_dropped,
        )
    }
}

// ============================================================================
// States
// ============================================================================

pub struct Disconnected;
pub struct Established;

// ============================================================================
// Link Structure
// ============================================================================

pub struct Link<State> {
    state: PhantomData<State>,
    serial: Box<dyn SerialPort>,
    clock: Box<dyn Clock>,
    config: LinkConfig,
    receiver: FrameReceiver,
    /// Sequence bit of the next I-frame we send
    sequence: u8,
    /// Sequence bit of the next I-frame we accept
    expected: u8,
    /// Peer's DISC already arrived during a receive
    peer_closing: bool,
    stats: Statistics,
}

// ============================================================================
// Shared Helpers
// ============================================================================

impl<S> Link<S> {
    fn transition<T>(self) -> Link<T> {
        Link {
            state: PhantomData,
            serial: self.serial,
            clock: self.clock,
            config: self.config,
            receiver: self.receiver,
            sequence: self.sequence,
            expected: self.expected,
            peer_closing: self.peer_closing,
            stats: self.stats,
        }
    }

    fn io_error(e: std::io::Error) -> LinkError {
        let type_name = std::any::type_name::<S>();
        let state_name = type_name.split("::").last().unwrap_or(type_name);
        LinkError::ChannelIo(std::io::Error::new(
            e.kind(),
            format!("{} (in state: {})", e, state_name)
        ))
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    #[cfg(test)]
    pub fn statistics(&self) -> &Statistics {
        &self.stats
    }

    fn address(&self) -> u8 {
        self.config.role.address()
    }

    fn peer_address(&self) -> u8 {
        self.config.role.peer_address()
    }

    fn write_frame(&mut self, frame: &[u8]) -> Result<(), LinkError> {
        self.serial.write_all(frame).map_err(Self::io_error)?;
        self.stats.frames_sent += 1;
        let control = frame.get(2).copied().map(control_name).unwrap_or("?");
        debug!("Sent: {} ({} bytes)", control, frame.len());
        Ok(())
    }

    fn send_control(&mut self, control: u8) -> Result<(), LinkError> {
        let frame = control_frame(self.address(), control);
        self.write_frame(&frame)
    }

    /// Read at most one byte, waiting no longer than `wait`.
    fn poll(&mut self, expect: &Expect<'_>, wait: Duration) -> Result<Option<Frame>, LinkError> {
        match self.serial.read_byte(wait).map_err(Self::io_error)? {
            Some(byte) => Ok(self.receiver.feed(byte, expect)),
            None => Ok(None),
        }
    }

    /// Block until a frame matching `expect` arrives. There is no deadline.
    fn wait_for(&mut self, expect: &Expect<'_>) -> Result<Frame, LinkError> {
        loop {
            if let Some(frame) = self.poll(expect, POLL_INTERVAL)? {
                return Ok(frame);
            }
        }
    }

    /// Transmit `frame` and listen for replies, retransmitting on timeout until
    /// `on_frame` produces a result or the attempts run out (`Ok(None)`).
    fn exchange<T>(
        &mut self,
        frame: &[u8],
        expect: &Expect<'_>,
        mut on_frame: impl FnMut(&mut Self, Frame, &mut Retransmission) -> Result<Option<T>, LinkError>,
    ) -> Result<Option<T>, LinkError> {
        let mut retry = Retransmission::new(self.config.retransmissions, self.config.timeout);
        self.receiver.reset();

        loop {
            match retry.tick(self.clock.now()) {
                Tick::Exhausted { timed_out } => {
                    if timed_out {
                        self.stats.timeouts += 1;
                    }
                    warn!("Giving up after {} transmissions", retry.attempts());
                    return Ok(None);
                }
                Tick::Transmit { timed_out } => {
                    if timed_out {
                        self.stats.timeouts += 1;
                        warn!(
                            "Timeout, retransmitting (attempt {}/{})",
                            retry.attempts(),
                            self.config.retransmissions
                        );
                    }
                    if retry.attempts() > 1 {
                        self.stats.retransmissions += 1;
                    }
                    self.write_frame(frame)?;
                }
                Tick::Wait(left) => {
                    if let Some(reply) = self.poll(expect, left.min(POLL_INTERVAL))? {
                        if let Some(done) = on_frame(self, reply, &mut retry)? {
                            return Ok(Some(done));
                        }
                    }
                }
            }
        }
    }

    /// Answer an information frame with RR or REJ. Returns the payload only
    /// when the frame is intact and carries the sequence bit we expect.
    fn acknowledge(&mut self, sequence: u8, payload: Vec<u8>, valid: bool) -> Result<Option<Vec<u8>>, LinkError> {
        if !valid {
            warn!("BCC2 mismatch on I{}, rejecting", sequence);
            self.stats.rejects_sent += 1;
            self.send_control(rej(self.expected))?;
            return Ok(None);
        }

        if sequence != self.expected {
            // Our last RR got lost and the sender repeated the frame
            warn!("Duplicate I{}, acknowledging again", sequence);
            self.stats.duplicates += 1;
            self.send_control(rr(self.expected))?;
            return Ok(None);
        }

        self.expected ^= 1;
        self.send_control(rr(self.expected))?;
        self.stats.bytes_received += payload.len() as u64;
        Ok(Some(payload))
    }
}

// ============================================================================
// Connection Establishment
// ============================================================================

impl Link<Disconnected> {
    pub fn new(serial: Box<dyn SerialPort>, config: LinkConfig) -> Self {
        Self::with_clock(serial, Box::new(SystemClock), config)
    }

    pub fn with_clock(serial: Box<dyn SerialPort>, clock: Box<dyn Clock>, config: LinkConfig) -> Self {
        Link {
            state: PhantomData,
            serial,
            clock,
            receiver: FrameReceiver::new(config.max_payload),
            config,
            sequence: 0,
            expected: 0,
            peer_closing: false,
            stats: Statistics::default(),
        }
    }

    pub fn open(mut self) -> Result<Link<Established>, LinkError> {
        match self.config.role {
            Role::Initiator => self.open_initiator()?,
            Role::Responder => self.open_responder()?,
        }
        info!("Connection established as {:?} on {}", self.config.role, self.config.port);
        Ok(self.transition())
    }

    fn open_initiator(&mut self) -> Result<(), LinkError> {
        let set = control_frame(self.address(), SET);
        let expect = Expect::control(self.peer_address(), &[UA]);

        match self.exchange(&set, &expect, |_, _, _| Ok(Some(())))? {
            Some(()) => Ok(()),
            None => Err(LinkError::HandshakeTimeout {
                attempts: self.config.retransmissions,
            }),
        }
    }

    fn open_responder(&mut self) -> Result<(), LinkError> {
        let expect = Expect::control(self.peer_address(), &[SET]);
        self.receiver.reset();
        self.wait_for(&expect)?;
        self.send_control(UA)
    }
}

// ============================================================================
// Data Transfer and Teardown
// ============================================================================

impl Link<Established> {
    /// Send one payload and wait until the peer acknowledges it.
    /// Returns the number of payload bytes sent.
    pub fn send(&mut self, payload: &[u8]) -> Result<usize, LinkError> {
        let frame = information_frame(self.address(), self.sequence, payload, self.config.max_payload)?;
        let sequence = self.sequence;
        let expect = Expect::control(self.peer_address(), &ACKNOWLEDGEMENTS);

        let acked = self.exchange(&frame, &expect, |link, reply, retry| {
            let Frame::Control { control, .. } = reply else {
                return Ok(None);
            };
            if control == rr(sequence ^ 1) {
                Ok(Some(()))
            } else if control == rej(sequence) {
                warn!("I{} rejected, retransmitting", sequence);
                link.stats.rejects_received += 1;
                retry.expire();
                Ok(None)
            } else {
                debug!("Ignoring stale {}", control_name(control));
                Ok(None)
            }
        })?;

        if acked.is_none() {
            return Err(LinkError::MaxRetransmissionsExceeded {
                attempts: self.config.retransmissions,
            });
        }

        self.sequence ^= 1;
        self.stats.bytes_sent += payload.len() as u64;
        Ok(payload.len())
    }

    /// Block until the next new payload arrives. Corrupt frames are rejected
    /// and duplicates re-acknowledged without being returned.
    pub fn receive(&mut self) -> Result<Vec<u8>, LinkError> {
        let controls: &[u8] = match self.config.role {
            Role::Responder => &[SET, DISC],
            Role::Initiator => &[DISC],
        };
        let expect = Expect::control(self.peer_address(), controls).with_information();
        self.receiver.reset();

        loop {
            match self.wait_for(&expect)? {
                Frame::Information { sequence, payload, valid, .. } => {
                    if let Some(payload) = self.acknowledge(sequence, payload, valid)? {
                        return Ok(payload);
                    }
                }
                Frame::Control { control: SET, .. } => {
                    warn!("SET repeated, answering with UA again");
                    self.send_control(UA)?;
                }
                Frame::Control { control: DISC, .. } => {
                    info!("Peer started disconnecting");
                    self.peer_closing = true;
                    return Err(LinkError::Disconnected);
                }
                Frame::Control { .. } => {}
            }
        }
    }

    /// Tear the connection down and release the channel.
    pub fn close(mut self, show_statistics: bool) -> Result<Statistics, LinkError> {
        match self.config.role {
            Role::Initiator => self.close_initiator()?,
            Role::Responder => self.close_responder()?,
        }

        self.stats.frames_dropped = self.receiver.dropped();
        info!("Connection closed");
        if show_statistics {
            info!("Statistics: {}", self.stats);
        }
        Ok(self.stats)
    }

    fn close_initiator(&mut self) -> Result<(), LinkError> {
        let disc = control_frame(self.address(), DISC);
        let expect = Expect::control(self.peer_address(), &[DISC]);

        match self.exchange(&disc, &expect, |_, _, _| Ok(Some(())))? {
            Some(()) => self.send_control(UA),
            None => Err(LinkError::MaxRetransmissionsExceeded {
                attempts: self.config.retransmissions,
            }),
        }
    }

    fn close_responder(&mut self) -> Result<(), LinkError> {
        if !self.peer_closing {
            let expect = Expect::control(self.peer_address(), &[DISC]).with_information();
            self.receiver.reset();

            loop {
                match self.wait_for(&expect)? {
                    Frame::Control { .. } => break,
                    Frame::Information { sequence, payload, valid, .. }
                        if !valid || sequence != self.expected =>
                    {
                        self.acknowledge(sequence, payload, valid)?;
                    }
                    Frame::Information { sequence, .. } => {
                        warn!("Discarding I{} received while closing", sequence);
                    }
                }
            }
        }

        let disc = control_frame(self.address(), DISC);
        let expect = Expect::control(self.peer_address(), &[UA, DISC]);

        let acked = self.exchange(&disc, &expect, |_, reply, retry| match reply {
            Frame::Control { control: UA, .. } => Ok(Some(())),
            _ => {
                debug!("DISC repeated, peer missed ours");
                retry.expire();
                Ok(None)
            }
        })?;

        match acked {
            Some(()) => Ok(()),
            None => Err(LinkError::MaxRetransmissionsExceeded {
                attempts: self.config.retransmissions,
            }),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serial::{arriving, MockSerialPort};
    use crate::timer::ManualClock;

    fn config(role: Role) -> LinkConfig {
        LinkConfig {
            port: "/dev/null".to_string(),
            role,
            baud_rate: 9600,
            retransmissions: 3,
            timeout: Duration::from_millis(100),
            max_payload: MAX_PAYLOAD_SIZE,
        }
    }

    fn link(role: Role, responses: Vec<Option<u8>>, expected_writes: Vec<u8>) -> Link<Disconnected> {
        let clock = ManualClock::new();
        let serial = MockSerialPort::new(responses, expected_writes).with_clock(clock.clone());
        Link::with_clock(Box::new(serial), Box::new(clock), config(role))
    }

    /// A link that has already completed the SET/UA exchange.
    fn established(role: Role, responses: Vec<Option<u8>>, writes: Vec<u8>) -> Link<Established> {
        let (mut all_responses, mut all_writes) = match role {
            Role::Initiator => (
                arriving(&control_frame(ADDRESS_RX, UA)),
                control_frame(ADDRESS_TX, SET).to_vec(),
            ),
            Role::Responder => (
                arriving(&control_frame(ADDRESS_TX, SET)),
                control_frame(ADDRESS_RX, UA).to_vec(),
            ),
        };
        all_responses.extend(responses);
        all_writes.extend(writes);
        link(role, all_responses, all_writes).open().expect("open should succeed")
    }

    fn i_frame(address: u8, sequence: u8, payload: &[u8]) -> Vec<u8> {
        information_frame(address, sequence, payload, MAX_PAYLOAD_SIZE).unwrap()
    }

    fn concat(parts: &[&[u8]]) -> Vec<u8> {
        parts.concat()
    }

    #[test]
    fn test_initiator_open() {
        let link = link(
            Role::Initiator,
            arriving(&control_frame(ADDRESS_RX, UA)),
            control_frame(ADDRESS_TX, SET).to_vec(),
        );
        let link = link.open().expect("open should succeed");
        assert_eq!(link.statistics().frames_sent, 1);
    }

    #[test]
    fn test_initiator_open_after_lost_ua() {
        let mut responses = vec![None];
        responses.extend(arriving(&control_frame(ADDRESS_RX, UA)));

        let set = control_frame(ADDRESS_TX, SET);
        let link = link(Role::Initiator, responses, concat(&[&set, &set]));

        let link = link.open().expect("open should succeed on the second SET");
        assert_eq!(link.statistics().timeouts, 1);
        assert_eq!(link.statistics().retransmissions, 1);
    }

    #[test]
    fn test_initiator_open_gives_up() {
        let set = control_frame(ADDRESS_TX, SET);
        let link = link(Role::Initiator, vec![], concat(&[&set, &set, &set]));

        match link.open() {
            Err(LinkError::HandshakeTimeout { attempts: 3 }) => {}
            Err(e) => panic!("unexpected error: {}", e),
            Ok(_) => panic!("open should fail"),
        }
    }

    #[test]
    fn test_initiator_ignores_garbage_before_ua() {
        let mut responses = arriving(&[0x00, FLAG, 0x42, FLAG, ADDRESS_RX, SET]);
        responses.extend(arriving(&control_frame(ADDRESS_RX, UA)));

        let link = link(Role::Initiator, responses, control_frame(ADDRESS_TX, SET).to_vec());
        assert!(link.open().is_ok());
    }

    #[test]
    fn test_responder_open() {
        let mut responses = arriving(&[0xFF, 0x7E, 0x7E]);
        responses.push(None);
        responses.extend(arriving(&control_frame(ADDRESS_TX, SET)));

        let link = link(Role::Responder, responses, control_frame(ADDRESS_RX, UA).to_vec());
        assert!(link.open().is_ok());
    }

    #[test]
    fn test_send_empty_payload() {
        let mut link = established(
            Role::Initiator,
            arriving(&control_frame(ADDRESS_RX, RR1)),
            vec![0x7E, 0x03, 0x00, 0x03, 0x00, 0x7E],
        );
        assert_eq!(link.send(&[]).unwrap(), 0);
    }

    #[test]
    fn test_send_alternates_sequence() {
        let mut responses = arriving(&control_frame(ADDRESS_RX, RR1));
        responses.extend(arriving(&control_frame(ADDRESS_RX, RR0)));

        let writes = concat(&[
            &i_frame(ADDRESS_TX, 0, b"first"),
            &i_frame(ADDRESS_TX, 1, b"second"),
        ]);
        let mut link = established(Role::Initiator, responses, writes);

        assert_eq!(link.send(b"first").unwrap(), 5);
        assert_eq!(link.send(b"second").unwrap(), 6);
        assert_eq!(link.statistics().bytes_sent, 11);
    }

    #[test]
    fn test_send_retransmits_on_rej() {
        let mut responses = arriving(&control_frame(ADDRESS_RX, REJ0));
        responses.extend(arriving(&control_frame(ADDRESS_RX, RR1)));

        let frame = i_frame(ADDRESS_TX, 0, b"payload");
        let mut link = established(Role::Initiator, responses, concat(&[&frame, &frame]));

        assert_eq!(link.send(b"payload").unwrap(), 7);
        assert_eq!(link.statistics().rejects_received, 1);
        assert_eq!(link.statistics().timeouts, 0);
    }

    #[test]
    fn test_send_ignores_stale_acknowledgements() {
        let mut responses = arriving(&control_frame(ADDRESS_RX, RR0));
        responses.extend(arriving(&control_frame(ADDRESS_RX, REJ1)));
        responses.extend(arriving(&control_frame(ADDRESS_RX, RR1)));

        let mut link = established(Role::Initiator, responses, i_frame(ADDRESS_TX, 0, b"x"));
        assert_eq!(link.send(b"x").unwrap(), 1);
    }

    #[test]
    fn test_send_gives_up() {
        let frame = i_frame(ADDRESS_TX, 0, b"lost");
        let mut link = established(Role::Initiator, vec![], concat(&[&frame, &frame, &frame]));

        match link.send(b"lost") {
            Err(LinkError::MaxRetransmissionsExceeded { attempts: 3 }) => {}
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(link.statistics().timeouts, 3);
    }

    #[test]
    fn test_persistent_rej_still_terminates() {
        let mut responses = Vec::new();
        for _ in 0..3 {
            responses.extend(arriving(&control_frame(ADDRESS_RX, REJ0)));
        }

        let frame = i_frame(ADDRESS_TX, 0, b"noisy");
        let mut link = established(Role::Initiator, responses, concat(&[&frame, &frame, &frame]));

        assert!(matches!(
            link.send(b"noisy"),
            Err(LinkError::MaxRetransmissionsExceeded { .. })
        ));
        assert_eq!(link.statistics().rejects_received, 3);
        assert_eq!(link.statistics().timeouts, 0);
    }

    #[test]
    fn test_send_payload_too_large() {
        let mut link = established(Role::Initiator, vec![], vec![]);
        let payload = vec![0u8; MAX_PAYLOAD_SIZE + 1];
        assert!(matches!(
            link.send(&payload),
            Err(LinkError::PayloadTooLarge { size, max: MAX_PAYLOAD_SIZE }) if size == MAX_PAYLOAD_SIZE + 1
        ));
    }

    #[test]
    fn test_receive_suppresses_duplicates() {
        let mut responses = arriving(&i_frame(ADDRESS_TX, 0, b"abc"));
        // RR1 lost on the way back, the sender repeats I0
        responses.extend(arriving(&i_frame(ADDRESS_TX, 0, b"abc")));
        responses.extend(arriving(&i_frame(ADDRESS_TX, 1, b"def")));

        let rr1 = control_frame(ADDRESS_RX, RR1);
        let rr0 = control_frame(ADDRESS_RX, RR0);
        let mut link = established(Role::Responder, responses, concat(&[&rr1, &rr1, &rr0]));

        assert_eq!(link.receive().unwrap(), b"abc");
        assert_eq!(link.receive().unwrap(), b"def");
        assert_eq!(link.statistics().duplicates, 1);
        assert_eq!(link.statistics().bytes_received, 6);
    }

    #[test]
    fn test_receive_rejects_corrupt_frame() {
        let mut corrupt = i_frame(ADDRESS_TX, 0, b"abc");
        corrupt[4] = b'z';

        let mut responses = arriving(&corrupt);
        responses.extend(arriving(&i_frame(ADDRESS_TX, 0, b"abc")));

        let writes = concat(&[&control_frame(ADDRESS_RX, REJ0), &control_frame(ADDRESS_RX, RR1)]);
        let mut link = established(Role::Responder, responses, writes);

        assert_eq!(link.receive().unwrap(), b"abc");
        assert_eq!(link.statistics().rejects_sent, 1);
    }

    #[test]
    fn test_receive_answers_repeated_set() {
        let mut responses = arriving(&control_frame(ADDRESS_TX, SET));
        responses.extend(arriving(&i_frame(ADDRESS_TX, 0, &[FLAG, ESC])));

        let writes = concat(&[&control_frame(ADDRESS_RX, UA), &control_frame(ADDRESS_RX, RR1)]);
        let mut link = established(Role::Responder, responses, writes);

        assert_eq!(link.receive().unwrap(), vec![FLAG, ESC]);
    }

    #[test]
    fn test_initiator_receives_from_responder() {
        let mut link = established(
            Role::Initiator,
            arriving(&i_frame(ADDRESS_RX, 0, b"reply")),
            control_frame(ADDRESS_TX, RR1).to_vec(),
        );
        assert_eq!(link.receive().unwrap(), b"reply");
    }

    #[test]
    fn test_initiator_close() {
        let link = established(
            Role::Initiator,
            arriving(&control_frame(ADDRESS_RX, DISC)),
            concat(&[&control_frame(ADDRESS_TX, DISC), &control_frame(ADDRESS_TX, UA)]),
        );
        let stats = link.close(true).expect("close should succeed");
        assert_eq!(stats.frames_sent, 3);
    }

    #[test]
    fn test_initiator_close_gives_up() {
        let disc = control_frame(ADDRESS_TX, DISC);
        // A UA is not an answer to DISC
        let link = established(
            Role::Initiator,
            arriving(&control_frame(ADDRESS_RX, UA)),
            concat(&[&disc, &disc, &disc]),
        );

        assert!(matches!(
            link.close(false),
            Err(LinkError::MaxRetransmissionsExceeded { attempts: 3 })
        ));
    }

    #[test]
    fn test_responder_close() {
        let mut responses = arriving(&i_frame(ADDRESS_TX, 0, b"last"));
        // Sender missed RR1, repeats the frame, then disconnects
        responses.extend(arriving(&i_frame(ADDRESS_TX, 0, b"last")));
        responses.extend(arriving(&control_frame(ADDRESS_TX, DISC)));
        // Our DISC is lost and the initiator repeats its own
        responses.extend(arriving(&control_frame(ADDRESS_TX, DISC)));
        responses.extend(arriving(&control_frame(ADDRESS_TX, UA)));

        let rr1 = control_frame(ADDRESS_RX, RR1);
        let disc = control_frame(ADDRESS_RX, DISC);
        let mut link = established(Role::Responder, responses, concat(&[&rr1, &rr1, &disc, &disc]));

        assert_eq!(link.receive().unwrap(), b"last");
        let stats = link.close(true).expect("close should succeed");
        assert_eq!(stats.duplicates, 1);
        assert_eq!(stats.bytes_received, 4);
    }

    #[test]
    fn test_disc_during_receive() {
        let mut responses = arriving(&control_frame(ADDRESS_TX, DISC));
        responses.extend(arriving(&control_frame(ADDRESS_TX, UA)));

        let mut link = established(Role::Responder, responses, control_frame(ADDRESS_RX, DISC).to_vec());

        assert!(matches!(link.receive(), Err(LinkError::Disconnected)));
        assert!(link.close(false).is_ok());
    }

    #[test]
    fn test_responder_close_gives_up() {
        let mut responses = arriving(&control_frame(ADDRESS_TX, DISC));
        responses.extend([None, None, None]);

        let disc = control_frame(ADDRESS_RX, DISC);
        let link = established(Role::Responder, responses, concat(&[&disc, &disc, &disc]));

        assert!(matches!(
            link.close(false),
            Err(LinkError::MaxRetransmissionsExceeded { .. })
        ));
    }

    #[test]
    fn test_io_error_names_state() {
        let e = Link::<Established>::io_error(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone"));
        assert_eq!(e.to_string(), "serial channel I/O error: gone (in state: Established)");
    }
}
