//! transport — checksummed packet exchange over a `ByteStream`.
//!
//! Что здесь:
//! - send: paced transmission of one packet, then wait for a single ACK byte;
//!   retried with escalating pauses up to `TransportTiming::max_attempts`;
//!   pending input is cleared before each retransmission.
//! - receive_packet: length byte (0 = nothing ready yet), exactly `length` more bytes, checksum verify,
//!   and only then an ACK back to the device.
//! - receive_multi_packet_response: the first packet's two leading bytes (BE)
//!   announce the total reply length; packets are concatenated until it is reached.
//! - optional bit reorder applied to every byte crossing the stream boundary.
//!
//! The pacing delay before each transmitted byte is part of the device timing
//! contract. Without it the interface firmware drops bytes.

use std::sync::Arc;

use log::{debug, trace, warn};

use crate::config::TransportTiming;
use crate::consts::ACK;
use crate::error::{DeviceError, Result};
use crate::frame::{pack, reorder_bits, verify_body};
use crate::metrics::{
    record_checksum_failure, record_packet_received, record_packet_sent, record_send_retry,
    record_timeout,
};
use crate::status::{CancelToken, StatusSink};
use crate::stream::ByteStream;

pub struct PacketTransport<S: ByteStream> {
    stream: S,
    timing: TransportTiming,
    with_inner: bool,
    reorder: bool,
    cancel: CancelToken,
    sink: Option<Arc<dyn StatusSink>>,
}

impl<S: ByteStream> PacketTransport<S> {
    pub fn new(stream: S, timing: TransportTiming) -> Self {
        Self {
            stream,
            timing,
            with_inner: false,
            reorder: false,
            cancel: CancelToken::new(),
            sink: None,
        }
    }

    /// Append the payload XOR before the outer checksum.
    pub fn with_inner_checksum(mut self, on: bool) -> Self {
        self.with_inner = on;
        self
    }

    /// Reverse bit order of every byte on the wire (Memo Mouse style cables).
    pub fn with_bit_reorder(mut self, on: bool) -> Self {
        self.reorder = on;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn StatusSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn timing(&self) -> &TransportTiming {
        &self.timing
    }

    pub fn stream_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    pub fn into_inner(self) -> S {
        self.stream
    }

    /// Toggle the modem lines some interfaces use as power/handshake.
    pub fn set_flow_control(&mut self, dtr: bool, rts: bool) -> Result<()> {
        self.stream.set_dtr(dtr)?;
        self.stream.set_rts(rts)?;
        Ok(())
    }

    // ---------------- byte level ----------------

    fn write_byte(&mut self, b: u8) -> Result<()> {
        self.cancel.sleep(self.timing.pacing)?;
        let wire = if self.reorder { reorder_bits(b) } else { b };
        self.stream.write_all(&[wire])?;
        if let Some(s) = &self.sink {
            s.on_send_byte(b);
        }
        Ok(())
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        for &b in bytes {
            self.write_byte(b)?;
        }
        self.stream.flush()?;
        Ok(())
    }

    /// One byte, or None if nothing arrived within the stream timeout.
    fn read_byte(&mut self) -> Result<Option<u8>> {
        let mut one = [0u8; 1];
        if self.stream.read(&mut one)? == 0 {
            return Ok(None);
        }
        let b = if self.reorder { reorder_bits(one[0]) } else { one[0] };
        if let Some(s) = &self.sink {
            s.on_receive_byte(b);
        }
        Ok(Some(b))
    }

    /// Exactly `n` bytes; empty reads count against the idle budget.
    fn read_exact(&mut self, n: usize) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(n);
        let mut idle = 0u32;
        while out.len() < n {
            self.cancel.check()?;
            match self.read_byte()? {
                Some(b) => out.push(b),
                None => {
                    idle += 1;
                    if idle > self.timing.idle_retries {
                        record_timeout();
                        return Err(DeviceError::CommunicationTimeout { attempts: idle });
                    }
                    self.cancel.sleep(self.timing.idle_delay)?;
                }
            }
        }
        Ok(out)
    }

    // ---------------- packets ----------------

    /// Transmit `payload` and wait for the acknowledgement byte.
    pub fn send(&mut self, payload: &[u8]) -> Result<()> {
        let wire = pack(payload, self.with_inner)?.to_bytes();
        let attempts = self.timing.max_attempts.max(1);

        for attempt in 1..=attempts {
            self.cancel.check()?;
            if attempt > 1 {
                record_send_retry();
                // a late ACK for the previous attempt must not count for this one
                self.stream.clear_input()?;
            }
            self.write_bytes(&wire)?;
            self.stream.set_timeout(self.timing.ack_timeout)?;

            match self.read_byte()? {
                Some(ACK) => {
                    record_packet_sent(wire.len());
                    trace!("packet {:02x?} acknowledged (attempt {})", payload, attempt);
                    return Ok(());
                }
                Some(other) => {
                    warn!("expected ACK, got {:#04x} (attempt {}/{})", other, attempt, attempts);
                }
                None => {
                    debug!("no ACK (attempt {}/{})", attempt, attempts);
                }
            }

            if attempt < attempts {
                self.cancel.sleep(self.timing.pause_after(attempt))?;
            }
        }

        record_timeout();
        Err(DeviceError::CommunicationTimeout { attempts })
    }

    /// Receive one packet and acknowledge it.
    pub fn receive_packet(&mut self) -> Result<Vec<u8>> {
        let mut idle = 0u32;
        let length = loop {
            self.cancel.check()?;
            match self.read_byte()? {
                Some(l) if l > 0 => break l,
                // nothing yet, or a zero length byte: no packet is ready
                _ => {
                    idle += 1;
                    if idle > self.timing.idle_retries {
                        record_timeout();
                        return Err(DeviceError::CommunicationTimeout { attempts: idle });
                    }
                    self.cancel.sleep(self.timing.idle_delay)?;
                }
            }
        };

        let body = self.read_exact(length as usize)?;
        let payload = match verify_body(length, &body, self.with_inner) {
            Ok(p) => p,
            Err(e) => {
                if matches!(e, DeviceError::ChecksumMismatch { .. }) {
                    record_checksum_failure();
                }
                return Err(e);
            }
        };

        self.write_bytes(&[ACK])?;
        record_packet_received(1 + body.len());
        Ok(payload)
    }

    /// Receive a reply spread across several packets.
    pub fn receive_multi_packet_response(&mut self) -> Result<Vec<u8>> {
        let first = self.receive_packet()?;
        if first.len() < 2 {
            return Err(DeviceError::MalformedFrame(format!(
                "first reply packet has {} bytes, need a 2-byte total length",
                first.len()
            )));
        }
        let total = u16::from_be_bytes([first[0], first[1]]) as usize;
        let mut data = first[2..].to_vec();
        debug!("multi-packet reply: {} bytes announced", total);

        while data.len() < total {
            let next = self.receive_packet()?;
            data.extend_from_slice(&next);
        }
        if data.len() != total {
            return Err(DeviceError::UnsupportedDeviceResponse(format!(
                "reply carries {} bytes, {} announced",
                data.len(),
                total
            )));
        }
        Ok(data)
    }

    /// send + receive_packet.
    pub fn request(&mut self, payload: &[u8]) -> Result<Vec<u8>> {
        self.send(payload)?;
        self.receive_packet()
    }
}
