//! link/session — typed request/response exchange over SLIP.
//!
//! Поведение exchange():
//! - write SLIP(envelope), then read in chunks, trying to decode a frame after every read;
//! - partial input (no END yet, escape cut at the buffer end) means keep reading;
//! - a complete but structurally invalid frame is `MalformedFrame`;
//! - the envelope's message_type must be the link-layer data type, the message is
//!   dispatched on its service id, and its kind must be in the caller's accepted set;
//! - timeouts and malformed frames resend the request up to `attempts` times.
//!
//! Bytes after a decoded frame stay buffered for the next exchange; requests are
//! never pipelined.

use log::{debug, trace, warn};

use super::message::{Request, Response, ResponseKind};
use super::LinkEnvelope;
use crate::consts::{
    IDLE_MAX_RETRIES, SW_DEVICE_ADDR, SW_HOST_ADDR, SW_LINK_DATA, SW_READ_CHUNK,
    SW_SESSION_ATTEMPTS,
};
use crate::error::{DeviceError, Result};
use crate::metrics::{record_exchange, record_negative_response, record_slip_frame, record_timeout};
use crate::slip::{self, SlipError, END};
use crate::status::CancelToken;
use crate::stream::ByteStream;
use crate::util::hex_dump;

pub struct RequestResponseSession<S: ByteStream> {
    stream: S,
    rx: Vec<u8>,
    cancel: CancelToken,
    attempts: u32,
    idle_retries: u32,
    host: u8,
    device: u8,
}

impl<S: ByteStream> RequestResponseSession<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            rx: Vec::new(),
            cancel: CancelToken::new(),
            attempts: SW_SESSION_ATTEMPTS,
            idle_retries: IDLE_MAX_RETRIES,
            host: SW_HOST_ADDR,
            device: SW_DEVICE_ADDR,
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_attempts(mut self, n: u32) -> Self {
        self.attempts = n.max(1);
        self
    }

    /// Empty reads tolerated before a response counts as missing.
    pub fn with_idle_retries(mut self, n: u32) -> Self {
        self.idle_retries = n;
        self
    }

    pub fn stream_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    pub fn into_inner(self) -> S {
        self.stream
    }

    /// Wrap `req` in a host->device envelope and exchange it.
    pub fn request(&mut self, req: &Request, accept: &[ResponseKind]) -> Result<Response> {
        let env = LinkEnvelope::new(self.host, self.device, SW_LINK_DATA, req.encode());
        self.exchange(&env, accept)
    }

    pub fn exchange(&mut self, envelope: &LinkEnvelope, accept: &[ResponseKind]) -> Result<Response> {
        let wire = slip::encode(&envelope.encode()?);
        let mut last_err = None;

        for attempt in 1..=self.attempts {
            self.cancel.check()?;
            self.stream.write_all(&wire)?;
            self.stream.flush()?;
            record_exchange();

            match self.read_frame().and_then(|f| self.dispatch(&f, accept)) {
                Ok(resp) => return Ok(resp),
                Err(e) if e.is_transient() && attempt < self.attempts => {
                    warn!("exchange attempt {}/{} failed: {}", attempt, self.attempts, e);
                    self.rx.clear();
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_err.unwrap_or(DeviceError::CommunicationTimeout {
            attempts: self.attempts,
        }))
    }

    /// Read until one complete frame is buffered.
    fn read_frame(&mut self) -> Result<Vec<u8>> {
        let mut chunk = [0u8; SW_READ_CHUNK];
        let mut idle = 0u32;
        loop {
            match slip::decode_frame(&self.rx) {
                Ok(Some(d)) => {
                    self.rx.drain(..d.consumed);
                    record_slip_frame();
                    trace!("frame:\n{}", hex_dump(&d.frame));
                    return Ok(d.frame);
                }
                Ok(None) => {}
                Err(e) if e.is_partial() => {}
                Err(SlipError::InvalidEscape(pos, b)) => {
                    // complete only once the END of this frame is here
                    if let Some(end) = self.rx[pos..].iter().position(|&x| x == END) {
                        self.rx.drain(..pos + end + 1);
                        return Err(DeviceError::MalformedFrame(format!(
                            "invalid SLIP escape {:#04x}",
                            b
                        )));
                    }
                }
                Err(e) => return Err(DeviceError::MalformedFrame(e.to_string())),
            }

            self.cancel.check()?;
            let n = self.stream.read(&mut chunk)?;
            if n == 0 {
                idle += 1;
                if idle > self.idle_retries {
                    record_timeout();
                    return Err(DeviceError::CommunicationTimeout { attempts: idle });
                }
                continue;
            }
            self.rx.extend_from_slice(&chunk[..n]);
        }
    }

    fn dispatch(&self, frame: &[u8], accept: &[ResponseKind]) -> Result<Response> {
        let env = LinkEnvelope::decode(frame)?;
        if env.message_type != SW_LINK_DATA {
            return Err(DeviceError::MalformedFrame(format!(
                "link message type {:#04x}",
                env.message_type
            )));
        }
        if env.source != self.device || env.target != self.host {
            return Err(DeviceError::MalformedFrame(format!(
                "envelope addressed {:#04x}->{:#04x}",
                env.source, env.target
            )));
        }

        let resp = Response::decode(&env.data)?;
        debug!("response {:?}", resp.kind());
        if let Response::Negative { service, code } = &resp {
            record_negative_response();
            if !accept.contains(&ResponseKind::Negative) {
                return Err(DeviceError::UnsupportedDeviceResponse(format!(
                    "device rejected service {:#04x}: {}",
                    service, code
                )));
            }
        }
        if !accept.contains(&resp.kind()) {
            return Err(DeviceError::UnsupportedDeviceResponse(format!(
                "unexpected {:?} response (accepted {:?})",
                resp.kind(),
                accept
            )));
        }
        Ok(resp)
    }
}
