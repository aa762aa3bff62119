//! link — addressed envelopes carried inside SLIP frames.
//!
//! Envelope layout:
//!   [source u8][target u8][len u8 = data.len() + 1][message_type u8][data ...]
//!
//! `data` holds exactly one request or response message whose first byte is
//! its service id (see `message`).
//!
//! Подмодули:
//! - message.rs — closed request/response catalog and the response decode table.
//! - session.rs — `RequestResponseSession`: SLIP exchange over a `ByteStream`.

pub mod message;
pub mod session;

use crate::error::{DeviceError, Result};

pub use message::{NegativeCode, Request, Response, ResponseKind};
pub use session::RequestResponseSession;

pub const ENVELOPE_HDR_LEN: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkEnvelope {
    pub source: u8,
    pub target: u8,
    pub message_type: u8,
    pub data: Vec<u8>,
}

impl LinkEnvelope {
    pub fn new(source: u8, target: u8, message_type: u8, data: Vec<u8>) -> Self {
        Self {
            source,
            target,
            message_type,
            data,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        if self.data.len() + 1 > u8::MAX as usize {
            return Err(DeviceError::MalformedFrame(format!(
                "envelope data too long: {} bytes",
                self.data.len()
            )));
        }
        let mut out = Vec::with_capacity(ENVELOPE_HDR_LEN + self.data.len());
        out.push(self.source);
        out.push(self.target);
        out.push((self.data.len() + 1) as u8);
        out.push(self.message_type);
        out.extend_from_slice(&self.data);
        Ok(out)
    }

    pub fn decode(frame: &[u8]) -> Result<Self> {
        if frame.len() < ENVELOPE_HDR_LEN {
            return Err(DeviceError::MalformedFrame(format!(
                "envelope of {} bytes is shorter than its header",
                frame.len()
            )));
        }
        let declared = frame[2] as usize;
        let data = &frame[ENVELOPE_HDR_LEN..];
        if declared == 0 || declared - 1 != data.len() {
            return Err(DeviceError::MalformedFrame(format!(
                "envelope length byte {} does not match {} data bytes",
                declared,
                data.len()
            )));
        }
        Ok(Self {
            source: frame[0],
            target: frame[1],
            message_type: frame[3],
            data: data.to_vec(),
        })
    }
}
