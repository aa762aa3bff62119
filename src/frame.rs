//! frame — single checksummed packets, no I/O.
//!
//! Layout:
//!   [length u8][payload ...][inner xor u8]?[outer xor u8]
//!
//! - length = payload.len() + number of trailing checksum bytes (1, or 2 with inner checksum);
//!   a receiver reads the length byte and then exactly `length` more bytes.
//! - inner = XOR of the payload (optional, protocol specific).
//! - outer = XOR of every byte written before it, length byte included.
//!
//! Some cables reverse the bit order of every byte on the wire; `reorder_bits`
//! is the byte transform the transport applies at its boundary.

use crate::consts::MAX_PACKET_PAYLOAD;
use crate::error::{DeviceError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub length: u8,
    pub payload: Vec<u8>,
    pub inner: Option<u8>,
    pub checksum: u8,
}

impl Packet {
    /// Wire bytes, in transmission order.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.payload.len() + 3);
        out.push(self.length);
        out.extend_from_slice(&self.payload);
        if let Some(c) = self.inner {
            out.push(c);
        }
        out.push(self.checksum);
        out
    }

    pub fn wire_len(&self) -> usize {
        1 + self.length as usize
    }
}

#[inline]
pub fn xor_fold(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, &b| acc ^ b)
}

#[inline]
pub fn overhead(with_inner: bool) -> usize {
    if with_inner {
        2
    } else {
        1
    }
}

/// Build a packet around `payload`.
pub fn pack(payload: &[u8], with_inner: bool) -> Result<Packet> {
    if payload.is_empty() || payload.len() > MAX_PACKET_PAYLOAD {
        return Err(DeviceError::MalformedFrame(format!(
            "payload length {} outside 1..={}",
            payload.len(),
            MAX_PACKET_PAYLOAD
        )));
    }
    let length = (payload.len() + overhead(with_inner)) as u8;
    let inner = with_inner.then(|| xor_fold(payload));

    let mut checksum = length ^ xor_fold(payload);
    if let Some(c) = inner {
        checksum ^= c;
    }

    Ok(Packet {
        length,
        payload: payload.to_vec(),
        inner,
        checksum,
    })
}

/// Verify the bytes that followed a length byte and return the payload.
///
/// `body.len()` must equal `length`. Checksum mismatch is a hard error; any
/// retry is the caller's decision.
pub fn verify_body(length: u8, body: &[u8], with_inner: bool) -> Result<Vec<u8>> {
    let oh = overhead(with_inner);
    if body.len() != length as usize || body.len() <= oh {
        return Err(DeviceError::MalformedFrame(format!(
            "packet body {} bytes for length byte {}",
            body.len(),
            length
        )));
    }

    let (rest, outer) = body.split_at(body.len() - 1);
    let expected = length ^ xor_fold(rest);
    if expected != outer[0] {
        return Err(DeviceError::ChecksumMismatch {
            expected,
            actual: outer[0],
        });
    }

    let payload_len = body.len() - oh;
    let payload = &rest[..payload_len];
    if with_inner {
        let expected = xor_fold(payload);
        let actual = rest[payload_len];
        if expected != actual {
            return Err(DeviceError::ChecksumMismatch { expected, actual });
        }
    }
    Ok(payload.to_vec())
}

/// Parse a complete packet (length byte included).
pub fn unpack(bytes: &[u8], with_inner: bool) -> Result<Vec<u8>> {
    match bytes.split_first() {
        Some((&length, body)) => verify_body(length, body, with_inner),
        None => Err(DeviceError::MalformedFrame("empty packet".into())),
    }
}

/// Reverse bit order: bit 0 <-> bit 7, bit 1 <-> bit 6, ...
#[inline]
pub fn reorder_bits(b: u8) -> u8 {
    b.reverse_bits()
}

pub fn reorder_all(bytes: &mut [u8]) {
    for b in bytes.iter_mut() {
        *b = reorder_bits(*b);
    }
}
