//! divelog/version — trailer record, format version and image checksum.
//!
//! Trailer (last LOG_TRAILER_LEN bytes of the image):
//!   [marker FF FD][raw version u8][product u8][serial u32 BE][firmware u16 BE]
//!   [reserved u16][checksum u8][reserved ...]
//!
//! Raw version codes 3 and 4 map to themselves. Code 5 is shared by two layouts:
//! the newer one (6) also writes a sub-version marker at LOG_SUBVERSION_OFFSET.

use byteorder::{BigEndian, ByteOrder};
use serde::Serialize;

use super::DiveLogVersion;
use crate::consts::{
    LOG_IMAGE_SIZE, LOG_SHARED_RAW_VERSION, LOG_SUBVERSION_MARKER, LOG_SUBVERSION_OFFSET,
    LOG_SUPPORTED_VERSIONS, LOG_TRAILER_LEN, LOG_TRAILER_MARKER, LOG_TRAILER_OFF_CHECKSUM,
    LOG_TRAILER_OFF_FIRMWARE, LOG_TRAILER_OFF_PRODUCT, LOG_TRAILER_OFF_SERIAL,
    LOG_TRAILER_OFF_VERSION,
};
use crate::error::DecodeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LogInfo {
    pub version: DiveLogVersion,
    pub raw_version: u8,
    pub product: u8,
    pub serial: u32,
    pub firmware: u16,
    pub checksum: u8,
}

pub fn check_size(buf: &[u8]) -> Result<(), DecodeError> {
    if buf.len() != LOG_IMAGE_SIZE {
        return Err(DecodeError::BufferSize {
            expected: LOG_IMAGE_SIZE,
            actual: buf.len(),
        });
    }
    Ok(())
}

#[inline]
pub fn trailer_offset(buf: &[u8]) -> usize {
    buf.len() - LOG_TRAILER_LEN
}

/// Read the trailer and resolve the format version.
pub fn detect(buf: &[u8]) -> Result<LogInfo, DecodeError> {
    check_size(buf)?;
    let t = &buf[trailer_offset(buf)..];

    if t[..2] != LOG_TRAILER_MARKER {
        return Err(DecodeError::UnsupportedLogVersion(format!(
            "trailer marker {:02x}{:02x} missing",
            t[0], t[1]
        )));
    }

    let raw = t[LOG_TRAILER_OFF_VERSION];
    let resolved = match raw {
        LOG_SHARED_RAW_VERSION => {
            let sub = &buf[LOG_SUBVERSION_OFFSET..LOG_SUBVERSION_OFFSET + 2];
            if sub == LOG_SUBVERSION_MARKER {
                raw + 1
            } else {
                raw
            }
        }
        r if r < LOG_SHARED_RAW_VERSION => r,
        // codes above the shared one are never written raw
        r => {
            return Err(DecodeError::UnsupportedLogVersion(format!("raw code {}", r)));
        }
    };
    if !LOG_SUPPORTED_VERSIONS.contains(&resolved) {
        return Err(DecodeError::UnsupportedLogVersion(format!("version {}", resolved)));
    }

    Ok(LogInfo {
        version: DiveLogVersion(resolved),
        raw_version: raw,
        product: t[LOG_TRAILER_OFF_PRODUCT],
        serial: BigEndian::read_u32(&t[LOG_TRAILER_OFF_SERIAL..LOG_TRAILER_OFF_SERIAL + 4]),
        firmware: BigEndian::read_u16(&t[LOG_TRAILER_OFF_FIRMWARE..LOG_TRAILER_OFF_FIRMWARE + 2]),
        checksum: t[LOG_TRAILER_OFF_CHECKSUM],
    })
}

/// Low byte of the sum of every byte before the trailer.
pub fn compute_checksum(buf: &[u8]) -> u8 {
    let end = buf.len().saturating_sub(LOG_TRAILER_LEN);
    buf[..end].iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

pub fn verify_checksum(buf: &[u8]) -> Result<(), DecodeError> {
    check_size(buf)?;
    let stored = buf[trailer_offset(buf) + LOG_TRAILER_OFF_CHECKSUM];
    let computed = compute_checksum(buf);
    if stored != computed {
        return Err(DecodeError::ChecksumMismatch { stored, computed });
    }
    Ok(())
}
