//! slip — RFC 1055 framing, no I/O.
//!
//! encode: END and ESC inside the frame are escaped, one END terminates it.
//! decode: works on a growing receive buffer. A frame is complete once an
//! unescaped END follows at least one byte; END with nothing before it is a
//! stray delimiter and is skipped.
//!
//! An ESC as the very last byte of the buffer cannot be resolved yet. It is
//! reported as `SlipError::TruncatedEscape` (a partial frame: keep reading),
//! never silently dropped.

use thiserror::Error;

pub const END: u8 = 0xC0;
pub const ESC: u8 = 0xDB;
pub const ESC_END: u8 = 0xDC;
pub const ESC_ESC: u8 = 0xDD;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SlipError {
    #[error("escape byte at end of buffer (offset {0})")]
    TruncatedEscape(usize),
    #[error("invalid escape sequence {1:#04x} at offset {0}")]
    InvalidEscape(usize, u8),
}

impl SlipError {
    /// True when more input may still turn this into a valid frame.
    pub fn is_partial(&self) -> bool {
        matches!(self, SlipError::TruncatedEscape(_))
    }
}

/// A decoded frame and how many buffer bytes it consumed (delimiters included).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub frame: Vec<u8>,
    pub consumed: usize,
}

pub fn encode(frame: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(frame.len() + 2);
    for &b in frame {
        match b {
            END => {
                out.push(ESC);
                out.push(ESC_END);
            }
            ESC => {
                out.push(ESC);
                out.push(ESC_ESC);
            }
            _ => out.push(b),
        }
    }
    out.push(END);
    out
}

/// First complete frame in `buf`, if any.
pub fn decode_frame(buf: &[u8]) -> Result<Option<Decoded>, SlipError> {
    let mut frame = Vec::new();
    let mut i = 0;
    while i < buf.len() {
        match buf[i] {
            END => {
                if frame.is_empty() {
                    i += 1;
                    continue;
                }
                return Ok(Some(Decoded {
                    frame,
                    consumed: i + 1,
                }));
            }
            ESC => {
                let next = *buf.get(i + 1).ok_or(SlipError::TruncatedEscape(i))?;
                match next {
                    ESC_END => frame.push(END),
                    ESC_ESC => frame.push(ESC),
                    other => return Err(SlipError::InvalidEscape(i + 1, other)),
                }
                i += 2;
            }
            b => {
                frame.push(b);
                i += 1;
            }
        }
    }
    Ok(None)
}

/// Frame bytes only; see `decode_frame`.
pub fn decode(buf: &[u8]) -> Result<Option<Vec<u8>>, SlipError> {
    Ok(decode_frame(buf)?.map(|d| d.frame))
}
