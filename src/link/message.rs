//! link/message — closed catalog of request and response messages.
//!
//! Every message starts with its service id. Positive responses carry the
//! request id with bit 0x40 set; 0x7F is a negative response
//! `[0x7F][request service id][code]`.
//!
//! Response decoding is a lookup on the service id byte into `RESPONSE_TABLE`,
//! one decode function per variant.

use std::fmt;

use crate::consts::{
    SID_NEGATIVE, SID_POSITIVE_BIT, SID_READ_IDENTIFIER, SID_REQUEST_UPLOAD, SID_TRANSFER_DATA,
    SID_TRANSFER_EXIT, SW_UPLOAD_ADDR_LEN_FORMAT, SW_UPLOAD_FORMAT,
};
use crate::error::{DeviceError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    ReadIdentifier { id: u16 },
    /// Ask the device to stream `size` bytes starting at `address`.
    RequestUpload { address: u32, size: u32 },
    TransferData { counter: u8 },
    TransferExit,
}

impl Request {
    pub fn service_id(&self) -> u8 {
        match self {
            Request::ReadIdentifier { .. } => SID_READ_IDENTIFIER,
            Request::RequestUpload { .. } => SID_REQUEST_UPLOAD,
            Request::TransferData { .. } => SID_TRANSFER_DATA,
            Request::TransferExit => SID_TRANSFER_EXIT,
        }
    }

    /// The response kind a well-behaved device answers with.
    pub fn expected_response(&self) -> ResponseKind {
        match self {
            Request::ReadIdentifier { .. } => ResponseKind::Identifier,
            Request::RequestUpload { .. } => ResponseKind::UploadAccepted,
            Request::TransferData { .. } => ResponseKind::TransferData,
            Request::TransferExit => ResponseKind::TransferExit,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = vec![self.service_id()];
        match *self {
            Request::ReadIdentifier { id } => out.extend_from_slice(&id.to_be_bytes()),
            Request::RequestUpload { address, size } => {
                out.push(SW_UPLOAD_FORMAT);
                out.push(SW_UPLOAD_ADDR_LEN_FORMAT);
                out.extend_from_slice(&address.to_be_bytes());
                // 3-byte size
                out.extend_from_slice(&size.to_be_bytes()[1..]);
            }
            Request::TransferData { counter } => out.push(counter),
            Request::TransferExit => {}
        }
        out
    }
}

/// Device-reported error code of a negative response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NegativeCode(pub u8);

impl NegativeCode {
    pub fn description(self) -> &'static str {
        match self.0 {
            0x10 => "general reject",
            0x11 => "service not supported",
            0x12 => "sub-function not supported",
            0x13 => "incorrect message length",
            0x22 => "conditions not correct",
            0x24 => "request sequence error",
            0x31 => "request out of range",
            0x33 => "security access denied",
            0x70 => "upload not accepted",
            0x72 => "general programming failure",
            0x73 => "wrong block sequence counter",
            _ => "unknown code",
        }
    }
}

impl fmt::Display for NegativeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#04x} ({})", self.0, self.description())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseKind {
    Identifier,
    UploadAccepted,
    TransferData,
    TransferExit,
    Negative,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Identifier { id: u16, data: Vec<u8> },
    UploadAccepted { max_block: u32 },
    TransferData { counter: u8, data: Vec<u8> },
    TransferExit,
    Negative { service: u8, code: NegativeCode },
}

type DecodeFn = fn(&[u8]) -> Result<Response>;

/// Wire discriminator -> (variant, decoder). Closed set.
const RESPONSE_TABLE: [(u8, ResponseKind, DecodeFn); 5] = [
    (SID_READ_IDENTIFIER | SID_POSITIVE_BIT, ResponseKind::Identifier, decode_identifier),
    (SID_REQUEST_UPLOAD | SID_POSITIVE_BIT, ResponseKind::UploadAccepted, decode_upload),
    (SID_TRANSFER_DATA | SID_POSITIVE_BIT, ResponseKind::TransferData, decode_transfer_data),
    (SID_TRANSFER_EXIT | SID_POSITIVE_BIT, ResponseKind::TransferExit, decode_transfer_exit),
    (SID_NEGATIVE, ResponseKind::Negative, decode_negative),
];

impl Response {
    /// Decode one message (service id first).
    pub fn decode(message: &[u8]) -> Result<Response> {
        let (&sid, body) = message
            .split_first()
            .ok_or_else(|| DeviceError::MalformedFrame("empty message".into()))?;
        let (_, _, decode) = RESPONSE_TABLE
            .iter()
            .find(|(s, _, _)| *s == sid)
            .ok_or_else(|| {
                DeviceError::UnsupportedDeviceResponse(format!("unknown service id {:#04x}", sid))
            })?;
        decode(body)
    }

    pub fn kind(&self) -> ResponseKind {
        match self {
            Response::Identifier { .. } => ResponseKind::Identifier,
            Response::UploadAccepted { .. } => ResponseKind::UploadAccepted,
            Response::TransferData { .. } => ResponseKind::TransferData,
            Response::TransferExit => ResponseKind::TransferExit,
            Response::Negative { .. } => ResponseKind::Negative,
        }
    }
}

fn decode_identifier(body: &[u8]) -> Result<Response> {
    if body.len() < 2 {
        return Err(DeviceError::MalformedFrame("identifier response too short".into()));
    }
    Ok(Response::Identifier {
        id: u16::from_be_bytes([body[0], body[1]]),
        data: body[2..].to_vec(),
    })
}

fn decode_upload(body: &[u8]) -> Result<Response> {
    // [lengthFormatIdentifier: high nibble = byte count][max block length BE]
    let n = body.first().map(|b| (b >> 4) as usize).unwrap_or(0);
    if n == 0 || n > 4 || body.len() != 1 + n {
        return Err(DeviceError::MalformedFrame(format!(
            "upload response {:02x?} has a bad length format",
            body
        )));
    }
    let max_block = body[1..].iter().fold(0u32, |acc, &b| (acc << 8) | b as u32);
    Ok(Response::UploadAccepted { max_block })
}

fn decode_transfer_data(body: &[u8]) -> Result<Response> {
    let (&counter, data) = body
        .split_first()
        .ok_or_else(|| DeviceError::MalformedFrame("transfer data without counter".into()))?;
    Ok(Response::TransferData {
        counter,
        data: data.to_vec(),
    })
}

fn decode_transfer_exit(_body: &[u8]) -> Result<Response> {
    Ok(Response::TransferExit)
}

fn decode_negative(body: &[u8]) -> Result<Response> {
    if body.len() != 2 {
        return Err(DeviceError::MalformedFrame(format!(
            "negative response with {} bytes",
            body.len()
        )));
    }
    Ok(Response::Negative {
        service: body[0],
        code: NegativeCode(body[1]),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_encodings() {
        assert_eq!(Request::ReadIdentifier { id: 0x8010 }.encode(), vec![0x22, 0x80, 0x10]);
        assert_eq!(
            Request::RequestUpload { address: 0xDD00_0000, size: 0x020000 }.encode(),
            vec![0x35, 0x00, 0x34, 0xDD, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00]
        );
        assert_eq!(Request::TransferData { counter: 7 }.encode(), vec![0x36, 7]);
        assert_eq!(Request::TransferExit.encode(), vec![0x37]);
    }

    #[test]
    fn dispatch_by_service_id() {
        assert_eq!(
            Response::decode(&[0x62, 0x80, 0x11, b'V', b'5']).unwrap(),
            Response::Identifier { id: 0x8011, data: b"V5".to_vec() }
        );
        assert_eq!(
            Response::decode(&[0x75, 0x20, 0x00, 0x90]).unwrap(),
            Response::UploadAccepted { max_block: 0x90 }
        );
        assert_eq!(
            Response::decode(&[0x76, 0x01, 0xAA]).unwrap().kind(),
            ResponseKind::TransferData
        );
        assert_eq!(Response::decode(&[0x77]).unwrap(), Response::TransferExit);
        assert_eq!(
            Response::decode(&[0x7F, 0x35, 0x70]).unwrap(),
            Response::Negative { service: 0x35, code: NegativeCode(0x70) }
        );
    }

    #[test]
    fn unknown_and_short_messages() {
        assert!(matches!(
            Response::decode(&[0x50]),
            Err(DeviceError::UnsupportedDeviceResponse(_))
        ));
        assert!(matches!(Response::decode(&[]), Err(DeviceError::MalformedFrame(_))));
        assert!(matches!(Response::decode(&[0x62, 0x80]), Err(DeviceError::MalformedFrame(_))));
        assert!(matches!(Response::decode(&[0x75, 0x50, 1]), Err(DeviceError::MalformedFrame(_))));
        assert_eq!(
            Response::decode(&[0x7F, 0x22, 0x31]).unwrap().kind(),
            ResponseKind::Negative
        );
    }
}
