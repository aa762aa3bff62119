//! Error types per component boundary.
//!
//! - `DeviceError`   — transport, paged cache and request/response session.
//! - `DecodeError`   — dive log image decoder (pure, never retried).
//! - `TransferError` — what a driver hands back to its caller: one categorized error.

use std::fmt;
use std::io;

use thiserror::Error;

/// Result alias for transport/session level operations.
pub type Result<T> = std::result::Result<T, DeviceError>;

#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("port not found: {0}")]
    PortNotFound(String),

    #[error("port in use: {0}")]
    PortInUse(String),

    #[error("unsupported port configuration: {0}")]
    UnsupportedPortConfiguration(String),

    #[error("checksum mismatch (expected {expected:#04x}, got {actual:#04x})")]
    ChecksumMismatch { expected: u8, actual: u8 },

    #[error("no response from device after {attempts} attempts")]
    CommunicationTimeout { attempts: u32 },

    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    #[error("unsupported device response: {0}")]
    UnsupportedDeviceResponse(String),

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("interrupted")]
    Interrupted,

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl DeviceError {
    /// Errors worth another attempt at the same request.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DeviceError::ChecksumMismatch { .. }
                | DeviceError::CommunicationTimeout { .. }
                | DeviceError::MalformedFrame(_)
        )
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            DeviceError::PortNotFound(_)
            | DeviceError::PortInUse(_)
            | DeviceError::UnsupportedPortConfiguration(_)
            | DeviceError::Io(_) => ErrorCategory::Connection,
            DeviceError::CommunicationTimeout { .. } => ErrorCategory::NoResponse,
            DeviceError::ChecksumMismatch { .. }
            | DeviceError::MalformedFrame(_)
            | DeviceError::Decode(_) => ErrorCategory::CorruptData,
            DeviceError::UnsupportedDeviceResponse(_) => ErrorCategory::WrongDevice,
            DeviceError::InvalidConfiguration(_) => ErrorCategory::Configuration,
            DeviceError::Interrupted => ErrorCategory::Cancelled,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("unsupported dive log version: {0}")]
    UnsupportedLogVersion(String),

    #[error("dive log image has {actual} bytes, expected {expected}")]
    BufferSize { expected: usize, actual: usize },

    #[error("dive log checksum mismatch (stored {stored:#04x}, computed {computed:#04x})")]
    ChecksumMismatch { stored: u8, computed: u8 },

    #[error("corrupt dive data: {0}")]
    Corrupt(String),
}

/// User-facing classification of a failed transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// The device answered, but not like the selected computer would.
    WrongDevice,
    /// Cable, port or OS level problem.
    Connection,
    NoResponse,
    /// Data arrived but failed integrity checks or is in an unknown format.
    CorruptData,
    Configuration,
    Cancelled,
}

impl ErrorCategory {
    pub fn label(self) -> &'static str {
        match self {
            ErrorCategory::WrongDevice => "wrong dive computer connected",
            ErrorCategory::Connection => "cable or port problem",
            ErrorCategory::NoResponse => "no response from the dive computer",
            ErrorCategory::CorruptData => "data corrupted or in an unsupported format",
            ErrorCategory::Configuration => "driver configuration incomplete",
            ErrorCategory::Cancelled => "download cancelled",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Single categorized error returned by `DeviceDriver::transfer`.
#[derive(Error, Debug)]
#[error("{category}: {source}")]
pub struct TransferError {
    pub category: ErrorCategory,
    #[source]
    pub source: DeviceError,
}

impl TransferError {
    pub fn is_cancelled(&self) -> bool {
        self.category == ErrorCategory::Cancelled
    }
}

impl From<DeviceError> for TransferError {
    fn from(source: DeviceError) -> Self {
        Self {
            category: source.category(),
            source,
        }
    }
}

impl From<DecodeError> for TransferError {
    fn from(e: DecodeError) -> Self {
        DeviceError::from(e).into()
    }
}
