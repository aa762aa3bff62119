//! divelog — versioned decoder for downloaded dive log images.
//!
//! Pure functions over a fixed-size byte buffer, no I/O:
//! - `version::detect` reads the trailer and resolves the format version;
//! - `scan::scan` walks the circular data region for opening/closing blocks;
//! - `header`/`record`/`footer` decode fixed slices at version-gated offsets;
//! - `version::verify_checksum` is an optional integrity step for callers.
//!
//! Every multi-byte integer in the image is big-endian.

pub mod bits;
pub mod footer;
pub mod header;
pub mod record;
pub mod scan;
pub mod version;

use serde::Serialize;

pub use bits::{unpack_flags, Flags64};
pub use footer::DiveLogFooter;
pub use header::{DecoModel, DiveLogHeader, DiveMode, GasMix, HeaderSettings};
pub use record::{DiveLogRecord, RecordStatus};
pub use scan::DiveLog;
pub use version::{compute_checksum, detect, verify_checksum, LogInfo};

use crate::consts::{LOG_DATA_END, LOG_DATA_END_LEGACY};
use crate::error::DecodeError;
use crate::metrics::record_dives_decoded;

/// Detected image format version. Always one of `LOG_SUPPORTED_VERSIONS`
/// when produced by `detect`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct DiveLogVersion(pub u8);

impl DiveLogVersion {
    /// End of the circular data region.
    #[inline]
    pub fn data_end(self) -> usize {
        if self.has_extended_fields() {
            LOG_DATA_END
        } else {
            LOG_DATA_END_LEGACY
        }
    }

    /// Settings/status bytes were split into separate fields at v4.
    #[inline]
    pub fn has_split_settings(self) -> bool {
        self.0 >= 4
    }

    /// Tank pressure, sensor values, feature and alarm flags exist from v5 on.
    #[inline]
    pub fn has_extended_fields(self) -> bool {
        self.0 >= 5
    }
}

/// Decoded image: trailer info plus dives in scan order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogImage {
    pub info: LogInfo,
    pub dives: Vec<DiveLog>,
}

/// Detect the version and scan every dive. An image without dives is not an error.
pub fn decode(buf: &[u8]) -> Result<LogImage, DecodeError> {
    let info = detect(buf)?;
    let dives = scan::scan(buf, info.version);
    record_dives_decoded(dives.len());
    Ok(LogImage { info, dives })
}

/// `decode` preceded by the trailer checksum check.
pub fn decode_verified(buf: &[u8]) -> Result<LogImage, DecodeError> {
    verify_checksum(buf)?;
    decode(buf)
}
