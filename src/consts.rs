//! Общие константы протоколов (framing, Suunto, Memo Mouse, Shearwater, dive log image).

use std::time::Duration;

// -------- Checksum framing (shared by the packet families) --------
pub const ACK: u8 = 0x06;
pub const NAK: u8 = 0x15;
/// Largest payload a single length byte can describe once checksum overhead is added.
pub const MAX_PACKET_PAYLOAD: usize = 253;

// -------- Transport timing --------
pub const SEND_MAX_ATTEMPTS: u32 = 50;
pub const RETRY_PAUSE_BASE: Duration = Duration::from_millis(100);
pub const RETRY_PAUSE_CAP: Duration = Duration::from_millis(1000);
pub const ACK_TIMEOUT: Duration = Duration::from_millis(250);
/// Pause before re-polling when a length byte did not arrive yet.
pub const IDLE_RETRY_DELAY: Duration = Duration::from_millis(100);
pub const IDLE_MAX_RETRIES: u32 = 30;

// -------- Suunto family --------
pub const SUUNTO_PACING: Duration = Duration::from_millis(50);
pub const SUUNTO_BAUD: u32 = 2400;
pub const SUUNTO_MEMORY_SIZE: u32 = 0x2000;
/// Size of the fixed header region; the profile ring wraps back to this offset.
pub const SUUNTO_HEADER_SIZE: u32 = 0x71;
pub const SUUNTO_PAGE_SIZE: u32 = 0x78;
pub const SUUNTO_CMD_READ: u8 = 0x05;
pub const SUUNTO_FETCH_ATTEMPTS: u32 = 3;

// Header region layout
pub const SUUNTO_OFF_SERIAL: u32 = 0x1D;
pub const SUUNTO_OFF_MODEL: u32 = 0x24;
pub const SUUNTO_OFF_END_POINTER: u32 = 0x51;
pub const SUUNTO_OFF_DIVE_COUNT: u32 = 0x53;

// Profile ring layout
pub const SUUNTO_DIVE_END: u8 = 0x80;
pub const SUUNTO_DIVE_HDR_SIZE: usize = 8;
/// Profile bytes in this range are events, not depth deltas.
pub const SUUNTO_EVENT_MIN: u8 = 0x79;
pub const SUUNTO_EVENT_MAX: u8 = 0x7F;
/// Known model codes (byte @ SUUNTO_OFF_MODEL).
pub const SUUNTO_MODELS: &[(u8, &str)] = &[
    (0x0C, "Spyder"),
    (0x0A, "Vyper"),
    (0x14, "Mosquito"),
    (0x1E, "Cobra"),
    (0x03, "Stinger"),
];

// -------- Memo Mouse family --------
pub const MEMOMOUSE_PACING: Duration = Duration::from_millis(20);
pub const MEMOMOUSE_BAUD: u32 = 19200;
pub const MEMOMOUSE_CMD_LOGBOOK: u8 = 0x47;
pub const MEMOMOUSE_ENTRY_SIZE: usize = 16;
/// Aladin clocks count seconds from 1994-01-01T00:00:00Z.
pub const MEMOMOUSE_EPOCH: i64 = 757_382_400;

// -------- Shearwater family (SLIP + link envelope) --------
pub const SW_BAUD: u32 = 115_200;
pub const SW_HOST_ADDR: u8 = 0xFF;
pub const SW_DEVICE_ADDR: u8 = 0x01;
pub const SW_LINK_DATA: u8 = 0x00;
pub const SW_SESSION_ATTEMPTS: u32 = 3;
pub const SW_READ_CHUNK: usize = 256;

pub const SID_READ_IDENTIFIER: u8 = 0x22;
pub const SID_REQUEST_UPLOAD: u8 = 0x35;
pub const SID_TRANSFER_DATA: u8 = 0x36;
pub const SID_TRANSFER_EXIT: u8 = 0x37;
pub const SID_NEGATIVE: u8 = 0x7F;
/// Positive responses echo the request service id with this bit set.
pub const SID_POSITIVE_BIT: u8 = 0x40;

pub const ID_SERIAL: u16 = 0x8010;
pub const ID_FIRMWARE: u16 = 0x8011;
pub const ID_HARDWARE: u16 = 0x8050;

pub const SW_LOG_BASE_ADDR: u32 = 0xDD00_0000;
pub const SW_UPLOAD_FORMAT: u8 = 0x00;
/// addressAndLengthFormatIdentifier: 3-byte size, 4-byte address.
pub const SW_UPLOAD_ADDR_LEN_FORMAT: u8 = 0x34;
pub const SW_HARDWARE_MODELS: &[(u16, &str)] = &[
    (0x0101, "Predator"),
    (0x0404, "Petrel"),
    (0x0505, "Petrel 2"),
    (0x0808, "Perdix"),
];

// -------- Dive log image (versioned, circular) --------
pub const LOG_IMAGE_SIZE: usize = 0x20000;
pub const LOG_ROW_LEN: usize = 0x20;
pub const LOG_BLOCK_LEN: usize = 0x80;
pub const LOG_SENTINEL: u8 = 0xFF;
pub const LOG_OPENING_MARKER: [u8; 2] = [0xFF, 0xFF];
pub const LOG_CLOSING_MARKER: [u8; 2] = [0xFF, 0xFE];
/// Offsets inside a block that must not hold the sentinel for the block to count.
pub const LOG_SENTINEL_OFFSETS: [usize; 3] = [0x20, 0x40, 0x60];
pub const LOG_SAMPLE_INTERVAL_SECS: u32 = 10;

pub const LOG_DATA_END_LEGACY: usize = 0x1C000;
pub const LOG_DATA_END: usize = 0x1F000;

pub const LOG_TRAILER_LEN: usize = 0x20;
pub const LOG_TRAILER_MARKER: [u8; 2] = [0xFF, 0xFD];
pub const LOG_TRAILER_OFF_VERSION: usize = 2;
pub const LOG_TRAILER_OFF_PRODUCT: usize = 3;
pub const LOG_TRAILER_OFF_SERIAL: usize = 4;
pub const LOG_TRAILER_OFF_FIRMWARE: usize = 8;
pub const LOG_TRAILER_OFF_CHECKSUM: usize = 12;

/// Raw version code shared by two layouts; the sub-marker selects the newer one.
pub const LOG_SHARED_RAW_VERSION: u8 = 5;
pub const LOG_SUBVERSION_OFFSET: usize = 0x1FF00;
pub const LOG_SUBVERSION_MARKER: [u8; 2] = [0xA5, 0x5A];
pub const LOG_SUPPORTED_VERSIONS: [u8; 4] = [3, 4, 5, 6];
