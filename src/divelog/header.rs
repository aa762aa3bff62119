//! divelog/header — opening block.
//!
//! Layout (offsets inside the 128-byte block, integers BE):
//!   0x00 marker FF FF          0x02 dive number u16     0x04 start time u32 (unix)
//!   0x08 settings byte         0x09 GF low              0x0A GF high
//!   0x0B dive mode (v>=4)      0x0C surface mbar u16    0x0E battery u16 /100 V
//!   0x10 O2 % x5               0x15 He % x5
//!   0x1A water density u16 (v>=5)
//!   0x20 row tag               0x21 feature flags 8 bytes (v>=5)
//!   0x40 row tag               0x60 row tag
//!
//! Settings byte before v4: bit0 imperial, bit1 salt water, high nibble dive mode.
//! From v4 on: bits 0-1 deco model, bit6 salt water, bit7 imperial; the dive
//! mode moved to its own byte.

use byteorder::{BigEndian, ByteOrder};
use serde::Serialize;

use super::bits::Flags64;
use super::DiveLogVersion;

const OFF_NUMBER: usize = 0x02;
const OFF_START: usize = 0x04;
const OFF_SETTINGS: usize = 0x08;
const OFF_GF_LOW: usize = 0x09;
const OFF_GF_HIGH: usize = 0x0A;
const OFF_MODE: usize = 0x0B;
const OFF_SURFACE: usize = 0x0C;
const OFF_BATTERY: usize = 0x0E;
const OFF_O2: usize = 0x10;
const OFF_HE: usize = 0x15;
const OFF_DENSITY: usize = 0x1A;
const OFF_FEATURES: usize = 0x21;
const GAS_SLOTS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiveMode {
    OpenCircuit,
    ClosedCircuit,
    SemiClosed,
    Gauge,
    Unknown(u8),
}

impl From<u8> for DiveMode {
    fn from(v: u8) -> Self {
        match v {
            0 => DiveMode::OpenCircuit,
            1 => DiveMode::ClosedCircuit,
            2 => DiveMode::SemiClosed,
            3 => DiveMode::Gauge,
            other => DiveMode::Unknown(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecoModel {
    Buhlmann,
    VpmB,
    Dciem,
    Unknown(u8),
}

impl From<u8> for DecoModel {
    fn from(v: u8) -> Self {
        match v {
            0 => DecoModel::Buhlmann,
            1 => DecoModel::VpmB,
            2 => DecoModel::Dciem,
            other => DecoModel::Unknown(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HeaderSettings {
    pub imperial: bool,
    pub salt_water: bool,
    pub mode: DiveMode,
    /// Only recorded from v4 on.
    pub deco_model: Option<DecoModel>,
}

impl HeaderSettings {
    fn decode(block: &[u8], version: DiveLogVersion) -> Self {
        let b = block[OFF_SETTINGS];
        if version.has_split_settings() {
            Self {
                imperial: b & 0x80 != 0,
                salt_water: b & 0x40 != 0,
                mode: DiveMode::from(block[OFF_MODE]),
                deco_model: Some(DecoModel::from(b & 0x03)),
            }
        } else {
            Self {
                imperial: b & 0x01 != 0,
                salt_water: b & 0x02 != 0,
                mode: DiveMode::from(b >> 4),
                deco_model: None,
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GasMix {
    pub o2: u8,
    pub he: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiveLogHeader {
    pub number: u16,
    pub start_time: u32,
    pub settings: HeaderSettings,
    pub gf_low: u8,
    pub gf_high: u8,
    pub surface_pressure_mbar: u16,
    pub battery_volts: f64,
    /// Configured gases; empty slots (O2 == 0) are dropped.
    pub gases: Vec<GasMix>,
    pub water_density: Option<u16>,
    pub feature_flags: Option<Flags64>,
}

impl DiveLogHeader {
    /// Decode a full opening block. The caller guarantees `block.len() == LOG_BLOCK_LEN`.
    pub fn decode(block: &[u8], version: DiveLogVersion) -> Self {
        let gases = (0..GAS_SLOTS)
            .map(|i| GasMix {
                o2: block[OFF_O2 + i],
                he: block[OFF_HE + i],
            })
            .filter(|g| g.o2 > 0)
            .collect();

        let extended = version.has_extended_fields();
        Self {
            number: BigEndian::read_u16(&block[OFF_NUMBER..]),
            start_time: BigEndian::read_u32(&block[OFF_START..]),
            settings: HeaderSettings::decode(block, version),
            gf_low: block[OFF_GF_LOW],
            gf_high: block[OFF_GF_HIGH],
            surface_pressure_mbar: BigEndian::read_u16(&block[OFF_SURFACE..]),
            battery_volts: BigEndian::read_u16(&block[OFF_BATTERY..]) as f64 / 100.0,
            gases,
            water_density: extended.then(|| BigEndian::read_u16(&block[OFF_DENSITY..])),
            feature_flags: if extended {
                Flags64::read(block, OFF_FEATURES)
            } else {
                None
            },
        }
    }
}
