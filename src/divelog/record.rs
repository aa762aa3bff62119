//! divelog/record — one 32-byte sample row.
//!
//! Layout (integers BE):
//!   0x00 depth u16 /10         0x02 next stop u16 /10    0x04 TTS minutes u16
//!   0x06 temperature i16 /10   0x08 ppO2 u8 /100          0x09 O2 %   0x0A He %
//!   0x0B NDL minutes u16       0x0D status byte
//!   0x0E tank pressure u16 /10 bar (v>=5)                 0x10 gas time minutes u16 (v>=5)
//!   0x12..0x15 three sensor ppO2 u8 /100 (v>=5)
//!
//! Status byte before v4: bit0 closed circuit, bit1 external ppO2 sensors.
//! From v4 on: bits 0-2 active gas index, bit4 closed circuit, bit5 external.
//!
//! Depth and temperature are in the unit system the header selects; decoded
//! values are always metric.

use byteorder::{BigEndian, ByteOrder};
use serde::Serialize;

use super::DiveLogVersion;

const OFF_DEPTH: usize = 0x00;
const OFF_NEXT_STOP: usize = 0x02;
const OFF_TTS: usize = 0x04;
const OFF_TEMP: usize = 0x06;
const OFF_PPO2: usize = 0x08;
const OFF_O2: usize = 0x09;
const OFF_HE: usize = 0x0A;
const OFF_NDL: usize = 0x0B;
const OFF_STATUS: usize = 0x0D;
const OFF_TANK: usize = 0x0E;
const OFF_GAS_TIME: usize = 0x10;
const OFF_SENSORS: usize = 0x12;

const FEET_TO_M: f64 = 0.3048;

#[inline]
pub(crate) fn feet_to_m(ft: f64) -> f64 {
    ft * FEET_TO_M
}

#[inline]
pub(crate) fn fahrenheit_to_c(f: f64) -> f64 {
    (f - 32.0) * 5.0 / 9.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RecordStatus {
    pub closed_circuit: bool,
    pub external_ppo2: bool,
    /// Only recorded from v4 on.
    pub gas_index: Option<u8>,
}

impl RecordStatus {
    fn decode(b: u8, version: DiveLogVersion) -> Self {
        if version.has_split_settings() {
            Self {
                closed_circuit: b & 0x10 != 0,
                external_ppo2: b & 0x20 != 0,
                gas_index: Some(b & 0x07),
            }
        } else {
            Self {
                closed_circuit: b & 0x01 != 0,
                external_ppo2: b & 0x02 != 0,
                gas_index: None,
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiveLogRecord {
    /// Seconds since the dive started (row index * sample interval).
    pub time_secs: u32,
    pub depth_m: f64,
    pub next_stop_m: f64,
    pub tts_min: u16,
    pub temperature_c: f64,
    pub ppo2: f64,
    pub o2: u8,
    pub he: u8,
    pub ndl_min: u16,
    pub status: RecordStatus,
    pub tank_pressure_bar: Option<f64>,
    pub gas_time_min: Option<u16>,
    pub sensor_ppo2: Option<[f64; 3]>,
}

impl DiveLogRecord {
    pub fn decode(row: &[u8], version: DiveLogVersion, imperial: bool, time_secs: u32) -> Self {
        let depth_raw = BigEndian::read_u16(&row[OFF_DEPTH..]) as f64 / 10.0;
        let stop_raw = BigEndian::read_u16(&row[OFF_NEXT_STOP..]) as f64 / 10.0;
        let temp_raw = BigEndian::read_i16(&row[OFF_TEMP..]) as f64 / 10.0;
        let (depth_m, next_stop_m, temperature_c) = if imperial {
            (feet_to_m(depth_raw), feet_to_m(stop_raw), fahrenheit_to_c(temp_raw))
        } else {
            (depth_raw, stop_raw, temp_raw)
        };

        let extended = version.has_extended_fields();
        Self {
            time_secs,
            depth_m,
            next_stop_m,
            tts_min: BigEndian::read_u16(&row[OFF_TTS..]),
            temperature_c,
            ppo2: row[OFF_PPO2] as f64 / 100.0,
            o2: row[OFF_O2],
            he: row[OFF_HE],
            ndl_min: BigEndian::read_u16(&row[OFF_NDL..]),
            status: RecordStatus::decode(row[OFF_STATUS], version),
            tank_pressure_bar: extended
                .then(|| BigEndian::read_u16(&row[OFF_TANK..]) as f64 / 10.0),
            gas_time_min: extended.then(|| BigEndian::read_u16(&row[OFF_GAS_TIME..])),
            sensor_ppo2: extended.then(|| {
                [
                    row[OFF_SENSORS] as f64 / 100.0,
                    row[OFF_SENSORS + 1] as f64 / 100.0,
                    row[OFF_SENSORS + 2] as f64 / 100.0,
                ]
            }),
        }
    }
}
