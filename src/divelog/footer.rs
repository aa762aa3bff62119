//! divelog/footer — closing block.
//!
//! Layout (integers BE):
//!   0x00 marker FF FE   0x02 dive number u16   0x04 end time u32 (unix)
//!   0x08 max depth u16 /10                     0x0A duration seconds u32
//!   0x0E min temperature i16 /10
//!   0x10 battery u16 /100 V (v>=5)             0x12 alarm flags 8 bytes (v>=5)
//!   0x20/0x40/0x60 row tags

use byteorder::{BigEndian, ByteOrder};
use serde::Serialize;

use super::bits::Flags64;
use super::record::{fahrenheit_to_c, feet_to_m};
use super::DiveLogVersion;

const OFF_NUMBER: usize = 0x02;
const OFF_END: usize = 0x04;
const OFF_MAX_DEPTH: usize = 0x08;
const OFF_DURATION: usize = 0x0A;
const OFF_MIN_TEMP: usize = 0x0E;
const OFF_BATTERY: usize = 0x10;
const OFF_ALARMS: usize = 0x12;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiveLogFooter {
    pub number: u16,
    pub end_time: u32,
    pub max_depth_m: f64,
    pub duration_secs: u32,
    pub min_temperature_c: f64,
    pub battery_volts: Option<f64>,
    pub alarms: Option<Flags64>,
}

impl DiveLogFooter {
    pub fn decode(block: &[u8], version: DiveLogVersion, imperial: bool) -> Self {
        let depth = BigEndian::read_u16(&block[OFF_MAX_DEPTH..]) as f64 / 10.0;
        let temp = BigEndian::read_i16(&block[OFF_MIN_TEMP..]) as f64 / 10.0;
        let extended = version.has_extended_fields();
        Self {
            number: BigEndian::read_u16(&block[OFF_NUMBER..]),
            end_time: BigEndian::read_u32(&block[OFF_END..]),
            max_depth_m: if imperial { feet_to_m(depth) } else { depth },
            duration_secs: BigEndian::read_u32(&block[OFF_DURATION..]),
            min_temperature_c: if imperial { fahrenheit_to_c(temp) } else { temp },
            battery_volts: extended
                .then(|| BigEndian::read_u16(&block[OFF_BATTERY..]) as f64 / 100.0),
            alarms: if extended {
                Flags64::read(block, OFF_ALARMS)
            } else {
                None
            },
        }
    }

    pub fn peek_number(block: &[u8]) -> u16 {
        BigEndian::read_u16(&block[OFF_NUMBER..])
    }
}
