//! Structured dives handed back to the caller.
//!
//! - `Dive` is driver-neutral; every driver converts its own record format into it.
//! - `DiveCollection` is what one download/decode pass produces, in device order.
//! - `LastKnownDive` + `DiveCollection::retain_new` implement "download new only".

use serde::Serialize;

use crate::divelog::DiveLog;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sample {
    pub time_secs: u32,
    pub depth_m: f64,
    pub temperature_c: Option<f64>,
    pub ppo2: Option<f64>,
}

/// Device-recorded event (alarm, ascent warning, ...). `code` is device specific.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DiveEvent {
    pub time_secs: u32,
    pub code: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dive {
    pub number: u32,
    /// Unix seconds, device clock plus the configured offset.
    pub start: i64,
    pub duration_secs: u32,
    pub max_depth_m: f64,
    pub min_temperature_c: Option<f64>,
    pub samples: Vec<Sample>,
    pub events: Vec<DiveEvent>,
}

impl Dive {
    pub fn new(number: u32, start: i64) -> Self {
        Self {
            number,
            start,
            duration_secs: 0,
            max_depth_m: 0.0,
            min_temperature_c: None,
            samples: Vec::new(),
            events: Vec::new(),
        }
    }

    /// Fill duration/max depth/min temperature from the samples when the device
    /// does not store them.
    pub fn summarize_samples(&mut self) {
        if let Some(last) = self.samples.last() {
            self.duration_secs = self.duration_secs.max(last.time_secs);
        }
        for s in &self.samples {
            if s.depth_m > self.max_depth_m {
                self.max_depth_m = s.depth_m;
            }
            if let Some(t) = s.temperature_c {
                self.min_temperature_c = Some(match self.min_temperature_c {
                    Some(m) if m <= t => m,
                    _ => t,
                });
            }
        }
    }
}

impl From<&DiveLog> for Dive {
    fn from(log: &DiveLog) -> Self {
        Self {
            number: log.header.number as u32,
            start: log.header.start_time as i64,
            duration_secs: log.footer.duration_secs,
            max_depth_m: log.footer.max_depth_m,
            min_temperature_c: Some(log.footer.min_temperature_c),
            samples: log
                .records
                .iter()
                .map(|r| Sample {
                    time_secs: r.time_secs,
                    depth_m: r.depth_m,
                    temperature_c: Some(r.temperature_c),
                    ppo2: Some(r.ppo2),
                })
                .collect(),
            events: Vec::new(),
        }
    }
}

/// The newest dive the caller already has.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LastKnownDive {
    pub number: u32,
    /// None when the caller only tracks numbers.
    pub start: Option<i64>,
}

impl LastKnownDive {
    /// Later start wins; equal or unknown start falls back to the dive number.
    pub fn is_older_than(&self, dive: &Dive) -> bool {
        match self.start {
            Some(t) if dive.start != t => dive.start > t,
            _ => dive.number > self.number,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DiveCollection {
    pub driver: String,
    pub model: Option<String>,
    pub serial: Option<String>,
    pub firmware: Option<String>,
    pub dives: Vec<Dive>,
}

impl DiveCollection {
    pub fn new<S: Into<String>>(driver: S) -> Self {
        Self {
            driver: driver.into(),
            ..Default::default()
        }
    }

    pub fn len(&self) -> usize {
        self.dives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dives.is_empty()
    }

    pub fn apply_clock_offset(&mut self, secs: i64) {
        if secs == 0 {
            return;
        }
        for d in &mut self.dives {
            d.start += secs;
        }
    }

    /// Drop dives the caller already has. No-op without a last-known dive.
    pub fn retain_new(&mut self, last: Option<&LastKnownDive>) {
        if let Some(last) = last {
            self.dives.retain(|d| last.is_older_than(d));
        }
    }

    pub fn newest(&self) -> Option<LastKnownDive> {
        self.dives
            .iter()
            .max_by_key(|d| (d.start, d.number))
            .map(|d| LastKnownDive {
                number: d.number,
                start: Some(d.start),
            })
    }
}
