//! driver/suunto — paged-memory computers (Vyper family) over the checksummed
//! packet transport.
//!
//! Memory map (SUUNTO_MEMORY_SIZE bytes):
//! - [0, SUUNTO_HEADER_SIZE): device header (serial, model, ring pointer, dive count);
//! - [SUUNTO_HEADER_SIZE, end): profile ring. It wraps back to the end of the
//!   header, never to address 0.
//!
//! Profile ring, read oldest -> newest starting at the write pointer:
//!   ...partial dive...|0x80|dive|0x80|dive|0x80|
//! dive = [interval s][yy][mm][dd][hh][mi][temp i8 C][O2 %] + samples,
//! sample = signed depth change in feet per interval; 0x79..=0x7F are events
//! and do not advance time. Header bytes never take the 0x80 value.

use std::path::Path;
use std::sync::Arc;

use byteorder::{BigEndian, ByteOrder};
use log::{debug, info, warn};

use super::{apply_policy, close_after, dump_image, finish, initialized, require_port};
use super::DeviceDriver;
use crate::config::DriverConfig;
use crate::consts::{
    SUUNTO_BAUD, SUUNTO_CMD_READ, SUUNTO_DIVE_END, SUUNTO_DIVE_HDR_SIZE, SUUNTO_EVENT_MAX,
    SUUNTO_EVENT_MIN, SUUNTO_FETCH_ATTEMPTS, SUUNTO_HEADER_SIZE, SUUNTO_MEMORY_SIZE,
    SUUNTO_MODELS, SUUNTO_OFF_DIVE_COUNT, SUUNTO_OFF_END_POINTER, SUUNTO_OFF_MODEL,
    SUUNTO_OFF_SERIAL, SUUNTO_PACING, SUUNTO_PAGE_SIZE,
};
use crate::dive::{Dive, DiveCollection, DiveEvent, LastKnownDive, Sample};
use crate::divelog::record::feet_to_m;
use crate::error::{DecodeError, DeviceError, Result, TransferError};
use crate::memory::{MemoryImage, MemoryLayout, PageSource, PagedMemoryCache};
use crate::status::{CancelToken, NullStatus, StatusSink};
use crate::stream::{ByteStream, Connector, Parity, PortSettings, SerialConnector};
use crate::transport::PacketTransport;
use crate::util::unix_from_civil;

const NAME: &str = "suunto";

pub fn layout() -> Result<MemoryLayout> {
    MemoryLayout::new(SUUNTO_MEMORY_SIZE, SUUNTO_PAGE_SIZE, SUUNTO_HEADER_SIZE)
}

/// 2400 baud, 8O1; DTR powers the interface, RTS low selects receive.
pub fn port_settings() -> PortSettings {
    PortSettings::new(SUUNTO_BAUD)
        .with_parity(Parity::Odd)
        .with_lines(true, false)
}

pub fn model_name(code: u8) -> Option<&'static str> {
    SUUNTO_MODELS
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, n)| *n)
}

// ---------- page source over the packet transport ----------

/// Reads device memory with the `[0x05, addr_hi, addr_lo, len]` command.
pub struct SuuntoLink<S: ByteStream> {
    transport: PacketTransport<S>,
    sink: Arc<dyn StatusSink>,
}

impl<S: ByteStream> SuuntoLink<S> {
    pub fn new(transport: PacketTransport<S>, sink: Arc<dyn StatusSink>) -> Self {
        Self { transport, sink }
    }

    pub fn into_transport(self) -> PacketTransport<S> {
        self.transport
    }

    /// One read command, reply validated against the request.
    pub fn read_memory(&mut self, address: u32, len: u32) -> Result<Vec<u8>> {
        let req = [
            SUUNTO_CMD_READ,
            (address >> 8) as u8,
            address as u8,
            len as u8,
        ];
        let reply = self.transport.request(&req)?;
        if reply.len() != 3 + len as usize || reply[..3] != req[1..] {
            return Err(DeviceError::MalformedFrame(format!(
                "read reply {:02x?}.. does not answer {:02x?}",
                &reply[..reply.len().min(3)],
                req
            )));
        }
        Ok(reply[3..].to_vec())
    }
}

impl<S: ByteStream> PageSource for SuuntoLink<S> {
    fn fetch_page(&mut self, layout: &MemoryLayout, page: u32) -> Result<Vec<u8>> {
        let (start, len) = layout.page_span(page);
        let mut attempt = 1;
        loop {
            match self.read_memory(start, len) {
                Ok(data) => {
                    self.sink.progress_increment(len as u64);
                    return Ok(data);
                }
                Err(e) if e.is_transient() && attempt < SUUNTO_FETCH_ATTEMPTS => {
                    warn!("page {} read failed ({}), retrying", page, e);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

// ---------- memory parsing ----------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuuntoHeader {
    pub model: u8,
    pub serial: u32,
    pub end_pointer: u32,
    pub dive_count: u16,
}

impl SuuntoHeader {
    pub fn parse(bytes: &[u8]) -> std::result::Result<Self, DecodeError> {
        if bytes.len() < SUUNTO_HEADER_SIZE as usize {
            return Err(DecodeError::Corrupt(format!("header has {} bytes", bytes.len())));
        }
        let at = |off: u32| off as usize;
        let end_pointer = BigEndian::read_u16(&bytes[at(SUUNTO_OFF_END_POINTER)..]) as u32;
        if !(SUUNTO_HEADER_SIZE..SUUNTO_MEMORY_SIZE).contains(&end_pointer) {
            return Err(DecodeError::Corrupt(format!(
                "profile pointer {:#06x} outside the ring",
                end_pointer
            )));
        }
        Ok(Self {
            model: bytes[at(SUUNTO_OFF_MODEL)],
            serial: BigEndian::read_u32(&bytes[at(SUUNTO_OFF_SERIAL)..]),
            end_pointer,
            dive_count: BigEndian::read_u16(&bytes[at(SUUNTO_OFF_DIVE_COUNT)..]),
        })
    }
}

fn parse_dive(number: u32, seg: &[u8]) -> std::result::Result<Dive, DecodeError> {
    let h = &seg[..SUUNTO_DIVE_HDR_SIZE];
    let interval = h[0] as u32;
    if interval == 0 {
        return Err(DecodeError::Corrupt(format!("dive #{}: zero sample interval", number)));
    }
    let year = match h[1] as i32 {
        yy if yy < 90 => 2000 + yy,
        yy => 1900 + yy,
    };
    let start = unix_from_civil(year, h[2], h[3], h[4], h[5], 0)
        .ok_or_else(|| {
            DecodeError::Corrupt(format!("dive #{}: bad date {:02x?}", number, &h[1..6]))
        })?;
    let temperature = h[6] as i8 as f64;

    let mut dive = Dive::new(number, start);
    let mut depth_ft = 0i32;
    let mut t = 0u32;
    for &b in &seg[SUUNTO_DIVE_HDR_SIZE..] {
        if (SUUNTO_EVENT_MIN..=SUUNTO_EVENT_MAX).contains(&b) {
            dive.events.push(DiveEvent { time_secs: t, code: b });
            continue;
        }
        depth_ft = (depth_ft + b as i8 as i32).max(0);
        t += interval;
        dive.samples.push(Sample {
            time_secs: t,
            depth_m: feet_to_m(depth_ft as f64),
            temperature_c: None,
            ppo2: None,
        });
    }
    dive.summarize_samples();
    dive.min_temperature_c = Some(temperature);
    Ok(dive)
}

/// Parse the header region and the profile ring of a (possibly cached) memory.
pub fn parse_memory<S: PageSource>(
    cache: &mut PagedMemoryCache<S>,
) -> Result<(SuuntoHeader, Vec<Dive>)> {
    let raw = cache.read(0, SUUNTO_HEADER_SIZE)?;
    let header = SuuntoHeader::parse(&raw)?;
    debug!(
        "model {:#04x} serial {} pointer {:#06x} count {}",
        header.model, header.serial, header.end_pointer, header.dive_count
    );

    let ring_len = SUUNTO_MEMORY_SIZE - SUUNTO_HEADER_SIZE;
    let ring = cache.read(header.end_pointer, ring_len)?;

    // first segment may have been partly overwritten
    let segments: Vec<&[u8]> = ring
        .split(|&b| b == SUUNTO_DIVE_END)
        .skip(1)
        .filter(|s| s.len() >= SUUNTO_DIVE_HDR_SIZE)
        .collect();

    let n = segments.len() as u32;
    let newest = (header.dive_count as u32).max(n);
    let mut dives = Vec::with_capacity(segments.len());
    for (i, seg) in segments.iter().enumerate() {
        let number = newest - (n - 1 - i as u32);
        dives.push(parse_dive(number, seg)?);
    }
    Ok((header, dives))
}

fn collection(header: &SuuntoHeader, dives: Vec<Dive>) -> DiveCollection {
    let mut coll = DiveCollection::new(NAME);
    coll.model = model_name(header.model).map(str::to_string);
    coll.serial = Some(header.serial.to_string());
    coll.dives = dives;
    coll
}

// ---------- driver ----------

pub struct SuuntoDriver {
    connector: Box<dyn Connector>,
    config: Option<DriverConfig>,
    cancel: CancelToken,
}

impl Default for SuuntoDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl SuuntoDriver {
    pub fn new() -> Self {
        Self {
            connector: Box::new(SerialConnector::new()),
            config: None,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_connector(mut self, connector: Box<dyn Connector>) -> Self {
        self.connector = connector;
        self
    }

    /// Decode a saved memory image instead of a live device.
    pub fn replay_image(
        path: &Path,
        config: &DriverConfig,
        last: Option<&LastKnownDive>,
    ) -> std::result::Result<DiveCollection, TransferError> {
        let run = || -> Result<DiveCollection> {
            let layout = layout()?;
            let image = MemoryImage::open(path, &layout)?;
            let mut cache = PagedMemoryCache::new(layout, image);
            let (header, dives) = parse_memory(&mut cache)?;
            let mut coll = collection(&header, dives);
            apply_policy(&mut coll, config, last);
            Ok(coll)
        };
        finish(&NullStatus, run())
    }

    fn check_model(config: &DriverConfig, header: &SuuntoHeader) -> Result<()> {
        let found = model_name(header.model);
        match (&config.model, found) {
            (_, None) => Err(DeviceError::UnsupportedDeviceResponse(format!(
                "unknown model code {:#04x}",
                header.model
            ))),
            (Some(want), Some(got)) if !want.eq_ignore_ascii_case(got) => {
                Err(DeviceError::UnsupportedDeviceResponse(format!(
                    "expected {}, found {}",
                    want, got
                )))
            }
            _ => Ok(()),
        }
    }

    fn download(
        &mut self,
        status: &Arc<dyn StatusSink>,
        last: Option<&LastKnownDive>,
    ) -> Result<DiveCollection> {
        let config = initialized(&self.config)?.clone();
        let port = require_port(&config)?;
        let layout = layout()?;

        let conn = self.connector.connect(&port, &port_settings())?;
        info!("{}: connected to {}", NAME, port);

        let mut transport = PacketTransport::new(conn, config.timing_or(SUUNTO_PACING))
            .with_cancel(self.cancel.clone())
            .with_sink(status.clone());
        if let Err(e) = transport.set_flow_control(true, false) {
            return close_after(transport.into_inner(), Err(e));
        }

        status.progress_start(layout.memory_size as u64);
        let mut cache = PagedMemoryCache::new(layout, SuuntoLink::new(transport, status.clone()));
        let parsed = parse_memory(&mut cache).and_then(|(header, dives)| {
            Self::check_model(&config, &header)?;
            if let Some(path) = &config.dump_path {
                cache.save_to_file(path)?;
            }
            Ok((header, dives))
        });
        let conn = cache.into_source().into_transport().into_inner();
        let (header, dives) = close_after(conn, parsed)?;

        let mut coll = collection(&header, dives);
        apply_policy(&mut coll, &config, last);
        Ok(coll)
    }
}

impl DeviceDriver for SuuntoDriver {
    fn name(&self) -> &'static str {
        NAME
    }

    fn description(&self) -> &'static str {
        "Suunto Vyper family (paged memory, 2400 8O1)"
    }

    fn initialize(&mut self, config: &DriverConfig) -> std::result::Result<(), TransferError> {
        require_port(config)?;
        self.config = Some(config.clone());
        Ok(())
    }

    fn transfer(
        &mut self,
        status: Arc<dyn StatusSink>,
        last: Option<&LastKnownDive>,
    ) -> std::result::Result<DiveCollection, TransferError> {
        let result = self.download(&status, last);
        finish(status.as_ref(), result)
    }

    fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }
}
