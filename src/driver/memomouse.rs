//! driver/memomouse — Memo Mouse interface (Aladin computers).
//!
//! - every byte on the wire is bit-reversed; the transport undoes it;
//! - packets carry both the inner (payload) and outer checksum;
//! - one request `[MEMOMOUSE_CMD_LOGBOOK]` returns the whole logbook as a
//!   multi-packet reply.
//!
//! Logbook entry (16 bytes, BE):
//!   0x00 dive number u16   0x02 start, seconds since 1994-01-01 u32
//!   0x06 max depth cm u16  0x08 duration minutes u16   0x0A min temp i16 /10 C
//!   0x0C reserved
//! Unused slots are all 0xFF. The interface keeps no profile samples.

use std::sync::Arc;

use byteorder::{BigEndian, ByteOrder};
use log::{debug, info};

use super::{apply_policy, close_after, dump_image, finish, initialized, require_port};
use super::DeviceDriver;
use crate::config::DriverConfig;
use crate::consts::{
    MEMOMOUSE_BAUD, MEMOMOUSE_CMD_LOGBOOK, MEMOMOUSE_ENTRY_SIZE, MEMOMOUSE_EPOCH, MEMOMOUSE_PACING,
};
use crate::dive::{Dive, DiveCollection, LastKnownDive};
use crate::error::{DecodeError, Result, TransferError};
use crate::status::{CancelToken, StatusSink};
use crate::stream::{ByteStream, Connector, Parity, PortSettings, SerialConnector};
use crate::transport::PacketTransport;

const NAME: &str = "memomouse";

/// 19200 baud, 8E1, both modem lines up (the interface draws power from them).
pub fn port_settings() -> PortSettings {
    PortSettings::new(MEMOMOUSE_BAUD).with_parity(Parity::Even)
}

/// Configure a transport the way the interface expects.
pub fn configure<S: ByteStream>(stream: S, config: &DriverConfig) -> PacketTransport<S> {
    PacketTransport::new(stream, config.timing_or(MEMOMOUSE_PACING))
        .with_bit_reorder(true)
        .with_inner_checksum(true)
}

pub fn parse_logbook(data: &[u8]) -> std::result::Result<Vec<Dive>, DecodeError> {
    if data.len() % MEMOMOUSE_ENTRY_SIZE != 0 {
        return Err(DecodeError::Corrupt(format!(
            "logbook of {} bytes is not a whole number of entries",
            data.len()
        )));
    }
    let dives = data
        .chunks_exact(MEMOMOUSE_ENTRY_SIZE)
        .filter(|e| !e.iter().all(|&b| b == 0xFF))
        .map(|e| {
            let mut d = Dive::new(
                BigEndian::read_u16(&e[0..2]) as u32,
                MEMOMOUSE_EPOCH + BigEndian::read_u32(&e[2..6]) as i64,
            );
            d.max_depth_m = BigEndian::read_u16(&e[6..8]) as f64 / 100.0;
            d.duration_secs = BigEndian::read_u16(&e[8..10]) as u32 * 60;
            d.min_temperature_c = Some(BigEndian::read_i16(&e[10..12]) as f64 / 10.0);
            d
        })
        .collect();
    Ok(dives)
}

/// Request the logbook on an already configured transport.
pub fn read_logbook<S: ByteStream>(transport: &mut PacketTransport<S>) -> Result<Vec<u8>> {
    transport.send(&[MEMOMOUSE_CMD_LOGBOOK])?;
    let data = transport.receive_multi_packet_response()?;
    debug!("logbook: {} bytes", data.len());
    Ok(data)
}

pub struct MemoMouseDriver {
    connector: Box<dyn Connector>,
    config: Option<DriverConfig>,
    cancel: CancelToken,
}

impl Default for MemoMouseDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoMouseDriver {
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

    fn download(
        &mut self,
        status: &Arc<dyn StatusSink>,
        last: Option<&LastKnownDive>,
    ) -> Result<DiveCollection> {
        let config = initialized(&self.config)?.clone();
        let port = require_port(&config)?;

        let conn = self.connector.connect(&port, &port_settings())?;
        info!("{}: connected to {}", NAME, port);
        let mut transport = configure(conn, &config)
            .with_cancel(self.cancel.clone())
            .with_sink(status.clone());

        status.message("reading logbook");
        let raw = transport
            .set_flow_control(true, true)
            .and_then(|_| read_logbook(&mut transport));
        let raw = close_after(transport.into_inner(), raw)?;

        status.progress_start(raw.len() as u64);
        status.progress_increment(raw.len() as u64);
        if let Some(path) = &config.dump_path {
            dump_image(path, &raw)?;
        }

        let mut coll = DiveCollection::new(NAME);
        coll.model = config.model.clone();
        coll.dives = parse_logbook(&raw)?;
        apply_policy(&mut coll, &config, last);
        Ok(coll)
    }
}

impl DeviceDriver for MemoMouseDriver {
    fn name(&self) -> &'static str {
        NAME
    }

    fn description(&self) -> &'static str {
        "Memo Mouse logbook interface (bit-reversed, 19200 8E1)"
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
