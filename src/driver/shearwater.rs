//! driver/shearwater — SLIP/link-envelope computers (Predator, Petrel, Perdix).
//!
//! Поток:
//! 1. read identifiers: serial, firmware, hardware code (-> model, wrong-device check);
//! 2. RequestUpload of the whole log image, the device answers with its max block size;
//! 3. TransferData with a wrapping block counter starting at 1 until the image is complete;
//! 4. RequestTransferExit;
//! 5. decode the image with `divelog` and convert to `Dive`s.

use std::sync::Arc;

use log::{debug, info, warn};

use super::{apply_policy, close_after, dump_image, finish, initialized, require_port};
use super::DeviceDriver;
use crate::config::DriverConfig;
use crate::consts::{
    ID_FIRMWARE, ID_HARDWARE, ID_SERIAL, LOG_IMAGE_SIZE, SW_BAUD, SW_HARDWARE_MODELS,
    SW_LOG_BASE_ADDR,
};
use crate::dive::{Dive, DiveCollection, LastKnownDive};
use crate::divelog;
use crate::error::{DeviceError, Result, TransferError};
use crate::link::{Request, RequestResponseSession, Response, ResponseKind};
use crate::status::{CancelToken, StatusSink};
use crate::stream::{ByteStream, Connector, PortSettings, SerialConnector};

const NAME: &str = "shearwater";

pub fn port_settings() -> PortSettings {
    PortSettings::new(SW_BAUD)
}

pub fn model_name(hardware: u16) -> Option<&'static str> {
    SW_HARDWARE_MODELS
        .iter()
        .find(|(c, _)| *c == hardware)
        .map(|(_, n)| *n)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub serial: String,
    pub firmware: String,
    pub hardware: u16,
    pub model: &'static str,
}

fn read_identifier<S: ByteStream>(
    session: &mut RequestResponseSession<S>,
    id: u16,
) -> Result<Vec<u8>> {
    match session.request(&Request::ReadIdentifier { id }, &[ResponseKind::Identifier])? {
        Response::Identifier { id: got, data } if got == id => Ok(data),
        other => Err(DeviceError::UnsupportedDeviceResponse(format!(
            "asked for identifier {:#06x}, got {:?}",
            id, other
        ))),
    }
}

fn text(data: &[u8]) -> String {
    String::from_utf8_lossy(data)
        .trim_end_matches('\0')
        .trim()
        .to_string()
}

pub fn identify<S: ByteStream>(session: &mut RequestResponseSession<S>) -> Result<DeviceIdentity> {
    let serial = text(&read_identifier(session, ID_SERIAL)?);
    let firmware = text(&read_identifier(session, ID_FIRMWARE)?);
    let hw = read_identifier(session, ID_HARDWARE)?;
    if hw.len() < 2 {
        return Err(DeviceError::UnsupportedDeviceResponse(format!(
            "hardware identifier has {} bytes",
            hw.len()
        )));
    }
    let hardware = u16::from_be_bytes([hw[0], hw[1]]);
    let model = model_name(hardware).ok_or_else(|| {
        DeviceError::UnsupportedDeviceResponse(format!("unknown hardware code {:#06x}", hardware))
    })?;
    info!("{} serial {} firmware {}", model, serial, firmware);
    Ok(DeviceIdentity {
        serial,
        firmware,
        hardware,
        model,
    })
}

/// Upload `size` bytes at `address` block by block.
pub fn upload<S: ByteStream>(
    session: &mut RequestResponseSession<S>,
    address: u32,
    size: usize,
    status: &dyn StatusSink,
) -> Result<Vec<u8>> {
    let max_block = match session.request(
        &Request::RequestUpload {
            address,
            size: size as u32,
        },
        &[ResponseKind::UploadAccepted],
    )? {
        Response::UploadAccepted { max_block } if max_block > 0 => max_block,
        other => {
            return Err(DeviceError::UnsupportedDeviceResponse(format!(
                "upload not accepted: {:?}",
                other
            )))
        }
    };
    debug!("upload of {:#x} bytes accepted, max block {}", size, max_block);

    status.progress_start(size as u64);
    let mut image = Vec::with_capacity(size);
    let mut counter: u8 = 1;
    while image.len() < size {
        let resp = session.request(
            &Request::TransferData { counter },
            &[ResponseKind::TransferData],
        )?;
        let data = match resp {
            Response::TransferData { counter: c, data } if c == counter => data,
            Response::TransferData { counter: c, .. } => {
                return Err(DeviceError::UnsupportedDeviceResponse(format!(
                    "block counter {} answered with {}",
                    counter, c
                )))
            }
            other => {
                return Err(DeviceError::UnsupportedDeviceResponse(format!("{:?}", other)))
            }
        };
        if data.is_empty() {
            return Err(DeviceError::UnsupportedDeviceResponse(format!(
                "empty block {} at {:#x}",
                counter,
                image.len()
            )));
        }
        let take = data.len().min(size - image.len());
        image.extend_from_slice(&data[..take]);
        status.progress_increment(take as u64);
        counter = counter.wrapping_add(1);
    }

    session.request(&Request::TransferExit, &[ResponseKind::TransferExit])?;
    Ok(image)
}

/// Dives from a downloaded (or saved) log image, in scan order.
pub fn dives_from_image(image: &[u8]) -> Result<Vec<Dive>> {
    if let Err(e) = divelog::verify_checksum(image) {
        warn!("{}", e);
    }
    let decoded = divelog::decode(image)?;
    debug!(
        "log version {} product {:#04x}: {} dives",
        decoded.info.version.0,
        decoded.info.product,
        decoded.dives.len()
    );
    Ok(decoded.dives.iter().map(Dive::from).collect())
}

pub struct ShearwaterDriver {
    connector: Box<dyn Connector>,
    config: Option<DriverConfig>,
    cancel: CancelToken,
}

impl Default for ShearwaterDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl ShearwaterDriver {
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
        let mut session = RequestResponseSession::new(conn).with_cancel(self.cancel.clone());

        let fetched = identify(&mut session).and_then(|id| {
            if let Some(want) = &config.model {
                if !want.eq_ignore_ascii_case(id.model) {
                    return Err(DeviceError::UnsupportedDeviceResponse(format!(
                        "expected {}, found {}",
                        want, id.model
                    )));
                }
            }
            status.message(&format!("downloading from {} {}", id.model, id.serial));
            let image = upload(&mut session, SW_LOG_BASE_ADDR, LOG_IMAGE_SIZE, status.as_ref())?;
            Ok((id, image))
        });
        let (id, image) = close_after(session.into_inner(), fetched)?;

        if let Some(path) = &config.dump_path {
            dump_image(path, &image)?;
        }

        let mut coll = DiveCollection::new(NAME);
        coll.model = Some(id.model.to_string());
        coll.serial = Some(id.serial);
        coll.firmware = Some(id.firmware);
        coll.dives = dives_from_image(&image)?;
        apply_policy(&mut coll, &config, last);
        Ok(coll)
    }
}

impl DeviceDriver for ShearwaterDriver {
    fn name(&self) -> &'static str {
        NAME
    }

    fn description(&self) -> &'static str {
        "Shearwater Predator/Petrel/Perdix (SLIP over serial or RFCOMM)"
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hardware_codes() {
        assert_eq!(model_name(0x0808), Some("Perdix"));
        assert_eq!(model_name(0x1234), None);
    }

    #[test]
    fn identifier_text_is_trimmed() {
        assert_eq!(text(b"V85\0\0"), "V85");
        assert_eq!(text(b" 1A2B3C4D "), "1A2B3C4D");
    }
}
