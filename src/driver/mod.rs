//! driver — one orchestrator per supported dive computer family.
//!
//! Каждый драйвер:
//! - validates its configuration in `initialize` (a live download needs a port);
//! - opens the port through a `Connector` and owns the resulting `Connection`
//!   for exactly one `transfer`; the connection is closed on every exit path;
//! - downloads through `PacketTransport` (+ `PagedMemoryCache`) or
//!   `RequestResponseSession` (+ `divelog`), converts to `Dive`s, applies the
//!   clock offset and the "new only" policy;
//! - reports progress through the caller's `StatusSink` and folds every failure
//!   into one categorized `TransferError`.
//!
//! Registry: `drivers()` lists what is available, `driver_by_name` builds one.

pub mod memomouse;
pub mod shearwater;
pub mod suunto;

use std::path::Path;
use std::sync::Arc;

use log::{info, warn};
use serde::Serialize;

use crate::config::{DriverConfig, CONFIG_KEYS};
use crate::dive::{DiveCollection, LastKnownDive};
use crate::error::{DeviceError, TransferError};
use crate::status::{CancelToken, StatusSink};
use crate::stream::{ByteStream, Connection};

pub use memomouse::MemoMouseDriver;
pub use shearwater::ShearwaterDriver;
pub use suunto::SuuntoDriver;

pub trait DeviceDriver: Send {
    /// Stable identifier (CLI `--driver`, registry key).
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// Configuration keys this driver reads.
    fn config_keys(&self) -> &'static [&'static str] {
        CONFIG_KEYS
    }

    fn initialize(&mut self, config: &DriverConfig) -> Result<(), TransferError>;

    /// Download dives. With `download_all` unset, only dives newer than `last` are returned.
    fn transfer(
        &mut self,
        status: Arc<dyn StatusSink>,
        last: Option<&LastKnownDive>,
    ) -> Result<DiveCollection, TransferError>;

    /// Token the caller can use to abort a running transfer.
    fn cancel_token(&self) -> CancelToken;
}

#[derive(Debug, Clone, Serialize)]
pub struct DriverInfo {
    pub name: &'static str,
    pub description: &'static str,
    pub config_keys: &'static [&'static str],
}

/// Every driver, with its default connector.
pub fn drivers() -> Vec<DriverInfo> {
    all()
        .iter()
        .map(|d| DriverInfo {
            name: d.name(),
            description: d.description(),
            config_keys: d.config_keys(),
        })
        .collect()
}

pub fn driver_by_name(name: &str) -> Option<Box<dyn DeviceDriver>> {
    all().into_iter().find(|d| d.name().eq_ignore_ascii_case(name))
}

fn all() -> Vec<Box<dyn DeviceDriver>> {
    vec![
        Box::new(SuuntoDriver::new()),
        Box::new(MemoMouseDriver::new()),
        Box::new(ShearwaterDriver::new()),
    ]
}

// ---------- shared helpers ----------

/// Port from the configuration, or `InvalidConfiguration`.
pub(crate) fn require_port(config: &DriverConfig) -> Result<String, DeviceError> {
    config
        .port
        .clone()
        .ok_or_else(|| DeviceError::InvalidConfiguration("no port selected".into()))
}

/// Configuration stored by `initialize`, or `InvalidConfiguration` if it never ran.
pub(crate) fn initialized(config: &Option<DriverConfig>) -> Result<&DriverConfig, DeviceError> {
    config
        .as_ref()
        .ok_or_else(|| DeviceError::InvalidConfiguration("driver not initialized".into()))
}

/// Clock offset first, then the new-only filter (the caller's last start is adjusted time).
pub(crate) fn apply_policy(
    coll: &mut DiveCollection,
    config: &DriverConfig,
    last: Option<&LastKnownDive>,
) {
    coll.apply_clock_offset(config.clock_offset);
    if !config.download_all {
        let before = coll.len();
        coll.retain_new(last);
        if coll.len() != before {
            info!("{} of {} dives already known, skipped", before - coll.len(), before);
        }
    }
}

pub(crate) fn dump_image(path: &Path, image: &[u8]) -> Result<(), DeviceError> {
    std::fs::write(path, image)?;
    info!("raw image saved to {} ({} bytes)", path.display(), image.len());
    Ok(())
}

/// Close the connection whatever `result` is; a close failure only matters on success.
pub(crate) fn close_after<T>(
    mut conn: Connection,
    result: Result<T, DeviceError>,
) -> Result<T, DeviceError> {
    let closed = conn.close();
    match (result, closed) {
        (Ok(v), Ok(())) => Ok(v),
        (Ok(_), Err(e)) => Err(e.into()),
        (Err(e), Err(ce)) => {
            warn!("close after error failed: {}", ce);
            Err(e)
        }
        (Err(e), Ok(())) => Err(e),
    }
}

/// Map a session result into the driver boundary, telling the sink about failures.
pub(crate) fn finish(
    status: &dyn StatusSink,
    result: Result<DiveCollection, DeviceError>,
) -> Result<DiveCollection, TransferError> {
    status.progress_end();
    match result {
        Ok(coll) => {
            status.message(&format!("{} dives downloaded", coll.len()));
            Ok(coll)
        }
        Err(e) => {
            let err = TransferError::from(e);
            status.message(&err.to_string());
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_lists_every_driver() {
        let names: Vec<_> = drivers().iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["suunto", "memomouse", "shearwater"]);
        assert!(driver_by_name("Shearwater").is_some());
        assert!(driver_by_name("nope").is_none());
    }

    #[test]
    fn initialize_requires_port() {
        let mut d = driver_by_name("suunto").unwrap();
        let err = d.initialize(&DriverConfig::default()).unwrap_err();
        assert_eq!(err.category, crate::error::ErrorCategory::Configuration);
    }

    #[test]
    fn policy_applies_offset_before_filter() {
        use crate::dive::Dive;
        let mut coll = DiveCollection::new("t");
        coll.dives = vec![Dive::new(1, 100), Dive::new(2, 200)];
        let cfg = DriverConfig::default().with_clock_offset(50);
        apply_policy(&mut coll, &cfg, Some(&LastKnownDive { number: 1, start: Some(150) }));
        assert_eq!(coll.dives.len(), 1);
        assert_eq!(coll.dives[0].start, 250);

        let mut coll = DiveCollection::new("t");
        coll.dives = vec![Dive::new(1, 100)];
        let cfg = DriverConfig::default().with_download_all(true);
        apply_policy(&mut coll, &cfg, Some(&LastKnownDive { number: 9, start: Some(900) }));
        assert_eq!(coll.dives.len(), 1);
    }
}
