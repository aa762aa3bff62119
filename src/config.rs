//! Centralized driver configuration and builder.
//!
//! Goals:
//! - One place for the named configuration keys every driver understands
//!   (`port`, `model`, `download_all`, `clock_offset`, `dump_path`).
//! - `DriverConfig::from_env()` reads the same keys from `DIVELINK_*` variables.
//! - Chained `with_*` setters for programmatic use (CLI, tests).
//!
//! Transport timing lives in `TransportTiming`. Its defaults are the protocol
//! constants from `consts`; only tests and offline replay should zero them.

use std::path::PathBuf;
use std::time::Duration;

use crate::consts::{
    ACK_TIMEOUT, IDLE_MAX_RETRIES, IDLE_RETRY_DELAY, RETRY_PAUSE_BASE, RETRY_PAUSE_CAP,
    SEND_MAX_ATTEMPTS,
};

/// Names of the configuration keys, in the order drivers report them.
pub const CONFIG_KEYS: &[&str] = &["port", "model", "download_all", "clock_offset", "dump_path"];

/// Top-level configuration handed to `DeviceDriver::initialize`.
#[derive(Clone, Debug, Default)]
pub struct DriverConfig {
    /// Serial device path (e.g. /dev/ttyUSB0, COM3, /dev/rfcomm0).
    /// Env: DIVELINK_PORT
    pub port: Option<String>,

    /// Model or protocol variant; drivers fall back to their default when None.
    /// Env: DIVELINK_MODEL
    pub model: Option<String>,

    /// Download every dive instead of only those newer than the caller's last one.
    /// Env: DIVELINK_DOWNLOAD_ALL = 0|1|true|false|on|off|yes|no (default false)
    pub download_all: bool,

    /// Seconds added to every decoded start time (device clock drift).
    /// Env: DIVELINK_CLOCK_OFFSET (signed)
    pub clock_offset: i64,

    /// If set, the raw memory image is written here after a successful fetch.
    /// Env: DIVELINK_DUMP
    pub dump_path: Option<PathBuf>,

    /// None = the driver's protocol timing.
    pub timing: Option<TransportTiming>,
}

impl DriverConfig {
    /// Load configuration from `DIVELINK_*` environment variables.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("DIVELINK_PORT") {
            let s = v.trim();
            if !s.is_empty() {
                cfg.port = Some(s.to_string());
            }
        }

        if let Ok(v) = std::env::var("DIVELINK_MODEL") {
            let s = v.trim();
            if !s.is_empty() {
                cfg.model = Some(s.to_string());
            }
        }

        if let Ok(v) = std::env::var("DIVELINK_DOWNLOAD_ALL") {
            cfg.download_all = parse_flag(&v);
        }

        if let Ok(v) = std::env::var("DIVELINK_CLOCK_OFFSET") {
            if let Ok(n) = v.trim().parse::<i64>() {
                cfg.clock_offset = n;
            }
        }

        if let Ok(v) = std::env::var("DIVELINK_DUMP") {
            let s = v.trim();
            if !s.is_empty() {
                cfg.dump_path = Some(PathBuf::from(s));
            }
        }

        // ----- timing overrides -----
        let mut timing: Option<TransportTiming> = None;
        if let Ok(v) = std::env::var("DIVELINK_PACING_MS") {
            if let Ok(n) = v.trim().parse::<u64>() {
                timing.get_or_insert_with(TransportTiming::default).pacing = Duration::from_millis(n);
            }
        }
        if let Ok(v) = std::env::var("DIVELINK_ACK_TIMEOUT_MS") {
            if let Ok(n) = v.trim().parse::<u64>() {
                timing.get_or_insert_with(TransportTiming::default).ack_timeout =
                    Duration::from_millis(n);
            }
        }
        if let Ok(v) = std::env::var("DIVELINK_MAX_ATTEMPTS") {
            if let Ok(n) = v.trim().parse::<u32>() {
                timing.get_or_insert_with(TransportTiming::default).max_attempts = n.max(1);
            }
        }
        cfg.timing = timing;

        cfg
    }

    // ---------- builder ----------

    pub fn with_port<S: Into<String>>(mut self, port: S) -> Self {
        self.port = Some(port.into());
        self
    }

    pub fn with_model<S: Into<String>>(mut self, model: S) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_download_all(mut self, on: bool) -> Self {
        self.download_all = on;
        self
    }

    pub fn with_clock_offset(mut self, secs: i64) -> Self {
        self.clock_offset = secs;
        self
    }

    pub fn with_dump_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.dump_path = Some(path.into());
        self
    }

    pub fn with_timing(mut self, timing: TransportTiming) -> Self {
        self.timing = Some(timing);
        self
    }

    /// Look a key up by its string name (used by the `drivers` listing and the CLI).
    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "port" => self.port.clone(),
            "model" => self.model.clone(),
            "download_all" => Some(self.download_all.to_string()),
            "clock_offset" => Some(self.clock_offset.to_string()),
            "dump_path" => self.dump_path.as_ref().map(|p| p.display().to_string()),
            _ => None,
        }
    }

    /// Resolve timing: explicit override, otherwise the protocol defaults with `pacing`.
    pub fn timing_or(&self, pacing: Duration) -> TransportTiming {
        self.timing
            .clone()
            .unwrap_or_else(|| TransportTiming::default().with_pacing(pacing))
    }
}

/// Timing contract of a packet transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransportTiming {
    /// Delay before every transmitted byte.
    pub pacing: Duration,
    /// How long to wait for the acknowledgement byte after a packet.
    pub ack_timeout: Duration,
    pub max_attempts: u32,
    /// Pause after a failed attempt is `retry_pause * attempt`, capped by `retry_pause_cap`.
    pub retry_pause: Duration,
    pub retry_pause_cap: Duration,
    /// Receive side: delay between polls while no length byte has arrived.
    pub idle_delay: Duration,
    pub idle_retries: u32,
}

impl Default for TransportTiming {
    fn default() -> Self {
        Self {
            pacing: Duration::ZERO,
            ack_timeout: ACK_TIMEOUT,
            max_attempts: SEND_MAX_ATTEMPTS,
            retry_pause: RETRY_PAUSE_BASE,
            retry_pause_cap: RETRY_PAUSE_CAP,
            idle_delay: IDLE_RETRY_DELAY,
            idle_retries: IDLE_MAX_RETRIES,
        }
    }
}

impl TransportTiming {
    /// No sleeps at all; retry budgets stay as configured.
    pub fn instant() -> Self {
        Self {
            pacing: Duration::ZERO,
            ack_timeout: Duration::ZERO,
            retry_pause: Duration::ZERO,
            retry_pause_cap: Duration::ZERO,
            idle_delay: Duration::ZERO,
            ..Self::default()
        }
    }

    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn with_max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n.max(1);
        self
    }

    pub fn with_idle_retries(mut self, n: u32) -> Self {
        self.idle_retries = n;
        self
    }

    /// Escalating pause after `attempt` (1-based) failed.
    pub fn pause_after(&self, attempt: u32) -> Duration {
        self.retry_pause
            .saturating_mul(attempt)
            .min(self.retry_pause_cap)
    }
}

#[inline]
fn parse_flag(v: &str) -> bool {
    let s = v.trim().to_ascii_lowercase();
    s == "1" || s == "true" || s == "on" || s == "yes"
}
