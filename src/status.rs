//! Progress reporting and cooperative cancellation.
//!
//! `StatusSink` is the thin reporting interface a driver calls while it
//! downloads; the application implements it. `CancelToken` is shared between
//! the caller and the transport and is checked before every send/receive.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info};

use crate::error::{DeviceError, Result};

/// Progress/log callbacks. All methods default to no-ops.
pub trait StatusSink: Send + Sync {
    fn message(&self, _text: &str) {}
    fn progress_start(&self, _total: u64) {}
    fn progress_increment(&self, _n: u64) {}
    fn progress_end(&self) {}
    fn on_send_byte(&self, _b: u8) {}
    fn on_receive_byte(&self, _b: u8) {}
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullStatus;

impl StatusSink for NullStatus {}

/// Forwards status callbacks to the `log` facade.
#[derive(Debug, Default)]
pub struct LogStatus {
    total: AtomicU64,
    done: AtomicU64,
    /// Log every transferred byte at trace level.
    trace_bytes: bool,
}

impl LogStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_byte_trace(mut self, on: bool) -> Self {
        self.trace_bytes = on;
        self
    }

    pub fn done(&self) -> u64 {
        self.done.load(Ordering::Relaxed)
    }
}

impl StatusSink for LogStatus {
    fn message(&self, text: &str) {
        info!("{}", text);
    }

    fn progress_start(&self, total: u64) {
        self.total.store(total, Ordering::Relaxed);
        self.done.store(0, Ordering::Relaxed);
        debug!("progress: 0/{}", total);
    }

    fn progress_increment(&self, n: u64) {
        let done = self.done.fetch_add(n, Ordering::Relaxed) + n;
        let total = self.total.load(Ordering::Relaxed);
        if total > 0 {
            debug!("progress: {}/{} ({:.0}%)", done, total, done as f64 * 100.0 / total as f64);
        }
    }

    fn progress_end(&self) {
        debug!("progress: done ({} units)", self.done.load(Ordering::Relaxed));
    }

    fn on_send_byte(&self, b: u8) {
        if self.trace_bytes {
            log::trace!("tx {:02x}", b);
        }
    }

    fn on_receive_byte(&self, b: u8) {
        if self.trace_bytes {
            log::trace!("rx {:02x}", b);
        }
    }
}

/// Cooperative cancellation flag. Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Err(Interrupted) once cancelled.
    #[inline]
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(DeviceError::Interrupted)
        } else {
            Ok(())
        }
    }

    /// Sleep `d`, waking early with Err(Interrupted) if cancelled meanwhile.
    pub fn sleep(&self, d: Duration) -> Result<()> {
        const SLICE: Duration = Duration::from_millis(10);
        self.check()?;
        if d.is_zero() {
            return Ok(());
        }
        let deadline = Instant::now() + d;
        loop {
            let now = Instant::now();
            if now >= deadline {
                return Ok(());
            }
            std::thread::sleep((deadline - now).min(SLICE));
            self.check()?;
        }
    }
}
