//! Lightweight global metrics for divelink.
//!
//! Потокобезопасные атомарные счётчики для подсистем:
//! - Packet transport (send/ack/receive)
//! - Paged memory cache
//! - SLIP request/response sessions
//! - Dive log decoding

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

// ----- Packet transport -----
static PACKETS_SENT: AtomicU64 = AtomicU64::new(0);
static PACKETS_RECEIVED: AtomicU64 = AtomicU64::new(0);
static BYTES_SENT: AtomicU64 = AtomicU64::new(0);
static BYTES_RECEIVED: AtomicU64 = AtomicU64::new(0);
static SEND_RETRIES: AtomicU64 = AtomicU64::new(0);
static CHECKSUM_FAILURES: AtomicU64 = AtomicU64::new(0);
static TIMEOUTS: AtomicU64 = AtomicU64::new(0);

// ----- Paged cache -----
static PAGE_FETCHES: AtomicU64 = AtomicU64::new(0);
static PAGE_CACHE_HITS: AtomicU64 = AtomicU64::new(0);
static PAGE_CACHE_MISSES: AtomicU64 = AtomicU64::new(0);

// ----- Sessions -----
static SLIP_FRAMES_DECODED: AtomicU64 = AtomicU64::new(0);
static SESSION_EXCHANGES: AtomicU64 = AtomicU64::new(0);
static NEGATIVE_RESPONSES: AtomicU64 = AtomicU64::new(0);

// ----- Decoder -----
static DIVES_DECODED: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Default, Serialize)]
pub struct MetricsSnapshot {
    // Packet transport
    pub packets_sent: u64,
    pub packets_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub send_retries: u64,
    pub checksum_failures: u64,
    pub timeouts: u64,

    // Paged cache
    pub page_fetches: u64,
    pub page_cache_hits: u64,
    pub page_cache_misses: u64,

    // Sessions
    pub slip_frames_decoded: u64,
    pub session_exchanges: u64,
    pub negative_responses: u64,

    // Decoder
    pub dives_decoded: u64,
}

impl MetricsSnapshot {
    pub fn cache_hit_ratio(&self) -> f64 {
        let total = self.page_cache_hits + self.page_cache_misses;
        if total == 0 {
            0.0
        } else {
            self.page_cache_hits as f64 / total as f64
        }
    }

    /// Share of sent packets that needed at least one more attempt.
    pub fn retry_ratio(&self) -> f64 {
        if self.packets_sent == 0 {
            0.0
        } else {
            self.send_retries as f64 / self.packets_sent as f64
        }
    }
}

// ----- Recorders (transport) -----
pub fn record_packet_sent(bytes: usize) {
    PACKETS_SENT.fetch_add(1, Ordering::Relaxed);
    BYTES_SENT.fetch_add(bytes as u64, Ordering::Relaxed);
}

pub fn record_packet_received(bytes: usize) {
    PACKETS_RECEIVED.fetch_add(1, Ordering::Relaxed);
    BYTES_RECEIVED.fetch_add(bytes as u64, Ordering::Relaxed);
}

pub fn record_send_retry() {
    SEND_RETRIES.fetch_add(1, Ordering::Relaxed);
}

pub fn record_checksum_failure() {
    CHECKSUM_FAILURES.fetch_add(1, Ordering::Relaxed);
}

pub fn record_timeout() {
    TIMEOUTS.fetch_add(1, Ordering::Relaxed);
}

// ----- Recorders (cache) -----
pub fn record_page_fetch() {
    PAGE_FETCHES.fetch_add(1, Ordering::Relaxed);
}
pub fn record_cache_hit() {
    PAGE_CACHE_HITS.fetch_add(1, Ordering::Relaxed);
}
pub fn record_cache_miss() {
    PAGE_CACHE_MISSES.fetch_add(1, Ordering::Relaxed);
}

// ----- Recorders (sessions) -----
pub fn record_slip_frame() {
    SLIP_FRAMES_DECODED.fetch_add(1, Ordering::Relaxed);
}

pub fn record_exchange() {
    SESSION_EXCHANGES.fetch_add(1, Ordering::Relaxed);
}

pub fn record_negative_response() {
    NEGATIVE_RESPONSES.fetch_add(1, Ordering::Relaxed);
}

// ----- Recorders (decoder) -----
pub fn record_dives_decoded(n: usize) {
    DIVES_DECODED.fetch_add(n as u64, Ordering::Relaxed);
}

// ----- Snapshot / Reset -----
pub fn snapshot() -> MetricsSnapshot {
    MetricsSnapshot {
        packets_sent: PACKETS_SENT.load(Ordering::Relaxed),
        packets_received: PACKETS_RECEIVED.load(Ordering::Relaxed),
        bytes_sent: BYTES_SENT.load(Ordering::Relaxed),
        bytes_received: BYTES_RECEIVED.load(Ordering::Relaxed),
        send_retries: SEND_RETRIES.load(Ordering::Relaxed),
        checksum_failures: CHECKSUM_FAILURES.load(Ordering::Relaxed),
        timeouts: TIMEOUTS.load(Ordering::Relaxed),

        page_fetches: PAGE_FETCHES.load(Ordering::Relaxed),
        page_cache_hits: PAGE_CACHE_HITS.load(Ordering::Relaxed),
        page_cache_misses: PAGE_CACHE_MISSES.load(Ordering::Relaxed),

        slip_frames_decoded: SLIP_FRAMES_DECODED.load(Ordering::Relaxed),
        session_exchanges: SESSION_EXCHANGES.load(Ordering::Relaxed),
        negative_responses: NEGATIVE_RESPONSES.load(Ordering::Relaxed),

        dives_decoded: DIVES_DECODED.load(Ordering::Relaxed),
    }
}

pub fn reset() {
    PACKETS_SENT.store(0, Ordering::Relaxed);
    PACKETS_RECEIVED.store(0, Ordering::Relaxed);
    BYTES_SENT.store(0, Ordering::Relaxed);
    BYTES_RECEIVED.store(0, Ordering::Relaxed);
    SEND_RETRIES.store(0, Ordering::Relaxed);
    CHECKSUM_FAILURES.store(0, Ordering::Relaxed);
    TIMEOUTS.store(0, Ordering::Relaxed);

    PAGE_FETCHES.store(0, Ordering::Relaxed);
    PAGE_CACHE_HITS.store(0, Ordering::Relaxed);
    PAGE_CACHE_MISSES.store(0, Ordering::Relaxed);

    SLIP_FRAMES_DECODED.store(0, Ordering::Relaxed);
    SESSION_EXCHANGES.store(0, Ordering::Relaxed);
    NEGATIVE_RESPONSES.store(0, Ordering::Relaxed);

    DIVES_DECODED.store(0, Ordering::Relaxed);
}
