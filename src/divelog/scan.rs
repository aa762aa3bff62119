//! divelog/scan — dive boundary scan over the circular data region.
//!
//! Walk:
//! - cursor starts at 0 and moves in row strides (32 B); opening/closing blocks
//!   are consumed whole (128 B);
//! - the data region is circular: reads and the cursor wrap at `data_end`;
//! - the walk ends once the cursor has gone all the way around from the first
//!   opening block, or immediately after one full lap without finding any.
//!
//! Block test: fixed 2-byte marker at +0, and none of the bytes at
//! +0x20/+0x40/+0x60 equal to the erased-flash sentinel.

use log::{debug, warn};
use serde::Serialize;

use super::footer::DiveLogFooter;
use super::header::DiveLogHeader;
use super::record::DiveLogRecord;
use super::DiveLogVersion;
use crate::consts::{
    LOG_BLOCK_LEN, LOG_CLOSING_MARKER, LOG_OPENING_MARKER, LOG_ROW_LEN, LOG_SAMPLE_INTERVAL_SECS,
    LOG_SENTINEL, LOG_SENTINEL_OFFSETS,
};

/// One dive as stored in the image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiveLog {
    /// Offset of the opening block inside the image.
    pub offset: usize,
    pub header: DiveLogHeader,
    pub records: Vec<DiveLogRecord>,
    pub footer: DiveLogFooter,
}

struct OpenDive {
    offset: usize,
    header: DiveLogHeader,
    records: Vec<DiveLogRecord>,
}

/// Copy `len` bytes at `start`, wrapping at `end`.
pub(crate) fn read_wrapped(buf: &[u8], start: usize, len: usize, end: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(len);
    let mut pos = start % end;
    while out.len() < len {
        let take = (len - out.len()).min(end - pos);
        out.extend_from_slice(&buf[pos..pos + take]);
        pos = (pos + take) % end;
    }
    out
}

#[inline]
fn is_block(block: &[u8], marker: [u8; 2]) -> bool {
    block[..2] == marker && LOG_SENTINEL_OFFSETS.iter().all(|&p| block[p] != LOG_SENTINEL)
}

#[inline]
fn is_sample_row(row: &[u8]) -> bool {
    !row.iter().all(|&b| b == LOG_SENTINEL) && !row.iter().all(|&b| b == 0)
}

/// Scan `buf` (already size-checked) for dives. Order is scan order.
pub fn scan(buf: &[u8], version: DiveLogVersion) -> Vec<DiveLog> {
    let end = version.data_end().min(buf.len());
    let mut out = Vec::new();
    let mut open: Option<OpenDive> = None;
    let mut first_open: Option<usize> = None;

    let mut cursor = 0usize;
    let mut walked = 0usize;

    while walked < end {
        let block = read_wrapped(buf, cursor, LOG_BLOCK_LEN, end);

        let step = if is_block(&block, LOG_OPENING_MARKER) {
            if first_open.is_none() {
                debug!("first opening block at {:#07x}", cursor);
                first_open = Some(cursor);
                walked = 0;
            }
            if let Some(prev) = open.take() {
                warn!(
                    "dive #{} at {:#07x} has no closing block, dropped",
                    prev.header.number, prev.offset
                );
            }
            open = Some(OpenDive {
                offset: cursor,
                header: DiveLogHeader::decode(&block, version),
                records: Vec::new(),
            });
            LOG_BLOCK_LEN
        } else if is_block(&block, LOG_CLOSING_MARKER) {
            let number = DiveLogFooter::peek_number(&block);
            match open.take() {
                Some(d) if d.header.number == number => {
                    let footer =
                        DiveLogFooter::decode(&block, version, d.header.settings.imperial);
                    debug!(
                        "dive #{} at {:#07x}: {} samples",
                        number,
                        d.offset,
                        d.records.len()
                    );
                    out.push(DiveLog {
                        offset: d.offset,
                        header: d.header,
                        records: d.records,
                        footer,
                    });
                }
                Some(d) => warn!(
                    "closing block #{} does not match open dive #{}, dropped",
                    number, d.header.number
                ),
                None => debug!("closing block #{} without opening at {:#07x}", number, cursor),
            }
            LOG_BLOCK_LEN
        } else {
            if let Some(d) = open.as_mut() {
                let row = &block[..LOG_ROW_LEN];
                if is_sample_row(row) {
                    let t = d.records.len() as u32 * LOG_SAMPLE_INTERVAL_SECS;
                    d.records.push(DiveLogRecord::decode(
                        row,
                        version,
                        d.header.settings.imperial,
                        t,
                    ));
                }
            }
            LOG_ROW_LEN
        };

        cursor = (cursor + step) % end;
        walked += step;
    }

    if first_open.is_none() {
        debug!("no opening block in {:#x} bytes", end);
    }
    if let Some(d) = open {
        warn!("dive #{} at {:#07x} still open at end of scan", d.header.number, d.offset);
    }
    out
}
