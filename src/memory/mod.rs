//! memory — device memory addressed through fixed-size page reads.
//!
//! Подмодули:
//! - cache.rs — `PagedMemoryCache`: (address, count) reads composed from cached pages,
//!   save/load of the full image.
//!
//! `MemoryLayout` carries the protocol constants (memory size, page size, wrap
//! target). Page size need not be a power of two; the last page may be short.
//!
//! Wraparound: reading past the end of memory continues at `wrap_start`, not at 0.
//! The region below `wrap_start` is a fixed header that never takes part in the
//! circular profile area.

pub mod cache;

use std::path::Path;

use crate::error::{DeviceError, Result};

pub use cache::PagedMemoryCache;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryLayout {
    pub memory_size: u32,
    pub page_size: u32,
    pub wrap_start: u32,
}

impl MemoryLayout {
    pub fn new(memory_size: u32, page_size: u32, wrap_start: u32) -> Result<Self> {
        if page_size == 0 || memory_size == 0 || wrap_start >= memory_size {
            return Err(DeviceError::InvalidConfiguration(format!(
                "memory layout size={:#x} page={:#x} wrap={:#x}",
                memory_size, page_size, wrap_start
            )));
        }
        Ok(Self {
            memory_size,
            page_size,
            wrap_start,
        })
    }

    pub fn page_count(&self) -> u32 {
        (self.memory_size + self.page_size - 1) / self.page_size
    }

    /// (start address, length) of a page; the last page is clipped to memory size.
    pub fn page_span(&self, page: u32) -> (u32, u32) {
        let start = page * self.page_size;
        let len = self.page_size.min(self.memory_size.saturating_sub(start));
        (start, len)
    }

    pub fn page_of(&self, address: u32) -> u32 {
        address / self.page_size
    }

    /// Map any address into [0, memory_size) using the header-relative wrap rule.
    pub fn normalize(&self, address: u32) -> u32 {
        if address < self.memory_size {
            address
        } else {
            let ring = self.memory_size - self.wrap_start;
            self.wrap_start + (address - self.memory_size) % ring
        }
    }
}

/// Something that can produce one page of device memory.
pub trait PageSource {
    fn fetch_page(&mut self, layout: &MemoryLayout, page: u32) -> Result<Vec<u8>>;
}

/// A saved memory image used in place of a live device.
#[derive(Debug, Clone)]
pub struct MemoryImage {
    bytes: Vec<u8>,
}

impl MemoryImage {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Load a raw dump; its size must equal the full addressable memory.
    pub fn open(path: &Path, layout: &MemoryLayout) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        if bytes.len() != layout.memory_size as usize {
            return Err(DeviceError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!(
                    "image {} has {} bytes, memory is {}",
                    path.display(),
                    bytes.len(),
                    layout.memory_size
                ),
            )));
        }
        Ok(Self { bytes })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl PageSource for MemoryImage {
    fn fetch_page(&mut self, layout: &MemoryLayout, page: u32) -> Result<Vec<u8>> {
        let (start, len) = layout.page_span(page);
        let (start, end) = (start as usize, (start + len) as usize);
        if end > self.bytes.len() {
            return Err(DeviceError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("page {} beyond image end", page),
            )));
        }
        Ok(self.bytes[start..end].to_vec())
    }
}
