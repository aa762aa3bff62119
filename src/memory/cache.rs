//! Session page cache over a `PageSource`.
//!
//! Design:
//! - HashMap<page_number, bytes>; a page is fetched at most once per session and is
//!   immutable afterwards (device memory does not change during a download).
//! - read(address, count) walks the touched pages, copying sub-ranges; crossing the
//!   end of memory continues at `layout.wrap_start`.
//! - save_to_file writes the full image, zero-filling pages never fetched;
//!   load_from_file primes every page from such an image.
//!
//! Notes:
//! - No eviction: the whole device memory is small and the cache lives for one session.
//! - Hit/miss counters go to `metrics`.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::Path;

use log::{debug, trace};

use super::{MemoryLayout, PageSource};
use crate::error::{DeviceError, Result};
use crate::metrics::{record_cache_hit, record_cache_miss, record_page_fetch};

pub struct PagedMemoryCache<S: PageSource> {
    layout: MemoryLayout,
    source: S,
    pages: HashMap<u32, Vec<u8>>,
}

impl<S: PageSource> PagedMemoryCache<S> {
    pub fn new(layout: MemoryLayout, source: S) -> Self {
        Self {
            layout,
            source,
            pages: HashMap::with_capacity(layout.page_count() as usize),
        }
    }

    pub fn layout(&self) -> &MemoryLayout {
        &self.layout
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn into_source(self) -> S {
        self.source
    }

    pub fn is_cached(&self, page: u32) -> bool {
        self.pages.contains_key(&page)
    }

    pub fn cached_pages(&self) -> usize {
        self.pages.len()
    }

    /// Cached page bytes, fetching on first touch.
    fn page(&mut self, page: u32) -> Result<&[u8]> {
        let slot = match self.pages.entry(page) {
            Entry::Occupied(e) => {
                record_cache_hit();
                return Ok(e.into_mut().as_slice());
            }
            Entry::Vacant(e) => e,
        };

        record_cache_miss();
        let (start, len) = self.layout.page_span(page);
        trace!("fetch page {} ({:#06x}+{:#x})", page, start, len);
        let data = self.source.fetch_page(&self.layout, page)?;
        record_page_fetch();
        if data.len() != len as usize {
            return Err(DeviceError::UnsupportedDeviceResponse(format!(
                "page {} returned {} bytes, expected {}",
                page,
                data.len(),
                len
            )));
        }
        Ok(slot.insert(data).as_slice())
    }

    /// Exactly `count` bytes starting at `address`, wrapping past the end of memory.
    pub fn read(&mut self, address: u32, count: u32) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(count as usize);
        let mut addr = self.layout.normalize(address);
        let mut remaining = count as usize;

        while remaining > 0 {
            let page = self.layout.page_of(addr);
            let (start, len) = self.layout.page_span(page);
            let off = (addr - start) as usize;
            let take = (len as usize - off).min(remaining);

            let bytes = self.page(page)?;
            out.extend_from_slice(&bytes[off..off + take]);

            remaining -= take;
            addr += take as u32;
            if addr >= self.layout.memory_size {
                addr = self.layout.wrap_start;
            }
        }
        Ok(out)
    }

    /// Fetch every page (full dump).
    pub fn read_all(&mut self) -> Result<Vec<u8>> {
        for page in 0..self.layout.page_count() {
            self.page(page)?;
        }
        Ok(self.image())
    }

    /// Current image; pages not fetched yet are zero.
    pub fn image(&self) -> Vec<u8> {
        let mut img = vec![0u8; self.layout.memory_size as usize];
        for (&page, data) in &self.pages {
            let (start, _) = self.layout.page_span(page);
            let start = start as usize;
            img[start..start + data.len()].copy_from_slice(data);
        }
        img
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let img = self.image();
        std::fs::write(path, &img)?;
        debug!(
            "saved memory image {} ({} bytes, {} pages cached)",
            path.display(),
            img.len(),
            self.pages.len()
        );
        Ok(())
    }

    /// Prime every page from a saved image; later reads never hit the source.
    pub fn load_from_file(&mut self, path: &Path) -> Result<()> {
        let img = std::fs::read(path)?;
        if img.len() != self.layout.memory_size as usize {
            return Err(DeviceError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!(
                    "image {} has {} bytes, memory is {}",
                    path.display(),
                    img.len(),
                    self.layout.memory_size
                ),
            )));
        }
        for page in 0..self.layout.page_count() {
            let (start, len) = self.layout.page_span(page);
            let (start, end) = (start as usize, (start + len) as usize);
            self.pages.insert(page, img[start..end].to_vec());
        }
        debug!("loaded memory image {} ({} pages)", path.display(), self.pages.len());
        Ok(())
    }
}
