use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::Path;

use thiserror::Error;
use tracing::{debug, error, info};

use crate::constants::*;

pub struct Page {
    pub buffer: [u8; PAGE_SIZE],
}

impl Page {
    fn zeroed() -> Box<Self> {
        Box::new(Page {
            buffer: [0u8; PAGE_SIZE],
        })
    }
}

#[derive(Debug, Error)]
pub enum PagerError {
    #[error("database file I/O failed: {0}")]
    File(#[from] std::io::Error),
    #[error("tried to fetch page number out of bounds: {page_num} >= {max}")]
    OutOfBounds { page_num: u32, max: usize },
    #[error("tried to flush null page {0}")]
    FlushNullPage(u32),
}

/// Owns the database file and the in-memory copy of every page touched so far.
///
/// A page number maps to at most one cached buffer; every caller of
/// [`Pager::get_page`] sees the same bytes until the pager is closed.
pub struct Pager {
    file: File,
    file_length: u64,
    num_pages: u32,
    pages: HashMap<u32, Box<Page>>,
}

impl Pager {
    pub fn open<P>(filename: P) -> Result<Self, PagerError>
    where
        P: AsRef<Path>,
    {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(filename.as_ref())?;
        let file_length = file.seek(SeekFrom::End(0))?;

        // We might save a partial page at the end of the file
        let num_pages = ((file_length + PAGE_SIZE as u64 - 1) / PAGE_SIZE as u64) as u32;

        info!(
            path = %filename.as_ref().display(),
            file_length,
            num_pages,
            "opened database file"
        );

        Ok(Pager {
            file,
            file_length,
            num_pages,
            pages: HashMap::new(),
        })
    }

    pub fn file_length(&self) -> u64 {
        self.file_length
    }

    /// Pages that exist on disk or have been handed out since open.
    pub fn num_pages(&self) -> u32 {
        self.num_pages
    }

    pub fn get_page(&mut self, page_num: u32) -> Result<&mut Page, PagerError> {
        if page_num as usize >= MAX_PAGES {
            return Err(PagerError::OutOfBounds {
                page_num,
                max: MAX_PAGES,
            });
        }

        match self.pages.entry(page_num) {
            Entry::Occupied(o) => Ok(o.into_mut().as_mut()),
            Entry::Vacant(v) => {
                let mut page = Page::zeroed();

                // a page past the end of the file has never been written, so it stays zeroed
                if page_num < self.num_pages {
                    debug!(page_num, "cache miss, reading page from disk");
                    self.file
                        .seek(SeekFrom::Start(page_num as u64 * PAGE_SIZE as u64))?;
                    read_until_eof(&mut self.file, &mut page.buffer)?;
                } else {
                    debug!(page_num, "cache miss, allocating fresh page");
                    self.num_pages = page_num + 1;
                }

                Ok(v.insert(page).as_mut())
            }
        }
    }

    /// Writes the first `size` bytes of a cached page back to its slot in the file.
    pub fn flush(&mut self, page_num: u32, size: usize) -> Result<(), PagerError> {
        let page = self
            .pages
            .get(&page_num)
            .ok_or(PagerError::FlushNullPage(page_num))?;
        let size = size.min(PAGE_SIZE);

        self.file
            .seek(SeekFrom::Start(page_num as u64 * PAGE_SIZE as u64))?;
        self.file.write_all(&page.buffer[..size])?;

        let end = page_num as u64 * PAGE_SIZE as u64 + size as u64;
        self.file_length = self.file_length.max(end);
        debug!(page_num, size, "flushed page");
        Ok(())
    }

    /// Flushes every cached page in full and releases the file.
    pub fn close(mut self) -> Result<(), PagerError> {
        self.flush_all()?;
        self.pages.clear();
        self.file.sync_all()?;
        info!(file_length = self.file_length, "closed database file");
        Ok(())
    }

    /// Releases the file without writing anything back. Cached changes are lost.
    pub fn discard(mut self) {
        debug!(cached = self.pages.len(), "discarding cached pages");
        self.pages.clear();
    }

    fn flush_all(&mut self) -> Result<(), PagerError> {
        let mut cached: Vec<u32> = self.pages.keys().copied().collect();
        cached.sort_unstable();
        for page_num in cached {
            self.flush(page_num, PAGE_SIZE)?;
        }
        Ok(())
    }
}

impl Drop for Pager {
    fn drop(&mut self) {
        // close() empties the cache, so this only fires for a pager that was never closed
        if self.pages.is_empty() {
            return;
        }
        if let Err(e) = self.flush_all() {
            error!(error = %e, "dropping pager failed to flush pages to disk");
        }
    }
}

// Unlike read_exact, leaves the tail of the buffer untouched when the file ends early.
fn read_until_eof(file: &mut File, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match file.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
