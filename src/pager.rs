//! Page sources for the node layer.
//!
//! A pager hands out committed pages for reading and fresh buffers for
//! writing. Page 0 is always the file header, so a page id of 0 never names
//! a node.

use std::convert::TryFrom;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use memmap::Mmap;

use crate::compress::CODEC_LZ4;
use crate::constants::*;
use crate::enc;
use crate::errors::{Error, Result};
use crate::page::{checked_range, PageFlags, PageHeader, PageId};
use crate::settings::Settings;

/// A freshly allocated, zeroed run of `count` contiguous pages.
///
/// The header's id and overflow fields are filled in by the allocator.
#[derive(Debug)]
pub struct PageBuf {
    id: PageId,
    data: Vec<u8>,
}

impl PageBuf {
    fn new(id: PageId, count: usize, page_size: usize) -> PageBuf {
        let mut data = vec![0u8; count * page_size];
        PageHeader {
                id: id,
                flags: 0,
                count: 0,
                overflow: (count - 1) as u32,
            }
            .encode(&mut data);
        PageBuf { id: id, data: data }
    }

    pub fn id(&self) -> PageId {
        self.id
    }

    pub fn overflow(&self) -> u32 {
        enc::read_u32(&self.data, 12)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

/// What the node layer needs from the transaction's storage.
pub trait Pager {
    /// Size of one page in bytes.
    fn page_size(&self) -> usize;

    /// Read-only view of a committed page, overflow pages included.
    fn page(&self, id: PageId) -> Result<&[u8]>;

    /// Reserves `count` contiguous pages and returns a zeroed buffer for them.
    fn allocate(&mut self, count: usize) -> Result<PageBuf>;

    /// Hands a filled buffer back to the pager.
    fn write_page(&mut self, page: PageBuf) -> Result<()>;
}

// Slices the logical page `id` out of `region`, following its overflow count.
fn logical_page(region: &[u8], id: PageId, page_size: usize) -> Result<&[u8]> {
    // Page ids come straight off branch pages and may be garbage.
    let start = usize::try_from(id).ok().and_then(|i| i.checked_mul(page_size));
    let start = match start {
        Some(start) if id != 0 && checked_range(start, page_size, region.len()).is_some() => start,
        _ => return Err(Error::PageNotFound(id)),
    };
    let hdr = PageHeader::decode(&region[start..])?;
    if hdr.id != id {
        return Err(Error::corrupt(format!("page {} carries id {}", id, hdr.id)));
    }
    let range = (hdr.overflow as usize)
        .checked_add(1)
        .and_then(|count| count.checked_mul(page_size))
        .and_then(|len| checked_range(start, len, region.len()));
    match range {
        Some(range) => Ok(&region[range]),
        None => {
            Err(Error::corrupt(format!("page {} overflows {} pages past the end of the file",
                                       id,
                                       hdr.overflow)))
        }
    }
}

/// Pager backed by a plain byte vector. Written pages are readable right away.
#[derive(Debug)]
pub struct MemPager {
    page_size: usize,
    data: Vec<u8>,
    high_water: PageId,
}

impl MemPager {
    pub fn new(page_size: usize) -> MemPager {
        assert!(page_size >= MIN_SPLIT_PAGE_SIZE, "page size too small");
        MemPager {
            page_size: page_size,
            data: vec![0u8; page_size],
            high_water: 1,
        }
    }

    /// Number of pages handed out so far, the header page included.
    pub fn page_count(&self) -> PageId {
        self.high_water
    }
}

impl Pager for MemPager {
    fn page_size(&self) -> usize {
        self.page_size
    }

    fn page(&self, id: PageId) -> Result<&[u8]> {
        logical_page(&self.data, id, self.page_size)
    }

    fn allocate(&mut self, count: usize) -> Result<PageBuf> {
        let id = self.high_water;
        self.high_water += count as PageId;
        Ok(PageBuf::new(id, count, self.page_size))
    }

    fn write_page(&mut self, page: PageBuf) -> Result<()> {
        let start = page.id as usize * self.page_size;
        let end = start + page.data.len();
        if self.data.len() < end {
            self.data.resize(end, 0);
        }
        self.data[start..end].copy_from_slice(&page.data);
        Ok(())
    }
}

// File header stored in page 0 after a page header flagged META.
//
//    ---------------------------------------------------------------------
//   | page header (16) | magic (4) | version (4) | page size (4) | codec (4) |
//    ---------------------------------------------------------------------
const FILE_HEADER_SIZE: usize = PAGE_HEADER_SIZE + 16;

fn encode_file_header(buf: &mut [u8], page_size: usize) {
    PageHeader {
            id: 0,
            flags: PageFlags::META.bits(),
            count: 0,
            overflow: 0,
        }
        .encode(buf);
    enc::write_u32(buf, PAGE_HEADER_SIZE, MAGIC_KEY);
    enc::write_u32(buf, PAGE_HEADER_SIZE + 4, VERSION);
    enc::write_u32(buf, PAGE_HEADER_SIZE + 8, page_size as u32);
    enc::write_u32(buf, PAGE_HEADER_SIZE + 12, CODEC_LZ4 as u32);
}

// Validate that the given header is in the right format and return the
// page size it records.
fn decode_file_header(buf: &[u8]) -> Result<usize> {
    if buf.len() < FILE_HEADER_SIZE {
        return Err(Error::DatabaseInvalid);
    }
    let hdr = PageHeader::decode(buf)?;
    if hdr.page_flags() != PageFlags::META || enc::read_u32(buf, PAGE_HEADER_SIZE) != MAGIC_KEY {
        return Err(Error::DatabaseInvalid);
    }
    if enc::read_u32(buf, PAGE_HEADER_SIZE + 4) != VERSION ||
       enc::read_u32(buf, PAGE_HEADER_SIZE + 12) != CODEC_LZ4 as u32 {
        return Err(Error::DatabaseVersionMismatch);
    }
    let page_size = enc::read_u32(buf, PAGE_HEADER_SIZE + 8) as usize;
    if page_size < FILE_HEADER_SIZE.max(MIN_SPLIT_PAGE_SIZE) {
        return Err(Error::DatabaseInvalid);
    }
    Ok(page_size)
}

/// Pager over a single database file.
///
/// Committed pages are read through a read-only memory map. Pages written
/// through `write_page` are staged in memory and only become readable after
/// `commit`.
#[derive(Debug)]
pub struct MmapPager {
    path: PathBuf,
    file: File,
    // The physical file containing the committed pages
    data: Mmap,
    settings: Settings,
    page_size: usize,
    high_water: PageId,
    pending: Vec<PageBuf>,
}

impl MmapPager {
    /// Open a database file
    ///
    /// A new file will be created if none is found at the location and
    /// `auto_create` is set.
    pub fn open<P: AsRef<Path>>(path: P, settings: Settings) -> Result<MmapPager> {
        let path = path.as_ref();
        match (path.exists(), settings.auto_create) {
            (false, false) => return Err(Error::DatabaseNotFound),
            (false, true) => MmapPager::create(path, &settings)?,
            (true, _) => {}
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(!settings.read_only)
            .open(path)?;

        // Lock file so that other processes using the database in read-write mode cannot
        // use the database at the same time. This would cause corruption since
        // the two processes would write pages separately.
        if settings.read_only {
            FileExt::lock_shared(&file)?;
        } else {
            FileExt::lock_exclusive(&file)?;
        }

        let mut header = [0u8; FILE_HEADER_SIZE];
        file.read_exact(&mut header).map_err(|_| Error::DatabaseInvalid)?;
        let page_size = decode_file_header(&header)?;
        if page_size != settings.page_size {
            warn!("{}: file page size {} overrides configured {}",
                  path.display(),
                  page_size,
                  settings.page_size);
        }

        let len = file.metadata()?.len() as usize;
        if len % page_size != 0 {
            return Err(Error::DatabaseInvalid);
        }
        let data = unsafe { Mmap::map(&file)? };
        debug!("opened {} ({} pages of {} bytes, read_only={})",
               path.display(),
               len / page_size,
               page_size,
               settings.read_only);

        Ok(MmapPager {
            path: path.to_path_buf(),
            file: file,
            data: data,
            settings: settings,
            page_size: page_size,
            high_water: (len / page_size) as PageId,
            pending: Vec::new(),
        })
    }

    /// Create a new database file holding only the header page
    fn create(path: &Path, settings: &Settings) -> Result<()> {
        if settings.page_size < FILE_HEADER_SIZE.max(MIN_SPLIT_PAGE_SIZE) {
            return Err(Error::DatabaseInvalid);
        }
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;
        let mut page = vec![0u8; settings.page_size];
        encode_file_header(&mut page, settings.page_size);
        file.write_all(&page)?;
        file.sync_all()?;
        debug!("created {} with {} byte pages", path.display(), settings.page_size);
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Number of pages in the file plus any staged allocations.
    pub fn page_count(&self) -> PageId {
        self.high_water
    }

    /// Writes every staged page, syncs the file and remaps it.
    pub fn commit(&mut self) -> Result<()> {
        if self.settings.read_only {
            return Err(Error::ReadOnly);
        }
        let staged = self.pending.len();
        let mut pending = ::std::mem::replace(&mut self.pending, Vec::new());
        pending.sort_by_key(|p| p.id);
        for page in &pending {
            self.file.seek(SeekFrom::Start(page.id * self.page_size as u64))?;
            self.file.write_all(&page.data)?;
        }
        let len = self.high_water * self.page_size as u64;
        if self.file.metadata()?.len() < len {
            self.file.set_len(len)?;
        }
        self.file.sync_all()?;
        self.data = unsafe { Mmap::map(&self.file)? };
        debug!("committed {} staged pages to {}", staged, self.path.display());
        Ok(())
    }
}

impl Pager for MmapPager {
    fn page_size(&self) -> usize {
        self.page_size
    }

    fn page(&self, id: PageId) -> Result<&[u8]> {
        logical_page(&self.data, id, self.page_size)
    }

    fn allocate(&mut self, count: usize) -> Result<PageBuf> {
        if self.settings.read_only {
            return Err(Error::ReadOnly);
        }
        let id = self.high_water;
        self.high_water += count as PageId;
        Ok(PageBuf::new(id, count, self.page_size))
    }

    fn write_page(&mut self, page: PageBuf) -> Result<()> {
        if self.settings.read_only {
            return Err(Error::ReadOnly);
        }
        self.pending.push(page);
        Ok(())
    }
}
