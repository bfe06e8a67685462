//! NOR flash block device.
//!
//! SPI NOR chips read at any address, program in pages and erase in
//! sectors. [`FlashDevice`] maps engine blocks onto whole sectors, and can
//! start at a block offset so the filesystem occupies one partition of a
//! larger chip.

use std::io;

use super::{BlockDevice, ERASED};

/// A page/sector addressed NOR flash chip.
pub trait NorFlash {
    /// Largest program unit; a program must not cross a page boundary.
    fn page_size(&self) -> u32;

    /// Smallest erase unit.
    fn sector_size(&self) -> u32;

    /// Chip size in bytes.
    fn size(&self) -> u64;

    /// Read `buf.len()` bytes starting at `addr`.
    fn read(&mut self, addr: u32, buf: &mut [u8]) -> io::Result<()>;

    /// Program `data` at `addr`, within a single page.
    fn program_page(&mut self, addr: u32, data: &[u8]) -> io::Result<()>;

    /// Erase the sector starting at `addr`.
    fn erase_sector(&mut self, addr: u32) -> io::Result<()>;
}

/// Block device over a NOR flash chip.
#[derive(Debug)]
pub struct FlashDevice<F> {
    flash: F,
    block_size: u32,
    block_offset: u32,
}

impl<F: NorFlash> FlashDevice<F> {
    /// Wrap a chip using blocks of `block_size` bytes.
    ///
    /// `block_size` must be a whole number of sectors.
    pub fn new(flash: F, block_size: u32) -> io::Result<Self> {
        let sector = flash.sector_size();
        if sector == 0 || block_size == 0 || block_size % sector != 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("block size {block_size} is not a multiple of sector size {sector}"),
            ));
        }
        Ok(Self {
            flash,
            block_size,
            block_offset: 0,
        })
    }

    /// Start logical block 0 at physical block `block_offset`.
    pub fn with_block_offset(mut self, block_offset: u32) -> Self {
        self.block_offset = block_offset;
        self
    }

    /// Get the underlying chip.
    pub fn flash(&self) -> &F {
        &self.flash
    }

    pub fn into_inner(self) -> F {
        self.flash
    }

    /// Blocks available after the partition offset.
    pub fn block_count(&self) -> u32 {
        let total = self.flash.size() / u64::from(self.block_size);
        total.saturating_sub(u64::from(self.block_offset)) as u32
    }

    fn address(&self, block: u32, offset: u32, len: usize) -> io::Result<u32> {
        if block >= self.block_count() || u64::from(offset) + len as u64 > u64::from(self.block_size) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("block {block} offset {offset} len {len} is outside the partition"),
            ));
        }
        let physical = u64::from(block + self.block_offset) * u64::from(self.block_size);
        u32::try_from(physical + u64::from(offset))
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "address exceeds 32 bits"))
    }
}

impl<F: NorFlash> BlockDevice for FlashDevice<F> {
    fn read_block(&mut self, block: u32, offset: u32, buf: &mut [u8]) -> io::Result<()> {
        let addr = self.address(block, offset, buf.len())?;
        self.flash.read(addr, buf)
    }

    fn program_block(&mut self, block: u32, offset: u32, buf: &[u8]) -> io::Result<()> {
        let mut addr = self.address(block, offset, buf.len())?;
        let page = self.flash.page_size().max(1);
        let mut rest = buf;
        while !rest.is_empty() {
            let room = (page - addr % page) as usize;
            let (chunk, tail) = rest.split_at(room.min(rest.len()));
            self.flash.program_page(addr, chunk)?;
            addr += chunk.len() as u32;
            rest = tail;
        }
        Ok(())
    }

    fn erase_block(&mut self, block: u32) -> io::Result<()> {
        let start = self.address(block, 0, 0)?;
        let sector = self.flash.sector_size();
        for i in 0..self.block_size / sector {
            self.flash.erase_sector(start + i * sector)?;
        }
        Ok(())
    }

    fn sync(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn capacity(&self) -> Option<u64> {
        Some(u64::from(self.block_count()) * u64::from(self.block_size))
    }
}

/// NOR flash simulated in memory.
///
/// Programming can only clear bits and must stay within one page; erasing
/// sets a whole sector back to `0xff`. Erases are counted per sector.
#[derive(Debug, Clone)]
pub struct RamNorFlash {
    data: Vec<u8>,
    page_size: u32,
    sector_size: u32,
    erase_counts: Vec<u32>,
}

impl RamNorFlash {
    pub fn new(page_size: u32, sector_size: u32, sector_count: u32) -> Self {
        Self {
            data: vec![ERASED; sector_size as usize * sector_count as usize],
            page_size,
            sector_size,
            erase_counts: vec![0; sector_count as usize],
        }
    }

    /// Times the sector at `index` has been erased.
    pub fn erase_count(&self, index: u32) -> u32 {
        self.erase_counts.get(index as usize).copied().unwrap_or(0)
    }

    /// Total erases across the chip.
    pub fn total_erases(&self) -> u64 {
        self.erase_counts.iter().map(|n| u64::from(*n)).sum()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    fn range(&self, addr: u32, len: usize) -> io::Result<std::ops::Range<usize>> {
        let start = addr as usize;
        let end = start + len;
        if end > self.data.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("address {addr:#x} len {len} is past the end of flash"),
            ));
        }
        Ok(start..end)
    }
}

impl NorFlash for RamNorFlash {
    fn page_size(&self) -> u32 {
        self.page_size
    }

    fn sector_size(&self) -> u32 {
        self.sector_size
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn read(&mut self, addr: u32, buf: &mut [u8]) -> io::Result<()> {
        let range = self.range(addr, buf.len())?;
        buf.copy_from_slice(&self.data[range]);
        Ok(())
    }

    fn program_page(&mut self, addr: u32, data: &[u8]) -> io::Result<()> {
        let page_start = addr / self.page_size;
        let page_end = (addr + data.len().saturating_sub(1) as u32) / self.page_size;
        if page_start != page_end {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("program at {addr:#x} len {} crosses a page", data.len()),
            ));
        }
        let range = self.range(addr, data.len())?;
        for (cell, byte) in self.data[range].iter_mut().zip(data) {
            *cell &= *byte;
        }
        Ok(())
    }

    fn erase_sector(&mut self, addr: u32) -> io::Result<()> {
        if addr % self.sector_size != 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("erase at {addr:#x} is not sector aligned"),
            ));
        }
        let range = self.range(addr, self.sector_size as usize)?;
        self.data[range].fill(ERASED);
        self.erase_counts[(addr / self.sector_size) as usize] += 1;
        Ok(())
    }
}
