//! In-memory block device.
//!
//! Used for testing and scratch filesystems. All data is lost when dropped.

use std::io;

use super::{BlockDevice, ERASED, byte_offset};
use crate::geometry::Geometry;

/// Block device backed by a byte vector.
#[derive(Debug, Clone)]
pub struct MemoryDevice {
    block_size: u32,
    memory: Vec<u8>,
}

impl Default for MemoryDevice {
    fn default() -> Self {
        Self::from_geometry(&Geometry::default())
    }
}

impl MemoryDevice {
    /// Create a device of `block_count` erased blocks.
    pub fn new(block_size: u32, block_count: u32) -> Self {
        let len = block_size as usize * block_count as usize;
        Self {
            block_size,
            memory: vec![ERASED; len],
        }
    }

    /// Create a device exactly as large as `geometry` addresses.
    pub fn from_geometry(geometry: &Geometry) -> Self {
        Self::new(geometry.block_size, geometry.block_count)
    }

    /// Raw device contents.
    pub fn as_bytes(&self) -> &[u8] {
        &self.memory
    }

    fn span(&self, block: u32, offset: u32, len: usize) -> io::Result<std::ops::Range<usize>> {
        let start = byte_offset(self.block_size, block, offset, len, self.memory.len() as u64)?;
        let start = start as usize;
        Ok(start..start + len)
    }
}

impl BlockDevice for MemoryDevice {
    fn read_block(&mut self, block: u32, offset: u32, buf: &mut [u8]) -> io::Result<()> {
        let span = self.span(block, offset, buf.len())?;
        buf.copy_from_slice(&self.memory[span]);
        Ok(())
    }

    fn program_block(&mut self, block: u32, offset: u32, buf: &[u8]) -> io::Result<()> {
        let span = self.span(block, offset, buf.len())?;
        self.memory[span].copy_from_slice(buf);
        Ok(())
    }

    fn erase_block(&mut self, block: u32) -> io::Result<()> {
        let span = self.span(block, 0, self.block_size as usize)?;
        self.memory[span].fill(ERASED);
        Ok(())
    }

    fn sync(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn capacity(&self) -> Option<u64> {
        Some(self.memory.len() as u64)
    }
}
