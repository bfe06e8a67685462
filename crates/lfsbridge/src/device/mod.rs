//! Block devices.
//!
//! [`BlockDevice`] is the contract every storage backend implements. The
//! engine reaches it only through the callback bridge, one call at a time.
//!
//! Backends:
//!
//! - [`MemoryDevice`] - byte vector in process memory
//! - [`FileDevice`] - image file on the host filesystem
//! - [`FlashDevice`] - page/sector addressed NOR flash, optionally partitioned
//! - [`TracedDevice`] - logs every call made on another device

mod file;
mod flash;
mod memory;
mod traced;

pub use file::FileDevice;
pub use flash::{FlashDevice, NorFlash, RamNorFlash};
pub use memory::MemoryDevice;
pub use traced::TracedDevice;

use std::io;

/// Value of an erased byte.
pub const ERASED: u8 = 0xff;

/// Storage addressed in fixed-size erase/program units.
///
/// Every method either succeeds or fails with an I/O fault. The engine
/// never sees the detail of a failure; it is logged and reported as
/// [`Error::Io`](crate::Error::Io). No retries happen above this trait.
pub trait BlockDevice {
    /// Copy exactly `buf.len()` bytes from `block * block_size + offset`.
    ///
    /// The caller guarantees `offset + buf.len() <= block_size`.
    fn read_block(&mut self, block: u32, offset: u32, buf: &mut [u8]) -> io::Result<()>;

    /// Write `buf` at `offset` inside `block`.
    ///
    /// The region must have been erased since it was last programmed; this
    /// is not checked here.
    fn program_block(&mut self, block: u32, offset: u32, buf: &[u8]) -> io::Result<()>;

    /// Reset the whole block to its blank state (all bits set).
    fn erase_block(&mut self, block: u32) -> io::Result<()>;

    /// Flush buffered writes; returns once they are durable.
    fn sync(&mut self) -> io::Result<()>;

    /// Size of the device in bytes, if known.
    fn capacity(&self) -> Option<u64> {
        None
    }
}

impl<D: BlockDevice + ?Sized> BlockDevice for Box<D> {
    fn read_block(&mut self, block: u32, offset: u32, buf: &mut [u8]) -> io::Result<()> {
        (**self).read_block(block, offset, buf)
    }

    fn program_block(&mut self, block: u32, offset: u32, buf: &[u8]) -> io::Result<()> {
        (**self).program_block(block, offset, buf)
    }

    fn erase_block(&mut self, block: u32) -> io::Result<()> {
        (**self).erase_block(block)
    }

    fn sync(&mut self) -> io::Result<()> {
        (**self).sync()
    }

    fn capacity(&self) -> Option<u64> {
        (**self).capacity()
    }
}

impl<D: BlockDevice + ?Sized> BlockDevice for &mut D {
    fn read_block(&mut self, block: u32, offset: u32, buf: &mut [u8]) -> io::Result<()> {
        (**self).read_block(block, offset, buf)
    }

    fn program_block(&mut self, block: u32, offset: u32, buf: &[u8]) -> io::Result<()> {
        (**self).program_block(block, offset, buf)
    }

    fn erase_block(&mut self, block: u32) -> io::Result<()> {
        (**self).erase_block(block)
    }

    fn sync(&mut self) -> io::Result<()> {
        (**self).sync()
    }

    fn capacity(&self) -> Option<u64> {
        (**self).capacity()
    }
}

/// Byte offset of `offset` inside `block`, checked against the device end.
pub(crate) fn byte_offset(
    block_size: u32,
    block: u32,
    offset: u32,
    len: usize,
    capacity: u64,
) -> io::Result<u64> {
    let start = u64::from(block) * u64::from(block_size) + u64::from(offset);
    let end = start + len as u64;
    if u64::from(offset) + len as u64 > u64::from(block_size) || end > capacity {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("block {block} offset {offset} len {len} is outside the device"),
        ));
    }
    Ok(start)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_offset() {
        assert_eq!(byte_offset(512, 2, 16, 32, 4096).unwrap(), 1040);
        assert!(byte_offset(512, 7, 0, 512, 4096).is_ok());
        assert!(byte_offset(512, 8, 0, 1, 4096).is_err());
        assert!(byte_offset(512, 0, 500, 16, 4096).is_err());
    }

    #[test]
    fn test_boxed_device() {
        let mut dev: Box<dyn BlockDevice> = Box::new(MemoryDevice::new(512, 4));
        dev.program_block(1, 0, b"abc").unwrap();
        let mut buf = [0u8; 4];
        dev.read_block(1, 0, &mut buf).unwrap();
        assert_eq!(&buf, b"abc\xff");
        assert_eq!(dev.capacity(), Some(2048));
    }
}
