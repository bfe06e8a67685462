//! Block device geometry handed to the engine.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Block device geometry and engine tuning.
///
/// Copied into the native configuration when a
/// [`Filesystem`](crate::Filesystem) is created and never changed afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Geometry {
    /// Minimum size of a block read, in bytes.
    pub read_size: u32,
    /// Minimum size of a block program, in bytes.
    pub prog_size: u32,
    /// Size of an erasable block, in bytes.
    pub block_size: u32,
    /// Number of erasable blocks on the device.
    pub block_count: u32,
    /// Size of the read, program and per-file caches, in bytes.
    pub cache_size: u32,
    /// Size of the block allocator's lookahead buffer, in bytes.
    pub lookahead_size: u32,
    /// Erase cycles before metadata is moved to another block; -1 disables.
    pub block_cycles: i32,
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            read_size: 16,
            prog_size: 16,
            block_size: 512,
            block_count: 32,
            cache_size: 16,
            lookahead_size: 16,
            block_cycles: 500,
        }
    }
}

impl Geometry {
    /// Geometry for a NOR flash chip.
    ///
    /// Reads and programs are page sized; `block_count` covers as many whole
    /// blocks as fit in `total_size`.
    pub fn for_flash(page_size: u32, block_size: u32, total_size: u32) -> Self {
        Self {
            read_size: page_size,
            prog_size: page_size,
            block_size,
            block_count: total_size / block_size.max(1),
            cache_size: 512,
            lookahead_size: 512,
            block_cycles: 100,
        }
    }

    pub fn with_block_count(mut self, block_count: u32) -> Self {
        self.block_count = block_count;
        self
    }

    pub fn with_block_size(mut self, block_size: u32) -> Self {
        self.block_size = block_size;
        self
    }

    /// Bytes addressed by this geometry.
    pub fn capacity(&self) -> u64 {
        u64::from(self.block_size) * u64::from(self.block_count)
    }

    /// Check the relations the engine relies on.
    ///
    /// The engine only asserts these (and the assertions are compiled out),
    /// so a bad geometry has to be rejected before it reaches native code.
    pub fn validate(&self) -> Result<()> {
        let sizes = [
            self.read_size,
            self.prog_size,
            self.block_size,
            self.cache_size,
            self.lookahead_size,
        ];
        if sizes.contains(&0) {
            return Err(Error::InvalidParam);
        }
        if self.block_size % self.read_size != 0 || self.block_size % self.prog_size != 0 {
            return Err(Error::InvalidParam);
        }
        if self.cache_size > self.block_size
            || self.cache_size % self.read_size != 0
            || self.cache_size % self.prog_size != 0
            || self.block_size % self.cache_size != 0
        {
            return Err(Error::InvalidParam);
        }
        if self.lookahead_size % 8 != 0 {
            return Err(Error::InvalidParam);
        }
        if self.block_cycles == 0 {
            return Err(Error::InvalidParam);
        }
        // Metadata pairs need two blocks before anything else fits.
        if self.block_count < 2 {
            return Err(Error::InvalidParam);
        }
        // CTZ skip-list pointers must fit in one block.
        if self.block_size <= 8 || 4 * npw2(u32::MAX / (self.block_size - 8)) > self.block_size {
            return Err(Error::InvalidParam);
        }
        Ok(())
    }

    /// Check the geometry against a device that reports its size.
    pub fn fits(&self, capacity: Option<u64>) -> Result<()> {
        match capacity {
            Some(bytes) if self.capacity() > bytes => Err(Error::InvalidParam),
            _ => Ok(()),
        }
    }
}

/// Smallest power of two exponent covering `a`.
fn npw2(a: u32) -> u32 {
    if a <= 1 {
        0
    } else {
        32 - (a - 1).leading_zeros()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let geometry = Geometry::default();
        assert_eq!(geometry.validate(), Ok(()));
        assert_eq!(geometry.capacity(), 32 * 512);
    }

    #[test]
    fn test_block_size_must_be_multiple() {
        let geometry = Geometry {
            prog_size: 24,
            ..Default::default()
        };
        assert_eq!(geometry.validate(), Err(Error::InvalidParam));
    }

    #[test]
    fn test_cache_larger_than_block() {
        let geometry = Geometry {
            cache_size: 1024,
            ..Default::default()
        };
        assert_eq!(geometry.validate(), Err(Error::InvalidParam));
    }

    #[test]
    fn test_lookahead_multiple_of_eight() {
        let geometry = Geometry {
            lookahead_size: 12,
            ..Default::default()
        };
        assert_eq!(geometry.validate(), Err(Error::InvalidParam));
    }

    #[test]
    fn test_zero_block_cycles() {
        let geometry = Geometry {
            block_cycles: 0,
            ..Default::default()
        };
        assert_eq!(geometry.validate(), Err(Error::InvalidParam));

        let disabled = Geometry {
            block_cycles: -1,
            ..Default::default()
        };
        assert_eq!(disabled.validate(), Ok(()));
    }

    #[test]
    fn test_tiny_blocks_rejected() {
        let geometry = Geometry {
            read_size: 16,
            prog_size: 16,
            cache_size: 16,
            block_size: 64,
            ..Default::default()
        };
        assert_eq!(geometry.validate(), Err(Error::InvalidParam));

        let smallest = geometry.with_block_size(128);
        assert_eq!(smallest.validate(), Ok(()));
    }

    #[test]
    fn test_fits_device() {
        let geometry = Geometry::default();
        assert_eq!(geometry.fits(None), Ok(()));
        assert_eq!(geometry.fits(Some(32 * 512)), Ok(()));
        assert_eq!(geometry.fits(Some(31 * 512)), Err(Error::InvalidParam));
    }

    #[test]
    fn test_for_flash() {
        let geometry = Geometry::for_flash(256, 4096, 2 * 1024 * 1024);
        assert_eq!(geometry.block_count, 512);
        assert_eq!(geometry.validate(), Ok(()));
    }

    #[test]
    fn test_npw2() {
        assert_eq!(npw2(1), 0);
        assert_eq!(npw2(2), 1);
        assert_eq!(npw2(3), 2);
        assert_eq!(npw2(1024), 10);
        assert_eq!(npw2(1025), 11);
    }
}
