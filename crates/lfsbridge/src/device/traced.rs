//! Logging decorator for block devices.

use std::io;

use super::BlockDevice;

/// Emits a `tracing` debug event for every call on the wrapped device.
///
/// Logging is off until [`set_enabled`](Self::set_enabled) turns it on, so
/// the wrapper can stay in place and be toggled at runtime.
#[derive(Debug)]
pub struct TracedDevice<D> {
    inner: D,
    enabled: bool,
}

impl<D: BlockDevice> TracedDevice<D> {
    pub fn new(inner: D) -> Self {
        Self {
            inner,
            enabled: false,
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn inner(&self) -> &D {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut D {
        &mut self.inner
    }

    pub fn into_inner(self) -> D {
        self.inner
    }
}

impl<D: BlockDevice> BlockDevice for TracedDevice<D> {
    fn read_block(&mut self, block: u32, offset: u32, buf: &mut [u8]) -> io::Result<()> {
        if self.enabled {
            tracing::debug!(block, offset, len = buf.len(), "read_block");
        }
        self.inner.read_block(block, offset, buf)
    }

    fn program_block(&mut self, block: u32, offset: u32, buf: &[u8]) -> io::Result<()> {
        if self.enabled {
            tracing::debug!(block, offset, len = buf.len(), "program_block");
        }
        self.inner.program_block(block, offset, buf)
    }

    fn erase_block(&mut self, block: u32) -> io::Result<()> {
        if self.enabled {
            tracing::debug!(block, "erase_block");
        }
        self.inner.erase_block(block)
    }

    fn sync(&mut self) -> io::Result<()> {
        if self.enabled {
            tracing::debug!("sync");
        }
        self.inner.sync()
    }

    fn capacity(&self) -> Option<u64> {
        self.inner.capacity()
    }
}
