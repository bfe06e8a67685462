//! Filesystem instance bound to one block device.
//!
//! A [`Filesystem`] owns everything the engine points into: its state
//! struct, its configuration, the read/program caches, the lookahead buffer
//! and the registered device. All of it sits at fixed heap addresses for the
//! life of the instance.
//!
//! ## Lifecycle
//!
//! - [`Filesystem::new`] registers the device and wires the callbacks; no I/O.
//! - [`Filesystem::format`] and [`Filesystem::mount`] drive the engine.
//! - [`Filesystem::unmount`] (or drop) flushes and detaches; the device token
//!   is released only after that.
//!
//! Mount, format and unmount take `&mut self`, so they cannot run while a
//! [`Handle`] borrowed from the instance is open. Everything else goes
//! through one lock, which serializes all native calls for the instance.

use parking_lot::Mutex;
use std::fmt;

use littlefs2_sys as ll;

use crate::bridge;
use crate::device::BlockDevice;
use crate::error::{Error, Result, check, check_size};
use crate::flags::OpenFlags;
use crate::geometry::Geometry;
use crate::handle::Handle;
use crate::native::{NativeBox, c_path};
use crate::registry::DeviceToken;
use crate::types::Metadata;

/// Native state of one instance. Only touched with the lock held or
/// through `&mut`.
pub(crate) struct Native<D: BlockDevice> {
    lfs: NativeBox<ll::lfs_t>,
    config: NativeBox<ll::lfs_config>,
    // Referenced from `config`; never touched from Rust.
    _read_buffer: Vec<u8>,
    _prog_buffer: Vec<u8>,
    _lookahead_buffer: Vec<u32>,
    token: Option<DeviceToken<D>>,
    mounted: bool,
}

// SAFETY: the raw pointers all point into allocations owned by this struct,
// and the engine is only entered by whoever holds `&mut Native`.
unsafe impl<D: BlockDevice + Send> Send for Native<D> {}

impl<D: BlockDevice> Native<D> {
    fn new(geometry: &Geometry, device: D) -> Self {
        let token = DeviceToken::register(device);
        let cache_size = geometry.cache_size as usize;
        let mut read_buffer = vec![0u8; cache_size];
        let mut prog_buffer = vec![0u8; cache_size];
        let mut lookahead_buffer = vec![0u32; (geometry.lookahead_size as usize).div_ceil(4)];

        // SAFETY: lfs_config is plain data; all-zero leaves every optional
        // limit at the engine default.
        let mut config = unsafe { NativeBox::<ll::lfs_config>::zeroed() };
        let cfg = config.get_mut();
        bridge::wire::<D>(cfg, token.context());
        cfg.read_size = geometry.read_size;
        cfg.prog_size = geometry.prog_size;
        cfg.block_size = geometry.block_size;
        cfg.block_count = geometry.block_count;
        cfg.cache_size = geometry.cache_size;
        cfg.lookahead_size = geometry.lookahead_size;
        cfg.block_cycles = geometry.block_cycles;
        cfg.read_buffer = read_buffer.as_mut_ptr().cast();
        cfg.prog_buffer = prog_buffer.as_mut_ptr().cast();
        cfg.lookahead_buffer = lookahead_buffer.as_mut_ptr().cast();

        Self {
            // SAFETY: lfs_t is plain data, initialized by format/mount.
            lfs: unsafe { NativeBox::zeroed() },
            config,
            _read_buffer: read_buffer,
            _prog_buffer: prog_buffer,
            _lookahead_buffer: lookahead_buffer,
            token: Some(token),
            mounted: false,
        }
    }

    fn lfs(&self) -> *mut ll::lfs_t {
        self.lfs.as_ptr()
    }

    fn config(&self) -> *const ll::lfs_config {
        self.config.as_ptr()
    }

    fn device_capacity(&mut self) -> Option<u64> {
        self.token.as_mut().and_then(|token| token.get_mut().capacity())
    }

    fn unmount(&mut self) -> Result<()> {
        if !self.mounted {
            return Ok(());
        }
        // The engine tears down its mount state even when the final flush
        // fails, so the instance is unmounted either way.
        self.mounted = false;
        // SAFETY: mounted state created by lfs_mount on this lfs.
        check(unsafe { ll::lfs_unmount(self.lfs()) })
    }
}

impl<D: BlockDevice> Drop for Native<D> {
    fn drop(&mut self) {
        if let Err(e) = self.unmount() {
            tracing::warn!(error = %e, "unmount on drop failed");
        }
        // `token` is dropped after this body, strictly after unmount.
    }
}

/// A littlefs filesystem on block device `D`.
pub struct Filesystem<D: BlockDevice> {
    geometry: Geometry,
    native: Mutex<Native<D>>,
}

impl<D: BlockDevice> fmt::Debug for Filesystem<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Filesystem")
            .field("geometry", &self.geometry)
            .field("native", &"<locked>")
            .finish()
    }
}

impl<D: BlockDevice> Filesystem<D> {
    /// Bind `device` with the given geometry.
    ///
    /// Allocates the native state, registers the device and wires the
    /// storage callbacks. Performs no I/O; the geometry is checked on
    /// format and mount.
    pub fn new(geometry: Geometry, device: D) -> Self {
        Self {
            native: Mutex::new(Native::new(&geometry, device)),
            geometry,
        }
    }

    /// Geometry this instance was created with.
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn is_mounted(&self) -> bool {
        self.native.lock().mounted
    }

    /// Borrow the block device while no native call is in flight.
    pub fn device_mut(&mut self) -> &mut D {
        match self.native.get_mut().token.as_mut() {
            Some(token) => token.get_mut(),
            // The token is only taken by `into_device`, which consumes self.
            None => unreachable!("device token released while filesystem alive"),
        }
    }

    /// Unmount, release the device token and return the device.
    pub fn into_device(self) -> D {
        let mut native = self.native.into_inner();
        if let Err(e) = native.unmount() {
            tracing::warn!(error = %e, "unmount before release failed");
        }
        match native.token.take() {
            Some(token) => token.release(),
            None => unreachable!("device token released twice"),
        }
    }

    /// Initialize the medium with an empty filesystem.
    ///
    /// Fails with `InvalidParam` when mounted, or when the geometry is
    /// inconsistent or larger than the device.
    #[tracing::instrument(skip(self), name = "lfs.format", fields(blocks = self.geometry.block_count, block_size = self.geometry.block_size))]
    pub fn format(&mut self) -> Result<()> {
        let native = self.native.get_mut();
        if native.mounted {
            tracing::warn!("format refused while mounted");
            return Err(Error::InvalidParam);
        }
        self.geometry.validate()?;
        self.geometry.fits(native.device_capacity())?;

        // SAFETY: lfs and config are owned by `native` and stay put.
        check(unsafe { ll::lfs_format(native.lfs(), native.config()) })?;
        tracing::debug!("formatted");
        Ok(())
    }

    /// Mount the filesystem found on the device.
    ///
    /// Fails with `Corrupt` if there is no valid filesystem. Mounting an
    /// already mounted instance does nothing.
    #[tracing::instrument(skip(self), name = "lfs.mount", fields(blocks = self.geometry.block_count, block_size = self.geometry.block_size))]
    pub fn mount(&mut self) -> Result<()> {
        let native = self.native.get_mut();
        if native.mounted {
            return Ok(());
        }
        self.geometry.validate()?;
        self.geometry.fits(native.device_capacity())?;

        // SAFETY: as in `format`.
        check(unsafe { ll::lfs_mount(native.lfs(), native.config()) })?;
        native.mounted = true;
        tracing::debug!("mounted");
        Ok(())
    }

    /// Flush and release mount state. Does nothing when not mounted.
    #[tracing::instrument(skip(self), name = "lfs.unmount")]
    pub fn unmount(&mut self) -> Result<()> {
        self.native.get_mut().unmount()?;
        tracing::debug!("unmounted");
        Ok(())
    }

    /// Run `op` against the mounted engine with the lock held.
    pub(crate) fn with_mounted<R>(&self, op: impl FnOnce(*mut ll::lfs_t) -> Result<R>) -> Result<R> {
        let native = self.native.lock();
        if !native.mounted {
            return Err(Error::InvalidParam);
        }
        op(native.lfs())
    }

    /// Get metadata for `path`.
    pub fn stat(&self, path: &str) -> Result<Metadata> {
        let c = c_path(path)?;
        self.with_mounted(|lfs| {
            // SAFETY: lfs_info is plain data, filled in by lfs_stat.
            let mut info: ll::lfs_info = unsafe { std::mem::zeroed() };
            // SAFETY: mounted lfs, NUL-terminated path, valid out pointer.
            check(unsafe { ll::lfs_stat(lfs, c.as_ptr(), &mut info) })?;
            Ok(Metadata::from_info(&info))
        })
    }

    /// Create a directory.
    ///
    /// Fails with `EntryExists` if present, `NoEntry` if the parent is missing.
    pub fn mkdir(&self, path: &str) -> Result<()> {
        let c = c_path(path)?;
        // SAFETY: mounted lfs, NUL-terminated path.
        self.with_mounted(|lfs| check(unsafe { ll::lfs_mkdir(lfs, c.as_ptr()) }))?;
        tracing::debug!(path, "mkdir");
        Ok(())
    }

    /// Remove a file or an empty directory.
    pub fn remove(&self, path: &str) -> Result<()> {
        let c = c_path(path)?;
        // SAFETY: mounted lfs, NUL-terminated path.
        self.with_mounted(|lfs| check(unsafe { ll::lfs_remove(lfs, c.as_ptr()) }))?;
        tracing::debug!(path, "remove");
        Ok(())
    }

    /// Atomically rename `from` to `to`.
    pub fn rename(&self, from: &str, to: &str) -> Result<()> {
        let c_from = c_path(from)?;
        let c_to = c_path(to)?;
        // SAFETY: mounted lfs, NUL-terminated paths.
        self.with_mounted(|lfs| {
            check(unsafe { ll::lfs_rename(lfs, c_from.as_ptr(), c_to.as_ptr()) })
        })?;
        tracing::debug!(from, to, "rename");
        Ok(())
    }

    /// Number of allocated blocks.
    ///
    /// Best effort: blocks shared between copy-on-write structures may be
    /// counted more than once, so this is an upper bound.
    pub fn size(&self) -> Result<u32> {
        // SAFETY: mounted lfs.
        self.with_mounted(|lfs| check_size(unsafe { ll::lfs_fs_size(lfs) }))
    }

    /// Open `path` as a directory if it is one, otherwise as a file.
    pub fn open(&self, path: &str, flags: OpenFlags) -> Result<Handle<'_, D>> {
        Handle::open(self, path, flags)
    }

    /// Open `path` as a file.
    pub fn open_file(&self, path: &str, flags: OpenFlags) -> Result<Handle<'_, D>> {
        Handle::open_file(self, path, flags)
    }

    /// Open `path` as a directory.
    pub fn open_dir(&self, path: &str) -> Result<Handle<'_, D>> {
        Handle::open_dir(self, path)
    }
}
