//! Callback entry points the engine uses for storage I/O.
//!
//! The engine calls `read`, `prog`, `erase` and `sync` through function
//! pointers in its configuration, passing the configuration back so the
//! callback can find `context`. Each entry point resolves the context to the
//! registered device, runs the matching [`BlockDevice`] method and answers in
//! the engine's convention: `0` on success, [`LFS_ERR_IO`] on any failure.
//!
//! Dispatch is synchronous and takes no locks; the caller of the engine
//! already holds the filesystem's lock.

use std::ffi::{c_int, c_void};
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::slice;

use littlefs2_sys as ll;

use crate::device::BlockDevice;
use crate::error::{LFS_ERR_IO, LFS_ERR_OK};
use crate::registry::DeviceToken;

/// Point the four storage callbacks of `config` at device type `D`.
pub(crate) fn wire<D: BlockDevice>(config: &mut ll::lfs_config, context: *mut c_void) {
    config.context = context;
    config.read = Some(read::<D>);
    config.prog = Some(prog::<D>);
    config.erase = Some(erase::<D>);
    config.sync = Some(sync::<D>);
}

unsafe extern "C" fn read<D: BlockDevice>(
    config: *const ll::lfs_config,
    block: ll::lfs_block_t,
    off: ll::lfs_off_t,
    buffer: *mut c_void,
    size: ll::lfs_size_t,
) -> c_int {
    let buf: &mut [u8] = if size == 0 || buffer.is_null() {
        &mut []
    } else {
        // SAFETY: the engine hands us a writable buffer of `size` bytes.
        unsafe { slice::from_raw_parts_mut(buffer.cast::<u8>(), size as usize) }
    };
    // SAFETY: `config` is the configuration this callback was wired into.
    unsafe { dispatch::<D>(config, "read", |dev| dev.read_block(block, off, buf)) }
}

unsafe extern "C" fn prog<D: BlockDevice>(
    config: *const ll::lfs_config,
    block: ll::lfs_block_t,
    off: ll::lfs_off_t,
    buffer: *const c_void,
    size: ll::lfs_size_t,
) -> c_int {
    let buf: &[u8] = if size == 0 || buffer.is_null() {
        &[]
    } else {
        // SAFETY: the engine hands us a readable buffer of `size` bytes.
        unsafe { slice::from_raw_parts(buffer.cast::<u8>(), size as usize) }
    };
    // SAFETY: as in `read`.
    unsafe { dispatch::<D>(config, "prog", |dev| dev.program_block(block, off, buf)) }
}

unsafe extern "C" fn erase<D: BlockDevice>(
    config: *const ll::lfs_config,
    block: ll::lfs_block_t,
) -> c_int {
    // SAFETY: as in `read`.
    unsafe { dispatch::<D>(config, "erase", |dev| dev.erase_block(block)) }
}

unsafe extern "C" fn sync<D: BlockDevice>(config: *const ll::lfs_config) -> c_int {
    // SAFETY: as in `read`.
    unsafe { dispatch::<D>(config, "sync", |dev| dev.sync()) }
}

/// Resolve the device behind `config` and run `op` on it.
///
/// # Safety
///
/// `config` must be null or point to a configuration whose `context` is
/// null or the context of a live `DeviceToken<D>`.
unsafe fn dispatch<D: BlockDevice>(
    config: *const ll::lfs_config,
    name: &'static str,
    op: impl FnOnce(&mut D) -> io::Result<()>,
) -> c_int {
    let context = if config.is_null() {
        std::ptr::null_mut()
    } else {
        // SAFETY: non-null and owned by the filesystem making this call.
        unsafe { (*config).context }
    };

    // SAFETY: the context was produced by `DeviceToken::<D>::context` and the
    // engine only calls back while the token is registered.
    let Some(device) = (unsafe { DeviceToken::<D>::resolve(context) }) else {
        tracing::error!(op = name, "storage callback without a registered device");
        return LFS_ERR_IO;
    };

    // Unwinding into C is undefined; a panicking backend is a device fault.
    match panic::catch_unwind(AssertUnwindSafe(|| op(device))) {
        Ok(Ok(())) => LFS_ERR_OK,
        Ok(Err(e)) => {
            tracing::warn!(op = name, error = %e, "block device fault");
            LFS_ERR_IO
        }
        Err(_) => {
            tracing::error!(op = name, "block device panicked");
            LFS_ERR_IO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::MemoryDevice;

    /// Device whose every operation fails.
    struct Broken;

    impl BlockDevice for Broken {
        fn read_block(&mut self, _: u32, _: u32, _: &mut [u8]) -> io::Result<()> {
            Err(io::Error::other("bad sector"))
        }
        fn program_block(&mut self, _: u32, _: u32, _: &[u8]) -> io::Result<()> {
            Err(io::Error::other("bad sector"))
        }
        fn erase_block(&mut self, _: u32) -> io::Result<()> {
            Err(io::Error::other("bad sector"))
        }
        fn sync(&mut self) -> io::Result<()> {
            panic!("sync exploded")
        }
    }

    fn config_for<D: BlockDevice>(token: &DeviceToken<D>) -> ll::lfs_config {
        // SAFETY: lfs_config is plain data; all-zero is a valid value.
        let mut config: ll::lfs_config = unsafe { std::mem::zeroed() };
        wire::<D>(&mut config, token.context());
        config
    }

    #[test]
    fn test_roundtrip_through_callbacks() {
        let mut token = DeviceToken::register(MemoryDevice::new(128, 4));
        let config = config_for(&token);

        let data = *b"bridge";
        let prog = config.prog.unwrap();
        let rc = unsafe { prog(&config, 2, 10, data.as_ptr().cast(), data.len() as u32) };
        assert_eq!(rc, 0);

        let mut buf = [0u8; 6];
        let read = config.read.unwrap();
        let rc = unsafe { read(&config, 2, 10, buf.as_mut_ptr().cast(), buf.len() as u32) };
        assert_eq!(rc, 0);
        assert_eq!(&buf, b"bridge");

        let erase = config.erase.unwrap();
        assert_eq!(unsafe { erase(&config, 2) }, 0);
        assert_eq!(&token.get_mut().as_bytes()[266..272], &[0xff; 6]);

        let sync = config.sync.unwrap();
        assert_eq!(unsafe { sync(&config) }, 0);
    }

    #[test]
    fn test_device_errors_become_io() {
        let token = DeviceToken::register(Broken);
        let config = config_for(&token);

        let mut buf = [0u8; 4];
        let read = config.read.unwrap();
        assert_eq!(unsafe { read(&config, 0, 0, buf.as_mut_ptr().cast(), 4) }, LFS_ERR_IO);
        let erase = config.erase.unwrap();
        assert_eq!(unsafe { erase(&config, 0) }, LFS_ERR_IO);
    }

    #[test]
    fn test_panic_becomes_io() {
        let token = DeviceToken::register(Broken);
        let config = config_for(&token);
        let sync = config.sync.unwrap();
        assert_eq!(unsafe { sync(&config) }, LFS_ERR_IO);
    }

    #[test]
    fn test_out_of_range_is_io() {
        let token = DeviceToken::register(MemoryDevice::new(128, 4));
        let config = config_for(&token);
        let erase = config.erase.unwrap();
        assert_eq!(unsafe { erase(&config, 99) }, LFS_ERR_IO);
    }

    #[test]
    fn test_null_context_is_io() {
        let token = DeviceToken::register(MemoryDevice::new(128, 4));
        let mut config = config_for(&token);
        config.context = std::ptr::null_mut();
        let sync = config.sync.unwrap();
        assert_eq!(unsafe { sync(&config) }, LFS_ERR_IO);
    }
}
