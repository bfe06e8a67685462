//! Open files and directories.
//!
//! A [`Handle`] borrows its [`Filesystem`] and owns exactly one native
//! per-open resource. The kind is fixed when the handle is opened; file
//! operations on a directory fail with `IsDir`, [`Handle::readdir`] on a
//! file fails with `NotDir`, and anything on a closed handle fails with
//! `BadFileNumber`.

use std::ffi::c_int;
use std::io::{self, SeekFrom};
use std::mem;

use littlefs2_sys as ll;

use crate::device::BlockDevice;
use crate::error::{Error, Result, check, check_size};
use crate::flags::{Access, OpenFlags};
use crate::fs::Filesystem;
use crate::native::{NativeBox, c_path};
use crate::types::{FileType, Metadata};

const LFS_SEEK_SET: c_int = 0;
const LFS_SEEK_CUR: c_int = 1;
const LFS_SEEK_END: c_int = 2;

/// Native file state plus the cache the engine uses for it.
struct NativeFile {
    file: ll::lfs_file_t,
    config: ll::lfs_file_config,
    cache: Vec<u8>,
}

impl NativeFile {
    fn alloc(cache_size: u32) -> NativeBox<Self> {
        let mut native = NativeBox::new(NativeFile {
            // SAFETY: plain C structs; the engine fills `file` on open.
            file: unsafe { mem::zeroed() },
            config: unsafe { mem::zeroed() },
            cache: vec![0u8; cache_size as usize],
        });
        let this = native.get_mut();
        this.config.buffer = this.cache.as_mut_ptr().cast();
        native
    }
}

/// Native resource behind an open handle.
enum Resource {
    File(NativeBox<NativeFile>),
    Dir(NativeBox<ll::lfs_dir_t>),
}

/// An open file or directory.
pub struct Handle<'fs, D: BlockDevice> {
    fs: &'fs Filesystem<D>,
    path: String,
    kind: FileType,
    access: Access,
    resource: Option<Resource>,
}

impl<D: BlockDevice> std::fmt::Debug for Handle<'_, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handle")
            .field("path", &self.path)
            .field("kind", &self.kind)
            .field("open", &self.is_open())
            .finish()
    }
}

impl<'fs, D: BlockDevice> Handle<'fs, D> {
    /// Open `path` as a directory if it is one, otherwise as a file.
    pub(crate) fn open(fs: &'fs Filesystem<D>, path: &str, flags: OpenFlags) -> Result<Self> {
        match fs.stat(path) {
            Ok(meta) if meta.is_dir() => Self::open_dir(fs, path),
            _ => Self::open_file(fs, path, flags),
        }
    }

    pub(crate) fn open_file(fs: &'fs Filesystem<D>, path: &str, flags: OpenFlags) -> Result<Self> {
        let c = c_path(path)?;
        let native = NativeFile::alloc(fs.geometry().cache_size);
        let ptr = native.as_ptr();
        // On failure the engine has already detached the file, so dropping
        // `native` is all the cleanup needed.
        fs.with_mounted(|lfs| {
            // SAFETY: `ptr` stays valid until `native` is dropped, and the
            // per-file config outlives the open file.
            check(unsafe {
                ll::lfs_file_opencfg(
                    lfs,
                    &raw mut (*ptr).file,
                    c.as_ptr(),
                    flags.bits(),
                    &raw const (*ptr).config,
                )
            })
        })?;
        tracing::trace!(path, flags = flags.bits(), "opened file");
        Ok(Self {
            fs,
            path: path.to_owned(),
            kind: FileType::File,
            access: flags.access,
            resource: Some(Resource::File(native)),
        })
    }

    pub(crate) fn open_dir(fs: &'fs Filesystem<D>, path: &str) -> Result<Self> {
        let c = c_path(path)?;
        // SAFETY: lfs_dir_t is plain data, filled in by lfs_dir_open.
        let native = unsafe { NativeBox::<ll::lfs_dir_t>::zeroed() };
        // SAFETY: mounted lfs, owned dir allocation, NUL-terminated path.
        fs.with_mounted(|lfs| check(unsafe { ll::lfs_dir_open(lfs, native.as_ptr(), c.as_ptr()) }))?;
        tracing::trace!(path, "opened dir");
        Ok(Self {
            fs,
            path: path.to_owned(),
            kind: FileType::Directory,
            access: Access::ReadOnly,
            resource: Some(Resource::Dir(native)),
        })
    }

    /// Kind chosen at open; unchanged by close.
    pub fn kind(&self) -> FileType {
        self.kind
    }

    /// Path this handle was opened with.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.resource.is_some()
    }

    /// Metadata of the opened path.
    pub fn stat(&self) -> Result<Metadata> {
        if !self.is_open() {
            return Err(Error::BadFileNumber);
        }
        self.fs.stat(&self.path)
    }

    fn with_file<R>(
        &mut self,
        op: impl FnOnce(*mut ll::lfs_t, *mut ll::lfs_file_t) -> Result<R>,
    ) -> Result<R> {
        let file = match &self.resource {
            None => return Err(Error::BadFileNumber),
            Some(Resource::Dir(_)) => return Err(Error::IsDir),
            // SAFETY: field projection inside an allocation we own.
            Some(Resource::File(native)) => unsafe { &raw mut (*native.as_ptr()).file },
        };
        self.fs.with_mounted(|lfs| op(lfs, file))
    }

    /// The engine asserts on mode violations instead of reporting them.
    fn require(&self, writable: bool) -> Result<()> {
        let allowed = match self.access {
            Access::ReadOnly => !writable,
            Access::WriteOnly => writable,
            Access::ReadWrite => true,
        };
        if allowed || self.kind.is_dir() {
            Ok(())
        } else {
            Err(Error::BadFileNumber)
        }
    }

    /// Read into `buf`, returning the number of bytes read; `Ok(0)` at end
    /// of file.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.require(false)?;
        let len = buf.len().min(i32::MAX as usize) as ll::lfs_size_t;
        self.with_file(|lfs, file| {
            // SAFETY: open file, `buf` is writable for `len` bytes.
            let n = check_size(unsafe { ll::lfs_file_read(lfs, file, buf.as_mut_ptr().cast(), len) })?;
            Ok(n as usize)
        })
    }

    /// Write `buf`, returning the number of bytes written.
    pub fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.require(true)?;
        let len = buf.len().min(i32::MAX as usize) as ll::lfs_size_t;
        self.with_file(|lfs, file| {
            // SAFETY: open file, `buf` is readable for `len` bytes.
            let n = check_size(unsafe { ll::lfs_file_write(lfs, file, buf.as_ptr().cast(), len) })?;
            Ok(n as usize)
        })
    }

    /// Move the file position, returning the new position.
    pub fn seek(&mut self, pos: SeekFrom) -> Result<u32> {
        let (offset, whence) = match pos {
            SeekFrom::Start(n) => (i32::try_from(n), LFS_SEEK_SET),
            SeekFrom::Current(n) => (i32::try_from(n), LFS_SEEK_CUR),
            SeekFrom::End(n) => (i32::try_from(n), LFS_SEEK_END),
        };
        let offset = offset.map_err(|_| Error::InvalidParam)?;
        // SAFETY: open file.
        self.with_file(|lfs, file| check_size(unsafe { ll::lfs_file_seek(lfs, file, offset, whence) }))
    }

    /// Current file position.
    pub fn tell(&mut self) -> Result<u32> {
        // SAFETY: open file.
        self.with_file(|lfs, file| check_size(unsafe { ll::lfs_file_tell(lfs, file) }))
    }

    pub fn rewind(&mut self) -> Result<()> {
        // SAFETY: open file.
        self.with_file(|lfs, file| check(unsafe { ll::lfs_file_rewind(lfs, file) }))
    }

    /// Shrink or extend the file to `size` bytes; extension is zero-filled.
    pub fn truncate(&mut self, size: u32) -> Result<()> {
        self.require(true)?;
        // SAFETY: open file.
        self.with_file(|lfs, file| check(unsafe { ll::lfs_file_truncate(lfs, file, size) }))
    }

    /// Flush pending writes to the device.
    pub fn sync(&mut self) -> Result<()> {
        // SAFETY: open file.
        self.with_file(|lfs, file| check(unsafe { ll::lfs_file_sync(lfs, file) }))
    }

    /// File size in bytes, including unflushed writes.
    pub fn size(&mut self) -> Result<u32> {
        // SAFETY: open file.
        self.with_file(|lfs, file| check_size(unsafe { ll::lfs_file_size(lfs, file) }))
    }

    /// Iterate the entries of an open directory.
    ///
    /// The sequence continues from wherever the previous iteration stopped
    /// and never starts over; "." and ".." are skipped.
    pub fn readdir(&mut self) -> Result<ReadDir<'_, 'fs, D>> {
        match self.resource {
            None => Err(Error::BadFileNumber),
            Some(Resource::File(_)) => Err(Error::NotDir),
            Some(Resource::Dir(_)) => Ok(ReadDir {
                handle: self,
                done: false,
            }),
        }
    }

    /// Close the native resource. Closing again does nothing.
    pub fn close(&mut self) -> Result<()> {
        let Some(resource) = self.resource.take() else {
            return Ok(());
        };
        let rc = self.fs.with_mounted(|lfs| {
            // SAFETY: the resource was opened on this lfs and is closed once.
            Ok(match &resource {
                Resource::File(native) => unsafe {
                    ll::lfs_file_close(lfs, &raw mut (*native.as_ptr()).file)
                },
                Resource::Dir(native) => unsafe { ll::lfs_dir_close(lfs, native.as_ptr()) },
            })
        });
        // The engine has let go of the resource even if close reported an
        // error, so it is freed in every case.
        drop(resource);
        tracing::trace!(path = %self.path, "closed");
        check(rc?)
    }
}

impl<D: BlockDevice> Drop for Handle<'_, D> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(path = %self.path, error = %e, "close on drop failed");
        }
    }
}

/// Lazy iterator over directory entries, from [`Handle::readdir`].
pub struct ReadDir<'h, 'fs, D: BlockDevice> {
    handle: &'h mut Handle<'fs, D>,
    done: bool,
}

impl<D: BlockDevice> ReadDir<'_, '_, D> {
    fn read_entry(&mut self) -> Result<Option<Metadata>> {
        let dir = match &self.handle.resource {
            Some(Resource::Dir(native)) => native.as_ptr(),
            _ => return Err(Error::BadFileNumber),
        };
        self.handle.fs.with_mounted(|lfs| {
            // SAFETY: lfs_info is plain data, filled in by lfs_dir_read.
            let mut info: ll::lfs_info = unsafe { mem::zeroed() };
            // SAFETY: open dir on this lfs, valid out pointer.
            match check_size(unsafe { ll::lfs_dir_read(lfs, dir, &mut info) })? {
                0 => Ok(None),
                _ => Ok(Some(Metadata::from_info(&info))),
            }
        })
    }
}

impl<D: BlockDevice> Iterator for ReadDir<'_, '_, D> {
    type Item = Result<Metadata>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            match self.read_entry() {
                Ok(Some(entry)) if entry.name == "." || entry.name == ".." => continue,
                Ok(Some(entry)) => return Some(Ok(entry)),
                Ok(None) => self.done = true,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
        None
    }
}

impl<D: BlockDevice> std::iter::FusedIterator for ReadDir<'_, '_, D> {}

impl<D: BlockDevice> io::Read for Handle<'_, D> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(Handle::read(self, buf)?)
    }
}

impl<D: BlockDevice> io::Write for Handle<'_, D> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(Handle::write(self, buf)?)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(self.sync()?)
    }
}

impl<D: BlockDevice> io::Seek for Handle<'_, D> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        Ok(Handle::seek(self, pos)?.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::MemoryDevice;
    use crate::geometry::Geometry;

    fn mounted() -> Filesystem<MemoryDevice> {
        let geometry = Geometry::default();
        let mut fs = Filesystem::new(geometry, MemoryDevice::from_geometry(&geometry));
        fs.format().unwrap();
        fs.mount().unwrap();
        fs
    }

    #[test]
    fn test_open_missing_without_create() {
        let fs = mounted();
        assert_eq!(fs.open("/nope", OpenFlags::read()).unwrap_err(), Error::NoEntry);
        assert_eq!(fs.open_dir("/nope").unwrap_err(), Error::NoEntry);
    }

    #[test]
    fn test_open_probes_kind() {
        let fs = mounted();
        fs.mkdir("/dir").unwrap();
        let dir = fs.open("/dir", OpenFlags::read_write()).unwrap();
        assert_eq!(dir.kind(), FileType::Directory);

        let file = fs.open("/file", OpenFlags::create()).unwrap();
        assert_eq!(file.kind(), FileType::File);
        assert_eq!(file.path(), "/file");
    }

    #[test]
    fn test_kind_mismatch() {
        let fs = mounted();
        fs.mkdir("/dir").unwrap();
        let mut dir = fs.open("/dir", OpenFlags::read()).unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(dir.read(&mut buf), Err(Error::IsDir));
        assert_eq!(dir.write(b"x"), Err(Error::IsDir));
        assert_eq!(dir.seek(SeekFrom::Start(0)), Err(Error::IsDir));
        assert_eq!(dir.size(), Err(Error::IsDir));

        let mut file = fs.open("/file", OpenFlags::create()).unwrap();
        assert_eq!(file.readdir().err(), Some(Error::NotDir));
    }

    #[test]
    fn test_closed_handle() {
        let fs = mounted();
        let mut file = fs.open("/file", OpenFlags::create()).unwrap();
        file.close().unwrap();
        file.close().unwrap();
        assert!(!file.is_open());
        assert_eq!(file.kind(), FileType::File);
        assert_eq!(file.write(b"late"), Err(Error::BadFileNumber));
        assert_eq!(file.tell(), Err(Error::BadFileNumber));
        assert_eq!(file.stat(), Err(Error::BadFileNumber));
        assert_eq!(file.readdir().err(), Some(Error::BadFileNumber));
    }

    #[test]
    fn test_seek_tell_size() {
        let fs = mounted();
        let mut file = fs.open("/f", OpenFlags::read_write().with_create()).unwrap();
        file.write(b"0123456789").unwrap();
        assert_eq!(file.tell().unwrap(), 10);
        assert_eq!(file.size().unwrap(), 10);

        assert_eq!(file.seek(SeekFrom::Start(2)).unwrap(), 2);
        assert_eq!(file.seek(SeekFrom::Current(3)).unwrap(), 5);
        assert_eq!(file.seek(SeekFrom::End(-1)).unwrap(), 9);
        let mut buf = [0u8; 4];
        assert_eq!(file.read(&mut buf).unwrap(), 1);
        assert_eq!(buf[0], b'9');
        assert_eq!(file.read(&mut buf).unwrap(), 0);

        file.rewind().unwrap();
        assert_eq!(file.tell().unwrap(), 0);
        assert_eq!(file.seek(SeekFrom::Start(u64::MAX)), Err(Error::InvalidParam));
    }

    #[test]
    fn test_read_on_write_only() {
        let fs = mounted();
        let mut file = fs.open("/w", OpenFlags::create()).unwrap();
        let mut buf = [0u8; 1];
        assert_eq!(file.read(&mut buf), Err(Error::BadFileNumber));
        file.close().unwrap();

        let mut file = fs.open("/w", OpenFlags::read()).unwrap();
        assert_eq!(file.write(b"x"), Err(Error::BadFileNumber));
        assert_eq!(file.truncate(0), Err(Error::BadFileNumber));
    }

    #[test]
    fn test_readdir_is_not_restartable() {
        let fs = mounted();
        fs.mkdir("/d").unwrap();
        fs.mkdir("/d/a").unwrap();
        fs.mkdir("/d/b").unwrap();

        let mut dir = fs.open_dir("/d").unwrap();
        let mut names: Vec<_> = dir.readdir().unwrap().take(1).map(|e| e.unwrap().name).collect();
        assert_eq!(names.len(), 1);
        names.extend(dir.readdir().unwrap().map(|e| e.unwrap().name));
        names.sort();
        assert_eq!(names, ["a", "b"]);
        assert_eq!(dir.readdir().unwrap().count(), 0);
    }

    #[test]
    fn test_io_traits() {
        let fs = mounted();
        let mut file = fs.open("/io", OpenFlags::read_write().with_create()).unwrap();
        io::Write::write_all(&mut file, b"hello io").unwrap();
        io::Write::flush(&mut file).unwrap();
        io::Seek::seek(&mut file, SeekFrom::Start(6)).unwrap();
        let mut tail = String::new();
        io::Read::read_to_string(&mut file, &mut tail).unwrap();
        assert_eq!(tail, "io");

        let mut dir = fs.open_dir("/").unwrap();
        let err = io::Read::read(&mut dir, &mut [0u8; 1]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::IsADirectory);
    }
}
