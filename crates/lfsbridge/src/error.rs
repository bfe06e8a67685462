//! Error taxonomy shared with the native engine.
//!
//! The engine reports failures as negative integers and successes as zero
//! or a positive count. [`check`] and [`check_size`] keep that sign
//! convention at every call site: non-negative results pass through as
//! values, negative results become an [`Error`] carrying the exact code.

use std::ffi::c_int;
use std::io;
use strum::EnumIter;
use thiserror::Error;

/// Native code for success.
pub const LFS_ERR_OK: c_int = 0;
/// Native code reported to the engine for any block device fault.
pub const LFS_ERR_IO: c_int = -5;

/// Filesystem error, one variant per native error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error, EnumIter)]
pub enum Error {
    /// Error during device operation.
    #[error("error during device operation")]
    Io,

    /// Corrupted filesystem (or no filesystem at all).
    #[error("corrupted")]
    Corrupt,

    /// No directory entry.
    #[error("no directory entry")]
    NoEntry,

    /// Entry already exists.
    #[error("entry already exists")]
    EntryExists,

    /// Entry is not a directory.
    #[error("entry is not a dir")]
    NotDir,

    /// Entry is a directory.
    #[error("entry is a dir")]
    IsDir,

    /// Directory is not empty.
    #[error("dir is not empty")]
    DirNotEmpty,

    /// Bad file number (closed handle, or wrong access mode).
    #[error("bad file number")]
    BadFileNumber,

    /// File too large.
    #[error("file too large")]
    FileTooLarge,

    /// Invalid parameter.
    #[error("invalid parameter")]
    InvalidParam,

    /// No space left on device.
    #[error("no space left on device")]
    NoSpace,

    /// No more memory available.
    #[error("no more memory available")]
    NoMemory,

    /// No data/attr available.
    #[error("no data/attr available")]
    NoAttr,

    /// File name too long.
    #[error("file name too long")]
    NameTooLong,

    /// A negative code the engine is not documented to return.
    #[error("unknown error code {0}")]
    Unknown(i32),
}

impl Error {
    /// Translate a negative native code.
    ///
    /// Returns `None` for zero and positive values, which are not errors.
    pub fn from_code(code: c_int) -> Option<Self> {
        let err = match code {
            c if c >= 0 => return None,
            -5 => Error::Io,
            -84 => Error::Corrupt,
            -2 => Error::NoEntry,
            -17 => Error::EntryExists,
            -20 => Error::NotDir,
            -21 => Error::IsDir,
            -39 => Error::DirNotEmpty,
            -9 => Error::BadFileNumber,
            -27 => Error::FileTooLarge,
            -22 => Error::InvalidParam,
            -28 => Error::NoSpace,
            -12 => Error::NoMemory,
            -61 => Error::NoAttr,
            -36 => Error::NameTooLong,
            other => Error::Unknown(other),
        };
        Some(err)
    }

    /// The native code this error stands for.
    pub fn code(&self) -> c_int {
        match self {
            Error::Io => LFS_ERR_IO,
            Error::Corrupt => -84,
            Error::NoEntry => -2,
            Error::EntryExists => -17,
            Error::NotDir => -20,
            Error::IsDir => -21,
            Error::DirNotEmpty => -39,
            Error::BadFileNumber => -9,
            Error::FileTooLarge => -27,
            Error::InvalidParam => -22,
            Error::NoSpace => -28,
            Error::NoMemory => -12,
            Error::NoAttr => -61,
            Error::NameTooLong => -36,
            Error::Unknown(code) => *code,
        }
    }
}

/// Check a native result that carries no value.
pub fn check(code: c_int) -> Result<()> {
    match Error::from_code(code) {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Check a native result whose non-negative value is a size, count or offset.
pub fn check_size(code: i32) -> Result<u32> {
    match Error::from_code(code) {
        Some(err) => Err(err),
        None => Ok(code as u32),
    }
}

/// Convert Error to std::io::Error for the `Read`/`Write`/`Seek` impls.
impl From<Error> for io::Error {
    fn from(e: Error) -> Self {
        let kind = match e {
            Error::Io => io::ErrorKind::Other,
            Error::Corrupt => io::ErrorKind::InvalidData,
            Error::NoEntry => io::ErrorKind::NotFound,
            Error::EntryExists => io::ErrorKind::AlreadyExists,
            Error::NotDir => io::ErrorKind::NotADirectory,
            Error::IsDir => io::ErrorKind::IsADirectory,
            Error::DirNotEmpty => io::ErrorKind::DirectoryNotEmpty,
            Error::BadFileNumber => io::ErrorKind::PermissionDenied,
            Error::FileTooLarge => io::ErrorKind::FileTooLarge,
            Error::InvalidParam => io::ErrorKind::InvalidInput,
            Error::NoSpace => io::ErrorKind::StorageFull,
            Error::NoMemory => io::ErrorKind::OutOfMemory,
            Error::NoAttr => io::ErrorKind::NotFound,
            Error::NameTooLong => io::ErrorKind::InvalidFilename,
            Error::Unknown(_) => io::ErrorKind::Other,
        };
        io::Error::new(kind, e)
    }
}

/// Filesystem result type.
pub type Result<T> = std::result::Result<T, Error>;
