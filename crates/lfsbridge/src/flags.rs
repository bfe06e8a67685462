//! Open flags and their native bit layout.

use serde::{Deserialize, Serialize};
use std::ffi::c_int;

/// Open a file as read only.
pub const LFS_O_RDONLY: c_int = 0x0001;
/// Open a file as write only.
pub const LFS_O_WRONLY: c_int = 0x0002;
/// Open a file as read and write.
pub const LFS_O_RDWR: c_int = 0x0003;
/// Create a file if it does not exist.
pub const LFS_O_CREAT: c_int = 0x0100;
/// Fail if a file already exists.
pub const LFS_O_EXCL: c_int = 0x0200;
/// Truncate the existing file to zero size.
pub const LFS_O_TRUNC: c_int = 0x0400;
/// Move to end of file on every write.
pub const LFS_O_APPEND: c_int = 0x0800;

/// Access mode requested at open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Access {
    #[default]
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

/// Open file flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenFlags {
    /// Read/write access mode.
    pub access: Access,
    /// Create if not exists.
    pub create: bool,
    /// Exclusive create (fail if exists).
    pub exclusive: bool,
    /// Truncate on open.
    pub truncate: bool,
    /// Append mode.
    pub append: bool,
}

impl OpenFlags {
    /// Read-only access.
    pub fn read() -> Self {
        Self::default()
    }

    /// Write-only access.
    pub fn write() -> Self {
        Self {
            access: Access::WriteOnly,
            ..Default::default()
        }
    }

    /// Read and write access.
    pub fn read_write() -> Self {
        Self {
            access: Access::ReadWrite,
            ..Default::default()
        }
    }

    /// Write-only, creating the file if needed.
    pub fn create() -> Self {
        Self::write().with_create()
    }

    /// Create exclusively (fail if exists).
    pub fn create_exclusive() -> Self {
        Self::create().with_exclusive()
    }

    /// Create and truncate.
    pub fn create_truncate() -> Self {
        Self::create().with_truncate()
    }

    pub fn with_create(mut self) -> Self {
        self.create = true;
        self
    }

    pub fn with_exclusive(mut self) -> Self {
        self.exclusive = true;
        self
    }

    pub fn with_truncate(mut self) -> Self {
        self.truncate = true;
        self
    }

    pub fn with_append(mut self) -> Self {
        self.append = true;
        self
    }

    /// Native `LFS_O_*` bits for these flags.
    pub fn bits(&self) -> c_int {
        let mut bits = match self.access {
            Access::ReadOnly => LFS_O_RDONLY,
            Access::WriteOnly => LFS_O_WRONLY,
            Access::ReadWrite => LFS_O_RDWR,
        };
        if self.create {
            bits |= LFS_O_CREAT;
        }
        if self.exclusive {
            bits |= LFS_O_EXCL;
        }
        if self.truncate {
            bits |= LFS_O_TRUNC;
        }
        if self.append {
            bits |= LFS_O_APPEND;
        }
        bits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_bits() {
        assert_eq!(OpenFlags::read().bits(), LFS_O_RDONLY);
        assert_eq!(OpenFlags::write().bits(), LFS_O_WRONLY);
        assert_eq!(OpenFlags::read_write().bits(), LFS_O_RDWR);
    }

    #[test]
    fn test_modifier_bits() {
        assert_eq!(OpenFlags::create().bits(), 0x0102);
        assert_eq!(OpenFlags::create_exclusive().bits(), 0x0302);
        assert_eq!(OpenFlags::create_truncate().bits(), 0x0502);
        assert_eq!(OpenFlags::read_write().with_append().bits(), 0x0803);
    }

    #[test]
    fn test_builder() {
        let flags = OpenFlags::create_exclusive();
        assert_eq!(flags.access, Access::WriteOnly);
        assert!(flags.create);
        assert!(flags.exclusive);
        assert!(!flags.truncate);
    }
}
