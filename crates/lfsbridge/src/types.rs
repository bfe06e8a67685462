//! Entry metadata and engine version.

use serde::{Deserialize, Serialize};
use std::ffi::CStr;

use littlefs2_sys as ll;

/// Native type tag of a regular file.
pub const LFS_TYPE_REG: u8 = 0x01;
/// Native type tag of a directory.
pub const LFS_TYPE_DIR: u8 = 0x02;

/// File type enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileType {
    /// Regular file.
    File,
    /// Directory.
    Directory,
}

impl FileType {
    /// Returns true if this is a regular file.
    pub fn is_file(&self) -> bool {
        matches!(self, FileType::File)
    }

    /// Returns true if this is a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self, FileType::Directory)
    }
}

/// Directory entry or stat result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// Entry name (not full path), at most 255 bytes.
    pub name: String,
    /// Size in bytes; zero for directories.
    pub size: u32,
    /// Entry type.
    pub kind: FileType,
}

impl Metadata {
    /// Create a file entry.
    pub fn file(name: impl Into<String>, size: u32) -> Self {
        Self {
            name: name.into(),
            size,
            kind: FileType::File,
        }
    }

    /// Create a directory entry.
    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size: 0,
            kind: FileType::Directory,
        }
    }

    pub fn is_file(&self) -> bool {
        self.kind.is_file()
    }

    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }

    /// Build from the engine's info record.
    pub(crate) fn from_info(info: &ll::lfs_info) -> Self {
        // SAFETY: the engine NUL-terminates `name` within the array.
        let name = unsafe { CStr::from_ptr(info.name.as_ptr()) };
        let kind = if info.type_ == LFS_TYPE_DIR {
            FileType::Directory
        } else {
            FileType::File
        };
        Self {
            name: name.to_string_lossy().into_owned(),
            size: if kind.is_dir() { 0 } else { info.size },
            kind,
        }
    }
}

/// Versions reported by the native engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    /// On-disk format (major, minor).
    pub format: (u32, u32),
    /// Engine release (major, minor).
    pub backend: (u32, u32),
}

/// Get information about the native engine.
pub fn version() -> Version {
    Version {
        format: (ll::LFS_DISK_VERSION_MAJOR, ll::LFS_DISK_VERSION_MINOR),
        backend: (ll::LFS_VERSION_MAJOR, ll::LFS_VERSION_MINOR),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_type() {
        assert!(FileType::File.is_file());
        assert!(!FileType::File.is_dir());
        assert!(FileType::Directory.is_dir());
    }

    #[test]
    fn test_metadata_constructors() {
        let file = Metadata::file("test.txt", 360);
        assert!(file.is_file());
        assert_eq!(file.size, 360);

        let dir = Metadata::directory("tmp");
        assert!(dir.is_dir());
        assert_eq!(dir.size, 0);
    }

    #[test]
    fn test_from_info() {
        // SAFETY: lfs_info is plain data.
        let mut info: ll::lfs_info = unsafe { std::mem::zeroed() };
        info.type_ = LFS_TYPE_REG;
        info.size = 42;
        for (dst, src) in info.name.iter_mut().zip(b"notes.txt") {
            *dst = *src as _;
        }
        assert_eq!(Metadata::from_info(&info), Metadata::file("notes.txt", 42));

        info.type_ = LFS_TYPE_DIR;
        assert_eq!(Metadata::from_info(&info), Metadata::directory("notes.txt"));
    }

    #[test]
    fn test_version() {
        let version = version();
        assert_eq!(version.backend.0, 2);
        assert_eq!(version.format.0, 2);
    }
}
