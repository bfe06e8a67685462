//! Block device backed by a single image file on the host filesystem.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::{BlockDevice, ERASED, byte_offset};
use crate::geometry::Geometry;

/// Image file addressed by byte offset `block * block_size + offset`.
#[derive(Debug)]
pub struct FileDevice {
    file: File,
    path: PathBuf,
    block_size: u32,
    capacity: u64,
}

impl FileDevice {
    /// Create (or overwrite) an image of `geometry.block_count` blank blocks.
    pub fn create(path: impl AsRef<Path>, geometry: &Geometry) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;

        let blank = vec![ERASED; geometry.block_size as usize];
        for _ in 0..geometry.block_count {
            file.write_all(&blank)?;
        }
        file.sync_all()?;

        tracing::debug!(path = %path.display(), blocks = geometry.block_count, "created block image");
        Ok(Self {
            file,
            path,
            block_size: geometry.block_size,
            capacity: geometry.capacity(),
        })
    }

    /// Attach to an existing image.
    ///
    /// The image must be at least as large as the geometry addresses.
    pub fn open(path: impl AsRef<Path>, geometry: &Geometry) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().read(true).write(true).open(&path)?;
        let len = file.metadata()?.len();
        if len < geometry.capacity() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "{} holds {} bytes, geometry needs {}",
                    path.display(),
                    len,
                    geometry.capacity()
                ),
            ));
        }
        Ok(Self {
            file,
            path,
            block_size: geometry.block_size,
            capacity: len,
        })
    }

    /// Get the image path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl BlockDevice for FileDevice {
    fn read_block(&mut self, block: u32, offset: u32, buf: &mut [u8]) -> io::Result<()> {
        let pos = byte_offset(self.block_size, block, offset, buf.len(), self.capacity)?;
        self.file.seek(SeekFrom::Start(pos))?;
        self.file.read_exact(buf)
    }

    fn program_block(&mut self, block: u32, offset: u32, buf: &[u8]) -> io::Result<()> {
        let pos = byte_offset(self.block_size, block, offset, buf.len(), self.capacity)?;
        self.file.seek(SeekFrom::Start(pos))?;
        self.file.write_all(buf)
    }

    fn erase_block(&mut self, block: u32) -> io::Result<()> {
        let len = self.block_size as usize;
        let pos = byte_offset(self.block_size, block, 0, len, self.capacity)?;
        self.file.seek(SeekFrom::Start(pos))?;
        self.file.write_all(&vec![ERASED; len])
    }

    fn sync(&mut self) -> io::Result<()> {
        self.file.sync_data()
    }

    fn capacity(&self) -> Option<u64> {
        Some(self.capacity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("flash.img");
        (dir, path)
    }

    #[test]
    fn test_create_writes_blank_image() {
        let (_dir, path) = setup();
        let geometry = Geometry::default();
        let dev = FileDevice::create(&path, &geometry).unwrap();
        assert_eq!(dev.capacity(), Some(geometry.capacity()));

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes.len() as u64, geometry.capacity());
        assert!(bytes.iter().all(|b| *b == ERASED));
    }

    #[test]
    fn test_program_persists() {
        let (_dir, path) = setup();
        let geometry = Geometry::default();
        let mut dev = FileDevice::create(&path, &geometry).unwrap();
        dev.program_block(3, 4, b"persist").unwrap();
        dev.sync().unwrap();
        drop(dev);

        let mut dev = FileDevice::open(&path, &geometry).unwrap();
        let mut buf = [0u8; 7];
        dev.read_block(3, 4, &mut buf).unwrap();
        assert_eq!(&buf, b"persist");

        dev.erase_block(3).unwrap();
        dev.read_block(3, 4, &mut buf).unwrap();
        assert_eq!(buf, [ERASED; 7]);
    }

    #[test]
    fn test_open_too_small() {
        let (_dir, path) = setup();
        std::fs::write(&path, [ERASED; 100]).unwrap();
        let err = FileDevice::open(&path, &Geometry::default()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}
