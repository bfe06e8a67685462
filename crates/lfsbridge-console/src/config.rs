//! Console setup: geometry loading and backend selection.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use lfsbridge::{BlockDevice, FileDevice, FlashDevice, Geometry, MemoryDevice, RamNorFlash};

use crate::error::{ConsoleError, ConsoleResult};

/// Backend the console runs against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    /// Scratch device in memory
    #[default]
    Memory,
    /// Image file on disk (--image)
    File,
    /// Simulated NOR flash chip
    Flash,
}

/// Page size of the simulated flash chip.
pub const FLASH_PAGE_SIZE: u32 = 256;
/// Sector (and block) size of the simulated flash chip.
pub const FLASH_SECTOR_SIZE: u32 = 4096;
/// Size of the simulated flash chip.
pub const FLASH_TOTAL_SIZE: u32 = 1024 * 1024;

/// Everything needed to build the console's device.
#[derive(Debug, Clone, Default)]
pub struct DeviceConfig {
    pub kind: DeviceKind,
    pub image: Option<PathBuf>,
    pub geometry: Option<PathBuf>,
    pub block_size: Option<u32>,
    pub block_count: Option<u32>,
}

/// Expand `~` in a user-supplied path.
pub fn expand_path(raw: &str) -> PathBuf {
    shellexpand::tilde(raw).as_ref().into()
}

/// Load a RON geometry file.
pub fn load_geometry(path: &Path) -> ConsoleResult<Geometry> {
    let text = std::fs::read_to_string(path).map_err(|source| ConsoleError::ReadConfig {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(ron::from_str(&text)?)
}

impl DeviceConfig {
    /// Resolve the geometry: file or backend default, then flag overrides.
    pub fn geometry(&self) -> ConsoleResult<Geometry> {
        let mut geometry = match &self.geometry {
            Some(path) => load_geometry(path)?,
            None if self.kind == DeviceKind::Flash => {
                Geometry::for_flash(FLASH_PAGE_SIZE, FLASH_SECTOR_SIZE, FLASH_TOTAL_SIZE)
            }
            None => Geometry::default(),
        };
        if let Some(block_size) = self.block_size {
            geometry = geometry.with_block_size(block_size);
        }
        if let Some(block_count) = self.block_count {
            geometry = geometry.with_block_count(block_count);
        }
        Ok(geometry)
    }

    /// Build the backend for `geometry`.
    ///
    /// An existing image file is reused; a missing one is created blank.
    pub fn open_device(&self, geometry: &Geometry) -> ConsoleResult<Box<dyn BlockDevice + Send>> {
        let device: Box<dyn BlockDevice + Send> = match self.kind {
            DeviceKind::Memory => Box::new(MemoryDevice::from_geometry(geometry)),
            DeviceKind::File => {
                let path = self.image.as_deref().ok_or(ConsoleError::MissingImage)?;
                if path.exists() {
                    tracing::info!(path = %path.display(), "opening image");
                    Box::new(FileDevice::open(path, geometry)?)
                } else {
                    tracing::info!(path = %path.display(), "creating image");
                    Box::new(FileDevice::create(path, geometry)?)
                }
            }
            DeviceKind::Flash => {
                let sector = FLASH_SECTOR_SIZE.min(geometry.block_size);
                let chip = RamNorFlash::new(
                    geometry.prog_size,
                    sector,
                    geometry.block_count * (geometry.block_size / sector.max(1)),
                );
                Box::new(FlashDevice::new(chip, geometry.block_size)?)
            }
        };
        Ok(device)
    }
}
