//! # lfsbridge
//!
//! littlefs on any block device you can write in Rust.
//!
//! The native littlefs engine does all the filesystem work: wear leveling,
//! power-loss resilience, directory and file layout. This crate supplies
//! the rest:
//! - A [`BlockDevice`] trait, with memory, image-file and NOR flash backends
//! - The callback bridge the engine uses to reach the device
//! - Lifetime management so the device outlives every native callback
//! - A [`Filesystem`] instance with path operations and open [`Handle`]s
//! - Translation of open intents and native error codes
//!
//! ```no_run
//! use lfsbridge::{Filesystem, Geometry, MemoryDevice, OpenFlags};
//!
//! let geometry = Geometry::default();
//! let mut fs = Filesystem::new(geometry, MemoryDevice::from_geometry(&geometry));
//! fs.format()?;
//! fs.mount()?;
//! let mut file = fs.open("/hello.txt", OpenFlags::create())?;
//! file.write(b"hello")?;
//! file.close()?;
//! # Ok::<(), lfsbridge::Error>(())
//! ```

mod bridge;
pub mod device;
pub mod error;
pub mod flags;
mod fs;
pub mod geometry;
mod handle;
mod native;
pub mod registry;
mod types;

pub use device::{BlockDevice, FileDevice, FlashDevice, MemoryDevice, NorFlash, RamNorFlash, TracedDevice};
pub use error::{Error, Result};
pub use flags::{Access, OpenFlags};
pub use fs::Filesystem;
pub use geometry::Geometry;
pub use handle::{Handle, ReadDir};
pub use native::NAME_MAX;
pub use registry::DeviceToken;
pub use types::{FileType, Metadata, Version, version};
