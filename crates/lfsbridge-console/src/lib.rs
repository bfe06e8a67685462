//! Interactive console for littlefs devices.
//!
//! Drives a [`lfsbridge::Filesystem`] from text commands, one per line, over
//! a memory device, an image file or a simulated NOR flash chip.

pub mod config;
pub mod console;
pub mod error;
pub mod hexdump;

pub use config::{DeviceConfig, DeviceKind};
pub use console::{Console, Flow, PROMPT};
pub use error::{ConsoleError, ConsoleResult};
