//! lfsbridge console binary.
//!
//! Usage:
//!   # Scratch filesystem in memory
//!   cargo run -p lfsbridge-console -- --format
//!
//!   # Image file, created on first use
//!   cargo run -p lfsbridge-console -- --device file --image ~/lfs.img
//!
//!   # Simulated 1 MiB NOR flash, geometry from a RON file
//!   cargo run -p lfsbridge-console -- --device flash --geometry flash.ron
//!
//! Set `RUST_LOG=lfsbridge=debug` and use `dbg` to watch block device calls.

use anyhow::{Context, Result};
use clap::Parser;
use std::io;
use tracing_subscriber::{EnvFilter, fmt};

use lfsbridge_console::{Console, DeviceConfig, DeviceKind, config::expand_path};

/// Interactive littlefs console.
#[derive(Parser, Debug)]
#[command(name = "lfsbridge-console")]
#[command(about = "Interactive console for littlefs block devices")]
struct Args {
    /// Backend to run against
    #[arg(short, long, value_enum, default_value_t = DeviceKind::Memory)]
    device: DeviceKind,

    /// Image file for the file backend (created if missing)
    #[arg(short, long)]
    image: Option<String>,

    /// RON file with the filesystem geometry
    #[arg(short, long)]
    geometry: Option<String>,

    /// Override the block size from the geometry
    #[arg(long)]
    block_size: Option<u32>,

    /// Override the block count from the geometry
    #[arg(long)]
    block_count: Option<u32>,

    /// Format and mount before reading commands
    #[arg(short, long)]
    format: bool,
}

fn main() -> Result<()> {
    // Logs go to stderr; stdout belongs to the console
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = DeviceConfig {
        kind: args.device,
        image: args.image.as_deref().map(expand_path),
        geometry: args.geometry.as_deref().map(expand_path),
        block_size: args.block_size,
        block_count: args.block_count,
    };

    let geometry = config.geometry().context("loading geometry")?;
    let device = config.open_device(&geometry).context("opening device")?;
    tracing::info!(kind = ?config.kind, ?geometry, "device ready");

    let version = lfsbridge::version();
    println!(
        "LittleFS version {}.{} (disk format {}.{})",
        version.backend.0, version.backend.1, version.format.0, version.format.1
    );

    let mut console = Console::new(geometry, device);
    let mut stdout = io::stdout().lock();
    if args.format {
        console.execute("format", &mut stdout)?;
        console.execute("mnt", &mut stdout)?;
    }
    console.run(io::stdin().lock(), &mut stdout)?;

    // Dropping the console unmounts before the device goes away
    drop(console);
    tracing::info!("console closed");
    Ok(())
}
