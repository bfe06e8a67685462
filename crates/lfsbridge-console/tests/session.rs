//! Scripted console sessions.

use std::io::Cursor;

use lfsbridge::{FileDevice, Geometry, MemoryDevice};
use lfsbridge_console::{Console, DeviceConfig, DeviceKind, PROMPT};
use tempfile::TempDir;

fn run_script<D: lfsbridge::BlockDevice>(console: &mut Console<D>, script: &str) -> String {
    let mut out = Vec::new();
    console.run(Cursor::new(script), &mut out).unwrap();
    String::from_utf8(out).unwrap()
}

fn memory_console() -> Console<MemoryDevice> {
    let geometry = Geometry::default();
    Console::new(geometry, MemoryDevice::from_geometry(&geometry))
}

#[test]
fn test_file_commands() {
    let mut console = memory_console();
    let out = run_script(
        &mut console,
        "format\n\
         mnt\n\
         mkdir /tmp\n\
         write /tmp/hello.txt hello littlefs\n\
         append /tmp/hello.txt second line\n\
         cat /tmp/hello.txt\n\
         stat /tmp/hello.txt\n\
         ls /tmp\n\
         mv /tmp/hello.txt /greeting\n\
         ls\n\
         truncate /greeting 5\n\
         cat /greeting\n\
         rm /greeting\n\
         stat /greeting\n",
    );

    assert!(out.starts_with(PROMPT));
    assert!(out.contains("Successfully formatted LittleFS filesystem.\n"));
    assert!(out.contains("Successfully mounted LittleFS filesystem.\n"));
    assert!(out.contains("wrote 15 bytes to /tmp/hello.txt\n"));
    assert!(out.contains("hello littlefs\nsecond line\n"));
    assert!(out.contains("name=hello.txt size=27 dir=false\n"));
    assert!(out.contains("      27  hello.txt\n"));
    assert!(out.contains("       -  tmp/\n"));
    assert!(out.contains(&format!("{PROMPT}hello{PROMPT}")));
    assert!(out.contains("stat: no directory entry\n"));
    assert!(console.filesystem().is_mounted());
}

#[test]
fn test_exit_stops_reading() {
    let mut console = memory_console();
    let out = run_script(&mut console, "help\nexit\nformat\n");
    assert!(out.contains("xxd <hex addr> [size]"));
    assert!(!out.contains("formatted"));
}

#[test]
fn test_df_and_lsblk() {
    let mut console = memory_console();
    let out = run_script(&mut console, "lsblk\nformat\nmnt\ndf\numount\ndf\n");
    assert!(out.contains("block count:    32\n"));
    assert!(out.contains("device size:    16384\n"));
    assert!(out.contains(" of 32 blocks used ("));
    assert!(out.contains("Successfully unmounted LittleFS filesystem.\n"));
    assert!(out.contains("df: invalid parameter\n"));
}

#[test]
fn test_format_while_mounted_is_reported() {
    let mut console = memory_console();
    let out = run_script(&mut console, "format\nmnt\nformat\n");
    assert!(out.contains("Could not format LittleFS filesystem: invalid parameter\n"));
}

#[test]
fn test_xxd_shows_superblock() {
    let mut console = memory_console();
    let out = run_script(&mut console, "format\nxxd 0 512\nxxd 0x200 512\n");
    let rows = out
        .lines()
        .filter(|l| l.trim_start_matches(PROMPT).starts_with("00000"))
        .count();
    assert_eq!(rows, 64);
    // The superblock lives in the block 0/1 metadata pair.
    assert!(out.contains("littlefs"));
}

#[test]
fn test_image_survives_console() {
    let tmp = TempDir::new().unwrap();
    let image = tmp.path().join("console.img");
    let config = DeviceConfig {
        kind: DeviceKind::File,
        image: Some(image.clone()),
        ..Default::default()
    };
    let geometry = config.geometry().unwrap();

    let mut console = Console::new(geometry, config.open_device(&geometry).unwrap());
    run_script(&mut console, "format\nmnt\nwrite /note kept\nexit\n");
    drop(console);

    let mut console = Console::new(geometry, FileDevice::open(&image, &geometry).unwrap());
    let out = run_script(&mut console, "mnt\ncat /note\n");
    assert!(out.contains("kept\n"));
    let device = console.into_device();
    assert_eq!(device.path(), image.as_path());
}

#[test]
fn test_flash_console() {
    let config = DeviceConfig {
        kind: DeviceKind::Flash,
        block_count: Some(32),
        ..Default::default()
    };
    let geometry = config.geometry().unwrap();
    let mut console = Console::new(geometry, config.open_device(&geometry).unwrap());
    let out = run_script(&mut console, "format\nmnt\nmkdir /logs\nls\n");
    assert!(out.contains("Successfully mounted LittleFS filesystem.\n"));
    assert!(out.contains("       -  logs/\n"));
}
