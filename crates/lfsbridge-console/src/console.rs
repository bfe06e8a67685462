//! Line-oriented command loop over a [`Filesystem`].
//!
//! Every command writes its result, or its error, to the output and the
//! loop carries on; only `exit`/`quit` or the end of input stop it.

use std::io::{self, BufRead, Write};
use std::num::ParseIntError;
use std::str::FromStr;

use lfsbridge::{BlockDevice, FileType, Filesystem, Geometry, OpenFlags, TracedDevice};

use crate::error::{ConsoleError, ConsoleResult};
use crate::hexdump::{DEFAULT_DUMP_LEN, SCRATCH_LEN, hexdump};

pub const PROMPT: &str = "==> ";

/// Command table: name, arguments, summary.
const COMMANDS: &[(&str, &str, &str)] = &[
    ("help", "", "show this list"),
    ("dbg", "", "toggle tracing of block device calls"),
    ("lsblk", "", "show device geometry"),
    ("format", "", "format the device"),
    ("mnt", "", "mount the filesystem"),
    ("umount", "", "unmount the filesystem"),
    ("df", "", "show allocated blocks"),
    ("ls", "[path]", "list a directory"),
    ("stat", "<path>", "show entry metadata"),
    ("mkdir", "<path>", "create a directory"),
    ("rm", "<path>", "remove a file or empty directory"),
    ("mv", "<old> <new>", "rename an entry"),
    ("cat", "<path>", "print a file"),
    ("write", "<path> <text..>", "replace a file with a line of text"),
    ("append", "<path> <text..>", "append a line of text to a file"),
    ("truncate", "<path> <size>", "resize a file"),
    ("xxd", "<hex addr> [size]", "hex dump raw device bytes"),
    ("exit", "", "leave the console (also: quit)"),
];

/// Whether the loop keeps reading after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// Interactive console state.
pub struct Console<D: BlockDevice> {
    fs: Filesystem<TracedDevice<D>>,
    scratch: Box<[u8; SCRATCH_LEN]>,
}

impl<D: BlockDevice> Console<D> {
    pub fn new(geometry: Geometry, device: D) -> Self {
        Self {
            fs: Filesystem::new(geometry, TracedDevice::new(device)),
            scratch: Box::new([0; SCRATCH_LEN]),
        }
    }

    pub fn filesystem(&self) -> &Filesystem<TracedDevice<D>> {
        &self.fs
    }

    /// Unmount and hand the device back.
    pub fn into_device(self) -> D {
        self.fs.into_device().into_inner()
    }

    /// Read commands from `input` until it ends or a command exits.
    pub fn run(&mut self, input: impl BufRead, out: &mut impl Write) -> io::Result<()> {
        write!(out, "{PROMPT}")?;
        out.flush()?;
        for line in input.lines() {
            let line = line?;
            if self.execute(&line, out)? == Flow::Exit {
                break;
            }
            write!(out, "{PROMPT}")?;
            out.flush()?;
        }
        Ok(())
    }

    /// Run one command line.
    ///
    /// Command failures are written to `out`; only a failure to write to
    /// `out` itself is returned.
    pub fn execute(&mut self, line: &str, out: &mut impl Write) -> io::Result<Flow> {
        let argv: Vec<&str> = line.split_whitespace().collect();
        let Some((&cmd, args)) = argv.split_first() else {
            return Ok(Flow::Continue);
        };
        tracing::debug!(cmd, ?args, "command");

        let result = match cmd {
            "exit" | "quit" => return Ok(Flow::Exit),
            "help" => self.help(out),
            "dbg" => self.dbg(out),
            "lsblk" => self.lsblk(out),
            "format" => self.format(out),
            "mnt" => self.mount(out),
            "umount" => self.unmount(out),
            "df" => self.df(out),
            "ls" => self.ls(args, out),
            "stat" => self.stat(args, out),
            "mkdir" => self.mkdir(args, out),
            "rm" => self.remove(args, out),
            "mv" => self.rename(args, out),
            "cat" => self.cat(args, out),
            "write" => self.write(args, OpenFlags::create_truncate(), out),
            "append" => self.write(args, OpenFlags::create().with_append(), out),
            "truncate" => self.truncate(args, out),
            "xxd" => self.xxd(args, out),
            _ => {
                writeln!(out, "unknown command: {line}")?;
                return Ok(Flow::Continue);
            }
        };
        if let Err(e) = result {
            writeln!(out, "{cmd}: {e}")?;
        }
        Ok(Flow::Continue)
    }

    fn help(&self, out: &mut impl Write) -> ConsoleResult<()> {
        for (name, args, summary) in COMMANDS {
            writeln!(out, "  {:<28} {summary}", format!("{name} {args}"))?;
        }
        Ok(())
    }

    fn dbg(&mut self, out: &mut impl Write) -> ConsoleResult<()> {
        let device = self.fs.device_mut();
        let enabled = !device.enabled();
        device.set_enabled(enabled);
        writeln!(out, "Console debugging {}", if enabled { "on" } else { "off" })?;
        Ok(())
    }

    fn lsblk(&mut self, out: &mut impl Write) -> ConsoleResult<()> {
        let geometry = *self.fs.geometry();
        let capacity = self.fs.device_mut().capacity();
        writeln!(out, "read size:      {}", geometry.read_size)?;
        writeln!(out, "prog size:      {}", geometry.prog_size)?;
        writeln!(out, "block size:     {}", geometry.block_size)?;
        writeln!(out, "block count:    {}", geometry.block_count)?;
        writeln!(out, "cache size:     {}", geometry.cache_size)?;
        writeln!(out, "lookahead size: {}", geometry.lookahead_size)?;
        writeln!(out, "block cycles:   {}", geometry.block_cycles)?;
        match capacity {
            Some(bytes) => writeln!(out, "device size:    {bytes}")?,
            None => writeln!(out, "device size:    unknown")?,
        }
        writeln!(out, "mounted:        {}", self.fs.is_mounted())?;
        Ok(())
    }

    fn format(&mut self, out: &mut impl Write) -> ConsoleResult<()> {
        match self.fs.format() {
            Ok(()) => writeln!(out, "Successfully formatted LittleFS filesystem.")?,
            Err(e) => writeln!(out, "Could not format LittleFS filesystem: {e}")?,
        }
        Ok(())
    }

    fn mount(&mut self, out: &mut impl Write) -> ConsoleResult<()> {
        match self.fs.mount() {
            Ok(()) => writeln!(out, "Successfully mounted LittleFS filesystem.")?,
            Err(e) => writeln!(out, "Could not mount LittleFS filesystem: {e}")?,
        }
        Ok(())
    }

    fn unmount(&mut self, out: &mut impl Write) -> ConsoleResult<()> {
        match self.fs.unmount() {
            Ok(()) => writeln!(out, "Successfully unmounted LittleFS filesystem.")?,
            Err(e) => writeln!(out, "Could not unmount LittleFS filesystem: {e}")?,
        }
        Ok(())
    }

    fn df(&self, out: &mut impl Write) -> ConsoleResult<()> {
        let geometry = self.fs.geometry();
        let used = self.fs.size()?;
        writeln!(
            out,
            "{used} of {} blocks used ({} bytes)",
            geometry.block_count,
            u64::from(used) * u64::from(geometry.block_size)
        )?;
        Ok(())
    }

    fn ls(&self, args: &[&str], out: &mut impl Write) -> ConsoleResult<()> {
        let path = args.first().copied().unwrap_or("/");
        let mut dir = self.fs.open_dir(path)?;
        for entry in dir.readdir()? {
            let entry = entry?;
            match entry.kind {
                FileType::Directory => writeln!(out, "{:>8}  {}/", "-", entry.name)?,
                FileType::File => writeln!(out, "{:>8}  {}", entry.size, entry.name)?,
            }
        }
        dir.close()?;
        Ok(())
    }

    fn stat(&self, args: &[&str], out: &mut impl Write) -> ConsoleResult<()> {
        let [path] = args else {
            return Err(ConsoleError::Usage("stat <path>"));
        };
        let meta = self.fs.stat(path)?;
        writeln!(out, "name={} size={} dir={}", meta.name, meta.size, meta.is_dir())?;
        Ok(())
    }

    fn mkdir(&self, args: &[&str], _out: &mut impl Write) -> ConsoleResult<()> {
        let [path] = args else {
            return Err(ConsoleError::Usage("mkdir <path>"));
        };
        Ok(self.fs.mkdir(path)?)
    }

    fn remove(&self, args: &[&str], _out: &mut impl Write) -> ConsoleResult<()> {
        let [path] = args else {
            return Err(ConsoleError::Usage("rm <path>"));
        };
        Ok(self.fs.remove(path)?)
    }

    fn rename(&self, args: &[&str], _out: &mut impl Write) -> ConsoleResult<()> {
        let [from, to] = args else {
            return Err(ConsoleError::Usage("mv <old> <new>"));
        };
        Ok(self.fs.rename(from, to)?)
    }

    fn cat(&mut self, args: &[&str], out: &mut impl Write) -> ConsoleResult<()> {
        let [path] = args else {
            return Err(ConsoleError::Usage("cat <path>"));
        };
        let mut file = self.fs.open_file(path, OpenFlags::read())?;
        loop {
            let n = file.read(&mut self.scratch[..])?;
            if n == 0 {
                break;
            }
            out.write_all(&self.scratch[..n])?;
        }
        file.close()?;
        Ok(())
    }

    fn write(&self, args: &[&str], flags: OpenFlags, out: &mut impl Write) -> ConsoleResult<()> {
        let Some((path, words)) = args.split_first() else {
            return Err(ConsoleError::Usage("write|append <path> <text..>"));
        };
        let mut text = words.join(" ");
        text.push('\n');

        let mut file = self.fs.open_file(path, flags)?;
        io::Write::write_all(&mut file, text.as_bytes())?;
        file.close()?;
        writeln!(out, "wrote {} bytes to {path}", text.len())?;
        Ok(())
    }

    fn truncate(&self, args: &[&str], _out: &mut impl Write) -> ConsoleResult<()> {
        let [path, size] = args else {
            return Err(ConsoleError::Usage("truncate <path> <size>"));
        };
        let size: u32 = parse_number(size)?;
        let mut file = self.fs.open_file(path, OpenFlags::write())?;
        file.truncate(size)?;
        file.close()?;
        Ok(())
    }

    fn xxd(&mut self, args: &[&str], out: &mut impl Write) -> ConsoleResult<()> {
        let (addr, len) = match args {
            [addr] => (parse_hex(addr)?, DEFAULT_DUMP_LEN),
            [addr, len] => (parse_hex(addr)?, parse_number(len)?),
            _ => return Err(ConsoleError::Usage("xxd <hex address, ex: 0xA0> [size of hexdump in bytes]")),
        };
        if !(1..=SCRATCH_LEN).contains(&len) {
            return Err(ConsoleError::DumpSize(len));
        }

        let block_size = u64::from(self.fs.geometry().block_size.max(1));
        let device = self.fs.device_mut();
        let buf = &mut self.scratch[..len];
        let mut pos = u64::from(addr);
        let mut filled = 0;
        while filled < len {
            let offset = pos % block_size;
            let n = ((block_size - offset) as usize).min(len - filled);
            device.read_block((pos / block_size) as u32, offset as u32, &mut buf[filled..filled + n])?;
            filled += n;
            pos += n as u64;
        }
        hexdump(out, addr, buf)?;
        Ok(())
    }
}

fn parse_number<T: FromStr<Err = ParseIntError>>(arg: &str) -> ConsoleResult<T> {
    arg.parse().map_err(|source| ConsoleError::InvalidNumber {
        arg: arg.to_owned(),
        source,
    })
}

fn parse_hex(arg: &str) -> ConsoleResult<u32> {
    let digits = arg
        .strip_prefix("0x")
        .or_else(|| arg.strip_prefix("0X"))
        .unwrap_or(arg);
    u32::from_str_radix(digits, 16).map_err(|source| ConsoleError::InvalidNumber {
        arg: arg.to_owned(),
        source,
    })
}
