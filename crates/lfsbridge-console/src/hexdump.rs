//! `xxd`-style hex dumps.

use std::io::{self, Write};

/// Size of the console's scratch buffer, and the largest dump allowed.
pub const SCRATCH_LEN: usize = 512;

/// Bytes dumped when no size is given.
pub const DEFAULT_DUMP_LEN: usize = 64;

/// Write `bytes` as 16-byte rows labelled from `offset`.
pub fn hexdump(out: &mut impl Write, offset: u32, bytes: &[u8]) -> io::Result<()> {
    for (row, chunk) in bytes.chunks(16).enumerate() {
        write!(out, "{:08x}:", offset.wrapping_add(row as u32 * 16))?;
        for byte in chunk {
            write!(out, " {byte:02x}")?;
        }
        let padding = (16 - chunk.len()) * 3;
        write!(out, "{:padding$}    ", "")?;
        let text: String = chunk
            .iter()
            .map(|b| if b.is_ascii_graphic() || *b == b' ' { *b as char } else { '.' })
            .collect();
        writeln!(out, "{text:<16}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dump(offset: u32, bytes: &[u8]) -> String {
        let mut out = Vec::new();
        hexdump(&mut out, offset, bytes).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_full_row() {
        let text = dump(0xa0, b"littlefs\x00\x01\xffbridge");
        assert_eq!(
            text,
            "000000a0: 6c 69 74 74 6c 65 66 73 00 01 ff 62 72 69 64 67    littlefs...bridg\n\
             000000b0: 65                                                 e               \n"
        );
    }

    #[test]
    fn test_empty() {
        assert_eq!(dump(0, &[]), "");
    }

    #[test]
    fn test_row_count() {
        let text = dump(0, &[0xff; 64]);
        assert_eq!(text.lines().count(), 4);
        assert!(text.lines().all(|l| l.ends_with("................")));
    }
}
