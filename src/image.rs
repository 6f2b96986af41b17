//! Input formats: the memory image and the breakpoint list.
//!
//! A memory image is a sequence of lines, each carrying two 4-digit
//! hexadecimal tokens `address value`; anything after the pair on a line is
//! ignored. The pair `0000 0000` is a sentinel ending the image (EOF ends
//! it too). The breakpoint list is a decimal count followed by that many
//! decimal addresses.
//!
//! Both parsers work over any `BufRead` and consume exactly what they need,
//! so the classic pipe protocol can read the breakpoint list, the image,
//! and then the program's own input from a single stream.

use crate::cpu::memory::MEMORY_SIZE;
use std::io::BufRead;
use std::path::Path;
use thiserror::Error;

/// A parsed memory image: `(address, word)` pairs in file order.
///
/// Later pairs overwrite earlier ones for the same address, matching the
/// order a sequential loader would apply them in.
#[derive(Debug, Clone, Default)]
pub struct MemoryImage {
    pub cells: Vec<(u16, u16)>,
}

impl MemoryImage {
    /// Number of loaded pairs.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Parse a memory image from a reader.
///
/// Stops at the `0000 0000` sentinel or EOF, leaving the rest of the
/// stream untouched for the caller.
pub fn parse_image<R: BufRead>(reader: &mut R) -> Result<MemoryImage, ImageError> {
    let mut image = MemoryImage::default();
    let mut line = String::new();
    let mut line_nr = 0;

    loop {
        line.clear();
        let n = reader
            .read_line(&mut line)
            .map_err(|e| ImageError::Io(e.to_string()))?;
        if n == 0 {
            break;
        }
        line_nr += 1;

        let mut tokens = line.split_whitespace();
        let addr_token = match tokens.next() {
            Some(t) => t,
            None => continue, // blank line
        };
        let value_token = match tokens.next() {
            Some(t) => t,
            None => {
                return Err(ImageError::Parse {
                    line: line_nr,
                    message: "expected an `address value` pair".into(),
                })
            }
        };
        // Anything after the pair on this line is ignored

        let addr = parse_hex(addr_token, line_nr)?;
        let word = parse_hex(value_token, line_nr)?;

        if addr == 0 && word == 0 {
            break;
        }
        if addr as usize >= MEMORY_SIZE {
            return Err(ImageError::AddressOutOfRange { addr });
        }

        image.cells.push((addr, word));
    }

    Ok(image)
}

fn parse_hex(token: &str, line_nr: usize) -> Result<u16, ImageError> {
    u16::from_str_radix(token, 16).map_err(|_| ImageError::Parse {
        line: line_nr,
        message: format!("invalid hex word {:?}", token),
    })
}

/// Load a memory image from disk.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<MemoryImage, ImageError> {
    let file = std::fs::File::open(path.as_ref()).map_err(|e| ImageError::Io(e.to_string()))?;
    let mut reader = std::io::BufReader::new(file);
    parse_image(&mut reader)
}

/// Parse a breakpoint list from a reader: a decimal count `n` followed by
/// `n` decimal addresses, separated by any whitespace.
pub fn parse_breakpoints<R: BufRead>(reader: &mut R) -> Result<Vec<u16>, ImageError> {
    let count = match next_token(reader)? {
        Some(t) => parse_decimal(&t)?,
        None => return Err(ImageError::BadBreakpoint("missing count".into())),
    };

    let mut addrs = Vec::with_capacity(count as usize);
    for i in 0..count {
        let addr = match next_token(reader)? {
            Some(t) => parse_decimal(&t)?,
            None => {
                return Err(ImageError::BadBreakpoint(format!(
                    "expected {} addresses, found {}",
                    count, i
                )))
            }
        };
        if addr as usize >= MEMORY_SIZE {
            return Err(ImageError::AddressOutOfRange { addr });
        }
        addrs.push(addr);
    }

    Ok(addrs)
}

fn parse_decimal(token: &str) -> Result<u16, ImageError> {
    token
        .parse::<u16>()
        .map_err(|_| ImageError::BadBreakpoint(format!("invalid decimal value {:?}", token)))
}

/// Consume the next whitespace-delimited token, or `None` at EOF.
fn next_token<R: BufRead>(reader: &mut R) -> Result<Option<String>, ImageError> {
    let mut token = String::new();

    loop {
        let buf = reader.fill_buf().map_err(|e| ImageError::Io(e.to_string()))?;
        if buf.is_empty() {
            break;
        }

        let mut consumed = 0;
        let mut complete = false;
        for &byte in buf {
            consumed += 1;
            if byte.is_ascii_whitespace() {
                if !token.is_empty() {
                    complete = true;
                    break;
                }
            } else {
                token.push(byte as char);
            }
        }
        reader.consume(consumed);

        if complete {
            break;
        }
    }

    if token.is_empty() {
        Ok(None)
    } else {
        Ok(Some(token))
    }
}

/// Errors that can occur while reading the input formats.
#[derive(Debug, Clone, Error)]
pub enum ImageError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("parse error on line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("invalid breakpoint list: {0}")]
    BadBreakpoint(String),

    #[error("address {addr:#06X} outside memory (0x0000-0x0FFF)")]
    AddressOutOfRange { addr: u16 },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn cursor(text: &str) -> Cursor<Vec<u8>> {
        Cursor::new(text.as_bytes().to_vec())
    }

    #[test]
    fn test_parse_pairs_until_sentinel() {
        let mut input = cursor("0000 1005\n0001 F000\n0005 002A\n0000 0000\n");

        let image = parse_image(&mut input).unwrap();

        assert_eq!(image.cells, vec![(0, 0x1005), (1, 0xF000), (5, 0x002A)]);
    }

    #[test]
    fn test_eof_ends_the_image_too() {
        let mut input = cursor("0002 0000\n");
        let image = parse_image(&mut input).unwrap();
        assert_eq!(image.cells, vec![(2, 0)]);
    }

    #[test]
    fn test_trailing_text_on_a_line_is_ignored() {
        let mut input = cursor("0000 1005 LOAD M(5)\n0000 0000 end of image\n");

        let image = parse_image(&mut input).unwrap();

        assert_eq!(image.cells, vec![(0, 0x1005)]);
    }

    #[test]
    fn test_blank_lines_are_skipped() {
        let mut input = cursor("\n0003 0007\n\n0000 0000\n");
        let image = parse_image(&mut input).unwrap();
        assert_eq!(image.len(), 1);
    }

    #[test]
    fn test_sentinel_leaves_the_rest_of_the_stream() {
        let mut input = cursor("0000 0000\n42\n");

        parse_image(&mut input).unwrap();

        let mut rest = String::new();
        input.read_line(&mut rest).unwrap();
        assert_eq!(rest, "42\n");
    }

    #[test]
    fn test_missing_value_is_an_error() {
        let mut input = cursor("0001\n");
        assert!(matches!(
            parse_image(&mut input),
            Err(ImageError::Parse { line: 1, .. })
        ));
    }

    #[test]
    fn test_bad_hex_is_an_error() {
        let mut input = cursor("zzzz 0001\n");
        assert!(matches!(
            parse_image(&mut input),
            Err(ImageError::Parse { line: 1, .. })
        ));
    }

    #[test]
    fn test_address_out_of_range_is_an_error() {
        let mut input = cursor("1000 0001\n");
        assert!(matches!(
            parse_image(&mut input),
            Err(ImageError::AddressOutOfRange { addr: 0x1000 })
        ));
    }

    #[test]
    fn test_parse_breakpoints() {
        let mut input = cursor("3\n10 20\n30\n");

        let addrs = parse_breakpoints(&mut input).unwrap();

        assert_eq!(addrs, vec![10, 20, 30]);
    }

    #[test]
    fn test_parse_no_breakpoints() {
        let mut input = cursor("0\n0000 0000\n");

        let addrs = parse_breakpoints(&mut input).unwrap();

        assert!(addrs.is_empty());
        // The image is still there for the next parser
        let image = parse_image(&mut input).unwrap();
        assert!(image.is_empty());
    }

    #[test]
    fn test_breakpoint_count_shortfall_is_an_error() {
        let mut input = cursor("2\n10\n");
        assert!(matches!(
            parse_breakpoints(&mut input),
            Err(ImageError::BadBreakpoint(_))
        ));
    }

    #[test]
    fn test_breakpoint_address_out_of_range() {
        let mut input = cursor("1\n4096\n");
        assert!(matches!(
            parse_breakpoints(&mut input),
            Err(ImageError::AddressOutOfRange { addr: 4096 })
        ));
    }

    #[test]
    fn test_full_pipe_prelude() {
        // Breakpoints, then image, then program input on one stream
        let mut input = cursor("1\n2\n0000 E000\n0001 F000\n0002 0000\n0000 0000\n-5\n");

        let bps = parse_breakpoints(&mut input).unwrap();
        let image = parse_image(&mut input).unwrap();

        assert_eq!(bps, vec![2]);
        assert_eq!(image.len(), 3);

        let mut rest = String::new();
        input.read_line(&mut rest).unwrap();
        assert_eq!(rest.trim(), "-5");
    }
}
