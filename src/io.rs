//! The I/O channel the IN and OUT instructions talk to.
//!
//! The core depends only on the [`IoChannel`] trait: one signed 16-bit
//! integer in, one out. `ConsoleIo` binds it to a reader/writer pair for
//! interactive or piped use; `ScriptedIo` is the in-memory binding used by
//! tests.

use std::collections::VecDeque;
use std::io::{BufRead, Write};
use thiserror::Error;

/// Capability surface required by the IN and OUT instructions.
///
/// `read_int` may block the whole simulation until a value is available;
/// there is no scheduling or cancellation around it.
pub trait IoChannel {
    /// Read one signed integer. Blocks until a value is available.
    fn read_int(&mut self) -> Result<i16, IoError>;

    /// Write one signed integer.
    fn write_int(&mut self, value: i16) -> Result<(), IoError>;
}

/// Errors an I/O channel can report.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IoError {
    #[error("input exhausted")]
    Exhausted,

    #[error("invalid integer: {0:?}")]
    InvalidInteger(String),

    #[error("stream error: {0}")]
    Stream(String),
}

/// Console binding: reads whitespace-separated signed decimal integers,
/// writes one integer per line.
#[derive(Debug)]
pub struct ConsoleIo<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> ConsoleIo<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Consume the next whitespace-delimited token from the input.
    fn next_token(&mut self) -> Result<Option<String>, IoError> {
        let mut token = String::new();

        loop {
            let buf = self
                .input
                .fill_buf()
                .map_err(|e| IoError::Stream(e.to_string()))?;
            if buf.is_empty() {
                // EOF: the token so far (possibly none) is all there is
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
            self.input.consume(consumed);

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
}

impl<R: BufRead, W: Write> IoChannel for ConsoleIo<R, W> {
    fn read_int(&mut self) -> Result<i16, IoError> {
        let token = self.next_token()?.ok_or(IoError::Exhausted)?;
        token
            .parse::<i16>()
            .map_err(|_| IoError::InvalidInteger(token))
    }

    fn write_int(&mut self, value: i16) -> Result<(), IoError> {
        writeln!(self.output, "{}", value).map_err(|e| IoError::Stream(e.to_string()))?;
        // Keep interactive sessions responsive when stdout is block-buffered
        self.output
            .flush()
            .map_err(|e| IoError::Stream(e.to_string()))
    }
}

/// Test-harness binding: a queue of canned inputs and a log of outputs.
#[derive(Debug, Clone, Default)]
pub struct ScriptedIo {
    pub inputs: VecDeque<i16>,
    pub outputs: Vec<i16>,
}

impl ScriptedIo {
    pub fn new(inputs: impl IntoIterator<Item = i16>) -> Self {
        Self {
            inputs: inputs.into_iter().collect(),
            outputs: Vec::new(),
        }
    }
}

impl IoChannel for ScriptedIo {
    fn read_int(&mut self) -> Result<i16, IoError> {
        self.inputs.pop_front().ok_or(IoError::Exhausted)
    }

    fn write_int(&mut self, value: i16) -> Result<(), IoError> {
        self.outputs.push(value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn console(input: &str) -> ConsoleIo<Cursor<Vec<u8>>, Vec<u8>> {
        ConsoleIo::new(Cursor::new(input.as_bytes().to_vec()), Vec::new())
    }

    #[test]
    fn test_read_single_integer() {
        let mut io = console("42\n");
        assert_eq!(io.read_int().unwrap(), 42);
    }

    #[test]
    fn test_read_negative_integer() {
        let mut io = console("-7\n");
        assert_eq!(io.read_int().unwrap(), -7);
    }

    #[test]
    fn test_reads_span_lines_and_spaces() {
        let mut io = console("  1 2\n\n  3\n");
        assert_eq!(io.read_int().unwrap(), 1);
        assert_eq!(io.read_int().unwrap(), 2);
        assert_eq!(io.read_int().unwrap(), 3);
    }

    #[test]
    fn test_read_at_eof_is_exhausted() {
        let mut io = console("");
        assert_eq!(io.read_int(), Err(IoError::Exhausted));

        let mut io = console("5");
        assert_eq!(io.read_int().unwrap(), 5);
        assert_eq!(io.read_int(), Err(IoError::Exhausted));
    }

    #[test]
    fn test_read_garbage_is_invalid() {
        let mut io = console("abc\n");
        assert!(matches!(io.read_int(), Err(IoError::InvalidInteger(_))));
    }

    #[test]
    fn test_read_out_of_range_is_invalid() {
        let mut io = console("40000\n");
        assert!(matches!(io.read_int(), Err(IoError::InvalidInteger(_))));
    }

    #[test]
    fn test_write_appends_newline() {
        let mut io = ConsoleIo::new(Cursor::new(Vec::new()), Vec::new());
        io.write_int(42).unwrap();
        io.write_int(-1).unwrap();
        assert_eq!(io.output, b"42\n-1\n");
    }

    #[test]
    fn test_scripted_io() {
        let mut io = ScriptedIo::new([1, 2]);
        assert_eq!(io.read_int().unwrap(), 1);
        assert_eq!(io.read_int().unwrap(), 2);
        assert_eq!(io.read_int(), Err(IoError::Exhausted));

        io.write_int(9).unwrap();
        assert_eq!(io.outputs, vec![9]);
    }
}
