//! Marker recognition over a live terminal byte stream.
//!
//! The Windows Telnet service has no framing of its own: the only way to know where the remote
//! shell is at is to watch for well-known text (prompts, sentinels) in what it prints. The
//! [`Scanner`] keeps the current terminal line and reports when that line *ends with* a marker.

use std::fmt;
use std::io;

const ESC: u8 = 27;

/// Only the tail of the current line is ever compared against or extracted from, so a line
/// that grows past this is cut back to its last `MAX_LINE / 2` bytes.
const MAX_LINE: usize = 8 * 1024;

/// Why a scan stopped before the expected marker showed up.
#[derive(Debug)]
pub(crate) enum ScanError {
    /// The stream ended.
    Eof,
    /// The reject marker matched.
    Rejected(String),
    /// `ESC [` was seen: the server renders VT100 rather than a plain stream.
    EscapeSequence,
    /// Reading from or writing to the transport failed.
    Io(io::Error),
}

impl From<io::Error> for ScanError {
    fn from(err: io::Error) -> Self {
        ScanError::Io(err)
    }
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanError::Eof => write!(f, "end of stream reached"),
            ScanError::Rejected(marker) => {
                write!(f, "unexpected string \"{}\" found in Telnet output", marker)
            }
            ScanError::EscapeSequence => write!(f, "VT100/ANSI escape sequence found"),
            ScanError::Io(e) => write!(f, "{}", e),
        }
    }
}

/// The scanning automaton.
///
/// State survives across calls to [`feed`](Scanner::feed), so a marker whose bytes arrive in
/// separate reads, or separate scans, is still recognized.
#[derive(Debug, Default)]
pub(crate) struct Scanner {
    line: Vec<u8>,
    last_was_cr: bool,
    last_was_esc: bool,
}

impl Scanner {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Account for one byte of terminal output.
    ///
    /// Returns `Ok(true)` the moment the current line ends with `expected`. A line ending with
    /// `reject` is reported as [`ScanError::Rejected`], and wins if both match at once.
    pub(crate) fn feed(
        &mut self,
        byte: u8,
        expected: &str,
        reject: Option<&str>,
    ) -> Result<bool, ScanError> {
        match byte {
            // the terminal is about to redraw the line
            b'\r' => self.line.clear(),
            b'\n' => {
                if !self.last_was_cr {
                    self.line.clear();
                }
            }
            b'[' if self.last_was_esc => return Err(ScanError::EscapeSequence),
            _ => {
                self.line.push(byte);
                if self.line.len() > MAX_LINE {
                    self.line.drain(..MAX_LINE / 2);
                }
            }
        }
        self.last_was_cr = byte == b'\r';
        self.last_was_esc = byte == ESC;

        if let Some(reject) = reject {
            if self.line.ends_with(reject.as_bytes()) {
                return Err(ScanError::Rejected(reject.to_owned()));
            }
        }

        Ok(self.line.ends_with(expected.as_bytes()))
    }

    /// The current terminal line, as seen since the last line reset.
    pub(crate) fn line(&self) -> &[u8] {
        &self.line
    }
}
