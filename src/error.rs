// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `error` module defines the error type surfaced by every fallible
//! operation on [`Buffer`](crate::Buffer).

use std::fmt;

/// `Error` enumerates the only two kinds of failure a [`Buffer`](crate::Buffer)
/// can report.
#[derive(Debug)]
pub enum Error {
    /// Truncation at the true end of the source. Carries whatever bytes were
    /// available before hitting the end, which may be empty.
    ///
    /// This is an expected, idempotent condition, not a failure of the
    /// source: it is how [`Buffer::slice`](crate::Buffer::slice) and
    /// [`Buffer::eof_slice`](crate::Buffer::eof_slice) report that a request
    /// ran past the last byte of the source.
    EndOfInput(Vec<u8>),
    /// An opaque I/O error from the underlying source, propagated as-is.
    Io(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::EndOfInput(buf) => {
                write!(f, "end of input (truncated to {} byte(s))", buf.len())
            }
            Error::Io(err) => write!(f, "io error: {err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::EndOfInput(_) => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        match err.kind() {
            std::io::ErrorKind::UnexpectedEof => Error::EndOfInput(Vec::new()),
            _ => Error::Io(err),
        }
    }
}

impl Error {
    /// True if this is the end-of-input sentinel rather than a real I/O error.
    pub fn is_end_of_input(&self) -> bool {
        matches!(self, Error::EndOfInput(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unexpected_eof_reclassifies_to_end_of_input() {
        let io_err = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        let err: Error = io_err.into();
        assert!(err.is_end_of_input());
    }

    #[test]
    fn other_io_errors_pass_through() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
        let err: Error = io_err.into();
        assert!(!err.is_end_of_input());
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn end_of_input_carries_truncated_bytes() {
        let err = Error::EndOfInput(vec![1, 2, 3]);
        assert_eq!(err.to_string(), "end of input (truncated to 3 byte(s))");
    }
}
