// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Generic support for both sized-seekable and opaque-stream input sources.

use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom};

/// A `Source` is anything a [`Buffer`](crate::Buffer) can be bound to: a
/// sequential byte reader that can optionally report its total length and
/// support absolute seeking.
///
/// `is_seekable` and `byte_len` may each be moderately expensive (e.g. a
/// `stat` syscall); [`Buffer::bind`](crate::Buffer::bind) calls them exactly
/// once per binding and caches the result for the binding's lifetime.
pub trait Source: Read + Send {
    /// Returns `true` if this source supports [`seek_to`](Source::seek_to).
    fn is_seekable(&self) -> bool;

    /// Returns the total length of the source in bytes, if known up front,
    /// or `Ok(None)` if the source is genuinely opaque.
    ///
    /// A source that returns `Ok(Some(_))` here but `false` from
    /// [`is_seekable`](Source::is_seekable) is treated as opaque; both
    /// capabilities are required together to qualify for tail prefetch. A
    /// real probing failure (e.g. a failed `stat`) must be returned as
    /// `Err`, not folded into `Ok(None)`; [`Buffer::bind`](crate::Buffer::bind)
    /// propagates that error rather than silently downgrading the source to
    /// opaque.
    fn byte_len(&self) -> io::Result<Option<u64>>;

    /// Seeks to an absolute byte offset from the start of the source.
    ///
    /// Only ever called if [`is_seekable`](Source::is_seekable) returned
    /// `true`. Implementations that are never seekable may simply return an
    /// error.
    fn seek_to(&mut self, pos: u64) -> io::Result<u64>;
}

impl Source for File {
    /// Queries the file's metadata to determine seekability.
    ///
    /// Note: this involves a syscall and may be moderately expensive; the
    /// result is cached for the lifetime of a binding.
    fn is_seekable(&self) -> bool {
        matches!(self.metadata(), Ok(metadata) if metadata.is_file())
    }

    fn byte_len(&self) -> io::Result<Option<u64>> {
        Ok(Some(self.metadata()?.len()))
    }

    fn seek_to(&mut self, pos: u64) -> io::Result<u64> {
        self.seek(SeekFrom::Start(pos))
    }
}

impl<T: AsRef<[u8]> + Send> Source for Cursor<T> {
    /// Always seekable: an in-memory cursor has no I/O to fail.
    fn is_seekable(&self) -> bool {
        true
    }

    fn byte_len(&self) -> io::Result<Option<u64>> {
        Ok(Some(self.get_ref().as_ref().len() as u64))
    }

    fn seek_to(&mut self, pos: u64) -> io::Result<u64> {
        self.seek(SeekFrom::Start(pos))
    }
}

/// Wraps any [`Read`]er that does not support seeking or a known length,
/// adapting it into an opaque-stream [`Source`].
///
/// Use this for pipes, sockets, or any other reader whose total size is not
/// known ahead of time and that cannot be rewound.
pub struct NonSeekable<R: Read + Send> {
    inner: R,
}

impl<R: Read + Send> NonSeekable<R> {
    /// Wraps `inner` as an opaque, unseekable [`Source`].
    pub fn new(inner: R) -> Self {
        NonSeekable { inner }
    }

    /// Unwraps this `NonSeekable`, returning the underlying reader.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read + Send> Read for NonSeekable<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<R: Read + Send> Source for NonSeekable<R> {
    fn is_seekable(&self) -> bool {
        false
    }

    fn byte_len(&self) -> io::Result<Option<u64>> {
        Ok(None)
    }

    fn seek_to(&mut self, _pos: u64) -> io::Result<u64> {
        Err(io::Error::new(io::ErrorKind::Unsupported, "source does not support seeking"))
    }
}
