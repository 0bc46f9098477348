// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `buffer` module implements [`Buffer`], a streaming byte store that
//! serves forward and reverse random-access slices over a single source
//! that is read at most once in sequence, plus at most one out-of-band seek
//! pair for tail prefetch.

use std::io::Read;
use std::sync::Mutex;

use crate::error::{Error, Result};
use crate::event::OneShotEvent;
use crate::source::Source;

/// The read-block size. Each call to [`fill`](Buffer::fill) advances
/// `written` by at most this many bytes.
const BLOCK: usize = 4096;

struct Inner {
    /// The bound source, or `None` before the first [`Buffer::bind`].
    src: Option<Box<dyn Source>>,
    /// Bytes read sequentially from offset 0. Only `main[..written]` is
    /// valid; the rest is unused capacity.
    main: Vec<u8>,
    /// The last `BLOCK` bytes of a large sized-seekable source, or empty if
    /// the source is opaque or not large enough to warrant a tail window.
    tail: Vec<u8>,
    /// Count of valid bytes at the front of `main`.
    written: usize,
    /// Total length of the source, known up front for sized-seekable
    /// sources, or set to `written` once an opaque/small source drains.
    size: usize,
    /// Set exactly once, when the source signals end-of-input.
    complete: bool,
    /// Guards the one-time tail prefetch.
    tail_prefetched: bool,
}

impl Inner {
    fn fresh() -> Inner {
        Inner {
            src: None,
            main: vec![0u8; 3 * BLOCK],
            tail: Vec::new(),
            written: 0,
            size: 0,
            complete: false,
            tail_prefetched: false,
        }
    }
}

/// A streaming byte buffer supporting concurrent forward and reverse
/// random-access reads over a single bound [`Source`].
///
/// See the [crate-level documentation](crate) for the intended usage
/// pattern. A `Buffer` is created once with [`Buffer::new`] and may be
/// rebound to a new source any number of times with [`Buffer::bind`];
/// rebinding discards all state from the previous source but reuses the
/// buffer's backing allocations where possible.
pub struct Buffer {
    inner: Mutex<Inner>,
    tail_ready: OneShotEvent,
    complete_event: OneShotEvent,
}

impl Default for Buffer {
    fn default() -> Self {
        Buffer::new()
    }
}

impl Buffer {
    /// Creates an unbound buffer. Call [`bind`](Buffer::bind) before using
    /// any of the other operations.
    pub fn new() -> Buffer {
        Buffer {
            inner: Mutex::new(Inner::fresh()),
            tail_ready: OneShotEvent::new(),
            complete_event: OneShotEvent::new(),
        }
    }

    /// Binds `source`, replacing any previously bound source and resetting
    /// all dynamic state (`written`, `complete`, the readiness events, the
    /// known size, and tail presence).
    ///
    /// A failed length probe (e.g. a `stat` that errors) is returned as
    /// `Error::Io`, distinct from a source that genuinely has no known
    /// length; the reset above still runs first, so the buffer ends up in a
    /// freshly-reset, unbound-equivalent state even on this path.
    ///
    /// Otherwise performs one initial [`fill`](Buffer::fill). End-of-input on
    /// that initial fill is not an error; it simply leaves the buffer
    /// [`complete`](Inner::complete). Any other error (e.g. a failed first
    /// read) is returned and leaves the buffer unbound in all but name:
    /// subsequent calls on it will behave as if bound to an already-exhausted
    /// empty source.
    pub fn bind<S>(&mut self, source: S) -> Result<()>
    where
        S: Source + 'static,
    {
        // Fresh event instances: old events, if any waiters remain on them,
        // stay fired forever for those stale waiters, which should not exist.
        self.tail_ready = OneShotEvent::new();
        self.complete_event = OneShotEvent::new();

        let mut guard = self.inner.lock().unwrap();
        let inner = &mut *guard;

        inner.written = 0;
        inner.complete = false;
        inner.tail_prefetched = false;
        inner.size = 0;
        inner.tail.clear();
        inner.src = Some(Box::new(source));

        let src = inner.src.as_ref().expect("just assigned above");
        let byte_len = src.byte_len()?;
        let seekable = src.is_seekable();

        if let (Some(len), true) = (byte_len, seekable) {
            let len = usize::try_from(len).expect("source length exceeds addressable memory");
            inner.size = len;
            if len > 3 * BLOCK {
                inner.tail.resize(BLOCK, 0);
            }
        }

        if inner.main.len() < 3 * BLOCK {
            inner.main.resize(3 * BLOCK, 0);
        }

        match self.fill(inner) {
            Ok(()) | Err(Error::EndOfInput(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Returns the total length of the source.
    ///
    /// Available immediately for sized-seekable sources. For opaque
    /// streams, blocks until the stream has fully drained.
    pub fn size(&self) -> usize {
        {
            let guard = self.inner.lock().unwrap();
            if guard.size > 0 {
                return guard.size;
            }
        }
        self.tail_ready.wait();
        self.inner.lock().unwrap().size
    }

    /// Returns the `len` bytes starting at absolute offset `offset` from the
    /// start of the source.
    ///
    /// If the request runs past the true end of the source, returns
    /// `Err(Error::EndOfInput(bytes))` carrying the truncated prefix
    /// (`main[offset..size]`), which may be empty if `offset` is itself past
    /// the end. Never panics and never returns more or fewer bytes than fit
    /// within the source.
    pub fn slice(&self, offset: usize, len: usize) -> Result<Vec<u8>> {
        let end = offset.checked_add(len).expect("offset + len overflowed usize");

        let mut guard = self.inner.lock().unwrap();
        let inner = &mut *guard;

        let mut fill_err = None;
        if end > inner.written && !inner.complete {
            loop {
                match self.fill(inner) {
                    Ok(()) => {
                        if inner.written >= end {
                            break;
                        }
                    }
                    Err(e) => {
                        fill_err = Some(e);
                        break;
                    }
                }
            }
        }

        match fill_err {
            None if !inner.complete => Ok(inner.main[offset..end].to_vec()),
            Some(Error::Io(io_err)) => Err(Error::Io(io_err)),
            // Either this call's fill hit end-of-input, or the buffer was
            // already complete from an earlier call (fill_err is None but
            // inner.complete is true). Either way the truncation rule is the
            // same: never return more or fewer bytes than are available.
            _ => {
                if end > inner.written {
                    if offset > inner.written {
                        Err(Error::EndOfInput(Vec::new()))
                    } else {
                        Err(Error::EndOfInput(inner.main[offset..inner.written].to_vec()))
                    }
                } else {
                    Ok(inner.main[offset..end].to_vec())
                }
            }
        }
    }

    /// Returns the `len` bytes ending at `offset_from_end` bytes before the
    /// end of the source, i.e. the bytes at absolute positions
    /// `[size - offset_from_end - len, size - offset_from_end)`. The
    /// returned bytes are in source order.
    ///
    /// Blocks until the tail region is known to be available, triggering a
    /// one-time tail prefetch for large sized-seekable sources or waiting
    /// for a full drain otherwise.
    ///
    /// Note: following the source this crate is modeled on, a request that
    /// exactly reaches the front of the source (`offset_from_end + len ==`
    /// the length of whichever buffer serves the request) is still reported
    /// as truncated via `Err(Error::EndOfInput(_))`, even though the
    /// returned byte count equals the requested count. Callers that only
    /// care about byte count should check the error payload's length rather
    /// than treating `Err` as "fewer bytes than requested".
    pub fn eof_slice(&self, offset_from_end: usize, len: usize) -> Result<Vec<u8>> {
        self.trigger_tail_prefetch()?;
        self.tail_ready.wait();

        let use_tail = {
            let guard = self.inner.lock().unwrap();
            !guard.tail.is_empty() && offset_from_end + len <= BLOCK
        };

        if use_tail {
            let guard = self.inner.lock().unwrap();
            return Self::truncate_from_end(&guard.tail, offset_from_end, len);
        }

        self.complete_event.wait();
        let guard = self.inner.lock().unwrap();
        Self::truncate_from_end(&guard.main[..guard.size], offset_from_end, len)
    }

    /// Dispatches to [`slice`](Buffer::slice) or [`eof_slice`](Buffer::eof_slice)
    /// depending on `reverse`, absorbing end-of-input silently and logging
    /// (at `warn` level) any other error instead of propagating it.
    ///
    /// Intended for callers, such as a byte-pattern scanner, that treat
    /// "ran off the edge of the source" as a normal terminal condition
    /// rather than a failure worth handling explicitly.
    pub fn must_slice(&self, offset: usize, len: usize, reverse: bool) -> Vec<u8> {
        let result = if reverse { self.eof_slice(offset, len) } else { self.slice(offset, len) };
        match result {
            Ok(buf) => buf,
            Err(Error::EndOfInput(buf)) => buf,
            Err(err) => {
                log::warn!(
                    "failed to slice from {offset} for length {len} (reverse: {reverse}): {err}"
                );
                Vec::new()
            }
        }
    }

    /// Reports whether absolute offset `offset` (or, if `reverse`,
    /// `size - offset`) is within the source, filling the buffer as needed
    /// to find out.
    ///
    /// Returns `Ok(true)` if reachable, `Err(Error::EndOfInput(_))` if
    /// `offset` is past the end of the source, and `Err(Error::Io(_))` on a
    /// real I/O error.
    pub fn can_seek(&self, offset: usize, reverse: bool) -> Result<bool> {
        let target = if reverse {
            let size = self.size();
            size.saturating_sub(offset)
        } else {
            offset
        };

        let mut guard = self.inner.lock().unwrap();
        let inner = &mut *guard;

        let mut fill_err = None;
        if target > inner.written {
            loop {
                match self.fill(inner) {
                    Ok(()) => {
                        if inner.written >= target {
                            break;
                        }
                    }
                    Err(e) => {
                        fill_err = Some(e);
                        break;
                    }
                }
            }
        }

        match fill_err {
            None => Ok(true),
            Some(Error::EndOfInput(_)) => {
                if target > inner.written {
                    Err(Error::EndOfInput(Vec::new()))
                } else {
                    Ok(true)
                }
            }
            Some(e) => Err(e),
        }
    }

    /// Triggers the one-time tail prefetch if this buffer has a tail region
    /// that hasn't been filled yet. A no-op for opaque streams and sources
    /// too small to have a tail.
    fn trigger_tail_prefetch(&self) -> Result<()> {
        {
            let guard = self.inner.lock().unwrap();
            if guard.tail.is_empty() || guard.tail_prefetched {
                return Ok(());
            }
        }

        let mut guard = self.inner.lock().unwrap();
        let inner = &mut *guard;

        // Re-check under the lock: another thread may have finished the
        // prefetch while we were waiting to acquire it.
        if inner.tail.is_empty() || inner.tail_prefetched {
            return Ok(());
        }

        let resume_at = inner.written as u64;
        let tail_start = (inner.size - inner.tail.len()) as u64;

        let src = inner.src.as_mut().expect("prefetch called on an unbound buffer");
        src.seek_to(tail_start)?;
        src.read_exact(&mut inner.tail)?;
        src.seek_to(resume_at)?;

        inner.tail_prefetched = true;
        drop(guard);
        self.tail_ready.fire();
        Ok(())
    }

    /// Advances `written` by up to `BLOCK` bytes. Must be called only while
    /// holding the write lock (i.e. with `inner` coming from a locked
    /// `self.inner`).
    ///
    /// Returns `Ok(())` if bytes were read and the source is not yet
    /// exhausted, or `Err(Error::EndOfInput(_))` the moment the source
    /// signals end-of-input (the payload is always empty; callers read
    /// `inner.written`/`inner.complete` directly rather than this error's
    /// payload).
    fn fill(&self, inner: &mut Inner) -> Result<()> {
        let at_known_capacity = inner.size > 0 && inner.main.len() >= inner.size;
        if !at_known_capacity && inner.main.len() - BLOCK < inner.written {
            Self::grow(inner);
        }

        // Tail-splice shortcut: only valid once the tail has actually been
        // populated by a prefetch. Gating on `tail_prefetched` (rather than
        // just "tail is non-empty") is what keeps this shortcut from ever
        // splicing in an unfilled tail buffer on a pure forward scan that
        // never triggers a reverse read (see DESIGN.md).
        if inner.tail_prefetched && inner.written + BLOCK >= inner.size {
            let remaining = inner.size - inner.written;
            let tail_start = inner.tail.len() - remaining;
            inner.main[inner.written..inner.written + remaining]
                .copy_from_slice(&inner.tail[tail_start..]);
            inner.written = inner.size;
            inner.complete = true;
            self.complete_event.fire();
            return Err(Error::EndOfInput(Vec::new()));
        }

        let start = inner.written;
        // Clamped to `main`'s actual capacity: once `grow` has resized `main`
        // to exactly the source's known size, `start + BLOCK` can overshoot
        // it for any size that isn't an exact multiple of `BLOCK` past the
        // growth point. Capping here avoids an out-of-bounds slice instead of
        // relying on `grow` to over-allocate.
        let target = (start + BLOCK).min(inner.main.len());
        let src = inner.src.as_mut().expect("fill called on an unbound buffer");

        // A single `read` call is free to return fewer bytes than asked for
        // without that meaning end-of-input (Rust's `Read` contract reserves
        // that meaning for a literal `Ok(0)`, unlike some readers' combined
        // n-plus-EOF-in-one-call convention). So this keeps reading until
        // either the full block is assembled or a read genuinely reports
        // `Ok(0)`, rather than mistaking a short read for completion.
        let mut pos = start;
        let mut hit_end = target == start;
        while pos < target {
            match src.read(&mut inner.main[pos..target]) {
                Ok(0) => {
                    hit_end = true;
                    break;
                }
                Ok(n) => pos += n,
                Err(e) => {
                    inner.written = pos;
                    return Err(e.into());
                }
            }
        }
        inner.written = pos;

        // For a source with a known size, reaching it is completion in its
        // own right: nothing requires an extra zero-byte read to confirm
        // what the size already told us, and `target` being clamped to
        // `main`'s capacity means the loop above can fill exactly to a known
        // size without ever seeing a literal `Ok(0)`.
        if inner.size > 0 && pos >= inner.size {
            hit_end = true;
        }

        if hit_end {
            inner.complete = true;
            self.complete_event.fire();
            if inner.tail.len() < BLOCK {
                inner.size = inner.written;
                self.tail_ready.fire();
            }
            Err(Error::EndOfInput(Vec::new()))
        } else {
            Ok(())
        }
    }

    /// Grows `main`, preserving `main[..written]`. If the source's total
    /// size is known, grows to exactly that size (we will need the whole
    /// file eventually); otherwise doubles capacity.
    fn grow(inner: &mut Inner) {
        let new_len = if inner.size > 0 { inner.size } else { inner.main.len() * 2 };
        let mut new_main = vec![0u8; new_len];
        new_main[..inner.written].copy_from_slice(&inner.main[..inner.written]);
        inner.main = new_main;
    }

    /// Shared truncation logic for [`eof_slice`](Buffer::eof_slice), applied
    /// to whichever backing buffer (`tail` or the drained `main`) is the
    /// chosen source of truth.
    fn truncate_from_end(buf: &[u8], offset_from_end: usize, len: usize) -> Result<Vec<u8>> {
        let buf_len = buf.len();
        if offset_from_end + len >= buf_len {
            if offset_from_end > buf_len {
                Err(Error::EndOfInput(Vec::new()))
            } else {
                Err(Error::EndOfInput(buf[..buf_len - offset_from_end].to_vec()))
            }
        } else {
            Ok(buf[buf_len - (offset_from_end + len)..buf_len - offset_from_end].to_vec())
        }
    }
}
