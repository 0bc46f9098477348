// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A streaming byte buffer that supports simultaneous forward and reverse
//! random-access readers over a single input source.
//!
//! The source may be a seekable object of known size (a file, a `Cursor`) or
//! an unseekable stream of unknown size (a pipe, a network socket). This
//! crate's [`Buffer`] is the substrate beneath any consumer that needs to
//! scan bytes from the front of an object and from the back at the same
//! time (for example a file-format sniffer checking a magic number at
//! offset 0 while a second thread checks for a trailer signature at the
//! end), without reading the underlying source any more than strictly
//! necessary, and without either scan blocking on the other beyond a single
//! fill.
//!
//! See [`Buffer`] for the six operations consumers use: [`Buffer::bind`],
//! [`Buffer::size`], [`Buffer::slice`], [`Buffer::eof_slice`],
//! [`Buffer::must_slice`], and [`Buffer::can_seek`].

mod buffer;
mod error;
mod event;
mod source;

pub use buffer::Buffer;
pub use error::{Error, Result};
pub use source::{NonSeekable, Source};
