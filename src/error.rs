//! Crate-wide error type and `Result` alias.

use core::fmt;
use core::result;
use std::error;
use std::io;

#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// The input does not begin with `\x7fELF`.
    BadMagic(u64),
    /// The input is structurally broken: truncated tables, an unsupported
    /// class or data encoding, an address outside every `PT_LOAD`, etc.
    Malformed(String),
    /// The two inputs disagree on a property that must match for a merge
    /// (class, byte order, relocation format).
    ShapeMismatch(String),
    /// A self-consistency check on otherwise well-formed inputs failed.
    Invariant(String),
    /// An error emitted by the scroll codec layer.
    Scroll(scroll::Error),
    /// An I/O error while reading an input or writing the output.
    IO(io::Error),
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Scroll(err) => Some(err),
            Error::IO(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::IO(err)
    }
}

impl From<scroll::Error> for Error {
    fn from(err: scroll::Error) -> Error {
        Error::Scroll(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::BadMagic(magic) => write!(fmt, "invalid ELF magic number: 0x{magic:x}"),
            Error::Malformed(msg) => write!(fmt, "malformed entity: {msg}"),
            Error::ShapeMismatch(msg) => write!(fmt, "input shape mismatch: {msg}"),
            Error::Invariant(msg) => write!(fmt, "invariant violated: {msg}"),
            Error::Scroll(err) => write!(fmt, "{err}"),
            Error::IO(err) => write!(fmt, "{err}"),
        }
    }
}

pub type Result<T> = result::Result<T, Error>;
