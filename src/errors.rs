use std::error;
use std::fmt;
use std::io;

use crate::page::PageId;

/// Errors produced by the node layer and the pagers backing it.
#[derive(Debug)]
pub enum Error {
    /// The node was not compressed, either because the payload did not shrink
    /// below the budget, a precondition failed, or it was never compressed.
    NotCompressed,
    /// The page or compressed payload is internally inconsistent.
    Corrupt(String),
    /// The destination buffer cannot hold the serialized node.
    BufferTooSmall {
        /// Bytes the node needs.
        needed: usize,
        /// Bytes the buffer has.
        available: usize,
    },
    /// The node holds more entries than a page header can count.
    TooManyEntries(usize),
    /// The page id is outside of the committed range.
    PageNotFound(PageId),
    /// A write was attempted through a read-only pager.
    ReadOnly,
    /// No database file exists and auto creation is disabled.
    DatabaseNotFound,
    /// The file header is not a jumpdb header.
    DatabaseInvalid,
    /// The file was created by an incompatible version or codec.
    DatabaseVersionMismatch,
    /// A wrapper around the IO error
    Io(io::Error),
}

impl Error {
    pub(crate) fn corrupt<S: Into<String>>(msg: S) -> Error {
        Error::Corrupt(msg.into())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::NotCompressed => write!(f, "Node is not compressed."),
            Error::Corrupt(ref msg) => write!(f, "Corrupt page: {}", msg),
            Error::BufferTooSmall { needed, available } => {
                write!(f,
                       "Page buffer too small: node needs {} bytes, buffer has {}.",
                       needed,
                       available)
            }
            Error::TooManyEntries(count) => {
                write!(f,
                       "Node holds {} entries, a page holds at most {}.",
                       count,
                       u16::max_value())
            }
            Error::PageNotFound(id) => write!(f, "Page {} is not allocated.", id),
            Error::ReadOnly => write!(f, "Database is opened in read-only mode."),
            Error::DatabaseNotFound => write!(f, "No valid database found at the given path."),
            Error::DatabaseInvalid => {
                write!(f,
                       "Invalid database. The file header is missing or does not \
                        describe a jumpdb file.")
            }
            Error::DatabaseVersionMismatch => {
                write!(f,
                       "Version mismatch. The data file was created with a different \
                        version or compression codec.")
            }
            Error::Io(ref err) => write!(f, "{}", err),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            Error::Io(ref err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = ::std::result::Result<T, Error>;
