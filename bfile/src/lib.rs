//! Object-file formats for the Baby toolchain.
//!
//! A closed registry of formats connects the tools to the outside world:
//! loaders populate the store from an image file in two steps (`stat` scans
//! for the segment placement, `load` writes the words), writers serialize a
//! section to a file or to stdout.
//!
//! Format catalogue:
//!
//!  Name        | Loader | Writer | Notes
//! -------------|--------|--------|-------------------------------------
//! `binary`     | yes    | yes    | raw little-endian 32-bit words
//! `bits`       | yes    | yes    | one word per line of `01` characters, MSB first
//! `bits.ssem`  | yes    | yes    | as `bits`, bit-reversed (LSB first)
//! `bits.snp`   | yes    | yes    | `addr: bits` lines, LSB first, sequential from 0
//! `logisim`    | no     | yes    | `v2.0 raw` header plus one hex word per line

mod loader;
mod writer;


pub use crate::loader::{find_loader, loaders, Loader};
pub use crate::writer::{find_writer, write_section, writers, Writer};

use std::fmt;
use std::io;

use bcpu::Addr;

pub type Endian = byteorder::LittleEndian;

/// Bit order and addressing options of the textual formats.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct BitsFlags {
    /// Emit and consume words least-significant bit first, matching the
    /// historical SSEM layout.
    pub ssem: bool,
    /// Lines carry a decimal address prefix.
    pub addr: bool,
}

/// Placement of a loaded image.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct Segment {
    pub load_address: Addr,
    pub exec_address: Addr,
    pub length: Addr,
}

#[derive(Debug)]
pub enum Error {
    Io(io::Error),
    /// Malformed input, attributed to a format, file and line.
    Format {
        format: &'static str,
        path: String,
        line: u32,
    },
    /// An object file must be statted before it can be loaded.
    MissingStat,
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "{}", err),
            Error::Format { format, path, line } => {
                write!(f, "{}: {}:{}: format error", format, path, line)
            }
            Error::MissingStat => f.write_str("must stat object file before loading"),
        }
    }
}

impl std::error::Error for Error {}
