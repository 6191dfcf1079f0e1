//! Writers: section → object file.

use std::fs::File;
use std::io::{self, BufWriter, Write as IoWrite};

use byteorder::WriteBytesExt;
use log::debug;

use bcpu::section::Section;
use bcpu::{Addr, UWord};

use crate::{BitsFlags, Endian, Result};

enum WriterKind {
    Binary,
    Bits,
    Logisim,
}

pub struct Writer {
    pub name: &'static str,
    kind: WriterKind,
    flags: BitsFlags,
}

static WRITERS: [Writer; 5] = [
    Writer {
        name: "logisim",
        kind: WriterKind::Logisim,
        flags: BitsFlags { ssem: false, addr: false },
    },
    Writer {
        name: "binary",
        kind: WriterKind::Binary,
        flags: BitsFlags { ssem: false, addr: false },
    },
    Writer {
        name: "bits",
        kind: WriterKind::Bits,
        flags: BitsFlags { ssem: false, addr: false },
    },
    Writer {
        name: "bits.ssem",
        kind: WriterKind::Bits,
        flags: BitsFlags { ssem: true, addr: false },
    },
    Writer {
        name: "bits.snp",
        kind: WriterKind::Bits,
        flags: BitsFlags { ssem: true, addr: true },
    },
];

pub fn writers() -> &'static [Writer] {
    &WRITERS
}

pub fn find_writer(name: &str) -> Option<&'static Writer> {
    WRITERS.iter().find(|w| w.name == name)
}

impl Writer {
    /// Serializes the section, covering addresses 0 through
    /// `org + length - 1`; addresses below the origin are emitted as zero
    /// fill.
    pub fn write(&self, out: &mut dyn IoWrite, section: &Section) -> io::Result<()> {
        let end = section.org() + section.length();
        match self.kind {
            WriterKind::Logisim => {
                out.write_all(b"v2.0 raw\n")?;
                for addr in 0..end {
                    writeln!(out, "{:08x}", section.value(addr) as UWord)?;
                }
            }
            WriterKind::Binary => {
                for addr in 0..end {
                    out.write_u32::<Endian>(section.value(addr) as UWord)?;
                }
            }
            WriterKind::Bits => {
                for addr in 0..end {
                    self.write_bits_line(out, addr, section.value(addr) as UWord)?;
                }
            }
        }
        debug!(target: "bfile", "words in output = {:#x}", end);
        Ok(())
    }

    fn write_bits_line(&self, out: &mut dyn IoWrite, addr: Addr, value: UWord) -> io::Result<()> {
        if self.flags.addr {
            write!(out, "{:04}: ", addr)?;
        }
        let mut line = [0u8; 33];
        for (pos, slot) in line[..32].iter_mut().enumerate() {
            let bit = if self.flags.ssem { pos } else { 31 - pos };
            *slot = if value & (1 << bit) != 0 { b'1' } else { b'0' };
        }
        line[32] = b'\n';
        out.write_all(&line)
    }
}

/// Writes a section to the named file, or to stdout for `-`.
pub fn write_section(path: &str, section: &Section, writer: &Writer) -> Result<()> {
    debug!(
        target: "bfile",
        "writing section org={:#x} length={:#x} as {}",
        section.org(),
        section.length(),
        writer.name
    );

    if path == "-" {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        writer.write(&mut handle, section)?;
        handle.flush()?;
    } else {
        let mut out = BufWriter::new(File::create(path)?);
        writer.write(&mut out, section)?;
        out.flush()?;
    }

    debug!(target: "bfile", "written {}", path);
    Ok(())
}
