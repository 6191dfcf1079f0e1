//! Loaders: object file → store.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use byteorder::ReadBytesExt;
use log::debug;
use regex::Regex;

use bcpu::memory::Vm;
use bcpu::{Addr, Word};

use crate::{BitsFlags, Endian, Error, Result, Segment};

enum LoaderKind {
    Binary,
    Bits,
}

pub struct Loader {
    pub name: &'static str,
    kind: LoaderKind,
    flags: BitsFlags,
}

static LOADERS: [Loader; 4] = [
    Loader {
        name: "binary",
        kind: LoaderKind::Binary,
        flags: BitsFlags { ssem: false, addr: false },
    },
    Loader {
        name: "bits",
        kind: LoaderKind::Bits,
        flags: BitsFlags { ssem: false, addr: false },
    },
    Loader {
        name: "bits.ssem",
        kind: LoaderKind::Bits,
        flags: BitsFlags { ssem: true, addr: false },
    },
    Loader {
        name: "bits.snp",
        kind: LoaderKind::Bits,
        flags: BitsFlags { ssem: true, addr: true },
    },
];

pub fn loaders() -> &'static [Loader] {
    &LOADERS
}

pub fn find_loader(name: &str) -> Option<&'static Loader> {
    LOADERS.iter().find(|l| l.name == name)
}

impl Loader {
    /// Scans the object file and reports where it loads, without touching
    /// any memory.
    pub fn stat<P: AsRef<Path>>(&self, path: P) -> Result<Segment> {
        match self.kind {
            LoaderKind::Binary => {
                let metadata = std::fs::metadata(path)?;
                Ok(Segment {
                    load_address: 0,
                    exec_address: 0,
                    length: (metadata.len() / 4) as Addr,
                })
            }
            LoaderKind::Bits => {
                let mut segment = Segment::default();
                self.bits_read(path.as_ref(), &mut segment, None)?;
                Ok(segment)
            }
        }
    }

    /// Loads the image into the store at the statted placement.
    pub fn load<P: AsRef<Path>>(&self, path: P, segment: &Segment, vm: &mut Vm) -> Result<()> {
        debug!(
            target: "bfile",
            "loading {} words from {} image",
            segment.length, self.name
        );
        match self.kind {
            LoaderKind::Binary => {
                let mut reader = BufReader::new(File::open(path)?);
                for i in 0..segment.length {
                    let word = reader.read_u32::<Endian>()? as Word;
                    vm.write_word(segment.load_address + i, word);
                }
                Ok(())
            }
            LoaderKind::Bits => {
                let mut segment = *segment;
                self.bits_read(path.as_ref(), &mut segment, Some(vm))
            }
        }
    }

    /// Shared scan/load pass over a textual bit image. With no `vm` this is
    /// the stat pass and fills in `segment`; with a `vm` it writes words at
    /// the segment's placement.
    fn bits_read(&self, path: &Path, segment: &mut Segment, mut vm: Option<&mut Vm>) -> Result<()> {
        let stmt = if self.flags.addr {
            Regex::new(r"^([[:digit:]]+): ([01]{32})[[:space:]]*(;.*)?$")
        } else {
            Regex::new(r"^([01]{32})[[:space:]]*(;.*)?$")
        }
        .expect("loader regex");
        let ignore = Regex::new(r"^[[:space:]]*(;.*)?$").expect("loader regex");

        if vm.is_some() && segment.length == 0 {
            return Err(Error::MissingStat);
        }

        let format_error = |line: usize| Error::Format {
            format: self.name,
            path: path.display().to_string(),
            line: line as u32,
        };

        let reader = BufReader::new(File::open(path)?);
        let mut max_addr: Addr = 0;

        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            let lineno = i + 1;

            let captures = match stmt.captures(&line) {
                Some(captures) => captures,
                None => {
                    if ignore.is_match(&line) {
                        continue;
                    }
                    return Err(format_error(lineno));
                }
            };

            let (addr, bits) = if self.flags.addr {
                let addr: Addr = captures[1].parse().map_err(|_| format_error(lineno))?;
                if addr != max_addr {
                    debug!(
                        target: "bfile",
                        "non-sequential address {} != {}", addr, max_addr
                    );
                    return Err(format_error(lineno));
                }
                (addr, captures.get(2).unwrap())
            } else {
                (max_addr, captures.get(1).unwrap())
            };

            if let Some(vm) = vm.as_deref_mut() {
                let mut value: u32 = 0;
                for (pos, c) in bits.as_str().bytes().enumerate() {
                    if c == b'1' {
                        let bit = if self.flags.ssem { pos } else { 31 - pos };
                        value |= 1 << bit;
                    }
                }
                vm.write_word(segment.load_address + addr, value as Word);
            }

            max_addr = addr + 1;
        }

        if vm.is_none() {
            segment.load_address = 0;
            segment.exec_address = 0;
            segment.length = max_addr;
        }

        Ok(())
    }
}
