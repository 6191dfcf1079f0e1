//! Abstract disassembly.
//!
//! Every stored word decodes to *something*, so the disassembler keeps two
//! readings per word: the preferred one and the alternative, emitted as a
//! trailing comment. A word reads as data when it cannot be a sensible
//! instruction or when an instruction names it as an operand; operand
//! targets get auto-generated labels so the output reassembles to the
//! original image.

use std::collections::BTreeMap;
use std::io::{self, Write};

use log::debug;

use bcpu::arch::{self, Arch, Decoded, MnemKind, Opcode};
use bcpu::memory::Vm;
use bcpu::{Addr, Word};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum WordClass {
    Code,
    Data,
}

struct DisWord {
    word: Word,
    decoded: Decoded,
    class: WordClass,
}

pub struct Disassembly {
    arch: Arch,
    words: Vec<DisWord>,
    labels: BTreeMap<Addr, String>,
}

impl Disassembly {
    pub fn new(vm: &Vm, length: Addr) -> Disassembly {
        let arch = Arch::new();

        let mut words: Vec<DisWord> = (0..length)
            .map(|addr| {
                let word = vm.read_word(addr);
                let decoded = arch::decode(word);
                let class = classify(&arch, word, &decoded);
                DisWord {
                    word,
                    decoded,
                    class,
                }
            })
            .collect();

        // Operand references are collected in one sweep over the
        // instruction-shaped words, then applied: a referenced cell is an
        // operand, so it reads as data, labelled L or D by whether a jump
        // or a data access names it. Word 0 is the entry point.
        let refs: Vec<(Addr, char)> = words
            .iter()
            .filter(|dis| dis.class == WordClass::Code)
            .filter(|dis| operand_arity(&arch, &dis.decoded) == 1)
            .filter(|dis| (dis.decoded.operand as Addr) < length)
            .map(|dis| {
                let prefix = match Opcode::from_field(dis.decoded.opcode) {
                    Opcode::JMP | Opcode::JRP => 'L',
                    _ => 'D',
                };
                (dis.decoded.operand as Addr, prefix)
            })
            .collect();

        let mut labels = BTreeMap::new();
        labels.insert(0, "_start".to_owned());
        for (target, prefix) in refs {
            words[target as usize].class = WordClass::Data;
            labels
                .entry(target)
                .or_insert_with(|| format!("{}{}", prefix, target));
        }

        debug!(
            target: "bdump",
            "{} words, {} labelled", words.len(), labels.len()
        );
        Disassembly {
            arch,
            words,
            labels,
        }
    }

    /// Writes reassemblable source, one line per word, with the alternative
    /// reading as a trailing comment.
    pub fn render(&self, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out, "-- disassembly")?;
        writeln!(out)?;

        for (addr, dis) in self.words.iter().enumerate() {
            if let Some(label) = self.labels.get(&(addr as Addr)) {
                writeln!(out, "{}:", label)?;
            }

            let (main, alt) = match dis.class {
                WordClass::Code => (self.render_instr(dis), self.render_data(dis)),
                WordClass::Data => (self.render_data(dis), self.render_instr(dis)),
            };
            writeln!(out, "  {:<20}; {}", main, alt)?;
        }
        Ok(())
    }

    fn render_instr(&self, dis: &DisWord) -> String {
        let mnemonic = &self.arch.find_opcode(dis.decoded.opcode)[0];
        if operand_arity(&self.arch, &dis.decoded) == 1 {
            let target = dis.decoded.operand as Addr;
            match self.labels.get(&target) {
                Some(label) => format!("{} {}", mnemonic.name, label),
                None => format!("{} {}", mnemonic.name, dis.decoded.operand),
            }
        } else {
            mnemonic.name.clone()
        }
    }

    fn render_data(&self, dis: &DisWord) -> String {
        format!("NUM {}", dis.word)
    }
}

fn operand_arity(arch: &Arch, decoded: &Decoded) -> u32 {
    match &arch.find_opcode(decoded.opcode)[0].kind {
        MnemKind::Instr(ins) => ins.operands,
        _ => 0,
    }
}

/// Shape heuristic: a word reads as data when its high half is populated,
/// when a zero-operand opcode carries an operand, or when the whole word
/// is zero.
fn classify(arch: &Arch, word: Word, decoded: &Decoded) -> WordClass {
    if word == 0 || decoded.data != 0 {
        return WordClass::Data;
    }
    if operand_arity(arch, decoded) == 0 && decoded.operand != 0 {
        return WordClass::Data;
    }
    WordClass::Code
}
