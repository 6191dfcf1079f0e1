//! Architecture definitions for the Manchester Baby.
//!
//! The machine is logically 32-bit; an instruction lives in the low 16 bits
//! of a word as a 3-bit opcode and a 13-bit operand. The upper 16 bits are
//! plain data and are zero for any well-formed instruction.

use std::collections::HashMap;

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

use crate::ast::Ast;
use crate::strtab::StrTab;
use crate::symbols::{SymScopes, SymType, SymVal};
use crate::{UWord, Word};

pub const OPCODE_MASK: UWord = 0x0000_E000;
pub const OPERAND_MASK: UWord = 0x0000_1FFF;
pub const OPDATA_MASK: UWord = 0xFFFF_0000;
pub const OPCODE_POS: u32 = 13;
pub const OPERAND_POS: u32 = 0;
pub const OPDATA_POS: u32 = 16;

/// Opcode 5 does not appear in the mnemonic table; the hardware decodes it
/// as a second subtract.
pub const OP_SUB_ALIAS: UWord = 5;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, FromPrimitive)]
pub enum Opcode {
    JMP = 0,
    JRP = 1,
    LDN = 2,
    STO = 3,
    SUB = 4,
    SKN = 6,
    HLT = 7,
}

impl Opcode {
    /// Decodes a raw 3-bit opcode field, folding the undocumented subtract
    /// alias onto [`Opcode::SUB`].
    pub fn from_field(raw: UWord) -> Opcode {
        Opcode::from_u32(raw & 0x7).unwrap_or(Opcode::SUB)
    }
}

/// An instruction's fixed encoding properties.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Instr {
    pub opcode: Opcode,
    pub operands: u32,
}

impl Instr {
    pub fn new(opcode: Opcode, operands: u32) -> Instr {
        Instr { opcode, operands }
    }

    /// Encodes the instruction word; the operand field is included only for
    /// unary instructions.
    pub fn encode(&self, operand: UWord) -> Word {
        let mut word = ((self.opcode as UWord) << OPCODE_POS) & OPCODE_MASK;
        if self.operands == 1 {
            word |= (operand << OPERAND_POS) & OPERAND_MASK;
        }
        word as Word
    }
}

/// Result of splitting a word into its instruction fields.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Decoded {
    pub opcode: UWord,
    pub operand: UWord,
    pub data: UWord,
}

pub fn decode(word: Word) -> Decoded {
    let word = word as UWord;
    Decoded {
        opcode: (word & OPCODE_MASK) >> OPCODE_POS,
        operand: (word & OPERAND_MASK) >> OPERAND_POS,
        data: (word & OPDATA_MASK) >> OPDATA_POS,
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Directive {
    /// Emit the operand as a raw word.
    Num,
    /// Emit the operand minus one ("enter jump address").
    Eja,
}

/// Body of an assembler-defined macro: formal-parameter cons chain and
/// statement list, both owned clones of the parse tree.
#[derive(Clone, Debug, PartialEq)]
pub struct MacroDef {
    pub formals: Ast,
    pub body: Ast,
}

#[derive(Clone, Debug, PartialEq)]
pub enum MnemKind {
    Instr(Instr),
    Directive(Directive),
    Macro(MacroDef),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Mnemonic {
    pub name: String,
    pub kind: MnemKind,
}

impl Mnemonic {
    fn instr(name: &str, opcode: Opcode, operands: u32) -> Mnemonic {
        Mnemonic {
            name: name.to_owned(),
            kind: MnemKind::Instr(Instr::new(opcode, operands)),
        }
    }

    fn directive(name: &str, dir: Directive) -> Mnemonic {
        Mnemonic {
            name: name.to_owned(),
            kind: MnemKind::Directive(dir),
        }
    }
}

/// The mnemonic arena and its lookup indices.
///
/// Built-in mnemonics are declared preferred-alias-first; reverse lookup
/// preserves that order. Macros defined during assembly are appended to the
/// arena but take part in neither index; they are reached through the
/// symbol tables of the scope that declared them.
#[derive(Debug)]
pub struct Arch {
    mnemonics: Vec<Mnemonic>,
    by_name: HashMap<String, usize>,
    by_opcode: HashMap<UWord, Vec<usize>>,
}

impl Arch {
    pub fn new() -> Arch {
        let mnemonics = vec![
            Mnemonic::instr("JMP", Opcode::JMP, 1),
            Mnemonic::instr("JRP", Opcode::JRP, 1),
            Mnemonic::instr("SUB", Opcode::SUB, 1),
            Mnemonic::instr("LDN", Opcode::LDN, 1),
            Mnemonic::instr("SKN", Opcode::SKN, 0),
            Mnemonic::instr("STO", Opcode::STO, 1),
            Mnemonic::instr("HLT", Opcode::HLT, 0),
            Mnemonic::instr("CMP", Opcode::SKN, 0),
            Mnemonic::instr("STP", Opcode::HLT, 0),
            Mnemonic::directive("NUM", Directive::Num),
            Mnemonic::directive("EJA", Directive::Eja),
        ];

        let mut by_name = HashMap::new();
        let mut by_opcode: HashMap<UWord, Vec<usize>> = HashMap::new();
        for (i, m) in mnemonics.iter().enumerate() {
            by_name.insert(m.name.to_ascii_lowercase(), i);
            if let MnemKind::Instr(ins) = &m.kind {
                by_opcode.entry(ins.opcode as UWord).or_default().push(i);
            }
        }

        Arch {
            mnemonics,
            by_name,
            by_opcode,
        }
    }

    /// Registers every built-in mnemonic in the root scope's mnemonic table.
    pub fn install(&self, strtab: &mut StrTab, scopes: &mut SymScopes) {
        let root = scopes.root();
        for (i, m) in self.mnemonics.iter().enumerate() {
            let name = strtab.put(&m.name);
            scopes.add(strtab, root, SymType::Mnemonic, name, SymVal::Mnem(i));
        }
    }

    pub fn mnemonic(&self, idx: usize) -> &Mnemonic {
        &self.mnemonics[idx]
    }

    /// Case-insensitive mnemonic lookup by name.
    pub fn find_instr(&self, name: &str) -> Option<&Mnemonic> {
        self.by_name
            .get(&name.to_ascii_lowercase())
            .map(|&i| &self.mnemonics[i])
    }

    /// All instruction mnemonics sharing an opcode, primary first. The
    /// subtract alias opcode reports the subtract mnemonics.
    pub fn find_opcode(&self, opcode: UWord) -> Vec<&Mnemonic> {
        let opcode = if opcode == OP_SUB_ALIAS {
            Opcode::SUB as UWord
        } else {
            opcode
        };
        self.by_opcode
            .get(&opcode)
            .map(|ids| ids.iter().map(|&i| &self.mnemonics[i]).collect())
            .unwrap_or_default()
    }

    /// Appends a macro mnemonic to the arena, returning its index for use as
    /// a symbol value.
    pub fn define_macro(&mut self, name: &str, def: MacroDef) -> usize {
        self.mnemonics.push(Mnemonic {
            name: name.to_owned(),
            kind: MnemKind::Macro(def),
        });
        self.mnemonics.len() - 1
    }
}

impl Default for Arch {
    fn default() -> Arch {
        Arch::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::LookupMode;

    #[test]
    fn decode_splits_the_fields() {
        let d = decode(0x0004_6005);
        assert_eq!(d.opcode, 3);
        assert_eq!(d.operand, 5);
        assert_eq!(d.data, 4);
    }

    #[test]
    fn encode_masks_the_operand() {
        let sto = Instr::new(Opcode::STO, 1);
        assert_eq!(sto.encode(4), 0x6004);
        assert_eq!(sto.encode(0xFFFF_FFFF), 0x7FFF);

        let hlt = Instr::new(Opcode::HLT, 0);
        assert_eq!(hlt.encode(123), 0xE000u32 as Word);
    }

    #[test]
    fn name_lookup_is_case_insensitive() {
        let arch = Arch::new();
        let m = arch.find_instr("ldn").unwrap();
        assert_eq!(m.name, "LDN");

        assert!(arch.find_instr("nop").is_none());
    }

    #[test]
    fn aliases_share_an_opcode() {
        let arch = Arch::new();
        let skn = arch.find_instr("SKN").unwrap();
        let cmp = arch.find_instr("CMP").unwrap();
        assert_eq!(skn.kind, cmp.kind);
    }

    #[test]
    fn reverse_lookup_prefers_the_first_declared_alias() {
        let arch = Arch::new();

        let halts = arch.find_opcode(Opcode::HLT as UWord);
        let names: Vec<_> = halts.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["HLT", "STP"]);

        let skips = arch.find_opcode(Opcode::SKN as UWord);
        let names: Vec<_> = skips.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["SKN", "CMP"]);
    }

    #[test]
    fn sub_alias_opcode_decodes_as_sub() {
        assert_eq!(Opcode::from_field(OP_SUB_ALIAS), Opcode::SUB);

        let arch = Arch::new();
        let subs = arch.find_opcode(OP_SUB_ALIAS);
        assert_eq!(subs[0].name, "SUB");
    }

    #[test]
    fn directives_carry_no_instruction() {
        let arch = Arch::new();
        let num = arch.find_instr("NUM").unwrap();
        assert_eq!(num.kind, MnemKind::Directive(Directive::Num));
        let eja = arch.find_instr("eja").unwrap();
        assert_eq!(eja.kind, MnemKind::Directive(Directive::Eja));
    }

    #[test]
    fn install_registers_mnemonic_symbols() {
        let arch = Arch::new();
        let mut strtab = StrTab::new();
        let mut scopes = SymScopes::new();
        arch.install(&mut strtab, &mut scopes);

        let name = strtab.put("sto");
        let sym = scopes
            .lookup(
                &strtab,
                scopes.root(),
                SymType::Mnemonic,
                name,
                LookupMode::Default,
            )
            .unwrap();
        match sym.val {
            SymVal::Mnem(idx) => assert_eq!(arch.mnemonic(idx).name, "STO"),
            _ => panic!("expected mnemonic symbol"),
        }
    }
}
