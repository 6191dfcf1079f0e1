//! Assembler for the Manchester Baby.
//!
//! The main entry point is [`Assembler`]: feed it sources with
//! [`Assembler::add_source`], run [`Assembler::assemble`], and serialize
//! the resulting [`Section`](bcpu::section::Section) with one of the
//! [`bfile`] writers. The free function [`assemble`] wraps the common
//! single-source case.
//!
//! Parsing is implemented with [pest]; parse errors are plain
//! `pest::error::Error` values, so location rendering and `with_path`
//! decoration come for free.
//!
//! # Assembly language
//!
//! A line holds an optional org or label prefix, an optional statement and
//! an optional comment (`--` or `;` to end of line):
//!
//! ```text
//!         LDN count    -- load and negate
//!         STO total
//! loop:   SKN
//! 28:     NUM 0x1F
//!         EJA loop
//!         HLT
//! ```
//!
//! A leading integer, with or without a `:`, sets the location counter. A
//! label (an identifier followed by `:`) binds the address of the next
//! emitted word. Labels may not start with a digit.
//!
//! ## Mnemonics
//!
//!  Mnemonic | Operands | Effect
//! ----------|----------|----------------------------------------
//!  `JMP`    | 1        | jump to the address held in the operand cell
//!  `JRP`    | 1        | add the operand cell to the program counter
//!  `LDN`    | 1        | load the negated operand cell
//!  `STO`    | 1        | store the accumulator
//!  `SUB`    | 1        | subtract the operand cell
//!  `SKN`/`CMP` | 0     | skip the next word if the accumulator is negative
//!  `HLT`/`STP` | 0     | stop the machine
//!  `NUM`    | 1        | emit the operand as a raw word
//!  `EJA`    | 1        | emit the operand minus one
//!
//! Mnemonic lookup is case-insensitive; label lookup is not.
//!
//! ## Expressions
//!
//! Operands are constant expressions over decimal or `0x` hexadecimal
//! literals, labels and the pseudo-symbol `$` (the current address),
//! combined with binary `+` and `-`. Arithmetic wraps on the 32-bit word.
//!
//! ## Macros
//!
//! A macro is declared under a name label and applied like a mnemonic; each
//! application expands the body in a fresh scope, so labels inside a macro
//! body are private to the expansion:
//!
//! ```text
//! clear:  MACRO addr
//!         SUB addr
//!         STO addr
//!         ENDM
//!
//!         clear 30
//!         clear 31
//! ```
//!
//! [pest]: https://docs.rs/pest/

mod engine;
mod error;
mod parser;

#[cfg(test)]
mod test;

pub use crate::engine::{Assembler, Record, Source};
pub use crate::error::{AsmError, Error, Result};
pub use crate::parser::{BasmParser, Rule, MAX_SOURCE_LINE};

/// Assembles a single source, returning the finished assembler so callers
/// can reach the section, the records and the listing back-links.
pub fn assemble(input: &str) -> Result<Assembler> {
    let mut assembler = Assembler::new();
    assembler.add_source("<input>", input)?;
    assembler.assemble()?;
    Ok(assembler)
}
