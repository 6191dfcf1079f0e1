//! Core library for the Manchester Baby (SSEM) toolchain.
//!
//! The crate models the machine itself and the data structures shared by the
//! assembler (`basm`), the disassembler (`bdump`) and the simulator (`bsim`):
//!
//! * [`arch`]: the instruction set, mnemonic table and word encoding
//! * [`strtab`]: interned string storage with stable handles
//! * [`symbols`]: scoped symbol tables forming a lexical lookup chain
//! * [`ast`]: the assembler parse tree and the expression evaluator
//! * [`section`]: an origin-relative buffer of emitted words
//! * [`memory`]: the store, one physical page aliased over the whole
//!   address space
//! * [`machine`]: the five-phase cycle model and the run loop

pub mod arch;
pub mod ast;
pub mod machine;
pub mod memory;
pub mod section;
pub mod strtab;
pub mod symbols;

/// Machine word. Signed for arithmetic; bitfield work casts to [`UWord`].
pub type Word = i32;

/// Unsigned view of a machine word.
pub type UWord = u32;

/// Store address.
pub type Addr = u32;

/// Hard ceiling on the store size, in words.
pub const MAX_STORE_WORDS: Addr = 0x2000;

#[cfg(test)]
mod tests {
    use super::arch::{self, Opcode};
    use super::machine::{Machine, RunControl};
    use super::memory::Vm;
    use super::*;

    fn run_program(program: &[Word], memory: Addr) -> Machine {
        let mut vm = Vm::new(memory);
        for (i, word) in program.iter().enumerate() {
            vm.write_word(i as Addr, *word);
        }
        let mut machine = Machine::new(vm);
        machine.run(&RunControl::new(), |_| {});
        machine
    }

    #[test]
    fn program_halt() {
        let program = [arch::Instr::new(Opcode::HLT, 0).encode(0)];
        let machine = run_program(&program, 32);

        assert!(machine.stopped);
        assert_eq!(machine.cycles, 1);
    }

    #[test]
    fn program_load_store() {
        let ldn = arch::Instr::new(Opcode::LDN, 1);
        let sto = arch::Instr::new(Opcode::STO, 1);
        let hlt = arch::Instr::new(Opcode::HLT, 0);

        let program = [ldn.encode(3), sto.encode(4), hlt.encode(0), 5, 0];
        let machine = run_program(&program, 32);

        assert_eq!(machine.regs.ac, -5);
        assert_eq!(machine.vm.read_word(4), -5);
        assert_eq!(machine.cycles, 3);
    }

    #[test]
    fn wrapping_subtraction() {
        let sub = arch::Instr::new(Opcode::SUB, 1);
        let hlt = arch::Instr::new(Opcode::HLT, 0);

        // ac = 0 - i32::MIN wraps back to i32::MIN
        let program = [sub.encode(2), hlt.encode(0), Word::MIN];
        let machine = run_program(&program, 32);

        assert_eq!(machine.regs.ac, Word::MIN);
    }
}
