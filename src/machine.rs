//! Simulator for the Manchester Baby.
//!
//! One cycle runs the five phases in order: fetch (with pre-incremented
//! `ci`), decode, data access, execute, next-PC. Execution is deterministic
//! and wrap-around arithmetic is defined behaviour, so the cycle itself
//! cannot fail. The run loop polls a [`RunControl`] between cycles; stop
//! and dump requests are edge-triggered handshake counters, acted on at
//! most once per increment and only at cycle boundaries.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use log::trace;

use crate::arch::{self, Opcode};
use crate::memory::Vm;
use crate::{Addr, Word};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Regs {
    /// Accumulator.
    pub ac: Word,
    /// Control instruction: the program counter, incremented before fetch.
    pub ci: Word,
    /// Present instruction.
    pub pi: Word,
}

pub struct Machine {
    pub vm: Vm,
    pub regs: Regs,
    pub cycles: u64,
    pub stopped: bool,
}

/// Out-of-band requests to a running machine.
///
/// A requester increments a counter; the run loop compares against its own
/// acknowledge counters and reacts once per edge. Cancellation only happens
/// between cycles, never inside one.
#[derive(Default)]
pub struct RunControl {
    dump: AtomicU32,
    stop: AtomicU32,
}

impl RunControl {
    pub fn new() -> RunControl {
        Default::default()
    }

    /// Asks the run loop to report state and continue.
    pub fn request_dump(&self) {
        self.dump.fetch_add(1, Ordering::Relaxed);
    }

    /// Asks the run loop to stop after the current instruction.
    pub fn request_stop(&self) {
        self.stop.fetch_add(1, Ordering::Relaxed);
    }
}

#[derive(Default)]
struct Handshake {
    dump: u32,
    stop: u32,
}

impl Handshake {
    fn dump_edge(&mut self, ctl: &RunControl) -> bool {
        let req = ctl.dump.load(Ordering::Relaxed);
        let edge = self.dump != req;
        self.dump = req;
        edge
    }

    fn stop_edge(&mut self, ctl: &RunControl) -> bool {
        let req = ctl.stop.load(Ordering::Relaxed);
        let edge = self.stop != req;
        self.stop = req;
        edge
    }
}

impl Machine {
    /// A machine over `vm` with cleared registers. `ci` starts at −1 so the
    /// first pre-incremented fetch executes word 0.
    pub fn new(vm: Vm) -> Machine {
        Machine {
            vm,
            regs: Regs {
                ac: 0,
                ci: -1,
                pi: 0,
            },
            cycles: 0,
            stopped: false,
        }
    }

    /// Executes one five-phase cycle.
    pub fn cycle(&mut self) {
        // t1: fetch
        self.regs.ci = self.regs.ci.wrapping_add(1);
        self.regs.pi = self.vm.read_word(self.regs.ci as Addr);

        // t2: decode
        let d = arch::decode(self.regs.pi);
        let opcode = Opcode::from_field(d.opcode);

        // t3: execute - data access
        let mut data = 0;
        match opcode {
            Opcode::LDN | Opcode::SUB | Opcode::JMP | Opcode::JRP => {
                data = self.vm.read_word(d.operand as Addr);
            }
            Opcode::STO => {
                self.vm.write_word(d.operand as Addr, self.regs.ac);
            }
            _ => {}
        }

        // t4: execute
        match opcode {
            Opcode::LDN => self.regs.ac = data.wrapping_neg(),
            Opcode::SUB => self.regs.ac = self.regs.ac.wrapping_sub(data),
            Opcode::HLT => self.stopped = true,
            _ => {}
        }

        // t5: next-PC
        match opcode {
            Opcode::SKN => {
                if self.regs.ac < 0 {
                    self.regs.ci = self.regs.ci.wrapping_add(1);
                }
            }
            Opcode::JMP => self.regs.ci = data,
            Opcode::JRP => self.regs.ci = self.regs.ci.wrapping_add(data),
            _ => {}
        }

        self.cycles += 1;
    }

    /// Runs until halted or stopped through `ctl`. Dump requests invoke
    /// `on_dump` between cycles; the machine itself performs no I/O.
    pub fn run<F: FnMut(&Machine)>(&mut self, ctl: &RunControl, mut on_dump: F) {
        let mut ack = Handshake::default();

        while !self.stopped && !ack.stop_edge(ctl) {
            trace!(target: "bcpu", "{}", self);
            self.cycle();
            if ack.dump_edge(ctl) {
                on_dump(self);
            }
        }
    }
}

impl fmt::Display for Machine {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "cycles {:12} ac {:08x} ci {:08x} pi {:08x}{}",
            self.cycles,
            self.regs.ac as u32,
            self.regs.ci as u32,
            self.regs.pi as u32,
            if self.stopped { " STOP" } else { "" }
        )
    }
}
