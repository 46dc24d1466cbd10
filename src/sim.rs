//! Simulating and execution for LC-4 machine code.
//!
//! This module is focused on executing loaded object files (see [`crate::obj`]).
//!
//! This module consists of:
//! - [`Simulator`]: The struct that simulates machine code.
//! - [`mem`]: The module handling memory, registers, and the privilege model.
//! - [`debug`]: The module handling breakpoints, labels, and run status.
//! - [`frame`]: The module handling the frame stack and call frame management.
//! - [`observer`]: The module tracking which registers and memory a step changed.
//!
//! # Usage
//!
//! To simulate some code, you need to instantiate a Simulator and load an object file to it:
//!
//! ```no_run
//! use lc4_sim::sim::Simulator;
//!
//! let mut simulator = Simulator::new(Default::default());
//! simulator.load_path("multiply.obj").unwrap();
//! simulator.run().unwrap();
//! ```
//!
//! ## Flags
//!
//! Here, we define `simulator` to have the default flags.
//! We could also configure the simulator by editing the flags. For example,
//! if we wish to turn the permissive behaviors (division by zero, writes into
//! protected regions, unknown opcodes) into errors, we can enable strict mode:
//!
//! ```no_run
//! # use lc4_sim::sim::{Simulator, SimFlags};
//! let mut simulator = Simulator::new(SimFlags { strict: true, ..Default::default() });
//! ```
//!
//! All of the available flags can be found in [`SimFlags`].
//!
//! ## Execution
//!
//! Beyond the basic [`Simulator::run`] (which runs until halting or a breakpoint),
//! there are also:
//! - [`Simulator::step_in`], [`Simulator::step_next`]: manual step-by-step simulation
//! - [`Simulator::step_over`], [`Simulator::step_out`]: stepping by call frames
//! - [`Simulator::run_while`], [`Simulator::run_with_limit`]: more advanced programmatic execution
//!
//! ```
//! use lc4_sim::obj::{Block, ObjectFile};
//! use lc4_sim::sim::Simulator;
//! use lc4_sim::ast::reg_consts::R0;
//!
//! // CONST R0, #0 / ADD R0, R0, #1 / ADD R0, R0, #1 / TRAP xFF
//! let obj = ObjectFile::from_iter([
//!     Block::Code { addr: 0x0000, words: vec![0x9000, 0x1021, 0x1021, 0xF0FF] }
//! ]);
//!
//! let mut sim = Simulator::new(Default::default());
//! sim.load_obj_file(&obj);
//! sim.pc = 0x0000;
//!
//! // Running step by step:
//! sim.step_in().unwrap();
//! assert_eq!(sim.reg_file[R0], 0);
//! sim.step_in().unwrap();
//! assert_eq!(sim.reg_file[R0], 1);
//! sim.step_in().unwrap();
//! assert_eq!(sim.reg_file[R0], 2);
//! ```
//!
//! ## Querying State
//!
//! You can query (or set) a variety of different state values from the simulator.
//!
//! - If you wish to access the PC, it can simply be done through the `sim.pc` field.
//! - If you wish to access the PSR, the [`Simulator::psr`] method is present to query it.
//! - If you wish to access the register file, you can access it through the `sim.reg_file` field.
//! - If you wish to access the memory, you can access it through the `sim.mem` field.
//!     Direct access does not perform any privilege checks.
//!
//! ```
//! use lc4_sim::sim::Simulator;
//! use lc4_sim::ast::reg_consts::R0;
//!
//! let mut sim = Simulator::new(Default::default());
//!
//! sim.reg_file[R0] = 0x1234;
//! sim.mem[0x2000] = 0x5678;
//! assert_eq!(sim.reg_file[R0], 0x1234);
//! assert_eq!(sim.mem[0x2000], 0x5678);
//! ```
//!
//! - Other state can be accessed. Consult the [`Simulator`] docs for more information.

pub mod mem;
pub mod debug;
pub mod frame;
pub mod observer;

use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::Path;

use crate::ast::reg_consts::R7;
use crate::ast::sim::SimInstr;
use crate::ast::{ImmOrReg, Reg};
use crate::obj::{Block, BlockReader, LoadErr, ObjectFile};

use self::debug::{Metadata, PauseCondition, RunStatus};
use self::frame::{FrameStack, FrameType};
use self::mem::{MemArray, Region, RegFile};
use self::observer::{AccessSet, ChangeObserver};

/// The PC after a reset.
pub const PC_INIT: u16 = 0x8200;
/// The PSR after a reset (privileged, `z` condition code).
pub const PSR_INIT: u16 = 0x8002;
/// The halt sentinel. Execution stops when the PC reaches this address.
pub const HALT_ADDR: u16 = 0x80FF;

/// Errors that can occur during simulation.
///
/// Every error is raised before the failing instruction changes any state.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, thiserror::Error)]
pub enum SimErr {
    /// The PC was moved outside of the address space.
    #[error("PC out of bounds: instruction at x{pc:04X} would jump to {target:#X}")]
    PcOutOfBounds {
        /// The instruction's address.
        pc: u16,
        /// The target address, which does not fit in 16 bits.
        target: i32
    },
    /// OS code was executed in user mode.
    #[error("privilege violation: cannot execute OS code at x{0:04X} in user mode")]
    PrivilegeViolation(u16),
    /// A division or modulo by zero occurred (strict mode).
    #[error("division by zero at x{0:04X} (strict mode)")]
    DivideByZero(u16),
    /// A write into a protected region was attempted (strict mode).
    #[error("access violation: cannot write to {region} address x{addr:04X} (strict mode)")]
    AccessViolation {
        /// The address written to.
        addr: u16,
        /// The region of the address.
        region: Region
    },
    /// A word which is not an instruction was executed (strict mode).
    #[error("illegal opcode: x{word:04X} at x{pc:04X} is not an instruction (strict mode)")]
    IllegalOpcode {
        /// The instruction's address.
        pc: u16,
        /// The word at that address.
        word: u16
    },
    /// The PC entered a data region (strict mode).
    #[error("tried to execute data region at x{0:04X} (strict mode)")]
    DataExecution(u16),
}
impl crate::err::Error for SimErr {
    fn help(&self) -> Option<Cow<str>> {
        match self {
            SimErr::PcOutOfBounds { .. } => Some(Cow::from("check the offset of the branch or jump")),
            SimErr::PrivilegeViolation(_) => Some(Cow::from("OS code can only run after a TRAP; use `reset` to start over in supervisor mode")),
            SimErr::DivideByZero(_) => Some(Cow::from("without strict mode, division by zero results in 0")),
            SimErr::AccessViolation { region: Region::OsData, .. } => Some(Cow::from("OS data can only be written in supervisor mode")),
            SimErr::AccessViolation { .. } => Some(Cow::from("code regions cannot be written to; store data in x2000-x7FFF")),
            SimErr::IllegalOpcode { .. } => Some(Cow::from("without strict mode, unknown words run as NOP")),
            SimErr::DataExecution(_) => Some(Cow::from("code belongs in x0000-x1FFF (user) or x8000-x9FFF (OS)")),
        }
    }
}

/// Anything that can cause a step to abruptly fail to finish.
enum StepBreak {
    /// The halt sentinel was reached.
    Halt,
    /// A simulation error occurred.
    Err(SimErr),
}
impl From<SimErr> for StepBreak {
    fn from(value: SimErr) -> Self {
        Self::Err(value)
    }
}

/// Configuration flags for [`Simulator`].
///
/// These can be modified after the `Simulator` is created with [`Simulator::new`]
/// and their effects should still apply.
/// They are kept through [`Simulator::reset`] and [`Simulator::clear`].
///
/// Read the field descriptions for more details.
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
pub struct SimFlags {
    /// Whether strict mode is enabled.
    ///
    /// By default, the simulator is permissive:
    /// - `DIV`/`MOD` by zero produce 0
    /// - `STR` into a region it may not write to is skipped
    /// - unknown words run as `NOP`
    /// - the PC may run through data regions
    ///
    /// Strict mode raises a [`SimErr`] for each of these instead.
    ///
    /// By default, this flag is `false`.
    pub strict: bool,

    /// Whether to store debugging information about call frames.
    ///
    /// This flag only goes into effect after a `Simulator::new` or `Simulator::reset` call.
    ///
    /// By default, this flag is `false`.
    pub debug_frames: bool,

    /// If true, privilege checks are ignored and the simulator runs as though
    /// the executor has supervisor level privilege.
    ///
    /// The PSR's privilege bit still changes as usual.
    ///
    /// By default, this flag is `false`.
    pub ignore_privilege: bool
}

/// Executes LC-4 machine code.
#[derive(Debug)]
pub struct Simulator {
    // ------------------ SIMULATION STATE ------------------
    // Calling [`Simulator::reset`] resets these values.

    /// The simulator's memory.
    ///
    /// Note that this is held in the heap, as it is too large for the stack.
    pub mem: MemArray,

    /// The simulator's register file.
    pub reg_file: RegFile,

    /// The program counter.
    pub pc: u16,

    /// The processor status register. See [`PSR`] for more details.
    psr: PSR,

    /// The frame stack.
    pub frame_stack: FrameStack,

    /// The number of instructions successfully run since this `Simulator` was initialized.
    ///
    /// This can be set to 0 to reset the counter.
    pub instructions_run: u64,

    /// Tracks the registers and memory written by the last step or run.
    pub observer: ChangeObserver,

    status: RunStatus,

    /// Indicates the reason why the last execution (via [`Simulator::run_while`] and adjacent)
    /// had paused.
    pause_condition: PauseCondition,

    // ------------------ LOADED STATE ------------------
    // Calling [`Simulator::clear`] resets these values.

    /// Labels from the loaded object files' symbol blocks, by name.
    pub labels: BTreeMap<String, u16>,

    /// Breakpoints and labels, by address.
    pub metadata: Metadata,

    // ------------------ CONFIG/DEBUG STATE ------------------
    // Never reset.

    /// Configuration settings for the simulator.
    ///
    /// These are preserved between resets.
    ///
    /// See [`SimFlags`] for more details on what configuration
    /// settings are available.
    pub flags: SimFlags,
}

impl Simulator {
    /// Creates a new simulator with the provided flags, zeroed memory,
    /// and registers at their reset values.
    pub fn new(flags: SimFlags) -> Self {
        Self {
            mem: MemArray::new(),
            reg_file: RegFile::new(),
            pc: PC_INIT,
            psr: PSR::new(),
            frame_stack: FrameStack::new(flags.debug_frames),
            instructions_run: 0,
            observer: ChangeObserver::new(),
            status: RunStatus::Idle,
            pause_condition: Default::default(),
            labels: BTreeMap::new(),
            metadata: Metadata::new(),
            flags,
        }
    }

    /// Resets the registers, PSR, and PC to their initial values.
    ///
    /// Memory, labels, and breakpoints are kept.
    pub fn reset(&mut self) {
        self.reg_file = RegFile::new();
        self.pc = PC_INIT;
        self.psr = PSR::new();
        self.frame_stack = FrameStack::new(self.flags.debug_frames);
        self.observer.clear();
        self.status = RunStatus::Idle;
        self.pause_condition = Default::default();

        tracing::debug!("machine reset");
    }

    /// Resets the machine and zeroes memory, labels, and breakpoints.
    pub fn clear(&mut self) {
        self.mem.clear();
        self.labels.clear();
        self.metadata.clear();
        self.reset();

        tracing::debug!("memory and metadata cleared");
    }

    /// Loads an object file into this simulator.
    ///
    /// This does not clear the machine first; see [`Simulator::clear`].
    pub fn load_obj_file(&mut self, obj: &ObjectFile) {
        for block in obj.blocks() {
            self.load_block(block);
        }
        self.status = RunStatus::Idle;
    }

    /// Loads object file bytes into this simulator.
    ///
    /// Blocks are applied as they are read.
    /// If a block is malformed, loading stops there and an error is returned,
    /// but every block before it stays loaded. If the file ends inside a code or data block,
    /// the words of that block which were read in full are also written.
    pub fn load_bytes(&mut self, bytes: &[u8]) -> Result<(), LoadErr> {
        self.status = RunStatus::Idle;
        for block in BlockReader::new(bytes) {
            match block {
                Ok(block) => self.load_block(&block),
                Err(e) => {
                    if let LoadErr::Truncated { partial: Some(block), .. } = &e {
                        self.load_block(block);
                    }
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Reads the object file at `path` and loads it into this simulator.
    ///
    /// See [`Simulator::load_bytes`] for how errors are handled.
    pub fn load_path(&mut self, path: impl AsRef<Path>) -> Result<(), LoadErr> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .map_err(|source| LoadErr::Io { path: path.to_path_buf(), source })?;

        tracing::debug!(path = %path.display(), len = bytes.len(), "loading object file");
        self.load_bytes(&bytes)
    }

    fn load_block(&mut self, block: &Block) {
        match block {
            Block::Code { addr, words } | Block::Data { addr, words } => {
                tracing::debug!(kind = %block.kind(), addr = format_args!("x{addr:04X}"), count = words.len(), "loaded block");
                self.mem.copy_block(*addr, words);
            },
            Block::Symbol { addr, name } => {
                tracing::debug!(addr = format_args!("x{addr:04X}"), name = %name, "loaded symbol");
                self.labels.insert(name.clone(), *addr);
                self.metadata.set_label(*addr, name.clone());
            },
            Block::FileName(name) => tracing::debug!(name = %name, "skipped file name block"),
            Block::Line { addr, line, .. } => tracing::debug!(addr = format_args!("x{addr:04X}"), line, "skipped line number block"),
        }
    }

    /// Gets a reference to the PSR.
    pub fn psr(&self) -> &PSR {
        &self.psr
    }

    /// Gets a mutable reference to the PSR.
    pub fn psr_mut(&mut self) -> &mut PSR {
        &mut self.psr
    }

    /// Whether instructions currently run with supervisor privilege
    /// (either because the PSR says so, or because privilege checks are ignored).
    pub fn privileged(&self) -> bool {
        self.psr.privileged() || self.flags.ignore_privilege
    }

    /// The current state of the run loops.
    pub fn status(&self) -> RunStatus {
        self.status
    }

    /// Looks up the address of a label.
    pub fn label_addr(&self, label: &str) -> Option<u16> {
        self.labels.get(label).copied()
    }

    /// Marks an address with a breakpoint.
    pub fn set_breakpoint(&mut self, addr: u16) {
        self.metadata.set_breakpoint(addr);
    }

    /// Removes a breakpoint, returning whether there was one.
    pub fn remove_breakpoint(&mut self, addr: u16) -> bool {
        self.metadata.remove_breakpoint(addr)
    }

    /// Sets the condition codes using the provided result.
    fn set_cc(&mut self, result: u16) {
        self.set_cc_ord((result as i16).cmp(&0));
    }
    /// Sets the condition codes using the result of a comparison.
    fn set_cc_ord(&mut self, ord: Ordering) {
        match ord {
            Ordering::Less    => self.psr.set_cc(0b100),
            Ordering::Equal   => self.psr.set_cc(0b010),
            Ordering::Greater => self.psr.set_cc(0b001),
        }
    }
    /// Writes a register and sets the condition codes from the written value.
    fn set_reg_cc(&mut self, reg: Reg, value: u16) {
        self.set_reg(reg, value);
        self.set_cc(value);
    }
    fn set_reg(&mut self, reg: Reg, value: u16) {
        self.observer.update_reg_accesses(reg, AccessSet::write(self.reg_file[reg], value));
        self.reg_file[reg] = value;
    }

    /// Computes `base + offset`, erroring if the result does not fit in the address space.
    fn offset_pc(&self, base: u16, offset: i16) -> Result<u16, SimErr> {
        let target = i32::from(base) + i32::from(offset);
        u16::try_from(target).map_err(|_| SimErr::PcOutOfBounds { pc: self.pc, target })
    }

    fn imm_or_reg<const N: u32>(&self, op: ImmOrReg<N>) -> u16 {
        match op {
            ImmOrReg::Imm(imm) => imm.get() as u16,
            ImmOrReg::Reg(reg) => self.reg_file[reg],
        }
    }

    /// Result of `DIV`/`MOD`, following the divide-by-zero policy.
    fn checked_div(&self, f: impl FnOnce(u16, u16) -> Option<u16>, lhs: u16, rhs: u16) -> Result<u16, SimErr> {
        match f(lhs, rhs) {
            Some(result) => Ok(result),
            None if self.flags.strict => Err(SimErr::DivideByZero(self.pc)),
            None => {
                tracing::warn!(pc = format_args!("x{:04X}", self.pc), "division by zero, result is 0");
                Ok(0)
            }
        }
    }

    /// Executes an instruction as though it were stored at the PC.
    ///
    /// Errors are raised before any state is changed.
    fn execute(&mut self, instr: SimInstr) -> Result<(), SimErr> {
        let pc = self.pc;
        let next = || pc.checked_add(1)
            .ok_or(SimErr::PcOutOfBounds { pc, target: i32::from(pc) + 1 });

        match instr {
            SimInstr::NOP => {
                self.pc = next()?;
            },
            SimInstr::BR(cc, off) => {
                let next = next()?;
                self.pc = match cc & self.psr.cc() != 0 {
                    true  => self.offset_pc(next, off.get())?,
                    false => next,
                };
            },
            SimInstr::ADD(dr, sr1, sr2) => {
                let next = next()?;
                let result = self.reg_file[sr1].wrapping_add(self.imm_or_reg(sr2));
                self.set_reg_cc(dr, result);
                self.pc = next;
            },
            SimInstr::MUL(dr, sr1, sr2) => {
                let next = next()?;
                let result = self.reg_file[sr1].wrapping_mul(self.reg_file[sr2]);
                self.set_reg_cc(dr, result);
                self.pc = next;
            },
            SimInstr::SUB(dr, sr1, sr2) => {
                let next = next()?;
                let result = self.reg_file[sr1].wrapping_sub(self.reg_file[sr2]);
                self.set_reg_cc(dr, result);
                self.pc = next;
            },
            SimInstr::DIV(dr, sr1, sr2) => {
                let next = next()?;
                let result = self.checked_div(u16::checked_div, self.reg_file[sr1], self.reg_file[sr2])?;
                self.set_reg_cc(dr, result);
                self.pc = next;
            },
            SimInstr::MOD(dr, sr1, sr2) => {
                let next = next()?;
                let result = self.checked_div(u16::checked_rem, self.reg_file[sr1], self.reg_file[sr2])?;
                self.set_reg_cc(dr, result);
                self.pc = next;
            },
            SimInstr::CMP(sr1, sr2) => {
                let next = next()?;
                let ord = (self.reg_file[sr1] as i16).cmp(&(self.reg_file[sr2] as i16));
                self.set_cc_ord(ord);
                self.pc = next;
            },
            SimInstr::CMPU(sr1, sr2) => {
                let next = next()?;
                let ord = self.reg_file[sr1].cmp(&self.reg_file[sr2]);
                self.set_cc_ord(ord);
                self.pc = next;
            },
            SimInstr::CMPI(sr, imm) => {
                let next = next()?;
                let ord = (self.reg_file[sr] as i16).cmp(&imm.get());
                self.set_cc_ord(ord);
                self.pc = next;
            },
            SimInstr::CMPIU(sr, imm) => {
                let next = next()?;
                let ord = self.reg_file[sr].cmp(&imm.get());
                self.set_cc_ord(ord);
                self.pc = next;
            },
            SimInstr::JSR(op) => {
                let next = next()?;
                // JSRR R7 jumps to the old value of R7.
                let addr = match op {
                    ImmOrReg::Imm(off) => (pc & 0x8000) | ((off.get() as u16) << 4),
                    ImmOrReg::Reg(br)  => self.reg_file[br],
                };

                self.set_reg_cc(R7, next);
                self.frame_stack.push_frame(pc, addr, FrameType::Subroutine);
                self.pc = addr;
            },
            SimInstr::AND(dr, sr1, sr2) => {
                let next = next()?;
                let result = self.reg_file[sr1] & self.imm_or_reg(sr2);
                self.set_reg_cc(dr, result);
                self.pc = next;
            },
            SimInstr::NOT(dr, sr) => {
                let next = next()?;
                let result = !self.reg_file[sr];
                self.set_reg_cc(dr, result);
                self.pc = next;
            },
            SimInstr::OR(dr, sr1, sr2) => {
                let next = next()?;
                let result = self.reg_file[sr1] | self.reg_file[sr2];
                self.set_reg_cc(dr, result);
                self.pc = next;
            },
            SimInstr::XOR(dr, sr1, sr2) => {
                let next = next()?;
                let result = self.reg_file[sr1] ^ self.reg_file[sr2];
                self.set_reg_cc(dr, result);
                self.pc = next;
            },
            SimInstr::LDR(dr, br, off) => {
                let next = next()?;
                let ea = self.reg_file[br].wrapping_add_signed(off.get());

                self.observer.update_mem_accesses(ea, AccessSet::READ);
                self.set_reg_cc(dr, self.mem[ea]);
                self.pc = next;
            },
            SimInstr::STR(sr, br, off) => {
                let next = next()?;
                let ea = self.reg_file[br].wrapping_add_signed(off.get());

                if mem::check_write(ea, self.privileged()) {
                    let value = self.reg_file[sr];
                    self.observer.update_mem_accesses(ea, AccessSet::write(self.mem[ea], value));
                    self.mem[ea] = value;
                } else if self.flags.strict {
                    return Err(SimErr::AccessViolation { addr: ea, region: Region::of(ea) });
                } else {
                    tracing::warn!(
                        pc = format_args!("x{pc:04X}"),
                        addr = format_args!("x{ea:04X}"),
                        region = %Region::of(ea),
                        "write not allowed, skipped"
                    );
                }
                self.pc = next;
            },
            SimInstr::RTI => {
                self.pc = self.reg_file[R7];
                self.psr.set_privileged(false);
                self.frame_stack.pop_frame();
            },
            SimInstr::CONST(dr, imm) => {
                let next = next()?;
                self.set_reg_cc(dr, imm.get() as u16);
                self.pc = next;
            },
            SimInstr::HICONST(dr, imm) => {
                let next = next()?;
                let result = (self.reg_file[dr] & 0xFF) | (imm.get() << 8);
                self.set_reg_cc(dr, result);
                self.pc = next;
            },
            SimInstr::SLL(dr, sr, amt) => {
                let next = next()?;
                let result = self.reg_file[sr] << amt.get();
                self.set_reg_cc(dr, result);
                self.pc = next;
            },
            SimInstr::SRA(dr, sr, amt) => {
                let next = next()?;
                let result = ((self.reg_file[sr] as i16) >> amt.get()) as u16;
                self.set_reg_cc(dr, result);
                self.pc = next;
            },
            SimInstr::SRL(dr, sr, amt) => {
                let next = next()?;
                let result = self.reg_file[sr] >> amt.get();
                self.set_reg_cc(dr, result);
                self.pc = next;
            },
            SimInstr::JMP(ImmOrReg::Imm(off)) => {
                let next = next()?;
                self.pc = self.offset_pc(next, off.get())?;
            },
            SimInstr::JMP(ImmOrReg::Reg(br)) => {
                self.pc = self.reg_file[br];

                // JMPR R7 is RET.
                if br == R7 {
                    self.frame_stack.pop_frame();
                }
            },
            SimInstr::RET => {
                self.pc = self.reg_file[R7];
                self.frame_stack.pop_frame();
            },
            SimInstr::TRAP(vect) => {
                let next = next()?;
                let addr = 0x8000 | vect.get();

                self.set_reg_cc(R7, next);
                self.psr.set_privileged(true);
                self.frame_stack.push_frame(pc, addr, FrameType::Trap);
                self.pc = addr;
            },
            SimInstr::LEA(dr, value) | SimInstr::LC(dr, value) => {
                let next = next()?;
                self.set_reg_cc(dr, value);
                self.pc = next;
            },
            SimInstr::Unknown(word) => {
                if self.flags.strict {
                    return Err(SimErr::IllegalOpcode { pc, word });
                }
                let next = next()?;
                tracing::warn!(pc = format_args!("x{pc:04X}"), word = format_args!("x{word:04X}"), "unknown opcode, running as NOP");
                self.pc = next;
            },
        }

        Ok(())
    }

    /// Checks that the instruction at the PC may run.
    fn check_pc(&self) -> Result<(), SimErr> {
        let pc = self.pc;
        if !mem::check_execute(pc, self.privileged()) {
            return Err(SimErr::PrivilegeViolation(pc));
        }
        if self.flags.strict && !Region::of(pc).is_code() {
            return Err(SimErr::DataExecution(pc));
        }
        Ok(())
    }

    /// Simulate one step, executing one instruction.
    ///
    /// This is the step used by every run loop.
    /// It reports the halt sentinel as [`StepBreak::Halt`] without executing anything.
    fn step(&mut self) -> Result<(), StepBreak> {
        if self.pc == HALT_ADDR {
            return Err(StepBreak::Halt);
        }

        self.check_pc()?;
        let instr = SimInstr::decode(self.mem[self.pc]);
        tracing::trace!(pc = format_args!("x{:04X}", self.pc), %instr, "execute");

        self.execute(instr)?;
        self.instructions_run = self.instructions_run.wrapping_add(1);
        self.status = RunStatus::Running;
        Ok(())
    }

    /// Executes a caller-supplied instruction as though it were stored at the PC.
    ///
    /// The privilege check on the PC applies as it does when stepping.
    /// This is useful for pseudo-instructions like `LEA` and `LC`,
    /// which have no single-word encoding.
    ///
    /// ```
    /// use lc4_sim::ast::sim::SimInstr;
    /// use lc4_sim::ast::reg_consts::R3;
    /// use lc4_sim::sim::Simulator;
    ///
    /// let mut sim = Simulator::new(Default::default());
    /// sim.labels.insert("ARRAY".to_string(), 0x4000);
    ///
    /// let lea = SimInstr::lea(R3, "ARRAY", &sim.labels).unwrap();
    /// sim.eval(lea).unwrap();
    /// assert_eq!(sim.reg_file[R3], 0x4000);
    /// assert_eq!(sim.pc, 0x8201);
    /// ```
    pub fn eval(&mut self, instr: SimInstr) -> Result<(), SimErr> {
        self.observer.clear();
        std::mem::take(&mut self.pause_condition);

        let result = self.check_pc().and_then(|()| self.execute(instr));
        match result {
            Ok(()) => {
                tracing::trace!(pc = format_args!("x{:04X}", self.pc), %instr, "eval");
                self.status = RunStatus::Running;
            },
            Err(_) => self.pause_condition = PauseCondition::Error,
        }
        result
    }

    /// Indicates whether the last execution of the simulator hit a breakpoint.
    pub fn hit_breakpoint(&self) -> bool {
        matches!(self.pause_condition, PauseCondition::Breakpoint)
    }

    /// Indicates whether the last execution of the simulator reached the halt sentinel.
    pub fn hit_halt(&self) -> bool {
        matches!(self.pause_condition, PauseCondition::Halt)
    }

    /// Runs until the tripwire condition returns false (or any of the typical breaks occur).
    ///
    /// The tripwire is checked before every step.
    /// The typical break conditions are:
    /// - the PC is at the halt sentinel
    /// - an instruction raises an error
    /// - after an instruction executes, the PC is on a breakpoint
    ///
    /// Because the breakpoint is only checked after executing,
    /// running from a breakpoint always executes at least the instruction under it.
    pub fn run_while(&mut self, mut tripwire: impl FnMut(&mut Simulator) -> bool) -> Result<(), SimErr> {
        self.observer.clear();
        std::mem::take(&mut self.pause_condition);

        // event loop
        // run until:
        // 1. the tripwire condition returns false
        // 2. the halt sentinel is reached
        // 3. any of the breakpoints are hit
        let result = loop {
            // Tripwire turned off:
            if !tripwire(self) {
                break Ok(PauseCondition::Tripwire);
            }

            // Run a step:
            match self.step() {
                Ok(_) => {},
                Err(StepBreak::Halt) => break Ok(PauseCondition::Halt),
                Err(StepBreak::Err(e)) => break Err(e)
            }

            // After executing, check that any breakpoints were hit.
            if self.metadata.is_breakpoint(self.pc) {
                break Ok(PauseCondition::Breakpoint);
            }
        };

        self.finish_run(result)
    }

    /// Records how a step or run ended.
    fn finish_run(&mut self, result: Result<PauseCondition, SimErr>) -> Result<(), SimErr> {
        let pc = self.pc;
        match result {
            Ok(cond) => {
                match cond {
                    PauseCondition::Halt => tracing::info!(pc = format_args!("x{pc:04X}"), "halted"),
                    PauseCondition::Breakpoint => tracing::info!(pc = format_args!("x{pc:04X}"), "hit breakpoint"),
                    _ => {}
                }
                if cond == PauseCondition::Halt {
                    self.status = RunStatus::Halted;
                }
                self.pause_condition = cond;
                Ok(())
            },
            Err(e) => {
                tracing::info!(pc = format_args!("x{pc:04X}"), error = %e, "stopped on error");
                self.status = RunStatus::Halted;
                self.pause_condition = PauseCondition::Error;
                Err(e)
            },
        }
    }

    /// Execute the program.
    ///
    /// This blocks until the program halts, hits a breakpoint, or errors.
    /// If you would like to limit the maximum number of steps to execute, consider [`Simulator::run_with_limit`].
    pub fn run(&mut self) -> Result<(), SimErr> {
        self.run_while(|_| true)
    }

    /// Execute the program with a limit on how many steps to execute.
    ///
    /// This blocks until the program ends or until the number of steps to execute has been hit.
    pub fn run_with_limit(&mut self, max_steps: u64) -> Result<(), SimErr> {
        let i = self.instructions_run;
        self.run_while(|sim| sim.instructions_run.wrapping_sub(i) < max_steps)
    }

    /// Simulate one step, executing one instruction.
    ///
    /// At the halt sentinel, this executes nothing and [`Simulator::hit_halt`] becomes true.
    pub fn step_in(&mut self) -> Result<(), SimErr> {
        self.observer.clear();
        std::mem::take(&mut self.pause_condition);

        let result = match self.step() {
            Ok(()) => Ok(PauseCondition::Unpaused),
            Err(StepBreak::Halt) => Ok(PauseCondition::Halt),
            Err(StepBreak::Err(e)) => Err(e),
        };
        self.finish_run(result)
    }

    /// Runs until the PC is one past where it started, a breakpoint is hit, or the program halts.
    ///
    /// This is a flat comparison against `PC + 1`.
    /// A subroutine call that returns somewhere else runs until one of the other conditions;
    /// use [`Simulator::step_over`] to step over calls by frame depth.
    pub fn step_next(&mut self) -> Result<(), SimErr> {
        let target = self.pc.wrapping_add(1);
        let mut first = Some(()); // is Some if this is the first instruction executed in this call

        self.run_while(|sim| first.take().is_some() || sim.pc != target)
    }

    /// Simulate one step, executing one instruction and running through entire subroutines as a single step.
    pub fn step_over(&mut self) -> Result<(), SimErr> {
        let curr_frame = self.frame_stack.len();
        let mut first = Some(()); // is Some if this is the first instruction executed in this call

        // this function should do at least one step before checking its condition
        // condition: run until we have landed back in the same frame
        self.run_while(|sim| first.take().is_some() || curr_frame < sim.frame_stack.len())
    }

    /// Run through the simulator's execution until the subroutine is exited.
    pub fn step_out(&mut self) -> Result<(), SimErr> {
        let curr_frame = self.frame_stack.len();
        let mut first = Some(()); // is Some if this is the first instruction executed in this call

        // Not in a subroutine, so there's nothing to exit.
        if curr_frame == 0 {
            self.observer.clear();
            return self.finish_run(Ok(PauseCondition::Unpaused));
        }

        // this function should do at least one step before checking its condition
        // condition: run until we've landed in a smaller frame
        self.run_while(|sim| first.take().is_some() || curr_frame <= sim.frame_stack.len())
    }
}
impl Default for Simulator {
    fn default() -> Self {
        Self::new(Default::default())
    }
}

/// A wrapper over `u16` in order to faciliate the PSR.
///
/// The word is encoded as the following:
/// - `PSR[15]`:   Privilege mode (1 = supervisor, 0 = user)
/// - `PSR[0..3]`: Condition codes (`n`, `z`, `p`)
///
/// ```text
///         privilege
///         |         condition codes
///         |         |
///         V         V
/// 0x8002: 1000 0000 0000 0010
///         ~              ~~~
/// ```
///
/// These are exposed as the [`PSR::privileged`] and [`PSR::cc`] values.
#[allow(clippy::upper_case_acronyms)]
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PSR(u16);

impl PSR {
    /// Creates a PSR with the reset value (supervisor mode, `z` condition code).
    pub fn new() -> Self {
        PSR(PSR_INIT)
    }

    /// Checks whether the simulator is in privileged mode.
    /// - `true` = supervisor mode
    /// - `false` = user mode
    pub fn privileged(&self) -> bool {
        (self.0 >> 15) == 1
    }
    /// Checks the condition code of the simulator.
    pub fn cc(&self) -> u8 {
        (self.0 & 0b111) as u8
    }
    /// Checks the condition code of the simulator is `n`.
    pub fn is_n(&self) -> bool {
        self.cc() & 0b100 != 0
    }
    /// Checks the condition code of the simulator is `z`.
    pub fn is_z(&self) -> bool {
        self.cc() & 0b010 != 0
    }
    /// Checks the condition code of the simulator is `p`.
    pub fn is_p(&self) -> bool {
        self.cc() & 0b001 != 0
    }

    /// Gets the bit-representation of the PSR.
    pub fn get(&self) -> u16 {
        self.0
    }
    /// Sets the PSR to the provided data value.
    pub fn set(&mut self, data: u16) {
        const MASK: u16 = 0b1000_0000_0000_0111;

        self.0 = data & MASK;
        self.set_cc((data & 0b111) as u8);
    }
    /// Sets whether the simulator is in privileged mode.
    pub fn set_privileged(&mut self, privl: bool) {
        self.0 &= 0x7FFF;
        self.0 |= u16::from(privl) << 15;
    }
    /// Sets the condition code of the simulator.
    pub fn set_cc(&mut self, mut cc: u8) {
        self.0 &= 0xFFF8;

        // Guard from invalid CC.
        cc &= 0b111;
        if cc.count_ones() != 1 { cc = 0b010 };
        self.0 |= u16::from(cc);
    }
}
impl Default for PSR {
    fn default() -> Self {
        Self::new()
    }
}
impl std::fmt::Debug for PSR {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use std::fmt::Write;
        struct CC(u8);

        impl std::fmt::Debug for CC {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                if self.0 & 0b100 != 0 { f.write_char('N')?; };
                if self.0 & 0b010 != 0 { f.write_char('Z')?; };
                if self.0 & 0b001 != 0 { f.write_char('P')?; };
                Ok(())
            }
        }

        f.debug_struct("PSR")
            .field("privileged", &self.privileged())
            .field("cc", &CC(self.cc()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use rand::Rng;

    use crate::ast::reg_consts::{R0, R1, R2, R3, R7};
    use crate::ast::sim::SimInstr;
    use crate::ast::{ImmOrReg, Offset};
    use crate::obj::{Block, LoadErr, ObjectFile};

    use super::debug::RunStatus;
    use super::{SimErr, SimFlags, Simulator, HALT_ADDR, PC_INIT};

    /// Creates a simulator with `words` loaded at x0000 and the PC pointing there.
    fn sim_with(flags: SimFlags, words: &[u16]) -> Simulator {
        let mut sim = Simulator::new(flags);
        sim.load_obj_file(&ObjectFile::from_iter([Block::Code { addr: 0x0000, words: words.to_vec() }]));
        sim.pc = 0x0000;
        sim
    }
    fn encode(instrs: &[SimInstr]) -> Vec<u16> {
        instrs.iter().flat_map(SimInstr::to_words).collect()
    }
    fn nzp(sim: &Simulator) -> (bool, bool, bool) {
        (sim.psr().is_n(), sim.psr().is_z(), sim.psr().is_p())
    }

    #[test]
    fn initial_state() {
        let sim = Simulator::new(Default::default());
        assert_eq!(sim.pc, PC_INIT);
        assert_eq!(sim.psr().get(), 0x8002);
        assert!(sim.psr().privileged());
        assert_eq!(nzp(&sim), (false, true, false));
        assert_eq!(sim.status(), RunStatus::Idle);
    }

    #[test]
    fn arithmetic() {
        let mut sim = sim_with(Default::default(), &encode(&[
            SimInstr::CONST(R0, Offset::new_trunc(-7)),
            SimInstr::CONST(R1, Offset::new_trunc(3)),
            SimInstr::ADD(R2, R0, ImmOrReg::Reg(R1)),   // -4
            SimInstr::MUL(R3, R0, R1),                  // -21
            SimInstr::SUB(R2, R1, R1),                  // 0
            SimInstr::DIV(R3, R0, R1),                  // unsigned: 0xFFF9 / 3
            SimInstr::MOD(R2, R0, R1),                  // unsigned: 0xFFF9 % 3
            SimInstr::ADD(R1, R1, ImmOrReg::Imm(Offset::new_trunc(-16))),
        ]));

        sim.run_with_limit(2).unwrap();
        sim.step_in().unwrap();
        assert_eq!(sim.reg_file[R2] as i16, -4);
        assert_eq!(nzp(&sim), (true, false, false));
        sim.step_in().unwrap();
        assert_eq!(sim.reg_file[R3] as i16, -21);
        sim.step_in().unwrap();
        assert_eq!(sim.reg_file[R2], 0);
        assert_eq!(nzp(&sim), (false, true, false));
        sim.step_in().unwrap();
        assert_eq!(sim.reg_file[R3], 0xFFF9 / 3);
        assert_eq!(nzp(&sim), (false, false, true));
        sim.step_in().unwrap();
        assert_eq!(sim.reg_file[R2], 0xFFF9 % 3);
        sim.step_in().unwrap();
        assert_eq!(sim.reg_file[R1] as i16, -13);
        assert_eq!(sim.pc, 0x0008);
    }

    #[test]
    fn divide_by_zero() {
        let program = encode(&[
            SimInstr::CONST(R0, Offset::new_trunc(9)),
            SimInstr::CONST(R1, Offset::new_trunc(0)),
            SimInstr::DIV(R2, R0, R1),
            SimInstr::MOD(R3, R0, R1),
        ]);

        let mut sim = sim_with(Default::default(), &program);
        sim.reg_file[R2] = 0x1234;
        sim.reg_file[R3] = 0x1234;
        sim.run_with_limit(4).unwrap();
        assert_eq!(sim.reg_file[R2], 0);
        assert_eq!(sim.reg_file[R3], 0);
        assert_eq!(nzp(&sim), (false, true, false));

        let mut sim = sim_with(SimFlags { strict: true, ..Default::default() }, &program);
        sim.run_with_limit(2).unwrap();
        assert_eq!(sim.step_in(), Err(SimErr::DivideByZero(0x0002)));
        assert_eq!(sim.pc, 0x0002);
        assert_eq!(sim.status(), RunStatus::Halted);
    }

    #[test]
    fn logic_and_shifts() {
        let mut sim = sim_with(Default::default(), &encode(&[
            SimInstr::CONST(R0, Offset::new_trunc(0b1100)),
            SimInstr::CONST(R1, Offset::new_trunc(0b1010)),
            SimInstr::AND(R2, R0, ImmOrReg::Reg(R1)),
            SimInstr::OR(R3, R0, R1),
            SimInstr::XOR(R7, R0, R1),
            SimInstr::NOT(R0, R0),
            SimInstr::AND(R1, R1, ImmOrReg::Imm(Offset::new_trunc(0b0010))),
            SimInstr::SLL(R2, R2, Offset::new_trunc(12)),
            SimInstr::SRA(R3, R2, Offset::new_trunc(4)),
            SimInstr::SRL(R7, R2, Offset::new_trunc(4)),
        ]));

        sim.run_with_limit(7).unwrap();
        assert_eq!(sim.reg_file[R2], 0b1000);
        assert_eq!(sim.reg_file[R3], 0b1110);
        assert_eq!(sim.reg_file[R7], 0b0110);
        assert_eq!(sim.reg_file[R0], !0b1100);
        assert_eq!(sim.reg_file[R1], 0b0010);

        sim.run_with_limit(3).unwrap();
        assert_eq!(sim.reg_file[R2], 0x8000);
        assert_eq!(sim.reg_file[R3], 0xF800);
        assert_eq!(sim.reg_file[R7], 0x0800);
        assert_eq!(nzp(&sim), (false, false, true));
    }

    #[test]
    fn compares_set_only_flags() {
        let mut sim = sim_with(Default::default(), &encode(&[
            SimInstr::CMP(R0, R1),
            SimInstr::CMPU(R0, R1),
            SimInstr::CMPI(R0, Offset::new_trunc(-1)),
            SimInstr::CMPIU(R0, Offset::new_trunc(100)),
        ]));
        sim.reg_file[R0] = 0xFFFF; // -1 signed, 65535 unsigned
        sim.reg_file[R1] = 0x0001;

        sim.step_in().unwrap();
        assert_eq!(nzp(&sim), (true, false, false));
        sim.step_in().unwrap();
        assert_eq!(nzp(&sim), (false, false, true));
        sim.step_in().unwrap();
        assert_eq!(nzp(&sim), (false, true, false));
        sim.step_in().unwrap();
        assert_eq!(nzp(&sim), (false, false, true));

        assert_eq!(sim.reg_file[R0], 0xFFFF);
        assert_eq!(sim.reg_file[R1], 0x0001);
    }

    #[test]
    fn branches() {
        // x0000: CONST R0, #-1
        // x0001: BRzp #1   (not taken)
        // x0002: BRn #1    (taken)
        // x0003: NOP
        // x0004: BRnzp #-5 (to x0000)
        let mut sim = sim_with(Default::default(), &encode(&[
            SimInstr::CONST(R0, Offset::new_trunc(-1)),
            SimInstr::BR(0b011, Offset::new_trunc(1)),
            SimInstr::BR(0b100, Offset::new_trunc(1)),
            SimInstr::NOP,
            SimInstr::BR(0b111, Offset::new_trunc(-5)),
        ]));

        sim.step_in().unwrap();
        sim.step_in().unwrap();
        assert_eq!(sim.pc, 0x0002);
        sim.step_in().unwrap();
        assert_eq!(sim.pc, 0x0004);
        sim.step_in().unwrap();
        assert_eq!(sim.pc, 0x0000);
    }

    #[test]
    fn pc_out_of_bounds() {
        // BRnzp #-2 at x0000 would go to -1
        let mut sim = sim_with(Default::default(), &encode(&[SimInstr::BR(0b111, Offset::new_trunc(-2))]));
        assert_eq!(sim.step_in(), Err(SimErr::PcOutOfBounds { pc: 0x0000, target: -1 }));
        assert_eq!(sim.pc, 0x0000);

        // anything sequential at xFFFF
        let mut sim = Simulator::new(Default::default());
        sim.pc = 0xFFFF;
        sim.reg_file[R0] = 5;
        sim.mem[0xFFFF] = SimInstr::CONST(R0, Offset::new_trunc(1)).encode().unwrap();
        assert_eq!(sim.step_in(), Err(SimErr::PcOutOfBounds { pc: 0xFFFF, target: 0x10000 }));
        assert_eq!(sim.reg_file[R0], 5);
    }

    #[test]
    fn memory_access() {
        let mut sim = sim_with(Default::default(), &encode(&[
            SimInstr::STR(R1, R0, Offset::new_trunc(2)),
            SimInstr::LDR(R2, R0, Offset::new_trunc(2)),
            SimInstr::STR(R1, R3, Offset::new_trunc(0)),
        ]));
        sim.reg_file[R0] = 0x4000;
        sim.reg_file[R1] = 0xBEEF;
        sim.reg_file[R3] = 0x0001; // user code

        sim.step_in().unwrap();
        assert_eq!(sim.mem[0x4002], 0xBEEF);
        assert!(sim.observer.get_mem_accesses(0x4002).modified());

        sim.step_in().unwrap();
        assert_eq!(sim.reg_file[R2], 0xBEEF);
        assert_eq!(nzp(&sim), (true, false, false));

        // permissive: skipped write
        let word = sim.mem[0x0001];
        sim.step_in().unwrap();
        assert_eq!(sim.mem[0x0001], word);
        assert_eq!(sim.pc, 0x0003);
    }

    #[test]
    fn strict_access_violation() {
        let mut sim = sim_with(SimFlags { strict: true, ..Default::default() }, &encode(&[
            SimInstr::STR(R1, R0, Offset::new_trunc(0)),
        ]));
        sim.reg_file[R0] = 0xA000;
        sim.psr_mut().set_privileged(false);

        assert_eq!(sim.step_in(), Err(SimErr::AccessViolation { addr: 0xA000, region: super::Region::OsData }));
        assert_eq!(sim.mem[0xA000], 0);
        assert_eq!(sim.pc, 0x0000);

        sim.psr_mut().set_privileged(true);
        sim.step_in().unwrap();
        assert_eq!(sim.pc, 0x0001);
    }

    #[test]
    fn const_hiconst() {
        let mut sim = sim_with(Default::default(), &encode(&[
            SimInstr::CONST(R0, Offset::new_trunc(0x0AB)),
            SimInstr::HICONST(R0, Offset::new_trunc(0xCD)),
        ]));
        sim.run_with_limit(2).unwrap();
        assert_eq!(sim.reg_file[R0], 0xCDAB);
        assert_eq!(nzp(&sim), (true, false, false));
    }

    #[test]
    fn jsr_ret_pairing() {
        // x0000: JSR #1 (to x0010)
        // x0001: TRAP xFF
        // x0010: CONST R0, #7
        // x0011: RET
        let mut sim = sim_with(Default::default(), &encode(&[
            SimInstr::JSR(ImmOrReg::Imm(Offset::new_trunc(1))),
            SimInstr::TRAP(Offset::new_trunc(0xFF)),
        ]));
        sim.mem.copy_block(0x0010, &encode(&[
            SimInstr::CONST(R0, Offset::new_trunc(7)),
            SimInstr::RET,
        ]));

        sim.step_in().unwrap();
        assert_eq!(sim.pc, 0x0010);
        assert_eq!(sim.reg_file[R7], 0x0001);
        assert_eq!(sim.frame_stack.len(), 1);

        sim.step_in().unwrap();
        sim.step_in().unwrap();
        assert_eq!(sim.pc, 0x0001);
        assert_eq!(sim.frame_stack.len(), 0);

        sim.run().unwrap();
        assert!(sim.hit_halt());
        assert_eq!(sim.reg_file[R0], 7);
    }

    #[test]
    fn jsr_keeps_region() {
        let mut sim = Simulator::new(Default::default());
        sim.pc = 0x8300;
        sim.mem[0x8300] = SimInstr::JSR(ImmOrReg::Imm(Offset::new_trunc(0x20))).encode().unwrap();
        sim.step_in().unwrap();
        assert_eq!(sim.pc, 0x8200);
        assert_eq!(sim.reg_file[R7], 0x8301);
    }

    #[test]
    fn jsrr_r7_uses_old_value() {
        let mut sim = sim_with(Default::default(), &encode(&[SimInstr::JSR(ImmOrReg::Reg(R7))]));
        sim.reg_file[R7] = 0x0100;
        sim.step_in().unwrap();
        assert_eq!(sim.pc, 0x0100);
        assert_eq!(sim.reg_file[R7], 0x0001);
    }

    #[test]
    fn jumps() {
        let mut sim = sim_with(Default::default(), &encode(&[
            SimInstr::JMP(ImmOrReg::Imm(Offset::new_trunc(3))),
        ]));
        sim.mem[0x0004] = SimInstr::JMP(ImmOrReg::Reg(R1)).encode().unwrap();
        sim.reg_file[R1] = 0x0040;
        let cc = sim.psr().cc();

        sim.step_in().unwrap();
        assert_eq!(sim.pc, 0x0004);
        sim.step_in().unwrap();
        assert_eq!(sim.pc, 0x0040);
        assert_eq!(sim.psr().cc(), cc);
    }

    #[test]
    fn trap_rti() {
        let mut sim = sim_with(Default::default(), &encode(&[SimInstr::TRAP(Offset::new_trunc(0x25))]));
        sim.psr_mut().set_privileged(false);
        sim.mem[0x8025] = SimInstr::RTI.encode().unwrap();

        sim.step_in().unwrap();
        assert_eq!(sim.pc, 0x8025);
        assert!(sim.psr().privileged());
        assert_eq!(sim.reg_file[R7], 0x0001);

        sim.step_in().unwrap();
        assert_eq!(sim.pc, 0x0001);
        assert!(!sim.psr().privileged());
    }

    #[test]
    fn privilege_gate() {
        let mut sim = Simulator::new(Default::default());
        sim.mem[PC_INIT] = SimInstr::CONST(R0, Offset::new_trunc(1)).encode().unwrap();
        sim.psr_mut().set_privileged(false);
        let psr = *sim.psr();

        assert_eq!(sim.step_in(), Err(SimErr::PrivilegeViolation(PC_INIT)));
        assert_eq!(sim.reg_file[R0], 0);
        assert_eq!(sim.pc, PC_INIT);
        assert_eq!(*sim.psr(), psr);
        assert_eq!(sim.status(), RunStatus::Halted);

        // ignoring privilege
        sim.flags.ignore_privilege = true;
        sim.step_in().unwrap();
        assert_eq!(sim.reg_file[R0], 1);
    }

    #[test]
    fn halt_sentinel() {
        let mut sim = Simulator::new(Default::default());
        sim.pc = HALT_ADDR;
        sim.mem[HALT_ADDR] = SimInstr::CONST(R0, Offset::new_trunc(1)).encode().unwrap();

        sim.step_in().unwrap();
        assert!(sim.hit_halt());
        assert_eq!(sim.pc, HALT_ADDR);
        assert_eq!(sim.reg_file[R0], 0);
        assert_eq!(sim.instructions_run, 0);
        assert_eq!(sim.status(), RunStatus::Halted);
    }

    #[test]
    fn unknown_opcodes() {
        let mut sim = sim_with(Default::default(), &[0x3000, 0xB000]);
        sim.run_with_limit(2).unwrap();
        assert_eq!(sim.pc, 0x0002);

        let mut sim = sim_with(SimFlags { strict: true, ..Default::default() }, &[0x3000]);
        assert_eq!(sim.step_in(), Err(SimErr::IllegalOpcode { pc: 0, word: 0x3000 }));
        assert_eq!(sim.pc, 0x0000);
    }

    #[test]
    fn data_execution() {
        let mut sim = Simulator::new(Default::default());
        sim.pc = 0x2000;
        sim.step_in().unwrap();
        assert_eq!(sim.pc, 0x2001);

        sim.flags.strict = true;
        assert_eq!(sim.step_in(), Err(SimErr::DataExecution(0x2001)));
    }

    #[test]
    fn breakpoint_stop() {
        // four NOPs, then halt
        let mut sim = sim_with(Default::default(), &encode(&[
            SimInstr::NOP,
            SimInstr::NOP,
            SimInstr::NOP,
            SimInstr::NOP,
            SimInstr::TRAP(Offset::new_trunc(0xFF)),
        ]));
        sim.set_breakpoint(0x0002);

        sim.run().unwrap();
        assert!(sim.hit_breakpoint());
        assert_eq!(sim.pc, 0x0002);
        assert_eq!(sim.instructions_run, 2);

        // continuing from a breakpoint makes progress
        sim.run().unwrap();
        assert!(sim.hit_halt());
        assert_eq!(sim.pc, HALT_ADDR);
        assert_eq!(sim.instructions_run, 5);
    }

    #[test]
    fn next_is_flat() {
        // x0000: JSR #1 (to x0010), x0001: NOP
        // x0010: NOP, x0011: RET
        let mut sim = sim_with(Default::default(), &encode(&[
            SimInstr::JSR(ImmOrReg::Imm(Offset::new_trunc(1))),
            SimInstr::NOP,
        ]));
        sim.mem.copy_block(0x0010, &encode(&[SimInstr::NOP, SimInstr::RET]));

        sim.step_next().unwrap();
        assert_eq!(sim.pc, 0x0001);
        assert_eq!(sim.instructions_run, 3);

        // a breakpoint inside the subroutine stops `next`
        sim.pc = 0x0000;
        sim.set_breakpoint(0x0011);
        sim.step_next().unwrap();
        assert!(sim.hit_breakpoint());
        assert_eq!(sim.pc, 0x0011);
    }

    #[test]
    fn over_and_out() {
        // x0000: JSR #1 (to x0010), x0001: TRAP xFF
        // x0010: NOP, x0011: NOP, x0012: RET
        let mut sim = sim_with(SimFlags { debug_frames: true, ..Default::default() }, &encode(&[
            SimInstr::JSR(ImmOrReg::Imm(Offset::new_trunc(1))),
            SimInstr::TRAP(Offset::new_trunc(0xFF)),
        ]));
        sim.mem.copy_block(0x0010, &encode(&[SimInstr::NOP, SimInstr::NOP, SimInstr::RET]));

        sim.step_over().unwrap();
        assert_eq!(sim.pc, 0x0001);

        sim.pc = 0x0000;
        sim.step_in().unwrap();
        assert_eq!(sim.frame_stack.frames().map(<[_]>::len), Some(1));
        sim.step_out().unwrap();
        assert_eq!(sim.pc, 0x0001);
        assert!(sim.frame_stack.is_empty());

        // outside any subroutine, step_out runs nothing and forgets the last stop
        sim.set_breakpoint(0x0010);
        sim.pc = 0x0000;
        sim.run().unwrap();
        assert!(sim.hit_breakpoint());
        sim.pc = 0x0001;
        sim.frame_stack.pop_frame();
        let count = sim.instructions_run;
        sim.step_out().unwrap();
        assert_eq!(sim.instructions_run, count);
        assert!(!sim.hit_breakpoint());
    }

    #[test]
    fn reset_and_clear() {
        let mut sim = sim_with(Default::default(), &[0x9205]);
        sim.labels.insert("START".to_string(), 0x0000);
        sim.set_breakpoint(0x0001);
        sim.step_in().unwrap();
        assert_eq!(sim.status(), RunStatus::Running);

        sim.reset();
        assert_eq!(sim.pc, PC_INIT);
        assert_eq!(sim.reg_file[R1], 0);
        assert_eq!(sim.psr().get(), 0x8002);
        assert_eq!(sim.mem[0x0000], 0x9205);
        assert!(sim.metadata.is_breakpoint(0x0001));
        assert_eq!(sim.status(), RunStatus::Idle);

        sim.clear();
        assert_eq!(sim.mem[0x0000], 0);
        assert!(!sim.metadata.is_breakpoint(0x0001));
        assert!(sim.labels.is_empty());
    }

    #[test]
    fn load_keeps_prefix() {
        let mut bytes = ObjectFile::from_iter([
            Block::Code { addr: 0x0000, words: vec![0x9400, 0x2300, 0x0C03] },
            Block::Symbol { addr: 0x0000, name: "MAIN".to_string() },
        ]).to_bytes();
        // a data block cut short
        bytes.extend([0xDA, 0xDA, 0x40, 0x00, 0x00, 0x02, 0x12]);

        let mut sim = Simulator::new(Default::default());
        sim.mem[0x0003] = 0x7777;
        assert!(sim.load_bytes(&bytes).is_err());
        assert_eq!(sim.mem.window(0x0000, 4).map(|(_, w)| w).collect::<Vec<_>>(), [0x9400, 0x2300, 0x0C03, 0x7777]);
        assert_eq!(sim.label_addr("MAIN"), Some(0x0000));
        assert_eq!(sim.metadata.label(0x0000), Some("MAIN"));
        assert_eq!(sim.mem[0x4000], 0);
    }

    #[test]
    fn load_keeps_truncated_words() {
        let bytes = [0xCA, 0xDE, 0x00, 0x00, 0x00, 0x03, 0x94, 0x00, 0x23, 0x00];

        let mut sim = Simulator::new(Default::default());
        let err = sim.load_bytes(&bytes).unwrap_err();
        assert!(matches!(err, LoadErr::Truncated { offset: 0, .. }), "{err:?}");
        assert_eq!(sim.mem[0x0000], 0x9400);
        assert_eq!(sim.mem[0x0001], 0x2300);
        assert_eq!(sim.mem[0x0002], 0);
    }

    #[test]
    fn eval_lc() {
        let mut sim = Simulator::new(Default::default());
        sim.labels.insert("K".to_string(), 0x2000);
        sim.mem[0x2000] = 0x8001;

        let lc = SimInstr::lc(R2, "K", &sim.labels, |addr| sim.mem[addr]).unwrap();
        sim.eval(lc).unwrap();
        assert_eq!(sim.reg_file[R2], 0x8001);
        assert_eq!(nzp(&sim), (true, false, false));
        assert_eq!(sim.pc, PC_INIT + 1);
    }

    #[test]
    fn flag_exclusivity() {
        let mut rng = rand::thread_rng();
        let mut sim = Simulator::new(SimFlags { ignore_privilege: true, ..Default::default() });

        for _ in 0..2048 {
            let instr = SimInstr::decode(rng.gen());
            if !instr.sets_cc() { continue; }

            for reg in crate::ast::Reg::all() {
                sim.reg_file[reg] = rng.gen();
            }
            sim.pc = 0x2000;
            sim.eval(instr).unwrap();
            assert_eq!(sim.psr().cc().count_ones(), 1, "after {instr}");
        }
    }
}
