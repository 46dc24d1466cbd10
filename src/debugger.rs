//! The interactive debugger shell.
//!
//! A [`Debugger`] wraps a [`Simulator`] and runs text commands against it
//! (see [`command::Command`] for the command set),
//! writing everything it reports to a caller-provided writer.
//!
//! ```
//! use lc4_sim::debugger::{Debugger, Flow};
//!
//! let mut dbg = Debugger::new(Default::default());
//! let mut out = Vec::new();
//!
//! assert_eq!(dbg.execute_line("b 0x0003", &mut out).unwrap(), Flow::Continue);
//! assert_eq!(String::from_utf8(out).unwrap(), "Breakpoint set at 0x0003\n");
//! ```
//!
//! This module consists of:
//! - [`lex`]: The tokenizer for command arguments.
//! - [`command`]: Parsing command lines into [`command::Command`]s.
//! - [`asm`]: Parsing the instruction given to `eval`.

pub mod asm;
pub mod command;
pub mod lex;

use std::io::{self, Write};

use colored::Colorize;

use crate::ast::sim::SimInstr;
use crate::sim::{SimErr, SimFlags, Simulator};
use self::command::{Command, Location, PrintTarget};

const HELP: &str = include_str!("debugger/help.txt");

/// Whether the shell should keep reading commands.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Flow {
    /// Read the next command.
    Continue,
    /// The user asked to leave.
    Quit,
}

/// A command shell over a [`Simulator`].
#[derive(Debug)]
pub struct Debugger {
    /// The machine being debugged.
    pub sim: Simulator,
}

impl Debugger {
    /// Creates a debugger over a fresh simulator.
    pub fn new(flags: SimFlags) -> Self {
        Self { sim: Simulator::new(flags) }
    }

    /// Parses and executes one command line.
    ///
    /// Parse errors are reported to `out`; only I/O errors on `out` are returned.
    pub fn execute_line(&mut self, line: &str, out: &mut impl Write) -> io::Result<Flow> {
        match Command::parse(line) {
            Ok(Some(cmd)) => self.execute(cmd, out),
            Ok(None) => Ok(Flow::Continue),
            Err(e) => {
                report(out, &e)?;
                Ok(Flow::Continue)
            }
        }
    }

    /// Executes a command.
    ///
    /// Failures of the command itself are reported to `out`.
    pub fn execute(&mut self, cmd: Command, out: &mut impl Write) -> io::Result<Flow> {
        tracing::debug!(command = ?cmd, "executing command");

        match cmd {
            Command::Load(path) => {
                self.sim.clear();
                match self.sim.load_path(&path) {
                    Ok(()) => writeln!(out, "Loaded {}", path.display())?,
                    Err(e) => report(out, &e)?,
                }
            },
            Command::Run => {
                self.sim.reset();
                let result = self.sim.run();
                self.report_stop(out, result)?;
            },
            Command::Continue => {
                let result = self.sim.run();
                self.report_stop(out, result)?;
            },
            Command::Step(count) => {
                // one run, so `print reg` shows every change made by all `count` steps
                let result = self.sim.run_with_limit(count);
                self.report_stop(out, result)?;
            },
            Command::Next => {
                let result = self.sim.step_next();
                self.report_stop(out, result)?;
            },
            Command::Over => {
                let result = self.sim.step_over();
                self.report_stop(out, result)?;
            },
            Command::Finish => {
                let result = self.sim.step_out();
                self.report_stop(out, result)?;
            },
            Command::Breakpoint(loc) => match loc.resolve(&self.sim.labels) {
                Ok(addr) => {
                    self.sim.set_breakpoint(addr);
                    writeln!(out, "Breakpoint set at 0x{addr:04X}")?;
                },
                Err(e) => report(out, &e)?,
            },
            Command::Delete(loc) => match loc.resolve(&self.sim.labels) {
                Ok(addr) if self.sim.remove_breakpoint(addr) => writeln!(out, "Breakpoint deleted at 0x{addr:04X}")?,
                Ok(addr) => writeln!(out, "No breakpoint at 0x{addr:04X}")?,
                Err(e) => report(out, &e)?,
            },
            Command::Breakpoints => {
                let mut any = false;
                for addr in self.sim.metadata.breakpoints() {
                    any = true;
                    match self.sim.metadata.label(addr) {
                        Some(label) => writeln!(out, "Breakpoint at 0x{addr:04X} ({label})")?,
                        None => writeln!(out, "Breakpoint at 0x{addr:04X}")?,
                    }
                }
                if !any {
                    writeln!(out, "No breakpoints set")?;
                }
            },
            Command::Print(target) => self.print(target, out)?,
            Command::Eval(instr) => {
                match instr.resolve(&self.sim) {
                    Ok(instr) => if let Err(e) = self.sim.eval(instr) {
                        report(out, &e)?;
                    },
                    Err(e) => report(out, &e)?,
                }
            },
            Command::Reset => self.sim.reset(),
            Command::Clear => self.sim.clear(),
            Command::Help => write!(out, "{HELP}")?,
            Command::Quit => return Ok(Flow::Quit),
        }

        Ok(Flow::Continue)
    }

    /// Reports why a run loop stopped.
    fn report_stop(&self, out: &mut impl Write, result: Result<(), SimErr>) -> io::Result<()> {
        match result {
            Err(e) => report(out, &e),
            Ok(()) if self.sim.hit_breakpoint() => writeln!(out, "Hit breakpoint at 0x{:04X}", self.sim.pc),
            Ok(()) if self.sim.hit_halt() => writeln!(out, "Halted at 0x{:04X}", self.sim.pc),
            Ok(()) => Ok(()),
        }
    }

    fn print(&self, target: PrintTarget, out: &mut impl Write) -> io::Result<()> {
        match target {
            PrintTarget::All => {
                self.print_code(out)?;
                self.print_psr(out)?;
                self.print_reg(out)
            },
            PrintTarget::Code => self.print_code(out),
            PrintTarget::Mem { start, count } => self.print_mem(&start, count, out),
            PrintTarget::Psr | PrintTarget::Nzp => self.print_psr(out),
            PrintTarget::Reg => self.print_reg(out),
            PrintTarget::Labels => self.print_labels(out),
        }
    }

    fn print_code(&self, out: &mut impl Write) -> io::Result<()> {
        let pc = self.sim.pc;
        writeln!(out, "{}", word_line(pc, self.sim.mem[pc]))
    }

    fn print_mem(&self, start: &Location, count: u16, out: &mut impl Write) -> io::Result<()> {
        let start = match start.resolve(&self.sim.labels) {
            Ok(start) => start,
            Err(e) => return report(out, &e),
        };

        for (addr, word) in self.sim.mem.window(start, count) {
            writeln!(out, "{}", word_line(addr, word))?;
        }
        Ok(())
    }

    fn print_psr(&self, out: &mut impl Write) -> io::Result<()> {
        let psr = self.sim.psr();
        writeln!(out, "psr:\t{}/{}/{} (privilege {})",
            u8::from(psr.is_n()),
            u8::from(psr.is_z()),
            u8::from(psr.is_p()),
            psr.privileged()
        )
    }

    fn print_reg(&self, out: &mut impl Write) -> io::Result<()> {
        for (reg, value) in self.sim.reg_file.iter() {
            let line = format!("\t{reg}: {value:016b} / 0x{value:04X}");
            match self.sim.observer.get_reg_accesses(reg).modified() {
                true  => writeln!(out, "{}", line.yellow())?,
                false => writeln!(out, "{line}")?,
            }
        }
        Ok(())
    }

    fn print_labels(&self, out: &mut impl Write) -> io::Result<()> {
        if self.sim.labels.is_empty() {
            return writeln!(out, "No labels loaded");
        }

        let mut labels: Vec<_> = self.sim.labels.iter().collect();
        labels.sort_by_key(|&(name, &addr)| (addr, name));
        for (name, addr) in labels {
            writeln!(out, "0x{addr:04X}:\t{name}")?;
        }
        Ok(())
    }
}

/// A memory word in the shell's format: address, binary, hex, and disassembly.
fn word_line(addr: u16, word: u16) -> String {
    format!("0x{addr:04X}:\t0b{word:016b} / 0x{word:04X}\t{}", SimInstr::decode(word))
}

/// Writes an error and its help (if any).
fn report(out: &mut impl Write, err: &dyn crate::err::Error) -> io::Result<()> {
    writeln!(out, "{}", err.to_string().red())?;
    if let Some(help) = err.help() {
        writeln!(out, "{} {help}", "help:".cyan())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::ast::reg_consts::{R0, R1, R2};
    use crate::obj::{Block, ObjectFile};
    use crate::sim::{SimFlags, HALT_ADDR};

    use super::{Debugger, Flow};

    /// Multiplies R0 = 3 by R1 = 4 into R2, started by a two-instruction OS stub.
    fn multiply() -> ObjectFile {
        ObjectFile::from_iter([
            Block::Code { addr: 0x8200, words: vec![0x9E00, 0x8000] },
            Block::Code { addr: 0x0000, words: vec![0x9003, 0x9204, 0x9400, 0x2300, 0x0C03, 0x1480, 0x127F, 0x0FFB, 0xF0FF] },
            Block::Symbol { addr: 0x0000, name: "MAIN".to_string() },
            Block::Symbol { addr: 0x0003, name: "LOOP".to_string() },
            Block::Symbol { addr: 0x0008, name: "END".to_string() },
        ])
    }

    fn debugger() -> Debugger {
        colored::control::set_override(false);

        let mut dbg = Debugger::new(SimFlags::default());
        dbg.sim.load_obj_file(&multiply());
        dbg
    }

    fn run(dbg: &mut Debugger, lines: &[&str]) -> String {
        let mut out = Vec::new();
        for line in lines {
            dbg.execute_line(line, &mut out).unwrap();
        }
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn run_to_halt() {
        let mut dbg = debugger();
        assert_eq!(run(&mut dbg, &["run"]), "Halted at 0x80FF\n");
        assert_eq!(dbg.sim.pc, HALT_ADDR);
        assert_eq!(dbg.sim.reg_file[R2], 12);

        // continuing at the halt sentinel executes nothing
        let count = dbg.sim.instructions_run;
        assert_eq!(run(&mut dbg, &["c"]), "Halted at 0x80FF\n");
        assert_eq!(dbg.sim.instructions_run, count);
    }

    #[test]
    fn breakpoints() {
        let mut dbg = debugger();
        assert_eq!(
            run(&mut dbg, &["b LOOP", "r", "c"]),
            "Breakpoint set at 0x0003\nHit breakpoint at 0x0003\nHit breakpoint at 0x0003\n"
        );

        assert_eq!(
            run(&mut dbg, &["p r"]),
            concat!(
                "\tR0: 0000000000000011 / 0x0003\n",
                "\tR1: 0000000000000011 / 0x0003\n",
                "\tR2: 0000000000000011 / 0x0003\n",
                "\tR3: 0000000000000000 / 0x0000\n",
                "\tR4: 0000000000000000 / 0x0000\n",
                "\tR5: 0000000000000000 / 0x0000\n",
                "\tR6: 0000000000000000 / 0x0000\n",
                "\tR7: 0000000000000000 / 0x0000\n",
            )
        );

        assert_eq!(
            run(&mut dbg, &["bl", "d 3", "d 3", "bl"]),
            "Breakpoint at 0x0003 (LOOP)\nBreakpoint deleted at 0x0003\nNo breakpoint at 0x0003\nNo breakpoints set\n"
        );
        assert_eq!(run(&mut dbg, &["c"]), "Halted at 0x80FF\n");
    }

    #[test]
    fn invalid_address() {
        let mut dbg = debugger();
        let out = run(&mut dbg, &["b 0xZZ", "b NOWHERE"]);
        let mut lines = out.lines();
        assert_eq!(lines.next(), Some("Invalid address: 0xZZ"));
        assert!(lines.next().is_some_and(|l| l.starts_with("help:")));
        assert_eq!(lines.next(), Some("unknown label `NOWHERE`"));
        assert_eq!(dbg.sim.metadata.breakpoints().count(), 0);
    }

    #[test]
    fn print_formats() {
        let mut dbg = debugger();
        assert_eq!(
            run(&mut dbg, &["p"]),
            concat!(
                "0x8200:\t0b1001111000000000 / 0x9E00\tCONST R7, #0\n",
                "psr:\t0/1/0 (privilege true)\n",
                "\tR0: 0000000000000000 / 0x0000\n",
                "\tR1: 0000000000000000 / 0x0000\n",
                "\tR2: 0000000000000000 / 0x0000\n",
                "\tR3: 0000000000000000 / 0x0000\n",
                "\tR4: 0000000000000000 / 0x0000\n",
                "\tR5: 0000000000000000 / 0x0000\n",
                "\tR6: 0000000000000000 / 0x0000\n",
                "\tR7: 0000000000000000 / 0x0000\n",
            )
        );
        assert_eq!(
            run(&mut dbg, &["p m MAIN 2"]),
            "0x0000:\t0b1001000000000011 / 0x9003\tCONST R0, #3\n0x0001:\t0b1001001000000100 / 0x9204\tCONST R1, #4\n"
        );
        assert_eq!(
            run(&mut dbg, &["p l"]),
            "0x0000:\tMAIN\n0x0003:\tLOOP\n0x0008:\tEND\n"
        );

        assert_eq!(run(&mut dbg, &["s 2", "p n"]), "psr:\t0/1/0 (privilege false)\n");
    }

    #[test]
    fn next_and_step() {
        let mut dbg = debugger();
        run(&mut dbg, &["s 4"]);
        assert_eq!(dbg.sim.pc, 0x0002);
        run(&mut dbg, &["n"]);
        assert_eq!(dbg.sim.pc, 0x0003);

        // stepping stops at the halt sentinel
        assert_eq!(run(&mut dbg, &["s 1000"]), "Halted at 0x80FF\n");
    }

    #[test]
    fn finish_at_top_level() {
        let mut dbg = debugger();
        assert_eq!(run(&mut dbg, &["b 0x8201", "c"]), "Breakpoint set at 0x8201\nHit breakpoint at 0x8201\n");

        // no subroutine to leave: nothing runs, and the old stop is not reported again
        let count = dbg.sim.instructions_run;
        assert_eq!(run(&mut dbg, &["finish"]), "");
        assert_eq!(dbg.sim.instructions_run, count);
        assert_eq!(dbg.sim.pc, 0x8201);
        assert!(!dbg.sim.hit_breakpoint());
    }

    #[test]
    fn step_count_tracks_all_changes() {
        let mut dbg = debugger();
        dbg.sim.pc = 0x0000;
        dbg.sim.psr_mut().set_privileged(false);

        // CONST R0, #3 / CONST R1, #4
        assert_eq!(run(&mut dbg, &["s 2"]), "");
        assert_eq!(dbg.sim.pc, 0x0002);
        assert!(dbg.sim.observer.get_reg_accesses(R0).modified());
        assert!(dbg.sim.observer.get_reg_accesses(R1).modified());
        assert!(!dbg.sim.observer.get_reg_accesses(R2).accessed());

        // stepping stops early at a breakpoint
        assert_eq!(run(&mut dbg, &["b LOOP", "s 5"]), "Breakpoint set at 0x0003\nHit breakpoint at 0x0003\n");
        assert_eq!(dbg.sim.pc, 0x0003);
    }

    #[test]
    fn eval_and_reset() {
        let mut dbg = debugger();
        assert_eq!(run(&mut dbg, &["e CONST R2, #-5", "e LEA R3, END"]), "");
        assert_eq!(dbg.sim.reg_file[R2] as i16, -5);
        assert_eq!(dbg.sim.pc, 0x8202);

        let out = run(&mut dbg, &["e LC R3, NOWHERE", "e FOO"]);
        assert_eq!(out, "unknown label `NOWHERE`\nhelp: `print labels` lists the labels of the loaded object files\nunknown instruction `FOO`\n");

        run(&mut dbg, &["reset"]);
        assert_eq!(dbg.sim.pc, 0x8200);
        assert_eq!(dbg.sim.reg_file[R2], 0);
        assert_eq!(dbg.sim.mem[0x0000], 0x9003);

        run(&mut dbg, &["clear"]);
        assert_eq!(dbg.sim.mem[0x0000], 0);
        assert_eq!(run(&mut dbg, &["p l"]), "No labels loaded\n");
    }

    #[test]
    fn faults_are_reported() {
        let mut dbg = debugger();
        dbg.sim.pc = 0x0000;
        dbg.sim.psr_mut().set_privileged(false);
        dbg.sim.mem[0x0000] = 0x8000; // RTI
        dbg.sim.reg_file[crate::ast::reg_consts::R7] = 0x8300;

        let out = run(&mut dbg, &["s", "s"]);
        assert_eq!(out.lines().next(), Some("privilege violation: cannot execute OS code at x8300 in user mode"));
        assert_eq!(dbg.sim.pc, 0x8300);
    }

    #[test]
    fn quit() {
        let mut dbg = debugger();
        let mut out = Vec::new();
        assert_eq!(dbg.execute_line("help", &mut out).unwrap(), Flow::Continue);
        assert!(String::from_utf8(out).unwrap().starts_with("Commands"));
        assert_eq!(dbg.execute_line("q", &mut Vec::new()).unwrap(), Flow::Quit);
    }
}
