//! Parsing debugger commands.
//!
//! A command line is a command name (or its alias) followed by arguments:
//!
//! ```
//! use lc4_sim::debugger::command::{Command, Location, PrintTarget};
//!
//! assert_eq!(Command::parse("b 0x8200").unwrap(), Some(Command::Breakpoint(Location::Addr(0x8200))));
//! assert_eq!(Command::parse("p m x2000 4").unwrap(), Some(Command::Print(PrintTarget::Mem {
//!     start: Location::Addr(0x2000),
//!     count: 4,
//! })));
//! assert_eq!(Command::parse("   ").unwrap(), None);
//! ```
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::path::PathBuf;

use logos::{Lexer, Logos};

use crate::ast::OffsetNewErr;
use super::asm::EvalInstr;
use super::lex::{LexErr, Token};

/// An address argument, either literal or by label.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Location {
    /// A literal address.
    Addr(u16),
    /// A label from the loaded object files.
    Label(String),
}
impl Location {
    /// Resolves this location against the loaded labels.
    pub fn resolve(&self, labels: &BTreeMap<String, u16>) -> Result<u16, CommandErr> {
        match self {
            Location::Addr(addr) => Ok(*addr),
            Location::Label(label) => labels.get(label)
                .copied()
                .ok_or_else(|| CommandErr::UnknownLabel(label.clone())),
        }
    }
}
impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Location::Addr(addr) => write!(f, "0x{addr:04X}"),
            Location::Label(label) => f.write_str(label),
        }
    }
}

/// What a `print` command shows.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum PrintTarget {
    /// The code line, PSR, and registers (plain `print`).
    All,
    /// The word at the PC.
    Code,
    /// A window of memory.
    Mem {
        /// The first address to show.
        start: Location,
        /// How many words to show.
        count: u16,
    },
    /// The PSR.
    Psr,
    /// The condition codes (shown as the PSR line).
    Nzp,
    /// The register file.
    Reg,
    /// Every loaded label.
    Labels,
}

/// A parsed debugger command.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Command {
    /// Clear the machine, then load an object file.
    Load(PathBuf),
    /// Reset the machine, then continue.
    Run,
    /// Run until halt, breakpoint, or fault.
    Continue,
    /// Execute this many instructions.
    Step(u64),
    /// Run until the PC reaches its current value plus one.
    Next,
    /// Step, running through subroutine calls.
    Over,
    /// Run until the current subroutine returns.
    Finish,
    /// Set a breakpoint.
    Breakpoint(Location),
    /// Remove a breakpoint.
    Delete(Location),
    /// List the breakpoints.
    Breakpoints,
    /// Print part of the machine state.
    Print(PrintTarget),
    /// Execute one instruction as though it were at the PC.
    Eval(EvalInstr),
    /// Reset registers, PC, and PSR.
    Reset,
    /// Reset and zero memory, labels, and breakpoints.
    Clear,
    /// List the commands.
    Help,
    /// Leave the shell.
    Quit,
}

impl Command {
    /// Parses one command line.
    ///
    /// This returns `None` for lines which are blank or only a comment.
    pub fn parse(line: &str) -> Result<Option<Self>, CommandErr> {
        let line = line.trim();
        if line.is_empty() || line.starts_with(';') {
            return Ok(None);
        }

        let (name, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();
        let mut args = Args::new(rest);

        let cmd = match &*name.to_lowercase() {
            "load" | "l" => match rest {
                "" => return Err(CommandErr::MissingArgument("a file path")),
                path => return Ok(Some(Command::Load(PathBuf::from(path)))),
            },
            "run" | "r" => Command::Run,
            "continue" | "c" => Command::Continue,
            "step" | "s" => match args.next() {
                None => Command::Step(1),
                Some((Ok(Token::Unsigned(n @ 1..)), _)) => Command::Step(u64::from(n)),
                Some((_, src)) => return Err(CommandErr::InvalidCount(src.to_string())),
            },
            "next" | "n" => Command::Next,
            "over" | "o" => Command::Over,
            "finish" | "f" => Command::Finish,
            "breakpoint" | "break" | "b" => Command::Breakpoint(args.location()?),
            "delete" | "d" => Command::Delete(args.location()?),
            "breakpoints" | "bl" => Command::Breakpoints,
            "print" | "p" => Command::Print(args.print_target()?),
            "eval" | "e" => match rest {
                "" => return Err(CommandErr::MissingArgument("an instruction")),
                src => return EvalInstr::parse(src).map(|i| Some(Command::Eval(i))),
            },
            "reset" => Command::Reset,
            "clear" => Command::Clear,
            "help" | "h" => Command::Help,
            "quit" | "exit" | "q" => Command::Quit,
            _ => return Err(CommandErr::UnknownCommand(name.to_string())),
        };

        args.finish()?;
        Ok(Some(cmd))
    }
}

/// A cursor over the arguments of a command line.
///
/// Commas and comments are skipped.
pub(crate) struct Args<'a> {
    lx: Lexer<'a, Token>,
}
impl<'a> Args<'a> {
    pub(crate) fn new(src: &'a str) -> Self {
        Self { lx: Token::lexer(src) }
    }

    /// The next token along with the text it was lexed from.
    pub(crate) fn next(&mut self) -> Option<(Result<Token, LexErr>, &'a str)> {
        loop {
            match self.lx.next()? {
                Ok(Token::Comma | Token::Comment) => continue,
                tok => break Some((tok, self.lx.slice())),
            }
        }
    }

    /// Errors if any arguments are left over.
    pub(crate) fn finish(mut self) -> Result<(), CommandErr> {
        match self.next() {
            None => Ok(()),
            Some((_, src)) => Err(CommandErr::UnexpectedArgument(src.to_string())),
        }
    }

    /// Reads an address argument.
    ///
    /// Anything that is not an unsigned literal or a label is an invalid address.
    fn location(&mut self) -> Result<Location, CommandErr> {
        match self.next() {
            None => Err(CommandErr::MissingArgument("an address or label")),
            Some((Ok(Token::Unsigned(addr)), _)) => Ok(Location::Addr(addr)),
            Some((Ok(Token::Ident(label)), _)) => Ok(Location::Label(label)),
            Some((_, src)) => Err(CommandErr::InvalidAddress(src.to_string())),
        }
    }

    fn print_target(&mut self) -> Result<PrintTarget, CommandErr> {
        let Some((tok, src)) = self.next() else {
            return Ok(PrintTarget::All);
        };

        let Ok(Token::Ident(sub)) = tok else {
            return Err(CommandErr::UnknownPrintTarget(src.to_string()));
        };
        match &*sub.to_lowercase() {
            "code" | "c" => Ok(PrintTarget::Code),
            "mem" | "m" => {
                let start = self.location()?;
                let count = match self.next() {
                    None => 1,
                    Some((Ok(Token::Unsigned(n @ 1..)), _)) => n,
                    Some((_, src)) => return Err(CommandErr::InvalidCount(src.to_string())),
                };
                Ok(PrintTarget::Mem { start, count })
            },
            "psr" => Ok(PrintTarget::Psr),
            "nzp" | "n" => Ok(PrintTarget::Nzp),
            "reg" | "r" => Ok(PrintTarget::Reg),
            "labels" | "l" => Ok(PrintTarget::Labels),
            _ => Err(CommandErr::UnknownPrintTarget(sub)),
        }
    }
}

/// Errors from parsing or running a debugger command.
#[derive(Debug, PartialEq, Eq, Clone, thiserror::Error)]
pub enum CommandErr {
    /// A token in the command line could not be lexed.
    #[error(transparent)]
    Lex(#[from] LexErr),
    /// The command name is not known.
    #[error("unknown command `{0}`")]
    UnknownCommand(String),
    /// A required argument is missing.
    #[error("missing argument: expected {0}")]
    MissingArgument(&'static str),
    /// There were more arguments than the command takes.
    #[error("unexpected argument `{0}`")]
    UnexpectedArgument(String),
    /// An address argument could not be parsed.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
    /// A label argument is not among the loaded labels.
    #[error("unknown label `{0}`")]
    UnknownLabel(String),
    /// A count argument is not a positive integer.
    #[error("invalid count `{0}`")]
    InvalidCount(String),
    /// `print` was given a subcommand it does not have.
    #[error("unknown print target `{0}`")]
    UnknownPrintTarget(String),
    /// `eval` was given a mnemonic that does not exist.
    #[error("unknown instruction `{0}`")]
    UnknownInstruction(String),
    /// An `eval` operand has the wrong kind.
    #[error("expected {expected}, found `{found}`")]
    InvalidOperand {
        /// The kind of operand expected.
        expected: &'static str,
        /// The text that was found instead.
        found: String,
    },
    /// An `eval` immediate does not fit its field.
    #[error(transparent)]
    Offset(#[from] OffsetNewErr),
}
impl crate::err::Error for CommandErr {
    fn help(&self) -> Option<Cow<str>> {
        match self {
            CommandErr::Lex(e) => crate::err::Error::help(e),
            CommandErr::UnknownCommand(_) => Some("type `help` for the list of commands".into()),
            CommandErr::InvalidAddress(_) => Some("addresses can be decimal, 0x/x hex, 0o octal, 0b binary, or a label".into()),
            CommandErr::UnknownLabel(_) => Some("`print labels` lists the labels of the loaded object files".into()),
            CommandErr::InvalidCount(_) => Some("counts are positive integers".into()),
            CommandErr::UnknownPrintTarget(_) => Some("print one of: code, mem <addr> [count], psr, nzp, reg, labels".into()),
            CommandErr::Offset(e) => crate::err::Error::help(e),
            _ => None,
        }
    }
}
