//! Parsing single instructions for the `eval` command.
//!
//! The syntax follows LC-4 assembly: a mnemonic followed by comma-separated operands.
//! Immediates may be written in any of the literal forms of [`super::lex`].
//! `LEA` and `LC` take a label, which is resolved against the loaded labels
//! when the instruction runs (see [`EvalInstr::resolve`]).
//!
//! ```
//! use lc4_sim::ast::reg_consts::R1;
//! use lc4_sim::ast::sim::SimInstr;
//! use lc4_sim::ast::{ImmOrReg, Offset};
//! use lc4_sim::debugger::asm::EvalInstr;
//!
//! assert_eq!(
//!     EvalInstr::parse("ADD R1, R1, #-1").unwrap(),
//!     EvalInstr::Instr(SimInstr::ADD(R1, R1, ImmOrReg::Imm(Offset::new_trunc(-1))))
//! );
//! ```
use crate::ast::sim::SimInstr;
use crate::ast::{CondCode, IOffset, ImmOrReg, Reg, UOffset};
use crate::sim::Simulator;

use super::command::{Args, CommandErr};
use super::lex::Token;

/// An instruction given to `eval`.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum EvalInstr {
    /// A fully parsed instruction.
    Instr(SimInstr),
    /// `LEA` with its label still unresolved.
    Lea(Reg, String),
    /// `LC` with its label still unresolved.
    Lc(Reg, String),
}

impl EvalInstr {
    /// Parses one instruction.
    pub fn parse(src: &str) -> Result<Self, CommandErr> {
        let mut p = Parser { args: Args::new(src) };

        let mnemonic = match p.args.next() {
            Some((Ok(Token::Ident(id)), _)) => id,
            Some((_, src)) => return Err(CommandErr::UnknownInstruction(src.to_string())),
            None => return Err(CommandErr::MissingArgument("an instruction")),
        };
        let upper = mnemonic.to_uppercase();

        let instr = match &*upper {
            "NOP" => SimInstr::NOP,
            br if br.starts_with("BR") => {
                let cc = parse_cc(&br[2..]).ok_or_else(|| CommandErr::UnknownInstruction(mnemonic.clone()))?;
                SimInstr::BR(cc, p.imm()?)
            },
            "ADD" => SimInstr::ADD(p.reg()?, p.reg()?, p.imm_or_reg()?),
            "MUL" => SimInstr::MUL(p.reg()?, p.reg()?, p.reg()?),
            "SUB" => SimInstr::SUB(p.reg()?, p.reg()?, p.reg()?),
            "DIV" => SimInstr::DIV(p.reg()?, p.reg()?, p.reg()?),
            "MOD" => SimInstr::MOD(p.reg()?, p.reg()?, p.reg()?),
            "CMP" => SimInstr::CMP(p.reg()?, p.reg()?),
            "CMPU" => SimInstr::CMPU(p.reg()?, p.reg()?),
            "CMPI" => SimInstr::CMPI(p.reg()?, p.imm()?),
            "CMPIU" => SimInstr::CMPIU(p.reg()?, p.uimm()?),
            "JSR" => SimInstr::JSR(ImmOrReg::Imm(p.imm()?)),
            "JSRR" => SimInstr::JSR(ImmOrReg::Reg(p.reg()?)),
            "AND" => SimInstr::AND(p.reg()?, p.reg()?, p.imm_or_reg()?),
            "NOT" => SimInstr::NOT(p.reg()?, p.reg()?),
            "OR" => SimInstr::OR(p.reg()?, p.reg()?, p.reg()?),
            "XOR" => SimInstr::XOR(p.reg()?, p.reg()?, p.reg()?),
            "LDR" => SimInstr::LDR(p.reg()?, p.reg()?, p.imm()?),
            "STR" => SimInstr::STR(p.reg()?, p.reg()?, p.imm()?),
            "RTI" => SimInstr::RTI,
            "CONST" => SimInstr::CONST(p.reg()?, p.imm()?),
            "HICONST" => SimInstr::HICONST(p.reg()?, p.uimm()?),
            "SLL" => SimInstr::SLL(p.reg()?, p.reg()?, p.uimm()?),
            "SRA" => SimInstr::SRA(p.reg()?, p.reg()?, p.uimm()?),
            "SRL" => SimInstr::SRL(p.reg()?, p.reg()?, p.uimm()?),
            "JMP" => SimInstr::JMP(ImmOrReg::Imm(p.imm()?)),
            "JMPR" => SimInstr::JMP(ImmOrReg::Reg(p.reg()?)),
            "RET" => SimInstr::RET,
            "TRAP" => SimInstr::TRAP(p.uimm()?),
            "LEA" => {
                let eval = EvalInstr::Lea(p.reg()?, p.label()?);
                p.args.finish()?;
                return Ok(eval);
            },
            "LC" => {
                let eval = EvalInstr::Lc(p.reg()?, p.label()?);
                p.args.finish()?;
                return Ok(eval);
            },
            _ => return Err(CommandErr::UnknownInstruction(mnemonic)),
        };

        p.args.finish()?;
        Ok(EvalInstr::Instr(instr))
    }

    /// Resolves the instruction against the simulator's labels and memory.
    ///
    /// `LC` reads its value from memory at this point.
    pub fn resolve(&self, sim: &Simulator) -> Result<SimInstr, CommandErr> {
        let unknown = |label: &String| CommandErr::UnknownLabel(label.clone());

        match self {
            EvalInstr::Instr(instr) => Ok(*instr),
            EvalInstr::Lea(dr, label) => SimInstr::lea(*dr, label, &sim.labels).ok_or_else(|| unknown(label)),
            EvalInstr::Lc(dr, label) => SimInstr::lc(*dr, label, &sim.labels, |addr| sim.mem[addr]).ok_or_else(|| unknown(label)),
        }
    }
}

/// Parses the `n`, `z`, `p` suffix of a `BR` mnemonic.
///
/// An empty suffix is `BRnzp`.
fn parse_cc(suffix: &str) -> Option<CondCode> {
    if suffix.is_empty() {
        return Some(0b111);
    }

    let mut cc: CondCode = 0;
    let mut rest = suffix;
    for (flag, bit) in [('N', 0b100), ('Z', 0b010), ('P', 0b001)] {
        if let Some(r) = rest.strip_prefix(flag) {
            cc |= bit;
            rest = r;
        }
    }
    rest.is_empty().then_some(cc)
}

struct Parser<'a> {
    args: Args<'a>,
}
impl Parser<'_> {
    fn operand(&mut self, expected: &'static str) -> Result<(Token, String), CommandErr> {
        match self.args.next() {
            Some((Ok(tok), src)) => Ok((tok, src.to_string())),
            Some((Err(e), _)) => Err(e.into()),
            None => Err(CommandErr::MissingArgument(expected)),
        }
    }

    fn reg(&mut self) -> Result<Reg, CommandErr> {
        match self.operand("a register")? {
            (Token::Reg(r), _) => Ok(Reg(r)),
            (_, found) => Err(CommandErr::InvalidOperand { expected: "a register", found }),
        }
    }

    fn imm<const N: u32>(&mut self) -> Result<IOffset<N>, CommandErr> {
        let value = match self.operand("an immediate")? {
            (Token::Signed(n), _) => n,
            (Token::Unsigned(n), found) => i16::try_from(n)
                .map_err(|_| CommandErr::InvalidOperand { expected: "a signed immediate", found })?,
            (_, found) => return Err(CommandErr::InvalidOperand { expected: "an immediate", found }),
        };
        Ok(IOffset::new(value)?)
    }

    fn uimm<const N: u32>(&mut self) -> Result<UOffset<N>, CommandErr> {
        match self.operand("an unsigned immediate")? {
            (Token::Unsigned(n), _) => Ok(UOffset::new(n)?),
            (_, found) => Err(CommandErr::InvalidOperand { expected: "an unsigned immediate", found }),
        }
    }

    fn imm_or_reg<const N: u32>(&mut self) -> Result<ImmOrReg<N>, CommandErr> {
        let value = match self.operand("a register or immediate")? {
            (Token::Reg(r), _) => return Ok(ImmOrReg::Reg(Reg(r))),
            (Token::Signed(n), _) => n,
            (Token::Unsigned(n), found) => i16::try_from(n)
                .map_err(|_| CommandErr::InvalidOperand { expected: "a signed immediate", found })?,
            (_, found) => return Err(CommandErr::InvalidOperand { expected: "a register or immediate", found }),
        };
        Ok(ImmOrReg::Imm(IOffset::new(value)?))
    }

    fn label(&mut self) -> Result<String, CommandErr> {
        match self.operand("a label")? {
            (Token::Ident(label), _) => Ok(label),
            (_, found) => Err(CommandErr::InvalidOperand { expected: "a label", found }),
        }
    }
}
