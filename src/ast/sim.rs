//! This module holds the [`SimInstr`] type, which is how the simulator sees one instruction.
//!
//! A `SimInstr` is produced from a memory word with [`SimInstr::decode`]
//! and turned back into memory words with [`SimInstr::encode`] or [`SimInstr::to_words`].
//!
//! Decoding never fails. Bit patterns which do not name an LC-4 instruction
//! decode to [`SimInstr::Unknown`], which the simulator deals with at execution time.
use std::collections::BTreeMap;
use std::fmt::Write as _;

use super::codec::{bit, field};
use super::reg_consts::R7;
use super::{CondCode, IOffset, ImmOrReg, Reg, TrapVect8, UOffset};

/// An instruction as the simulator executes it.
///
/// The variants are named after the LC-4 mnemonics.
/// Some mnemonics share a variant when they only differ in operand kind:
/// - `ADD`/`ADDI` are [`SimInstr::ADD`] and `AND`/`ANDI` are [`SimInstr::AND`]
/// - `JSR`/`JSRR` are [`SimInstr::JSR`] and `JMP`/`JMPR` are [`SimInstr::JMP`]
///
/// `LEA` and `LC` are never produced by [`SimInstr::decode`].
/// They carry an already-resolved value and are built from a label table
/// with [`SimInstr::lea`] and [`SimInstr::lc`].
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum SimInstr {
    /// `NOP`
    NOP,
    /// `BR<cc> imm9`
    BR(CondCode, IOffset<9>),
    /// `ADD Rd, Rs, Rt` / `ADD Rd, Rs, imm5`
    ADD(Reg, Reg, ImmOrReg<5>),
    /// `MUL Rd, Rs, Rt`
    MUL(Reg, Reg, Reg),
    /// `SUB Rd, Rs, Rt`
    SUB(Reg, Reg, Reg),
    /// `DIV Rd, Rs, Rt`
    DIV(Reg, Reg, Reg),
    /// `CMP Rs, Rt`
    CMP(Reg, Reg),
    /// `CMPU Rs, Rt`
    CMPU(Reg, Reg),
    /// `CMPI Rs, imm7`
    CMPI(Reg, IOffset<7>),
    /// `CMPIU Rs, uimm7`
    CMPIU(Reg, UOffset<7>),
    /// `JSR imm11` / `JSRR Rs`
    JSR(ImmOrReg<11>),
    /// `AND Rd, Rs, Rt` / `AND Rd, Rs, imm5`
    AND(Reg, Reg, ImmOrReg<5>),
    /// `NOT Rd, Rs`
    NOT(Reg, Reg),
    /// `OR Rd, Rs, Rt`
    OR(Reg, Reg, Reg),
    /// `XOR Rd, Rs, Rt`
    XOR(Reg, Reg, Reg),
    /// `LDR Rd, Rs, imm6`
    LDR(Reg, Reg, IOffset<6>),
    /// `STR Rt, Rs, imm6`
    STR(Reg, Reg, IOffset<6>),
    /// `RTI`
    RTI,
    /// `CONST Rd, imm9`
    CONST(Reg, IOffset<9>),
    /// `SLL Rd, Rs, uimm4`
    SLL(Reg, Reg, UOffset<4>),
    /// `SRA Rd, Rs, uimm4`
    SRA(Reg, Reg, UOffset<4>),
    /// `SRL Rd, Rs, uimm4`
    SRL(Reg, Reg, UOffset<4>),
    /// `MOD Rd, Rs, Rt`
    MOD(Reg, Reg, Reg),
    /// `JMP imm11` / `JMPR Rs`
    JMP(ImmOrReg<11>),
    /// `RET` (`JMPR R7`)
    RET,
    /// `HICONST Rd, uimm8`
    HICONST(Reg, UOffset<8>),
    /// `TRAP uimm8`
    TRAP(TrapVect8),
    /// `LEA Rd, <label>`, holding the label's address.
    LEA(Reg, u16),
    /// `LC Rd, <label>`, holding the value stored at the label's address.
    LC(Reg, u16),
    /// A word which is not a valid instruction.
    Unknown(u16),
}

impl SimInstr {
    /// Decodes a memory word into an instruction.
    ///
    /// The top 4 bits select the opcode group.
    /// Groups with several operations pick the operation from secondary bit fields.
    ///
    /// ```
    /// # use lc4_sim::ast::sim::SimInstr;
    /// # use lc4_sim::ast::reg_consts::R1;
    /// # use lc4_sim::ast::{ImmOrReg, Offset};
    /// assert_eq!(
    ///     SimInstr::decode(0x127F),
    ///     SimInstr::ADD(R1, R1, ImmOrReg::Imm(Offset::new_trunc(-1)))
    /// );
    /// assert_eq!(SimInstr::decode(0x3000), SimInstr::Unknown(0x3000));
    /// ```
    pub fn decode(word: u16) -> Self {
        let rd = Reg::from_field(field(word, 9, 3));
        let rs = Reg::from_field(field(word, 6, 3));
        let rt = Reg::from_field(field(word, 0, 3));
        let signed = word as i16;

        match field(word, 12, 4) {
            0b0000 => match field(word, 9, 3) as CondCode {
                0  => Self::NOP,
                cc => Self::BR(cc, IOffset::new_trunc(signed)),
            },
            0b0001 if bit(word, 5) => Self::ADD(rd, rs, ImmOrReg::Imm(IOffset::new_trunc(signed))),
            // bit 5 is clear, so only bits 4..3 select
            0b0001 => match field(word, 3, 2) {
                0b00 => Self::ADD(rd, rs, ImmOrReg::Reg(rt)),
                0b01 => Self::MUL(rd, rs, rt),
                0b10 => Self::SUB(rd, rs, rt),
                _    => Self::DIV(rd, rs, rt),
            },
            0b0010 => match field(word, 7, 2) {
                0b00 => Self::CMP(rd, rt),
                0b01 => Self::CMPU(rd, rt),
                0b10 => Self::CMPI(rd, IOffset::new_trunc(signed)),
                _    => Self::CMPIU(rd, UOffset::new_trunc(word)),
            },
            0b0100 if bit(word, 11) => Self::JSR(ImmOrReg::Imm(IOffset::new_trunc(signed))),
            0b0100 => Self::JSR(ImmOrReg::Reg(rs)),
            0b0101 if bit(word, 5) => Self::AND(rd, rs, ImmOrReg::Imm(IOffset::new_trunc(signed))),
            0b0101 => match field(word, 3, 2) {
                0b00 => Self::AND(rd, rs, ImmOrReg::Reg(rt)),
                0b01 => Self::NOT(rd, rs),
                0b10 => Self::OR(rd, rs, rt),
                _    => Self::XOR(rd, rs, rt),
            },
            0b0110 => Self::LDR(rd, rs, IOffset::new_trunc(signed)),
            0b0111 => Self::STR(rd, rs, IOffset::new_trunc(signed)),
            0b1000 => Self::RTI,
            0b1001 => Self::CONST(rd, IOffset::new_trunc(signed)),
            0b1010 => match field(word, 4, 2) {
                0b00 => Self::SLL(rd, rs, UOffset::new_trunc(word)),
                0b01 => Self::SRA(rd, rs, UOffset::new_trunc(word)),
                0b10 => Self::SRL(rd, rs, UOffset::new_trunc(word)),
                _    => Self::MOD(rd, rs, rt),
            },
            0b1100 if bit(word, 11) => Self::JMP(ImmOrReg::Imm(IOffset::new_trunc(signed))),
            0b1100 if rs == R7 => Self::RET,
            0b1100 => Self::JMP(ImmOrReg::Reg(rs)),
            0b1101 if bit(word, 8) => Self::HICONST(rd, UOffset::new_trunc(word)),
            0b1111 => Self::TRAP(TrapVect8::new_trunc(word)),
            _ => Self::Unknown(word),
        }
    }

    /// Encodes this instruction into a single memory word.
    ///
    /// This returns `None` for `LEA` and `LC`, which take two words
    /// (see [`SimInstr::expand`] and [`SimInstr::to_words`]).
    ///
    /// Don't-care bits are written as 0.
    pub fn encode(&self) -> Option<u16> {
        fn op(opcode: u16) -> u16 { opcode << 12 }
        fn rd(r: Reg) -> u16 { u16::from(r) << 9 }
        fn rs(r: Reg) -> u16 { u16::from(r) << 6 }
        fn rt(r: Reg) -> u16 { u16::from(r) }
        fn sub(sel: u16) -> u16 { sel << 3 }

        let word = match *self {
            Self::NOP => 0x0000,
            Self::BR(cc, off) => op(0b0000) | (u16::from(cc & 0b111) << 9) | off.field(),
            Self::ADD(d, s, ImmOrReg::Imm(i)) => op(0b0001) | rd(d) | rs(s) | (1 << 5) | i.field(),
            Self::ADD(d, s, ImmOrReg::Reg(t)) => op(0b0001) | rd(d) | rs(s) | sub(0b000) | rt(t),
            Self::MUL(d, s, t) => op(0b0001) | rd(d) | rs(s) | sub(0b001) | rt(t),
            Self::SUB(d, s, t) => op(0b0001) | rd(d) | rs(s) | sub(0b010) | rt(t),
            Self::DIV(d, s, t) => op(0b0001) | rd(d) | rs(s) | sub(0b011) | rt(t),
            Self::CMP(s, t)   => op(0b0010) | rd(s) | (0b00 << 7) | rt(t),
            Self::CMPU(s, t)  => op(0b0010) | rd(s) | (0b01 << 7) | rt(t),
            Self::CMPI(s, i)  => op(0b0010) | rd(s) | (0b10 << 7) | i.field(),
            Self::CMPIU(s, u) => op(0b0010) | rd(s) | (0b11 << 7) | u.field(),
            Self::JSR(ImmOrReg::Imm(i)) => op(0b0100) | (1 << 11) | i.field(),
            Self::JSR(ImmOrReg::Reg(s)) => op(0b0100) | rs(s),
            Self::AND(d, s, ImmOrReg::Imm(i)) => op(0b0101) | rd(d) | rs(s) | (1 << 5) | i.field(),
            Self::AND(d, s, ImmOrReg::Reg(t)) => op(0b0101) | rd(d) | rs(s) | sub(0b000) | rt(t),
            Self::NOT(d, s)    => op(0b0101) | rd(d) | rs(s) | sub(0b001),
            Self::OR(d, s, t)  => op(0b0101) | rd(d) | rs(s) | sub(0b010) | rt(t),
            Self::XOR(d, s, t) => op(0b0101) | rd(d) | rs(s) | sub(0b011) | rt(t),
            Self::LDR(d, s, i) => op(0b0110) | rd(d) | rs(s) | i.field(),
            Self::STR(t, s, i) => op(0b0111) | rd(t) | rs(s) | i.field(),
            Self::RTI => op(0b1000),
            Self::CONST(d, i) => op(0b1001) | rd(d) | i.field(),
            Self::SLL(d, s, u) => op(0b1010) | rd(d) | rs(s) | (0b00 << 4) | u.field(),
            Self::SRA(d, s, u) => op(0b1010) | rd(d) | rs(s) | (0b01 << 4) | u.field(),
            Self::SRL(d, s, u) => op(0b1010) | rd(d) | rs(s) | (0b10 << 4) | u.field(),
            Self::MOD(d, s, t) => op(0b1010) | rd(d) | rs(s) | (0b11 << 4) | rt(t),
            Self::JMP(ImmOrReg::Imm(i)) => op(0b1100) | (1 << 11) | i.field(),
            Self::JMP(ImmOrReg::Reg(s)) => op(0b1100) | rs(s),
            Self::RET => op(0b1100) | rs(R7),
            Self::HICONST(d, u) => op(0b1101) | rd(d) | (1 << 8) | u.field(),
            Self::TRAP(v) => op(0b1111) | v.field(),
            Self::LEA(..) | Self::LC(..) => return None,
            Self::Unknown(word) => word,
        };

        Some(word)
    }

    /// Expands pseudo-instructions into the real instructions that implement them.
    ///
    /// `LEA` and `LC` load a full 16-bit value, so they become
    /// `CONST Rd, <low byte>` followed by `HICONST Rd, <high byte>`.
    /// Every other instruction expands to itself.
    pub fn expand(&self) -> Vec<SimInstr> {
        match *self {
            Self::LEA(dr, value) | Self::LC(dr, value) => vec![
                Self::CONST(dr, IOffset::new_trunc((value & 0xFF) as i16)),
                Self::HICONST(dr, UOffset::new_trunc(value >> 8)),
            ],
            instr => vec![instr],
        }
    }

    /// Converts this instruction into the memory words that implement it.
    pub fn to_words(&self) -> Vec<u16> {
        self.expand()
            .iter()
            .filter_map(SimInstr::encode)
            .collect()
    }

    /// Creates a `LEA Rd, <label>` instruction, resolving `label` against `labels`.
    ///
    /// Returns `None` if the label is not defined.
    pub fn lea(dr: Reg, label: &str, labels: &BTreeMap<String, u16>) -> Option<Self> {
        labels.get(label).map(|&addr| Self::LEA(dr, addr))
    }

    /// Creates a `LC Rd, <label>` instruction, resolving `label` against `labels`
    /// and reading the constant stored at the label's address with `read`.
    ///
    /// Returns `None` if the label is not defined.
    pub fn lc(dr: Reg, label: &str, labels: &BTreeMap<String, u16>, read: impl FnOnce(u16) -> u16) -> Option<Self> {
        labels.get(label).map(|&addr| Self::LC(dr, read(addr)))
    }

    /// Whether this instruction writes to the condition codes.
    pub fn sets_cc(&self) -> bool {
        !matches!(self,
            Self::NOP | Self::BR(..) | Self::STR(..) | Self::RTI
            | Self::JMP(_) | Self::RET | Self::Unknown(_)
        )
    }
}

impl std::fmt::Display for SimInstr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NOP => f.write_str("NOP"),
            Self::BR(cc, off) => {
                f.write_str("BR")?;
                if cc & 0b100 != 0 { f.write_char('n')?; }
                if cc & 0b010 != 0 { f.write_char('z')?; }
                if cc & 0b001 != 0 { f.write_char('p')?; }
                write!(f, " {off}")
            },
            Self::ADD(dr, sr, ImmOrReg::Imm(i)) => write!(f, "ADD {dr}, {sr}, {i}"),
            Self::ADD(dr, sr1, ImmOrReg::Reg(sr2)) => write!(f, "ADD {dr}, {sr1}, {sr2}"),
            Self::MUL(dr, sr1, sr2) => write!(f, "MUL {dr}, {sr1}, {sr2}"),
            Self::SUB(dr, sr1, sr2) => write!(f, "SUB {dr}, {sr1}, {sr2}"),
            Self::DIV(dr, sr1, sr2) => write!(f, "DIV {dr}, {sr1}, {sr2}"),
            Self::CMP(sr1, sr2)  => write!(f, "CMP {sr1}, {sr2}"),
            Self::CMPU(sr1, sr2) => write!(f, "CMPU {sr1}, {sr2}"),
            Self::CMPI(sr, i)    => write!(f, "CMPI {sr}, {i}"),
            Self::CMPIU(sr, u)   => write!(f, "CMPIU {sr}, {u}"),
            Self::JSR(ImmOrReg::Imm(i)) => write!(f, "JSR {i}"),
            Self::JSR(ImmOrReg::Reg(br)) => write!(f, "JSRR {br}"),
            Self::AND(dr, sr, ImmOrReg::Imm(i)) => write!(f, "AND {dr}, {sr}, {i}"),
            Self::AND(dr, sr1, ImmOrReg::Reg(sr2)) => write!(f, "AND {dr}, {sr1}, {sr2}"),
            Self::NOT(dr, sr) => write!(f, "NOT {dr}, {sr}"),
            Self::OR(dr, sr1, sr2)  => write!(f, "OR {dr}, {sr1}, {sr2}"),
            Self::XOR(dr, sr1, sr2) => write!(f, "XOR {dr}, {sr1}, {sr2}"),
            Self::LDR(dr, br, off) => write!(f, "LDR {dr}, {br}, {off}"),
            Self::STR(sr, br, off) => write!(f, "STR {sr}, {br}, {off}"),
            Self::RTI => f.write_str("RTI"),
            Self::CONST(dr, i) => write!(f, "CONST {dr}, {i}"),
            Self::SLL(dr, sr, u) => write!(f, "SLL {dr}, {sr}, {u}"),
            Self::SRA(dr, sr, u) => write!(f, "SRA {dr}, {sr}, {u}"),
            Self::SRL(dr, sr, u) => write!(f, "SRL {dr}, {sr}, {u}"),
            Self::MOD(dr, sr1, sr2) => write!(f, "MOD {dr}, {sr1}, {sr2}"),
            Self::JMP(ImmOrReg::Imm(i)) => write!(f, "JMP {i}"),
            Self::JMP(ImmOrReg::Reg(br)) => write!(f, "JMPR {br}"),
            Self::RET => f.write_str("RET"),
            Self::HICONST(dr, u) => write!(f, "HICONST {dr}, {u:02X}"),
            Self::TRAP(vect) => write!(f, "TRAP {vect:02X}"),
            Self::LEA(dr, addr) => write!(f, "LEA {dr}, x{addr:04X}"),
            Self::LC(dr, value) => write!(f, "LC {dr}, x{value:04X}"),
            Self::Unknown(word) => write!(f, ".FILL x{word:04X}"),
        }
    }
}
