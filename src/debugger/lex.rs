//! Tokenizing debugger command lines.
//!
//! This module holds the tokens that make up the arguments of a debugger command
//! and the operands of an `eval` instruction ([`Token`]).
//!
//! Numeric literals accept every form the shell documents:
//! - decimal (`123`, `#123`, `-5`, `#-5`)
//! - prefixed literals (`0x2000`, `0o17`, `0b101`, and leading-`0` octal like `017`)
//! - LC-style hex (`x2000`, `x-1F`)

use std::num::IntErrorKind;

use logos::{Lexer, Logos};

/// A unit of information in a debugger command line.
#[derive(Debug, Logos, PartialEq, Eq, Clone)]
#[logos(skip r"[ \t\r\n]+", error = LexErr)]
pub enum Token {
    // These regexes span over tokens that may be invalid (e.g., `23trst`).
    // The callbacks validate the whole unit.

    /// An unsigned numeric value (e.g., `9`, `#14`, `0x7F`, `x7F`)
    #[regex(r"\d\w*", lex_unsigned_lit)]
    #[regex(r"#\d?\w*", lex_unsigned_dec)]
    #[regex(r"[Xx][\dA-Fa-f]\w*", lex_unsigned_hex)]
    Unsigned(u16),

    /// A signed numeric value (e.g., `-9`, `#-14`, `x-7F`, `-0x7F`)
    #[regex(r"-\w*", lex_signed_lit)]
    #[regex(r"#-\w*", lex_signed_dec)]
    #[regex(r"[Xx]-\w*", lex_signed_hex)]
    Signed(i16),

    /// A register (i.e., `R0`-`R7`)
    #[regex(r"[Rr]\d+", lex_reg)]
    Reg(u8),

    /// An identifier: a command, a subcommand, a mnemonic, or a label.
    #[regex(r"[A-Za-z_][\w.]*", |lx| lx.slice().to_string())]
    Ident(String),

    /// A comma, which delineate operands of an instruction
    #[token(",")]
    Comma,

    /// A comment, which starts with a semicolon and spans the remaining part of the line.
    #[regex(r";.*")]
    Comment,
}

/// Any errors raised in attempting to tokenize a command line.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default, thiserror::Error)]
pub enum LexErr {
    /// Numeric literal cannot fit within the range of a u16
    #[error("numeric token does not fit 16-bit unsigned integer")]
    DoesNotFitU16,
    /// Negative numeric literal cannot fit within the range of a i16
    #[error("numeric token does not fit 16-bit signed integer")]
    DoesNotFitI16,
    /// Hex literal has invalid hex digits
    #[error("invalid hex literal")]
    InvalidHex,
    /// Numeric literal has digits which are invalid for its base
    #[error("invalid numeric literal")]
    InvalidNumeric,
    /// Hex literal (starting with x) doesn't have digits after it.
    #[error("invalid hex literal")]
    InvalidHexEmpty,
    /// Numeric literal has no digits in it (it's just `#`, `-`, or a bare prefix)
    #[error("invalid numeric literal")]
    InvalidDecEmpty,
    /// Int parsing failed but the reason why is unknown
    #[error("could not parse integer")]
    UnknownIntErr,
    /// Token had the format R\d, but \d isn't 0-7.
    #[error("invalid register")]
    InvalidReg,
    /// A symbol was used which is not allowed in a command line
    #[default]
    #[error("unrecognized symbol")]
    InvalidSymbol
}
impl crate::err::Error for LexErr {
    fn help(&self) -> Option<std::borrow::Cow<str>> {
        match self {
            LexErr::DoesNotFitU16   => Some(format!("the range for a 16-bit unsigned integer is [{}, {}]", u16::MIN, u16::MAX).into()),
            LexErr::DoesNotFitI16   => Some(format!("the range for a 16-bit signed integer is [{}, {}]", i16::MIN, i16::MAX).into()),
            LexErr::InvalidHex      => Some("a hex literal starts with 'x' or '0x' and consists of 0-9, A-F".into()),
            LexErr::InvalidNumeric  => Some("use 0x for hex, 0o or a leading 0 for octal, 0b for binary".into()),
            LexErr::InvalidHexEmpty => Some("there should be hex digits (0-9, A-F) here".into()),
            LexErr::InvalidDecEmpty => Some("there should be digits here".into()),
            LexErr::UnknownIntErr   => None,
            LexErr::InvalidReg      => Some("this must be R0-R7".into()),
            LexErr::InvalidSymbol   => Some("this char does not occur in any debugger command".into()),
        }
    }
}

/// Helper that converts an int error kind to its corresponding LexErr, based on the provided inputs.
fn convert_int_error(
    e: &IntErrorKind,
    invalid_digits_err: LexErr,
    empty_err: LexErr,
    overflow_err: LexErr,
    src: &str
) -> LexErr {
    match e {
        IntErrorKind::Empty        => empty_err,
        IntErrorKind::InvalidDigit if src == "-" => empty_err,
        IntErrorKind::InvalidDigit => invalid_digits_err,
        IntErrorKind::PosOverflow  => overflow_err,
        IntErrorKind::NegOverflow  => overflow_err,
        _ => LexErr::UnknownIntErr,
    }
}

/// Splits a literal into its radix and digits,
/// following the prefixes Go's `strconv.ParseUint(s, 0, 16)` accepts.
fn split_radix(lit: &str) -> (u32, &str) {
    match lit.get(..2) {
        Some("0x" | "0X") => (16, &lit[2..]),
        Some("0o" | "0O") => (8, &lit[2..]),
        Some("0b" | "0B") => (2, &lit[2..]),
        _ if lit.len() > 1 && lit.starts_with('0') => (8, &lit[1..]),
        _ => (10, lit),
    }
}
fn parse_radix_lit(lit: &str, overflow_err: LexErr) -> Result<u32, LexErr> {
    let (radix, digits) = split_radix(lit);
    // `_` separators are only allowed with a base prefix
    let digits = match radix {
        10 => digits.to_string(),
        _  => digits.replace('_', ""),
    };

    u32::from_str_radix(&digits, radix)
        .map_err(|e| convert_int_error(e.kind(), LexErr::InvalidNumeric, LexErr::InvalidDecEmpty, overflow_err, &digits))
}
fn lex_unsigned_lit(lx: &Lexer<'_, Token>) -> Result<u16, LexErr> {
    let value = parse_radix_lit(lx.slice(), LexErr::DoesNotFitU16)?;
    u16::try_from(value).map_err(|_| LexErr::DoesNotFitU16)
}
fn lex_signed_lit(lx: &Lexer<'_, Token>) -> Result<i16, LexErr> {
    let Some(lit) = lx.slice().strip_prefix('-') else {
        unreachable!("Lexer slice should have started with -");
    };
    let value = parse_radix_lit(lit, LexErr::DoesNotFitI16)?;
    i16::try_from(-i64::from(value)).map_err(|_| LexErr::DoesNotFitI16)
}
fn lex_unsigned_dec(lx: &Lexer<'_, Token>) -> Result<u16, LexErr> {
    let string = lx.slice().strip_prefix('#').unwrap_or(lx.slice());

    string.parse::<u16>()
        .map_err(|e| convert_int_error(e.kind(), LexErr::InvalidNumeric, LexErr::InvalidDecEmpty, LexErr::DoesNotFitU16, string))
}
fn lex_signed_dec(lx: &Lexer<'_, Token>) -> Result<i16, LexErr> {
    let string = lx.slice().strip_prefix('#').unwrap_or(lx.slice());

    string.parse::<i16>()
        .map_err(|e| convert_int_error(e.kind(), LexErr::InvalidNumeric, LexErr::InvalidDecEmpty, LexErr::DoesNotFitI16, string))
}
fn lex_unsigned_hex(lx: &Lexer<'_, Token>) -> Result<u16, LexErr> {
    let Some(hex) = lx.slice().strip_prefix(['X', 'x']) else {
        unreachable!("Lexer slice should have contained an X or x");
    };

    u16::from_str_radix(hex, 16)
        .map_err(|e| convert_int_error(e.kind(), LexErr::InvalidHex, LexErr::InvalidHexEmpty, LexErr::DoesNotFitU16, hex))
}
fn lex_signed_hex(lx: &Lexer<'_, Token>) -> Result<i16, LexErr> {
    let Some(hex) = lx.slice().strip_prefix(['X', 'x']) else {
        unreachable!("Lexer slice should have contained an X or x");
    };

    i16::from_str_radix(hex, 16)
        .map_err(|e| convert_int_error(e.kind(), LexErr::InvalidHex, LexErr::InvalidHexEmpty, LexErr::DoesNotFitI16, hex))
}
fn lex_reg(lx: &Lexer<'_, Token>) -> Result<u8, LexErr> {
    lx.slice()[1..].parse::<u8>().ok()
        .filter(|&r| r < 8)
        .ok_or(LexErr::InvalidReg)
}
