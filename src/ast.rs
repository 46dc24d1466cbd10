//! Components used to represent LC-4 instructions.
//!
//! These components together are used to construct [`sim::SimInstr`]
//! (a data structure holding a decoded bytecode instruction).
//!
//! The [`codec`] module holds the bit-level helpers (field extraction and sign extension)
//! that decoding and encoding are built upon.

pub mod codec;
pub mod sim;

use std::fmt::Write as _;
use std::num::TryFromIntError;
use offset_base::OffsetBacking;

/// A register. Must be between 0 and 7.
///
/// This `Reg` struct can either be constructed by selecting a register from [`reg_consts`],
/// or by using [`Reg::try_from`].
///
/// ## Examples
///
/// ```text
/// ADD R0, R0, R1
///     ~~  ~~  ~~
/// LDR R2, R6, #-1
///     ~~  ~~
/// JSRR R5
///      ~~
/// ```
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, PartialOrd, Ord)]
pub struct Reg(pub(crate) u8);

/// Register constants!
pub mod reg_consts {
    use super::Reg;

    /// The 0th register in the register file.
    pub const R0: Reg = Reg(0);
    /// The 1st register in the register file.
    pub const R1: Reg = Reg(1);
    /// The 2nd register in the register file.
    pub const R2: Reg = Reg(2);
    /// The 3rd register in the register file.
    pub const R3: Reg = Reg(3);
    /// The 4th register in the register file.
    pub const R4: Reg = Reg(4);
    /// The 5th register in the register file.
    pub const R5: Reg = Reg(5);
    /// The 6th register in the register file.
    pub const R6: Reg = Reg(6);
    /// The 7th register in the register file.
    ///
    /// This is the link register: `JSR`, `JSRR`, and `TRAP` store their return address here.
    pub const R7: Reg = Reg(7);
}
impl Reg {
    /// Gets the register number of this [`Reg`]. This is always between 0 and 7.
    ///
    /// ```
    /// use lc4_sim::ast::reg_consts::R6;
    /// assert_eq!(R6.reg_no(), 6);
    /// assert_eq!(R6.to_string(), "R6");
    /// ```
    pub fn reg_no(self) -> u8 {
        self.0
    }

    /// Creates a register out of a 3-bit register field.
    ///
    /// Any bits past the third are discarded.
    pub(crate) fn from_field(field: u16) -> Self {
        Reg((field & 0b111) as u8)
    }

    /// Iterates over all 8 registers in order.
    pub fn all() -> impl Iterator<Item = Reg> {
        (0..8).map(Reg)
    }
}
impl std::fmt::Display for Reg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // padding should have no effect here
        write!(f, "R{}", self.reg_no())
    }
}
impl From<Reg> for usize {
    // Used for indexing the reg file in [`crate::sim::mem::RegFile`].
    fn from(value: Reg) -> Self {
        usize::from(value.reg_no())
    }
}
impl From<Reg> for u16 {
    fn from(value: Reg) -> Self {
        u16::from(value.0)
    }
}
impl TryFrom<u8> for Reg {
    type Error = TryFromIntError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0..=7 => Ok(Reg(value)),
            // HACKy, but there's no other way to create this error
            _     => u8::try_from(256).map(|_| unreachable!("should've been TryFromIntError")),
        }
    }
}

/// A condition code (used for `BR`), must be between 0 and 7.
///
/// The condition codes are listed below:
///
/// | instruction   | code (bin) |
/// |---------------|------------|
/// | `NOP`         | `000`      |
/// | `BRp`         | `001`      |
/// | `BRz`         | `010`      |
/// | `BRzp`        | `011`      |
/// | `BRn`         | `100`      |
/// | `BRnp`        | `101`      |
/// | `BRnz`        | `110`      |
/// | `BRnzp`       | `111`      |
///
pub type CondCode = u8;

/// A value representing a signed offset or a signed immediate value.
///
/// `N` indicates the maximum bit size of this offset/immediate value.
///
/// ## Examples
///
/// `IOffset<5>` is used to represent `ADD`/`AND`'s imm5 operand:
///
/// ```text
/// AND R0, R0, #0
///             ~~
/// ADD R1, R1, #-1
///             ~~~
/// ```
///
/// They are also used for PC and register offsets:
/// ```text
/// BRnz #3
///      ~~
/// LDR R0, R1, #-4
///             ~~~
/// ```
pub type IOffset<const N: u32> = Offset<i16, N>;
/// A value representing an unsigned immediate value.
///
/// ## Examples
///
/// ```text
/// CMPIU R0, #100
///           ~~~~
/// SLL R1, R1, #4
///             ~~
/// HICONST R3, xA0
///             ~~~
/// ```
pub type UOffset<const N: u32> = Offset<u16, N>;
/// An unsigned 8-bit trap vector (used for `TRAP`).
///
/// ## Examples
///
/// ```text
/// TRAP x25
///      ~~~
/// ```
pub type TrapVect8 = Offset<u16, 8>;

/// A value representing either an immediate value or a register.
///
/// This is used to handle cases where an operand can be either
/// an immediate value or a register (e.g., in `ADD`, `AND`, or `CMP`).
///
/// ## Examples
/// ```text
/// AND R0, R0, #0
/// AND R1, R1, R1
/// ADD R2, R2, #2
/// ADD R3, R3, R3
///             ^^
/// ```
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum ImmOrReg<const N: u32> {
    #[allow(missing_docs)]
    Imm(IOffset<N>),
    #[allow(missing_docs)]
    Reg(Reg)
}
impl<const N: u32> std::fmt::Display for ImmOrReg<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImmOrReg::Imm(imm) => imm.fmt(f),
            ImmOrReg::Reg(reg) => reg.fmt(f),
        }
    }
}

/// A value representing an offset or an immediate value.
///
/// The `OFF` type represents the backing type of this offset.
/// The signedness of this offset type is dependent on the signedness of the `OFF` type:
/// - `Offset<i16, _>`: signed offset (also aliased as [`IOffset`])
/// - `Offset<u16, _>`: unsigned offset (also aliased as [`UOffset`])
///
/// `N` indicates the maximum bit size of this offset/immediate value.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub struct Offset<OFF, const N: u32>(OFF);

impl<OFF: std::fmt::Display, const N: u32> std::fmt::Display for Offset<OFF, N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_char('#')?;
        self.0.fmt(f)
    }
}
impl<OFF: std::fmt::UpperHex, const N: u32> std::fmt::UpperHex for Offset<OFF, N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_char('x')?;
        self.0.fmt(f)
    }
}

/// The errors that can result from calling [`Offset::new`].
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, thiserror::Error)]
pub enum OffsetNewErr {
    /// The provided offset cannot fit an unsigned integer of the given bitsize.
    #[error("value is too big for unsigned {0}-bit integer")]
    CannotFitUnsigned(u32),
    /// The provided offset cannot fit a signed integer of the given bitsize.
    #[error("value is too big for signed {0}-bit integer")]
    CannotFitSigned(u32)
}
impl crate::err::Error for OffsetNewErr {
    fn help(&self) -> Option<std::borrow::Cow<str>> {
        use std::borrow::Cow;

        let error = match self {
            OffsetNewErr::CannotFitUnsigned(n) => Cow::from(format!("the range for an unsigned {n}-bit integer is [0, {}]", (1 << n) - 1)),
            OffsetNewErr::CannotFitSigned(n) => Cow::from(format!("the range for a signed {n}-bit integer is [{}, {}]", (-1) << (n - 1), (1 << (n - 1)) - 1)),
        };

        Some(error)
    }
}

mod offset_base {
    use super::codec;
    use super::OffsetNewErr;

    /// Any type that could store a value for [`Offset`].
    ///
    /// [`Offset`]: super::Offset
    pub trait OffsetBacking: Copy + Eq {
        /// How many bits are contained within this backing.
        ///
        /// For example, `u16` has 16 bits and thus BITS == 16.
        const BITS: u32;

        /// Truncates the given value to the provided `bit_size`,
        /// then extends it back out to the width of the backing.
        ///
        /// This bit size is always known to be at most BITS.
        fn truncate(self, bit_size: u32) -> Self;

        /// The error to raise if a given value doesn't match
        /// its provided value when truncated to a given `bit_size`.
        fn does_not_fit_error(bit_size: u32) -> OffsetNewErr;
    }

    impl OffsetBacking for u16 {
        const BITS: u32 = u16::BITS;

        fn truncate(self, bit_size: u32) -> Self {
            codec::zero_extend(self, bit_size)
        }
        fn does_not_fit_error(bit_size: u32) -> OffsetNewErr {
            OffsetNewErr::CannotFitUnsigned(bit_size)
        }
    }
    impl OffsetBacking for i16 {
        const BITS: u32 = i16::BITS;

        fn truncate(self, bit_size: u32) -> Self {
            codec::sign_extend(self as u16, bit_size) as i16
        }
        fn does_not_fit_error(bit_size: u32) -> OffsetNewErr {
            OffsetNewErr::CannotFitSigned(bit_size)
        }
    }
}

impl<OFF: OffsetBacking, const N: u32> Offset<OFF, N> {
    /// Creates a new offset value.
    /// This must fit within `N` bits of the representation, otherwise an error is raised.
    ///
    /// # Examples
    ///
    /// ```
    /// # use lc4_sim::ast::Offset;
    /// #
    /// // Signed:
    /// assert!(Offset::<i16, 5>::new(-16).is_ok());
    /// assert!(Offset::<i16, 5>::new(15).is_ok());
    /// assert!(Offset::<i16, 5>::new(16).is_err());
    ///
    /// // Unsigned:
    /// assert!(Offset::<u16, 5>::new(31).is_ok());
    /// assert!(Offset::<u16, 5>::new(32).is_err());
    /// ```
    ///
    /// # Panics
    ///
    /// This will panic if `N` is larger than the offset backing (e.g., for backing `u16`, larger than 16).
    pub fn new(n: OFF) -> Result<Self, OffsetNewErr> {
        assert!(N <= OFF::BITS, "bit size {N} exceeds size of backing ({})", OFF::BITS);
        match n == n.truncate(N) {
            true  => Ok(Offset(n)),
            false => Err(OFF::does_not_fit_error(N)),
        }
    }

    /// Creates a new offset by extending the first N bits of the integer,
    /// and discarding the rest.
    ///
    /// The extension is considered sign-extended if the offset's backing is signed,
    /// and zero-extended if the offset's backing is unsigned.
    ///
    /// # Examples
    ///
    /// ```
    /// # use lc4_sim::ast::Offset;
    /// #
    /// // Signed:
    /// assert_eq!(Offset::<i16, 5>::new_trunc(-5).get(), -5);  // 0b11011
    /// assert_eq!(Offset::<i16, 5>::new_trunc(15).get(), 15);  // 0b01111
    /// assert_eq!(Offset::<i16, 5>::new_trunc(16).get(), -16); // 0b10000
    ///
    /// // Unsigned:
    /// assert_eq!(Offset::<u16, 5>::new_trunc(16).get(), 16); // 0b10000
    /// assert_eq!(Offset::<u16, 5>::new_trunc(32).get(), 0);  // 0b00000
    /// ```
    ///
    /// # Panics
    ///
    /// This will panic if `N` is larger than the offset backing (e.g., for backing `u16`, larger than 16).
    pub fn new_trunc(n: OFF) -> Self {
        assert!(N <= OFF::BITS, "bit size {N} exceeds size of backing ({})", OFF::BITS);
        Self(n.truncate(N))
    }

    /// Gets the value of the offset.
    pub fn get(&self) -> OFF {
        self.0
    }
}
impl<const N: u32> Offset<i16, N> {
    /// The raw `N`-bit field that encodes this offset.
    pub(crate) fn field(&self) -> u16 {
        codec::zero_extend(self.0 as u16, N)
    }
}
impl<const N: u32> Offset<u16, N> {
    /// The raw `N`-bit field that encodes this offset.
    pub(crate) fn field(&self) -> u16 {
        self.0
    }
}
