//! Memory handling for the LC-4 simulator.
//!
//! This module consists of:
//! - [`MemArray`]: The memory.
//! - [`RegFile`]: The register file.
//! - [`Region`]: The fixed partition of the address space,
//!     along with the access predicates [`check_execute`] and [`check_write`].

use std::ops::RangeInclusive;

use crate::ast::Reg;

const N: usize = 1 << 16;

/// The fixed partition of the LC-4 address space.
///
/// | Region            | Range             |
/// |-------------------|-------------------|
/// | [`Region::UserCode`] | `x0000` - `x1FFF` |
/// | [`Region::UserData`] | `x2000` - `x7FFF` |
/// | [`Region::OsCode`]   | `x8000` - `x9FFF` |
/// | [`Region::OsData`]   | `xA000` - `xFFFF` |
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum Region {
    /// User code region.
    UserCode,
    /// User data region, readable and writable at any privilege.
    UserData,
    /// OS code region, only executable while privileged.
    OsCode,
    /// OS data region, only writable while privileged.
    OsData,
}
impl Region {
    /// Finds the region an address lies in.
    pub fn of(addr: u16) -> Self {
        match addr {
            0x0000..=0x1FFF => Region::UserCode,
            0x2000..=0x7FFF => Region::UserData,
            0x8000..=0x9FFF => Region::OsCode,
            0xA000..=0xFFFF => Region::OsData,
        }
    }

    /// The addresses contained in this region.
    pub fn range(self) -> RangeInclusive<u16> {
        match self {
            Region::UserCode => 0x0000..=0x1FFF,
            Region::UserData => 0x2000..=0x7FFF,
            Region::OsCode   => 0x8000..=0x9FFF,
            Region::OsData   => 0xA000..=0xFFFF,
        }
    }

    /// Whether this region holds code.
    pub fn is_code(self) -> bool {
        matches!(self, Region::UserCode | Region::OsCode)
    }

    /// Whether this region is reserved for the OS.
    pub fn is_os(self) -> bool {
        matches!(self, Region::OsCode | Region::OsData)
    }
}
impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Region::UserCode => "user code",
            Region::UserData => "user data",
            Region::OsCode   => "OS code",
            Region::OsData   => "OS data",
        };
        f.write_str(name)
    }
}

/// Whether an instruction at `pc` may execute at the given privilege.
///
/// Only the OS code region is gated. Data regions pass this check
/// (the simulator's strict mode handles those separately).
pub fn check_execute(pc: u16, privileged: bool) -> bool {
    privileged || Region::of(pc) != Region::OsCode
}

/// Whether `addr` may be written to at the given privilege.
///
/// User data is always writable, OS data only while privileged,
/// and code regions never.
pub fn check_write(addr: u16, privileged: bool) -> bool {
    let region = Region::of(addr);
    !region.is_code() && (privileged || !region.is_os())
}

/// The simulator's memory: 65,536 16-bit words.
///
/// This can be indexed directly by address.
/// Indexing does not perform any access checks;
/// those are done by the simulator when it executes instructions.
///
/// # Example
///
/// ```
/// use lc4_sim::sim::mem::MemArray;
///
/// let mut mem = MemArray::new();
/// mem[0x2000] = 0x1234;
/// assert_eq!(mem[0x2000], 0x1234);
/// ```
#[derive(Clone)]
pub struct MemArray(Box<[u16; N]>);
impl MemArray {
    /// Creates a new zeroed memory.
    pub fn new() -> Self {
        Self(
            vec![0; N].into_boxed_slice()
                .try_into()
                .unwrap_or_else(|_| unreachable!("vec should have had {N} elements"))
        )
    }

    /// Zeroes every word of memory.
    pub fn clear(&mut self) {
        self.0.fill(0);
    }

    /// Copies a block of words into memory starting at `start`.
    ///
    /// Addresses wrap around from `xFFFF` to `x0000`.
    pub fn copy_block(&mut self, start: u16, data: &[u16]) {
        let si = usize::from(start);
        let (left, right) = data.split_at(data.len().min(N - si));

        self.0[si..(si + left.len())].copy_from_slice(left);
        for chunk in right.chunks(N) {
            self.0[..chunk.len()].copy_from_slice(chunk);
        }
    }

    /// Gets a slice of memory, from `start` to `start + len` (wrapping past `xFFFF`).
    pub fn window(&self, start: u16, len: u16) -> impl Iterator<Item = (u16, u16)> + '_ {
        (0..len).map(move |i| {
            let addr = start.wrapping_add(i);
            (addr, self[addr])
        })
    }
}
impl Default for MemArray {
    fn default() -> Self {
        Self::new()
    }
}
impl std::fmt::Debug for MemArray {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // only show non-zero words, 64K lines is not useful
        f.debug_map()
            .entries(self.0.iter().enumerate().filter(|&(_, &w)| w != 0))
            .finish()
    }
}
impl std::ops::Index<u16> for MemArray {
    type Output = u16;

    fn index(&self, index: u16) -> &Self::Output {
        &self.0[usize::from(index)]
    }
}
impl std::ops::IndexMut<u16> for MemArray {
    fn index_mut(&mut self, index: u16) -> &mut Self::Output {
        &mut self.0[usize::from(index)]
    }
}

/// The register file.
///
/// This struct can be indexed with a [`Reg`]
/// (which can be constructed using the [`crate::ast::reg_consts`] module or via [`Reg::try_from`]).
///
/// # Example
///
/// ```
/// use lc4_sim::sim::mem::RegFile;
/// use lc4_sim::ast::reg_consts::R0;
///
/// let mut reg = RegFile::new();
/// reg[R0] = 11;
/// assert_eq!(reg[R0], 11);
/// ```
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RegFile([u16; 8]);
impl RegFile {
    /// Creates a zeroed register file.
    pub fn new() -> Self {
        Self([0; 8])
    }

    /// Iterates over the registers and their values.
    pub fn iter(&self) -> impl Iterator<Item = (Reg, u16)> + '_ {
        Reg::all().zip(self.0.iter().copied())
    }
}
impl std::ops::Index<Reg> for RegFile {
    type Output = u16;

    fn index(&self, index: Reg) -> &Self::Output {
        &self.0[usize::from(index)]
    }
}
impl std::ops::IndexMut<Reg> for RegFile {
    fn index_mut(&mut self, index: Reg) -> &mut Self::Output {
        &mut self.0[usize::from(index)]
    }
}
