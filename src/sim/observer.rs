//! Module handles change observers,
//! which store which accesses occur at a given register or memory location.
//!
//! You would typically access an observer via the [`Simulator::observer`] field.
//! The observer is cleared at the start of every step or run,
//! so it describes what the last step or run did.
//!
//! [`Simulator::observer`]: crate::sim::Simulator::observer

use std::collections::BTreeMap;

use crate::ast::Reg;

/// The set of accesses which have occurred at this location.
///
/// ## Example
///
/// ```
/// # use lc4_sim::sim::observer::AccessSet;
///
/// let accesses = AccessSet::READ;
/// assert!(accesses.accessed());
/// assert!(accesses.read());
/// assert!(!accesses.written());
/// assert!(!accesses.modified());
/// ```
#[derive(Default, Clone, Copy, PartialEq, Eq)]
pub struct AccessSet(u8);
impl AccessSet {
    /// Set with only the read flag enabled.
    pub const READ: Self = Self(1 << 0);
    /// Set with only the write flag enabled.
    pub const WRITTEN: Self = Self(1 << 1);
    /// Set with only the modify flag enabled.
    pub const MODIFIED: Self = Self(1 << 2);

    /// The access set of a write which replaced `old` with `new`.
    pub fn write(old: u16, new: u16) -> Self {
        match old != new {
            true  => Self::WRITTEN | Self::MODIFIED,
            false => Self::WRITTEN,
        }
    }

    /// True if any access has occurred.
    pub fn accessed(&self) -> bool {
        self.0 != 0
    }

    /// True if a read has occurred.
    pub fn read(&self) -> bool {
        self.0 & Self::READ.0 != 0
    }
    /// True if a write has occurred (does not necessarily have to change data).
    pub fn written(&self) -> bool {
        self.0 & Self::WRITTEN.0 != 0
    }
    /// True if a write has occurred (data must change).
    pub fn modified(&self) -> bool {
        self.0 & Self::MODIFIED.0 != 0
    }
}
impl std::ops::BitOr for AccessSet {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}
impl std::ops::BitOrAssign for AccessSet {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = *self | rhs;
    }
}
impl std::fmt::Debug for AccessSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessFlags")
            .field("accessed", &self.accessed())
            .field("read", &self.read())
            .field("written", &self.written())
            .field("modified", &self.modified())
            .finish()
    }
}

/// A struct that tracks accesses to registers and memory.
#[derive(Debug, Default)]
pub struct ChangeObserver {
    regs: [AccessSet; 8],
    mem: BTreeMap<u16, AccessSet>
}
impl ChangeObserver {
    /// Creates a new change observer.
    pub fn new() -> Self {
        Default::default()
    }

    /// Clears all accesses.
    pub fn clear(&mut self) {
        std::mem::take(self);
    }

    /// Gets the access set for the given register.
    pub fn get_reg_accesses(&self, reg: Reg) -> AccessSet {
        self.regs[usize::from(reg)]
    }

    /// Adds new flags to the access set for the given register.
    pub fn update_reg_accesses(&mut self, reg: Reg, set: AccessSet) {
        self.regs[usize::from(reg)] |= set;
    }

    /// Gets the access set for the given memory location.
    pub fn get_mem_accesses(&self, addr: u16) -> AccessSet {
        self.mem.get(&addr).copied().unwrap_or_default()
    }

    /// Adds new flags to the access set for the given memory location.
    pub fn update_mem_accesses(&mut self, addr: u16, set: AccessSet) {
        *self.mem.entry(addr).or_default() |= set;
    }

    /// Iterates over all memory accesses which have occurred since last clear.
    ///
    /// This iterator is sorted in address order.
    pub fn mem_accesses(&self) -> impl Iterator<Item=(u16, AccessSet)> + '_ {
        self.mem.iter().map(|(&addr, &set)| (addr, set))
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::reg_consts::{R1, R2};

    use super::{AccessSet, ChangeObserver};

    #[test]
    fn track_changes() {
        let mut obs = ChangeObserver::new();
        obs.update_reg_accesses(R1, AccessSet::write(0, 5));
        obs.update_reg_accesses(R2, AccessSet::write(3, 3));
        obs.update_mem_accesses(0x2000, AccessSet::READ);

        assert!(obs.get_reg_accesses(R1).modified());
        assert!(obs.get_reg_accesses(R2).written());
        assert!(!obs.get_reg_accesses(R2).modified());
        assert!(obs.get_mem_accesses(0x2000).read());
        assert!(!obs.get_mem_accesses(0x2001).accessed());

        obs.clear();
        assert!(!obs.get_reg_accesses(R1).accessed());
        assert_eq!(obs.mem_accesses().count(), 0);
    }
}
