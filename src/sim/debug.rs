//! Utilities to debug simulation.
//!
//! Breakpoints and labels live in a [`Metadata`] overlay keyed by address.
//! The overlay is not visible to the simulated machine;
//! it only decides where the [`Simulator`]'s run loops stop.
//!
//! [`Simulator`]: super::Simulator
use std::collections::BTreeMap;

/// Debugging information attached to one memory address.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MemMetadata {
    /// The label bound to this address (from the object file's symbol blocks).
    pub label: Option<String>,
    /// Whether run loops stop when control reaches this address.
    pub breakpoint: bool,
}
impl MemMetadata {
    fn is_empty(&self) -> bool {
        self.label.is_none() && !self.breakpoint
    }
}

/// The per-address debugging overlay.
///
/// ```
/// use lc4_sim::sim::debug::Metadata;
///
/// let mut meta = Metadata::new();
/// meta.set_breakpoint(0x0003);
/// meta.set_breakpoint(0x0003);
/// assert!(meta.is_breakpoint(0x0003));
/// assert_eq!(meta.breakpoints().collect::<Vec<_>>(), [0x0003]);
/// ```
#[derive(Debug, Default, Clone)]
pub struct Metadata(BTreeMap<u16, MemMetadata>);
impl Metadata {
    /// Creates an empty overlay.
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Gets the metadata at an address, if any is set.
    pub fn get(&self, addr: u16) -> Option<&MemMetadata> {
        self.0.get(&addr)
    }

    /// Marks the address with a breakpoint.
    ///
    /// Setting a breakpoint twice is the same as setting it once.
    pub fn set_breakpoint(&mut self, addr: u16) {
        self.0.entry(addr).or_default().breakpoint = true;
    }

    /// Removes the breakpoint at an address, returning whether one was there.
    pub fn remove_breakpoint(&mut self, addr: u16) -> bool {
        let Some(meta) = self.0.get_mut(&addr) else { return false };
        let had = std::mem::take(&mut meta.breakpoint);
        if meta.is_empty() {
            self.0.remove(&addr);
        }
        had
    }

    /// Whether the address is marked with a breakpoint.
    pub fn is_breakpoint(&self, addr: u16) -> bool {
        self.0.get(&addr).is_some_and(|m| m.breakpoint)
    }

    /// All addresses with breakpoints, in order.
    pub fn breakpoints(&self) -> impl Iterator<Item = u16> + '_ {
        self.0.iter()
            .filter(|(_, m)| m.breakpoint)
            .map(|(&addr, _)| addr)
    }

    /// Binds a label to an address.
    pub fn set_label(&mut self, addr: u16, label: String) {
        self.0.entry(addr).or_default().label = Some(label);
    }

    /// The label bound to an address, if any.
    pub fn label(&self, addr: u16) -> Option<&str> {
        self.0.get(&addr)?.label.as_deref()
    }

    /// Removes everything from the overlay.
    pub fn clear(&mut self) {
        self.0.clear();
    }
}

/// The state of the debugger's run loops.
#[derive(Debug, Default, PartialEq, Eq, Hash, Clone, Copy)]
pub enum RunStatus {
    /// Nothing has executed since the machine was created, reset, cleared, or loaded.
    #[default]
    Idle,
    /// At least one instruction has executed and the machine can continue.
    Running,
    /// The machine reached the halt sentinel or faulted.
    Halted,
}

/// Why the last run loop stopped.
#[derive(Debug, Default, PartialEq, Eq, Hash, Clone, Copy)]
pub(crate) enum PauseCondition {
    /// The program reached the halt sentinel.
    Halt,
    /// The program hit a breakpoint.
    Breakpoint,
    /// The tripwire condition was hit (e.g. a step limit, or `next`'s target address).
    Tripwire,
    /// An error occurred.
    Error,
    /// The program has not run, or the last run did not stop for any of the other reasons.
    #[default]
    Unpaused,
}

#[cfg(test)]
mod tests {
    use super::Metadata;

    #[test]
    fn breakpoints_and_labels() {
        let mut meta = Metadata::new();
        meta.set_label(0x0010, "LOOP".to_string());
        meta.set_breakpoint(0x0010);
        meta.set_breakpoint(0x0002);

        assert_eq!(meta.breakpoints().collect::<Vec<_>>(), [0x0002, 0x0010]);
        assert_eq!(meta.label(0x0010), Some("LOOP"));

        // removing the breakpoint keeps the label
        assert!(meta.remove_breakpoint(0x0010));
        assert!(!meta.is_breakpoint(0x0010));
        assert_eq!(meta.label(0x0010), Some("LOOP"));

        // removing a breakpoint-only entry drops it entirely
        assert!(meta.remove_breakpoint(0x0002));
        assert!(meta.get(0x0002).is_none());
        assert!(!meta.remove_breakpoint(0x0002));

        meta.clear();
        assert!(meta.get(0x0010).is_none());
    }
}
