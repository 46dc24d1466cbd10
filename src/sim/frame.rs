//! The frame stack and call frame management.
//!
//! This module exposes:
//! - [`FrameStack`]: The frame stack used by the Simulator.
//! - [`Frame`]: The caller/callee information of a given frame.

/// Where this frame came from.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum FrameType {
    /// Frame came from a subroutine call (`JSR`, `JSRR`).
    Subroutine,
    /// Frame came from a trap call (`TRAP`).
    Trap,
}

/// A frame entry.
///
/// This information is only recorded by the Simulator if the `debug_frames` flag is enabled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The memory location of the caller instruction.
    pub caller_addr: u16,

    /// The memory location of the start of the callee.
    ///
    /// For traps, this is the handler address (`x8000 | vect`).
    pub callee_addr: u16,

    /// Whether this frame is from a subroutine call or trap call.
    pub frame_type: FrameType,
}

/// The stack of call frames.
///
/// This struct is used within the Simulator to keep track of the frames of subroutine/trap calls.
/// The amount of information it keeps track of depends on the `debug_frames` flag of the Simulator.
/// - If the `debug_frames` flag is true, this keeps track of a Vec of [`Frame`]s.
/// - If the `debug_frames` flag is false, this only keeps track of the number of frames traversed.
#[derive(Debug)]
pub struct FrameStack {
    /// The number of frames traversed.
    ///
    /// At top level execution, `frame_no` == 0.
    /// Every subroutine/trap call (i.e., JSR, JSRR, TRAP instr.) increments this value,
    /// and every return (i.e., RET, JMPR R7, RTI instr.) decrements this value.
    frame_no: u64,

    /// The frames.
    ///
    /// If `None`, frame information is ignored.
    frames: Option<Vec<Frame>>
}

impl FrameStack {
    /// Creates a new frame stack.
    pub(super) fn new(debug_frames: bool) -> Self {
        Self {
            frame_no: 0,
            frames: debug_frames.then(Vec::new)
        }
    }

    /// Gets the current number of frames entered.
    pub fn len(&self) -> u64 {
        self.frame_no
    }

    /// Tests whether the frame stack is at top level execution.
    pub fn is_empty(&self) -> bool {
        self.frame_no == 0
    }

    /// Gets the list of current frames (if debug frames are enabled).
    pub fn frames(&self) -> Option<&[Frame]> {
        self.frames.as_deref()
    }

    /// Pushes a new frame to the frame stack.
    ///
    /// This should be called at the instruction where a subroutine or trap call occurs.
    pub(super) fn push_frame(&mut self, caller: u16, callee: u16, frame_type: FrameType) {
        self.frame_no += 1;
        if let Some(frames) = self.frames.as_mut() {
            frames.push(Frame {
                caller_addr: caller,
                callee_addr: callee,
                frame_type,
            })
        }
    }

    /// Pops a frame from the frame stack.
    ///
    /// This should be called at the instruction where a return occurs.
    /// Returns at top level do nothing.
    pub(super) fn pop_frame(&mut self) {
        self.frame_no = self.frame_no.saturating_sub(1);
        if let Some(frames) = self.frames.as_mut() {
            frames.pop();
        }
    }
}
impl Default for FrameStack {
    fn default() -> Self {
        Self::new(false)
    }
}

#[cfg(test)]
mod tests {
    use super::{Frame, FrameStack, FrameType};

    #[test]
    fn depth_only() {
        let mut fs = FrameStack::new(false);
        fs.push_frame(0x0000, 0x0010, FrameType::Subroutine);
        fs.push_frame(0x0011, 0x8025, FrameType::Trap);
        assert_eq!(fs.len(), 2);
        assert_eq!(fs.frames(), None);

        fs.pop_frame();
        fs.pop_frame();
        fs.pop_frame();
        assert!(fs.is_empty());
    }

    #[test]
    fn debug_frames() {
        let mut fs = FrameStack::new(true);
        fs.push_frame(0x0004, 0x0100, FrameType::Subroutine);
        assert_eq!(fs.frames(), Some(&[Frame { caller_addr: 0x0004, callee_addr: 0x0100, frame_type: FrameType::Subroutine }][..]));

        fs.pop_frame();
        assert_eq!(fs.len(), 0);
        assert_eq!(fs.frames(), Some(&[][..]));
    }
}
