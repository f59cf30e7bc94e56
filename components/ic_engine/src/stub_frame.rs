//! Stub-frame accounting for non-tail calls out of fallback handlers.
//!
//! A fallback path that calls back into the runtime and then returns to
//! the dispatcher (Call, SpreadCall) must bracket the call with a frame
//! record so stack walkers see the boundary. Frames nest across
//! invocations, but a single dispatcher invocation opens at most one;
//! violating the pairing is an implementation defect and aborts.

/// Runtime-wide stub-frame bookkeeping.
#[derive(Debug, Default)]
pub struct StubFrames {
    depth: u32,
    // True while the innermost active invocation holds an open frame.
    open_in_current_invocation: bool,
}

impl StubFrames {
    /// No frames open.
    pub fn new() -> Self {
        StubFrames::default()
    }

    /// Total open frames across all nested invocations.
    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub(crate) fn enter(&mut self) {
        assert!(
            !self.open_in_current_invocation,
            "stub frame entered twice within one dispatcher invocation"
        );
        self.open_in_current_invocation = true;
        self.depth += 1;
    }

    pub(crate) fn leave(&mut self) {
        assert!(
            self.open_in_current_invocation && self.depth > 0,
            "leaving a stub frame that was never entered"
        );
        self.open_in_current_invocation = false;
        self.depth -= 1;
    }

    /// Marks the start of a nested invocation: whatever frame the outer
    /// invocation holds does not count against the nested one. Returns
    /// the flag to restore on exit.
    pub(crate) fn begin_invocation(&mut self) -> bool {
        std::mem::replace(&mut self.open_in_current_invocation, false)
    }

    pub(crate) fn end_invocation(&mut self, saved: bool) {
        assert!(
            !self.open_in_current_invocation,
            "invocation ended with its stub frame still open"
        );
        self.open_in_current_invocation = saved;
    }
}
