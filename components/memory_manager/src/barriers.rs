//! Pre-write barrier log for cache chain mutation.
//!
//! Unlinking a stub removes edges from the stub to heap objects and shapes.
//! The collector must learn about those edges before the removal becomes
//! observable, so the mutator records them here first and the collector
//! drains the log at the start of its next cycle and treats the targets as
//! additional roots for that cycle.

use parking_lot::Mutex;

use crate::trace::Edge;

/// Log of edges severed since the last collection cycle.
pub struct BarrierLog {
    severed: Mutex<Vec<Edge>>,
}

impl Default for BarrierLog {
    fn default() -> Self {
        Self::new()
    }
}

impl BarrierLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        BarrierLog {
            severed: Mutex::new(Vec::new()),
        }
    }

    /// Records edges that are about to be removed.
    ///
    /// Must be called before the mutation that removes them is observable.
    pub fn pre_write(&self, edges: &[Edge]) {
        if edges.is_empty() {
            return;
        }
        let mut severed = self.severed.lock();
        severed.extend_from_slice(edges);
    }

    /// Takes every recorded edge, leaving the log empty.
    ///
    /// Called by the collector when it begins a cycle.
    pub fn drain(&self) -> Vec<Edge> {
        let mut severed = self.severed.lock();
        std::mem::take(&mut *severed)
    }

    /// Number of recorded edges.
    pub fn len(&self) -> usize {
        self.severed.lock().len()
    }

    /// True if no edges are recorded.
    pub fn is_empty(&self) -> bool {
        self.severed.lock().is_empty()
    }
}
