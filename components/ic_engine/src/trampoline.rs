//! The runtime-wide trampoline table.
//!
//! One entry per operation kind: the generic fallback handler shared by
//! every fallback stub of that kind across all compiled units, plus the
//! deopt resume point. Initialized once, idempotently, and read-only
//! afterwards, so reads need no synchronization.

use std::sync::OnceLock;

use core_types::{EvalResult, Value};

use crate::engine::Engine;
use crate::fallback;
use crate::kind::{OpKind, SiteId};
use crate::tier_bridge::ResumePoint;

/// Generic dispatch entry for one operation kind.
pub type FallbackHandler = fn(&mut Engine, SiteId, &[Value]) -> EvalResult<Value>;

/// One trampoline-table row.
pub struct Trampoline {
    /// The kind this row serves.
    pub kind: OpKind,
    /// The shared generic handler.
    pub handler: FallbackHandler,
    /// Where deoptimization resumes for this kind.
    pub resume: ResumePoint,
}

/// Kind-indexed table of trampolines.
pub struct TrampolineTable {
    entries: Vec<Trampoline>,
}

impl TrampolineTable {
    fn build() -> Self {
        let entries = OpKind::ALL
            .iter()
            .map(|&kind| Trampoline {
                kind,
                handler: fallback::handler_for(kind),
                resume: ResumePoint::for_kind(kind),
            })
            .collect();
        TrampolineTable { entries }
    }

    /// The process-wide table, built on first use.
    pub fn global() -> &'static TrampolineTable {
        static TABLE: OnceLock<TrampolineTable> = OnceLock::new();
        TABLE.get_or_init(TrampolineTable::build)
    }

    /// Row for a kind.
    pub fn entry(&self, kind: OpKind) -> &Trampoline {
        &self.entries[kind.as_index()]
    }

    /// Generic handler for a kind.
    pub fn handler(&self, kind: OpKind) -> FallbackHandler {
        self.entry(kind).handler
    }

    /// Deopt resume point for a kind.
    pub fn resume(&self, kind: OpKind) -> ResumePoint {
        self.entry(kind).resume
    }
}
