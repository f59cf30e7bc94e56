//! The per-site cache state machine and its tunables.

/// Transition thresholds for the cache state machine.
///
/// These are policy knobs, not algorithmic constants; the defaults are a
/// reasonable starting point for an interpreter tier.
#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    /// Specialized-stub count at which a site abandons per-shape learning.
    pub max_specialized_stubs: usize,
    /// Attach failures tolerated while learning.
    pub max_learning_failures: u32,
    /// Further failures tolerated in megamorphic mode before going
    /// fully generic.
    pub max_megamorphic_failures: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            max_specialized_stubs: 6,
            max_learning_failures: 5,
            max_megamorphic_failures: 10,
        }
    }
}

/// Learning mode of one cache site. The ordering follows the one-way
/// transition graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CacheMode {
    /// Per-shape specialization is being attempted.
    Learning,
    /// Per-shape learning failed; only relaxed specializations apply.
    Megamorphic,
    /// Specialization abandoned entirely.
    Generic,
}

/// Per-site counters plus the three-mode state machine.
///
/// Owned by the site's fallback stub; mutated only by the fallback
/// dispatcher and by chain discards.
#[derive(Debug)]
pub struct CacheState {
    mode: CacheMode,
    attach_failures: u32,
    total_attached: u32,
    unlinked: u32,
    used_by_transpiler: bool,
}

impl CacheState {
    /// Fresh state: learning, all counters zero.
    pub fn new() -> Self {
        CacheState {
            mode: CacheMode::Learning,
            attach_failures: 0,
            total_attached: 0,
            unlinked: 0,
            used_by_transpiler: false,
        }
    }

    /// Current mode.
    pub fn mode(&self) -> CacheMode {
        self.mode
    }

    /// Whether the dispatcher may consult the specializer at all.
    pub fn can_attach_stub(&self) -> bool {
        self.mode != CacheMode::Generic
    }

    /// Runs one transition step against the current specialized-stub
    /// count. Returns true when an edge was crossed, in which case the
    /// caller must discard the chain.
    pub fn maybe_transition(&mut self, num_specialized: usize, config: &CacheConfig) -> bool {
        match self.mode {
            CacheMode::Learning
                if self.attach_failures >= config.max_learning_failures
                    || num_specialized >= config.max_specialized_stubs =>
            {
                self.mode = CacheMode::Megamorphic;
                // Megamorphic gets a fresh failure budget.
                self.attach_failures = 0;
                true
            }
            CacheMode::Megamorphic
                if self.attach_failures >= config.max_megamorphic_failures =>
            {
                self.mode = CacheMode::Generic;
                true
            }
            _ => false,
        }
    }

    /// Counts an invocation that was eligible to attach but did not.
    pub fn note_attach_failure(&mut self) {
        self.attach_failures += 1;
    }

    /// Counts a successful attach.
    pub fn note_attached(&mut self) {
        self.total_attached += 1;
    }

    /// Counts stubs removed by unlink or discard.
    pub fn note_unlinked(&mut self, count: usize) {
        self.unlinked += count as u32;
    }

    /// Attach failures since the last mode change.
    pub fn attach_failures(&self) -> u32 {
        self.attach_failures
    }

    /// Stubs attached over the site's lifetime.
    pub fn total_attached(&self) -> u32 {
        self.total_attached
    }

    /// Stubs unlinked over the site's lifetime.
    pub fn unlinked(&self) -> u32 {
        self.unlinked
    }

    /// Whether the optimizing tier transpiled this site.
    pub fn used_by_transpiler(&self) -> bool {
        self.used_by_transpiler
    }

    /// Flags the site as transpiled by the optimizing tier.
    pub fn set_used_by_transpiler(&mut self) {
        self.used_by_transpiler = true;
    }
}

impl Default for CacheState {
    fn default() -> Self {
        Self::new()
    }
}
