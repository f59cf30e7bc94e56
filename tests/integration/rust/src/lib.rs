//! Integration test suite for the inline-cache engine.
//!
//! The suites drive whole-engine scenarios across component boundaries:
//! cache lifecycle, operation semantics through dispatch, call and stub
//! frame behavior, and the two-phase write path.

/// Re-export components for test convenience
pub mod components {
    pub use core_types;
    pub use ic_engine;
    pub use memory_manager;
    pub use op_library;
}
