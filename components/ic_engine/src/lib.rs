//! Adaptive inline caches for the interpreter tier.
//!
//! Every operation site owns a chain of shape-guarded specialized stubs
//! ending in a permanent generic fallback. Dispatch walks the chain head
//! to tail; the first stub whose guards accept the operand shapes runs,
//! anything else falls through to the kind's fallback handler, which
//! computes through `op_library` and asks the pluggable [`Specializer`]
//! whether a new stub should serve future invocations.
//!
//! A per-site state machine (learning, megamorphic, generic) bounds how
//! much specialization a site is allowed to accumulate; crossing an edge
//! discards the chain. Stub storage lives in a per-unit arena whose
//! slots are retired on unlink and reclaimed only at safe points, so an
//! activation resuming into an unlinked stub stays sound.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod cache_state;
mod chain;
mod engine;
mod fallback;
mod kind;
mod script;
mod specializer;
mod stub;
mod stub_frame;
mod tier_bridge;
mod trampoline;

pub use cache_state::{CacheConfig, CacheMode, CacheState};
pub use chain::StubChain;
pub use engine::{Engine, HostFn};
pub use kind::{OpKind, OpSite, SiteId, SitePayload, UnitId};
pub use script::{IcEntry, IcScript};
pub use specializer::{
    AttachDecision, AttachRequest, ClosureCodeGenerator, CodeGenerator, CodegenError,
    DeferReason, ShapeGuardSpecializer, Specializer,
};
pub use stub::{
    CompiledStub, FallbackStub, Guards, SpecializedStub, StubDescription, StubEffect,
    StubHandle, StubSpace, MAX_GUARDS,
};
pub use tier_bridge::{ResumePoint, ResumeVariant, TierBridge};
pub use trampoline::{FallbackHandler, Trampoline, TrampolineTable};
