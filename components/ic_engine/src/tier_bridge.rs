//! Handshake with the optimizing tier: fallback-hit feedback and
//! deoptimization re-entry points.

use crate::kind::{OpKind, SiteId};

/// Callback surface of the optimizing tier's feedback model.
///
/// `notify_fallback_hit` fires at the top of a fallback invocation for a
/// site the optimizer transpiled, in a unit it compiled: the generic path
/// running again is a correctness signal for hoisted or optimistic
/// operations.
pub trait TierBridge {
    /// A transpiled site fell back to the generic path.
    fn notify_fallback_hit(&mut self, site: SiteId);
}

/// How execution resumes at a deopt target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeVariant {
    /// Plain resume into the fallback path.
    Normal,
    /// The operation carries a receiver distinct from its lookup start
    /// (`super` accesses).
    AlternateReceiver,
    /// Constructing call: a non-object return is replaced by the
    /// pre-deoptimization receiver.
    Constructing,
}

/// A stable re-entry point the deoptimizer targets when undoing an
/// inlined version of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResumePoint {
    /// The operation kind resumed into.
    pub kind: OpKind,
    /// Resume flavor.
    pub variant: ResumeVariant,
}

impl ResumePoint {
    pub(crate) fn for_kind(kind: OpKind) -> ResumePoint {
        let variant = match kind {
            OpKind::CallConstructing | OpKind::SpreadCallConstructing => {
                ResumeVariant::Constructing
            }
            OpKind::GetPropSuper | OpKind::GetElemSuper => ResumeVariant::AlternateReceiver,
            _ => ResumeVariant::Normal,
        };
        ResumePoint { kind, variant }
    }
}
