//! Operation kinds and per-site metadata.

use core_types::PropertyKey;
use op_library::{BinaryOp, CompareOp, PrivateFieldGuard, UnaryOp, WriteFlavor};

/// The closed set of cacheable operation kinds.
///
/// Every operation site carries exactly one kind, fixed when its compiled
/// unit is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    /// Truthiness test.
    ToBool,
    /// Unary arithmetic.
    UnaryArith,
    /// Binary arithmetic and bitwise operators.
    BinaryArith,
    /// Relational and equality operators.
    Compare,
    /// Array literal / `new Array(n)`.
    NewArray,
    /// Object literal.
    NewObject,
    /// Computed-key property write.
    SetElem,
    /// Named property write.
    SetProp,
    /// Named property read.
    GetProp,
    /// `super.name` read.
    GetPropSuper,
    /// Computed-key property read.
    GetElem,
    /// `super[expr]` read.
    GetElemSuper,
    /// The `in` operator.
    In,
    /// Own-property presence test.
    HasOwn,
    /// Private-field brand check.
    CheckPrivateField,
    /// Scoped name read.
    GetName,
    /// Scoped name binding resolution.
    BindName,
    /// Well-known intrinsic read.
    GetIntrinsic,
    /// Ordinary call.
    Call,
    /// `new` call.
    CallConstructing,
    /// Spread call.
    SpreadCall,
    /// Spread `new` call.
    SpreadCallConstructing,
    /// The `instanceof` operator.
    InstanceOf,
    /// The `typeof` operator.
    TypeOf,
    /// ToPropertyKey coercion.
    ToPropertyKey,
    /// Iterator acquisition.
    GetIterator,
    /// Spread-argument fast-path probe.
    OptimizeSpreadCall,
    /// Rest-parameter materialization.
    Rest,
}

impl OpKind {
    /// Every kind, in table order.
    pub const ALL: [OpKind; 28] = [
        OpKind::ToBool,
        OpKind::UnaryArith,
        OpKind::BinaryArith,
        OpKind::Compare,
        OpKind::NewArray,
        OpKind::NewObject,
        OpKind::SetElem,
        OpKind::SetProp,
        OpKind::GetProp,
        OpKind::GetPropSuper,
        OpKind::GetElem,
        OpKind::GetElemSuper,
        OpKind::In,
        OpKind::HasOwn,
        OpKind::CheckPrivateField,
        OpKind::GetName,
        OpKind::BindName,
        OpKind::GetIntrinsic,
        OpKind::Call,
        OpKind::CallConstructing,
        OpKind::SpreadCall,
        OpKind::SpreadCallConstructing,
        OpKind::InstanceOf,
        OpKind::TypeOf,
        OpKind::ToPropertyKey,
        OpKind::GetIterator,
        OpKind::OptimizeSpreadCall,
        OpKind::Rest,
    ];

    /// Stable index into per-kind tables.
    pub fn as_index(self) -> usize {
        Self::ALL.iter().position(|k| *k == self).unwrap_or(0)
    }

    /// Human-readable name, used in log output.
    pub fn name(self) -> &'static str {
        match self {
            OpKind::ToBool => "ToBool",
            OpKind::UnaryArith => "UnaryArith",
            OpKind::BinaryArith => "BinaryArith",
            OpKind::Compare => "Compare",
            OpKind::NewArray => "NewArray",
            OpKind::NewObject => "NewObject",
            OpKind::SetElem => "SetElem",
            OpKind::SetProp => "SetProp",
            OpKind::GetProp => "GetProp",
            OpKind::GetPropSuper => "GetPropSuper",
            OpKind::GetElem => "GetElem",
            OpKind::GetElemSuper => "GetElemSuper",
            OpKind::In => "In",
            OpKind::HasOwn => "HasOwn",
            OpKind::CheckPrivateField => "CheckPrivateField",
            OpKind::GetName => "GetName",
            OpKind::BindName => "BindName",
            OpKind::GetIntrinsic => "GetIntrinsic",
            OpKind::Call => "Call",
            OpKind::CallConstructing => "CallConstructing",
            OpKind::SpreadCall => "SpreadCall",
            OpKind::SpreadCallConstructing => "SpreadCallConstructing",
            OpKind::InstanceOf => "InstanceOf",
            OpKind::TypeOf => "TypeOf",
            OpKind::ToPropertyKey => "ToPropertyKey",
            OpKind::GetIterator => "GetIterator",
            OpKind::OptimizeSpreadCall => "OptimizeSpreadCall",
            OpKind::Rest => "Rest",
        }
    }

    /// Write-path kinds run the two-phase attach protocol around their
    /// effectful store.
    pub fn is_write_path(self) -> bool {
        matches!(self, OpKind::SetProp | OpKind::SetElem)
    }

    /// Kinds whose generic semantics allocate a result object that the
    /// fallback stub caches as a template.
    pub fn caches_template(self) -> bool {
        matches!(self, OpKind::NewArray | OpKind::NewObject | OpKind::Rest)
    }

    /// Kinds that compute their result before any attach attempt: the
    /// attach decision wants the computed value in hand.
    pub fn computes_before_attach(self) -> bool {
        self.caches_template() || self == OpKind::GetIntrinsic
    }

    /// Kinds whose specialized effect can re-enter the call machinery,
    /// so an unlinked stub may still be referenced by an activation on
    /// the control stack.
    pub fn makes_gc_calls(self) -> bool {
        matches!(
            self,
            OpKind::Call
                | OpKind::CallConstructing
                | OpKind::SpreadCall
                | OpKind::SpreadCallConstructing
                | OpKind::GetProp
                | OpKind::GetPropSuper
                | OpKind::GetElem
                | OpKind::GetElemSuper
                | OpKind::SetProp
                | OpKind::SetElem
                | OpKind::GetIterator
        )
    }

    /// Smallest operand slice the kind's fixed layout allows. Dispatching
    /// with fewer is a caller bug; the dispatcher asserts this in debug
    /// builds.
    pub fn min_operands(self) -> usize {
        match self {
            OpKind::NewObject | OpKind::GetIntrinsic | OpKind::Rest => 0,
            OpKind::ToBool
            | OpKind::UnaryArith
            | OpKind::NewArray
            | OpKind::GetProp
            | OpKind::GetName
            | OpKind::BindName
            | OpKind::TypeOf
            | OpKind::ToPropertyKey
            | OpKind::GetIterator
            | OpKind::OptimizeSpreadCall => 1,
            OpKind::BinaryArith
            | OpKind::Compare
            | OpKind::SetProp
            | OpKind::GetPropSuper
            | OpKind::GetElem
            | OpKind::In
            | OpKind::HasOwn
            | OpKind::CheckPrivateField
            | OpKind::InstanceOf
            | OpKind::Call => 2,
            OpKind::SetElem
            | OpKind::GetElemSuper
            | OpKind::SpreadCall
            | OpKind::CallConstructing => 3,
            OpKind::SpreadCallConstructing => 4,
        }
    }
}

impl std::fmt::Display for OpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-site compile-time metadata, fixed when the site is created.
#[derive(Debug, Clone, PartialEq)]
pub enum SitePayload {
    /// No metadata.
    None,
    /// Unary operator.
    Unary(UnaryOp),
    /// Binary operator.
    Binary(BinaryOp),
    /// Comparison operator.
    Compare(CompareOp),
    /// Property name, for named reads and name lookups.
    Name(PropertyKey),
    /// Property name and write flavor, for SetProp.
    NamedWrite {
        /// The property being written.
        name: PropertyKey,
        /// Assignment vs. initialization, strictness.
        flavor: WriteFlavor,
    },
    /// Write flavor for computed-key writes.
    ElemWrite(WriteFlavor),
    /// Intrinsic binding name.
    Intrinsic(String),
    /// Private-field check flavor.
    PrivateCheck(PrivateFieldGuard),
    /// Formal-parameter count for rest materialization.
    Rest {
        /// Number of declared formals preceding the rest parameter.
        formal_count: usize,
    },
    /// Spread-call flavor; direct-eval spreads never specialize.
    Spread {
        /// True for direct-eval flavored sites.
        no_specialize: bool,
    },
}

/// One operation site: a kind plus its immutable metadata.
#[derive(Debug, Clone)]
pub struct OpSite {
    /// The operation kind.
    pub kind: OpKind,
    /// Site metadata.
    pub payload: SitePayload,
}

impl OpSite {
    /// A site with no metadata.
    pub fn new(kind: OpKind) -> Self {
        OpSite {
            kind,
            payload: SitePayload::None,
        }
    }

    /// A site with metadata.
    pub fn with_payload(kind: OpKind, payload: SitePayload) -> Self {
        OpSite { kind, payload }
    }

    /// Whether specialization is ruled out for this site ahead of time.
    pub fn never_specializes(&self) -> bool {
        matches!(self.payload, SitePayload::Spread { no_specialize: true })
    }
}

/// Identifies a compiled unit registered with the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UnitId(pub u32);

/// Identifies one operation site within a compiled unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SiteId {
    /// The owning compiled unit.
    pub unit: UnitId,
    /// Index of the site within the unit.
    pub index: u32,
}
