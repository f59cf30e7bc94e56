//! Runtime operation library.
//!
//! One function per operation kind, implementing the full unspecialized
//! language semantics: coercions, property lookup along prototype chains,
//! equality tables, call and construct dispatch. The inline-cache layer
//! calls into this crate for every fallback execution; cached stubs are
//! shortcuts to what these functions compute, never a replacement.
//!
//! Every function takes a [`Context`] so that user-level re-entry
//! (getters, setters, `valueOf`, iterator methods) flows back through the
//! caller's dispatcher instead of being evaluated here.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod arith;
mod calls;
mod compare;
mod context;
mod convert;
mod names;
mod objects;

pub use arith::{binary_arith, unary_arith, BinaryOp, UnaryOp};
pub use calls::{call, construct, rest, spread_call, spread_construct};
pub use compare::{compare, loose_equals, strict_equals, CompareOp};
pub use context::Context;
pub use convert::{
    to_boolean, to_number, to_numeric, to_primitive, to_property_key, to_string, type_of,
    PrimitiveHint,
};
pub use names::{bind_name, get_intrinsic, get_name};
pub use objects::{
    check_private_field, get_element, get_iterator, get_prop_super, get_property,
    get_with_receiver, has_own, has_property, instance_of, new_array, new_object,
    optimize_spread_call, set_element, set_property, PrivateFieldGuard, WriteFlavor,
};
