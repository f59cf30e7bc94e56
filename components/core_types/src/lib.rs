//! Core value types and error handling for the inline-cache engine.
//!
//! This crate provides the foundational types shared by every component:
//! value representation, property keys, heap id newtypes, and the
//! language-level error channel.
//!
//! # Overview
//!
//! - [`Value`] - Tagged representation of dynamic-language values
//! - [`PropertyKey`] - String / index / symbol property keys
//! - [`JsError`] - Language-level exceptions
//! - [`ErrorKind`] - Types of language-level errors
//! - [`EvalResult`] - The `Result` alias every operation returns
//!
//! # Examples
//!
//! ```
//! use core_types::{Value, JsError, ErrorKind};
//!
//! let num = Value::Smi(42);
//! assert!(num.is_truthy());
//! assert_eq!(num.type_of(), "number");
//!
//! let error = JsError::new(ErrorKind::TypeError, "undefined is not a function");
//! assert_eq!(error.kind, ErrorKind::TypeError);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

mod error;
mod ids;
mod key;
mod value;

pub use error::{ErrorKind, EvalResult, JsError};
pub use ids::{FunctionId, ObjectId, SymbolId};
pub use key::PropertyKey;
pub use value::Value;
