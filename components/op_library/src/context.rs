//! Host context the operation library runs against.

use core_types::{EvalResult, Value};
use memory_manager::Heap;

/// Capabilities the operation library needs from its host.
///
/// The host is whatever dispatches operations: it owns the heap and knows
/// how to run a function. Routing `invoke`/`construct` through the host
/// means any user-level code an operation triggers (a getter, a `valueOf`
/// method, an iterator) re-enters the host's own dispatch machinery.
pub trait Context {
    /// The object heap.
    fn heap(&self) -> &Heap;

    /// Mutable access to the object heap.
    fn heap_mut(&mut self) -> &mut Heap;

    /// Calls `callee` with the given receiver and arguments.
    ///
    /// `callee` has already been checked to be callable.
    fn invoke(&mut self, callee: Value, this: Value, args: &[Value]) -> EvalResult<Value>;

    /// Runs `callee` as a constructor with the given `new.target`.
    fn construct(&mut self, callee: Value, args: &[Value], new_target: Value)
        -> EvalResult<Value>;

    /// Looks up a well-known intrinsic binding by name.
    fn intrinsic(&self, name: &str) -> Option<Value>;
}
