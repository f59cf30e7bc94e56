//! The per-site stub chain.
//!
//! Specialized stubs form a singly-linked head segment inside the unit's
//! [`StubSpace`]; the fallback stub is owned inline as the structural
//! tail, so "exactly one fallback, always last, never unlinked" holds by
//! construction.

use memory_manager::BarrierLog;

use crate::kind::OpKind;
use crate::stub::{FallbackStub, SpecializedStub, StubHandle, StubSpace};

/// One operation site's dispatch chain.
#[derive(Debug)]
pub struct StubChain {
    head: Option<StubHandle>,
    fallback: FallbackStub,
}

impl StubChain {
    /// A chain holding only its fallback stub.
    pub fn new(kind: OpKind) -> Self {
        StubChain {
            head: None,
            fallback: FallbackStub::new(kind),
        }
    }

    /// First specialized stub, if any.
    pub fn first_stub(&self) -> Option<StubHandle> {
        self.head
    }

    /// The terminal fallback stub.
    pub fn fallback(&self) -> &FallbackStub {
        &self.fallback
    }

    /// Mutable access to the fallback stub.
    pub fn fallback_mut(&mut self) -> &mut FallbackStub {
        &mut self.fallback
    }

    /// Specialized stub handles in dispatch (head-to-tail) order.
    pub fn handles(&self, space: &StubSpace) -> Vec<StubHandle> {
        let mut out = Vec::new();
        let mut current = self.head;
        while let Some(handle) = current {
            out.push(handle);
            current = space.get(handle).and_then(|stub| stub.next);
        }
        out
    }

    /// Number of specialized stubs.
    pub fn num_specialized(&self, space: &StubSpace) -> usize {
        self.handles(space).len()
    }

    /// Prepends a specialized stub: the newest attachment dispatches
    /// first.
    pub fn attach(&mut self, space: &mut StubSpace, mut stub: SpecializedStub) -> StubHandle {
        stub.next = self.head;
        let handle = space.insert(stub);
        self.head = Some(handle);
        handle
    }

    /// Whether any linked stub carries exactly these guards.
    pub fn has_stub_with_guards(
        &self,
        space: &StubSpace,
        guards: &crate::stub::Guards,
    ) -> bool {
        self.handles(space)
            .iter()
            .filter_map(|h| space.get(*h))
            .any(|stub| stub.guards() == guards)
    }

    /// Unlinks one specialized stub in O(1) given its predecessor.
    ///
    /// `prev` absent means `handle` must be the current head. The removed
    /// stub's GC edges are barrier-logged before the chain mutation is
    /// observable, and its storage is retired, not freed.
    pub fn unlink(
        &mut self,
        space: &mut StubSpace,
        barrier: &BarrierLog,
        prev: Option<StubHandle>,
        handle: StubHandle,
    ) {
        let next = {
            let stub = space
                .get(handle)
                .unwrap_or_else(|| panic!("unlinking a stub that is not in the chain"));
            barrier.pre_write(&stub.edges());
            stub.next
        };
        match prev {
            None => {
                assert_eq!(self.head, Some(handle), "unlink head mismatch");
                self.head = next;
            }
            Some(prev) => {
                let prev_stub = space
                    .get_mut(prev)
                    .unwrap_or_else(|| panic!("unlink predecessor is not in the chain"));
                assert_eq!(prev_stub.next, Some(handle), "unlink predecessor mismatch");
                prev_stub.next = next;
            }
        }
        space.retire(handle);
    }

    /// Unlinks every specialized stub, returning how many were removed.
    pub fn discard_all(&mut self, space: &mut StubSpace, barrier: &BarrierLog) -> usize {
        let mut count = 0;
        while let Some(head) = self.head {
            self.unlink(space, barrier, None, head);
            count += 1;
        }
        count
    }
}
