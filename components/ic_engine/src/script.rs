//! Per-compiled-unit IC storage: entries, stub space, trace pass.

use memory_manager::{BarrierLog, Heap, Tracer};

use crate::chain::StubChain;
use crate::kind::{OpKind, OpSite};
use crate::stub::{SpecializedStub, StubHandle, StubSpace};

/// Associates one operation site with its stub chain.
#[derive(Debug)]
pub struct IcEntry {
    site: OpSite,
    chain: StubChain,
}

impl IcEntry {
    /// The site's immutable description.
    pub fn site(&self) -> &OpSite {
        &self.site
    }

    /// The site's chain.
    pub fn chain(&self) -> &StubChain {
        &self.chain
    }

    /// Mutable access to the chain.
    pub fn chain_mut(&mut self) -> &mut StubChain {
        &mut self.chain
    }
}

/// All inline caches of one compiled unit.
///
/// Created in a single pass over the unit's operation sites: every entry
/// starts with its fallback stub already in place, and Rest sites get
/// their template array pre-created, so a chain head is never absent.
#[derive(Debug)]
pub struct IcScript {
    entries: Vec<IcEntry>,
    space: StubSpace,
    has_optimized_code: bool,
}

impl IcScript {
    /// Builds the unit's IC entries.
    pub fn new(sites: Vec<OpSite>, heap: &mut Heap) -> Self {
        let mut entries = Vec::with_capacity(sites.len());
        for site in sites {
            let mut chain = StubChain::new(site.kind);
            if site.kind == OpKind::Rest {
                let template = heap.alloc_array(0);
                chain.fallback_mut().set_template(template);
            }
            entries.push(IcEntry { site, chain });
        }
        IcScript {
            entries,
            space: StubSpace::new(),
            has_optimized_code: false,
        }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the unit has no cached sites.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry for a site index.
    pub fn entry(&self, index: u32) -> &IcEntry {
        &self.entries[index as usize]
    }

    /// Mutable entry for a site index.
    pub fn entry_mut(&mut self, index: u32) -> &mut IcEntry {
        &mut self.entries[index as usize]
    }

    /// The unit's stub arena.
    pub fn space(&self) -> &StubSpace {
        &self.space
    }

    /// Attaches a stub at the head of a site's chain.
    pub fn attach_stub(&mut self, index: u32, stub: SpecializedStub) -> StubHandle {
        let entry = &mut self.entries[index as usize];
        entry.chain.attach(&mut self.space, stub)
    }

    /// Discards every specialized stub of one site; returns how many.
    pub fn discard_entry(&mut self, index: u32, barrier: &BarrierLog) -> usize {
        let entry = &mut self.entries[index as usize];
        entry.chain.discard_all(&mut self.space, barrier)
    }

    /// Specialized-stub count of one site.
    pub fn num_specialized(&self, index: u32) -> usize {
        self.entries[index as usize].chain.num_specialized(&self.space)
    }

    /// Whether the optimizing tier produced code for this unit.
    pub fn has_optimized_code(&self) -> bool {
        self.has_optimized_code
    }

    /// Records that the optimizing tier compiled this unit.
    pub fn set_has_optimized_code(&mut self) {
        self.has_optimized_code = true;
    }

    /// Frees stub storage retired since the last safe point.
    pub fn note_safe_point(&mut self) {
        self.space.note_safe_point();
    }

    /// Traces every stub reference the unit holds, including retired
    /// stubs an in-flight activation may still reference.
    pub fn trace(&self, tracer: &mut Tracer) {
        self.space.trace(tracer);
        for entry in &self.entries {
            entry.chain.fallback().trace(tracer);
        }
    }
}
