//! Target backend seam: the two queries the allocation pass needs from a
//! device description.

use serde::{Deserialize, Serialize};

use crate::ir::graph::{Graph, ValueId};

/// Non-negative byte footprint reported by a target for one value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemSize {
    pub size: u64,
}

/// Device description consumed by the memory allocation pass.
pub trait TargetBackend: Send + Sync {
    /// Bytes of on-chip local memory.
    fn local_mem_size(&self) -> u64;

    /// Byte footprint of one value on this target.
    fn value_memory_size(&self, graph: &Graph, value: ValueId) -> MemSize;
}

/// Simulated scratchpad DLA with a configurable local-memory size.
///
/// Footprints are the packed tensor byte length; real targets would add
/// alignment and banking constraints here.
#[derive(Debug, Clone)]
pub struct SimDla {
    local_mem_bytes: u64,
}

impl SimDla {
    pub fn new(local_mem_bytes: u64) -> Self {
        Self { local_mem_bytes }
    }
}

impl TargetBackend for SimDla {
    fn local_mem_size(&self) -> u64 {
        self.local_mem_bytes
    }

    fn value_memory_size(&self, graph: &Graph, value: ValueId) -> MemSize {
        MemSize {
            size: graph.value(value).spec.byte_len().unwrap_or(0),
        }
    }
}
