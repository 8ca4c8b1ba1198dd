//! Ahead-of-time compilation passes for deep-learning accelerators with
//! small scratchpad-style local memories.
//!
//! The crate provides a compute-graph IR, a liveness analysis over its
//! linear schedule, and the static memory allocation pass that places
//! every live tensor in a single contiguous arena, splices explicit
//! `Load`/`Store` DMA points, and tiles oversized operators when the
//! working set does not fit on-chip.

pub mod analysis;
pub mod ir;
pub mod memory;
pub mod pass;
pub mod target;

pub use analysis::{LiveInterval, Liveness, LivenessAnalysis};
pub use ir::{Graph, Module, NodeId, ValueId};
pub use memory::{MemAllocEntry, MemoryAllocation, OffsetAllocator};
pub use pass::{ModulePass, PassOutcome};
pub use target::{MemSize, SimDla, TargetBackend};
