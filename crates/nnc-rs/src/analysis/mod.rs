//! Graph analyses consumed by the transformation passes.

pub mod liveness;

pub use liveness::{LiveInterval, Liveness, LivenessAnalysis};
