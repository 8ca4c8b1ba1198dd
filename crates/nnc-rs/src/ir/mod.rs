//! Compute-graph IR: tensor metadata, operator nodes, and the module
//! container the passes operate on.

pub mod graph;
pub mod spec;

pub use graph::{Graph, GraphError, Module, ModuleIoError, Node, NodeId, Use, Value, ValueId};
pub use spec::{
    ConvAttrs, DType, Dims, GemmAttrs, NodeAttrs, OpKind, PoolAttrs, Shape, TensorSpec,
};
