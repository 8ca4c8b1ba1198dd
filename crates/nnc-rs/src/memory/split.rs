use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use thiserror::Error;

use crate::ir::graph::{Graph, NodeId};
use crate::ir::spec::{Dims, OpKind, Shape};

/// Kinds whose required input tile equals the output tile. Built once at
/// driver init and never mutated.
static INPUT_SIZE_IS_OUTPUT_SIZE: Lazy<HashSet<OpKind>> = Lazy::new(|| {
    [
        OpKind::Relu,
        OpKind::Sigmoid,
        OpKind::Lrn,
        OpKind::BatchNormalization,
        OpKind::Softmax,
        OpKind::Dropout,
        OpKind::Sum,
        OpKind::Load,
        OpKind::Store,
    ]
    .into_iter()
    .collect()
});

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SplitError {
    #[error("no tiling rule for operator kind {0}")]
    UnsupportedKind(OpKind),
    #[error("operator kind {0} is missing its attributes")]
    MissingAttributes(OpKind),
    #[error("node {0:?} has no split descriptor")]
    MissingDescriptor(NodeId),
}

/// Per-kind rule mapping an output tile to required input tiles.
///
/// Variants capture the original input shapes they need at build time;
/// the graph's shape metadata is mutated while the driver runs, but the
/// formulas are defined over the shapes the frontend produced.
#[derive(Debug, Clone)]
enum SplitRule {
    /// Input size equals output size.
    Identity,
    Conv {
        kernel_shape: Dims,
        strides: Dims,
        pad_begin: Dims,
        pad_end: Dims,
        x_dims: Dims,
        w_dims: Dims,
    },
    MaxPool {
        kernel_shape: Dims,
        strides: Dims,
        pad_begin: Dims,
        pad_end: Dims,
        x_rank: usize,
    },
    Gemm {
        trans_a: bool,
        trans_b: bool,
        a_dims: Dims,
        c_dims: Option<Dims>,
    },
    /// Treated as identity on the flattened element count; a rank change
    /// makes the producer reject the tile and aborts the walk.
    Reshape,
}

/// Tile descriptor for one node: the original output shape and the tile
/// currently applied to it.
#[derive(Debug, Clone)]
pub struct SplitNode {
    rule: SplitRule,
    out_dims: Dims,
    new_out_dims: Dims,
}

impl SplitNode {
    fn build(graph: &Graph, node_id: NodeId) -> Result<Self, SplitError> {
        let node = graph.node(node_id);
        let out_dims: Dims = node
            .outputs
            .first()
            .map(|&out| Dims::from_slice(graph.value(out).spec.shape.dims()))
            .unwrap_or_default();

        let rule = if INPUT_SIZE_IS_OUTPUT_SIZE.contains(&node.kind) {
            SplitRule::Identity
        } else {
            match node.kind {
                OpKind::Conv => {
                    let attrs = node
                        .attrs
                        .conv()
                        .ok_or(SplitError::MissingAttributes(node.kind))?;
                    let (pad_begin, pad_end) = split_pads(&attrs.pads);
                    SplitRule::Conv {
                        kernel_shape: attrs.kernel_shape.clone(),
                        strides: attrs.strides.clone(),
                        pad_begin,
                        pad_end,
                        x_dims: Dims::from_slice(graph.value(node.inputs[0]).spec.shape.dims()),
                        w_dims: Dims::from_slice(graph.value(node.inputs[1]).spec.shape.dims()),
                    }
                }
                OpKind::MaxPool => {
                    let attrs = node
                        .attrs
                        .pool()
                        .ok_or(SplitError::MissingAttributes(node.kind))?;
                    let (pad_begin, pad_end) = split_pads(&attrs.pads);
                    SplitRule::MaxPool {
                        kernel_shape: attrs.kernel_shape.clone(),
                        strides: attrs.strides.clone(),
                        pad_begin,
                        pad_end,
                        x_rank: graph.value(node.inputs[0]).spec.shape.rank(),
                    }
                }
                OpKind::Gemm => {
                    let attrs = node
                        .attrs
                        .gemm()
                        .ok_or(SplitError::MissingAttributes(node.kind))?;
                    SplitRule::Gemm {
                        trans_a: attrs.trans_a,
                        trans_b: attrs.trans_b,
                        a_dims: Dims::from_slice(graph.value(node.inputs[0]).spec.shape.dims()),
                        c_dims: node
                            .inputs
                            .get(2)
                            .map(|&c| Dims::from_slice(graph.value(c).spec.shape.dims())),
                    }
                }
                OpKind::Reshape => SplitRule::Reshape,
                kind => return Err(SplitError::UnsupportedKind(kind)),
            }
        };

        Ok(Self {
            rule,
            new_out_dims: out_dims.clone(),
            out_dims,
        })
    }

    /// Accepts a new output tile. Rejects rank changes, zero extents, and
    /// extents larger than the original output.
    fn use_new_out_dims(&mut self, dims: &[u64]) -> bool {
        if dims.len() != self.out_dims.len() {
            return false;
        }
        if dims
            .iter()
            .zip(&self.out_dims)
            .any(|(new, orig)| *new == 0 || new > orig)
        {
            return false;
        }
        self.new_out_dims = Dims::from_slice(dims);
        true
    }

    pub fn new_out_dims(&self) -> &[u64] {
        &self.new_out_dims
    }

    /// Required tile for input `idx`, derived from the current output
    /// tile. Indices outside the operator's signature are programmer
    /// errors.
    pub fn input_tile(&self, idx: usize) -> Dims {
        match &self.rule {
            SplitRule::Identity | SplitRule::Reshape => self.new_out_dims.clone(),
            SplitRule::Conv {
                kernel_shape,
                strides,
                pad_begin,
                pad_end,
                x_dims,
                w_dims,
            } => {
                // Conv operands:
                //   0  x: N x C x D1 .. Dn
                //   1  w: M x C x k1 .. kn
                //   2  B: M (optional)
                // Output: N x M x [(D1 - k1 + b1 + e1)/s1 + 1] x ..
                match idx {
                    0 => {
                        let spatial = x_dims.len() - 2;
                        let mut tile = Dims::with_capacity(x_dims.len());
                        tile.push(self.new_out_dims[0]);
                        tile.push(x_dims[1]);
                        for axis in 0..spatial {
                            tile.push(receptive_extent(
                                self.new_out_dims[axis + 2],
                                strides[axis],
                                pad_begin[axis],
                                pad_end[axis],
                                kernel_shape[axis],
                            ));
                        }
                        tile
                    }
                    1 => {
                        let mut tile = Dims::with_capacity(w_dims.len());
                        tile.push(self.new_out_dims[1]);
                        tile.extend(w_dims.iter().skip(1).copied());
                        tile
                    }
                    2 => Dims::from_slice(&[self.new_out_dims[1]]),
                    _ => panic!("conv tile rule: invalid input index {idx}"),
                }
            }
            SplitRule::MaxPool {
                kernel_shape,
                strides,
                pad_begin,
                pad_end,
                x_rank,
            } => {
                assert!(idx == 0, "pool tile rule: invalid input index {idx}");
                let spatial = x_rank - 2;
                let mut tile = Dims::with_capacity(*x_rank);
                tile.push(self.new_out_dims[0]);
                tile.push(self.new_out_dims[1]);
                for axis in 0..spatial {
                    tile.push(receptive_extent(
                        self.new_out_dims[axis + 2],
                        strides[axis],
                        pad_begin[axis],
                        pad_end[axis],
                        kernel_shape[axis],
                    ));
                }
                tile
            }
            SplitRule::Gemm {
                trans_a,
                trans_b,
                a_dims,
                c_dims,
            } => {
                // Gemm operands: A (M x K), B (K x N), C (M x N).
                let k = if *trans_a { a_dims[0] } else { a_dims[1] };
                match idx {
                    0 => {
                        if *trans_a {
                            Dims::from_slice(&[k, self.new_out_dims[0]])
                        } else {
                            Dims::from_slice(&[self.new_out_dims[0], k])
                        }
                    }
                    1 => {
                        if *trans_b {
                            Dims::from_slice(&[self.new_out_dims[1], k])
                        } else {
                            Dims::from_slice(&[k, self.new_out_dims[1]])
                        }
                    }
                    // C keeps its original extents; tiling the bias is a
                    // conservative over-approximation.
                    2 => c_dims.clone().unwrap_or_default(),
                    _ => panic!("gemm tile rule: invalid input index {idx}"),
                }
            }
        }
    }
}

/// `(O - 1) * stride - pad_begin - pad_end + kernel`, clamped at zero;
/// zero extents are rejected when applied to the producer.
fn receptive_extent(out: u64, stride: u64, pad_begin: u64, pad_end: u64, kernel: u64) -> u64 {
    let extent = (out as i64 - 1) * stride as i64 - pad_begin as i64 - pad_end as i64
        + kernel as i64;
    extent.max(0) as u64
}

/// Splits `[b1 .. bn, e1 .. en]` into begin and end halves.
fn split_pads(pads: &Dims) -> (Dims, Dims) {
    let half = pads.len() / 2;
    (
        Dims::from_slice(&pads[..half]),
        Dims::from_slice(&pads[half..]),
    )
}

/// Greedy backward tiling over a whole graph.
///
/// Holds one descriptor per non-`Undefined` node for the duration of a
/// tiling attempt; descriptors are dropped when the planner goes out of
/// scope.
#[derive(Debug)]
pub struct SplitPlanner {
    descriptors: HashMap<NodeId, SplitNode>,
    visited: HashSet<NodeId>,
}

impl SplitPlanner {
    /// Builds a descriptor for every non-`Undefined` node. Fails on the
    /// first operator kind without a tiling rule.
    pub fn build(graph: &Graph) -> Result<Self, SplitError> {
        let mut descriptors = HashMap::new();
        for &node_id in graph.order() {
            if graph.node(node_id).kind == OpKind::Undefined {
                continue;
            }
            descriptors.insert(node_id, SplitNode::build(graph, node_id)?);
        }
        Ok(Self {
            descriptors,
            visited: HashSet::new(),
        })
    }

    pub fn descriptor(&self, node: NodeId) -> Option<&SplitNode> {
        self.descriptors.get(&node)
    }

    /// Divides `axis` of the node's original output by `factor` (rounding
    /// up) and propagates the tile toward the graph inputs.
    pub fn split_node_by_factor(
        &mut self,
        graph: &mut Graph,
        node: NodeId,
        axis: usize,
        factor: u64,
    ) -> Result<bool, SplitError> {
        let descriptor = self
            .descriptors
            .get(&node)
            .ok_or(SplitError::MissingDescriptor(node))?;
        let mut dims = descriptor.out_dims.clone();
        dims[axis] = dims[axis].div_ceil(factor);
        self.split_node_by_size(graph, node, &dims)
    }

    /// Applies `new_out` as the node's output tile, then recursively
    /// derives and applies the required tile of every producing node.
    ///
    /// Each node is recursed through at most once per planner; a node
    /// reached again still has its tile updated, but the walk below it is
    /// not repeated. Returns `false` as soon as any rule rejects its
    /// tile; earlier shape updates are left in place.
    pub fn split_node_by_size(
        &mut self,
        graph: &mut Graph,
        node: NodeId,
        new_out: &[u64],
    ) -> Result<bool, SplitError> {
        let descriptor = self
            .descriptors
            .get_mut(&node)
            .ok_or(SplitError::MissingDescriptor(node))?;
        if !descriptor.use_new_out_dims(new_out) {
            return Ok(false);
        }
        if let Some(&out) = graph.node(node).outputs.first() {
            graph.set_value_shape(out, Shape::of(new_out));
        }

        if !self.visited.insert(node) {
            return Ok(true);
        }

        let inputs = graph.node(node).inputs.clone();
        let mut status = true;
        for (idx, &input) in inputs.iter().enumerate() {
            let Some(producer) = graph.value(input).producer else {
                continue;
            };
            if graph.node(producer).kind == OpKind::Undefined {
                continue;
            }
            let tile = self
                .descriptors
                .get(&node)
                .ok_or(SplitError::MissingDescriptor(node))?
                .input_tile(idx);
            status &= self.split_node_by_size(graph, producer, &tile)?;
        }
        Ok(status)
    }
}

/// Tiling driver: halves the leading axis of every graph output and
/// back-propagates the required tiles. Best-effort; returns `Ok(false)`
/// when some rule rejected its tile, `Err` when a node has no rule at
/// all.
pub fn try_split_graph(graph: &mut Graph, axis: usize, factor: u64) -> Result<bool, SplitError> {
    let mut planner = SplitPlanner::build(graph)?;
    let mut status = true;
    for output in graph.outputs().to_vec() {
        if let Some(producer) = graph.value(output).producer {
            status &= planner.split_node_by_factor(graph, producer, axis, factor)?;
        }
    }
    Ok(status)
}
