use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ir::spec::{NodeAttrs, OpKind, Shape, TensorSpec};

/// Unique identifier for a value edge in a graph.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ValueId(pub u32);

/// Unique identifier for an operator node in a graph.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct NodeId(pub u32);

/// One consuming edge: `node` reads the value as operand `operand`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Use {
    pub node: NodeId,
    pub operand: usize,
}

/// A typed tensor edge between nodes, identified by a stable name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Value {
    pub name: String,
    pub spec: TensorSpec,
    pub producer: Option<NodeId>,
    /// Consuming edges. Derived state, rebuilt after deserialization.
    #[serde(skip)]
    uses: Vec<Use>,
}

impl Value {
    pub fn uses(&self) -> &[Use] {
        &self.uses
    }
}

/// An operator with a kind tag, operand lists, and a kind-specific
/// attribute bag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub kind: OpKind,
    pub attrs: NodeAttrs,
    pub inputs: Vec<ValueId>,
    pub outputs: Vec<ValueId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("value {value:?} is read by node {node:?} before it is defined")]
    UseBeforeDef { value: ValueId, node: NodeId },
    #[error("node {0:?} is scheduled more than once")]
    DuplicateSchedule(NodeId),
}

/// Computation graph: node and value arenas plus a topological schedule.
///
/// Nodes and values are addressed by index ids; forward references
/// (operand lists) and back references (use lists) are kept in sync by
/// the mutation API.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Graph {
    values: Vec<Value>,
    nodes: Vec<Node>,
    order: Vec<NodeId>,
    inputs: Vec<ValueId>,
    outputs: Vec<ValueId>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(&self, id: ValueId) -> &Value {
        &self.values[id.0 as usize]
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0 as usize]
    }

    pub fn inputs(&self) -> &[ValueId] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[ValueId] {
        &self.outputs
    }

    /// Nodes in schedule order.
    pub fn order(&self) -> &[NodeId] {
        &self.order
    }

    pub fn uses(&self, value: ValueId) -> &[Use] {
        &self.values[value.0 as usize].uses
    }

    pub fn value_count(&self) -> usize {
        self.values.len()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Registers a fresh value with no producer.
    pub fn add_value(&mut self, name: impl Into<String>, spec: TensorSpec) -> ValueId {
        let id = ValueId(self.values.len() as u32);
        self.values.push(Value {
            name: name.into(),
            spec,
            producer: None,
            uses: Vec::new(),
        });
        id
    }

    /// Registers a graph input value.
    pub fn add_input(&mut self, name: impl Into<String>, spec: TensorSpec) -> ValueId {
        let id = self.add_value(name, spec);
        self.inputs.push(id);
        id
    }

    /// Marks an existing value as a graph output.
    pub fn mark_output(&mut self, value: ValueId) {
        self.outputs.push(value);
    }

    /// Appends a node to the schedule, creating its output values.
    pub fn add_node(
        &mut self,
        kind: OpKind,
        attrs: NodeAttrs,
        inputs: &[ValueId],
        outputs: Vec<(String, TensorSpec)>,
    ) -> NodeId {
        let id = self.create_node(kind, attrs, inputs.to_vec(), outputs);
        self.order.push(id);
        id
    }

    /// Creates a node without scheduling it; pair with [`Graph::insert_before`]
    /// or [`Graph::append`].
    pub fn create_node(
        &mut self,
        kind: OpKind,
        attrs: NodeAttrs,
        inputs: Vec<ValueId>,
        outputs: Vec<(String, TensorSpec)>,
    ) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        for (operand, &input) in inputs.iter().enumerate() {
            self.values[input.0 as usize].uses.push(Use { node: id, operand });
        }
        let output_ids = outputs
            .into_iter()
            .map(|(name, spec)| {
                let vid = self.add_value(name, spec);
                self.values[vid.0 as usize].producer = Some(id);
                vid
            })
            .collect();
        self.nodes.push(Node {
            kind,
            attrs,
            inputs,
            outputs: output_ids,
        });
        id
    }

    /// Splices `node` into the schedule immediately before `anchor`.
    /// An unscheduled anchor degrades to appending at the end.
    pub fn insert_before(&mut self, node: NodeId, anchor: NodeId) {
        match self.schedule_position(anchor) {
            Some(pos) => self.order.insert(pos, node),
            None => self.order.push(node),
        }
    }

    /// Appends `node` at the end of the schedule.
    pub fn append(&mut self, node: NodeId) {
        self.order.push(node);
    }

    pub fn schedule_position(&self, node: NodeId) -> Option<usize> {
        self.order.iter().position(|&n| n == node)
    }

    /// Program-order predicate over the topological schedule.
    pub fn is_before(&self, a: NodeId, b: NodeId) -> bool {
        matches!(
            (self.schedule_position(a), self.schedule_position(b)),
            (Some(pa), Some(pb)) if pa < pb
        )
    }

    /// Redirects every use of `old` to `new`, keeping use lists in sync.
    pub fn replace_all_uses(&mut self, old: ValueId, new: ValueId) {
        let moved = std::mem::take(&mut self.values[old.0 as usize].uses);
        for edge in &moved {
            self.nodes[edge.node.0 as usize].inputs[edge.operand] = new;
        }
        self.values[new.0 as usize].uses.extend(moved);
    }

    /// Overwrites a value's shape; element type is preserved.
    pub fn set_value_shape(&mut self, value: ValueId, shape: Shape) {
        self.values[value.0 as usize].spec.shape = shape;
    }

    /// Rebuilds use lists from operand lists (after deserialization).
    pub fn rebuild_uses(&mut self) {
        for value in &mut self.values {
            value.uses.clear();
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            let id = NodeId(idx as u32);
            for (operand, &input) in node.inputs.iter().enumerate() {
                self.values[input.0 as usize].uses.push(Use { node: id, operand });
            }
        }
    }

    /// Checks that every operand is defined before its reader in the
    /// schedule.
    pub fn validate(&self) -> Result<(), GraphError> {
        let mut defined = vec![false; self.values.len()];
        for &input in &self.inputs {
            defined[input.0 as usize] = true;
        }
        let mut seen = vec![false; self.nodes.len()];
        for &node_id in &self.order {
            if std::mem::replace(&mut seen[node_id.0 as usize], true) {
                return Err(GraphError::DuplicateSchedule(node_id));
            }
            let node = self.node(node_id);
            for &input in &node.inputs {
                if !defined[input.0 as usize] {
                    return Err(GraphError::UseBeforeDef {
                        value: input,
                        node: node_id,
                    });
                }
            }
            for &output in &node.outputs {
                defined[output.0 as usize] = true;
            }
        }
        Ok(())
    }
}

impl fmt::Display for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "graph {{")?;
        if !self.inputs.is_empty() {
            writeln!(f, "  inputs:")?;
            for &input in &self.inputs {
                let value = self.value(input);
                writeln!(f, "    %{}: {}", value.name, value.spec)?;
            }
        }
        if !self.order.is_empty() {
            writeln!(f, "  body:")?;
            for &node_id in &self.order {
                let node = self.node(node_id);
                let outs = node
                    .outputs
                    .iter()
                    .map(|&v| format!("%{}", self.value(v).name))
                    .collect::<Vec<_>>()
                    .join(", ");
                let ins = node
                    .inputs
                    .iter()
                    .map(|&v| format!("%{}", self.value(v).name))
                    .collect::<Vec<_>>()
                    .join(", ");
                if outs.is_empty() {
                    writeln!(f, "    {}({})", node.kind, ins)?;
                } else {
                    writeln!(f, "    {} = {}({})", outs, node.kind, ins)?;
                }
            }
        }
        if !self.outputs.is_empty() {
            writeln!(f, "  outputs:")?;
            for &output in &self.outputs {
                let value = self.value(output);
                writeln!(f, "    %{}: {}", value.name, value.spec)?;
            }
        }
        writeln!(f, "}}")
    }
}

#[derive(Debug, Error)]
pub enum ModuleSerdeError {
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ModuleIoError {
    #[error(transparent)]
    Serialization(#[from] ModuleSerdeError),
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

/// Compilation unit holding exactly one graph.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Module {
    pub graph: Graph,
}

impl Module {
    pub fn new(graph: Graph) -> Self {
        Self { graph }
    }

    pub fn to_json_string(&self) -> Result<String, ModuleSerdeError> {
        serde_json::to_string_pretty(self).map_err(ModuleSerdeError::from)
    }

    pub fn from_json_str(src: &str) -> Result<Self, ModuleSerdeError> {
        let mut module: Module = serde_json::from_str(src).map_err(ModuleSerdeError::from)?;
        module.graph.rebuild_uses();
        Ok(module)
    }

    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<(), ModuleIoError> {
        let contents = self.to_json_string()?;
        fs::write(path, contents).map_err(ModuleIoError::from)
    }

    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self, ModuleIoError> {
        let contents = fs::read_to_string(path).map_err(ModuleIoError::from)?;
        Module::from_json_str(&contents).map_err(ModuleIoError::from)
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.graph, f)
    }
}
