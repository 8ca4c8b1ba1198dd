use crate::ir::graph::{Graph, NodeId, ValueId};
use crate::ir::spec::{NodeAttrs, OpKind};

/// Splices `Load`/`Store` pseudo-nodes at the graph boundary so that all
/// later stages see explicit DMA points.
///
/// Every graph input gets a `Load` before its first reader, with one
/// output inheriting the input's metadata; all readers are redirected to
/// the `Load` output. Every graph output gets a `Store` reading it,
/// placed before its last reader, or at the end of the schedule when
/// nothing reads it. Running the pass again inserts nothing: redirected
/// inputs have no remaining uses, and stored outputs are detected by
/// kind.
///
/// Returns the number of nodes inserted.
pub fn insert_load_store(graph: &mut Graph) -> usize {
    let mut inserted = 0;

    for input in graph.inputs().to_vec() {
        let Some(first) = first_use(graph, input) else {
            continue;
        };
        let value = graph.value(input);
        let name = format!("{}.local", value.name);
        let spec = value.spec.clone();
        let load = graph.create_node(OpKind::Load, NodeAttrs::None, Vec::new(), vec![(name, spec)]);
        graph.insert_before(load, first);
        let local = graph.node(load).outputs[0];
        graph.replace_all_uses(input, local);
        inserted += 1;
    }

    for output in graph.outputs().to_vec() {
        let stored = graph
            .uses(output)
            .iter()
            .any(|edge| graph.node(edge.node).kind == OpKind::Store);
        if stored {
            continue;
        }
        let last = last_use(graph, output);
        let store = graph.create_node(OpKind::Store, NodeAttrs::None, vec![output], Vec::new());
        match last {
            Some(anchor) => graph.insert_before(store, anchor),
            None => graph.append(store),
        }
        inserted += 1;
    }

    inserted
}

/// Earliest reader in program order; ties keep the first one encountered.
fn first_use(graph: &Graph, value: ValueId) -> Option<NodeId> {
    let mut first: Option<NodeId> = None;
    for edge in graph.uses(value) {
        match first {
            None => first = Some(edge.node),
            Some(node) if graph.is_before(edge.node, node) => first = Some(edge.node),
            Some(_) => {}
        }
    }
    first
}

/// Latest reader in program order; ties keep the first one encountered.
fn last_use(graph: &Graph, value: ValueId) -> Option<NodeId> {
    let mut last: Option<NodeId> = None;
    for edge in graph.uses(value) {
        match last {
            None => last = Some(edge.node),
            Some(node) if graph.is_before(node, edge.node) => last = Some(edge.node),
            Some(_) => {}
        }
    }
    last
}
