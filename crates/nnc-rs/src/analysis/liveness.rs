use std::collections::HashMap;

use serde::Serialize;

use crate::ir::graph::{Graph, ValueId};
use crate::ir::spec::OpKind;

/// Half-open schedule range `[start, end)` during which a value's storage
/// must remain intact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LiveInterval {
    pub value: ValueId,
    pub start: u64,
    pub end: u64,
}

impl LiveInterval {
    pub fn new(value: ValueId, start: u64, end: u64) -> Self {
        debug_assert!(start < end, "live interval must be non-empty");
        Self { value, start, end }
    }

    /// Half-open overlap test.
    pub fn intersects(&self, other: &LiveInterval) -> bool {
        !(self.end <= other.start || other.end <= self.start)
    }
}

/// Liveness result: one interval per value touched by the schedule,
/// ordered by `start`, then `end`, then value id.
#[derive(Debug, Clone, Default)]
pub struct Liveness {
    intervals: Vec<LiveInterval>,
}

impl Liveness {
    pub fn intervals(&self) -> &[LiveInterval] {
        &self.intervals
    }

    pub fn interval_of(&self, value: ValueId) -> Option<&LiveInterval> {
        self.intervals.iter().find(|li| li.value == value)
    }
}

/// Computes live intervals over the linear schedule.
///
/// Positions follow the schedule index: graph inputs and initializer
/// outputs define at position 0, the node at schedule index `i` defines
/// its outputs at `i + 1`. A value's interval ends one past its last
/// reader; graph outputs stay live through the end of the schedule.
pub struct LivenessAnalysis;

impl LivenessAnalysis {
    pub fn run(graph: &Graph) -> Liveness {
        let mut starts: HashMap<ValueId, u64> = HashMap::new();
        let mut ends: HashMap<ValueId, u64> = HashMap::new();

        let position = |value: ValueId| -> u64 {
            match graph.value(value).producer {
                Some(producer) if graph.node(producer).kind != OpKind::Undefined => {
                    graph
                        .schedule_position(producer)
                        .map(|idx| idx as u64 + 1)
                        .unwrap_or(0)
                }
                _ => 0,
            }
        };

        for (idx, &node_id) in graph.order().iter().enumerate() {
            let node = graph.node(node_id);
            if node.kind == OpKind::Undefined {
                continue;
            }
            let pos = idx as u64 + 1;
            for &input in &node.inputs {
                let start = *starts.entry(input).or_insert_with(|| position(input));
                let end = ends.entry(input).or_insert(start + 1);
                *end = (*end).max(pos + 1);
            }
            for &output in &node.outputs {
                let start = *starts.entry(output).or_insert(pos);
                ends.entry(output).or_insert(start + 1);
            }
        }

        // Graph outputs survive to the end of the schedule.
        let schedule_end = graph.order().len() as u64 + 1;
        for &output in graph.outputs() {
            if let Some(end) = ends.get_mut(&output) {
                *end = (*end).max(schedule_end);
            }
        }

        let mut intervals: Vec<LiveInterval> = starts
            .into_iter()
            .map(|(value, start)| {
                let end = ends.get(&value).copied().unwrap_or(start + 1);
                LiveInterval::new(value, start, end)
            })
            .collect();
        intervals.sort_by_key(|li| (li.start, li.end, li.value));

        Liveness { intervals }
    }
}
