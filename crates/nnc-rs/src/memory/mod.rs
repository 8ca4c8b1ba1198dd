//! Static memory allocation for scratchpad DLA targets.
//!
//! The pass assigns every live value a byte offset inside one contiguous
//! local-memory arena. Values whose live intervals do not overlap may
//! share storage, so the arena peak is usually far below the sum of all
//! footprints. Explicit `Load`/`Store` DMA points are spliced in first;
//! when the peak still exceeds the device's local memory, the tiling
//! driver shrinks operator output tiles and back-propagates the required
//! input shapes through the graph.

mod allocator;
mod split;
mod transfer;

pub use allocator::{MemAllocEntry, OffsetAllocator};
pub use split::{try_split_graph, SplitError, SplitNode, SplitPlanner};
pub use transfer::insert_load_store;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::analysis::liveness::LivenessAnalysis;
use crate::ir::graph::{Graph, Module, ValueId};
use crate::ir::spec::OpKind;
use crate::pass::{log_pass_stats, pass_stats_enabled, ModulePass, PassOutcome};
use crate::target::TargetBackend;

/// Serializable form of one placement record.
#[derive(Debug, Clone, Serialize)]
pub struct PlacementRecord {
    pub value: String,
    pub start_addr: u64,
    pub end_addr: u64,
    pub size: u64,
    pub live_start: u64,
    pub live_end: u64,
}

/// Static memory allocation pass.
///
/// Owns the placement list; it is cleared and rebuilt on every run so
/// re-invocation is safe. The pass reports `Unchanged` on success even
/// though `Load`/`Store` nodes are inserted and tile shapes may have
/// been rewritten; downstream consumers read the graph, not the outcome.
pub struct MemoryAllocation {
    backend: Option<Arc<dyn TargetBackend>>,
    entries: Vec<MemAllocEntry>,
    min_size: u64,
    max_size: u64,
}

impl MemoryAllocation {
    pub fn new(backend: Arc<dyn TargetBackend>) -> Self {
        Self {
            backend: Some(backend),
            entries: Vec::new(),
            min_size: 0,
            max_size: 0,
        }
    }

    /// Constructs the pass without a device description; `run` fails
    /// without touching the module.
    pub fn without_backend() -> Self {
        Self {
            backend: None,
            entries: Vec::new(),
            min_size: 0,
            max_size: 0,
        }
    }

    pub fn entries(&self) -> &[MemAllocEntry] {
        &self.entries
    }

    /// Tightest arena size the placement achieved.
    pub fn peak(&self) -> u64 {
        self.min_size
    }

    /// Sum of all individual footprints: the arena size if nothing were
    /// shared.
    pub fn worst_case(&self) -> u64 {
        self.max_size
    }

    /// The stdout summary: `Size req. Min = ..(.. mb) Max = ..(.. mb)`.
    pub fn summary(&self) -> String {
        format!(
            "Size req. Min = {}({} mb) Max = {}({} mb)",
            self.min_size,
            self.min_size as f32 / (1024.0 * 1024.0),
            self.max_size,
            self.max_size as f32 / (1024.0 * 1024.0),
        )
    }

    /// Writes one placement record per line:
    /// `<name>: [<start>, <end>) (total: <size>) [<live_start>, <live_end>]`.
    pub fn write_report<W: fmt::Write>(&self, graph: &Graph, out: &mut W) -> fmt::Result {
        for entry in &self.entries {
            writeln!(
                out,
                "{}: [{}, {}) (total: {}) [{}, {}]",
                graph.value(entry.value).name,
                entry.start_addr,
                entry.start_addr + entry.size,
                entry.size,
                entry.interval.start,
                entry.interval.end,
            )?;
        }
        Ok(())
    }

    pub fn report(&self, graph: &Graph) -> String {
        let mut out = String::new();
        self.write_report(graph, &mut out)
            .expect("string formatting cannot fail");
        out
    }

    /// Placement map as JSON, for external tooling.
    pub fn placement_json(&self, graph: &Graph) -> serde_json::Result<String> {
        let records: Vec<PlacementRecord> = self
            .entries
            .iter()
            .map(|entry| PlacementRecord {
                value: graph.value(entry.value).name.clone(),
                start_addr: entry.start_addr,
                end_addr: entry.start_addr + entry.size,
                size: entry.size,
                live_start: entry.interval.start,
                live_end: entry.interval.end,
            })
            .collect();
        serde_json::to_string_pretty(&records)
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.min_size = 0;
        self.max_size = 0;
    }
}

/// Per-value footprints for every operand touched by a non-`Undefined`
/// node.
fn gather_value_sizes(graph: &Graph, backend: &dyn TargetBackend) -> HashMap<ValueId, u64> {
    let mut sizes = HashMap::new();
    for &node_id in graph.order() {
        let node = graph.node(node_id);
        if node.kind == OpKind::Undefined {
            continue;
        }
        for &value in node.inputs.iter().chain(node.outputs.iter()) {
            sizes
                .entry(value)
                .or_insert_with(|| backend.value_memory_size(graph, value).size);
        }
    }
    sizes
}

impl ModulePass for MemoryAllocation {
    fn name(&self) -> &'static str {
        "memory-allocation"
    }

    fn run(&mut self, module: &mut Module) -> PassOutcome {
        let Some(backend) = self.backend.clone() else {
            eprintln!("no backend information that is needed for memory allocation");
            return PassOutcome::Failure;
        };

        self.clear();
        let graph = &mut module.graph;

        // Liveness is a prerequisite analysis: intervals describe the
        // schedule as the frontend produced it, before DMA points exist.
        let liveness = LivenessAnalysis::run(graph);
        let sizes = gather_value_sizes(graph, backend.as_ref());

        insert_load_store(graph);

        self.max_size = sizes.values().sum();

        let mut allocator = OffsetAllocator::new();
        for interval in liveness.intervals() {
            let required = sizes
                .get(&interval.value)
                .copied()
                .unwrap_or_else(|| backend.value_memory_size(graph, interval.value).size);
            allocator.allocate(*interval, required);
        }
        self.min_size = allocator.peak();
        self.entries = allocator.into_entries();

        if self.min_size > backend.local_mem_size() {
            if let Err(err) = try_split_graph(graph, 0, 2) {
                eprintln!("tiling aborted: {err}");
            }
        }

        println!("{}", self.summary());
        if pass_stats_enabled() {
            log_pass_stats(
                self.name(),
                PassOutcome::Unchanged,
                &format!(
                    "entries={} min={} max={}",
                    self.entries.len(),
                    self.min_size,
                    self.max_size
                ),
            );
        }

        PassOutcome::Unchanged
    }
}
