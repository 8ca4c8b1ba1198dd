use serde::Serialize;

use crate::analysis::liveness::LiveInterval;
use crate::ir::graph::ValueId;

/// Transient conflict record: an already-placed byte range.
#[derive(Debug, Clone, Copy)]
struct MemRegion {
    start: u64,
    size: u64,
}

/// One placement decision.
///
/// Entries from the same run never overlap in address space while their
/// live intervals overlap in time.
#[derive(Debug, Clone, Serialize)]
pub struct MemAllocEntry {
    pub value: ValueId,
    pub start_addr: u64,
    pub size: u64,
    pub interval: LiveInterval,
}

/// Half-open overlap test on byte ranges.
fn has_conflict(start_a: u64, size_a: u64, start_b: u64, size_b: u64) -> bool {
    let end_a = start_a + size_a;
    let end_b = start_b + size_b;
    !(end_a <= start_b || end_b <= start_a)
}

/// Liveness-aware first-fit placement.
///
/// Values are placed one at a time in the order supplied by the liveness
/// analysis. For each request, the entries whose live intervals intersect
/// the request form the conflict set; the request lands in the first gap
/// between conflicts (sorted by address) that is large enough. One linear
/// scan, no backtracking; placement never fails.
#[derive(Debug, Default)]
pub struct OffsetAllocator {
    entries: Vec<MemAllocEntry>,
    peak: u64,
}

impl OffsetAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Places `size` bytes for `interval` and returns the start address.
    pub fn allocate(&mut self, interval: LiveInterval, size: u64) -> u64 {
        let mut conflicts: Vec<MemRegion> = self
            .entries
            .iter()
            .filter(|entry| entry.interval.intersects(&interval))
            .map(|entry| MemRegion {
                start: entry.start_addr,
                size: entry.size,
            })
            .collect();
        conflicts.sort_by_key(|region| region.start);

        let mut cursor = 0u64;
        for region in &conflicts {
            if !has_conflict(region.start, region.size, cursor, size) {
                break;
            }
            cursor = region.start + region.size;
        }

        self.entries.push(MemAllocEntry {
            value: interval.value,
            start_addr: cursor,
            size,
            interval,
        });
        self.peak = self.peak.max(cursor + size);
        cursor
    }

    /// Largest `start_addr + size` reached so far; the tightest arena
    /// size this placement achieved.
    pub fn peak(&self) -> u64 {
        self.peak
    }

    pub fn entries(&self) -> &[MemAllocEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<MemAllocEntry> {
        self.entries
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.peak = 0;
    }
}
