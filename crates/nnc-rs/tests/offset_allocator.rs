use nnc_rs::analysis::liveness::LiveInterval;
use nnc_rs::ir::graph::ValueId;
use nnc_rs::memory::OffsetAllocator;
use proptest::prelude::*;

fn li(value: u32, start: u64, end: u64) -> LiveInterval {
    LiveInterval::new(ValueId(value), start, end)
}

#[test]
fn disjoint_lives_share_the_same_offset() {
    let mut alloc = OffsetAllocator::new();
    let a = alloc.allocate(li(0, 0, 5), 100);
    let b = alloc.allocate(li(1, 5, 10), 100);
    assert_eq!(a, 0);
    assert_eq!(b, 0);
    assert_eq!(alloc.peak(), 100);
}

#[test]
fn overlapping_lives_stack() {
    let mut alloc = OffsetAllocator::new();
    let a = alloc.allocate(li(0, 0, 10), 100);
    let b = alloc.allocate(li(1, 2, 8), 50);
    assert_eq!(a, 0);
    assert_eq!(b, 100);
    assert_eq!(alloc.peak(), 150);
}

#[test]
fn first_fit_appends_after_the_last_conflict() {
    let mut alloc = OffsetAllocator::new();
    assert_eq!(alloc.allocate(li(0, 0, 10), 100), 0);
    assert_eq!(alloc.allocate(li(1, 0, 10), 50), 100);
    assert_eq!(alloc.allocate(li(2, 0, 10), 40), 150);
    assert_eq!(alloc.peak(), 190);

    assert_eq!(alloc.allocate(li(3, 0, 10), 30), 190);
    assert_eq!(alloc.peak(), 220);
}

#[test]
fn hole_is_reused_across_disjoint_lives() {
    let mut alloc = OffsetAllocator::new();
    assert_eq!(alloc.allocate(li(0, 0, 10), 100), 0);
    assert_eq!(alloc.allocate(li(1, 0, 10), 40), 100);
    assert_eq!(alloc.allocate(li(2, 20, 30), 40), 0);
    assert_eq!(alloc.peak(), 140);
}

#[test]
fn zero_sized_requests_never_conflict() {
    let mut alloc = OffsetAllocator::new();
    assert_eq!(alloc.allocate(li(0, 0, 10), 0), 0);
    assert_eq!(alloc.allocate(li(1, 0, 10), 64), 0);
    assert_eq!(alloc.peak(), 64);
}

fn requests() -> impl Strategy<Value = Vec<(u64, u64, u64)>> {
    prop::collection::vec((0u64..48, 1u64..16, 0u64..512), 0..40)
}

fn run_requests(reqs: &[(u64, u64, u64)]) -> OffsetAllocator {
    let mut alloc = OffsetAllocator::new();
    for (idx, &(start, len, size)) in reqs.iter().enumerate() {
        alloc.allocate(li(idx as u32, start, start + len), size);
    }
    alloc
}

fn byte_ranges_overlap(a_start: u64, a_size: u64, b_start: u64, b_size: u64) -> bool {
    !(a_start + a_size <= b_start || b_start + b_size <= a_start)
}

proptest! {
    /// Entries with intersecting live intervals never overlap in address
    /// space.
    #[test]
    fn prop_disjoint_under_overlap(reqs in requests()) {
        let alloc = run_requests(&reqs);
        let entries = alloc.entries();
        for (i, a) in entries.iter().enumerate() {
            for b in entries.iter().skip(i + 1) {
                if a.interval.intersects(&b.interval) {
                    prop_assert!(
                        !byte_ranges_overlap(a.start_addr, a.size, b.start_addr, b.size),
                        "{:?} and {:?} overlap",
                        a,
                        b
                    );
                }
            }
        }
    }

    /// Every entry keeps at least the requested size.
    #[test]
    fn prop_sufficient_size(reqs in requests()) {
        let alloc = run_requests(&reqs);
        for (entry, &(_, _, size)) in alloc.entries().iter().zip(&reqs) {
            prop_assert!(entry.size >= size);
        }
    }

    /// The reported peak equals the largest end address.
    #[test]
    fn prop_peak_is_max_end_address(reqs in requests()) {
        let alloc = run_requests(&reqs);
        let max_end = alloc
            .entries()
            .iter()
            .map(|e| e.start_addr + e.size)
            .max()
            .unwrap_or(0);
        prop_assert_eq!(alloc.peak(), max_end);
    }

    /// Same request order, same placement.
    #[test]
    fn prop_deterministic(reqs in requests()) {
        let first = run_requests(&reqs);
        let second = run_requests(&reqs);
        let lhs: Vec<_> = first.entries().iter().map(|e| (e.value, e.start_addr, e.size)).collect();
        let rhs: Vec<_> = second.entries().iter().map(|e| (e.value, e.start_addr, e.size)).collect();
        prop_assert_eq!(lhs, rhs);
    }
}
