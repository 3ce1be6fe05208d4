// Process tree walker and root set.
//
// The walk is recomputed from scratch every tick: descendants come and go, only
// the roots persist. The visited set lives for exactly one walk.

use crate::models::ProcessCounters;
use std::collections::HashSet;

/// What the walker needs from a process table snapshot.
pub trait ProcessView {
    /// Start time of `pid` if it is a live (non-zombie) process.
    fn start_time(&self, pid: u32) -> Option<u64>;

    /// Direct children of `pid`.
    fn children(&self, pid: u32) -> &[u32];

    /// Counters of `pid`, or `None` when they could not be collected
    /// (the process exited between enumeration and stat collection).
    fn counters(&self, pid: u32) -> Option<ProcessCounters>;
}

/// A tracked root. The start time guards against pid reuse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Root {
    pub pid: u32,
    pub start_time: Option<u64>,
}

impl Root {
    pub fn new(pid: u32) -> Self {
        Self {
            pid,
            start_time: None,
        }
    }

    fn is_running(&self, view: &impl ProcessView) -> bool {
        // A root never seen running has no identity to match against.
        match (view.start_time(self.pid), self.start_time) {
            (Some(now), Some(seen)) => now == seen,
            _ => false,
        }
    }
}

/// Roots of a process set. Only ever shrinks.
#[derive(Debug, Default)]
pub struct RootSet {
    roots: Vec<Root>,
}

impl RootSet {
    /// Builds the set, ignoring duplicate pids.
    pub fn new(pids: impl IntoIterator<Item = u32>) -> Self {
        let mut roots: Vec<Root> = Vec::new();
        for pid in pids {
            if !roots.iter().any(|r| r.pid == pid) {
                roots.push(Root::new(pid));
            }
        }
        Self { roots }
    }

    /// Records every root's start time from `view`. A root missing from `view`
    /// stays unpinned and is dropped by the next [`prune`](Self::prune).
    pub fn pin_start_times(&mut self, view: &impl ProcessView) {
        for root in &mut self.roots {
            root.start_time = view.start_time(root.pid);
        }
    }

    /// Drops every root that is no longer running and returns the dropped pids.
    pub fn prune(&mut self, view: &impl ProcessView) -> Vec<u32> {
        let mut dropped = Vec::new();
        self.roots.retain(|root| {
            let running = root.is_running(view);
            if !running {
                dropped.push(root.pid);
            }
            running
        });
        dropped
    }

    /// Removes a root whose exit is known without a table lookup (a reaped child).
    pub fn remove(&mut self, pid: u32) -> bool {
        let before = self.roots.len();
        self.roots.retain(|r| r.pid != pid);
        self.roots.len() != before
    }

    pub fn pids(&self) -> impl Iterator<Item = u32> + '_ {
        self.roots.iter().map(|r| r.pid)
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }
}

/// Sums the counters of every live process reachable from `roots`, each pid once.
pub fn aggregate(view: &impl ProcessView, roots: impl IntoIterator<Item = u32>) -> ProcessCounters {
    let mut visited: HashSet<u32> = HashSet::new();
    let mut total = ProcessCounters::default();
    let mut stack: Vec<u32> = Vec::new();

    for root in roots {
        stack.push(root);
        while let Some(pid) = stack.pop() {
            if !visited.insert(pid) {
                continue;
            }
            if let Some(counters) = view.counters(pid) {
                total += counters;
            }
            stack.extend(view.children(pid).iter().rev().copied());
        }
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Default)]
    struct FakeTable {
        start: HashMap<u32, u64>,
        children: HashMap<u32, Vec<u32>>,
        counters: HashMap<u32, ProcessCounters>,
    }

    impl FakeTable {
        fn add(&mut self, pid: u32, parent: Option<u32>, threads: u64) -> &mut Self {
            self.start.insert(pid, 1_000 + pid as u64);
            if let Some(p) = parent {
                self.children.entry(p).or_default().push(pid);
            }
            self.counters.insert(
                pid,
                ProcessCounters {
                    threads,
                    rss_bytes: 1024 * threads,
                    cpu_percent: 1.5,
                    ..Default::default()
                },
            );
            self
        }
    }

    impl ProcessView for FakeTable {
        fn start_time(&self, pid: u32) -> Option<u64> {
            self.start.get(&pid).copied()
        }
        fn children(&self, pid: u32) -> &[u32] {
            self.children.get(&pid).map(Vec::as_slice).unwrap_or(&[])
        }
        fn counters(&self, pid: u32) -> Option<ProcessCounters> {
            self.counters.get(&pid).copied()
        }
    }

    #[test]
    fn aggregate_walks_descendants() {
        let mut t = FakeTable::default();
        t.add(10, None, 1).add(11, Some(10), 2).add(12, Some(11), 4);
        let total = aggregate(&t, [10]);
        assert_eq!(total.threads, 7);
        assert!((total.cpu_percent - 4.5).abs() < 1e-9);
    }

    #[test]
    fn parent_and_child_roots_count_once() {
        let mut t = FakeTable::default();
        t.add(10, None, 3).add(11, Some(10), 5);
        assert_eq!(aggregate(&t, [10, 11]).threads, 8);
        assert_eq!(aggregate(&t, [11, 10]).threads, 8);
    }

    #[test]
    fn diamond_reachable_pid_counts_once() {
        // 20 is a child of both 1 and 2 in the (inconsistent) snapshot.
        let mut t = FakeTable::default();
        t.add(1, None, 1).add(2, None, 1).add(20, Some(1), 10);
        t.children.entry(2).or_default().push(20);
        assert_eq!(aggregate(&t, [1, 2]).threads, 12);
    }

    #[test]
    fn vanished_process_contributes_nothing_but_children_are_walked() {
        let mut t = FakeTable::default();
        t.add(10, None, 1).add(11, Some(10), 2).add(12, Some(11), 4);
        t.counters.remove(&11);
        assert_eq!(aggregate(&t, [10]).threads, 5);
    }

    #[test]
    fn empty_roots_aggregate_to_zero() {
        let t = FakeTable::default();
        assert_eq!(aggregate(&t, std::iter::empty()), ProcessCounters::default());
    }

    #[test]
    fn prune_drops_dead_roots_for_good() {
        let mut t = FakeTable::default();
        t.add(10, None, 1).add(11, None, 1);
        let mut roots = RootSet::new([10, 11, 10]);
        roots.pin_start_times(&t);
        assert_eq!(roots.len(), 2);

        t.start.remove(&11);
        assert_eq!(roots.prune(&t), vec![11]);
        assert_eq!(roots.pids().collect::<Vec<_>>(), vec![10]);

        // pid 11 comes back (reused); it must not rejoin the set.
        t.add(11, None, 1);
        assert!(roots.prune(&t).is_empty());
        assert_eq!(roots.len(), 1);
    }

    #[test]
    fn reused_pid_is_not_running() {
        let mut t = FakeTable::default();
        t.add(10, None, 1);
        let mut roots = RootSet::new([10]);
        roots.pin_start_times(&t);
        t.start.insert(10, 99_999);
        assert_eq!(roots.prune(&t), vec![10]);
        assert!(roots.is_empty());
    }

    #[test]
    fn root_absent_at_pinning_is_never_adopted() {
        let mut t = FakeTable::default();
        t.add(10, None, 1);
        let mut roots = RootSet::new([10, 42]);
        roots.pin_start_times(&t);

        // 42 shows up after the roots were pinned.
        t.add(42, None, 3);
        assert_eq!(roots.prune(&t), vec![42]);
        assert_eq!(roots.pids().collect::<Vec<_>>(), vec![10]);
        assert_eq!(aggregate(&t, roots.pids()).threads, 1);
    }

    #[test]
    fn remove_reports_membership() {
        let mut roots = RootSet::new([5, 6]);
        assert!(roots.remove(5));
        assert!(!roots.remove(5));
        assert_eq!(roots.len(), 1);
    }
}
