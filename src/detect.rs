//! Cycle detection over a [`BeliefStore`].
//!
//! Depth-first search with a scan-scoped `visited` set, a `recursion_stack` of the nodes on the
//! current path, and the ordered `path` itself. Reaching a node that is on the recursion stack
//! reports the suffix of `path` starting at that node as a cycle and abandons the branch.
//! Reaching a node that is visited but off the stack ends the branch silently.
//!
//! `visited` is never reset inside a scan, so a node explored once is not explored again from a
//! later seed. Overlapping cycles that share already-explored nodes can therefore go unreported
//! by a single scan; loop records depend on this exact reporting behavior.

use std::collections::BTreeSet;

use crate::{beliefbase::BeliefStore, properties::NodeId};

pub struct CycleDetector<'a> {
    store: &'a BeliefStore,
    visited: BTreeSet<NodeId>,
    recursion_stack: BTreeSet<NodeId>,
    path: Vec<NodeId>,
    reported: usize,
}

impl<'a> CycleDetector<'a> {
    pub fn new(store: &'a BeliefStore) -> Self {
        CycleDetector {
            store,
            visited: BTreeSet::new(),
            recursion_stack: BTreeSet::new(),
            path: Vec::new(),
            reported: 0,
        }
    }

    /// Full-graph scan: one fresh `visited`/`recursion_stack` for the whole scan, seeding a DFS
    /// from every not-yet-visited node in registration order. Returns the number of cycles
    /// handed to `on_cycle`.
    #[tracing::instrument(skip_all)]
    pub fn scan_all<F>(store: &'a BeliefStore, mut on_cycle: F) -> usize
    where
        F: FnMut(Vec<NodeId>),
    {
        if !store.is_cyclic() {
            tracing::debug!("[CycleDetector] graph of {} nodes is acyclic", store.len());
            return 0;
        }
        let mut detector = CycleDetector::new(store);
        for id in store.ids() {
            if !detector.visited.contains(id) {
                detector.visit(*id, &mut on_cycle);
            }
        }
        tracing::debug!(
            "[CycleDetector] full scan visited {} nodes, reported {} cycles",
            detector.visited.len(),
            detector.reported
        );
        detector.reported
    }

    /// Targeted scan: the same DFS seeded from `start` alone, with its own fresh state.
    #[tracing::instrument(skip_all)]
    pub fn scan_from<F>(store: &'a BeliefStore, start: NodeId, mut on_cycle: F) -> usize
    where
        F: FnMut(Vec<NodeId>),
    {
        let mut detector = CycleDetector::new(store);
        detector.visit(start, &mut on_cycle);
        tracing::debug!(
            "[CycleDetector] targeted scan from {start} reported {} cycles",
            detector.reported
        );
        detector.reported
    }

    /// Depth-first walk from `root`. Each frame holds a node on the current path and the index
    /// of the next child to try, so path length is bounded by the heap rather than the stack.
    fn visit<F>(&mut self, root: NodeId, on_cycle: &mut F)
    where
        F: FnMut(Vec<NodeId>),
    {
        if !self.enter(root, on_cycle) {
            return;
        }
        let store = self.store;
        let mut frames: Vec<(NodeId, usize)> = vec![(root, 0)];
        while let Some(frame) = frames.last_mut() {
            let (id, next) = *frame;
            match store.children(&id).get(next) {
                Some(child) => {
                    frame.1 += 1;
                    if self.enter(*child, on_cycle) {
                        frames.push((*child, 0));
                    }
                }
                None => {
                    frames.pop();
                    self.path.pop();
                    self.recursion_stack.remove(&id);
                }
            }
        }
    }

    /// Steps onto `id`. Returns true if `id` was unvisited and is now on the path; otherwise
    /// reports a cycle when `id` is already on the path.
    fn enter<F>(&mut self, id: NodeId, on_cycle: &mut F) -> bool
    where
        F: FnMut(Vec<NodeId>),
    {
        if self.recursion_stack.contains(&id) {
            if let Some(start) = self.path.iter().position(|step| *step == id) {
                self.reported += 1;
                on_cycle(self.path[start..].to_vec());
            }
            return false;
        }

        if !self.visited.insert(id) {
            return false;
        }

        self.recursion_stack.insert(id);
        self.path.push(id);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::properties::{BeliefNode, SourceType};
    use test_log::test;

    fn store_with(n: usize) -> (BeliefStore, Vec<NodeId>) {
        let mut store = BeliefStore::new();
        let ids = (0..n)
            .map(|i| store.insert(BeliefNode::new(format!("n{i}"), SourceType::AgentInput, [])))
            .collect();
        (store, ids)
    }

    fn collect_all(store: &BeliefStore) -> Vec<Vec<NodeId>> {
        let mut cycles = Vec::new();
        CycleDetector::scan_all(store, |cycle| cycles.push(cycle));
        cycles
    }

    fn collect_from(store: &BeliefStore, start: NodeId) -> Vec<Vec<NodeId>> {
        let mut cycles = Vec::new();
        CycleDetector::scan_from(store, start, |cycle| cycles.push(cycle));
        cycles
    }

    #[test]
    fn test_triangle_is_reported_once_in_path_order() {
        let (mut store, ids) = store_with(3);
        store.connect(&ids[0], &ids[1]).unwrap();
        store.connect(&ids[1], &ids[2]).unwrap();
        store.connect(&ids[2], &ids[0]).unwrap();

        let cycles = collect_all(&store);
        assert_eq!(cycles, vec![vec![ids[0], ids[1], ids[2]]]);

        // Seeding from the middle rotates the reported order.
        let cycles = collect_from(&store, ids[1]);
        assert_eq!(cycles, vec![vec![ids[1], ids[2], ids[0]]]);
    }

    #[test]
    fn test_cycle_suffix_excludes_tail() {
        // 0 -> 1 -> 2 -> 3 -> 1: the cycle is {1, 2, 3}, not the lead-in 0.
        let (mut store, ids) = store_with(4);
        store.connect(&ids[0], &ids[1]).unwrap();
        store.connect(&ids[1], &ids[2]).unwrap();
        store.connect(&ids[2], &ids[3]).unwrap();
        store.connect(&ids[3], &ids[1]).unwrap();

        let cycles = collect_all(&store);
        assert_eq!(cycles, vec![vec![ids[1], ids[2], ids[3]]]);
    }

    #[test]
    fn test_self_edge_is_a_single_member_cycle() {
        let (mut store, ids) = store_with(1);
        store.connect(&ids[0], &ids[0]).unwrap();
        assert_eq!(collect_all(&store), vec![vec![ids[0]]]);
    }

    #[test]
    fn test_acyclic_graph_reports_nothing() {
        let (mut store, ids) = store_with(4);
        store.connect(&ids[0], &ids[1]).unwrap();
        store.connect(&ids[1], &ids[2]).unwrap();
        store.connect(&ids[0], &ids[2]).unwrap();
        store.connect(&ids[2], &ids[3]).unwrap();
        assert!(collect_all(&store).is_empty());
        assert!(collect_from(&store, ids[0]).is_empty());
    }

    #[test]
    fn test_two_cycles_through_one_node_are_both_reported() {
        // 0 -> 1 -> 0 and 0 -> 2 -> 0
        let (mut store, ids) = store_with(3);
        store.connect(&ids[0], &ids[1]).unwrap();
        store.connect(&ids[1], &ids[0]).unwrap();
        store.connect(&ids[0], &ids[2]).unwrap();
        store.connect(&ids[2], &ids[0]).unwrap();

        let cycles = collect_all(&store);
        assert_eq!(cycles, vec![vec![ids[0], ids[1]], vec![ids[0], ids[2]]]);
    }

    #[test]
    fn test_visited_nodes_are_not_reexplored_within_a_scan() {
        // 0 -> 1 -> 2 -> 0 and 0 -> 3 -> 1. The second cycle {0, 3, 1, 2} runs through 1,
        // which the first branch already explored, so one scan reports only the triangle.
        let (mut store, ids) = store_with(4);
        store.connect(&ids[0], &ids[1]).unwrap();
        store.connect(&ids[1], &ids[2]).unwrap();
        store.connect(&ids[2], &ids[0]).unwrap();
        store.connect(&ids[0], &ids[3]).unwrap();
        store.connect(&ids[3], &ids[1]).unwrap();

        let cycles = collect_all(&store);
        assert_eq!(cycles, vec![vec![ids[0], ids[1], ids[2]]]);
    }

    #[test]
    fn test_targeted_scan_only_sees_reachable_cycles() {
        // ring 0 <-> 1, and an unrelated ring 2 <-> 3
        let (mut store, ids) = store_with(4);
        store.connect(&ids[0], &ids[1]).unwrap();
        store.connect(&ids[1], &ids[0]).unwrap();
        store.connect(&ids[2], &ids[3]).unwrap();
        store.connect(&ids[3], &ids[2]).unwrap();

        assert_eq!(collect_from(&store, ids[2]), vec![vec![ids[2], ids[3]]]);
        assert_eq!(collect_all(&store).len(), 2);
    }

    #[test]
    fn test_long_ring_scans_on_a_small_stack() {
        const RING: usize = 10_000;
        let handle = std::thread::Builder::new()
            .stack_size(2 * 1024 * 1024)
            .spawn(|| {
                let (mut store, ids) = store_with(RING);
                for i in 0..RING {
                    store.connect(&ids[i], &ids[(i + 1) % RING]).unwrap();
                }
                let full = collect_all(&store);
                let targeted = collect_from(&store, ids[RING / 2]);
                (ids, full, targeted)
            })
            .unwrap();
        let (ids, full, targeted) = handle.join().unwrap();

        assert_eq!(full, vec![ids.clone()]);
        assert_eq!(targeted.len(), 1);
        assert_eq!(targeted[0].len(), RING);
        assert_eq!(targeted[0][0], ids[RING / 2]);
    }

    #[test]
    fn test_scan_from_unknown_node_is_empty() {
        let (store, _) = store_with(2);
        assert!(collect_from(&store, NodeId::new()).is_empty());
    }
}
