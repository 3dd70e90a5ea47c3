//! Loop registry: one persistent [DoctrineLoop] record per distinct cycle member set.

use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, time::SystemTime};

use crate::{
    beliefbase::BeliefStore,
    event::{CycleEventKind, DoctrineCycleEvent, EventLog},
    properties::{
        DoctrineLoop, EnumSet, LoopId, LoopStatus, NodeId, ResolutionAttempt,
    },
    scorer::{score, update_loop_strength, LoopScore},
};

/// A resolution attempt paired with the loop it was made against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionRecord {
    pub loop_id: LoopId,
    pub loop_status: LoopStatus,
    pub attempt: ResolutionAttempt,
}

#[derive(Debug, Default, Clone)]
pub struct LoopRegistry {
    loops: BTreeMap<LoopId, DoctrineLoop>,
    /// First-detection order, used for every listing.
    order: Vec<LoopId>,
}

impl LoopRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or refresh the loop record for a detected cycle.
    ///
    /// A known member set bumps `cycle_count`, stamps `last_cycle_time` and rescores the loop.
    /// An unknown one becomes a new `growing` loop and logs `loop_detected`. Cycles naming nodes
    /// missing from `store` are dropped.
    pub fn process_detected_loop(
        &mut self,
        store: &BeliefStore,
        cycle: Vec<NodeId>,
        events: &mut EventLog,
    ) -> Option<LoopId> {
        if cycle.is_empty() {
            return None;
        }
        if let Some(missing) = cycle.iter().find(|id| !store.contains(id)) {
            tracing::warn!("[LoopRegistry] dropping cycle through unknown node {missing}");
            return None;
        }

        let loop_id = LoopId::from_members(&cycle);
        if let Some(existing) = self.loops.get_mut(&loop_id) {
            existing.cycle_count += 1;
            existing.last_cycle_time = SystemTime::now();
            update_loop_strength(existing, store, events);
            tracing::debug!(
                "[LoopRegistry] loop {loop_id} rediscovered, cycle count {}",
                existing.cycle_count
            );
            return Some(loop_id);
        }

        let LoopScore {
            cycle_strength,
            contradiction_tension,
        } = score(store, &cycle);
        let details = format!("New doctrine loop detected with {} nodes", cycle.len());
        events.push(DoctrineCycleEvent::new(
            CycleEventKind::LoopDetected,
            loop_id,
            details,
            &cycle,
        ));
        tracing::info!(
            "[LoopRegistry] new loop {loop_id} ({} nodes, strength {cycle_strength:.3}, tension {contradiction_tension:.3})",
            cycle.len()
        );
        self.loops.insert(
            loop_id,
            DoctrineLoop {
                id: loop_id,
                nodes: cycle,
                cycle_strength,
                contradiction_tension,
                status: LoopStatus::Growing,
                cycle_count: 1,
                last_cycle_time: SystemTime::now(),
                resolution_attempts: Vec::new(),
            },
        );
        self.order.push(loop_id);
        Some(loop_id)
    }

    /// Rescore every loop containing `node`. Returns how many loops were refreshed.
    pub fn refresh_containing(
        &mut self,
        node: &NodeId,
        store: &BeliefStore,
        events: &mut EventLog,
    ) -> usize {
        let mut refreshed = 0;
        for loop_id in self.order.iter() {
            if let Some(lp) = self.loops.get_mut(loop_id) {
                if lp.contains(node) {
                    update_loop_strength(lp, store, events);
                    refreshed += 1;
                }
            }
        }
        refreshed
    }

    pub fn get(&self, loop_id: &LoopId) -> Option<&DoctrineLoop> {
        self.loops.get(loop_id)
    }

    pub(crate) fn get_mut(&mut self, loop_id: &LoopId) -> Option<&mut DoctrineLoop> {
        self.loops.get_mut(loop_id)
    }

    pub fn len(&self) -> usize {
        self.loops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loops.is_empty()
    }

    /// All loops in first-detection order.
    pub fn iter(&self) -> impl Iterator<Item = &DoctrineLoop> + '_ {
        self.order.iter().filter_map(|id| self.loops.get(id))
    }

    fn filtered<P>(&self, pred: P) -> Vec<&DoctrineLoop>
    where
        P: Fn(&DoctrineLoop) -> bool,
    {
        self.iter().filter(|lp| pred(lp)).collect()
    }

    pub fn list(&self) -> Vec<&DoctrineLoop> {
        self.iter().collect()
    }

    pub fn by_status(&self, status: LoopStatus) -> Vec<&DoctrineLoop> {
        self.filtered(|lp| lp.status == status)
    }

    pub fn in_statuses(&self, statuses: EnumSet<LoopStatus>) -> Vec<&DoctrineLoop> {
        self.filtered(|lp| statuses.contains(lp.status))
    }

    pub fn active(&self) -> Vec<&DoctrineLoop> {
        self.in_statuses(LoopStatus::active())
    }

    pub fn above_tension(&self, threshold: f64) -> Vec<&DoctrineLoop> {
        self.filtered(|lp| lp.contradiction_tension > threshold)
    }

    pub fn above_strength(&self, threshold: f64) -> Vec<&DoctrineLoop> {
        self.filtered(|lp| lp.cycle_strength > threshold)
    }

    pub fn containing(&self, node: &NodeId) -> Vec<&DoctrineLoop> {
        self.filtered(|lp| lp.contains(node))
    }

    /// Attempts across every loop, most recent first.
    pub fn recent_resolution_attempts(&self, limit: usize) -> Vec<ResolutionRecord> {
        let mut records = self
            .iter()
            .flat_map(|lp| {
                lp.resolution_attempts.iter().map(|attempt| ResolutionRecord {
                    loop_id: lp.id,
                    loop_status: lp.status,
                    attempt: attempt.clone(),
                })
            })
            .collect::<Vec<_>>();
        records.sort_by(|a, b| b.attempt.timestamp.cmp(&a.attempt.timestamp));
        records.truncate(limit);
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::properties::{BeliefNode, SourceType};
    use test_log::test;

    fn triangle() -> (BeliefStore, Vec<NodeId>) {
        let mut store = BeliefStore::new();
        let ids = (0..3)
            .map(|i| store.insert(BeliefNode::new(format!("n{i}"), SourceType::Reflection, [])))
            .collect::<Vec<_>>();
        store.connect(&ids[0], &ids[1]).unwrap();
        store.connect(&ids[1], &ids[2]).unwrap();
        store.connect(&ids[2], &ids[0]).unwrap();
        (store, ids)
    }

    #[test]
    fn test_rotations_collapse_into_one_record() {
        let (store, ids) = triangle();
        let mut registry = LoopRegistry::new();
        let mut events = EventLog::default();

        let first = registry
            .process_detected_loop(&store, ids.clone(), &mut events)
            .unwrap();
        let second = registry
            .process_detected_loop(&store, vec![ids[2], ids[0], ids[1]], &mut events)
            .unwrap();
        let third = registry
            .process_detected_loop(&store, vec![ids[1], ids[2], ids[0]], &mut events)
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(first, third);
        assert_eq!(registry.len(), 1);
        let lp = registry.get(&first).unwrap();
        assert_eq!(lp.cycle_count, 3);
        assert_eq!(lp.nodes, ids);
        assert_eq!(lp.status, LoopStatus::Growing);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_new_loop_event() {
        let (store, ids) = triangle();
        let mut registry = LoopRegistry::new();
        let mut events = EventLog::default();
        let loop_id = registry
            .process_detected_loop(&store, ids.clone(), &mut events)
            .unwrap();

        let recent = events.recent(1);
        assert_eq!(recent[0].event_type, CycleEventKind::LoopDetected);
        assert_eq!(recent[0].loop_id, loop_id);
        assert_eq!(recent[0].details, "New doctrine loop detected with 3 nodes");
        assert_eq!(recent[0].affected_nodes, ids);
    }

    #[test]
    fn test_unknown_members_are_dropped() {
        let (store, ids) = triangle();
        let mut registry = LoopRegistry::new();
        let mut events = EventLog::default();
        assert!(registry
            .process_detected_loop(&store, vec![ids[0], NodeId::new()], &mut events)
            .is_none());
        assert!(registry
            .process_detected_loop(&store, Vec::new(), &mut events)
            .is_none());
        assert!(registry.is_empty());
        assert!(events.is_empty());
    }

    #[test]
    fn test_threshold_queries_are_strict() {
        let (store, ids) = triangle();
        let mut registry = LoopRegistry::new();
        let mut events = EventLog::default();
        registry.process_detected_loop(&store, ids.clone(), &mut events);

        assert_eq!(registry.above_strength(0.4).len(), 1);
        assert!(registry.above_strength(0.7).is_empty());
        assert!(registry.above_tension(0.0).is_empty());
        assert_eq!(registry.containing(&ids[1]).len(), 1);
        assert!(registry.containing(&NodeId::new()).is_empty());
        assert_eq!(registry.by_status(LoopStatus::Growing).len(), 1);
        assert!(registry.by_status(LoopStatus::Critical).is_empty());
        assert_eq!(registry.active().len(), 1);
    }
}
