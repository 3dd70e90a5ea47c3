//! Strength and tension scoring for doctrine loops.
//!
//! Both scores are read off the member nodes' current state in the [`BeliefStore`]:
//!
//! - cycle strength = `0.7 * mean(belief_strength) + 0.3 * connection_density`
//! - contradiction tension = intra-loop contradictions / `n * (n - 1)`
//!
//! where connection density is intra-loop edges, self-edges included, over the `n * (n - 1)`
//! possible directed edges between distinct members. Density may exceed 1 when members carry
//! self-edges; the strength is clamped to `[0, 1]`. Self-contradictions are not counted.

use std::collections::BTreeSet;

use crate::{
    beliefbase::BeliefStore,
    event::{CycleEventKind, DoctrineCycleEvent, EventLog},
    properties::{clamp_unit, DoctrineLoop, LoopStatus, NodeId},
};

/// Strength changes larger than this (in either direction) move a loop to growing/weakening.
pub const STRENGTH_DELTA: f64 = 0.1;

/// Tension above this forces a loop into critical status.
pub const CRITICAL_TENSION: f64 = 0.8;

const BELIEF_WEIGHT: f64 = 0.7;
const DENSITY_WEIGHT: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopScore {
    pub cycle_strength: f64,
    pub contradiction_tension: f64,
}

fn member_set(members: &[NodeId]) -> BTreeSet<NodeId> {
    members.iter().copied().collect()
}

fn max_directed_edges(size: usize) -> usize {
    size * size.saturating_sub(1)
}

/// Mean belief strength of the members present in the store, or `None` if none are.
pub fn average_belief_strength(store: &BeliefStore, members: &[NodeId]) -> Option<f64> {
    let strengths = members
        .iter()
        .filter_map(|id| store.get(id))
        .map(|node| node.belief_strength)
        .collect::<Vec<_>>();
    if strengths.is_empty() {
        None
    } else {
        Some(strengths.iter().sum::<f64>() / strengths.len() as f64)
    }
}

pub fn connection_density(store: &BeliefStore, members: &[NodeId]) -> f64 {
    let set = member_set(members);
    let max = max_directed_edges(set.len());
    if max == 0 {
        return 0.0;
    }
    let actual: usize = set
        .iter()
        .filter_map(|id| store.get(id))
        .map(|node| {
            node.child_nodes
                .iter()
                .filter(|child| set.contains(*child))
                .count()
        })
        .sum();
    actual as f64 / max as f64
}

pub fn cycle_strength(store: &BeliefStore, members: &[NodeId]) -> f64 {
    match average_belief_strength(store, members) {
        Some(average) => clamp_unit(
            BELIEF_WEIGHT * average + DENSITY_WEIGHT * connection_density(store, members),
        ),
        None => 0.0,
    }
}

pub fn contradiction_tension(store: &BeliefStore, members: &[NodeId]) -> f64 {
    let set = member_set(members);
    let max = max_directed_edges(set.len());
    if max == 0 {
        return 0.0;
    }
    let contradictions: usize = set
        .iter()
        .filter_map(|id| store.get(id))
        .map(|node| {
            node.contradictions
                .iter()
                .filter(|other| **other != node.id && set.contains(*other))
                .count()
        })
        .sum();
    clamp_unit(contradictions as f64 / max as f64)
}

pub fn score(store: &BeliefStore, members: &[NodeId]) -> LoopScore {
    LoopScore {
        cycle_strength: cycle_strength(store, members),
        contradiction_tension: contradiction_tension(store, members),
    }
}

/// Recompute a loop's scores and translate the strength delta into a status transition.
///
/// A dissolved loop still gets fresh scores but keeps its status and emits nothing. For every
/// other loop the critical-tension check runs last and overrides the delta classification.
pub fn update_loop_strength(lp: &mut DoctrineLoop, store: &BeliefStore, events: &mut EventLog) {
    let old_strength = lp.cycle_strength;
    let LoopScore {
        cycle_strength,
        contradiction_tension,
    } = score(store, &lp.nodes);
    lp.cycle_strength = cycle_strength;
    lp.contradiction_tension = contradiction_tension;

    if lp.status.is_terminal() {
        tracing::debug!("[Scorer] loop {} is dissolved, status left as is", lp.id);
        return;
    }

    let delta = cycle_strength - old_strength;
    if delta > STRENGTH_DELTA {
        lp.status = LoopStatus::Growing;
        events.push(DoctrineCycleEvent::new(
            CycleEventKind::LoopStrengthened,
            lp.id,
            format!("Loop strength increased to {cycle_strength:.2}"),
            &lp.nodes,
        ));
    } else if delta < -STRENGTH_DELTA {
        lp.status = LoopStatus::Weakening;
        events.push(DoctrineCycleEvent::new(
            CycleEventKind::LoopWeakened,
            lp.id,
            format!("Loop strength decreased to {cycle_strength:.2}"),
            &lp.nodes,
        ));
    }

    if contradiction_tension > CRITICAL_TENSION {
        lp.status = LoopStatus::Critical;
    }
    tracing::debug!(
        "[Scorer] loop {}: strength {old_strength:.3} -> {cycle_strength:.3}, tension {contradiction_tension:.3}, status {}",
        lp.id,
        lp.status
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::properties::{BeliefNode, LoopId, SourceType};
    use std::time::SystemTime;
    use test_log::test;

    const EPSILON: f64 = 1e-9;

    fn ring(n: usize) -> (BeliefStore, Vec<NodeId>) {
        let mut store = BeliefStore::new();
        let ids = (0..n)
            .map(|i| store.insert(BeliefNode::new(format!("n{i}"), SourceType::Reflection, [])))
            .collect::<Vec<_>>();
        for i in 0..n {
            store.connect(&ids[i], &ids[(i + 1) % n]).unwrap();
        }
        (store, ids)
    }

    fn loop_over(store: &BeliefStore, ids: &[NodeId]) -> DoctrineLoop {
        let LoopScore {
            cycle_strength,
            contradiction_tension,
        } = score(store, ids);
        DoctrineLoop {
            id: LoopId::from_members(ids),
            nodes: ids.to_vec(),
            cycle_strength,
            contradiction_tension,
            status: LoopStatus::Growing,
            cycle_count: 1,
            last_cycle_time: SystemTime::now(),
            resolution_attempts: Vec::new(),
        }
    }

    #[test]
    fn test_triangle_strength() {
        let (store, ids) = ring(3);
        assert!((connection_density(&store, &ids) - 0.5).abs() < EPSILON);
        assert!((cycle_strength(&store, &ids) - 0.5).abs() < EPSILON);
        assert_eq!(contradiction_tension(&store, &ids), 0.0);
    }

    #[test]
    fn test_density_counts_only_intra_loop_edges() {
        let (mut store, ids) = ring(3);
        let outsider = store.insert(BeliefNode::new("out", SourceType::Reflection, []));
        store.connect(&ids[0], &outsider).unwrap();
        assert!((connection_density(&store, &ids) - 0.5).abs() < EPSILON);

        store.connect(&ids[1], &ids[0]).unwrap();
        assert!((connection_density(&store, &ids) - 4.0 / 6.0).abs() < EPSILON);
    }

    #[test]
    fn test_self_edge_counts_toward_density() {
        let (mut store, ids) = ring(3);
        store.connect(&ids[0], &ids[0]).unwrap();
        assert!((connection_density(&store, &ids) - 4.0 / 6.0).abs() < EPSILON);
        assert!((cycle_strength(&store, &ids) - 0.55).abs() < EPSILON);
    }

    #[test]
    fn test_saturated_pair_with_self_edges_clamps_strength() {
        // 0 <-> 1 plus a self edge on each: four intra-loop edges over a base of two
        let (mut store, ids) = ring(2);
        store.connect(&ids[0], &ids[0]).unwrap();
        store.connect(&ids[1], &ids[1]).unwrap();
        store.set_strength(&ids[0], 1.0).unwrap();
        store.set_strength(&ids[1], 1.0).unwrap();
        assert!((connection_density(&store, &ids) - 2.0).abs() < EPSILON);
        assert_eq!(cycle_strength(&store, &ids), 1.0);
    }

    #[test]
    fn test_tension_counts_pairwise_contradictions() {
        let (mut store, ids) = ring(3);
        store.add_contradiction(&ids[0], &ids[2]).unwrap();
        store.add_contradiction(&ids[2], &ids[0]).unwrap();
        store.add_contradiction(&ids[1], &NodeId::new()).unwrap();
        assert!((contradiction_tension(&store, &ids) - 2.0 / 6.0).abs() < EPSILON);
    }

    #[test]
    fn test_degenerate_members() {
        let (store, ids) = ring(1);
        assert_eq!(connection_density(&store, &ids), 0.0);
        assert_eq!(contradiction_tension(&store, &ids), 0.0);
        assert!((cycle_strength(&store, &ids) - 0.35).abs() < EPSILON);

        assert_eq!(contradiction_tension(&store, &[]), 0.0);
        assert_eq!(cycle_strength(&store, &[]), 0.0);
        assert_eq!(average_belief_strength(&store, &[NodeId::new()]), None);
    }

    #[test]
    fn test_update_marks_growing_and_weakening() {
        let (mut store, ids) = ring(3);
        let mut lp = loop_over(&store, &ids);
        lp.status = LoopStatus::Stable;
        let mut events = EventLog::default();

        for id in ids.iter() {
            store.set_strength(id, 1.0).unwrap();
        }
        update_loop_strength(&mut lp, &store, &mut events);
        assert_eq!(lp.status, LoopStatus::Growing);
        assert!((lp.cycle_strength - 0.85).abs() < EPSILON);
        assert_eq!(events.recent(1)[0].event_type, CycleEventKind::LoopStrengthened);
        assert_eq!(events.recent(1)[0].details, "Loop strength increased to 0.85");

        for id in ids.iter() {
            store.set_strength(id, 0.0).unwrap();
        }
        update_loop_strength(&mut lp, &store, &mut events);
        assert_eq!(lp.status, LoopStatus::Weakening);
        assert_eq!(events.recent(1)[0].event_type, CycleEventKind::LoopWeakened);
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn test_small_delta_leaves_status_and_emits_nothing() {
        let (mut store, ids) = ring(3);
        let mut lp = loop_over(&store, &ids);
        lp.status = LoopStatus::Stable;
        let mut events = EventLog::default();

        store.set_strength(&ids[0], 0.6).unwrap();
        update_loop_strength(&mut lp, &store, &mut events);
        assert_eq!(lp.status, LoopStatus::Stable);
        assert!(events.is_empty());
    }

    #[test]
    fn test_critical_tension_overrides_growth() {
        let (mut store, ids) = ring(2);
        let mut lp = loop_over(&store, &ids);
        let mut events = EventLog::default();

        store.add_contradiction(&ids[0], &ids[1]).unwrap();
        store.add_contradiction(&ids[1], &ids[0]).unwrap();
        store.set_strength(&ids[0], 1.0).unwrap();
        store.set_strength(&ids[1], 1.0).unwrap();
        update_loop_strength(&mut lp, &store, &mut events);

        assert_eq!(lp.contradiction_tension, 1.0);
        assert_eq!(lp.status, LoopStatus::Critical);
        assert_eq!(events.recent(1)[0].event_type, CycleEventKind::LoopStrengthened);
    }

    #[test]
    fn test_dissolved_is_terminal() {
        let (mut store, ids) = ring(2);
        let mut lp = loop_over(&store, &ids);
        lp.status = LoopStatus::Dissolved;
        let mut events = EventLog::default();

        store.add_contradiction(&ids[0], &ids[1]).unwrap();
        store.add_contradiction(&ids[1], &ids[0]).unwrap();
        store.set_strength(&ids[0], 1.0).unwrap();
        store.set_strength(&ids[1], 1.0).unwrap();
        update_loop_strength(&mut lp, &store, &mut events);

        assert_eq!(lp.status, LoopStatus::Dissolved);
        assert_eq!(lp.contradiction_tension, 1.0);
        assert!(events.is_empty());
    }
}
