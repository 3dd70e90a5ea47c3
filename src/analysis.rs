//! Aggregate metrics and per-loop analysis derived from the store and registry.

use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fmt::{Display, Formatter},
};

use crate::{
    beliefbase::BeliefStore,
    event::DoctrineCycleEvent,
    properties::{
        BeliefNode, DoctrineLoop, LoopStatus, ResolutionAttempt, ResolutionMethod, SourceType,
    },
    registry::LoopRegistry,
    scorer::average_belief_strength,
};

const RITUAL_TENSION: f64 = 0.7;
const SYMBOLIC_STRENGTH: f64 = 0.8;
const MEDIUM_RISK_TENSION: f64 = 0.6;
const IMMEDIATE_STRENGTH: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl Display for RiskLevel {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "low"),
            RiskLevel::Medium => write!(f, "medium"),
            RiskLevel::High => write!(f, "high"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Low,
    Moderate,
    Immediate,
}

impl Display for Urgency {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            Urgency::Low => write!(f, "low"),
            Urgency::Moderate => write!(f, "moderate"),
            Urgency::Immediate => write!(f, "immediate"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoctrineMetrics {
    pub total_loops: usize,
    pub total_nodes: usize,
    pub loops_by_status: BTreeMap<LoopStatus, usize>,
    pub nodes_by_source: BTreeMap<SourceType, usize>,
    pub avg_loop_strength: f64,
    pub avg_contradiction_tension: f64,
    pub avg_belief_strength: f64,
    pub resolution_attempts: usize,
    /// Successful attempts over all attempts, 0 when nothing was attempted.
    pub resolution_success_rate: f64,
    pub critical_loop_count: usize,
    pub high_tension_loop_count: usize,
}

fn mean<I: Iterator<Item = f64>>(values: I) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

impl DoctrineMetrics {
    pub fn collect(
        store: &BeliefStore,
        registry: &LoopRegistry,
        high_tension_threshold: f64,
    ) -> Self {
        // every status and source type is present, zero counts included
        let loops_by_status = LoopStatus::all()
            .iter()
            .map(|status| (*status, registry.by_status(*status).len()))
            .collect();
        let nodes_by_source = SourceType::all()
            .iter()
            .map(|source| (*source, store.list(Some(*source)).len()))
            .collect();

        let (attempts, successes) = registry
            .iter()
            .flat_map(|lp| lp.resolution_attempts.iter())
            .fold((0usize, 0usize), |(total, ok), attempt| {
                (total + 1, ok + usize::from(attempt.success))
            });

        DoctrineMetrics {
            total_loops: registry.len(),
            total_nodes: store.len(),
            loops_by_status,
            nodes_by_source,
            avg_loop_strength: mean(registry.iter().map(|lp| lp.cycle_strength)),
            avg_contradiction_tension: mean(registry.iter().map(|lp| lp.contradiction_tension)),
            avg_belief_strength: mean(store.iter().map(|node| node.belief_strength)),
            resolution_attempts: attempts,
            resolution_success_rate: if attempts == 0 {
                0.0
            } else {
                successes as f64 / attempts as f64
            },
            critical_loop_count: registry.by_status(LoopStatus::Critical).len(),
            high_tension_loop_count: registry.above_tension(high_tension_threshold).len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopAnalysis {
    #[serde(rename = "loop")]
    pub doctrine_loop: DoctrineLoop,
    pub nodes: Vec<BeliefNode>,
    pub avg_node_strength: f64,
    pub most_effective_method: Option<ResolutionMethod>,
    pub recommended_method: ResolutionMethod,
    pub risk: RiskLevel,
    pub urgency: Urgency,
}

/// The method expected to work best given a loop's current scores.
pub fn recommended_method(lp: &DoctrineLoop) -> ResolutionMethod {
    if lp.contradiction_tension > RITUAL_TENSION {
        ResolutionMethod::RitualIntervention
    } else if lp.cycle_strength > SYMBOLIC_STRENGTH {
        ResolutionMethod::SymbolicIntegration
    } else {
        ResolutionMethod::AgentMediation
    }
}

pub fn risk_level(lp: &DoctrineLoop) -> RiskLevel {
    if lp.status == LoopStatus::Critical {
        RiskLevel::High
    } else if lp.contradiction_tension > MEDIUM_RISK_TENSION {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

pub fn urgency(lp: &DoctrineLoop) -> Urgency {
    match lp.status {
        LoopStatus::Critical if lp.cycle_strength > IMMEDIATE_STRENGTH => Urgency::Immediate,
        LoopStatus::Growing => Urgency::Moderate,
        _ => Urgency::Low,
    }
}

/// Method of the highest-impact attempt. The earliest attempt wins a tie.
pub fn most_effective_method(lp: &DoctrineLoop) -> Option<ResolutionMethod> {
    lp.resolution_attempts
        .iter()
        .fold(None, |best: Option<&ResolutionAttempt>, current| {
            match best {
                Some(b) if current.impact_level <= b.impact_level => Some(b),
                _ => Some(current),
            }
        })
        .map(|attempt| attempt.method)
}

impl LoopAnalysis {
    pub fn of(lp: &DoctrineLoop, store: &BeliefStore) -> Self {
        let nodes = lp
            .nodes
            .iter()
            .filter_map(|id| store.get(id))
            .cloned()
            .collect();
        LoopAnalysis {
            doctrine_loop: lp.clone(),
            nodes,
            avg_node_strength: average_belief_strength(store, &lp.nodes).unwrap_or(0.0),
            most_effective_method: most_effective_method(lp),
            recommended_method: recommended_method(lp),
            risk: risk_level(lp),
            urgency: urgency(lp),
        }
    }
}

/// Point-in-time copy of everything a polling presentation layer shows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoctrineSnapshot {
    pub nodes: Vec<BeliefNode>,
    pub loops: Vec<DoctrineLoop>,
    /// Most recent first.
    pub events: Vec<DoctrineCycleEvent>,
    pub metrics: DoctrineMetrics,
}
