//! [crate::properties] contains the value types shared by every part of the engine: node and loop
//! identifiers, belief nodes, doctrine loops and the resolution attempts recorded against them.
pub use enumset::EnumSet;
use enumset::*;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeSet,
    fmt::{Display, Formatter},
    str::FromStr,
    time::SystemTime,
};

pub use uuid::Uuid;

use crate::error::DoctrineError;

/// The doctrine namespace UUID. Node ids carry the least significant 6 bytes of this namespace
/// as their v6 node field, so ids generated by this crate are recognizable on sight.
pub const UUID_NAMESPACE_DOCTRINE: Uuid = Uuid::from_bytes([
    0x3a, 0x91, 0x0c, 0x47, 0x5e, 0x12, 0x4d, 0x8b, 0xa6, 0x70, 0x2f, 0xd4, 0x19, 0xc3, 0x6e, 0x05,
]);

/// Namespace for [LoopId]s. A loop id is the v5 hash of its sorted member ids within this
/// namespace.
pub const UUID_NAMESPACE_LOOP: Uuid = Uuid::from_bytes([
    0x3b, 0x91, 0x0c, 0x47, 0x5e, 0x12, 0x4d, 0x8b, 0xa6, 0x70, 0x2f, 0xd4, 0x19, 0xc3, 0x6e, 0x05,
]);

pub(crate) fn doctrine_node_bytes() -> [u8; 6] {
    let bytes = UUID_NAMESPACE_DOCTRINE.as_bytes();
    [bytes[10], bytes[11], bytes[12], bytes[13], bytes[14], bytes[15]]
}

/// Clamp into `[0, 1]`. NaN collapses to 0 so it can never leak into a score.
pub(crate) fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Belief node ID
///
/// A UUID (v6) whose node field is taken from [UUID_NAMESPACE_DOCTRINE].
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Hash, PartialEq, Eq, PartialOrd, Ord)]
#[serde(transparent)]
pub struct NodeId(Uuid);

impl NodeId {
    pub fn new() -> Self {
        NodeId(Uuid::now_v6(&doctrine_node_bytes()))
    }

    pub fn nil() -> Self {
        NodeId(Uuid::nil())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        NodeId::new()
    }
}

impl AsRef<Uuid> for NodeId {
    fn as_ref(&self) -> &Uuid {
        &self.0
    }
}

impl From<Uuid> for NodeId {
    fn from(id: Uuid) -> Self {
        NodeId(id)
    }
}

impl TryFrom<&str> for NodeId {
    type Error = DoctrineError;

    fn try_from(string: &str) -> Result<Self, Self::Error> {
        Ok(NodeId(Uuid::parse_str(string)?))
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            self.0.hyphenated().encode_lower(&mut Uuid::encode_buffer())
        )
    }
}

/// Doctrine loop ID
///
/// A pure function of the loop's member set: the same cycle rediscovered in any rotation, or
/// from any starting node, maps onto the same id.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Hash, PartialEq, Eq, PartialOrd, Ord)]
#[serde(transparent)]
pub struct LoopId(Uuid);

impl LoopId {
    pub fn from_members<'a, I>(members: I) -> Self
    where
        I: IntoIterator<Item = &'a NodeId>,
    {
        let sorted = members.into_iter().collect::<BTreeSet<_>>();
        let mut bytes = Vec::with_capacity(sorted.len() * 16);
        for id in sorted {
            bytes.extend_from_slice(id.0.as_bytes());
        }
        LoopId(Uuid::new_v5(&UUID_NAMESPACE_LOOP, &bytes))
    }
}

impl AsRef<Uuid> for LoopId {
    fn as_ref(&self) -> &Uuid {
        &self.0
    }
}

impl TryFrom<&str> for LoopId {
    type Error = DoctrineError;

    fn try_from(string: &str) -> Result<Self, Self::Error> {
        Ok(LoopId(Uuid::parse_str(string)?))
    }
}

impl Display for LoopId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            self.0.hyphenated().encode_lower(&mut Uuid::encode_buffer())
        )
    }
}

/// Provenance of a [BeliefNode]. Fixed at registration.
#[derive(Debug, Default, Serialize, Deserialize, PartialOrd, Ord, Hash, EnumSetType)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    #[default]
    Reflection,
    RitualResult,
    TribunalVerdict,
    AgentInput,
}

impl SourceType {
    pub fn all() -> &'static [SourceType] {
        &[
            SourceType::Reflection,
            SourceType::RitualResult,
            SourceType::TribunalVerdict,
            SourceType::AgentInput,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Reflection => "reflection",
            SourceType::RitualResult => "ritual_result",
            SourceType::TribunalVerdict => "tribunal_verdict",
            SourceType::AgentInput => "agent_input",
        }
    }
}

impl Display for SourceType {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SourceType {
    type Err = DoctrineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SourceType::all()
            .iter()
            .find(|kind| kind.as_str() == s)
            .copied()
            .ok_or_else(|| DoctrineError::Serialization(format!("Unknown source type '{s}'")))
    }
}

/// A single belief statement with a confidence score and provenance.
///
/// Edges are stored as id lists on both endpoints (`parent_nodes` feeds into this node, this
/// node feeds into `child_nodes`), so the graph owns no references and cycles in the belief
/// graph are never cycles in memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeliefNode {
    pub id: NodeId,
    pub content: String,
    pub source_type: SourceType,
    /// Confidence in `[0, 1]`. New nodes start neutral at [BeliefNode::INITIAL_STRENGTH].
    pub belief_strength: f64,
    /// Nodes this belief is known to conflict with. Supplied by the caller; ids outside the
    /// store are kept but can never contribute tension.
    pub contradictions: BTreeSet<NodeId>,
    pub supporting_evidence: Vec<String>,
    pub parent_nodes: Vec<NodeId>,
    pub child_nodes: Vec<NodeId>,
    pub last_updated: SystemTime,
}

impl BeliefNode {
    pub const INITIAL_STRENGTH: f64 = 0.5;

    pub fn new<I>(content: impl Into<String>, source_type: SourceType, contradictions: I) -> Self
    where
        I: IntoIterator<Item = NodeId>,
    {
        BeliefNode {
            id: NodeId::new(),
            content: content.into(),
            source_type,
            belief_strength: Self::INITIAL_STRENGTH,
            contradictions: contradictions.into_iter().collect(),
            supporting_evidence: Vec::new(),
            parent_nodes: Vec::new(),
            child_nodes: Vec::new(),
            last_updated: SystemTime::now(),
        }
    }

    /// Stores the clamped strength and returns the previous value.
    pub(crate) fn set_strength(&mut self, strength: f64) -> f64 {
        let old = self.belief_strength;
        self.belief_strength = clamp_unit(strength);
        self.last_updated = SystemTime::now();
        old
    }

    pub fn contradicts(&self, other: &NodeId) -> bool {
        self.contradictions.contains(other)
    }

    pub fn feeds_into(&self, child: &NodeId) -> bool {
        self.child_nodes.contains(child)
    }
}

/// Health of a [DoctrineLoop]. Derived by the scorer and the resolution dispatcher, never set
/// directly by callers.
#[derive(Debug, Default, Serialize, Deserialize, PartialOrd, Ord, Hash, EnumSetType)]
#[enumset(serialize_repr = "list")]
#[serde(rename_all = "snake_case")]
pub enum LoopStatus {
    Stable,
    #[default]
    Growing,
    Weakening,
    Critical,
    /// Terminal. Only a successful high-impact resolution attempt produces it.
    Dissolved,
}

impl LoopStatus {
    pub fn all() -> &'static [LoopStatus] {
        &[
            LoopStatus::Stable,
            LoopStatus::Growing,
            LoopStatus::Weakening,
            LoopStatus::Critical,
            LoopStatus::Dissolved,
        ]
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, LoopStatus::Dissolved)
    }

    /// Every status a loop can still leave.
    pub fn active() -> EnumSet<LoopStatus> {
        EnumSet::all() - LoopStatus::Dissolved
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LoopStatus::Stable => "stable",
            LoopStatus::Growing => "growing",
            LoopStatus::Weakening => "weakening",
            LoopStatus::Critical => "critical",
            LoopStatus::Dissolved => "dissolved",
        }
    }
}

impl Display for LoopStatus {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The four resolution strategies. Each models a different shape of intervention; the formulas
/// live in [crate::resolution].
#[derive(Debug, Serialize, Deserialize, PartialOrd, Ord, Hash, EnumSetType)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionMethod {
    RitualIntervention,
    TribunalProcessing,
    AgentMediation,
    SymbolicIntegration,
}

impl ResolutionMethod {
    pub fn all() -> &'static [ResolutionMethod] {
        &[
            ResolutionMethod::RitualIntervention,
            ResolutionMethod::TribunalProcessing,
            ResolutionMethod::AgentMediation,
            ResolutionMethod::SymbolicIntegration,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionMethod::RitualIntervention => "ritual_intervention",
            ResolutionMethod::TribunalProcessing => "tribunal_processing",
            ResolutionMethod::AgentMediation => "agent_mediation",
            ResolutionMethod::SymbolicIntegration => "symbolic_integration",
        }
    }
}

impl Display for ResolutionMethod {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ResolutionMethod {
    type Err = DoctrineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResolutionMethod::all()
            .iter()
            .find(|method| method.as_str() == s)
            .copied()
            .ok_or_else(|| {
                DoctrineError::Serialization(format!("Unknown resolution method '{s}'"))
            })
    }
}

/// One recorded application of a [ResolutionMethod]. Immutable once appended to its loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionAttempt {
    pub id: Uuid,
    pub method: ResolutionMethod,
    pub timestamp: SystemTime,
    pub success: bool,
    pub impact_level: f64,
    pub notes: String,
    /// Always empty: no strategy reports concrete graph changes yet.
    pub resulting_changes: Vec<String>,
}

/// A detected cycle in the belief graph, tracked as a persistent entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoctrineLoop {
    pub id: LoopId,
    /// Cycle members in traversal order. The closing node is not repeated.
    pub nodes: Vec<NodeId>,
    pub cycle_strength: f64,
    pub contradiction_tension: f64,
    pub status: LoopStatus,
    pub cycle_count: u64,
    pub last_cycle_time: SystemTime,
    pub resolution_attempts: Vec<ResolutionAttempt>,
}

impl DoctrineLoop {
    pub fn contains(&self, node: &NodeId) -> bool {
        self.nodes.contains(node)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
