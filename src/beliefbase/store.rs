//! BeliefStore: the arena holding belief nodes and their adjacency.
//!
//! Nodes are never removed. Edges live on both endpoints as id lists
//! ([`BeliefNode::child_nodes`] on the parent, [`BeliefNode::parent_nodes`] on the child).

use crate::{
    error::DoctrineError,
    properties::{BeliefNode, NodeId, SourceType},
};
use std::collections::BTreeMap;

#[derive(Debug, Default, Clone)]
pub struct BeliefStore {
    nodes: BTreeMap<NodeId, BeliefNode>,
    /// Registration order. Full-graph scans seed from nodes in this order.
    order: Vec<NodeId>,
}

impl BeliefStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, node: BeliefNode) -> NodeId {
        let id = node.id;
        if self.nodes.insert(id, node).is_none() {
            self.order.push(id);
        }
        id
    }

    pub fn get(&self, id: &NodeId) -> Option<&BeliefNode> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node ids in registration order.
    pub fn ids(&self) -> impl Iterator<Item = &NodeId> + '_ {
        self.order.iter()
    }

    /// Nodes in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &BeliefNode> + '_ {
        self.order.iter().filter_map(|id| self.nodes.get(id))
    }

    pub fn list(&self, source_type: Option<SourceType>) -> Vec<&BeliefNode> {
        self.iter()
            .filter(|node| source_type.map_or(true, |kind| node.source_type == kind))
            .collect()
    }

    /// Children of `id`, or an empty slice if the node is unknown.
    pub fn children(&self, id: &NodeId) -> &[NodeId] {
        self.nodes
            .get(id)
            .map(|node| node.child_nodes.as_slice())
            .unwrap_or(&[])
    }

    fn get_mut(&mut self, id: &NodeId) -> Result<&mut BeliefNode, DoctrineError> {
        self.nodes
            .get_mut(id)
            .ok_or_else(|| DoctrineError::NotFound(format!("belief node {id}")))
    }

    /// Clamp and store a new belief strength, returning the previous one.
    pub fn set_strength(&mut self, id: &NodeId, strength: f64) -> Result<f64, DoctrineError> {
        let node = self.get_mut(id)?;
        let old = node.set_strength(strength);
        tracing::debug!(
            "[BeliefStore] strength of {id}: {old:.3} -> {:.3}",
            node.belief_strength
        );
        Ok(old)
    }

    /// Add the edge `parent -> child` on both endpoints. Returns whether the edge is new; adding
    /// an existing edge changes nothing. Both ids are checked before either node is touched.
    pub fn connect(&mut self, parent: &NodeId, child: &NodeId) -> Result<bool, DoctrineError> {
        for id in [parent, child] {
            if !self.contains(id) {
                return Err(DoctrineError::NotFound(format!(
                    "connection endpoint {id} is not a registered belief node"
                )));
            }
        }

        let mut added = false;
        let parent_node = self.get_mut(parent)?;
        if !parent_node.child_nodes.contains(child) {
            parent_node.child_nodes.push(*child);
            added = true;
        }
        let child_node = self.get_mut(child)?;
        if !child_node.parent_nodes.contains(parent) {
            child_node.parent_nodes.push(*parent);
            added = true;
        }
        Ok(added)
    }

    /// Record that `id` contradicts `other`. `other` need not be registered. Returns whether the
    /// contradiction is new.
    pub fn add_contradiction(
        &mut self,
        id: &NodeId,
        other: &NodeId,
    ) -> Result<bool, DoctrineError> {
        let node = self.get_mut(id)?;
        if id == other {
            return Ok(false);
        }
        Ok(node.contradictions.insert(*other))
    }

    pub fn add_evidence(&mut self, id: &NodeId, evidence: String) -> Result<(), DoctrineError> {
        self.get_mut(id)?.supporting_evidence.push(evidence);
        Ok(())
    }
}
