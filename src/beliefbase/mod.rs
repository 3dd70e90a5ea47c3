//! BeliefBase module: the node store of the doctrine engine.
//!
//! This module owns every registered belief node and the directed adjacency between them.
//!
//! # Module Organization
//!
//! - [`store`]: [`BeliefStore`], an arena of nodes keyed by [`crate::properties::NodeId`]
//! - [`graph`]: petgraph projection of the store for whole-graph analytics
//!
//! # Public API
//!
//! ```rust
//! use doctrine_loop::beliefbase::{BeliefGraph, BeliefStore};
//! ```

mod graph;
mod store;


pub use graph::BeliefGraph;
pub use store::BeliefStore;
