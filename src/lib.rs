//! # doctrine-loop
//!
//! An in-memory engine that finds self-reinforcing loops in a graph of beliefs, scores how
//! strongly each loop reinforces itself and how much its members contradict one another, and
//! applies resolution strategies that can dissolve it.
//!
//! ## Overview
//!
//! Collaborators register [`properties::BeliefNode`]s and directed "feeds into" connections
//! between them. Every new connection triggers a targeted depth-first scan from the connection's
//! child; every new node arms a debounced full-graph scan. Each cycle a scan reports becomes, or
//! refreshes, a persistent [`properties::DoctrineLoop`] whose identity depends only on its
//! member set.
//!
//! ## Architecture
//!
//! - **[`beliefbase`]**: Node store with id-list adjacency, plus a `petgraph` projection
//! - **[`detect`]**: Depth-first cycle detector with scan-scoped visited state
//! - **[`registry`]**: Loop records, deduplicated by member set
//! - **[`scorer`]**: Cycle strength, contradiction tension and status transitions
//! - **[`resolution`]**: The four resolution strategies
//! - **[`event`]**: Append-only lifecycle event log
//! - **[`analysis`]**: Aggregate metrics and per-loop analysis
//! - **[`schedule`]**: Cancel-and-reschedule timer behind the debounced full scan
//! - **[`engine`]**: [`engine::DoctrineEngine`], the call surface tying the above together
//!
//! ## Quick Start
//!
//! ```rust
//! use doctrine_loop::{
//!     config::EngineConfig,
//!     engine::DoctrineEngine,
//!     properties::{ResolutionMethod, SourceType},
//! };
//!
//! let engine = DoctrineEngine::with_runtime(EngineConfig::default(), None);
//! let a = engine.add_node("Order precedes meaning", SourceType::Reflection, []);
//! let b = engine.add_node("Meaning sustains ritual", SourceType::RitualResult, []);
//! let c = engine.add_node("Ritual enforces order", SourceType::TribunalVerdict, []);
//! engine.add_connection(&a, &b)?;
//! engine.add_connection(&b, &c)?;
//! engine.add_connection(&c, &a)?;
//!
//! let loops = engine.list_loops();
//! assert_eq!(loops.len(), 1);
//! assert!((loops[0].cycle_strength - 0.5).abs() < 1e-9);
//!
//! let success = engine.attempt_loop_resolution(&loops[0].id, ResolutionMethod::SymbolicIntegration)?;
//! assert!(!success);
//! # Ok::<(), doctrine_loop::DoctrineError>(())
//! ```
//!
//! Inside a tokio runtime, [`engine::DoctrineEngine::new`] picks up the current runtime and
//! schedules debounced full scans on it.

pub mod analysis;
pub mod beliefbase;
pub mod config;
pub mod detect;
pub mod engine;
pub mod error;
pub mod event;
pub mod properties;
pub mod registry;
pub mod resolution;
pub mod schedule;
pub mod scorer;

pub use error::*;
