//! [DoctrineEngine]: the in-process call surface over the node store, loop registry and event
//! log.
//!
//! The engine is a cheap [Clone] handle. Every clone shares one state behind a
//! [parking_lot::RwLock], so the process composing the application constructs it once and hands
//! clones to its collaborators.
//!
//! Detection runs in two shapes:
//!
//! - [DoctrineEngine::add_connection] runs a targeted scan seeded at the new edge's child before
//!   returning.
//! - [DoctrineEngine::add_node] arms a debounced full-graph scan. Bursts of additions inside the
//!   debounce window collapse into one scan. Engines without a tokio runtime cannot arm the timer
//!   and rely on explicit [DoctrineEngine::detect_all_loops] calls instead.

use parking_lot::RwLock;
use std::sync::{Arc, Weak};
use tokio::{runtime::Handle, sync::mpsc::UnboundedSender};

use crate::{
    analysis::{DoctrineMetrics, DoctrineSnapshot, LoopAnalysis},
    beliefbase::BeliefStore,
    config::EngineConfig,
    detect::CycleDetector,
    error::DoctrineError,
    event::{CycleEventKind, DoctrineCycleEvent, EventLog},
    properties::{
        BeliefNode, DoctrineLoop, EnumSet, LoopId, LoopStatus, NodeId, ResolutionMethod,
        SourceType,
    },
    registry::{LoopRegistry, ResolutionRecord},
    resolution::attempt_resolution,
    schedule::Debouncer,
};

/// Step used by [DoctrineEngine::strengthen_belief] and [DoctrineEngine::weaken_belief] callers
/// that have no better increment.
pub const DEFAULT_BELIEF_STEP: f64 = 0.1;

#[derive(Debug, Default)]
struct EngineState {
    store: BeliefStore,
    registry: LoopRegistry,
    events: EventLog,
}

impl EngineState {
    fn full_scan(&mut self) -> usize {
        let EngineState {
            store,
            registry,
            events,
        } = self;
        CycleDetector::scan_all(store, |cycle| {
            registry.process_detected_loop(store, cycle, events);
        })
    }

    fn targeted_scan(&mut self, start: NodeId) -> usize {
        let EngineState {
            store,
            registry,
            events,
        } = self;
        CycleDetector::scan_from(store, start, |cycle| {
            registry.process_detected_loop(store, cycle, events);
        })
    }

    /// Returns the previous strength.
    fn set_strength(&mut self, node_id: &NodeId, strength: f64) -> Result<f64, DoctrineError> {
        let EngineState {
            store,
            registry,
            events,
        } = self;
        let old = store.set_strength(node_id, strength)?;
        let refreshed = registry.refresh_containing(node_id, store, events);
        tracing::debug!(
            "[DoctrineEngine] node {node_id} strength {old:.3} -> {strength:.3}, {refreshed} loops rescored"
        );
        Ok(old)
    }
}

#[derive(Debug)]
struct EngineInner {
    state: RwLock<EngineState>,
    debouncer: Debouncer,
    config: EngineConfig,
}

impl EngineInner {
    fn debounced_scan(weak: Weak<EngineInner>) {
        match weak.upgrade() {
            Some(inner) => {
                let reported = inner.state.write().full_scan();
                tracing::debug!("[DoctrineEngine] debounced full scan reported {reported} cycles");
            }
            None => tracing::debug!("[DoctrineEngine] engine dropped before debounced scan"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DoctrineEngine {
    inner: Arc<EngineInner>,
}

impl Default for DoctrineEngine {
    fn default() -> Self {
        DoctrineEngine::new(EngineConfig::default())
    }
}

impl DoctrineEngine {
    /// Build an engine that schedules debounced scans on the current tokio runtime, if there is
    /// one.
    pub fn new(config: EngineConfig) -> Self {
        Self::with_runtime(config, Handle::try_current().ok())
    }

    pub fn with_runtime(config: EngineConfig, runtime: Option<Handle>) -> Self {
        Self::build(config, runtime, EventLog::default())
    }

    /// Like [DoctrineEngine::new], additionally forwarding every appended event to `sender`.
    pub fn with_event_sender(
        config: EngineConfig,
        sender: UnboundedSender<DoctrineCycleEvent>,
    ) -> Self {
        Self::build(
            config,
            Handle::try_current().ok(),
            EventLog::with_sender(sender),
        )
    }

    fn build(config: EngineConfig, runtime: Option<Handle>, events: EventLog) -> Self {
        tracing::debug!(
            "[DoctrineEngine] starting, debounce {:?}, scheduling {}",
            config.debounce(),
            if runtime.is_some() { "on" } else { "off" }
        );
        DoctrineEngine {
            inner: Arc::new(EngineInner {
                state: RwLock::new(EngineState {
                    events,
                    ..Default::default()
                }),
                debouncer: Debouncer::new(config.debounce(), runtime),
                config,
            }),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Attach or detach the event forwarder after construction.
    pub fn set_event_sender(&self, sender: Option<UnboundedSender<DoctrineCycleEvent>>) {
        self.inner.state.write().events.set_sender(sender);
    }

    fn schedule_full_scan(&self) {
        if !self.inner.config.detection.enabled {
            return;
        }
        let weak = Arc::downgrade(&self.inner);
        self.inner
            .debouncer
            .arm(move || EngineInner::debounced_scan(weak));
    }

    // Mutators

    /// Register a new belief node at the initial strength of 0.5 and arm the debounced full scan.
    pub fn add_node<I>(
        &self,
        content: impl Into<String>,
        source_type: SourceType,
        contradictions: I,
    ) -> NodeId
    where
        I: IntoIterator<Item = NodeId>,
    {
        let id = self
            .inner
            .state
            .write()
            .store
            .insert(BeliefNode::new(content, source_type, contradictions));
        tracing::debug!("[DoctrineEngine] added {source_type} node {id}");
        self.schedule_full_scan();
        id
    }

    /// Set a node's belief strength, clamped into `[0, 1]`, and rescore every loop containing it.
    /// Returns the previous strength.
    pub fn update_node_strength(
        &self,
        node_id: &NodeId,
        strength: f64,
    ) -> Result<f64, DoctrineError> {
        self.inner.state.write().set_strength(node_id, strength)
    }

    /// Raise a node's strength by `increment`. Returns the new, clamped strength.
    pub fn strengthen_belief(&self, node_id: &NodeId, increment: f64) -> Result<f64, DoctrineError> {
        self.shift_belief(node_id, increment)
    }

    /// Lower a node's strength by `decrement`. Returns the new, clamped strength.
    pub fn weaken_belief(&self, node_id: &NodeId, decrement: f64) -> Result<f64, DoctrineError> {
        self.shift_belief(node_id, -decrement)
    }

    fn shift_belief(&self, node_id: &NodeId, delta: f64) -> Result<f64, DoctrineError> {
        let mut state = self.inner.state.write();
        let current = state
            .store
            .get(node_id)
            .map(|node| node.belief_strength)
            .ok_or_else(|| DoctrineError::NotFound(format!("node {node_id}")))?;
        state.set_strength(node_id, current + delta)?;
        state
            .store
            .get(node_id)
            .map(|node| node.belief_strength)
            .ok_or_else(|| DoctrineError::NotFound(format!("node {node_id}")))
    }

    /// Add the edge `parent -> child` and run a targeted scan seeded at `child`.
    ///
    /// Adding an existing edge changes no adjacency, but the targeted scan still runs, so loops
    /// through the edge are rediscovered.
    pub fn add_connection(&self, parent: &NodeId, child: &NodeId) -> Result<(), DoctrineError> {
        let mut state = self.inner.state.write();
        let added = state.store.connect(parent, child)?;
        let reported = state.targeted_scan(*child);
        tracing::debug!(
            "[DoctrineEngine] connection {parent} -> {child} (new: {added}), targeted scan reported {reported} cycles"
        );
        Ok(())
    }

    /// Record that `node_id` contradicts `other` and rescore every loop containing `node_id`.
    /// A node never contradicts itself; that case is ignored.
    pub fn add_contradiction(&self, node_id: &NodeId, other: &NodeId) -> Result<(), DoctrineError> {
        let mut guard = self.inner.state.write();
        let EngineState {
            store,
            registry,
            events,
        } = &mut *guard;
        if store.add_contradiction(node_id, other)? {
            registry.refresh_containing(node_id, store, events);
        }
        Ok(())
    }

    pub fn add_supporting_evidence(
        &self,
        node_id: &NodeId,
        evidence: impl Into<String>,
    ) -> Result<(), DoctrineError> {
        self.inner
            .state
            .write()
            .store
            .add_evidence(node_id, evidence.into())
    }

    /// Apply `method` to the loop and return whether the attempt succeeded.
    pub fn attempt_loop_resolution(
        &self,
        loop_id: &LoopId,
        method: ResolutionMethod,
    ) -> Result<bool, DoctrineError> {
        let mut guard = self.inner.state.write();
        let EngineState { registry, events, .. } = &mut *guard;
        let lp = registry
            .get_mut(loop_id)
            .ok_or_else(|| DoctrineError::NotFound(format!("loop {loop_id}")))?;
        Ok(attempt_resolution(lp, method, events))
    }

    /// Run a full-graph scan now, cancelling any pending debounced one. Returns the number of
    /// cycles reported.
    pub fn detect_all_loops(&self) -> usize {
        if self.inner.debouncer.cancel() {
            tracing::debug!("[DoctrineEngine] pending debounced scan superseded");
        }
        self.inner.state.write().full_scan()
    }

    pub fn has_pending_scan(&self) -> bool {
        self.inner.debouncer.is_pending()
    }

    // Queries

    pub fn get_node(&self, node_id: &NodeId) -> Option<BeliefNode> {
        self.inner.state.read().store.get(node_id).cloned()
    }

    /// Nodes in registration order, optionally restricted to one source type.
    pub fn list_nodes(&self, source_type: Option<SourceType>) -> Vec<BeliefNode> {
        self.inner
            .state
            .read()
            .store
            .list(source_type)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn get_loop(&self, loop_id: &LoopId) -> Option<DoctrineLoop> {
        self.inner.state.read().registry.get(loop_id).cloned()
    }

    fn collect_loops<F>(&self, select: F) -> Vec<DoctrineLoop>
    where
        F: for<'a> Fn(&'a LoopRegistry) -> Vec<&'a DoctrineLoop>,
    {
        let state = self.inner.state.read();
        select(&state.registry).into_iter().cloned().collect()
    }

    /// Loops in first-detection order.
    pub fn list_loops(&self) -> Vec<DoctrineLoop> {
        self.collect_loops(|registry| registry.list())
    }

    pub fn list_loops_by_status(&self, status: LoopStatus) -> Vec<DoctrineLoop> {
        self.collect_loops(|registry| registry.by_status(status))
    }

    pub fn list_loops_in(&self, statuses: EnumSet<LoopStatus>) -> Vec<DoctrineLoop> {
        self.collect_loops(|registry| registry.in_statuses(statuses))
    }

    pub fn list_active_loops(&self) -> Vec<DoctrineLoop> {
        self.collect_loops(|registry| registry.active())
    }

    pub fn list_critical_loops(&self) -> Vec<DoctrineLoop> {
        self.list_loops_by_status(LoopStatus::Critical)
    }

    pub fn list_loops_above_tension_threshold(&self, threshold: f64) -> Vec<DoctrineLoop> {
        self.collect_loops(|registry| registry.above_tension(threshold))
    }

    pub fn list_loops_above_strength_threshold(&self, threshold: f64) -> Vec<DoctrineLoop> {
        self.collect_loops(|registry| registry.above_strength(threshold))
    }

    /// Loops above the configured default tension threshold.
    pub fn list_high_tension_loops(&self) -> Vec<DoctrineLoop> {
        self.list_loops_above_tension_threshold(self.inner.config.queries.tension_threshold)
    }

    /// Loops above the configured default strength threshold.
    pub fn list_strong_loops(&self) -> Vec<DoctrineLoop> {
        self.list_loops_above_strength_threshold(self.inner.config.queries.strength_threshold)
    }

    pub fn list_loops_containing_node(&self, node_id: &NodeId) -> Vec<DoctrineLoop> {
        self.collect_loops(|registry| registry.containing(node_id))
    }

    /// The `limit` most recent events, most recent first.
    pub fn list_recent_events(&self, limit: usize) -> Vec<DoctrineCycleEvent> {
        self.inner.state.read().events.recent(limit)
    }

    pub fn recent_events(&self) -> Vec<DoctrineCycleEvent> {
        self.list_recent_events(self.inner.config.queries.event_limit)
    }

    pub fn list_events_by_type(&self, kind: CycleEventKind) -> Vec<DoctrineCycleEvent> {
        self.inner.state.read().events.by_type(kind)
    }

    pub fn list_events_for_loop(&self, loop_id: &LoopId) -> Vec<DoctrineCycleEvent> {
        self.inner.state.read().events.for_loop(loop_id)
    }

    pub fn recent_resolution_attempts(&self, limit: usize) -> Vec<ResolutionRecord> {
        self.inner
            .state
            .read()
            .registry
            .recent_resolution_attempts(limit)
    }

    pub fn recent_resolutions(&self) -> Vec<ResolutionRecord> {
        self.recent_resolution_attempts(self.inner.config.queries.resolution_limit)
    }

    pub fn metrics(&self) -> DoctrineMetrics {
        let state = self.inner.state.read();
        DoctrineMetrics::collect(
            &state.store,
            &state.registry,
            self.inner.config.queries.tension_threshold,
        )
    }

    pub fn loop_analysis(&self, loop_id: &LoopId) -> Result<LoopAnalysis, DoctrineError> {
        let state = self.inner.state.read();
        let lp = state
            .registry
            .get(loop_id)
            .ok_or_else(|| DoctrineError::NotFound(format!("loop {loop_id}")))?;
        Ok(LoopAnalysis::of(lp, &state.store))
    }

    pub fn snapshot(&self) -> DoctrineSnapshot {
        let state = self.inner.state.read();
        DoctrineSnapshot {
            nodes: state.store.iter().cloned().collect(),
            loops: state.registry.iter().cloned().collect(),
            events: state.events.recent(self.inner.config.queries.event_limit),
            metrics: DoctrineMetrics::collect(
                &state.store,
                &state.registry,
                self.inner.config.queries.tension_threshold,
            ),
        }
    }

    /// Strongly connected regions of the belief graph that contain at least one cycle.
    pub fn tangled_components(&self) -> Vec<Vec<NodeId>> {
        self.inner.state.read().store.tangled_components()
    }
}
