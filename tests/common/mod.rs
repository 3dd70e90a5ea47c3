//! Shared test utilities for integration tests.
//!
//! Import from integration test files as:
//! ```ignore
//! mod common;
//! ```

use doctrine_loop::{
    config::EngineConfig,
    engine::DoctrineEngine,
    properties::{NodeId, SourceType},
};

/// Initialize tracing for tests, respecting RUST_LOG env var.
///
/// Safe to call multiple times; subsequent calls are no-ops.
#[allow(dead_code)]
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

/// An engine that never schedules debounced scans.
#[allow(dead_code)]
pub fn offline_engine() -> DoctrineEngine {
    DoctrineEngine::with_runtime(EngineConfig::default(), None)
}

/// An engine config with a short debounce window for timer tests.
#[allow(dead_code)]
pub fn fast_config(debounce_ms: u64) -> EngineConfig {
    let mut config = EngineConfig::default();
    config.detection.debounce_ms = debounce_ms;
    config
}

/// Register `n` reflection nodes without connecting them.
#[allow(dead_code)]
pub fn add_nodes(engine: &DoctrineEngine, n: usize) -> Vec<NodeId> {
    (0..n)
        .map(|i| engine.add_node(format!("belief {i}"), SourceType::Reflection, []))
        .collect()
}

/// Connect `ids` into a ring, closing it with `ids[last] -> ids[0]`.
#[allow(dead_code)]
pub fn close_ring(engine: &DoctrineEngine, ids: &[NodeId]) {
    for (i, id) in ids.iter().enumerate() {
        engine
            .add_connection(id, &ids[(i + 1) % ids.len()])
            .unwrap();
    }
}
