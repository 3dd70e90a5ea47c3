//! Resolution strategies for doctrine loops.
//!
//! | method | impact | succeeds when |
//! |---|---|---|
//! | ritual intervention | `max(0, tension - 0.3)` | impact > 0.5 |
//! | tribunal processing | `min(1, tension + 0.2)` | impact > 0.6 |
//! | agent mediation | `max(0, 0.7 - abs(tension - 0.5))` | impact > 0.4 |
//! | symbolic integration | `min(1, strength * 0.8 + 0.2)` | impact > 0.7 |
//!
//! A successful attempt whose impact also exceeds [DISSOLUTION_IMPACT] dissolves the loop.

use std::time::SystemTime;

use crate::{
    event::{CycleEventKind, DoctrineCycleEvent, EventLog},
    properties::{
        clamp_unit, doctrine_node_bytes, DoctrineLoop, LoopStatus, ResolutionAttempt,
        ResolutionMethod, Uuid,
    },
};

pub const DISSOLUTION_IMPACT: f64 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolutionOutcome {
    pub impact_level: f64,
    pub success: bool,
}

impl ResolutionMethod {
    pub fn success_threshold(&self) -> f64 {
        match self {
            ResolutionMethod::RitualIntervention => 0.5,
            ResolutionMethod::TribunalProcessing => 0.6,
            ResolutionMethod::AgentMediation => 0.4,
            ResolutionMethod::SymbolicIntegration => 0.7,
        }
    }

    pub fn notes(&self) -> &'static str {
        match self {
            ResolutionMethod::RitualIntervention => "Symbolic processing of contradictory beliefs",
            ResolutionMethod::TribunalProcessing => {
                "Logical evaluation and judgment of belief conflicts"
            }
            ResolutionMethod::AgentMediation => {
                "Multi-agent coordination and perspective integration"
            }
            ResolutionMethod::SymbolicIntegration => "Deep symbolic pattern integration",
        }
    }

    pub fn impact(&self, cycle_strength: f64, contradiction_tension: f64) -> f64 {
        let impact = match self {
            ResolutionMethod::RitualIntervention => (contradiction_tension - 0.3).max(0.0),
            ResolutionMethod::TribunalProcessing => (contradiction_tension + 0.2).min(1.0),
            ResolutionMethod::AgentMediation => {
                (0.7 - (contradiction_tension - 0.5).abs()).max(0.0)
            }
            ResolutionMethod::SymbolicIntegration => (cycle_strength * 0.8 + 0.2).min(1.0),
        };
        clamp_unit(impact)
    }

    pub fn evaluate(&self, lp: &DoctrineLoop) -> ResolutionOutcome {
        let impact_level = self.impact(lp.cycle_strength, lp.contradiction_tension);
        ResolutionOutcome {
            impact_level,
            success: impact_level > self.success_threshold(),
        }
    }
}

/// Apply `method` to `lp`, append the attempt, and log the outcome. Returns the attempt's
/// success.
///
/// Resolution attempts are the only way into [LoopStatus::Dissolved]. A loop that is already
/// dissolved still records further attempts, but is not dissolved a second time.
pub fn attempt_resolution(
    lp: &mut DoctrineLoop,
    method: ResolutionMethod,
    events: &mut EventLog,
) -> bool {
    let ResolutionOutcome {
        impact_level,
        success,
    } = method.evaluate(lp);

    lp.resolution_attempts.push(ResolutionAttempt {
        id: Uuid::now_v6(&doctrine_node_bytes()),
        method,
        timestamp: SystemTime::now(),
        success,
        impact_level,
        notes: method.notes().to_string(),
        resulting_changes: Vec::new(),
    });
    tracing::info!(
        "[Resolution] {method} on loop {}: impact {impact_level:.3}, success {success}",
        lp.id
    );

    if success && impact_level > DISSOLUTION_IMPACT && !lp.status.is_terminal() {
        lp.status = LoopStatus::Dissolved;
        events.push(DoctrineCycleEvent::new(
            CycleEventKind::LoopDissolved,
            lp.id,
            format!("Loop resolved using {method}"),
            &lp.nodes,
        ));
    }

    events.push(DoctrineCycleEvent::new(
        CycleEventKind::ResolutionAttempted,
        lp.id,
        format!(
            "{method} attempted with {}",
            if success { "success" } else { "failure" }
        ),
        &lp.nodes,
    ));

    success
}
