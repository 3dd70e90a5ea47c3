use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Formatter},
    time::SystemTime,
};
use tokio::sync::mpsc::UnboundedSender;

use crate::{
    error::DoctrineError,
    properties::{LoopId, NodeId},
};

/// Lifecycle transitions recorded against a doctrine loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleEventKind {
    LoopDetected,
    LoopStrengthened,
    LoopWeakened,
    ResolutionAttempted,
    LoopDissolved,
}

impl Display for CycleEventKind {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            CycleEventKind::LoopDetected => write!(f, "loop_detected"),
            CycleEventKind::LoopStrengthened => write!(f, "loop_strengthened"),
            CycleEventKind::LoopWeakened => write!(f, "loop_weakened"),
            CycleEventKind::ResolutionAttempted => write!(f, "resolution_attempted"),
            CycleEventKind::LoopDissolved => write!(f, "loop_dissolved"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoctrineCycleEvent {
    pub timestamp: SystemTime,
    pub event_type: CycleEventKind,
    pub loop_id: LoopId,
    pub details: String,
    pub affected_nodes: Vec<NodeId>,
}

impl DoctrineCycleEvent {
    pub fn new(
        event_type: CycleEventKind,
        loop_id: LoopId,
        details: impl Into<String>,
        affected_nodes: &[NodeId],
    ) -> Self {
        DoctrineCycleEvent {
            timestamp: SystemTime::now(),
            event_type,
            loop_id,
            details: details.into(),
            affected_nodes: affected_nodes.to_vec(),
        }
    }
}

/// Append-only, process-wide log of [DoctrineCycleEvent]s.
///
/// Entries are kept in append order, which is also timestamp order, so the most recent events
/// are read back from the tail. When a sender is attached every appended event is forwarded to
/// it as well.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Vec<DoctrineCycleEvent>,
    sender: Option<UnboundedSender<DoctrineCycleEvent>>,
}

impl EventLog {
    pub fn with_sender(sender: UnboundedSender<DoctrineCycleEvent>) -> Self {
        EventLog {
            events: Vec::new(),
            sender: Some(sender),
        }
    }

    pub(crate) fn set_sender(&mut self, sender: Option<UnboundedSender<DoctrineCycleEvent>>) {
        self.sender = sender;
    }

    pub fn push(&mut self, event: DoctrineCycleEvent) {
        tracing::debug!(
            "[EventLog] {} for loop {}: {}",
            event.event_type,
            event.loop_id,
            event.details
        );
        if let Some(sender) = self.sender.as_ref() {
            if let Err(e) = sender.send(event.clone()).map_err(DoctrineError::from) {
                tracing::warn!("[EventLog] dropping event forwarder: {e}");
                self.sender = None;
            }
        }
        self.events.push(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Most recent first.
    pub fn recent(&self, limit: usize) -> Vec<DoctrineCycleEvent> {
        self.events.iter().rev().take(limit).cloned().collect()
    }

    /// Most recent first.
    pub fn by_type(&self, kind: CycleEventKind) -> Vec<DoctrineCycleEvent> {
        self.events
            .iter()
            .rev()
            .filter(|event| event.event_type == kind)
            .cloned()
            .collect()
    }

    pub fn for_loop(&self, loop_id: &LoopId) -> Vec<DoctrineCycleEvent> {
        self.events
            .iter()
            .rev()
            .filter(|event| event.loop_id == *loop_id)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;
    use tokio::sync::mpsc::unbounded_channel;

    fn loop_id() -> LoopId {
        LoopId::from_members(&[NodeId::new(), NodeId::new()])
    }

    #[test]
    fn test_recent_is_most_recent_first() {
        let id = loop_id();
        let mut log = EventLog::default();
        log.push(DoctrineCycleEvent::new(CycleEventKind::LoopDetected, id, "first", &[]));
        log.push(DoctrineCycleEvent::new(CycleEventKind::LoopWeakened, id, "second", &[]));
        log.push(DoctrineCycleEvent::new(CycleEventKind::LoopStrengthened, id, "third", &[]));

        let recent = log.recent(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].details, "third");
        assert_eq!(recent[1].details, "second");
        assert_eq!(log.recent(10).len(), 3);
        assert!(log.recent(0).is_empty());
    }

    #[test]
    fn test_by_type_filters() {
        let id = loop_id();
        let mut log = EventLog::default();
        log.push(DoctrineCycleEvent::new(CycleEventKind::LoopDetected, id, "a", &[]));
        log.push(DoctrineCycleEvent::new(CycleEventKind::ResolutionAttempted, id, "b", &[]));
        log.push(DoctrineCycleEvent::new(CycleEventKind::ResolutionAttempted, id, "c", &[]));

        let attempted = log.by_type(CycleEventKind::ResolutionAttempted);
        assert_eq!(attempted.len(), 2);
        assert_eq!(attempted[0].details, "c");
        assert!(log.by_type(CycleEventKind::LoopDissolved).is_empty());
    }

    #[test]
    fn test_sender_receives_events_and_closed_channel_is_tolerated() {
        let id = loop_id();
        let (tx, mut rx) = unbounded_channel();
        let mut log = EventLog::with_sender(tx);
        log.push(DoctrineCycleEvent::new(CycleEventKind::LoopDetected, id, "a", &[]));
        let received = rx.try_recv().unwrap();
        assert_eq!(received.event_type, CycleEventKind::LoopDetected);

        drop(rx);
        log.push(DoctrineCycleEvent::new(CycleEventKind::LoopWeakened, id, "b", &[]));
        assert_eq!(log.len(), 2);
    }
}
