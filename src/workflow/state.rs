//! Workflow states and the transition table.

use std::fmt;

use tracing::{debug, error};

/// Where a run (or a nested candidate admission) currently stands.
///
/// ```text
/// Init ─► Validated ─► Analyzed ─► AwaitingClarification ◄─► Clarified
///   │         │           │               │        │
///   │         │           │               │        └─► Cancelled
///   ▼         ▼           ▼               ▼
/// Failed ◄────┴───────────┴──── Optimizing ◄┘ (retry: Optimizing ─► Optimizing)
///                                   │
///                                   └─► Done
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkflowState {
    Init,
    Validated,
    Analyzed,
    AwaitingClarification,
    Clarified,
    Optimizing,
    Done,
    Cancelled,
    Failed,
}

impl WorkflowState {
    pub fn can_transition_to(self, next: WorkflowState) -> bool {
        use WorkflowState::*;
        matches!(
            (self, next),
            (Init, Validated)
                | (Init, Failed)
                | (Validated, Analyzed)
                | (Validated, Failed)
                | (Analyzed, AwaitingClarification)
                | (Analyzed, Failed)
                | (AwaitingClarification, Clarified)
                | (AwaitingClarification, Optimizing)
                | (AwaitingClarification, Cancelled)
                | (AwaitingClarification, Failed)
                | (Clarified, AwaitingClarification)
                | (Optimizing, Optimizing)
                | (Optimizing, Done)
                | (Optimizing, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, WorkflowState::Done | WorkflowState::Cancelled | WorkflowState::Failed)
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Current state of one run, logging every transition.
#[derive(Debug)]
pub(crate) struct StateTracker {
    label: &'static str,
    state: WorkflowState,
}

impl StateTracker {
    pub(crate) fn new(label: &'static str) -> Self {
        Self {
            label,
            state: WorkflowState::Init,
        }
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> WorkflowState {
        self.state
    }

    pub(crate) fn advance(&mut self, next: WorkflowState) {
        if !self.state.can_transition_to(next) {
            error!(run = self.label, from = %self.state, to = %next, "illegal workflow transition");
            debug_assert!(false, "illegal transition {} -> {}", self.state, next);
        }
        debug!(run = self.label, from = %self.state, to = %next, "workflow transition");
        self.state = next;
    }
}
