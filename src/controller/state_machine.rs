//! Phase table for a single reconciliation pass.
//!
//! Every pass starts in `Fetching` and ends in `Done` or `Error`. The
//! orchestrator advances through `PhaseTracker`, which rejects transitions
//! that are not in the table and keeps the visited sequence for logging and
//! tests.

use std::fmt;

/// Phases of one reconciliation pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReconcilePhase {
    /// Loading the FenceAgentsRemediation by name.
    Fetching,
    /// Checking that the resource name matches a node.
    NodeValidating,
    /// Finalizer attach/detach and deletion cleanup.
    LifecycleHandling,
    /// Reading the taint gate and applying the remediation taint.
    Tainting,
    /// Assembling fence agent arguments.
    ParameterBuilding,
    /// Running the fence agent in the agent pod.
    Executing,
    /// Checking the agent output.
    ResponseValidating,
    /// Pass finished (success or benign no-op).
    Done,
    /// Pass failed; the error is surfaced for redelivery.
    Error,
}

impl fmt::Display for ReconcilePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconcilePhase::Fetching => write!(f, "Fetching"),
            ReconcilePhase::NodeValidating => write!(f, "NodeValidating"),
            ReconcilePhase::LifecycleHandling => write!(f, "LifecycleHandling"),
            ReconcilePhase::Tainting => write!(f, "Tainting"),
            ReconcilePhase::ParameterBuilding => write!(f, "ParameterBuilding"),
            ReconcilePhase::Executing => write!(f, "Executing"),
            ReconcilePhase::ResponseValidating => write!(f, "ResponseValidating"),
            ReconcilePhase::Done => write!(f, "Done"),
            ReconcilePhase::Error => write!(f, "Error"),
        }
    }
}

impl ReconcilePhase {
    /// Whether the pass ends in this phase.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReconcilePhase::Done | ReconcilePhase::Error)
    }
}

/// Allowed transitions. Every non-terminal phase may also move to `Error`.
const TRANSITIONS: &[(ReconcilePhase, ReconcilePhase)] = &[
    // Request vanished between enqueue and fetch
    (ReconcilePhase::Fetching, ReconcilePhase::Done),
    (ReconcilePhase::Fetching, ReconcilePhase::NodeValidating),
    // Not addressed to a real node
    (ReconcilePhase::NodeValidating, ReconcilePhase::Done),
    (ReconcilePhase::NodeValidating, ReconcilePhase::LifecycleHandling),
    // Finalizer added, or deletion cleanup finished
    (ReconcilePhase::LifecycleHandling, ReconcilePhase::Done),
    (ReconcilePhase::LifecycleHandling, ReconcilePhase::Tainting),
    // Taint was already present: fencing was triggered earlier
    (ReconcilePhase::Tainting, ReconcilePhase::Done),
    (ReconcilePhase::Tainting, ReconcilePhase::ParameterBuilding),
    (ReconcilePhase::ParameterBuilding, ReconcilePhase::Executing),
    (ReconcilePhase::Executing, ReconcilePhase::ResponseValidating),
    (ReconcilePhase::ResponseValidating, ReconcilePhase::Done),
];

/// Check whether `from -> to` is a legal transition.
pub fn can_transition(from: ReconcilePhase, to: ReconcilePhase) -> bool {
    if from.is_terminal() {
        return false;
    }
    if to == ReconcilePhase::Error {
        return true;
    }
    TRANSITIONS.iter().any(|&(f, t)| f == from && t == to)
}

/// Tracks the current phase of a pass and the path taken to reach it.
#[derive(Debug, Clone)]
pub struct PhaseTracker {
    visited: Vec<ReconcilePhase>,
}

impl Default for PhaseTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl PhaseTracker {
    /// Start a pass in `Fetching`.
    pub fn new() -> Self {
        Self {
            visited: vec![ReconcilePhase::Fetching],
        }
    }

    /// Current phase.
    pub fn current(&self) -> ReconcilePhase {
        self.visited
            .last()
            .copied()
            .unwrap_or(ReconcilePhase::Fetching)
    }

    /// Advance to `to`, returning the rejected pair if the table forbids it.
    pub fn advance(&mut self, to: ReconcilePhase) -> Result<(), (ReconcilePhase, ReconcilePhase)> {
        let from = self.current();
        if !can_transition(from, to) {
            return Err((from, to));
        }
        tracing::trace!(from = %from, to = %to, "Reconcile phase transition");
        self.visited.push(to);
        Ok(())
    }

    /// Move a failing pass to `Error`, returning the phase it failed in.
    ///
    /// A pass that already ended is left as is.
    pub fn fail(&mut self) -> ReconcilePhase {
        let failed_in = self.current();
        if !failed_in.is_terminal() {
            self.visited.push(ReconcilePhase::Error);
        }
        failed_in
    }

    /// Phases visited so far, in order.
    pub fn visited(&self) -> &[ReconcilePhase] {
        &self.visited
    }

    /// Consume the tracker, returning the visited phases.
    pub fn into_visited(self) -> Vec<ReconcilePhase> {
        self.visited
    }
}
