//! Error types for the controller.
//!
//! Defines custom error types with classification for retry behavior.

use std::time::Duration;
use thiserror::Error;

use crate::controller::state_machine::ReconcilePhase;

/// Error type for controller operations
#[derive(Error, Debug)]
pub enum Error {
    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    /// Shared or node parameter map is absent from the request
    #[error("nodeParameters or sharedParameters or both are missing, and they cannot be empty")]
    MissingParameters,

    /// A node parameter has no value for the target node
    #[error("node parameter {parameter} has no value for node {node}")]
    MissingNodeParameter { parameter: String, node: String },

    /// No pod matched the agent pod selector
    #[error("no fence agent pod found in namespace {namespace} with selector {selector}")]
    AgentPodNotFound { namespace: String, selector: String },

    /// The exec transport failed before the agent produced a response
    #[error("fence agent execution failed: {0}")]
    Execution(String),

    /// The agent ran but its output did not match the success shape
    #[error(
        "unknown fence agent response - expecting non-empty stdout and empty stderr, but received stdout `{stdout}` and stderr `{stderr}`"
    )]
    UnexpectedResponse { stdout: String, stderr: String },

    /// The orchestrator attempted a phase transition outside its table
    #[error("invalid reconcile transition from {from} to {to}")]
    InvalidTransition {
        from: ReconcilePhase,
        to: ReconcilePhase,
    },

    /// Invalid operator configuration
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Coarse classification of errors, used for retry decisions and metrics.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    /// The request or node vanished; nothing left to do.
    NotFound,
    /// The request is malformed and needs a spec change.
    Validation,
    /// Infrastructure hiccup; redelivery is expected to succeed.
    TransientInfra,
    /// The agent answered outside its success contract.
    UnexpectedResponse,
}

impl Error {
    /// Check if this error indicates a not-found condition
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Kube(kube::Error::Api(e)) if e.code == 404)
    }

    /// Check if this error is an optimistic-concurrency conflict
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Kube(kube::Error::Api(e)) if e.code == 409)
    }

    /// Classify this error
    pub fn classify(&self) -> ErrorClass {
        match self {
            Error::Kube(kube::Error::Api(e)) if e.code == 404 => ErrorClass::NotFound,
            Error::Kube(kube::Error::Api(e)) if e.code == 400 || e.code == 422 => {
                ErrorClass::Validation
            }
            Error::Kube(_) | Error::AgentPodNotFound { .. } | Error::Execution(_) => {
                ErrorClass::TransientInfra
            }
            Error::MissingParameters
            | Error::MissingNodeParameter { .. }
            | Error::InvalidTransition { .. }
            | Error::Config(_) => ErrorClass::Validation,
            Error::UnexpectedResponse { .. } => ErrorClass::UnexpectedResponse,
        }
    }

    /// Check if this error should be retried
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Kube(e) => {
                // Retry on conflicts, rate limiting, server and network errors
                matches!(
                    e,
                    kube::Error::Api(api_err)
                        if api_err.code >= 500 || api_err.code == 429 || api_err.code == 409
                ) || matches!(e, kube::Error::Service(_) | kube::Error::HyperError(_))
            }
            Error::AgentPodNotFound { .. } | Error::Execution(_) => true,
            Error::MissingParameters
            | Error::MissingNodeParameter { .. }
            | Error::UnexpectedResponse { .. }
            | Error::InvalidTransition { .. }
            | Error::Config(_) => false,
        }
    }

    /// Get the recommended requeue duration for this error
    pub fn requeue_after(&self) -> Duration {
        if self.is_conflict() {
            // Someone else wrote first; re-read promptly
            Duration::from_secs(1)
        } else if self.is_retryable() {
            Duration::from_secs(10)
        } else {
            Duration::from_secs(300)
        }
    }
}
