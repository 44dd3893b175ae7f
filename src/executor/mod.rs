//! Fence agent execution.
//!
//! The fence agent is an opaque executable that lives in the operator's
//! agent pod. [`FenceAgentExecutor`] runs a command there and hands back the
//! raw output; [`validate_response`] decides whether that output has the
//! shape of a successful run.

mod pod_exec;

pub use pod_exec::{PodExecutor, SUCCESS_COMMAND_LOG};

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;

#[cfg(test)]
use mockall::automock;

use crate::controller::error::Error;

/// Raw output of a fence agent run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
}

impl ExecOutput {
    pub fn new(stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }
}

/// Runs a command inside a pod.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait FenceAgentExecutor: Send + Sync {
    /// Run `command` (agent name first) in `pod`.
    ///
    /// Transport failures are returned as errors; whatever the agent
    /// printed is returned as-is.
    async fn execute(&self, pod: &Pod, command: &[String]) -> Result<ExecOutput, Error>;
}

/// Check the agent output: empty stderr and non-empty stdout.
///
/// The agent's stdout is free text, so nothing beyond non-emptiness is
/// checked.
pub fn validate_response(output: ExecOutput) -> Result<String, Error> {
    if output.stderr.is_empty() && !output.stdout.is_empty() {
        Ok(output.stdout)
    } else {
        Err(Error::UnexpectedResponse {
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}
