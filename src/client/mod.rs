//! Kubernetes access used by the remediation controller.
//!
//! The controller talks to the API server only through [`ClusterClient`],
//! so reconciliation logic can run against an in-memory cluster in tests.
//! Every write is a full replace carrying the `resourceVersion` that was
//! read, which makes concurrent modifications fail with a 409 conflict
//! instead of being merged.

mod kube_client;

pub use kube_client::KubeClusterClient;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Node, Pod};
use kube::runtime::events::EventType;

#[cfg(test)]
use mockall::automock;

use crate::controller::error::Error;
use crate::crd::{FenceAgentsRemediation, FenceAgentsRemediationStatus};

/// A Kubernetes event about a FenceAgentsRemediation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemediationEvent {
    /// Normal or Warning.
    pub type_: EventType,
    /// Machine-readable reason (e.g. `AddFinalizer`).
    pub reason: &'static str,
    /// Action taken (e.g. `Remediating`).
    pub action: &'static str,
    /// Human-readable detail.
    pub note: Option<String>,
}

impl RemediationEvent {
    /// Build a Normal event.
    pub fn normal(reason: &'static str, action: &'static str, note: impl Into<String>) -> Self {
        Self {
            type_: EventType::Normal,
            reason,
            action,
            note: Some(note.into()),
        }
    }

    /// Build a Warning event.
    pub fn warning(reason: &'static str, action: &'static str, note: impl Into<String>) -> Self {
        Self {
            type_: EventType::Warning,
            reason,
            action,
            note: Some(note.into()),
        }
    }
}

/// Cluster operations needed by the remediation controller.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Fetch a FenceAgentsRemediation; `None` if it does not exist.
    async fn get_remediation(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<FenceAgentsRemediation>, Error>;

    /// Replace a FenceAgentsRemediation, conditional on its resourceVersion.
    async fn replace_remediation(
        &self,
        remediation: &FenceAgentsRemediation,
    ) -> Result<FenceAgentsRemediation, Error>;

    /// Write the status subresource of a FenceAgentsRemediation.
    async fn patch_remediation_status(
        &self,
        namespace: &str,
        name: &str,
        status: &FenceAgentsRemediationStatus,
    ) -> Result<(), Error>;

    /// Names of all nodes in the cluster.
    async fn list_node_names(&self) -> Result<Vec<String>, Error>;

    /// Fetch a node; `None` if it does not exist.
    async fn get_node(&self, name: &str) -> Result<Option<Node>, Error>;

    /// Replace a node, conditional on its resourceVersion.
    async fn replace_node(&self, node: &Node) -> Result<Node, Error>;

    /// Pods in `namespace` matching `label_selector`.
    async fn list_pods(&self, namespace: &str, label_selector: &str) -> Result<Vec<Pod>, Error>;

    /// Publish an event for a remediation. Failures are logged, not returned.
    async fn publish_event(&self, remediation: &FenceAgentsRemediation, event: RemediationEvent);
}
