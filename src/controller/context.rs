//! Shared context for the controller.
//!
//! The Context struct holds everything a reconciliation needs: the cluster
//! client, the fence agent executor, the operator configuration and the
//! optional health state used for metrics.

use std::sync::Arc;

use kube::Client;

use crate::client::{ClusterClient, KubeClusterClient, RemediationEvent};
use crate::config::OperatorConfig;
use crate::crd::FenceAgentsRemediation;
use crate::executor::{FenceAgentExecutor, PodExecutor};
use crate::health::HealthState;

/// Field manager name for the operator
pub const FIELD_MANAGER: &str = "fence-agents-remediation";

/// Event reasons published on FenceAgentsRemediation objects.
pub mod reasons {
    pub const ADD_FINALIZER: &str = "AddFinalizer";
    pub const REMOVE_FINALIZER: &str = "RemoveFinalizer";
    pub const ADD_REMEDIATION_TAINT: &str = "AddRemediationTaint";
    pub const FENCE_AGENT_EXECUTED: &str = "FenceAgentExecuted";
    pub const FENCE_AGENT_FAILED: &str = "FenceAgentFailed";
    pub const INVALID_PARAMETERS: &str = "InvalidParameters";
}

/// Shared context for the controller
#[derive(Clone)]
pub struct Context {
    /// Cluster access
    pub client: Arc<dyn ClusterClient>,
    /// Runs fence agents in the agent pod
    pub executor: Arc<dyn FenceAgentExecutor>,
    /// Operator configuration
    pub config: Arc<OperatorConfig>,
    /// Optional health state for metrics and readiness
    pub health_state: Option<Arc<HealthState>>,
}

impl Context {
    /// Create a context from explicit collaborators.
    pub fn new(
        client: Arc<dyn ClusterClient>,
        executor: Arc<dyn FenceAgentExecutor>,
        config: OperatorConfig,
        health_state: Option<Arc<HealthState>>,
    ) -> Self {
        Self {
            client,
            executor,
            config: Arc::new(config),
            health_state,
        }
    }

    /// Create a context talking to a real API server.
    pub fn from_kube(
        client: Client,
        config: OperatorConfig,
        health_state: Option<Arc<HealthState>>,
    ) -> Self {
        let executor = PodExecutor::new(
            client.clone(),
            config.agent_container.clone(),
            config.fence_agent_timeout,
        );
        Self::new(
            Arc::new(KubeClusterClient::new(client)),
            Arc::new(executor),
            config,
            health_state,
        )
    }

    /// Publish a normal event for a remediation
    pub async fn publish_normal_event(
        &self,
        remediation: &FenceAgentsRemediation,
        reason: &'static str,
        action: &'static str,
        note: impl Into<String>,
    ) {
        self.client
            .publish_event(remediation, RemediationEvent::normal(reason, action, note))
            .await;
    }

    /// Publish a warning event for a remediation
    pub async fn publish_warning_event(
        &self,
        remediation: &FenceAgentsRemediation,
        reason: &'static str,
        action: &'static str,
        note: impl Into<String>,
    ) {
        self.client
            .publish_event(remediation, RemediationEvent::warning(reason, action, note))
            .await;
    }
}
