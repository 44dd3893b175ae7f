//! FenceAgentsRemediation Custom Resource Definition.
//!
//! A FenceAgentsRemediation is created by a health-detection system for an
//! unhealthy node. The resource name *is* the node name; the operator runs
//! the named fence agent against that node exactly once per taint lifetime.

use indexmap::IndexMap;
use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Finalizer that defers deletion until the remediation taint is removed.
pub const FAR_FINALIZER: &str = "fence-agents-remediation.medik8s.io/far-finalizer";

/// Key of the remediation taint placed on fenced nodes.
pub const FAR_TAINT_KEY: &str = "medik8s.io/fence-agents-remediation";

/// Effect of the remediation taint.
pub const FAR_TAINT_EFFECT: &str = "NoExecute";

/// Output a fence agent prints after a successful reboot.
///
/// Only end-to-end tooling compares against this literal; the controller
/// checks the response shape instead.
pub const SUCCESS_FA_RESPONSE: &str = "Success: Rebooted";

/// Name of a fence agent command-line flag (e.g. `--ipport`).
pub type ParameterName = String;

/// Name of a cluster node.
pub type NodeName = String;

/// Flag name to value, applied to every target node.
///
/// Insertion-ordered so the rendered argument list is deterministic, in the
/// order the API server returns the keys.
pub type SharedParameters = IndexMap<ParameterName, String>;

/// Flag name to per-node values.
pub type NodeParameters = IndexMap<ParameterName, IndexMap<NodeName, String>>;

/// FenceAgentsRemediation requests out-of-band fencing of a node.
///
/// Example:
/// ```yaml
/// apiVersion: fence-agents-remediation.medik8s.io/v1alpha1
/// kind: FenceAgentsRemediation
/// metadata:
///   name: worker-0
///   namespace: fence-agents-remediation
/// spec:
///   agent: fence_ipmilan
///   sharedParameters:
///     --username: admin
///     --lanplus: ""
///   nodeParameters:
///     --ipport:
///       worker-0: "6233"
/// ```
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "fence-agents-remediation.medik8s.io",
    version = "v1alpha1",
    kind = "FenceAgentsRemediation",
    plural = "fenceagentsremediations",
    shortname = "far",
    status = "FenceAgentsRemediationStatus",
    namespaced,
    printcolumn = r#"{"name":"Agent", "type":"string", "jsonPath":".spec.agent"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct FenceAgentsRemediationSpec {
    /// Name of the fence agent executable (e.g. `fence_ipmilan`).
    pub agent: String,

    /// Parameters passed to every invocation regardless of the target node.
    /// An empty value renders as a bare flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared_parameters: Option<SharedParameters>,

    /// Per-node parameter values, keyed by flag name and then node name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_parameters: Option<NodeParameters>,
}

/// Observed state of a FenceAgentsRemediation.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FenceAgentsRemediationStatus {
    /// Conditions describing remediation progress.
    #[serde(default)]
    pub conditions: Vec<Condition>,

    /// Last time the status was written (RFC 3339).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_update_time: Option<String>,
}

/// Condition describes the state of a remediation at a certain point.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition.
    pub r#type: String,
    /// Status of the condition ("True", "False", "Unknown").
    pub status: String,
    /// Machine-readable reason for the condition's last transition.
    pub reason: String,
    /// Human-readable message indicating details about last transition.
    pub message: String,
    /// Last time the condition transitioned from one status to another.
    pub last_transition_time: String,
    /// The generation of the resource this condition was observed for.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

impl Condition {
    /// Create a new condition.
    pub fn new(
        condition_type: ConditionType,
        status: bool,
        reason: &str,
        message: &str,
        generation: Option<i64>,
    ) -> Self {
        Self {
            r#type: condition_type.to_string(),
            status: if status {
                "True".to_string()
            } else {
                "False".to_string()
            },
            reason: reason.to_string(),
            message: message.to_string(),
            last_transition_time: jiff::Timestamp::now().to_string(),
            observed_generation: generation,
        }
    }

    /// Create a "Processing" condition.
    pub fn processing(
        processing: bool,
        reason: &str,
        message: &str,
        generation: Option<i64>,
    ) -> Self {
        Self::new(
            ConditionType::Processing,
            processing,
            reason,
            message,
            generation,
        )
    }

    /// Create a "FenceAgentActionSucceeded" condition.
    pub fn fence_agent_action_succeeded(
        succeeded: bool,
        reason: &str,
        message: &str,
        generation: Option<i64>,
    ) -> Self {
        Self::new(
            ConditionType::FenceAgentActionSucceeded,
            succeeded,
            reason,
            message,
            generation,
        )
    }

    /// Create a "Succeeded" condition.
    pub fn succeeded(
        succeeded: bool,
        reason: &str,
        message: &str,
        generation: Option<i64>,
    ) -> Self {
        Self::new(ConditionType::Succeeded, succeeded, reason, message, generation)
    }
}

/// Standard condition types for FenceAgentsRemediation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConditionType {
    /// The node is tainted and remediation is underway.
    Processing,
    /// The fence agent ran and answered with a success-shaped response.
    FenceAgentActionSucceeded,
    /// Remediation finished.
    Succeeded,
}

impl std::fmt::Display for ConditionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConditionType::Processing => write!(f, "Processing"),
            ConditionType::FenceAgentActionSucceeded => write!(f, "FenceAgentActionSucceeded"),
            ConditionType::Succeeded => write!(f, "Succeeded"),
        }
    }
}

impl FenceAgentsRemediation {
    /// Name of the node this remediation targets.
    pub fn node_name(&self) -> String {
        self.name_any()
    }

    /// Whether the remediation finalizer is attached.
    pub fn has_finalizer(&self) -> bool {
        self.finalizers().iter().any(|f| f == FAR_FINALIZER)
    }

    /// Whether the API server has marked this object for deletion.
    pub fn is_being_deleted(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }
}
