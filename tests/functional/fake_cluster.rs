//! In-memory collaborators for functional tests.
//!
//! `FakeCluster` stores remediations, nodes and pods and behaves like the
//! API server where the controller relies on it: writes carry the
//! resourceVersion that was read and fail with 409 when it is stale, and a
//! deleted object disappears once its last finalizer is removed.
//! `ScriptedExecutor` returns queued responses and records every command.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use indexmap::IndexMap;
use k8s_openapi::api::core::v1::{Node, NodeSpec, Pod, Taint};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use k8s_openapi::chrono::Utc;
use kube::ResourceExt;
use kube::api::ObjectMeta;
use kube::core::ErrorResponse;

use fence_agents_remediation::client::{ClusterClient, RemediationEvent};
use fence_agents_remediation::config::OperatorConfig;
use fence_agents_remediation::controller::context::Context;
use fence_agents_remediation::controller::error::Error;
use fence_agents_remediation::crd::{
    FAR_FINALIZER, FenceAgentsRemediation, FenceAgentsRemediationSpec,
    FenceAgentsRemediationStatus, SUCCESS_FA_RESPONSE,
};
use fence_agents_remediation::executor::{ExecOutput, FenceAgentExecutor};
use fence_agents_remediation::health::HealthState;

pub const NAMESPACE: &str = "default";
pub const AGENT_NAMESPACE: &str = "fence-agents";
pub const AGENT_LABEL: &str = "app=fence-agents-remediation-operator";

fn api_error(code: u16, reason: &str) -> Error {
    Error::Kube(kube::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message: format!("fake cluster: {reason}"),
        reason: reason.to_string(),
        code,
    }))
}

#[derive(Default)]
struct State {
    remediations: BTreeMap<String, FenceAgentsRemediation>,
    nodes: BTreeMap<String, Node>,
    pods: Vec<Pod>,
    events: Vec<RemediationEvent>,
    next_version: u64,
    mutations: usize,
    node_conflicts: usize,
    remediation_conflicts: usize,
}

impl State {
    fn bump(&mut self) -> String {
        self.next_version += 1;
        self.mutations += 1;
        self.next_version.to_string()
    }
}

/// In-memory cluster.
#[derive(Default)]
pub struct FakeCluster {
    state: Mutex<State>,
}

impl FakeCluster {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_node(&self, mut node: Node) {
        let mut state = self.state.lock().unwrap();
        state.next_version += 1;
        node.metadata.resource_version = Some(state.next_version.to_string());
        state.nodes.insert(node.name_any(), node);
    }

    pub fn remove_node(&self, name: &str) {
        self.state.lock().unwrap().nodes.remove(name);
    }

    pub fn add_pod(&self, pod: Pod) {
        self.state.lock().unwrap().pods.push(pod);
    }

    pub fn add_remediation(&self, mut remediation: FenceAgentsRemediation) {
        let mut state = self.state.lock().unwrap();
        state.next_version += 1;
        remediation.metadata.resource_version = Some(state.next_version.to_string());
        state
            .remediations
            .insert(remediation.name_any(), remediation);
    }

    /// Set the deletion timestamp, as the API server does on DELETE when
    /// finalizers are present.
    pub fn mark_deleted(&self, name: &str) {
        let mut state = self.state.lock().unwrap();
        let version = state.bump();
        let remediation = state.remediations.get_mut(name).unwrap();
        remediation.metadata.deletion_timestamp = Some(Time(Utc::now()));
        remediation.metadata.resource_version = Some(version);
    }

    /// Remove the remediation taint behind the controller's back.
    pub fn clear_node_taints(&self, name: &str) {
        let mut state = self.state.lock().unwrap();
        let version = state.bump();
        let node = state.nodes.get_mut(name).unwrap();
        if let Some(spec) = node.spec.as_mut() {
            spec.taints = None;
        }
        node.metadata.resource_version = Some(version);
    }

    /// Fail the next `count` node writes with a 409 conflict.
    pub fn inject_node_conflicts(&self, count: usize) {
        self.state.lock().unwrap().node_conflicts = count;
    }

    /// Fail the next `count` remediation writes with a 409 conflict.
    pub fn inject_remediation_conflicts(&self, count: usize) {
        self.state.lock().unwrap().remediation_conflicts = count;
    }

    pub fn remediation(&self, name: &str) -> Option<FenceAgentsRemediation> {
        self.state.lock().unwrap().remediations.get(name).cloned()
    }

    pub fn node(&self, name: &str) -> Option<Node> {
        self.state.lock().unwrap().nodes.get(name).cloned()
    }

    pub fn node_taints(&self, name: &str) -> Vec<Taint> {
        self.node(name)
            .and_then(|n| n.spec)
            .and_then(|s| s.taints)
            .unwrap_or_default()
    }

    pub fn event_reasons(&self) -> Vec<&'static str> {
        self.state
            .lock()
            .unwrap()
            .events
            .iter()
            .map(|e| e.reason)
            .collect()
    }

    /// Number of writes (node, remediation and status) accepted so far.
    pub fn mutations(&self) -> usize {
        self.state.lock().unwrap().mutations
    }
}

#[async_trait]
impl ClusterClient for FakeCluster {
    async fn get_remediation(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<FenceAgentsRemediation>, Error> {
        let state = self.state.lock().unwrap();
        Ok(state
            .remediations
            .get(name)
            .filter(|r| r.namespace().as_deref() == Some(namespace))
            .cloned())
    }

    async fn replace_remediation(
        &self,
        remediation: &FenceAgentsRemediation,
    ) -> Result<FenceAgentsRemediation, Error> {
        let mut state = self.state.lock().unwrap();
        let name = remediation.name_any();
        let Some(stored) = state.remediations.get(&name) else {
            return Err(api_error(404, "NotFound"));
        };
        if state.remediation_conflicts > 0 {
            state.remediation_conflicts -= 1;
            return Err(api_error(409, "Conflict"));
        }
        if stored.resource_version() != remediation.resource_version() {
            return Err(api_error(409, "Conflict"));
        }

        let mut updated = remediation.clone();
        // Status is only writable through the status subresource
        updated.status = stored.status.clone();
        updated.metadata.deletion_timestamp = stored.metadata.deletion_timestamp.clone();
        updated.metadata.resource_version = Some(state.bump());

        if updated.is_being_deleted() && updated.finalizers().is_empty() {
            state.remediations.remove(&name);
        } else {
            state.remediations.insert(name, updated.clone());
        }
        Ok(updated)
    }

    async fn patch_remediation_status(
        &self,
        _namespace: &str,
        name: &str,
        status: &FenceAgentsRemediationStatus,
    ) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap();
        if !state.remediations.contains_key(name) {
            return Err(api_error(404, "NotFound"));
        }
        let version = state.bump();
        if let Some(stored) = state.remediations.get_mut(name) {
            stored.status = Some(status.clone());
            stored.metadata.resource_version = Some(version);
        }
        Ok(())
    }

    async fn list_node_names(&self) -> Result<Vec<String>, Error> {
        Ok(self.state.lock().unwrap().nodes.keys().cloned().collect())
    }

    async fn get_node(&self, name: &str) -> Result<Option<Node>, Error> {
        Ok(self.state.lock().unwrap().nodes.get(name).cloned())
    }

    async fn replace_node(&self, node: &Node) -> Result<Node, Error> {
        let mut state = self.state.lock().unwrap();
        let name = node.name_any();
        let Some(stored) = state.nodes.get(&name) else {
            return Err(api_error(404, "NotFound"));
        };
        if state.node_conflicts > 0 {
            state.node_conflicts -= 1;
            return Err(api_error(409, "Conflict"));
        }
        if stored.resource_version() != node.resource_version() {
            return Err(api_error(409, "Conflict"));
        }

        let mut updated = node.clone();
        updated.metadata.resource_version = Some(state.bump());
        state.nodes.insert(name, updated.clone());
        Ok(updated)
    }

    async fn list_pods(&self, namespace: &str, label_selector: &str) -> Result<Vec<Pod>, Error> {
        let (key, value) = label_selector.split_once('=').unwrap_or((label_selector, ""));
        let state = self.state.lock().unwrap();
        Ok(state
            .pods
            .iter()
            .filter(|p| p.namespace().as_deref() == Some(namespace))
            .filter(|p| p.labels().get(key).map(String::as_str) == Some(value))
            .cloned()
            .collect())
    }

    async fn publish_event(&self, _remediation: &FenceAgentsRemediation, event: RemediationEvent) {
        self.state.lock().unwrap().events.push(event);
    }
}

/// Fence agent executor returning queued responses.
///
/// When the queue is empty every call succeeds with the canonical success
/// response.
#[derive(Default)]
pub struct ScriptedExecutor {
    responses: Mutex<VecDeque<Result<ExecOutput, Error>>>,
    calls: Mutex<Vec<(String, Vec<String>)>>,
}

impl ScriptedExecutor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_response(&self, response: Result<ExecOutput, Error>) {
        self.responses.lock().unwrap().push_back(response);
    }

    /// Commands received so far, in order.
    pub fn commands(&self) -> Vec<Vec<String>> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, command)| command.clone())
            .collect()
    }

    /// Pods the commands ran in, in order.
    pub fn pods(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(pod, _)| pod.clone())
            .collect()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl FenceAgentExecutor for ScriptedExecutor {
    async fn execute(&self, pod: &Pod, command: &[String]) -> Result<ExecOutput, Error> {
        self.calls
            .lock()
            .unwrap()
            .push((pod.name_any(), command.to_vec()));
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(ExecOutput::new(SUCCESS_FA_RESPONSE, "")))
    }
}

/// A cluster, an executor and the controller context wired to them.
pub struct Harness {
    pub cluster: Arc<FakeCluster>,
    pub executor: Arc<ScriptedExecutor>,
    pub health: Arc<HealthState>,
    pub ctx: Context,
}

impl Harness {
    /// Cluster with nodes `node-a` and `node-b` and one agent pod.
    pub fn new() -> Self {
        let cluster = FakeCluster::new();
        cluster.add_node(node("node-a"));
        cluster.add_node(node("node-b"));
        cluster.add_pod(agent_pod("fence-agents-remediation-controller-0"));

        let executor = ScriptedExecutor::new();
        let health = Arc::new(HealthState::new());
        let config = OperatorConfig {
            agent_pod_namespace: AGENT_NAMESPACE.to_string(),
            agent_pod_selector: AGENT_LABEL.to_string(),
            ..OperatorConfig::default()
        };
        let ctx = Context::new(
            cluster.clone(),
            executor.clone(),
            config,
            Some(health.clone()),
        );

        Self {
            cluster,
            executor,
            health,
            ctx,
        }
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

pub fn node(name: &str) -> Node {
    Node {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        spec: Some(NodeSpec::default()),
        ..Default::default()
    }
}

pub fn agent_pod(name: &str) -> Pod {
    let (key, value) = AGENT_LABEL.split_once('=').unwrap();
    Pod {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(AGENT_NAMESPACE.to_string()),
            labels: Some(BTreeMap::from([(key.to_string(), value.to_string())])),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Remediation for `node` with the given parameter maps, no finalizer.
pub fn remediation(
    node: &str,
    shared: Option<&[(&str, &str)]>,
    per_node: Option<&[(&str, &[(&str, &str)])]>,
) -> FenceAgentsRemediation {
    let shared_parameters = shared.map(|params| {
        params
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<IndexMap<_, _>>()
    });
    let node_parameters = per_node.map(|params| {
        params
            .iter()
            .map(|(k, values)| {
                let values = values
                    .iter()
                    .map(|(n, v)| (n.to_string(), v.to_string()))
                    .collect::<IndexMap<_, _>>();
                (k.to_string(), values)
            })
            .collect::<IndexMap<_, _>>()
    });

    let mut far = FenceAgentsRemediation::new(
        node,
        FenceAgentsRemediationSpec {
            agent: "fence_ipmilan".to_string(),
            shared_parameters,
            node_parameters,
        },
    );
    far.metadata.namespace = Some(NAMESPACE.to_string());
    far
}

/// The remediation from the ipmilan example, targeting `node-a`.
pub fn ipmilan_remediation() -> FenceAgentsRemediation {
    remediation(
        "node-a",
        Some(&[("--username", "admin"), ("--lanplus", "")]),
        Some(&[(
            "--ipport",
            &[("node-a", "6230"), ("node-b", "6231")][..],
        )]),
    )
}

/// Same remediation, already carrying the finalizer.
pub fn with_finalizer(mut far: FenceAgentsRemediation) -> FenceAgentsRemediation {
    far.metadata.finalizers = Some(vec![FAR_FINALIZER.to_string()]);
    far
}
