//! [`ClusterClient`] backed by a real `kube::Client`.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Node, Pod};
use kube::api::{ListParams, Patch, PatchParams, PostParams};
use kube::runtime::events::{Event, Recorder, Reporter};
use kube::{Api, Client, Resource, ResourceExt};
use tracing::{debug, warn};

use super::{ClusterClient, RemediationEvent};
use crate::controller::context::FIELD_MANAGER;
use crate::controller::error::Error;
use crate::crd::{FenceAgentsRemediation, FenceAgentsRemediationStatus};

/// Cluster client talking to the Kubernetes API server.
#[derive(Clone)]
pub struct KubeClusterClient {
    client: Client,
    reporter: Reporter,
}

impl KubeClusterClient {
    /// Create a new client wrapping `client`.
    pub fn new(client: Client) -> Self {
        Self {
            client,
            reporter: Reporter {
                controller: FIELD_MANAGER.into(),
                instance: std::env::var("POD_NAME").ok(),
            },
        }
    }

    fn post_params() -> PostParams {
        PostParams {
            dry_run: false,
            field_manager: Some(FIELD_MANAGER.to_string()),
        }
    }

    /// Create an event recorder for publishing Kubernetes events
    fn recorder(&self) -> Recorder {
        Recorder::new(self.client.clone(), self.reporter.clone())
    }
}

#[async_trait]
impl ClusterClient for KubeClusterClient {
    async fn get_remediation(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<FenceAgentsRemediation>, Error> {
        let api: Api<FenceAgentsRemediation> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn replace_remediation(
        &self,
        remediation: &FenceAgentsRemediation,
    ) -> Result<FenceAgentsRemediation, Error> {
        let namespace = remediation
            .namespace()
            .unwrap_or_else(|| "default".to_string());
        let api: Api<FenceAgentsRemediation> = Api::namespaced(self.client.clone(), &namespace);
        let name = remediation.name_any();
        debug!(
            name = %name,
            resource_version = ?remediation.resource_version(),
            "Replacing FenceAgentsRemediation"
        );
        Ok(api.replace(&name, &Self::post_params(), remediation).await?)
    }

    async fn patch_remediation_status(
        &self,
        namespace: &str,
        name: &str,
        status: &FenceAgentsRemediationStatus,
    ) -> Result<(), Error> {
        let api: Api<FenceAgentsRemediation> = Api::namespaced(self.client.clone(), namespace);
        let patch = serde_json::json!({
            "status": status
        });
        api.patch_status(
            name,
            &PatchParams::apply(FIELD_MANAGER),
            &Patch::Merge(&patch),
        )
        .await?;
        Ok(())
    }

    async fn list_node_names(&self) -> Result<Vec<String>, Error> {
        let api: Api<Node> = Api::all(self.client.clone());
        let nodes = api.list_metadata(&ListParams::default()).await?;
        Ok(nodes.items.into_iter().map(|n| n.name_any()).collect())
    }

    async fn get_node(&self, name: &str) -> Result<Option<Node>, Error> {
        let api: Api<Node> = Api::all(self.client.clone());
        Ok(api.get_opt(name).await?)
    }

    async fn replace_node(&self, node: &Node) -> Result<Node, Error> {
        let api: Api<Node> = Api::all(self.client.clone());
        let name = node.name_any();
        debug!(node = %name, resource_version = ?node.resource_version(), "Replacing node");
        Ok(api.replace(&name, &Self::post_params(), node).await?)
    }

    async fn list_pods(&self, namespace: &str, label_selector: &str) -> Result<Vec<Pod>, Error> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        debug!(namespace = %namespace, label_selector = %label_selector, "Listing agent pods");
        let pods = api
            .list(&ListParams::default().labels(label_selector))
            .await?;
        Ok(pods.items)
    }

    async fn publish_event(&self, remediation: &FenceAgentsRemediation, event: RemediationEvent) {
        let recorder = self.recorder();
        let object_ref = remediation.object_ref(&());
        if let Err(e) = recorder
            .publish(
                &Event {
                    type_: event.type_,
                    reason: event.reason.into(),
                    note: event.note,
                    action: event.action.into(),
                    secondary: None,
                },
                &object_ref,
            )
            .await
        {
            warn!(reason = %event.reason, error = %e, "Failed to publish event");
        }
    }
}
