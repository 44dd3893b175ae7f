//! fence-agents-remediation library crate
//!
//! Exports the controller, the FenceAgentsRemediation CRD, the cluster and
//! executor collaborators, configuration and the health server.

pub mod client;
pub mod config;
pub mod controller;
pub mod crd;
pub mod executor;
pub mod health;

pub use config::{Args, OperatorConfig};
pub use health::HealthState;

use std::sync::Arc;

use futures::{Stream, StreamExt};
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::{Controller, WatchStreamExt, reflector, watcher};
use kube::{Api, Client, Resource};
use serde::de::DeserializeOwned;
use tracing::{debug, error, info};

use controller::{
    context::Context,
    reconciler::{error_policy, reconcile},
};
use crd::FenceAgentsRemediation;

/// Create namespaced or cluster-wide API based on scope
pub fn scoped_api<T>(client: Client, namespace: Option<&str>) -> Api<T>
where
    T: Resource<Scope = k8s_openapi::NamespaceResourceScope>,
    <T as Resource>::DynamicType: Default,
    T: Clone + DeserializeOwned + std::fmt::Debug,
{
    match namespace {
        Some(ns) => Api::namespaced(client, ns),
        None => Api::all(client),
    }
}

/// Create the default watcher configuration.
///
/// `any_semantic()` allows list calls to be served from the API server cache.
fn default_watcher_config() -> WatcherConfig {
    WatcherConfig::default().any_semantic()
}

/// Create a reflector-backed stream for a resource type.
///
/// The stream retries with exponential backoff and yields applied objects.
/// Every change is passed on, including metadata-only ones: finalizer and
/// deletion updates do not bump the generation but must be reconciled.
fn create_stream<K>(
    api: Api<K>,
    watcher_config: WatcherConfig,
) -> (
    reflector::Store<K>,
    impl Stream<Item = Result<K, watcher::Error>>,
)
where
    K: Resource + Clone + DeserializeOwned + std::fmt::Debug + Send + 'static,
    K::DynamicType: Default + Eq + std::hash::Hash + Clone,
{
    let (reader, writer) = reflector::store();
    let stream = reflector(writer, watcher(api, watcher_config))
        .default_backoff()
        .applied_objects();
    (reader, stream)
}

/// Run the remediation controller until its stream ends.
///
/// Watches FenceAgentsRemediation objects in `config.watch_namespace`, or
/// cluster-wide when it is unset. If health_state is provided, metrics are
/// recorded for reconciliations.
pub async fn run_controller(
    client: Client,
    config: OperatorConfig,
    health_state: Option<Arc<HealthState>>,
) {
    let namespace = config.watch_namespace.clone();
    info!(
        scope = namespace.as_deref().unwrap_or("cluster-wide"),
        agent_pod_namespace = %config.agent_pod_namespace,
        agent_pod_selector = %config.agent_pod_selector,
        "Starting controller for FenceAgentsRemediation resources"
    );

    // Mark as ready once we start the controller
    if let Some(ref state) = health_state {
        state.set_ready(true).await;
    }

    let remediations: Api<FenceAgentsRemediation> =
        scoped_api(client.clone(), namespace.as_deref());
    let ctx = Arc::new(Context::from_kube(client, config, health_state));

    let (reader, stream) = create_stream(remediations, default_watcher_config());

    Controller::for_stream(stream, reader)
        .run(reconcile, error_policy, ctx)
        .for_each(|result| async move {
            match result {
                Ok((obj, _action)) => {
                    debug!("Reconciled: {}", obj.name);
                }
                Err(e) => {
                    // A deleted object may still have a queued request
                    let is_not_found = match &e {
                        kube::runtime::controller::Error::ObjectNotFound(_) => true,
                        kube::runtime::controller::Error::ReconcilerFailed(err, _) => {
                            err.is_not_found()
                        }
                        _ => false,
                    };
                    if is_not_found {
                        debug!("Object no longer exists (likely deleted): {:?}", e);
                    } else {
                        error!("Reconciliation error: {:?}", e);
                    }
                }
            }
        })
        .await;

    // This should never complete in normal operation
    error!("Controller stream ended unexpectedly");
}
