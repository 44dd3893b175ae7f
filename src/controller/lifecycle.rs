//! Finalizer lifecycle of a FenceAgentsRemediation.
//!
//! The finalizer is attached on first sight and released once the
//! remediation taint has been removed from the node. Every write is a
//! conditional replace; conflicts surface to the caller.

use kube::ResourceExt;
use tracing::{debug, info};

use crate::client::{ClusterClient, RemediationEvent};
use crate::controller::common::{with_finalizer, without_finalizer};
use crate::controller::context::reasons;
use crate::controller::error::Error;
use crate::controller::taint::without_remediation_taint;
use crate::crd::{FAR_FINALIZER, FenceAgentsRemediation};

/// What the finalizer state of a remediation calls for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleAction {
    /// Live object without the finalizer.
    AddFinalizer,
    /// Deleted object still holding the finalizer.
    Cleanup,
    /// Deleted object whose finalizer is already gone.
    AwaitRemoval,
    /// Live object holding the finalizer.
    Proceed,
}

/// Result of lifecycle handling, as seen by the orchestrator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleOutcome {
    /// The object was updated; the write triggers a fresh reconciliation.
    FinalizerAdded,
    /// Cleanup finished (or there was nothing left to clean up).
    DeletionComplete,
    /// Continue with remediation.
    Proceed,
}

/// Decide what to do from the finalizer and deletion timestamp alone.
pub fn lifecycle_action(remediation: &FenceAgentsRemediation) -> LifecycleAction {
    match (remediation.has_finalizer(), remediation.is_being_deleted()) {
        (false, false) => LifecycleAction::AddFinalizer,
        (true, true) => LifecycleAction::Cleanup,
        (false, true) => LifecycleAction::AwaitRemoval,
        (true, false) => LifecycleAction::Proceed,
    }
}

/// Attach or release the finalizer as needed.
pub async fn handle_lifecycle(
    client: &dyn ClusterClient,
    remediation: &FenceAgentsRemediation,
) -> Result<LifecycleOutcome, Error> {
    let name = remediation.name_any();

    match lifecycle_action(remediation) {
        LifecycleAction::AddFinalizer => {
            if let Some(updated) = with_finalizer(remediation, FAR_FINALIZER) {
                client.replace_remediation(&updated).await?;
            }
            info!(name = %name, "Finalizer added");
            client
                .publish_event(
                    remediation,
                    RemediationEvent::normal(
                        reasons::ADD_FINALIZER,
                        "Remediating",
                        "Finalizer added",
                    ),
                )
                .await;
            Ok(LifecycleOutcome::FinalizerAdded)
        }
        LifecycleAction::Cleanup => {
            info!(name = %name, "Remediation is being deleted, cleaning up");
            remove_remediation_taint(client, &remediation.node_name()).await?;

            if let Some(updated) = without_finalizer(remediation, FAR_FINALIZER) {
                match client.replace_remediation(&updated).await {
                    Ok(_) => {}
                    Err(e) if e.is_not_found() => {
                        debug!(name = %name, "Remediation already gone");
                    }
                    Err(e) => return Err(e),
                }
            }
            info!(name = %name, "Finalizer removed");
            client
                .publish_event(
                    remediation,
                    RemediationEvent::normal(
                        reasons::REMOVE_FINALIZER,
                        "Cleanup",
                        "Remediation taint and finalizer removed",
                    ),
                )
                .await;
            Ok(LifecycleOutcome::DeletionComplete)
        }
        LifecycleAction::AwaitRemoval => {
            debug!(name = %name, "Deleted without finalizer, nothing to do");
            Ok(LifecycleOutcome::DeletionComplete)
        }
        LifecycleAction::Proceed => Ok(LifecycleOutcome::Proceed),
    }
}

/// Remove the remediation taint from `node_name`.
///
/// Returns whether a taint was removed. A missing node or taint is not an
/// error.
pub async fn remove_remediation_taint(
    client: &dyn ClusterClient,
    node_name: &str,
) -> Result<bool, Error> {
    let Some(node) = client.get_node(node_name).await? else {
        debug!(node = %node_name, "Node not found, no taint to remove");
        return Ok(false);
    };
    let Some(updated) = without_remediation_taint(&node) else {
        debug!(node = %node_name, "Remediation taint already absent");
        return Ok(false);
    };

    match client.replace_node(&updated).await {
        Ok(_) => {
            info!(node = %node_name, "Remediation taint removed");
            Ok(true)
        }
        Err(e) if e.is_not_found() => Ok(false),
        Err(e) => Err(e),
    }
}
