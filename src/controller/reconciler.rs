//! Reconciliation loop for FenceAgentsRemediation.
//!
//! A pass walks the phases of [`ReconcilePhase`]: fetch the request, check
//! that it names a real node, handle the finalizer, taint the node, and on
//! the first pass only build the agent command, run it and check the
//! answer. The taint read *before* this pass applies it decides whether
//! the agent runs, so a request is fenced at most once per taint lifetime.

use std::sync::Arc;
use std::time::{Duration, Instant};

use k8s_openapi::api::core::v1::Pod;
use kube::{ResourceExt, runtime::controller::Action};
use tracing::{debug, error, info, warn};

use crate::controller::context::{Context, reasons};
use crate::controller::error::Error;
use crate::controller::lifecycle::{LifecycleOutcome, handle_lifecycle};
use crate::controller::parameters::build_fence_agent_command;
use crate::controller::state_machine::{PhaseTracker, ReconcilePhase};
use crate::controller::status::ConditionBuilder;
use crate::controller::taint::{remediation_taint_present, with_remediation_taint};
use crate::crd::FenceAgentsRemediation;
use crate::executor::validate_response;
use crate::health::ExecutionOutcome;

/// How a successful pass ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The request was deleted before it could be read.
    RequestNotFound,
    /// No node carries the request's name.
    NodeNotFound,
    /// The finalizer was attached; a fresh pass follows.
    FinalizerAdded,
    /// Deletion cleanup finished.
    DeletionComplete,
    /// The node was already tainted when the pass started.
    AlreadyRemediated,
    /// The fence agent ran and answered with a success-shaped response.
    FenceAgentExecuted,
}

/// Phases visited by a successful pass and how it ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconcileReport {
    pub phases: Vec<ReconcilePhase>,
    pub outcome: ReconcileOutcome,
}

/// Reconcile a FenceAgentsRemediation
///
/// This is the entry point called by the kube controller runtime.
pub async fn reconcile(
    obj: Arc<FenceAgentsRemediation>,
    ctx: Arc<Context>,
) -> Result<Action, Error> {
    let start_time = Instant::now();
    let name = obj.name_any();
    let namespace = obj.namespace().unwrap_or_else(|| "default".to_string());

    debug!(name = %name, namespace = %namespace, "Reconciling FenceAgentsRemediation");

    let report = reconcile_remediation(&ctx, &namespace, &name).await?;

    if let Some(ref health_state) = ctx.health_state {
        let duration = start_time.elapsed().as_secs_f64();
        health_state.record_reconcile(&namespace, &name, duration);
    }

    Ok(match report.outcome {
        ReconcileOutcome::FinalizerAdded => Action::requeue(Duration::from_secs(1)),
        _ => Action::await_change(),
    })
}

/// Error policy for the controller
pub fn error_policy(obj: Arc<FenceAgentsRemediation>, error: &Error, ctx: Arc<Context>) -> Action {
    let name = obj.name_any();
    let namespace = obj.namespace().unwrap_or_else(|| "default".to_string());

    // Record error metric
    if let Some(ref health_state) = ctx.health_state {
        health_state.metrics.record_error(&namespace, &name);
    }

    if error.is_not_found() {
        debug!(name = %name, "Resource not found (likely deleted)");
        return Action::await_change();
    }

    if error.is_retryable() {
        warn!(name = %name, error = %error, "Retryable error, will retry");
    } else {
        error!(
            name = %name,
            error = %error,
            class = ?error.classify(),
            "Non-retryable error"
        );
    }
    Action::requeue(error.requeue_after())
}

/// Run one reconciliation pass for the request `namespace/name`.
///
/// Errors leave the pass in `Error` and are returned for redelivery.
pub async fn reconcile_remediation(
    ctx: &Context,
    namespace: &str,
    name: &str,
) -> Result<ReconcileReport, Error> {
    let mut tracker = PhaseTracker::new();

    match run_pass(ctx, namespace, name, &mut tracker).await {
        Ok(outcome) => {
            advance(&mut tracker, ReconcilePhase::Done)?;
            debug!(
                name = %name,
                namespace = %namespace,
                outcome = ?outcome,
                phases = ?tracker.visited(),
                "Reconcile pass finished"
            );
            Ok(ReconcileReport {
                phases: tracker.into_visited(),
                outcome,
            })
        }
        Err(e) => {
            let failed_in = tracker.fail();
            debug!(
                name = %name,
                namespace = %namespace,
                phase = %failed_in,
                phases = ?tracker.visited(),
                error = %e,
                "Reconcile pass failed"
            );
            Err(e)
        }
    }
}

fn advance(tracker: &mut PhaseTracker, to: ReconcilePhase) -> Result<(), Error> {
    tracker
        .advance(to)
        .map_err(|(from, to)| Error::InvalidTransition { from, to })
}

async fn run_pass(
    ctx: &Context,
    namespace: &str,
    name: &str,
    tracker: &mut PhaseTracker,
) -> Result<ReconcileOutcome, Error> {
    let Some(remediation) = ctx.client.get_remediation(namespace, name).await? else {
        info!(name = %name, namespace = %namespace, "FenceAgentsRemediation not found");
        return Ok(ReconcileOutcome::RequestNotFound);
    };

    advance(tracker, ReconcilePhase::NodeValidating)?;
    let node_names = ctx.client.list_node_names().await?;
    if !node_names.iter().any(|n| n == name) {
        // Release the finalizer of a deleted request even if its node is gone
        if !(remediation.is_being_deleted() && remediation.has_finalizer()) {
            warn!(name = %name, "Didn't find a node matching the remediation's name");
            return Ok(ReconcileOutcome::NodeNotFound);
        }
    }

    advance(tracker, ReconcilePhase::LifecycleHandling)?;
    match handle_lifecycle(ctx.client.as_ref(), &remediation).await? {
        LifecycleOutcome::FinalizerAdded => return Ok(ReconcileOutcome::FinalizerAdded),
        LifecycleOutcome::DeletionComplete => return Ok(ReconcileOutcome::DeletionComplete),
        LifecycleOutcome::Proceed => {}
    }

    advance(tracker, ReconcilePhase::Tainting)?;
    let Some(node) = ctx.client.get_node(name).await? else {
        warn!(node = %name, "Node disappeared during reconciliation");
        return Ok(ReconcileOutcome::NodeNotFound);
    };
    let already_tainted = remediation_taint_present(&node);
    if let Some(tainted) = with_remediation_taint(&node) {
        ctx.client.replace_node(&tainted).await?;
        info!(node = %name, agent = %remediation.spec.agent, "Remediation taint added");
        ctx.publish_normal_event(
            &remediation,
            reasons::ADD_REMEDIATION_TAINT,
            "Remediating",
            format!("Remediation taint added to node {name}"),
        )
        .await;
        let mut conditions = conditions_of(&remediation);
        conditions.processing(
            true,
            "RemediationStarted",
            "The node was tainted and the fence agent is about to run",
            remediation.metadata.generation,
        );
        write_status_best_effort(ctx, &remediation, conditions).await;
    }
    if already_tainted {
        debug!(
            node = %name,
            "Remediation taint was present before this pass, not running the fence agent again"
        );
        return Ok(ReconcileOutcome::AlreadyRemediated);
    }

    advance(tracker, ReconcilePhase::ParameterBuilding)?;
    let command = match build_fence_agent_command(&remediation.spec, name) {
        Ok(command) => command,
        Err(e) => {
            error!(name = %name, error = %e, "Invalid sharedParameters/nodeParameters");
            ctx.publish_warning_event(
                &remediation,
                reasons::INVALID_PARAMETERS,
                "Remediating",
                e.to_string(),
            )
            .await;
            return Err(e);
        }
    };

    advance(tracker, ReconcilePhase::Executing)?;
    let pod = find_agent_pod(ctx).await?;
    info!(
        node = %name,
        agent = %remediation.spec.agent,
        pod = %pod.name_any(),
        "Executing fence agent"
    );
    let output = match ctx.executor.execute(&pod, &command).await {
        Ok(output) => output,
        Err(e) => {
            record_execution(ctx, ExecutionOutcome::Failure);
            warn!(node = %name, error = %e, "Fence agent execution failed");
            ctx.publish_warning_event(
                &remediation,
                reasons::FENCE_AGENT_FAILED,
                "Remediating",
                e.to_string(),
            )
            .await;
            return Err(e);
        }
    };

    advance(tracker, ReconcilePhase::ResponseValidating)?;
    match validate_response(output) {
        Ok(stdout) => {
            record_execution(ctx, ExecutionOutcome::Success);
            info!(
                node = %name,
                agent = %remediation.spec.agent,
                response = %stdout.trim(),
                "Fence agent succeeded"
            );
            ctx.publish_normal_event(
                &remediation,
                reasons::FENCE_AGENT_EXECUTED,
                "Remediating",
                format!(
                    "Fence agent {} executed for node {name}",
                    remediation.spec.agent
                ),
            )
            .await;

            let generation = remediation.metadata.generation;
            let mut conditions = conditions_of(&remediation);
            conditions
                .processing(false, "RemediationFinished", "Fence agent executed", generation)
                .fence_agent_action_succeeded(
                    true,
                    "FenceAgentSucceeded",
                    stdout.trim(),
                    generation,
                )
                .succeeded(true, "RemediationFinished", "Node was fenced", generation);
            ctx.client
                .patch_remediation_status(namespace, name, &conditions.build_status())
                .await?;
            Ok(ReconcileOutcome::FenceAgentExecuted)
        }
        Err(e) => {
            record_execution(ctx, ExecutionOutcome::UnexpectedResponse);
            error!(node = %name, error = %e, "Fence agent response wasn't a success message");
            ctx.publish_warning_event(
                &remediation,
                reasons::FENCE_AGENT_FAILED,
                "Remediating",
                e.to_string(),
            )
            .await;
            let mut conditions = conditions_of(&remediation);
            conditions.fence_agent_action_succeeded(
                false,
                "FenceAgentFailed",
                &e.to_string(),
                remediation.metadata.generation,
            );
            write_status_best_effort(ctx, &remediation, conditions).await;
            Err(e)
        }
    }
}

/// First pod matching the configured agent pod selector.
async fn find_agent_pod(ctx: &Context) -> Result<Pod, Error> {
    let namespace = &ctx.config.agent_pod_namespace;
    let selector = &ctx.config.agent_pod_selector;
    let pods = ctx.client.list_pods(namespace, selector).await?;
    if pods.len() > 1 {
        debug!(count = pods.len(), "Multiple agent pods found, using the first");
    }
    pods.into_iter().next().ok_or_else(|| Error::AgentPodNotFound {
        namespace: namespace.clone(),
        selector: selector.clone(),
    })
}

fn conditions_of(remediation: &FenceAgentsRemediation) -> ConditionBuilder {
    remediation
        .status
        .as_ref()
        .map(|s| ConditionBuilder::from_existing(&s.conditions))
        .unwrap_or_default()
}

async fn write_status_best_effort(
    ctx: &Context,
    remediation: &FenceAgentsRemediation,
    conditions: ConditionBuilder,
) {
    let namespace = remediation
        .namespace()
        .unwrap_or_else(|| "default".to_string());
    let name = remediation.name_any();
    if let Err(e) = ctx
        .client
        .patch_remediation_status(&namespace, &name, &conditions.build_status())
        .await
    {
        warn!(name = %name, error = %e, "Failed to update status");
    }
}

fn record_execution(ctx: &Context, outcome: ExecutionOutcome) {
    if let Some(ref health_state) = ctx.health_state {
        health_state.metrics.record_execution(outcome);
    }
}
