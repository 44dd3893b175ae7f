//! Finalizer attach and deletion cleanup.

use fence_agents_remediation::controller::context::reasons;
use fence_agents_remediation::controller::reconciler::{ReconcileOutcome, reconcile_remediation};
use fence_agents_remediation::controller::state_machine::ReconcilePhase;

use crate::{Harness, NAMESPACE, ipmilan_remediation, with_finalizer};

/// Harness where `node-a` was already fenced by a completed first pass.
async fn remediated() -> Harness {
    let h = Harness::new();
    h.cluster.add_remediation(with_finalizer(ipmilan_remediation()));
    let report = reconcile_remediation(&h.ctx, NAMESPACE, "node-a")
        .await
        .unwrap();
    assert_eq!(report.outcome, ReconcileOutcome::FenceAgentExecuted);
    assert_eq!(h.cluster.node_taints("node-a").len(), 1);
    h
}

#[tokio::test]
async fn test_finalizer_added_first() {
    let h = Harness::new();
    h.cluster.add_remediation(ipmilan_remediation());

    let report = reconcile_remediation(&h.ctx, NAMESPACE, "node-a")
        .await
        .unwrap();
    assert_eq!(report.outcome, ReconcileOutcome::FinalizerAdded);
    assert_eq!(
        report.phases,
        vec![
            ReconcilePhase::Fetching,
            ReconcilePhase::NodeValidating,
            ReconcilePhase::LifecycleHandling,
            ReconcilePhase::Done,
        ]
    );
    assert!(h.cluster.remediation("node-a").unwrap().has_finalizer());
    assert!(h.cluster.node_taints("node-a").is_empty());
    assert_eq!(h.cluster.event_reasons(), vec![reasons::ADD_FINALIZER]);
}

#[tokio::test]
async fn test_finalizer_conflict_is_surfaced() {
    let h = Harness::new();
    h.cluster.add_remediation(ipmilan_remediation());
    h.cluster.inject_remediation_conflicts(1);

    let err = reconcile_remediation(&h.ctx, NAMESPACE, "node-a")
        .await
        .unwrap_err();
    assert!(err.is_conflict());
    assert!(!h.cluster.remediation("node-a").unwrap().has_finalizer());
}

#[tokio::test]
async fn test_deletion_removes_taint_and_finalizer() {
    let h = remediated().await;
    h.cluster.mark_deleted("node-a");

    let report = reconcile_remediation(&h.ctx, NAMESPACE, "node-a")
        .await
        .unwrap();
    assert_eq!(report.outcome, ReconcileOutcome::DeletionComplete);
    assert!(h.cluster.node_taints("node-a").is_empty());
    // Last finalizer gone: the object is collected
    assert!(h.cluster.remediation("node-a").is_none());
    assert!(
        h.cluster
            .event_reasons()
            .contains(&reasons::REMOVE_FINALIZER)
    );
    assert_eq!(h.executor.call_count(), 1);
}

#[tokio::test]
async fn test_deletion_with_taint_already_absent() {
    let h = remediated().await;
    h.cluster.clear_node_taints("node-a");
    h.cluster.mark_deleted("node-a");

    let report = reconcile_remediation(&h.ctx, NAMESPACE, "node-a")
        .await
        .unwrap();
    assert_eq!(report.outcome, ReconcileOutcome::DeletionComplete);
    assert!(h.cluster.remediation("node-a").is_none());
}

#[tokio::test]
async fn test_deletion_with_node_gone_releases_finalizer() {
    let h = remediated().await;
    h.cluster.remove_node("node-a");
    h.cluster.mark_deleted("node-a");

    let report = reconcile_remediation(&h.ctx, NAMESPACE, "node-a")
        .await
        .unwrap();
    assert_eq!(report.outcome, ReconcileOutcome::DeletionComplete);
    assert!(h.cluster.remediation("node-a").is_none());
}

#[tokio::test]
async fn test_deletion_never_runs_agent() {
    let h = Harness::new();
    h.cluster.add_remediation(with_finalizer(ipmilan_remediation()));
    h.cluster.mark_deleted("node-a");

    let report = reconcile_remediation(&h.ctx, NAMESPACE, "node-a")
        .await
        .unwrap();
    assert_eq!(report.outcome, ReconcileOutcome::DeletionComplete);
    assert_eq!(h.executor.call_count(), 0);
    assert!(h.cluster.node_taints("node-a").is_empty());
}

#[tokio::test]
async fn test_deletion_conflict_on_node_keeps_finalizer() {
    let h = remediated().await;
    h.cluster.mark_deleted("node-a");
    h.cluster.inject_node_conflicts(1);

    let err = reconcile_remediation(&h.ctx, NAMESPACE, "node-a")
        .await
        .unwrap_err();
    assert!(err.is_conflict());
    assert!(h.cluster.remediation("node-a").unwrap().has_finalizer());
    assert_eq!(h.cluster.node_taints("node-a").len(), 1);

    let report = reconcile_remediation(&h.ctx, NAMESPACE, "node-a")
        .await
        .unwrap();
    assert_eq!(report.outcome, ReconcileOutcome::DeletionComplete);
    assert!(h.cluster.node_taints("node-a").is_empty());
}
