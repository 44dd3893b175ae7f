//! Remediation taint handling.
//!
//! The remediation taint doubles as the idempotency marker for fencing: its
//! presence on the node *before* a reconciliation applies it means the agent
//! was already triggered for this taint lifetime. Taints are matched by key
//! and effect only; the value is ignored.

use k8s_openapi::api::core::v1::{Node, Taint};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use k8s_openapi::chrono::Utc;

use crate::crd::{FAR_TAINT_EFFECT, FAR_TAINT_KEY};

/// Build the remediation taint, stamped with the current time.
pub fn remediation_taint() -> Taint {
    Taint {
        key: FAR_TAINT_KEY.to_string(),
        effect: FAR_TAINT_EFFECT.to_string(),
        value: None,
        time_added: Some(Time(Utc::now())),
    }
}

/// Two taints match when key and effect are equal.
pub fn taint_matches(a: &Taint, b: &Taint) -> bool {
    a.key == b.key && a.effect == b.effect
}

/// Whether `taint` is present in `taints`.
pub fn taint_exists(taints: &[Taint], taint: &Taint) -> bool {
    taints.iter().any(|t| taint_matches(t, taint))
}

fn node_taints(node: &Node) -> &[Taint] {
    node.spec
        .as_ref()
        .and_then(|s| s.taints.as_deref())
        .unwrap_or_default()
}

/// Taint gate: was the remediation taint already on the node?
///
/// Must be evaluated on the snapshot read *before* this reconciliation
/// applies the taint.
pub fn remediation_taint_present(node: &Node) -> bool {
    taint_exists(node_taints(node), &remediation_taint())
}

/// Return a copy of `node` carrying the remediation taint, or `None` when
/// the taint is already present and no write is needed.
pub fn with_remediation_taint(node: &Node) -> Option<Node> {
    let taint = remediation_taint();
    if taint_exists(node_taints(node), &taint) {
        return None;
    }

    let mut updated = node.clone();
    updated
        .spec
        .get_or_insert_with(Default::default)
        .taints
        .get_or_insert_with(Vec::new)
        .push(taint);
    Some(updated)
}

/// Return a copy of `node` without the remediation taint, or `None` when
/// there is nothing to remove.
pub fn without_remediation_taint(node: &Node) -> Option<Node> {
    let taint = remediation_taint();
    if !taint_exists(node_taints(node), &taint) {
        return None;
    }

    let mut updated = node.clone();
    if let Some(taints) = updated.spec.as_mut().and_then(|s| s.taints.as_mut()) {
        taints.retain(|t| !taint_matches(t, &taint));
    }
    Some(updated)
}
