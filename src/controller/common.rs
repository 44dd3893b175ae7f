//! Shared controller helpers.
//!
//! Finalizer edits are computed on a copy of the object so the caller can
//! persist them with a conditional replace.

use kube::{Resource, ResourceExt};

/// Return a copy of `obj` with `finalizer` appended, or `None` if it is
/// already present.
pub fn with_finalizer<T>(obj: &T, finalizer: &str) -> Option<T>
where
    T: Resource + Clone,
{
    if obj.finalizers().iter().any(|f| f == finalizer) {
        return None;
    }

    let mut updated = obj.clone();
    updated.finalizers_mut().push(finalizer.to_string());
    Some(updated)
}

/// Return a copy of `obj` without `finalizer`, or `None` if it is absent.
pub fn without_finalizer<T>(obj: &T, finalizer: &str) -> Option<T>
where
    T: Resource + Clone,
{
    if !obj.finalizers().iter().any(|f| f == finalizer) {
        return None;
    }

    let mut updated = obj.clone();
    updated.finalizers_mut().retain(|f| f != finalizer);
    Some(updated)
}
