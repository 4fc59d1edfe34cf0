//! Finalizer bookkeeping on in-memory objects
//!
//! These helpers only mutate the object they are given; persisting it is up
//! to the caller. Each mutating helper returns whether the finalizer list
//! changed so that callers can skip the write when nothing happened.

use kube::{Resource, ResourceExt};

/// Finalizer guarding cleanup of the generated ServiceMonitor and PrometheusRule
pub const FINALIZER: &str = "routemonitor.monitoring.openshift.io/finalizer";

/// Finalizer written by earlier releases, migrated to [`FINALIZER`]
pub const LEGACY_FINALIZER: &str = "finalizer.routemonitor.openshift.io";

/// Check if the finalizer is present
pub fn has_finalizer<K: Resource>(obj: &K, key: &str) -> bool {
    obj.finalizers().iter().any(|f| f == key)
}

/// Append the finalizer unless it is already present
pub fn add_finalizer<K: Resource>(obj: &mut K, key: &str) -> bool {
    if has_finalizer(obj, key) {
        return false;
    }
    obj.finalizers_mut().push(key.to_string());
    true
}

/// Remove every occurrence of the finalizer
pub fn remove_finalizer<K: Resource>(obj: &mut K, key: &str) -> bool {
    let finalizers = obj.finalizers_mut();
    let before = finalizers.len();
    finalizers.retain(|f| f != key);
    finalizers.len() != before
}

/// Replace `previous` with `current`.
///
/// | has previous | has current | result |
/// |---|---|---|
/// | no | no | unchanged |
/// | no | yes | unchanged |
/// | yes | no | previous removed, current added |
/// | yes | yes | previous removed |
pub fn patch_finalizer<K: Resource>(obj: &mut K, previous: &str, current: &str) -> bool {
    if !has_finalizer(obj, previous) {
        return false;
    }
    remove_finalizer(obj, previous);
    add_finalizer(obj, current);
    true
}
