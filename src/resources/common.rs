//! Common utilities for generated resources
//!
//! Shared constants and label helpers used by every template so that the
//! generated ServiceMonitors and PrometheusRules are labelled consistently.

use std::collections::BTreeMap;

use kube::ResourceExt;
use kube::core::ObjectMeta;

use crate::crd::NamespacedName;

/// API group of the monitor CRDs
pub const API_GROUP: &str = "monitoring.openshift.io";

/// Operator field manager name for writes
pub const FIELD_MANAGER: &str = "route-monitor-operator";

/// Label carrying the name of the monitor a resource was generated for
pub const MONITOR_LABEL: &str = "monitoring.openshift.io/monitor";

/// Annotation recording the URL a resource was generated for
pub const SOURCE_URL_ANNOTATION: &str = "monitoring.openshift.io/source-url";

/// Annotation recording the availability target an alert rule was generated for
pub const TARGET_ANNOTATION: &str = "monitoring.openshift.io/target-availability";

/// Generate standard labels for all resources generated for a monitor
pub fn standard_labels(monitor_name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (
            "app.kubernetes.io/name".to_string(),
            monitor_name.to_string(),
        ),
        (
            "app.kubernetes.io/component".to_string(),
            "route-monitor".to_string(),
        ),
        (
            "app.kubernetes.io/managed-by".to_string(),
            FIELD_MANAGER.to_string(),
        ),
        (MONITOR_LABEL.to_string(), monitor_name.to_string()),
    ])
}

/// Metadata of a generated resource: same name and namespace as its monitor,
/// annotated with the inputs it was built from
pub fn generated_metadata(id: &NamespacedName, inputs: &[(&str, &str)]) -> ObjectMeta {
    let annotations = inputs
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect::<BTreeMap<_, _>>();
    ObjectMeta {
        name: Some(id.name.clone()),
        namespace: Some(id.namespace.clone()),
        labels: Some(standard_labels(&id.name)),
        annotations: (!annotations.is_empty()).then_some(annotations),
        ..Default::default()
    }
}

/// Whether `obj` was generated from exactly `inputs`
pub fn built_from<K: ResourceExt>(obj: &K, inputs: &[(&str, &str)]) -> bool {
    let annotations = obj.annotations();
    inputs
        .iter()
        .all(|(key, value)| annotations.get(*key).map(String::as_str) == Some(*value))
}
