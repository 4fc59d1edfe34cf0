//! Types shared by the RouteMonitor and ClusterUrlMonitor CRDs

use std::fmt::{self, Debug};

use k8s_openapi::NamespaceResourceScope;
use kube::{Resource, ResourceExt};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Name and namespace of an object.
///
/// The zero value (both fields empty) means "no reference".
#[derive(
    Serialize, Deserialize, Clone, Debug, Default, JsonSchema, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
pub struct NamespacedName {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub namespace: String,
}

impl NamespacedName {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
        }
    }

    /// Identity of a namespaced object
    pub fn of<K: Resource>(obj: &K) -> Self {
        Self {
            name: obj.name_any(),
            namespace: obj.namespace().unwrap_or_default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_empty() && self.namespace.is_empty()
    }
}

impl fmt::Display for NamespacedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Service level objective of a monitor
#[derive(Serialize, Deserialize, Clone, Debug, Default, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SloSpec {
    /// Target availability as a decimal fraction in (0.9, 1.0], e.g. "0.9995"
    #[serde(default)]
    pub target_availability_percentile: String,
}

impl SloSpec {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target_availability_percentile: target.into(),
        }
    }

    /// An SLO with an empty target is the serialized zero value and counts as unset
    pub fn is_configured(&self) -> bool {
        !self.target_availability_percentile.is_empty()
    }
}

/// Status shared by every monitor kind.
///
/// All fields are always serialized: status writes are merge patches and an
/// omitted field would never be cleared.
#[derive(Serialize, Deserialize, Clone, Debug, Default, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MonitorStatus {
    /// URL being probed, resolved from the route or the cluster domain
    #[serde(default)]
    pub url: String,

    /// Generated ServiceMonitor
    #[serde(default)]
    pub service_monitor_ref: NamespacedName,

    /// Generated PrometheusRule, zero value when no SLO is configured
    #[serde(default)]
    pub prometheus_rule_ref: NamespacedName,

    /// Normalized availability target the PrometheusRule was last built with
    #[serde(default)]
    pub current_target_availability_percentile: String,
}

/// Behaviour common to the custom resources that declare something to monitor.
pub trait Monitor:
    Resource<DynamicType = (), Scope = NamespaceResourceScope>
    + Clone
    + Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
    /// Configured SLO, `None` when absent or empty
    fn slo(&self) -> Option<&SloSpec>;

    fn monitor_status(&self) -> Option<&MonitorStatus>;

    fn set_monitor_status(&mut self, status: MonitorStatus);

    /// URL populated by the resolve step, empty until then
    fn resolved_url(&self) -> &str {
        self.monitor_status()
            .map(|s| s.url.as_str())
            .unwrap_or_default()
    }

    /// Current status or its zero value
    fn status_or_default(&self) -> MonitorStatus {
        self.monitor_status().cloned().unwrap_or_default()
    }
}
