use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::common::{Monitor, MonitorStatus, SloSpec};

/// RouteMonitor probes the host of an OpenShift Route and, when an SLO is
/// given, alerts on error budget burn.
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, JsonSchema, PartialEq)]
#[kube(
    group = "monitoring.openshift.io",
    version = "v1alpha1",
    kind = "RouteMonitor",
    plural = "routemonitors",
    shortname = "rm",
    namespaced,
    status = "MonitorStatus",
    printcolumn = r#"{"name":"URL", "type":"string", "jsonPath":".status.url"}"#,
    printcolumn = r#"{"name":"SLO", "type":"string", "jsonPath":".spec.slo.targetAvailabilityPercentile"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct RouteMonitorSpec {
    /// Route whose host is probed
    pub route: RouteRef,

    /// Availability objective, no PrometheusRule is generated without it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slo: Option<SloSpec>,
}

/// Reference to an OpenShift Route
#[derive(Serialize, Deserialize, Clone, Debug, Default, JsonSchema, PartialEq, Eq)]
pub struct RouteRef {
    pub name: String,
    pub namespace: String,
}

impl Monitor for RouteMonitor {
    fn slo(&self) -> Option<&SloSpec> {
        self.spec.slo.as_ref().filter(|slo| slo.is_configured())
    }

    fn monitor_status(&self) -> Option<&MonitorStatus> {
        self.status.as_ref()
    }

    fn set_monitor_status(&mut self, status: MonitorStatus) {
        self.status = Some(status);
    }
}
