use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::common::{Monitor, MonitorStatus, SloSpec};

/// ClusterUrlMonitor probes a URL built from the cluster ingress domain
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, JsonSchema, PartialEq)]
#[kube(
    group = "monitoring.openshift.io",
    version = "v1alpha1",
    kind = "ClusterUrlMonitor",
    plural = "clusterurlmonitors",
    shortname = "cum",
    namespaced,
    status = "MonitorStatus",
    printcolumn = r#"{"name":"URL", "type":"string", "jsonPath":".status.url"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterUrlMonitorSpec {
    /// Prepended to the cluster domain, e.g. "console-openshift-console."
    #[serde(default)]
    pub prefix: String,

    /// Port appended after the domain
    pub port: String,

    /// Path appended after the port, e.g. "/health"
    #[serde(default)]
    pub suffix: String,
}

impl ClusterUrlMonitorSpec {
    /// Build the probed URL for the given cluster ingress domain
    pub fn construct_url(&self, domain: &str) -> String {
        format!(
            "https://{}{}:{}{}",
            self.prefix, domain, self.port, self.suffix
        )
    }
}

impl Monitor for ClusterUrlMonitor {
    fn slo(&self) -> Option<&SloSpec> {
        None
    }

    fn monitor_status(&self) -> Option<&MonitorStatus> {
        self.status.as_ref()
    }

    fn set_monitor_status(&mut self, status: MonitorStatus) {
        self.status = Some(status);
    }
}
