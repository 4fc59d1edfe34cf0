//! ServiceMonitor generation
//!
//! The generated ServiceMonitor points Prometheus at the blackbox exporter,
//! which probes the monitored URL on every scrape.

use std::collections::BTreeMap;

use crate::crd::{
    Endpoint, LabelSelector, NamespaceSelector, NamespacedName, RelabelConfig, ServiceMonitor,
    ServiceMonitorSpec,
};
use crate::resources::common::{SOURCE_URL_ANNOTATION, generated_metadata};

/// Namespace the blackbox exporter runs in
pub const BLACKBOX_EXPORTER_NAMESPACE: &str = "openshift-route-monitor-operator";

/// Value of the `app` label on the blackbox exporter service
pub const BLACKBOX_EXPORTER_APP: &str = "blackbox-exporter";

/// Service port name of the blackbox exporter
pub const BLACKBOX_EXPORTER_PORT: &str = "blackbox";

/// Blackbox prober module used for every probe
pub const BLACKBOX_MODULE: &str = "http_2xx";

/// Label carrying the probed URL on every probe series
pub const PROBE_URL_LABEL: &str = "probe_url";

pub const SCRAPE_INTERVAL: &str = "30s";

pub const SCRAPE_TIMEOUT: &str = "15s";

/// Inputs recorded on the ServiceMonitor probing `url`
pub fn inputs(url: &str) -> [(&'static str, &str); 1] {
    [(SOURCE_URL_ANNOTATION, url)]
}

/// Generate the ServiceMonitor probing `url` for the monitor `id`
pub fn generate(url: &str, id: &NamespacedName) -> ServiceMonitor {
    let params = BTreeMap::from([
        ("module".to_string(), vec![BLACKBOX_MODULE.to_string()]),
        ("target".to_string(), vec![url.to_string()]),
    ]);

    let endpoint = Endpoint {
        port: Some(BLACKBOX_EXPORTER_PORT.to_string()),
        scheme: Some("http".to_string()),
        path: Some("/probe".to_string()),
        interval: Some(SCRAPE_INTERVAL.to_string()),
        scrape_timeout: Some(SCRAPE_TIMEOUT.to_string()),
        params,
        metric_relabelings: vec![RelabelConfig {
            target_label: Some(PROBE_URL_LABEL.to_string()),
            replacement: Some(url.to_string()),
            action: Some("replace".to_string()),
            ..Default::default()
        }],
    };

    let mut service_monitor = ServiceMonitor::new(
        &id.name,
        ServiceMonitorSpec {
            job_label: Some(BLACKBOX_EXPORTER_APP.to_string()),
            endpoints: vec![endpoint],
            selector: LabelSelector {
                match_labels: BTreeMap::from([(
                    "app".to_string(),
                    BLACKBOX_EXPORTER_APP.to_string(),
                )]),
            },
            namespace_selector: Some(NamespaceSelector {
                match_names: vec![BLACKBOX_EXPORTER_NAMESPACE.to_string()],
            }),
        },
    );
    service_monitor.metadata = generated_metadata(id, &inputs(url));
    service_monitor
}
