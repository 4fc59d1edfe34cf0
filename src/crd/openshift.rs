//! OpenShift objects the URL resolvers read. Only the fields used are modelled.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Name of the cluster-wide ingress configuration object
pub const CLUSTER_INGRESS_NAME: &str = "cluster";

/// OpenShift Route
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, JsonSchema, PartialEq)]
#[kube(
    group = "route.openshift.io",
    version = "v1",
    kind = "Route",
    plural = "routes",
    namespaced
)]
pub struct RouteSpec {
    /// Externally reachable host name, may be empty until admitted
    #[serde(default)]
    pub host: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Cluster ingress configuration (config.openshift.io/v1 Ingress)
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, JsonSchema, PartialEq)]
#[kube(
    group = "config.openshift.io",
    version = "v1",
    kind = "Ingress",
    root = "ClusterIngress",
    plural = "ingresses"
)]
pub struct ClusterIngressSpec {
    /// Base domain of the default ingress controller, e.g. "apps.example.com"
    #[serde(default)]
    pub domain: String,
}
