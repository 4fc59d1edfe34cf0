//! Resolution of the URL a monitor probes
//!
//! RouteMonitors probe the host of their Route; ClusterUrlMonitors probe a
//! URL built from the cluster ingress domain. The resolved URL is cached in
//! the monitor's status where the synchronizers pick it up.

use std::sync::Arc;

use async_trait::async_trait;
use kube::{Api, Client};
use tracing::info;

use crate::controller::error::{Error, Result};
use crate::controller::flow::{StepResult, continue_reconcile, stop_reconcile};
use crate::crd::{
    CLUSTER_INGRESS_NAME, ClusterIngress, ClusterUrlMonitor, Monitor, NamespacedName, Route,
    RouteMonitor,
};
use crate::store::Store;

/// Computes the URL a monitor should probe
#[async_trait]
pub trait UrlResolver<M>: Send + Sync {
    async fn resolve(&self, monitor: &M) -> Result<String>;
}

/// URL of an admitted route, `None` while the route has no host
pub fn route_url(route: &Route) -> Option<String> {
    if route.spec.host.is_empty() {
        return None;
    }
    let path = route.spec.path.as_deref().unwrap_or_default();
    Some(format!("https://{}{}", route.spec.host, path))
}

/// Resolves RouteMonitors through the Route they reference
pub struct RouteUrlResolver {
    routes: Arc<dyn Store<Route>>,
}

impl RouteUrlResolver {
    pub fn new(routes: Arc<dyn Store<Route>>) -> Self {
        Self { routes }
    }
}

#[async_trait]
impl UrlResolver<RouteMonitor> for RouteUrlResolver {
    async fn resolve(&self, monitor: &RouteMonitor) -> Result<String> {
        let route_ref = &monitor.spec.route;
        let key = NamespacedName::new(&route_ref.name, &route_ref.namespace);

        let route = self
            .routes
            .get(&key)
            .await?
            .ok_or_else(|| Error::NotFound(format!("route {}", key)))?;

        route_url(&route).ok_or_else(|| Error::NoHost(format!("route {} has no host", key)))
    }
}

/// Source of the cluster ingress domain
#[async_trait]
pub trait DomainSource: Send + Sync {
    async fn cluster_domain(&self) -> Result<String>;
}

/// Reads the domain from the cluster `Ingress` configuration object
pub struct IngressDomainSource {
    client: Client,
}

impl IngressDomainSource {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DomainSource for IngressDomainSource {
    async fn cluster_domain(&self) -> Result<String> {
        let api: Api<ClusterIngress> = Api::all(self.client.clone());
        let ingress = api
            .get_opt(CLUSTER_INGRESS_NAME)
            .await?
            .ok_or_else(|| Error::NotFound(format!("ingress config {}", CLUSTER_INGRESS_NAME)))?;

        if ingress.spec.domain.is_empty() {
            return Err(Error::NoHost(format!(
                "ingress config {} has no domain",
                CLUSTER_INGRESS_NAME
            )));
        }
        Ok(ingress.spec.domain)
    }
}

/// Fixed domain, set through configuration
pub struct StaticDomain(pub String);

#[async_trait]
impl DomainSource for StaticDomain {
    async fn cluster_domain(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// Resolves ClusterUrlMonitors against the cluster domain
pub struct ClusterUrlResolver {
    domain: Arc<dyn DomainSource>,
}

impl ClusterUrlResolver {
    pub fn new(domain: Arc<dyn DomainSource>) -> Self {
        Self { domain }
    }
}

#[async_trait]
impl UrlResolver<ClusterUrlMonitor> for ClusterUrlResolver {
    async fn resolve(&self, monitor: &ClusterUrlMonitor) -> Result<String> {
        let domain = self.domain.cluster_domain().await?;
        Ok(monitor.spec.construct_url(&domain))
    }
}

/// Cache the resolved URL in status, ending the pass when it changed
pub async fn ensure_url_resolved<M: Monitor>(
    monitor: &M,
    resolver: &dyn UrlResolver<M>,
    monitors: &dyn Store<M>,
) -> StepResult {
    let url = resolver.resolve(monitor).await?;
    if monitor.resolved_url() == url {
        return continue_reconcile();
    }

    let id = NamespacedName::of(monitor);
    info!(monitor = %id, url = %url, "Resolved monitor URL");

    let mut status = monitor.status_or_default();
    status.url = url;
    let mut staged = monitor.clone();
    staged.set_monitor_status(status);
    monitors.update_status(&staged).await?;
    stop_reconcile()
}
