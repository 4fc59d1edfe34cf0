use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use kube::Client;

use crate::controller::error::{BackoffConfig, Error, ErrorContext};
use crate::controller::resolver::{
    ClusterUrlResolver, DomainSource, RouteUrlResolver, UrlResolver,
};
use crate::crd::{ClusterUrlMonitor, NamespacedName, PrometheusRule, RouteMonitor, ServiceMonitor};
use crate::health::HealthState;
use crate::store::{KubeStore, Store};

/// Shared context for a monitor controller
pub struct Context<M: Send + Sync + 'static> {
    /// Monitors being reconciled
    pub monitors: Arc<dyn Store<M>>,
    pub service_monitors: Arc<dyn Store<ServiceMonitor>>,
    pub prometheus_rules: Arc<dyn Store<PrometheusRule>>,
    /// Computes the URL each monitor probes
    pub resolver: Arc<dyn UrlResolver<M>>,
    /// Health state for recording metrics
    pub health_state: Option<Arc<HealthState>>,
    /// Requeue delays after failed passes
    pub backoff: BackoffConfig,
    error_streaks: Mutex<HashMap<NamespacedName, ErrorContext>>,
}

impl<M: Send + Sync + 'static> Context<M> {
    pub fn new(
        monitors: Arc<dyn Store<M>>,
        service_monitors: Arc<dyn Store<ServiceMonitor>>,
        prometheus_rules: Arc<dyn Store<PrometheusRule>>,
        resolver: Arc<dyn UrlResolver<M>>,
    ) -> Self {
        Self {
            monitors,
            service_monitors,
            prometheus_rules,
            resolver,
            health_state: None,
            backoff: BackoffConfig::default(),
            error_streaks: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_health_state(mut self, health_state: Option<Arc<HealthState>>) -> Self {
        self.health_state = health_state;
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }

    /// Record a failed pass, returning the consecutive error count and whether
    /// the failure reason changed
    pub fn record_error(&self, id: &NamespacedName, error: &Error) -> (u32, bool) {
        let mut streaks = self
            .error_streaks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let streak = streaks.entry(id.clone()).or_default();
        let changed = streak.record_error(error);
        (streak.consecutive_errors, changed)
    }

    /// Forget the error streak of an object after a successful pass or once
    /// it is gone
    pub fn reset_errors(&self, id: &NamespacedName) {
        self.error_streaks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(id);
    }

    pub fn consecutive_errors(&self, id: &NamespacedName) -> u32 {
        self.error_streaks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(id)
            .map_or(0, |streak| streak.consecutive_errors)
    }

    /// Number of objects with an ongoing error streak
    pub fn failing_objects(&self) -> usize {
        self.error_streaks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

impl Context<RouteMonitor> {
    /// Context backed by the API server
    pub fn for_route_monitors(client: Client) -> Self {
        Self::new(
            Arc::new(KubeStore::new(client.clone())),
            Arc::new(KubeStore::new(client.clone())),
            Arc::new(KubeStore::new(client.clone())),
            Arc::new(RouteUrlResolver::new(Arc::new(KubeStore::new(client)))),
        )
    }
}

impl Context<ClusterUrlMonitor> {
    /// Context backed by the API server, resolving against `domain`
    pub fn for_cluster_url_monitors(client: Client, domain: Arc<dyn DomainSource>) -> Self {
        Self::new(
            Arc::new(KubeStore::new(client.clone())),
            Arc::new(KubeStore::new(client.clone())),
            Arc::new(KubeStore::new(client)),
            Arc::new(ClusterUrlResolver::new(domain)),
        )
    }
}
