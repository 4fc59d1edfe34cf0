pub mod controller;
pub mod crd;
pub mod health;
pub mod resources;
pub mod store;

pub use controller::{
    BackoffConfig, Context, Error, FINALIZER, Flow, LEGACY_FINALIZER, Result, StepResult,
    error_policy, reconcile,
};
pub use crd::{ClusterUrlMonitor, Monitor, RouteMonitor};
pub use health::{HealthState, Metrics};

use std::sync::Arc;

use futures::StreamExt;
use kube::runtime::Controller;
use kube::runtime::controller::Error as ControllerError;
use kube::runtime::reflector::ObjectRef;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::{Api, Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;

use crate::controller::DomainSource;
use crate::crd::{NamespacedName, PrometheusRule, ServiceMonitor};
use crate::resources::{FIELD_MANAGER, MONITOR_LABEL};

/// Helper to create a namespaced or cluster-wide API based on scope.
fn scoped_api<T>(client: Client, namespace: Option<&str>) -> Api<T>
where
    T: Resource<Scope = k8s_openapi::NamespaceResourceScope>,
    <T as Resource>::DynamicType: Default,
    T: Clone + DeserializeOwned + std::fmt::Debug,
{
    match namespace {
        Some(ns) => Api::namespaced(client, ns),
        None => Api::all(client),
    }
}

/// Map a generated resource back to the monitor it was generated for
fn generated_for<M, D>(obj: D) -> Option<ObjectRef<M>>
where
    M: Monitor,
    D: ResourceExt,
{
    let name = obj.labels().get(MONITOR_LABEL)?;
    let namespace = obj.namespace()?;
    Some(ObjectRef::new(name).within(&namespace))
}

/// Run the RouteMonitor controller, cluster-wide when `namespace` is `None`.
pub async fn run_route_monitor_controller_scoped(
    client: Client,
    health_state: Option<Arc<HealthState>>,
    namespace: Option<&str>,
) {
    let ctx = Context::for_route_monitors(client.clone()).with_health_state(health_state);
    run_monitor_controller(client, Arc::new(ctx), namespace).await
}

/// Run the ClusterUrlMonitor controller with optional namespace scoping.
pub async fn run_cluster_url_monitor_controller_scoped(
    client: Client,
    domain: Arc<dyn DomainSource>,
    health_state: Option<Arc<HealthState>>,
    namespace: Option<&str>,
) {
    let ctx =
        Context::for_cluster_url_monitors(client.clone(), domain).with_health_state(health_state);
    run_monitor_controller(client, Arc::new(ctx), namespace).await
}

/// Drop the error streak of an object the controller can no longer find
fn forget_missing<M, Q>(ctx: &Context<M>, error: &ControllerError<Error, Q>)
where
    M: Monitor,
    Q: 'static,
{
    if let ControllerError::ObjectNotFound(obj_ref) = error {
        let namespace = obj_ref.namespace.clone().unwrap_or_default();
        ctx.reset_errors(&NamespacedName::new(&obj_ref.name, &namespace));
    }
}

/// Watch monitors of kind `M` and the resources generated for them, and
/// reconcile until the watch streams end.
async fn run_monitor_controller<M: Monitor>(
    client: Client,
    ctx: Arc<Context<M>>,
    namespace: Option<&str>,
) {
    let kind = M::kind(&());
    let scope_msg = namespace.unwrap_or("cluster-wide");
    tracing::info!(
        "Starting controller for {} resources (scope: {})",
        kind,
        scope_msg
    );

    let monitors: Api<M> = scoped_api(client.clone(), namespace);
    let service_monitors: Api<ServiceMonitor> = scoped_api(client.clone(), namespace);
    let prometheus_rules: Api<PrometheusRule> = scoped_api(client, namespace);

    let watcher_config = WatcherConfig::default().any_semantic();
    // Generated resources carry no owner references, follow them by label
    let generated_config = watcher_config
        .clone()
        .labels(&format!("app.kubernetes.io/managed-by={}", FIELD_MANAGER));

    Controller::new(monitors, watcher_config)
        .watches(
            service_monitors,
            generated_config.clone(),
            generated_for::<M, ServiceMonitor>,
        )
        .watches(
            prometheus_rules,
            generated_config,
            generated_for::<M, PrometheusRule>,
        )
        .run(reconcile::<M>, error_policy::<M>, ctx.clone())
        .for_each(|result| {
            if let Err(e) = &result {
                forget_missing(&ctx, e);
            }
            async move {
                match result {
                    Ok((obj, _action)) => {
                        tracing::debug!("Reconciled: {}", obj.name);
                    }
                    Err(e) => {
                        // Watch events for generated resources may outlive their monitor
                        let is_not_found = match &e {
                            ControllerError::ObjectNotFound(_) => true,
                            ControllerError::ReconcilerFailed(err, _) => err.is_not_found(),
                            _ => false,
                        };
                        if is_not_found {
                            tracing::debug!("Object no longer exists (likely deleted): {:?}", e);
                        } else {
                            tracing::error!("Reconciliation error: {:?}", e);
                        }
                    }
                }
            }
        })
        .await;

    // This should never complete in normal operation
    tracing::error!("{} controller stream ended unexpectedly", kind);
}
