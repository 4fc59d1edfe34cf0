//! Keeps a generated resource and the owner's status reference in step with
//! the monitor.
//!
//! One algorithm, instantiated per generated kind through [`DependentResource`]:
//!
//! 1. the resolved URL must be set, otherwise the pass fails with `NoHost`
//! 2. the kind may decline (alert rules without an SLO) or reject the spec
//! 3. the finalizer must be on the owner before anything is created; adding it
//!    ends the pass
//! 4. the resource is created when missing, and rebuilt when the inputs
//!    annotated on it differ from the current ones (a new URL or SLO target)
//! 5. the owner's status is updated when its reference is out of date, which
//!    also ends the pass
//!
//! Only the annotated inputs are compared; other edits made to a generated
//! resource by hand are left alone. A resource without the annotations is
//! rebuilt once.

use kube::Resource;
use tracing::{debug, info};

use crate::controller::error::{Error, Result};
use crate::controller::finalizer::{FINALIZER, add_finalizer, has_finalizer};
use crate::controller::flow::{StepResult, continue_reconcile, requeue_with, stop_reconcile};
use crate::controller::validation::{NormalizedSlo, normalize_slo};
use crate::crd::{Monitor, MonitorStatus, NamespacedName, PrometheusRule, ServiceMonitor, SloSpec};
use crate::resources::{built_from, prometheus_rule, service_monitor};
use crate::store::Store;

/// A kind of resource generated for every monitor
pub trait DependentResource {
    type Object: Resource + Clone + Send + Sync + 'static;

    /// Everything the template needs besides the identity
    type Input: Send + Sync;

    const KIND: &'static str;

    /// Template input for the monitor; `Ok(None)` when none should exist
    fn input(url: &str, slo: Option<&SloSpec>) -> Result<Option<Self::Input>>;

    fn template(input: &Self::Input, id: &NamespacedName) -> Self::Object;

    /// Whether an existing resource was built from a different input
    fn is_stale(existing: &Self::Object, input: &Self::Input) -> bool;

    /// Record the generated resource in the owner's status
    fn record(status: &mut MonitorStatus, input: &Self::Input, id: &NamespacedName);
}

/// ServiceMonitor scraping the blackbox exporter for the monitored URL
pub struct ScrapeEndpoint;

impl DependentResource for ScrapeEndpoint {
    type Object = ServiceMonitor;
    type Input = String;

    const KIND: &'static str = "ServiceMonitor";

    fn input(url: &str, _slo: Option<&SloSpec>) -> Result<Option<String>> {
        Ok(Some(url.to_string()))
    }

    fn template(url: &String, id: &NamespacedName) -> ServiceMonitor {
        service_monitor::generate(url, id)
    }

    fn is_stale(existing: &ServiceMonitor, url: &String) -> bool {
        !built_from(existing, &service_monitor::inputs(url))
    }

    fn record(status: &mut MonitorStatus, _url: &String, id: &NamespacedName) {
        status.service_monitor_ref = id.clone();
    }
}

/// PrometheusRule alerting on error budget burn, only generated with an SLO
pub struct AlertRule;

/// Input of the PrometheusRule template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertRuleInput {
    pub url: String,
    pub slo: NormalizedSlo,
}

impl DependentResource for AlertRule {
    type Object = PrometheusRule;
    type Input = AlertRuleInput;

    const KIND: &'static str = "PrometheusRule";

    fn input(url: &str, slo: Option<&SloSpec>) -> Result<Option<AlertRuleInput>> {
        let Some(slo) = slo else {
            return Ok(None);
        };
        Ok(Some(AlertRuleInput {
            url: url.to_string(),
            slo: normalize_slo(slo)?,
        }))
    }

    fn template(input: &AlertRuleInput, id: &NamespacedName) -> PrometheusRule {
        prometheus_rule::generate(&input.url, &input.slo, id)
    }

    fn is_stale(existing: &PrometheusRule, input: &AlertRuleInput) -> bool {
        !built_from(existing, &prometheus_rule::inputs(&input.url, &input.slo))
    }

    fn record(status: &mut MonitorStatus, input: &AlertRuleInput, id: &NamespacedName) {
        status.prometheus_rule_ref = id.clone();
        status.current_target_availability_percentile = input.slo.target.clone();
    }
}

/// Drive one generated resource of kind `D` towards the monitor's spec
pub async fn sync_dependent<M, D>(
    monitor: &M,
    monitors: &dyn Store<M>,
    dependents: &dyn Store<D::Object>,
) -> StepResult
where
    M: Monitor,
    D: DependentResource,
{
    let id = NamespacedName::of(monitor);

    let url = monitor.resolved_url();
    if url.is_empty() {
        return requeue_with(Error::NoHost(id.to_string()));
    }

    let Some(input) = D::input(url, monitor.slo())? else {
        debug!("No {} wanted for {}", D::KIND, id);
        return continue_reconcile();
    };

    if !has_finalizer(monitor, FINALIZER) {
        let mut staged = monitor.clone();
        add_finalizer(&mut staged, FINALIZER);
        monitors.update(&staged).await?;
        info!("Added finalizer to {}", id);
        return stop_reconcile();
    }

    let status = monitor.status_or_default();

    match dependents.get(&id).await? {
        None => {
            dependents.create(&D::template(&input, &id)).await?;
            info!("Created {} {}", D::KIND, id);
        }
        Some(existing) if D::is_stale(&existing, &input) => {
            let mut refreshed = D::template(&input, &id);
            refreshed.meta_mut().resource_version = existing.meta().resource_version.clone();
            dependents.update(&refreshed).await?;
            info!("Rebuilt {} {} for changed inputs", D::KIND, id);
        }
        Some(_) => {}
    }

    let mut desired = status.clone();
    D::record(&mut desired, &input, &id);
    if desired == status {
        return continue_reconcile();
    }

    let mut staged = monitor.clone();
    staged.set_monitor_status(desired);
    monitors.update_status(&staged).await?;
    info!("Updated {} reference in status of {}", D::KIND, id);
    stop_reconcile()
}

/// Ensure the ServiceMonitor exists and is referenced from status
pub async fn ensure_service_monitor<M: Monitor>(
    monitor: &M,
    monitors: &dyn Store<M>,
    service_monitors: &dyn Store<ServiceMonitor>,
) -> StepResult {
    sync_dependent::<M, ScrapeEndpoint>(monitor, monitors, service_monitors).await
}

/// Ensure the PrometheusRule exists and is referenced from status when an SLO is set
pub async fn ensure_prometheus_rule<M: Monitor>(
    monitor: &M,
    monitors: &dyn Store<M>,
    prometheus_rules: &dyn Store<PrometheusRule>,
) -> StepResult {
    sync_dependent::<M, AlertRule>(monitor, monitors, prometheus_rules).await
}
