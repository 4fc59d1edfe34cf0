//! Removal of generated resources
//!
//! Generated resources carry no owner references, so nothing garbage
//! collects them. They are deleted here: the alert rule as soon as the SLO is
//! dropped, everything once the monitor itself is being deleted.

use tracing::info;

use crate::controller::error::Result;
use crate::controller::finalizer::{FINALIZER, LEGACY_FINALIZER, has_finalizer, remove_finalizer};
use crate::controller::flow::{StepResult, continue_reconcile, stop_reconcile};
use crate::crd::{Monitor, MonitorStatus, NamespacedName, PrometheusRule, ServiceMonitor};
use crate::store::Store;

/// Whether the monitor holds one of our finalizers
pub fn is_finalizing<M: Monitor>(monitor: &M) -> bool {
    has_finalizer(monitor, FINALIZER) || has_finalizer(monitor, LEGACY_FINALIZER)
}

/// Reference recorded in status, falling back to the owner identity
fn recorded_or_owner(recorded: &NamespacedName, owner: &NamespacedName) -> NamespacedName {
    if recorded.is_empty() {
        owner.clone()
    } else {
        recorded.clone()
    }
}

/// Delete the alert rule of a monitor whose SLO was removed
pub async fn ensure_alert_rule_absent<M: Monitor>(
    monitor: &M,
    monitors: &dyn Store<M>,
    prometheus_rules: &dyn Store<PrometheusRule>,
) -> StepResult {
    if monitor.slo().is_some() {
        return continue_reconcile();
    }

    let status = monitor.status_or_default();
    if status.prometheus_rule_ref.is_empty()
        && status.current_target_availability_percentile.is_empty()
    {
        return continue_reconcile();
    }

    let id = NamespacedName::of(monitor);
    let rule = recorded_or_owner(&status.prometheus_rule_ref, &id);
    if prometheus_rules.delete(&rule).await? {
        info!("Deleted PrometheusRule {} of {}", rule, id);
    }

    let cleared = MonitorStatus {
        prometheus_rule_ref: NamespacedName::default(),
        current_target_availability_percentile: String::new(),
        ..status
    };
    let mut staged = monitor.clone();
    staged.set_monitor_status(cleared);
    monitors.update_status(&staged).await?;
    stop_reconcile()
}

/// Delete every generated resource, then release the monitor
pub async fn finalize<M: Monitor>(
    monitor: &M,
    monitors: &dyn Store<M>,
    service_monitors: &dyn Store<ServiceMonitor>,
    prometheus_rules: &dyn Store<PrometheusRule>,
) -> Result<()> {
    let id = NamespacedName::of(monitor);
    if !is_finalizing(monitor) {
        return Ok(());
    }

    info!("Finalizing {}", id);
    let status = monitor.status_or_default();

    let service_monitor = recorded_or_owner(&status.service_monitor_ref, &id);
    if service_monitors.delete(&service_monitor).await? {
        info!("Deleted ServiceMonitor {}", service_monitor);
    }

    let rule = recorded_or_owner(&status.prometheus_rule_ref, &id);
    if prometheus_rules.delete(&rule).await? {
        info!("Deleted PrometheusRule {}", rule);
    }

    let mut staged = monitor.clone();
    let removed = remove_finalizer(&mut staged, FINALIZER);
    let removed_legacy = remove_finalizer(&mut staged, LEGACY_FINALIZER);
    if removed || removed_legacy {
        monitors.update(&staged).await?;
        info!("Removed finalizer from {}", id);
    }
    Ok(())
}
