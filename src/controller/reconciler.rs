//! Reconciliation of RouteMonitor and ClusterUrlMonitor resources
//!
//! Both kinds run the same pass, built from steps that each return a
//! [`StepResult`]. The first step that does not continue ends the pass.

use std::sync::Arc;
use std::time::Instant;

use kube::runtime::controller::Action;
use kube::ResourceExt;
use tracing::{debug, error, info, instrument, warn};

use crate::controller::cleanup::{ensure_alert_rule_absent, finalize};
use crate::controller::context::Context;
use crate::controller::error::{Error, Result};
use crate::controller::finalizer::{FINALIZER, LEGACY_FINALIZER, patch_finalizer};
use crate::controller::flow::{Flow, StepResult, continue_reconcile, stop_reconcile};
use crate::controller::resolver::ensure_url_resolved;
use crate::controller::synchronizer::{ensure_prometheus_rule, ensure_service_monitor};
use crate::crd::{Monitor, NamespacedName};
use crate::step;
use crate::store::Store;

/// Replace the legacy finalizer key with the current one
pub async fn migrate_finalizer<M: Monitor>(monitor: &M, monitors: &dyn Store<M>) -> StepResult {
    let mut staged = monitor.clone();
    if !patch_finalizer(&mut staged, LEGACY_FINALIZER, FINALIZER) {
        return continue_reconcile();
    }

    monitors.update(&staged).await?;
    info!("Migrated finalizer of {}", NamespacedName::of(monitor));
    stop_reconcile()
}

/// Run one pass over a live monitor
pub async fn reconcile_steps<M: Monitor>(monitor: &M, ctx: &Context<M>) -> StepResult {
    let monitors = ctx.monitors.as_ref();

    step!(migrate_finalizer(monitor, monitors).await);
    step!(ensure_url_resolved(monitor, ctx.resolver.as_ref(), monitors).await);
    step!(ensure_alert_rule_absent(monitor, monitors, ctx.prometheus_rules.as_ref()).await);
    step!(ensure_service_monitor(monitor, monitors, ctx.service_monitors.as_ref()).await);
    ensure_prometheus_rule(monitor, monitors, ctx.prometheus_rules.as_ref()).await
}

/// Main reconciliation function
#[instrument(skip(monitor, ctx), fields(kind = %M::kind(&()), name = %monitor.name_any(), namespace = monitor.namespace().unwrap_or_default()))]
pub async fn reconcile<M: Monitor>(monitor: Arc<M>, ctx: Arc<Context<M>>) -> Result<Action> {
    let started = Instant::now();
    let id = NamespacedName::of(monitor.as_ref());
    let kind = M::kind(&());

    if monitor.meta().deletion_timestamp.is_some() {
        info!("Handling deletion of {}", id);
        finalize(
            monitor.as_ref(),
            ctx.monitors.as_ref(),
            ctx.service_monitors.as_ref(),
            ctx.prometheus_rules.as_ref(),
        )
        .await?;
        ctx.reset_errors(&id);
        return Ok(Action::await_change());
    }

    debug!("Reconciling {}", id);
    let flow: Flow = reconcile_steps(monitor.as_ref(), &ctx).await?;

    ctx.reset_errors(&id);
    if let Some(ref health) = ctx.health_state {
        health.metrics.record_reconcile(
            &kind,
            &id.namespace,
            &id.name,
            started.elapsed().as_secs_f64(),
        );
        health.metrics.record_outcome(&kind, flow.as_str());
        health.mark_reconciled();
    }

    debug!("Pass over {} ended with {}", id, flow);
    Ok(flow.into_action())
}

/// Error policy for the controller with exponential backoff
pub fn error_policy<M: Monitor>(monitor: Arc<M>, error: &Error, ctx: Arc<Context<M>>) -> Action {
    let id = NamespacedName::of(monitor.as_ref());
    let kind = M::kind(&());

    let (attempt, new_reason) = ctx.record_error(&id, error);
    let delay = ctx.backoff.delay_for_error(error, attempt.saturating_sub(1));

    if let Some(ref health) = ctx.health_state {
        health
            .metrics
            .record_error(&kind, &id.namespace, &id.name, error.reason());
        health.metrics.record_outcome(&kind, "error");
    }

    if error.is_retryable() && !new_reason {
        debug!(
            "{} {} still failing (attempt {}): {}, requeuing in {:?}",
            kind, id, attempt, error, delay
        );
    } else if error.is_retryable() {
        warn!(
            "Retryable error for {} {} (attempt {}): {}, requeuing in {:?}",
            kind, id, attempt, error, delay
        );
    } else {
        error!(
            "Non-retryable error for {} {}: {}, requeuing in {:?} for manual intervention",
            kind, id, error, delay
        );
    }

    Action::requeue(delay)
}
