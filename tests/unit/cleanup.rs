//! Unit tests for teardown of generated resources

use kube::ResourceExt;
use route_monitor_operator::controller::cleanup::{ensure_alert_rule_absent, finalize};
use route_monitor_operator::controller::{Flow, normalize_slo};
use route_monitor_operator::crd::{Monitor, MonitorStatus, NamespacedName, RouteMonitor, SloSpec};
use route_monitor_operator::resources::{prometheus_rule, service_monitor};
use route_monitor_operator::store::Store;
use route_monitor_operator::{FINALIZER, LEGACY_FINALIZER};

use crate::common::*;

const URL: &str = "https://console.apps.example.com";

fn seed_rule(harness: &Harness<RouteMonitor>, id: &NamespacedName) {
    let slo = normalize_slo(&SloSpec::new("0.9995")).unwrap();
    harness
        .prometheus_rules
        .insert(prometheus_rule::generate(URL, &slo, id));
}

#[tokio::test]
async fn test_removed_slo_deletes_rule_and_clears_status() {
    let harness = Harness::route_monitors();
    let id = NamespacedName::new("rm", "default");
    seed_rule(&harness, &id);
    harness.seed(
        RouteMonitorBuilder::new("rm", "default")
            .with_finalizer(FINALIZER)
            .with_status(MonitorStatus {
                url: URL.to_string(),
                service_monitor_ref: id.clone(),
                prometheus_rule_ref: id.clone(),
                current_target_availability_percentile: "0.9995".to_string(),
            })
            .build(),
    );

    let monitor = harness.current(&id);
    let flow = ensure_alert_rule_absent(
        &monitor,
        harness.monitors.as_ref(),
        harness.prometheus_rules.as_ref(),
    )
    .await
    .unwrap();
    assert_eq!(flow, Flow::Stop);
    assert!(harness.prometheus_rules.is_empty());

    let status = harness.current(&id).status_or_default();
    assert!(status.prometheus_rule_ref.is_empty());
    assert!(status.current_target_availability_percentile.is_empty());
    assert_eq!(status.service_monitor_ref, id);
    assert_eq!(status.url, URL);

    harness.reset_counters();
    let monitor = harness.current(&id);
    let flow = ensure_alert_rule_absent(
        &monitor,
        harness.monitors.as_ref(),
        harness.prometheus_rules.as_ref(),
    )
    .await
    .unwrap();
    assert_eq!(flow, Flow::Continue);
    assert_eq!(harness.writes(), 0);
}

#[tokio::test]
async fn test_already_deleted_rule_still_clears_status() {
    let harness = Harness::route_monitors();
    let id = NamespacedName::new("rm", "default");
    harness.seed(
        RouteMonitorBuilder::new("rm", "default")
            .with_status(MonitorStatus {
                prometheus_rule_ref: id.clone(),
                ..Default::default()
            })
            .build(),
    );

    let monitor = harness.current(&id);
    let flow = ensure_alert_rule_absent(
        &monitor,
        harness.monitors.as_ref(),
        harness.prometheus_rules.as_ref(),
    )
    .await
    .unwrap();
    assert_eq!(flow, Flow::Stop);
    assert!(harness.current(&id).status_or_default().prometheus_rule_ref.is_empty());
}

#[tokio::test]
async fn test_configured_slo_keeps_rule() {
    let harness = Harness::route_monitors();
    let id = NamespacedName::new("rm", "default");
    seed_rule(&harness, &id);
    harness.seed(
        RouteMonitorBuilder::new("rm", "default")
            .with_slo("0.9995")
            .with_status(MonitorStatus {
                prometheus_rule_ref: id.clone(),
                current_target_availability_percentile: "0.9995".to_string(),
                ..Default::default()
            })
            .build(),
    );

    let monitor = harness.current(&id);
    let flow = ensure_alert_rule_absent(
        &monitor,
        harness.monitors.as_ref(),
        harness.prometheus_rules.as_ref(),
    )
    .await
    .unwrap();
    assert_eq!(flow, Flow::Continue);
    assert!(harness.prometheus_rules.contains(&id));
}

#[tokio::test]
async fn test_finalize_deletes_dependents_then_releases_monitor() {
    let harness = Harness::route_monitors();
    let id = NamespacedName::new("rm", "default");
    seed_rule(&harness, &id);
    harness
        .service_monitors
        .insert(service_monitor::generate(URL, &id));
    harness.seed(
        RouteMonitorBuilder::new("rm", "default")
            .with_finalizer(FINALIZER)
            .with_finalizer(LEGACY_FINALIZER)
            .build(),
    );

    // Deleting a monitor holding finalizers only marks it
    assert!(harness.monitors.delete(&id).await.unwrap());
    let monitor = harness.current(&id);
    assert!(monitor.metadata.deletion_timestamp.is_some());

    finalize(
        &monitor,
        harness.monitors.as_ref(),
        harness.service_monitors.as_ref(),
        harness.prometheus_rules.as_ref(),
    )
    .await
    .unwrap();

    assert!(harness.service_monitors.is_empty());
    assert!(harness.prometheus_rules.is_empty());
    assert!(!harness.monitors.contains(&id));
}

#[tokio::test]
async fn test_finalize_keeps_finalizer_when_delete_fails() {
    let harness = Harness::route_monitors();
    let id = NamespacedName::new("rm", "default");
    harness
        .service_monitors
        .insert(service_monitor::generate(URL, &id));
    harness.seed(
        RouteMonitorBuilder::new("rm", "default")
            .with_finalizer(FINALIZER)
            .build(),
    );
    harness.service_monitors.set_fail_writes(true);

    let monitor = harness.current(&id);
    assert!(
        finalize(
            &monitor,
            harness.monitors.as_ref(),
            harness.service_monitors.as_ref(),
            harness.prometheus_rules.as_ref(),
        )
        .await
        .is_err()
    );
    assert_eq!(harness.current(&id).finalizers(), &[FINALIZER.to_string()]);
    assert_eq!(harness.monitors.updates(), 0);
}

#[tokio::test]
async fn test_finalize_without_our_finalizer_is_noop() {
    let harness = Harness::route_monitors();
    let id = NamespacedName::new("rm", "default");
    harness
        .service_monitors
        .insert(service_monitor::generate(URL, &id));
    harness.seed(
        RouteMonitorBuilder::new("rm", "default")
            .with_finalizer("other.example.com/keep")
            .build(),
    );

    let monitor = harness.current(&id);
    finalize(
        &monitor,
        harness.monitors.as_ref(),
        harness.service_monitors.as_ref(),
        harness.prometheus_rules.as_ref(),
    )
    .await
    .unwrap();
    assert_eq!(harness.writes(), 0);
    assert!(harness.service_monitors.contains(&id));
}
