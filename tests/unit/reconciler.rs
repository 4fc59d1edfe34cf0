//! Unit tests for full reconcile passes against in-memory stores

use std::sync::Arc;

use kube::ResourceExt;
use kube::runtime::controller::Action;
use route_monitor_operator::controller::flow::STOP_REQUEUE_DELAY;
use route_monitor_operator::controller::{Context, Error, Flow, error_policy, reconcile};
use route_monitor_operator::crd::{Monitor, NamespacedName, RouteMonitor, SloSpec};
use route_monitor_operator::store::Store;
use route_monitor_operator::{FINALIZER, HealthState, LEGACY_FINALIZER};

use crate::common::*;

fn route_harness() -> Harness<RouteMonitor> {
    let harness = Harness::route_monitors();
    harness.routes.insert(create_test_route(
        "console",
        "openshift-console",
        "console.apps.example.com",
    ));
    harness
}

mod lifecycle_tests {
    use super::*;

    #[tokio::test]
    async fn test_monitor_without_slo_settles() {
        let harness = route_harness();
        let id = harness.seed(create_test_route_monitor("rm", "default"));

        // URL, finalizer, ServiceMonitor
        assert_eq!(harness.settle(&id).await, 3);

        let monitor = harness.current(&id);
        let status = monitor.status_or_default();
        assert_eq!(status.url, "https://console.apps.example.com");
        assert_eq!(status.service_monitor_ref, id);
        assert!(status.prometheus_rule_ref.is_empty());
        assert_eq!(monitor.finalizers(), &[FINALIZER.to_string()]);
        assert!(harness.service_monitors.contains(&id));
        assert!(harness.prometheus_rules.is_empty());

        harness.reset_counters();
        assert_eq!(harness.pass(&id).await.unwrap(), Flow::Continue);
        assert_eq!(harness.writes(), 0);
    }

    #[tokio::test]
    async fn test_monitor_with_slo_settles() {
        let harness = route_harness();
        let id = harness.seed(
            RouteMonitorBuilder::new("rm", "default")
                .with_route("console", "openshift-console")
                .with_slo("0.9995")
                .build(),
        );

        assert_eq!(harness.settle(&id).await, 4);

        let status = harness.current(&id).status_or_default();
        assert_eq!(status.prometheus_rule_ref, id);
        assert_eq!(status.current_target_availability_percentile, "0.9995");
        assert!(harness.prometheus_rules.contains(&id));
    }

    #[tokio::test]
    async fn test_removed_slo_is_torn_down_and_not_recreated() {
        let harness = route_harness();
        let id = harness.seed(
            RouteMonitorBuilder::new("rm", "default")
                .with_route("console", "openshift-console")
                .with_slo("0.9995")
                .build(),
        );
        harness.settle(&id).await;

        let mut monitor = harness.current(&id);
        monitor.spec.slo = None;
        harness.monitors.insert(monitor);

        assert_eq!(harness.settle(&id).await, 1);
        assert!(harness.prometheus_rules.is_empty());
        let status = harness.current(&id).status_or_default();
        assert!(status.prometheus_rule_ref.is_empty());
        assert!(status.current_target_availability_percentile.is_empty());

        for _ in 0..3 {
            assert_eq!(harness.pass(&id).await.unwrap(), Flow::Continue);
        }
        assert!(harness.prometheus_rules.is_empty());
    }

    #[tokio::test]
    async fn test_empty_slo_counts_as_absent() {
        let harness = route_harness();
        let id = harness.seed(
            RouteMonitorBuilder::new("rm", "default")
                .with_route("console", "openshift-console")
                .build(),
        );
        let mut monitor = harness.current(&id);
        monitor.spec.slo = Some(SloSpec::default());
        harness.monitors.insert(monitor);

        assert_eq!(harness.settle(&id).await, 3);
        assert!(harness.prometheus_rules.is_empty());
    }

    #[tokio::test]
    async fn test_legacy_finalizer_is_migrated_first() {
        let harness = route_harness();
        let id = harness.seed(
            RouteMonitorBuilder::new("rm", "default")
                .with_route("console", "openshift-console")
                .with_finalizer(LEGACY_FINALIZER)
                .build(),
        );

        assert_eq!(harness.pass(&id).await.unwrap(), Flow::Stop);
        assert_eq!(harness.monitors.updates(), 1);
        assert_eq!(harness.current(&id).finalizers(), &[FINALIZER.to_string()]);
        assert!(harness.current(&id).status_or_default().url.is_empty());

        harness.settle(&id).await;
        assert_eq!(harness.current(&id).finalizers(), &[FINALIZER.to_string()]);
    }

    #[tokio::test]
    async fn test_changed_route_host_rebuilds_dependents() {
        let harness = route_harness();
        let id = harness.seed(
            RouteMonitorBuilder::new("rm", "default")
                .with_route("console", "openshift-console")
                .with_slo("0.9995")
                .build(),
        );
        harness.settle(&id).await;
        harness.reset_counters();

        harness.routes.insert(create_test_route(
            "console",
            "openshift-console",
            "console.apps2.example.com",
        ));
        // Only the URL write stops; both rebuilds happen in the following pass
        assert_eq!(harness.settle(&id).await, 1);
        assert_eq!(harness.service_monitors.updates(), 1);
        assert_eq!(harness.prometheus_rules.updates(), 1);

        let url = "https://console.apps2.example.com";
        assert_eq!(harness.current(&id).resolved_url(), url);
        let sm = harness.service_monitors.find(&id).unwrap();
        assert_eq!(
            sm.spec.endpoints[0].params.get("target"),
            Some(&vec![url.to_string()])
        );
        let rule = harness.prometheus_rules.find(&id).unwrap();
        assert!(rule.spec.groups[0].rules.iter().all(|r| r.expr.contains(url)));
    }

    #[tokio::test]
    async fn test_missing_route_fails_pass() {
        let harness = Harness::route_monitors();
        let id = harness.seed(create_test_route_monitor("rm", "default"));

        let err = harness.pass(&id).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(harness.writes(), 0);
    }

    #[tokio::test]
    async fn test_cluster_url_monitor_settles() {
        let harness = Harness::cluster_url_monitors();
        let id = harness.seed(create_test_cluster_url_monitor("api", "default"));

        assert_eq!(harness.settle(&id).await, 3);
        let status = harness.current(&id).status_or_default();
        assert_eq!(status.url, format!("https://api.{}:6443/livez", TEST_DOMAIN));

        let created = harness.service_monitors.find(&id).unwrap();
        assert_eq!(
            created.spec.endpoints[0].params.get("target"),
            Some(&vec![status.url.clone()])
        );
        assert!(harness.prometheus_rules.is_empty());
    }
}

mod entry_point_tests {
    use super::*;

    #[tokio::test]
    async fn test_actions_follow_flow() {
        let harness = route_harness();
        let id = harness.seed(create_test_route_monitor("rm", "default"));

        let action = harness.reconcile(&id).await.unwrap();
        assert_eq!(action, Action::requeue(STOP_REQUEUE_DELAY));

        harness.settle(&id).await;
        let action = harness.reconcile(&id).await.unwrap();
        assert_eq!(action, Action::await_change());
    }

    #[tokio::test]
    async fn test_deletion_cleans_up() {
        let harness = route_harness();
        let id = harness.seed(
            RouteMonitorBuilder::new("rm", "default")
                .with_route("console", "openshift-console")
                .with_slo("0.999")
                .build(),
        );
        harness.settle(&id).await;
        assert!(harness.service_monitors.contains(&id));
        assert!(harness.prometheus_rules.contains(&id));

        harness.monitors.delete(&id).await.unwrap();
        let action = harness.reconcile(&id).await.unwrap();

        assert_eq!(action, Action::await_change());
        assert!(harness.service_monitors.is_empty());
        assert!(harness.prometheus_rules.is_empty());
        assert!(!harness.monitors.contains(&id));
    }

    #[tokio::test]
    async fn test_error_streaks() {
        let harness = route_harness();
        let id = harness.seed(create_test_route_monitor("rm", "default"));
        let monitor = Arc::new(harness.current(&id));
        let err = Error::TransientError("boom".to_string());

        let first = error_policy(monitor.clone(), &err, harness.ctx.clone());
        let second = error_policy(monitor.clone(), &err, harness.ctx.clone());
        assert_ne!(first, Action::await_change());
        assert_ne!(second, Action::await_change());
        assert_eq!(harness.ctx.consecutive_errors(&id), 2);

        // A successful pass resets the streak
        harness.reconcile(&id).await.unwrap();
        assert_eq!(harness.ctx.consecutive_errors(&id), 0);
    }

    #[tokio::test]
    async fn test_invalid_slo_waits_for_spec_fix() {
        let harness = route_harness();
        let id = harness.seed(
            RouteMonitorBuilder::new("rm", "default")
                .with_route("console", "openshift-console")
                .with_slo("0.5")
                .build(),
        );

        let mut last = Ok(Flow::Continue);
        for _ in 0..MAX_PASSES {
            last = harness.pass(&id).await;
            if last.is_err() {
                break;
            }
        }
        let err = last.unwrap_err();
        assert!(matches!(err, Error::InvalidSlo(_)));
        assert!(harness.prometheus_rules.is_empty());

        let action = error_policy(Arc::new(harness.current(&id)), &err, harness.ctx.clone());
        assert_eq!(action, Action::requeue(harness.ctx.backoff.max_delay));
    }

    #[tokio::test]
    async fn test_metrics_are_recorded() {
        let harness = route_harness();
        let id = harness.seed(create_test_route_monitor("rm", "default"));
        let health = Arc::new(HealthState::new());
        let ctx = Arc::new(
            Context::new(
                harness.monitors.clone(),
                harness.service_monitors.clone(),
                harness.prometheus_rules.clone(),
                harness.ctx.resolver.clone(),
            )
            .with_health_state(Some(health.clone())),
        );

        reconcile(Arc::new(harness.current(&id)), ctx.clone())
            .await
            .unwrap();
        error_policy(
            Arc::new(harness.current(&id)),
            &Error::NotFound("route".to_string()),
            ctx,
        );

        let encoded = health.metrics.encode();
        assert!(encoded.contains("outcome=\"stop\""));
        assert!(encoded.contains("outcome=\"error\""));
        assert!(encoded.contains("reason=\"NotFound\""));
        assert!(encoded.contains("name=\"rm\""));
        assert!(
            health
                .last_reconcile
                .load(std::sync::atomic::Ordering::Relaxed)
                > 0
        );
    }

    #[test]
    fn test_identity_is_namespaced() {
        let monitor = create_test_route_monitor("rm", "default");
        assert_eq!(NamespacedName::of(&monitor).to_string(), "default/rm");
    }
}
