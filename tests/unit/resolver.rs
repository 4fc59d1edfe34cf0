//! Unit tests for URL resolution

use route_monitor_operator::controller::resolver::ensure_url_resolved;
use route_monitor_operator::controller::{
    ClusterUrlResolver, Error, Flow, StaticDomain, UrlResolver,
};
use route_monitor_operator::crd::{ClusterUrlMonitor, Monitor, RouteMonitor};
use std::sync::Arc;

use crate::common::*;

#[tokio::test]
async fn test_route_host_becomes_url() {
    let harness = Harness::route_monitors();
    harness.routes.insert(create_test_route(
        "console",
        "openshift-console",
        "console.apps.example.com",
    ));
    let id = harness.seed(create_test_route_monitor("rm", "default"));

    let monitor = harness.current(&id);
    let flow = ensure_url_resolved(&monitor, harness.ctx.resolver.as_ref(), harness.monitors.as_ref())
        .await
        .unwrap();
    assert_eq!(flow, Flow::Stop);
    assert_eq!(
        harness.current(&id).resolved_url(),
        "https://console.apps.example.com"
    );

    // Cached URL is not written again
    harness.reset_counters();
    let monitor = harness.current(&id);
    let flow = ensure_url_resolved(&monitor, harness.ctx.resolver.as_ref(), harness.monitors.as_ref())
        .await
        .unwrap();
    assert_eq!(flow, Flow::Continue);
    assert_eq!(harness.writes(), 0);
}

#[tokio::test]
async fn test_missing_route_is_not_found() {
    let harness = Harness::route_monitors();
    let id = harness.seed(create_test_route_monitor("rm", "default"));

    let monitor: RouteMonitor = harness.current(&id);
    let err = harness.ctx.resolver.resolve(&monitor).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_route_without_host_is_no_host() {
    let harness = Harness::route_monitors();
    harness
        .routes
        .insert(create_test_route("console", "openshift-console", ""));
    let id = harness.seed(create_test_route_monitor("rm", "default"));

    let err = harness
        .ctx
        .resolver
        .resolve(&harness.current(&id))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NoHost(_)));
}

#[tokio::test]
async fn test_cluster_url_from_domain() {
    let resolver = ClusterUrlResolver::new(Arc::new(StaticDomain(TEST_DOMAIN.to_string())));
    let monitor: ClusterUrlMonitor = create_test_cluster_url_monitor("api", "default");
    assert_eq!(
        resolver.resolve(&monitor).await.unwrap(),
        "https://api.apps.example.com:6443/livez"
    );
}

#[tokio::test]
async fn test_changed_route_host_updates_url() {
    let harness = Harness::route_monitors();
    harness.routes.insert(create_test_route(
        "console",
        "openshift-console",
        "console.apps.example.com",
    ));
    let id = harness.seed(
        RouteMonitorBuilder::new("rm", "default")
            .with_route("console", "openshift-console")
            .with_url("https://old.apps.example.com")
            .build(),
    );

    let monitor = harness.current(&id);
    let flow = ensure_url_resolved(&monitor, harness.ctx.resolver.as_ref(), harness.monitors.as_ref())
        .await
        .unwrap();
    assert_eq!(flow, Flow::Stop);
    assert_eq!(
        harness.current(&id).resolved_url(),
        "https://console.apps.example.com"
    );
}
