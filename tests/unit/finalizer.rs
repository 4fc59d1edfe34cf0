//! Unit tests for finalizer bookkeeping

use kube::ResourceExt;
use route_monitor_operator::controller::finalizer::{
    add_finalizer, has_finalizer, patch_finalizer, remove_finalizer,
};
use route_monitor_operator::{FINALIZER, LEGACY_FINALIZER};

use crate::common::*;

#[test]
fn test_add_is_idempotent() {
    let mut monitor = create_test_route_monitor("rm", "default");
    assert!(add_finalizer(&mut monitor, FINALIZER));
    assert!(!add_finalizer(&mut monitor, FINALIZER));
    assert_eq!(monitor.finalizers(), &[FINALIZER.to_string()]);
}

#[test]
fn test_remove_keeps_other_finalizers() {
    let mut monitor = RouteMonitorBuilder::new("rm", "default")
        .with_finalizer("other.example.com/keep")
        .with_finalizer(FINALIZER)
        .build();

    assert!(remove_finalizer(&mut monitor, FINALIZER));
    assert!(!remove_finalizer(&mut monitor, FINALIZER));
    assert_eq!(monitor.finalizers(), &["other.example.com/keep".to_string()]);
}

#[test]
fn test_patch_without_previous_is_noop() {
    let mut bare = create_test_route_monitor("rm", "default");
    assert!(!patch_finalizer(&mut bare, LEGACY_FINALIZER, FINALIZER));
    assert!(bare.finalizers().is_empty());

    let mut current = RouteMonitorBuilder::new("rm", "default")
        .with_finalizer(FINALIZER)
        .build();
    assert!(!patch_finalizer(&mut current, LEGACY_FINALIZER, FINALIZER));
    assert_eq!(current.finalizers(), &[FINALIZER.to_string()]);
}

#[test]
fn test_patch_replaces_previous() {
    let mut monitor = RouteMonitorBuilder::new("rm", "default")
        .with_finalizer(LEGACY_FINALIZER)
        .build();
    assert!(patch_finalizer(&mut monitor, LEGACY_FINALIZER, FINALIZER));
    assert_eq!(monitor.finalizers(), &[FINALIZER.to_string()]);
}

#[test]
fn test_patch_with_both_drops_previous() {
    let mut monitor = RouteMonitorBuilder::new("rm", "default")
        .with_finalizer(LEGACY_FINALIZER)
        .with_finalizer(FINALIZER)
        .build();
    assert!(patch_finalizer(&mut monitor, LEGACY_FINALIZER, FINALIZER));
    assert!(!has_finalizer(&monitor, LEGACY_FINALIZER));
    assert_eq!(monitor.finalizers(), &[FINALIZER.to_string()]);

    // Applying it again changes nothing
    assert!(!patch_finalizer(&mut monitor, LEGACY_FINALIZER, FINALIZER));
    assert_eq!(monitor.finalizers(), &[FINALIZER.to_string()]);
}
