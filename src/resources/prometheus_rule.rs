//! PrometheusRule generation
//!
//! Alerts follow the multiwindow, multi-burn-rate scheme: each alert fires
//! when the probe error ratio exceeds `factor * error_budget` over both a long
//! and a short window. The long window detects the burn, the short one makes
//! the alert reset quickly once the burn stops.

use std::collections::BTreeMap;

use crate::controller::validation::NormalizedSlo;
use crate::crd::{NamespacedName, PrometheusRule, PrometheusRuleSpec, Rule, RuleGroup};
use crate::resources::common::{
    MONITOR_LABEL, SOURCE_URL_ANNOTATION, TARGET_ANNOTATION, generated_metadata,
};
use crate::resources::service_monitor::PROBE_URL_LABEL;

/// Name of the alert raised on error budget burn
pub const ALERT_NAME: &str = "ErrorBudgetBurn";

/// Burn rate window pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BurnRateWindow {
    pub long: &'static str,
    pub short: &'static str,
    /// Multiple of the error budget the ratio must exceed
    pub factor: f64,
    pub severity: &'static str,
    pub for_: &'static str,
}

/// 2% of a 30 day budget in 1h, 5% in 6h, 10% in 1d and 3d
pub const BURN_RATE_WINDOWS: [BurnRateWindow; 4] = [
    BurnRateWindow {
        long: "1h",
        short: "5m",
        factor: 14.4,
        severity: "critical",
        for_: "2m",
    },
    BurnRateWindow {
        long: "6h",
        short: "30m",
        factor: 6.0,
        severity: "critical",
        for_: "15m",
    },
    BurnRateWindow {
        long: "1d",
        short: "2h",
        factor: 3.0,
        severity: "warning",
        for_: "1h",
    },
    BurnRateWindow {
        long: "3d",
        short: "6h",
        factor: 1.0,
        severity: "warning",
        for_: "3h",
    },
];

/// Inputs recorded on the PrometheusRule for `url` and `slo`
pub fn inputs<'a>(url: &'a str, slo: &'a NormalizedSlo) -> [(&'static str, &'a str); 2] {
    [
        (SOURCE_URL_ANNOTATION, url),
        (TARGET_ANNOTATION, slo.target.as_str()),
    ]
}

/// Generate the PrometheusRule alerting on error budget burn of `url`
pub fn generate(url: &str, slo: &NormalizedSlo, id: &NamespacedName) -> PrometheusRule {
    let rules = BURN_RATE_WINDOWS
        .iter()
        .map(|window| burn_rate_rule(url, slo, id, window))
        .collect();

    let mut rule = PrometheusRule::new(
        &id.name,
        PrometheusRuleSpec {
            groups: vec![RuleGroup {
                name: format!("slo-{}", id.name),
                rules,
            }],
        },
    );
    rule.metadata = generated_metadata(id, &inputs(url, slo));
    rule
}

fn burn_rate_rule(
    url: &str,
    slo: &NormalizedSlo,
    id: &NamespacedName,
    window: &BurnRateWindow,
) -> Rule {
    let threshold = format!("({} * {})", window.factor, slo.error_budget);
    let expr = format!(
        "{} > {}\nand\n{} > {}",
        error_ratio(url, window.long),
        threshold,
        error_ratio(url, window.short),
        threshold,
    );

    let labels = BTreeMap::from([
        ("severity".to_string(), window.severity.to_string()),
        ("long_window".to_string(), window.long.to_string()),
        ("short_window".to_string(), window.short.to_string()),
        (MONITOR_LABEL.to_string(), id.name.clone()),
        ("namespace".to_string(), id.namespace.clone()),
    ]);

    let annotations = BTreeMap::from([(
        "message".to_string(),
        format!(
            "{} is burning its error budget (target availability {}) {}x faster than allowed over the last {}",
            url, slo.target, window.factor, window.long
        ),
    )]);

    Rule {
        alert: ALERT_NAME.to_string(),
        expr,
        for_: Some(window.for_.to_string()),
        labels,
        annotations,
    }
}

/// Fraction of failed probes of `url` over `range`
fn error_ratio(url: &str, range: &str) -> String {
    let selector = format!("probe_success{{{}=\"{}\"}}", PROBE_URL_LABEL, escape_label_value(url));
    format!(
        "(1 - (sum(sum_over_time({selector}[{range}])) / sum(count_over_time({selector}[{range}]))))"
    )
}

fn escape_label_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
