//! Print the CustomResourceDefinitions of the monitor kinds as YAML
//!
//! ```sh
//! cargo run --bin crdgen > deploy/crds.yaml
//! ```

use kube::CustomResourceExt;

use route_monitor_operator::{ClusterUrlMonitor, RouteMonitor};

fn main() -> Result<(), serde_yaml::Error> {
    let crds = [RouteMonitor::crd(), ClusterUrlMonitor::crd()];
    for crd in &crds {
        println!("---");
        print!("{}", serde_yaml::to_string(crd)?);
    }
    Ok(())
}
