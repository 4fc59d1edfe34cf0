mod cluster_url_monitor;
mod common;
mod monitoring;
mod openshift;
mod route_monitor;

pub use cluster_url_monitor::*;
pub use common::*;
pub use monitoring::*;
pub use openshift::*;
pub use route_monitor::*;
