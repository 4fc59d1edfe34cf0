pub mod common;
pub mod prometheus_rule;
pub mod service_monitor;

pub use common::{
    API_GROUP, FIELD_MANAGER, MONITOR_LABEL, SOURCE_URL_ANNOTATION, TARGET_ANNOTATION, built_from,
    generated_metadata, standard_labels,
};
