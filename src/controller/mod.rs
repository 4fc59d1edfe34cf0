pub mod cleanup;
pub mod context;
pub mod error;
pub mod finalizer;
pub mod flow;
pub mod reconciler;
pub mod resolver;
pub mod synchronizer;
pub mod validation;

pub use context::Context;
pub use error::{BackoffConfig, Error, ErrorContext, Result};
pub use finalizer::{FINALIZER, LEGACY_FINALIZER};
pub use flow::{Flow, StepResult};
pub use reconciler::{error_policy, reconcile};
pub use resolver::{
    ClusterUrlResolver, DomainSource, IngressDomainSource, RouteUrlResolver, StaticDomain,
    UrlResolver,
};
pub use validation::{NormalizedSlo, is_valid_availability, normalize_slo, validate_availability};
