//! Error types for the monitor controllers

use std::time::Duration;

use thiserror::Error;

/// Error variants are named with the `Error` suffix where they wrap another error.
#[allow(clippy::enum_variant_names)]
#[derive(Error, Debug)]
pub enum Error {
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Missing object key: {0}")]
    MissingObjectKey(&'static str),

    /// The resolved URL has not been populated yet
    #[error("Missing host: no resolved URL for {0}")]
    NoHost(String),

    #[error("Invalid SLO: {0}")]
    InvalidSlo(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Optimistic concurrency conflict on write
    #[error("Conflict writing {0}: object was modified")]
    Conflict(String),

    #[error("Transient error (will retry): {0}")]
    TransientError(String),
}

impl Error {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::KubeError(e) => match e {
                kube::Error::Api(api_err) => {
                    // 4xx errors (except 409 Conflict, 429 TooManyRequests) are usually not retryable
                    let code = api_err.code;
                    if (400..500).contains(&code) {
                        return code == 409 || code == 429;
                    }
                    true
                }
                _ => true,
            },
            Error::TransientError(_) => true,
            Error::Conflict(_) => true,
            // Upstream resolution usually completes on a later pass
            Error::NoHost(_) => true,
            Error::NotFound(_) => true,
            // Needs a user edit of the spec
            Error::InvalidSlo(_) => false,
            Error::SerializationError(_) => false,
            Error::MissingObjectKey(_) => false,
        }
    }

    /// Check if this error means the object does not exist
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::NotFound(_) => true,
            Error::KubeError(kube::Error::Api(resp)) => resp.code == 404,
            _ => false,
        }
    }

    /// Check if this error is an optimistic concurrency conflict
    pub fn is_conflict(&self) -> bool {
        match self {
            Error::Conflict(_) => true,
            Error::KubeError(kube::Error::Api(resp)) => resp.code == 409,
            _ => false,
        }
    }

    /// Short machine-readable label, used for metrics and logs
    pub fn reason(&self) -> &'static str {
        match self {
            Error::KubeError(_) => "KubeError",
            Error::SerializationError(_) => "SerializationError",
            Error::MissingObjectKey(_) => "MissingObjectKey",
            Error::NoHost(_) => "NoHost",
            Error::InvalidSlo(_) => "InvalidSlo",
            Error::NotFound(_) => "NotFound",
            Error::Conflict(_) => "Conflict",
            Error::TransientError(_) => "TransientError",
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Exponential backoff configuration
#[derive(Clone, Debug)]
pub struct BackoffConfig {
    /// Initial delay for first retry
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for each subsequent retry
    pub multiplier: f64,
    /// Random jitter factor (0.0 to 1.0)
    pub jitter: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(300),
            multiplier: 2.0,
            jitter: 0.1,
        }
    }
}

impl BackoffConfig {
    /// Calculate the backoff delay for a given retry attempt
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(32) as i32;
        let base_delay_secs = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);

        let jitter_range = base_delay_secs * self.jitter;
        let jitter = rand::random::<f64>() * jitter_range * 2.0 - jitter_range;
        let delay_with_jitter = (base_delay_secs + jitter).max(0.0);

        let capped_delay = delay_with_jitter.min(self.max_delay.as_secs_f64());

        Duration::from_secs_f64(capped_delay)
    }

    /// Get the delay for an error, with different handling for retryable vs non-retryable
    pub fn delay_for_error(&self, error: &Error, attempt: u32) -> Duration {
        if error.is_retryable() {
            self.delay_for_attempt(attempt)
        } else {
            // Rate limit errors that need a user fix
            self.max_delay
        }
    }
}

/// Consecutive error tracking for one object
#[derive(Clone, Debug, Default)]
pub struct ErrorContext {
    /// Number of consecutive errors
    pub consecutive_errors: u32,
    /// Reason of the most recent error
    pub last_reason: Option<&'static str>,
}

impl ErrorContext {
    /// Record an error, returning whether its reason differs from the previous one
    pub fn record_error(&mut self, error: &Error) -> bool {
        self.consecutive_errors = self.consecutive_errors.saturating_add(1);
        let reason = error.reason();
        self.last_reason.replace(reason) != Some(reason)
    }
}
