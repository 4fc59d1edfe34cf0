//! Control signal threaded between reconcile steps
//!
//! Every step returns a [`StepResult`]:
//! - `Ok(Flow::Continue)`: the step is satisfied, run the next one
//! - `Ok(Flow::Stop)`: the step wrote something; end the pass and re-observe
//!   without counting it as a failure
//! - `Err(e)`: the step failed; the pass is aborted and `e` goes to the error
//!   policy for backoff
//!
//! Steps are composed with [`step!`](crate::step), which returns early from
//! the enclosing function on anything but `Continue`.

use std::time::Duration;

use kube::runtime::controller::Action;

use crate::controller::error::{Error, Result};

/// Delay before re-observing an object after a step stopped the pass
pub const STOP_REQUEUE_DELAY: Duration = Duration::from_secs(1);

/// Successful outcome of a reconcile step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flow {
    /// Proceed to the next step
    Continue,
    /// End this pass without error
    Stop,
}

/// Outcome of a reconcile step, `Err` requeues with backoff
pub type StepResult = Result<Flow>;

impl Flow {
    /// Action handed back to the controller runtime once a pass ends
    pub fn into_action(self) -> Action {
        match self {
            // Nothing left to do until the object or a dependent changes
            Flow::Continue => Action::await_change(),
            Flow::Stop => Action::requeue(STOP_REQUEUE_DELAY),
        }
    }

    /// Label used in logs and metrics
    pub fn as_str(self) -> &'static str {
        match self {
            Flow::Continue => "continue",
            Flow::Stop => "stop",
        }
    }
}

impl std::fmt::Display for Flow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn continue_reconcile() -> StepResult {
    Ok(Flow::Continue)
}

pub fn stop_reconcile() -> StepResult {
    Ok(Flow::Stop)
}

pub fn requeue_with(error: impl Into<Error>) -> StepResult {
    Err(error.into())
}

/// Run a step and return from the enclosing function unless it continues.
///
/// Must be used in a function returning [`StepResult`].
#[macro_export]
macro_rules! step {
    ($step:expr) => {
        match $step? {
            $crate::controller::flow::Flow::Continue => {}
            $crate::controller::flow::Flow::Stop => {
                return Ok($crate::controller::flow::Flow::Stop);
            }
        }
    };
}
