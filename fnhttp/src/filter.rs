//! Pre- and post-invocation hooks wrapped around every function call

use async_trait::async_trait;

use crate::{Error, Invocation};

/// The result of an invocation, as seen by post-invocation hooks
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Every filter passed and the function returned a response
    Succeeded,
    /// A filter or the function body failed
    Failed,
}

impl Outcome {
    /// Whether the invocation succeeded
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

/// A hook that runs around every function invocation
///
/// Filters run in registration order. The first filter to return an error
/// stops the chain; the error is recorded on the invocation and the function
/// body is skipped. `on_executed` runs for every filter regardless.
#[async_trait]
pub trait InvocationFilter: Send + Sync {
    /// The name under which failures of this filter are recorded
    fn name(&self) -> &'static str;

    /// Runs before the function body
    async fn on_executing(&self, invocation: &Invocation) -> Result<(), Error>;

    /// Runs after the function body, or after a filter failure
    async fn on_executed(&self, _invocation: &Invocation, _outcome: Outcome) {}
}
