//! Executor trait.
//!
//! Executors take a build job from clone to finished command in an isolated
//! working directory owned by that job alone.

use async_trait::async_trait;

use crate::job::{BuildJob, BuildOutcome, JobLifecycle};
use crate::Result;

/// Trait for build executors.
#[async_trait]
pub trait BuildExecutor: Send + Sync {
    /// Name of this executor.
    fn name(&self) -> &'static str;

    /// Run `job` to completion.
    ///
    /// A failing clone or command is reported as a `Failure` outcome, not as an error.
    /// `Err` is reserved for conditions that prevent the job from running at all,
    /// such as being unable to create its working directory.
    ///
    /// Implementations advance `lifecycle` through `Cloning`, `Running` and the
    /// terminal build state.
    async fn execute(&self, job: &BuildJob, lifecycle: &mut JobLifecycle) -> Result<BuildOutcome>;
}
