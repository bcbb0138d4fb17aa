//! Build execution for branchwatch.
//!
//! Provides:
//! - Scoped per-job working directories
//! - Git clone, checkout and changelog helpers
//! - External command execution
//! - `LocalExecutor`, which ties the above together behind `BuildExecutor`

pub mod command;
pub mod git;
pub mod local;
pub mod workspace;

pub use branchwatch_core::executor::BuildExecutor;
pub use command::{CommandOutput, run_command};
pub use git::Git;
pub use local::LocalExecutor;
pub use workspace::Workspace;
