//! Core domain types and traits for branchwatch.
//!
//! This crate contains:
//! - Job identifiers
//! - Repository entries, branch heads and cache records
//! - Build jobs, outcomes and the per-job lifecycle
//! - The executor and notifier seams used by the worker pool

pub mod error;
pub mod executor;
pub mod id;
pub mod job;
pub mod notifier;
pub mod repository;

pub use error::{Error, Result};
pub use id::JobId;
pub use job::{BuildJob, BuildOutcome, BuildStatus, JobLifecycle, JobState};
pub use repository::{BranchHead, CacheKey, CacheRecord, RepoEntry, is_commit_hash};
