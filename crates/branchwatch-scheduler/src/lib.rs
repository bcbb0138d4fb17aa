//! Change detection and build scheduling for branchwatch.
//!
//! A pass lists the branches of every configured repository, compares each
//! head against the result cache, and queues a build job only for branches
//! whose head commit moved. A fixed pool of workers drains the queue, records
//! each outcome in the cache and hands it to the notifier.

pub mod builder;
pub mod cache;
pub mod dispatcher;
pub mod lister;
pub mod pool;
pub mod queue;
pub mod worker;

pub use builder::{BuilderReport, JobBuilder, RemoteFailure};
pub use cache::{CacheParseError, CachedResult, ResultCache};
pub use dispatcher::{Dispatcher, RunSummary};
pub use lister::{BranchLister, GitLister, parse_ls_remote};
pub use pool::{PoolHandle, PoolReport, WorkerPool};
pub use queue::{JobReceiver, JobSender, job_queue};
pub use worker::{Worker, WorkerReport};
