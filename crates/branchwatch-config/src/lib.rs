//! Configuration for branchwatch.
//!
//! This crate handles parsing of:
//! - System configuration (branchwatch.kdl)
//! - The repo list consumed by the job builder

pub mod error;
pub mod repos;
pub mod system;

pub use error::{ConfigError, ConfigResult};
pub use repos::{
    RepoEntryParseError, RepoList, load_repo_list, parse_repo_list, parse_repo_list_bytes,
};
pub use system::{MailConfig, NotifyConfig, SystemConfig, load_system_config, parse_system_config};
