//! System configuration parsing.

use crate::{ConfigError, ConfigResult};
use kdl::{KdlDocument, KdlNode};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

const DEFAULT_REPOS: &str = "repos.list";
const DEFAULT_CACHE: &str = "branchwatch.cache";
const DEFAULT_INTERVAL_SECS: u64 = 300;
const DEFAULT_REMOTE_TIMEOUT_SECS: u64 = 60;
const DEFAULT_LIST_CONCURRENCY: usize = 4;
const DEFAULT_NOTIFY_TIMEOUT_SECS: u64 = 30;

/// System-wide configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    /// Number of concurrent build workers.
    pub workers: usize,
    /// Path to the repo list.
    pub repos: PathBuf,
    /// Path to the persisted branch result cache.
    pub cache: PathBuf,
    /// Parent directory for per-job working directories.
    pub work_dir: PathBuf,
    /// Delay between passes in watch mode.
    pub interval: Duration,
    /// Upper bound on a single remote branch listing.
    pub remote_timeout: Duration,
    /// How many remotes are listed at once.
    pub list_concurrency: usize,
    pub notify: NotifyConfig,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            repos: PathBuf::from(DEFAULT_REPOS),
            cache: PathBuf::from(DEFAULT_CACHE),
            work_dir: std::env::temp_dir(),
            interval: Duration::from_secs(DEFAULT_INTERVAL_SECS),
            remote_timeout: Duration::from_secs(DEFAULT_REMOTE_TIMEOUT_SECS),
            list_concurrency: DEFAULT_LIST_CONCURRENCY,
            notify: NotifyConfig::default(),
        }
    }
}

/// Where finished build outcomes are reported.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Write a log line per outcome.
    pub log: bool,
    /// URLs that receive a JSON POST per outcome.
    pub webhooks: Vec<Url>,
    pub mail: Option<MailConfig>,
    /// Upper bound on a single webhook or mail delivery.
    pub timeout: Duration,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            log: true,
            webhooks: Vec::new(),
            mail: None,
            timeout: Duration::from_secs(DEFAULT_NOTIFY_TIMEOUT_SECS),
        }
    }
}

/// Mail delivery settings. The message is piped to `command`.
#[derive(Clone, Serialize, Deserialize)]
pub struct MailConfig {
    pub from: String,
    pub to: Vec<String>,
    pub server: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    /// Sendmail-compatible command reading an RFC 5322 message on stdin.
    pub command: Vec<String>,
}

impl std::fmt::Debug for MailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailConfig")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("server", &self.server)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("command", &self.command)
            .finish()
    }
}

/// Read and parse a system configuration file.
pub fn load_system_config(path: &Path) -> ConfigResult<SystemConfig> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_system_config(&text)
}

/// Parse system configuration from KDL text. Missing keys take their defaults.
pub fn parse_system_config(kdl: &str) -> ConfigResult<SystemConfig> {
    let doc: KdlDocument = kdl.parse()?;
    let mut config = SystemConfig::default();

    for node in doc.nodes() {
        match node.name().value() {
            "workers" => {
                let workers = get_positive_int_arg(node, "workers")?;
                config.workers = workers as usize;
            }
            "repos" => config.repos = PathBuf::from(require_string_arg(node, "repos")?),
            "cache" => config.cache = PathBuf::from(require_string_arg(node, "cache")?),
            "work-dir" => config.work_dir = PathBuf::from(require_string_arg(node, "work-dir")?),
            "interval" => {
                config.interval = Duration::from_secs(get_positive_int_arg(node, "interval")?);
            }
            "remote-timeout" => {
                config.remote_timeout =
                    Duration::from_secs(get_positive_int_arg(node, "remote-timeout")?);
            }
            "list-concurrency" => {
                config.list_concurrency = get_positive_int_arg(node, "list-concurrency")? as usize;
            }
            "notify" => config.notify = parse_notify(node)?,
            _ => {} // Ignore unknown nodes
        }
    }

    Ok(config)
}

fn parse_notify(node: &KdlNode) -> ConfigResult<NotifyConfig> {
    // An explicit notify block only enables what it lists.
    let mut notify = NotifyConfig {
        log: false,
        ..NotifyConfig::default()
    };

    let Some(children) = node.children() else {
        return Ok(notify);
    };

    for child in children.nodes() {
        match child.name().value() {
            "log" => notify.log = get_first_bool_arg(child).unwrap_or(true),
            "webhook" => {
                let raw = require_string_arg(child, "notify.webhook")?;
                let url = Url::parse(&raw)
                    .map_err(|e| ConfigError::invalid("notify.webhook", e.to_string()))?;
                notify.webhooks.push(url);
            }
            "mail" => notify.mail = Some(parse_mail(child)?),
            "timeout" => {
                notify.timeout = Duration::from_secs(get_positive_int_arg(child, "notify.timeout")?);
            }
            _ => {}
        }
    }

    Ok(notify)
}

fn parse_mail(node: &KdlNode) -> ConfigResult<MailConfig> {
    let mut from = None;
    let mut to = Vec::new();
    let mut server = None;
    let mut user = None;
    let mut password = None;
    let mut command = Vec::new();

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "from" => from = get_first_string_arg(child),
                "to" => to.extend(get_all_string_args(child)),
                "server" => server = get_first_string_arg(child),
                "user" => user = get_first_string_arg(child),
                "password" => password = get_first_string_arg(child),
                "command" => command = get_all_string_args(child),
                _ => {}
            }
        }
    }

    let from = from.ok_or_else(|| ConfigError::MissingField("notify.mail.from".to_string()))?;
    if to.is_empty() {
        return Err(ConfigError::MissingField("notify.mail.to".to_string()));
    }
    if command.is_empty() {
        command = vec!["sendmail".to_string(), "-t".to_string()];
    }

    Ok(MailConfig {
        from,
        to,
        server,
        user,
        password,
        command,
    })
}

fn get_first_string_arg(node: &KdlNode) -> Option<String> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_string())
        .map(|s| s.to_string())
}

fn get_all_string_args(node: &KdlNode) -> Vec<String> {
    node.entries()
        .iter()
        .filter(|e| e.name().is_none())
        .filter_map(|e| e.value().as_string())
        .map(|s| s.to_string())
        .collect()
}

fn get_first_bool_arg(node: &KdlNode) -> Option<bool> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_bool())
}

fn require_string_arg(node: &KdlNode, field: &str) -> ConfigResult<String> {
    get_first_string_arg(node).ok_or_else(|| ConfigError::MissingField(field.to_string()))
}

fn get_positive_int_arg(node: &KdlNode, field: &str) -> ConfigResult<u64> {
    let value = node
        .entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_integer())
        .ok_or_else(|| ConfigError::invalid(field, "expected an integer"))?;

    if value <= 0 {
        return Err(ConfigError::invalid(field, "must be greater than zero"));
    }
    u64::try_from(value).map_err(|_| ConfigError::invalid(field, "value too large"))
}
