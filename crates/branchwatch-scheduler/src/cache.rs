//! Branch result cache.
//!
//! Holds the last known (hash, status) per (repository URL, branch). Workers
//! update it concurrently; every read-modify-write happens under one lock so
//! updates are never lost or interleaved.
//!
//! On disk the cache is one record per line, tab separated:
//!
//! ```text
//! <url>\t<branch>\t<hash>\t<status>
//! ```
//!
//! Records are written sorted by key. Malformed lines are skipped on load.

use branchwatch_core::{BuildStatus, CacheKey, CacheRecord, Error, Result, is_commit_hash};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info, warn};

/// A persisted line that could not be parsed. The line is skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheParseError {
    /// 1-based line number.
    pub line: usize,
    pub message: String,
}

impl std::fmt::Display for CacheParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

/// The cached value for one branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResult {
    pub hash: String,
    pub status: BuildStatus,
}

#[derive(Debug, Default)]
pub struct ResultCache {
    records: Mutex<HashMap<CacheKey, CachedResult>>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse persisted cache text, collecting diagnostics for skipped lines.
    /// When a key appears twice the later line wins.
    pub fn parse(text: &str) -> (Self, Vec<CacheParseError>) {
        Self::parse_bytes(text.as_bytes())
    }

    /// Like `parse`, but a line that is not valid UTF-8 is reported and skipped
    /// instead of failing the whole input.
    pub fn parse_bytes(bytes: &[u8]) -> (Self, Vec<CacheParseError>) {
        let mut records = HashMap::new();
        let mut errors = Vec::new();

        for (idx, raw) in bytes.split(|b| *b == b'\n').enumerate() {
            let Ok(line) = std::str::from_utf8(raw) else {
                errors.push(CacheParseError {
                    line: idx + 1,
                    message: "line is not valid UTF-8".to_string(),
                });
                continue;
            };
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }
            match parse_record(line) {
                Ok(record) => {
                    records.insert(
                        record.key(),
                        CachedResult {
                            hash: record.hash,
                            status: record.status,
                        },
                    );
                }
                Err(message) => errors.push(CacheParseError {
                    line: idx + 1,
                    message,
                }),
            }
        }

        (
            Self {
                records: Mutex::new(records),
            },
            errors,
        )
    }

    /// Load the cache from `path`. A missing file is an empty cache.
    pub fn load(path: &Path) -> Result<(Self, Vec<CacheParseError>)> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "No cache file yet, starting empty");
                return Ok((Self::new(), Vec::new()));
            }
            Err(e) => {
                return Err(Error::Cache(format!(
                    "cannot read {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        let (cache, errors) = Self::parse_bytes(&bytes);
        for error in &errors {
            warn!(path = %path.display(), line = error.line, error = %error.message, "Skipping malformed cache line");
        }
        info!(path = %path.display(), records = cache.len(), "Loaded result cache");
        Ok((cache, errors))
    }

    pub fn lookup(&self, url: &str, branch: &str) -> Option<CachedResult> {
        self.records
            .lock()
            .get(&CacheKey::new(url, branch))
            .cloned()
    }

    /// Insert or overwrite the record for (url, branch).
    pub fn update(&self, url: &str, branch: &str, hash: &str, status: BuildStatus) {
        let previous = self.records.lock().insert(
            CacheKey::new(url, branch),
            CachedResult {
                hash: hash.to_string(),
                status,
            },
        );
        debug!(
            url = %url,
            branch = %branch,
            hash = %hash,
            status = %status,
            replaced = previous.is_some(),
            "Cache updated"
        );
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Snapshot of every record, sorted by (url, branch).
    pub fn records(&self) -> Vec<CacheRecord> {
        let mut records: Vec<CacheRecord> = self
            .records
            .lock()
            .iter()
            .map(|(key, value)| CacheRecord {
                url: key.url.clone(),
                branch: key.branch.clone(),
                hash: value.hash.clone(),
                status: value.status,
            })
            .collect();
        records.sort_by(|a, b| (&a.url, &a.branch).cmp(&(&b.url, &b.branch)));
        records
    }

    /// Render the on-disk form.
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        for record in self.records() {
            out.push_str(&format!(
                "{}\t{}\t{}\t{}\n",
                record.url, record.branch, record.hash, record.status
            ));
        }
        out
    }

    /// Write the cache to `path`, replacing the previous file atomically.
    ///
    /// Expected to run once all workers have finished.
    pub fn persist(&self, path: &Path) -> Result<()> {
        let content = self.serialize();
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let cache_err =
            |e: std::io::Error| Error::Cache(format!("cannot write {}: {}", path.display(), e));

        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(cache_err)?;
        tmp.write_all(content.as_bytes()).map_err(cache_err)?;
        tmp.as_file().sync_all().map_err(cache_err)?;
        tmp.persist(path).map_err(|e| cache_err(e.error))?;

        info!(path = %path.display(), records = self.len(), "Persisted result cache");
        Ok(())
    }
}

fn parse_record(line: &str) -> std::result::Result<CacheRecord, String> {
    let fields: Vec<&str> = line.split('\t').collect();
    let [url, branch, hash, status] = fields.as_slice() else {
        return Err(format!("expected 4 tab-separated fields, found {}", fields.len()));
    };

    if url.is_empty() || branch.is_empty() {
        return Err("empty url or branch".to_string());
    }
    if !is_commit_hash(hash) {
        return Err(format!("invalid commit hash `{}`", hash));
    }
    let status: BuildStatus = status.parse()?;

    Ok(CacheRecord {
        url: url.to_string(),
        branch: branch.to_string(),
        hash: hash.to_string(),
        status,
    })
}
