//! Store configuration via `tally.toml`
//!
//! The CLI takes no flags beyond the isolation level and `--serial`, so the
//! store itself is configured through a file whose path is read from the
//! `TALLY_CONFIG` environment variable. No variable means defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use tally_concurrency::{IsolationPolicy, RepeatableReadPolicy};
use tally_core::{Error, Result};

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "TALLY_CONFIG";

/// Which store the scenario runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// The bundled in-memory MVCC engine
    #[default]
    Memory,
    /// A SQLite database file (requires the `sqlite` feature)
    Sqlite,
}

/// Store configuration loaded from `tally.toml`.
///
/// # Example
///
/// ```toml
/// backend = "memory"
/// repeatable_read = "first-updater-wins"
/// dirty_reads = true
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// Store backend: `"memory"` or `"sqlite"`.
    #[serde(default)]
    pub backend: Backend,
    /// Database file for the SQLite backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sqlite_path: Option<PathBuf>,
    /// Second-writer handling under repeatable read (memory backend).
    #[serde(default)]
    pub repeatable_read: RepeatableReadPolicy,
    /// Whether read uncommitted exposes uncommitted writes (memory backend).
    #[serde(default = "default_dirty_reads")]
    pub dirty_reads: bool,
}

fn default_dirty_reads() -> bool {
    true
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Memory,
            sqlite_path: None,
            repeatable_read: RepeatableReadPolicy::default(),
            dirty_reads: default_dirty_reads(),
        }
    }
}

impl StoreConfig {
    /// Isolation knobs for the in-memory engine.
    pub fn policy(&self) -> IsolationPolicy {
        IsolationPolicy {
            repeatable_read: self.repeatable_read,
            dirty_reads: self.dirty_reads,
        }
    }

    /// Check settings that serde cannot.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the SQLite backend has no `sqlite_path`.
    pub fn validate(&self) -> Result<()> {
        if self.backend == Backend::Sqlite && self.sqlite_path.is_none() {
            return Err(Error::Config(
                "backend \"sqlite\" requires sqlite_path".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# tally store configuration
#
# Store backend: "memory" (default) or "sqlite"
backend = "memory"

# Database file, required when backend = "sqlite"
# sqlite_path = "tally.db"

# Repeatable read, second writer of a row changed after its snapshot:
#   "first-updater-wins" (default) = the second writer aborts
#   "last-writer-wins"             = the second writer overwrites
repeatable_read = "first-updater-wins"

# Whether read uncommitted really reads uncommitted writes (default: true)
dirty_reads = true
"#
    }

    /// Parse and validate config from TOML text.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the text does not parse or validate.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: StoreConfig =
            toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content).map_err(|e| match e {
            Error::Config(msg) => Error::Config(format!(
                "failed to parse config file '{}': {}",
                path.display(),
                msg
            )),
            other => other,
        })
    }

    /// Load from the file named by `TALLY_CONFIG`, or defaults if unset.
    pub fn from_env() -> Result<Self> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) if !path.is_empty() => Self::from_file(Path::new(&path)),
            _ => Ok(Self::default()),
        }
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
