//! YAML configuration for a relocation run.
//!
//! ```yaml
//! samba:
//!   host: 10.0.0.5
//!   port: 445
//!   user: svc
//!   password: secret
//!   share: exchange
//!   mount_point: /mnt/exchange
//! folders: [reports, incoming]
//! direction: PUT_FILE
//! policy:
//!   upload_on_error: skip
//!   download_on_error: abort
//!   max_consecutive_failures: 10
//! verify: sha256
//! log:
//!   file: app.log
//!   level: info
//! ```

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::checksums::ChecksumAlgorithm;
use crate::error::ConfigError;
use crate::model::{OnFileError, RelocateOptions, RelocationPlan, TransferDirection};

pub const DEFAULT_CONFIG_FILE: &str = "config.yml";
pub const DEFAULT_SMB_PORT: u16 = 445;

/// Top-level configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct RelocationConfig {
    pub samba: ShareConfig,

    /// Folders to relocate, processed in this order
    pub folders: Vec<String>,

    pub direction: TransferDirection,

    /// Root of the local tree that mirrors the share
    #[serde(default = "default_local_root")]
    pub local_root: PathBuf,

    #[serde(default)]
    pub policy: PolicyConfig,

    #[serde(default)]
    pub verify: Option<ChecksumAlgorithm>,

    #[serde(default = "default_preserve_mtime")]
    pub preserve_mtime: bool,

    #[serde(default)]
    pub log: LogConfig,
}

/// Connection details of the remote share.
#[derive(Clone, Deserialize)]
pub struct ShareConfig {
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub user: String,

    #[serde(default)]
    pub password: String,

    #[serde(default)]
    pub share: String,

    /// Where the OS mounted the share; required outside Windows
    #[serde(default)]
    pub mount_point: Option<PathBuf>,
}

impl ShareConfig {
    /// Filesystem root under which the share's files are reachable.
    pub fn root(&self) -> Result<PathBuf, String> {
        if let Some(mount_point) = &self.mount_point {
            return Ok(mount_point.clone());
        }

        if cfg!(windows) {
            if self.port != DEFAULT_SMB_PORT {
                tracing::warn!(
                    port = self.port,
                    "UNC paths always use port 445; the configured port is ignored"
                );
            }
            Ok(PathBuf::from(format!(r"\\{}\{}", self.host, self.share)))
        } else {
            Err(format!(
                "samba.mount_point is required on this platform (share '{}' on {})",
                self.share, self.host
            ))
        }
    }
}

impl fmt::Debug for ShareConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShareConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("share", &self.share)
            .field("mount_point", &self.mount_point)
            .finish()
    }
}

/// Failure policy section.
#[derive(Debug, Clone, Deserialize)]
pub struct PolicyConfig {
    #[serde(default = "default_upload_policy")]
    pub upload_on_error: OnFileError,

    #[serde(default = "default_download_policy")]
    pub download_on_error: OnFileError,

    #[serde(default)]
    pub max_consecutive_failures: Option<u32>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        PolicyConfig {
            upload_on_error: default_upload_policy(),
            download_on_error: default_download_policy(),
            max_consecutive_failures: None,
        }
    }
}

/// Logging section.
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_file")]
    pub file: PathBuf,

    /// "error", "warn", "info", "debug" or "trace"
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            file: default_log_file(),
            level: default_log_level(),
        }
    }
}

fn default_local_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_port() -> u16 {
    DEFAULT_SMB_PORT
}

fn default_preserve_mtime() -> bool {
    true
}

fn default_upload_policy() -> OnFileError {
    OnFileError::Skip
}

fn default_download_policy() -> OnFileError {
    OnFileError::Abort
}

fn default_log_file() -> PathBuf {
    PathBuf::from("app.log")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl RelocationConfig {
    /// Read, parse and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: RelocationConfig =
            serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse {
                path: path.to_path_buf(),
                source: e,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.folders.is_empty() {
            return Err(ConfigError::Invalid("folders must not be empty".to_string()));
        }
        if let Some(index) = self.folders.iter().position(|f| f.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "folders[{}] is an empty folder name",
                index
            )));
        }
        if self.samba.mount_point.is_none() && self.samba.share.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "samba.share is required when samba.mount_point is not set".to_string(),
            ));
        }
        if self.policy.max_consecutive_failures == Some(0) {
            return Err(ConfigError::Invalid(
                "policy.max_consecutive_failures must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn options(&self) -> RelocateOptions {
        RelocateOptions {
            upload_on_error: self.policy.upload_on_error,
            download_on_error: self.policy.download_on_error,
            max_consecutive_failures: self.policy.max_consecutive_failures,
            verify: self.verify,
            preserve_mtime: self.preserve_mtime,
        }
    }

    pub fn plan(&self) -> RelocationPlan {
        RelocationPlan {
            direction: self.direction,
            folders: self.folders.clone(),
            options: self.options(),
        }
    }
}
