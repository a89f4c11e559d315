//! Configuration management for the uploader
//!
//! Supports loading settings from:
//! - Default values
//! - Config file (sourcemaps.toml)
//! - Environment variables (SOURCEMAPS_*)
//!
//! ## Example config file (sourcemaps.toml):
//! ```toml
//! [upload]
//! group = "web-frontend"
//! extensions = [".js", ".map"]
//! ignore = ["**/node_modules/**", "**/*.test.js"]
//! root = "dist"
//!
//! [endpoint]
//! host = "sourcemaps.upload.dev"
//! ```
//!
//! Loaded [`Settings`] are turned into an [`UploadConfig`], the validated
//! record the upload pipeline consumes.

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, UploadError};
use crate::log::LogSink;

/// Characters that would turn an extension into a glob
const WILDCARD_CHARS: &[char] = &['*', '?', '[', ']', '{', '}', '!'];

/// Settings as read from files and the environment
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Upload settings
    #[serde(default)]
    pub upload: UploadSettings,

    /// Ingestion service endpoint
    #[serde(default)]
    pub endpoint: Endpoint,
}

/// Upload settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadSettings {
    /// Group the maps are uploaded under
    #[serde(default)]
    pub group: Option<String>,

    /// API key used as bearer token
    #[serde(default)]
    pub api_key: Option<String>,

    /// File name suffixes picked up when walking directories
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Glob patterns excluded from directory walks
    #[serde(default = "default_ignore")]
    pub ignore: Vec<String>,

    /// Directory uploaded file names are made relative to
    #[serde(default)]
    pub root: Option<PathBuf>,

    /// Only log what would be uploaded
    #[serde(default)]
    pub dry_run: bool,
}

/// Location of the ingestion service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    #[serde(default = "default_scheme")]
    pub scheme: String,

    /// Logical hostname, used for DNS, TLS verification and the Host header
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_path")]
    pub path: String,
}

impl Endpoint {
    /// URL of the upload resource addressed by logical hostname
    pub fn url(&self) -> String {
        format!("{}://{}:{}{}", self.scheme, self.host, self.port, self.path)
    }
}

// Default value functions
fn default_extensions() -> Vec<String> {
    [".js", ".mjs", ".cjs", ".map"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_ignore() -> Vec<String> {
    vec!["**/node_modules/**".to_string()]
}

fn default_scheme() -> String {
    "https".to_string()
}

fn default_host() -> String {
    "sourcemaps.upload.dev".to_string()
}

fn default_port() -> u16 {
    443
}

fn default_path() -> String {
    "/v1/sourcemaps".to_string()
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            group: None,
            api_key: None,
            extensions: default_extensions(),
            ignore: default_ignore(),
            root: None,
            dry_run: false,
        }
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self {
            scheme: default_scheme(),
            host: default_host(),
            port: default_port(),
            path: default_path(),
        }
    }
}

impl Settings {
    /// Load settings from default locations
    pub fn load() -> std::result::Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load settings, layering an explicit file over the default locations
    pub fn load_from(config_path: Option<&str>) -> std::result::Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = [
            "sourcemaps.toml",
            ".sourcemaps.toml",
            "config/sourcemaps.toml",
        ];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        if let Some(config_dir) = directories::ProjectDirs::from("dev", "familiar", "sourcemaps") {
            let xdg_config = config_dir.config_dir().join("sourcemaps.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // SOURCEMAPS_UPLOAD__API_KEY, SOURCEMAPS_ENDPOINT__HOST, ...
        builder = builder.add_source(
            Environment::with_prefix("SOURCEMAPS")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Build the upload record for a set of roots and a working directory.
    ///
    /// Missing group or key become empty strings and are rejected by
    /// [`UploadConfig::validate`].
    pub fn into_upload_config(
        self,
        cwd: PathBuf,
        roots: Vec<String>,
        log: LogSink,
    ) -> UploadConfig {
        let root = match self.upload.root {
            Some(root) if root.is_absolute() => root,
            Some(root) => cwd.join(root),
            None => cwd.clone(),
        };

        UploadConfig {
            cwd,
            roots,
            group: self.upload.group.unwrap_or_default(),
            api_key: self.upload.api_key.unwrap_or_default(),
            dry_run: self.upload.dry_run,
            extensions: self.upload.extensions,
            ignore: self.upload.ignore,
            root,
            endpoint: self.endpoint,
            log,
        }
    }
}

/// Fully populated configuration for one upload call
#[derive(Clone)]
pub struct UploadConfig {
    /// Directory relative roots are resolved against
    pub cwd: PathBuf,
    /// Files and directories to scan, in order
    pub roots: Vec<String>,
    pub group: String,
    pub api_key: String,
    pub dry_run: bool,
    pub extensions: Vec<String>,
    pub ignore: Vec<String>,
    /// Directory uploaded file names are relative to
    pub root: PathBuf,
    pub endpoint: Endpoint,
    pub log: LogSink,
}

impl std::fmt::Debug for UploadConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadConfig")
            .field("cwd", &self.cwd)
            .field("roots", &self.roots)
            .field("group", &self.group)
            .field("api_key", &"<redacted>")
            .field("dry_run", &self.dry_run)
            .field("extensions", &self.extensions)
            .field("ignore", &self.ignore)
            .field("root", &self.root)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl UploadConfig {
    /// Reject malformed configuration before any I/O happens
    pub fn validate(&self) -> Result<()> {
        if !self.cwd.is_absolute() {
            return Err(invalid(format!(
                "working directory must be absolute: {}",
                self.cwd.display()
            )));
        }
        if !self.root.is_absolute() {
            return Err(invalid(format!(
                "root must be absolute: {}",
                self.root.display()
            )));
        }
        if self.roots.is_empty() {
            return Err(invalid("at least one path to scan is required"));
        }
        if self.roots.iter().any(|r| r.trim().is_empty()) {
            return Err(invalid("paths to scan must not be empty"));
        }
        if self.group.trim().is_empty() {
            return Err(invalid("group is required"));
        }
        if self.api_key.trim().is_empty() {
            return Err(invalid("API key is required"));
        }
        if self.extensions.is_empty() {
            return Err(invalid("at least one extension is required"));
        }
        for ext in &self.extensions {
            if !ext.starts_with('.') || ext.len() < 2 {
                return Err(invalid(format!("extension must start with '.': {:?}", ext)));
            }
            if ext.contains(WILDCARD_CHARS) {
                return Err(invalid(format!(
                    "extension must not contain wildcards: {:?}",
                    ext
                )));
            }
        }
        for pattern in &self.ignore {
            globset::Glob::new(pattern).map_err(|source| UploadError::InvalidIgnorePattern {
                pattern: pattern.clone(),
                source,
            })?;
        }
        if self.endpoint.host.trim().is_empty() {
            return Err(invalid("endpoint host is required"));
        }
        if !self.endpoint.path.starts_with('/') {
            return Err(invalid(format!(
                "endpoint path must start with '/': {:?}",
                self.endpoint.path
            )));
        }
        Ok(())
    }

    /// Resolve a root string against the working directory
    pub fn resolve_root(&self, root: &str) -> PathBuf {
        let path = Path::new(root);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.cwd.join(path)
        }
    }
}

fn invalid(message: impl Into<String>) -> UploadError {
    UploadError::InvalidConfig(message.into())
}
