use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::SweepError;

/// Default credentials file, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "access.json";

/// Credentials and endpoints for one sweep run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// GitLab private token
    pub gitlab: String,
    /// Review database server connection URI
    #[serde(default, alias = "mongo")]
    pub database: Option<String>,
    /// S3-compatible object store holding review buckets
    #[serde(default, rename = "minio", alias = "object_store")]
    pub object_store: Option<ObjectStoreAccess>,
    #[serde(default)]
    pub source_control: SourceControlConfig,
    /// Path the config was loaded from, for error messages
    #[serde(skip)]
    pub path: PathBuf,
}

/// Endpoint and static key pair for the object store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectStoreAccess {
    pub endpoint: String,
    pub access: String,
    pub secret: String,
    #[serde(default)]
    pub secure: bool,
}

/// Where to ask for open merge requests
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceControlConfig {
    pub url: String,
    pub project_id: u64,
    pub per_page: u32,
}

impl Default for SourceControlConfig {
    fn default() -> Self {
        Self {
            url: "https://git.niisi.ru".to_string(),
            project_id: 42,
            per_page: 100,
        }
    }
}

impl Config {
    /// Load credentials from a JSON or YAML file (chosen by extension)
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SweepError> {
        let path = path.as_ref();
        Self::read(path).map_err(|source| SweepError::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    fn read(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config = Self::parse(path, &content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.path = path.to_path_buf();

        if config.gitlab.trim().is_empty() {
            anyhow::bail!("`gitlab` token is empty");
        }

        info!(path = %path.display(), "Loaded configuration");

        Ok(config)
    }

    fn parse(path: &Path, content: &str) -> Result<Self> {
        let is_yaml = path
            .extension()
            .is_some_and(|ext| ext == "yml" || ext == "yaml");

        if is_yaml {
            Ok(serde_yaml::from_str(content)?)
        } else {
            Ok(serde_json::from_str(content)?)
        }
    }

    /// PostgreSQL URI, required only when the database backend is scanned
    pub fn database_url(&self) -> Result<&str, SweepError> {
        let url = self.database.as_deref().ok_or_else(|| SweepError::Config {
            path: self.path.clone(),
            source: anyhow::anyhow!("`mongo`/`database` connection URI is missing"),
        })?;

        let scheme = url.split_once("://").map(|(scheme, _)| scheme);
        if !matches!(scheme, Some("postgres" | "postgresql")) {
            return Err(SweepError::Config {
                path: self.path.clone(),
                source: anyhow::anyhow!(
                    "database URI must use postgres:// or postgresql://, got {:?}",
                    scheme.unwrap_or(url)
                ),
            });
        }

        Ok(url)
    }

    /// Object store access, required only when the object store is scanned
    pub fn object_store_access(&self) -> Result<&ObjectStoreAccess, SweepError> {
        self.object_store.as_ref().ok_or_else(|| SweepError::Config {
            path: self.path.clone(),
            source: anyhow::anyhow!("`minio` access section is missing"),
        })
    }
}
