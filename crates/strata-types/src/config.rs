use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Top-level archive configuration, read from a TOML file.
///
/// Every section is optional on disk; missing keys take their defaults.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    pub blob: BlobSettings,
    pub agent: AgentSettings,
    pub ingest: IngestSettings,
    pub notifications: NotificationSettings,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlobSettings {
    /// Size of each stored blob part in bytes.
    pub chunk_size: usize,
}

impl Default for BlobSettings {
    fn default() -> Self {
        Self {
            chunk_size: 1024 * 1024,
        }
    }
}

/// Remote file-serving agent used for `file://` reference resources.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    pub port: u16,
    pub fetch_chunk_size: usize,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            port: 9000,
            fetch_chunk_size: 1024,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestSettings {
    pub workers: usize,
    pub queue_capacity: usize,
    pub max_attempts: u32,
    pub cache_capacity: usize,
    pub skip_extensions: Vec<String>,
}

impl IngestSettings {
    pub const MIN_WORKERS: usize = 8;
    pub const MAX_WORKERS: usize = 16;

    /// Worker count clamped to the supported pool size.
    pub fn worker_count(&self) -> usize {
        self.workers.clamp(Self::MIN_WORKERS, Self::MAX_WORKERS)
    }
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            workers: 16,
            queue_capacity: 900,
            max_attempts: 4,
            cache_capacity: 1000,
            skip_extensions: vec![".pyc".to_string()],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationSettings {
    pub enabled: bool,
    pub channel_capacity: usize,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            channel_capacity: 1024,
        }
    }
}

impl ArchiveConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, TypeError> {
        let config: Self = toml::from_str(text).map_err(|e| TypeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file.
    pub fn load(path: &Path) -> Result<Self, TypeError> {
        let text = std::fs::read_to_string(path).map_err(|source| TypeError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Render as TOML.
    pub fn to_toml_string(&self) -> Result<String, TypeError> {
        toml::to_string_pretty(self).map_err(|e| TypeError::Serialization(e.to_string()))
    }

    fn validate(&self) -> Result<(), TypeError> {
        if self.blob.chunk_size == 0 {
            return Err(TypeError::Config("blob.chunk_size must be > 0".into()));
        }
        if self.agent.fetch_chunk_size == 0 {
            return Err(TypeError::Config("agent.fetch_chunk_size must be > 0".into()));
        }
        if self.ingest.queue_capacity == 0 {
            return Err(TypeError::Config("ingest.queue_capacity must be > 0".into()));
        }
        if self.ingest.max_attempts == 0 {
            return Err(TypeError::Config("ingest.max_attempts must be > 0".into()));
        }
        Ok(())
    }
}

/// Shared, explicitly reloadable configuration.
///
/// Constructed once at startup and handed to the components that need it.
#[derive(Clone, Debug)]
pub struct ConfigHandle {
    inner: Arc<RwLock<ArchiveConfig>>,
    source: Option<PathBuf>,
}

impl ConfigHandle {
    /// Wrap an in-memory configuration (no backing file).
    pub fn new(config: ArchiveConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
            source: None,
        }
    }

    /// Load from a file and remember the path for [`reload`](Self::reload).
    pub fn from_file(path: &Path) -> Result<Self, TypeError> {
        let config = ArchiveConfig::load(path)?;
        Ok(Self {
            inner: Arc::new(RwLock::new(config)),
            source: Some(path.to_path_buf()),
        })
    }

    /// A copy of the current configuration.
    pub fn snapshot(&self) -> ArchiveConfig {
        match self.inner.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Re-read the backing file. Without a backing file this is a no-op.
    ///
    /// On a parse error the previous configuration stays in effect.
    pub fn reload(&self) -> Result<ArchiveConfig, TypeError> {
        let Some(path) = &self.source else {
            return Ok(self.snapshot());
        };
        let fresh = ArchiveConfig::load(path)?;
        let mut guard = match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = fresh.clone();
        Ok(fresh)
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }
}

impl Default for ConfigHandle {
    fn default() -> Self {
        Self::new(ArchiveConfig::default())
    }
}
