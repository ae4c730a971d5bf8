//! Configuration for model management and background removal operations

use crate::error::{BgRemovalError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding the models directory
pub const MODELS_DIR_ENV: &str = "U2NET_HOME";

/// Directory name under the user's home used when nothing else is configured
pub const DEFAULT_MODELS_DIR_NAME: &str = ".u2net";

/// File name of the installed-model snapshot
pub const CACHE_FILE_NAME: &str = "models.txt";

/// Configuration for the model manager and the inference pipeline
///
/// Deserialization goes through [`ManagerConfigBuilder`], so a document that
/// omits `cache_file` gets the snapshot next to its own `models_dir`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ManagerConfigBuilder")]
pub struct ManagerConfig {
    /// Directory holding one artifact per installed model
    pub models_dir: PathBuf,

    /// Plain-text snapshot of installed model names (advisory)
    pub cache_file: PathBuf,

    /// Timeout for a single model download, in seconds
    pub download_timeout_secs: u64,

    /// Number of intra-op threads for inference (0 = runtime default)
    pub intra_threads: usize,

    /// Enable full graph optimisation when building sessions
    pub optimize_graph: bool,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        let models_dir = resolve_models_dir();
        let cache_file = default_cache_file(&models_dir);
        Self {
            models_dir,
            cache_file,
            download_timeout_secs: 600,
            intra_threads: 0,
            optimize_graph: true,
        }
    }
}

impl ManagerConfig {
    /// Create a new configuration builder
    ///
    /// # Examples
    /// ```rust
    /// use bgremove_manager::ManagerConfig;
    ///
    /// let config = ManagerConfig::builder()
    ///     .models_dir("/tmp/u2net")
    ///     .intra_threads(4)
    ///     .build()
    ///     .unwrap();
    /// assert!(config.cache_file.ends_with("models.txt"));
    /// ```
    #[must_use]
    pub fn builder() -> ManagerConfigBuilder {
        ManagerConfigBuilder::default()
    }

    /// Load a configuration from a JSON file
    ///
    /// Missing fields take their default values.
    ///
    /// # Errors
    /// - The file cannot be read
    /// - The file is not valid JSON for this structure
    /// - The loaded values fail validation
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        ManagerConfigBuilder::from_json_file(path)?.build()
    }

    /// Download timeout as a `Duration`
    #[must_use]
    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    /// Validate all configuration parameters
    ///
    /// # Errors
    /// - Empty models directory path
    /// - Empty cache file path, or a cache file placed inside the models directory
    /// - Zero download timeout
    pub fn validate(&self) -> Result<()> {
        if self.models_dir.as_os_str().is_empty() {
            return Err(BgRemovalError::invalid_config(
                "Models directory path must not be empty",
            ));
        }

        if self.cache_file.as_os_str().is_empty() {
            return Err(BgRemovalError::invalid_config(
                "Cache file path must not be empty",
            ));
        }

        // The snapshot sits beside the artifacts so a scan never sees it
        if self.cache_file.parent() == Some(self.models_dir.as_path()) {
            return Err(BgRemovalError::invalid_config(format!(
                "Cache file '{}' must not live inside the models directory",
                self.cache_file.display()
            )));
        }

        if self.download_timeout_secs == 0 {
            return Err(BgRemovalError::invalid_config(
                "Download timeout must be at least one second",
            ));
        }

        Ok(())
    }
}

/// Builder for `ManagerConfig`
///
/// Also the on-disk shape of a configuration file: every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ManagerConfigBuilder {
    models_dir: Option<PathBuf>,
    cache_file: Option<PathBuf>,
    download_timeout_secs: Option<u64>,
    intra_threads: Option<usize>,
    optimize_graph: Option<bool>,
}

impl ManagerConfigBuilder {
    /// Read the fields present in a JSON file without applying defaults yet
    ///
    /// Later setters override what the file says, and a `cache_file` the file
    /// leaves out is derived from the final models directory.
    ///
    /// # Errors
    /// - The file cannot be read
    /// - The file is not valid JSON for this structure
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| BgRemovalError::file_io_error("read config file", path, &e))?;
        serde_json::from_str(&content).map_err(|e| {
            BgRemovalError::invalid_config(format!(
                "Failed to parse config file '{}': {e}",
                path.display()
            ))
        })
    }

    /// Set the models directory (overrides `U2NET_HOME`)
    #[must_use]
    pub fn models_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.models_dir = Some(dir.into());
        self
    }

    /// Set the installed-model snapshot path
    #[must_use]
    pub fn cache_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.cache_file = Some(path.into());
        self
    }

    #[must_use]
    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.download_timeout_secs = Some(secs);
        self
    }

    #[must_use]
    pub fn intra_threads(mut self, threads: usize) -> Self {
        self.intra_threads = Some(threads);
        self
    }

    #[must_use]
    pub fn optimize_graph(mut self, enabled: bool) -> Self {
        self.optimize_graph = Some(enabled);
        self
    }

    /// Build and validate the configuration
    ///
    /// When only the models directory is given, the cache file follows it as
    /// `<parent>/models.txt`.
    ///
    /// # Errors
    /// - Any rule checked by [`ManagerConfig::validate`]
    pub fn build(self) -> Result<ManagerConfig> {
        let defaults = ManagerConfig::default();
        let models_dir = self.models_dir.unwrap_or(defaults.models_dir);
        let cache_file = self
            .cache_file
            .unwrap_or_else(|| default_cache_file(&models_dir));

        let config = ManagerConfig {
            models_dir,
            cache_file,
            download_timeout_secs: self
                .download_timeout_secs
                .unwrap_or(defaults.download_timeout_secs),
            intra_threads: self.intra_threads.unwrap_or(defaults.intra_threads),
            optimize_graph: self.optimize_graph.unwrap_or(defaults.optimize_graph),
        };
        config.validate()?;
        Ok(config)
    }
}

impl TryFrom<ManagerConfigBuilder> for ManagerConfig {
    type Error = BgRemovalError;

    fn try_from(builder: ManagerConfigBuilder) -> Result<Self> {
        builder.build()
    }
}

/// Resolve the per-user models directory
///
/// `U2NET_HOME` wins when set and non-empty, then `~/.u2net`. Without a home
/// directory the relative `.u2net` is used.
#[must_use]
pub fn resolve_models_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(MODELS_DIR_ENV).filter(|v| !v.is_empty()) {
        return PathBuf::from(dir);
    }
    dirs::home_dir().map_or_else(
        || PathBuf::from(DEFAULT_MODELS_DIR_NAME),
        |home| home.join(DEFAULT_MODELS_DIR_NAME),
    )
}

/// Cache file location for a models directory: `<parent>/models.txt`
#[must_use]
pub fn default_cache_file(models_dir: &Path) -> PathBuf {
    match models_dir.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.join(CACHE_FILE_NAME),
        _ => PathBuf::from(CACHE_FILE_NAME),
    }
}
