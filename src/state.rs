//! Installed-model detection and the advisory snapshot file
//!
//! The filesystem is the only source of truth. [`ModelStateTracker::scan`] derives
//! the installed set from artifact existence; the snapshot written by
//! [`ModelStateTracker::persist`] may be stale and is never consulted for decisions.

use crate::catalog::{ModelCatalog, ModelDescriptor};
use crate::config::ManagerConfig;
use crate::error::{BgRemovalError, Result};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Names of catalog models whose artifact exists on disk
///
/// Ordered so the snapshot file is always sorted and free of duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstalledModelSet {
    names: BTreeSet<String>,
}

impl InstalledModelSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep only names the catalog knows
    pub fn from_names<I, S>(names: I, catalog: &ModelCatalog) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names = names
            .into_iter()
            .filter(|name| catalog.contains(name.as_ref()))
            .map(|name| name.as_ref().to_string())
            .collect();
        Self { names }
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    fn insert(&mut self, name: &str) {
        self.names.insert(name.to_string());
    }

    /// Snapshot file contents: one name per line, sorted
    fn to_snapshot(&self) -> String {
        let mut content = String::new();
        for name in &self.names {
            content.push_str(name);
            content.push('\n');
        }
        content
    }
}

/// Derives the installed-model set from the models directory
#[derive(Debug, Clone)]
pub struct ModelStateTracker {
    models_dir: PathBuf,
    cache_file: PathBuf,
}

impl ModelStateTracker {
    pub fn new<P: Into<PathBuf>, C: Into<PathBuf>>(models_dir: P, cache_file: C) -> Self {
        Self {
            models_dir: models_dir.into(),
            cache_file: cache_file.into(),
        }
    }

    #[must_use]
    pub fn from_config(config: &ManagerConfig) -> Self {
        Self::new(&config.models_dir, &config.cache_file)
    }

    #[must_use]
    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    #[must_use]
    pub fn cache_file(&self) -> &Path {
        &self.cache_file
    }

    /// Create the models directory if it does not exist yet
    ///
    /// # Errors
    /// - The directory cannot be created
    pub fn ensure_models_dir(&self) -> Result<()> {
        if !self.models_dir.exists() {
            fs::create_dir_all(&self.models_dir).map_err(|e| {
                BgRemovalError::file_io_error("create models directory", &self.models_dir, &e)
            })?;
            log::info!("📁 Created models directory {}", self.models_dir.display());
        }
        Ok(())
    }

    /// First existing artifact for `descriptor`, in extension preference order
    #[must_use]
    pub fn artifact_path(&self, descriptor: &ModelDescriptor) -> Option<PathBuf> {
        descriptor
            .artifact_candidates(&self.models_dir)
            .into_iter()
            .find(|path| path.is_file())
    }

    /// Derive the installed set from artifact existence
    ///
    /// A missing models directory means nothing is installed.
    ///
    /// # Errors
    /// - The models directory exists but cannot be read
    pub fn scan(&self, catalog: &ModelCatalog) -> Result<InstalledModelSet> {
        let mut installed = InstalledModelSet::new();
        if !self.models_dir.exists() {
            log::debug!(
                "Models directory {} does not exist, no models installed",
                self.models_dir.display()
            );
            return Ok(installed);
        }

        let entries = fs::read_dir(&self.models_dir).map_err(|e| {
            BgRemovalError::file_io_error("read models directory", &self.models_dir, &e)
        })?;

        for entry in entries {
            let entry = entry.map_err(|e| {
                BgRemovalError::file_io_error("read models directory", &self.models_dir, &e)
            })?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            if let Some(descriptor) = catalog.iter().find(|d| d.matches_artifact(&path)) {
                installed.insert(descriptor.name);
            }
        }

        log::debug!(
            "Scanned {}: {} of {} models installed",
            self.models_dir.display(),
            installed.len(),
            catalog.len()
        );
        Ok(installed)
    }

    /// Overwrite the snapshot file with the installed set
    ///
    /// # Errors
    /// - The parent directory cannot be created
    /// - The file cannot be written
    pub fn persist(&self, installed: &InstalledModelSet) -> Result<()> {
        if let Some(parent) = self.cache_file.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| {
                    BgRemovalError::file_io_error("create cache directory", parent, &e)
                })?;
            }
        }

        fs::write(&self.cache_file, installed.to_snapshot())
            .map_err(|e| BgRemovalError::file_io_error("write cache file", &self.cache_file, &e))?;
        log::debug!(
            "Wrote {} installed model names to {}",
            installed.len(),
            self.cache_file.display()
        );
        Ok(())
    }

    /// Read the snapshot file
    ///
    /// Advisory only. A missing file yields an empty set and names the catalog
    /// does not know are dropped.
    ///
    /// # Errors
    /// - The file exists but cannot be read
    pub fn load_cached(&self, catalog: &ModelCatalog) -> Result<InstalledModelSet> {
        if !self.cache_file.exists() {
            return Ok(InstalledModelSet::new());
        }
        let content = fs::read_to_string(&self.cache_file)
            .map_err(|e| BgRemovalError::file_io_error("read cache file", &self.cache_file, &e))?;
        let names = content.lines().map(str::trim).filter(|l| !l.is_empty());
        Ok(InstalledModelSet::from_names(names, catalog))
    }
}
