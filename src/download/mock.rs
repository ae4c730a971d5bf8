//! Scriptable acquirer for tests and offline runs
//!
//! Latency, failure and panics are configured per model. When given a models
//! directory the mock writes a placeholder artifact on success so a follow-up scan
//! sees the model as installed.

use super::ModelAcquirer;
use crate::catalog::ModelDescriptor;
use crate::error::{BgRemovalError, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct MockAcquirer {
    models_dir: Option<PathBuf>,
    delays: HashMap<String, Duration>,
    failing: HashSet<String>,
    panicking: HashSet<String>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockAcquirer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Write `<stem>.onnx` into `dir` for every successful acquisition
    #[must_use]
    pub fn writing_to<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.models_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn with_delay(mut self, model: &str, delay: Duration) -> Self {
        self.delays.insert(model.to_string(), delay);
        self
    }

    #[must_use]
    pub fn failing_on(mut self, model: &str) -> Self {
        self.failing.insert(model.to_string());
        self
    }

    #[must_use]
    pub fn panicking_on(mut self, model: &str) -> Self {
        self.panicking.insert(model.to_string());
        self
    }

    /// Shared log of acquired model names, in call order
    #[must_use]
    pub fn calls(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl ModelAcquirer for MockAcquirer {
    async fn acquire(&self, descriptor: &ModelDescriptor) -> Result<PathBuf> {
        let name = descriptor.name;
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(name.to_string());
        }

        if let Some(delay) = self.delays.get(name) {
            tokio::time::sleep(*delay).await;
        }

        if self.panicking.contains(name) {
            panic!("simulated crash while acquiring '{name}'");
        }

        if self.failing.contains(name) {
            return Err(BgRemovalError::acquisition(name, "simulated failure"));
        }

        match &self.models_dir {
            Some(dir) => {
                let path = dir.join(descriptor.artifact_file_name());
                tokio::fs::create_dir_all(dir)
                    .await
                    .map_err(|e| BgRemovalError::file_io_error("create models directory", dir, &e))?;
                tokio::fs::write(&path, b"mock model")
                    .await
                    .map_err(|e| BgRemovalError::file_io_error("write artifact", &path, &e))?;
                Ok(path)
            },
            None => Ok(PathBuf::from(descriptor.artifact_file_name())),
        }
    }
}
