//! Session creation with a single fallback to the default model
//!
//! A session is bound to one model and one provider selection. It is owned by the
//! invocation that created it and dropped when that invocation ends.

use crate::catalog::{ModelCatalog, ModelDescriptor};
use crate::error::{BgRemovalError, Result};
use crate::providers::ProviderSelection;
use crate::state::ModelStateTracker;
use image::{RgbImage, RgbaImage};
use std::path::Path;
use std::sync::Arc;
use tracing::instrument;

/// A loaded, ready-to-run model bound to a provider selection
pub trait SegmentationSession: Send {
    /// Catalog name of the loaded model
    fn model_name(&self) -> &str;

    /// Segment a three-channel image
    ///
    /// Returns a four-channel image of the same dimensions whose alpha channel is
    /// the per-pixel foreground mask.
    ///
    /// # Errors
    /// - Inference failures in the underlying runtime
    /// - Output tensors with an unexpected shape
    fn segment(&mut self, image: &RgbImage) -> Result<RgbaImage>;
}

/// Constructs sessions from an artifact on disk
pub trait SessionBuilder: Send + Sync {
    /// Load `artifact` as a session for `descriptor`
    ///
    /// # Errors
    /// - The artifact cannot be read or is not a usable model (`ModelLoad`)
    fn build(
        &self,
        descriptor: &ModelDescriptor,
        artifact: &Path,
        providers: &ProviderSelection,
    ) -> Result<Box<dyn SegmentationSession>>;
}

impl<T: SessionBuilder + ?Sized> SessionBuilder for Box<T> {
    fn build(
        &self,
        descriptor: &ModelDescriptor,
        artifact: &Path,
        providers: &ProviderSelection,
    ) -> Result<Box<dyn SegmentationSession>> {
        (**self).build(descriptor, artifact, providers)
    }
}

/// Builds sessions, falling back once to the catalog's default model
pub struct SessionFactory {
    catalog: Arc<ModelCatalog>,
    tracker: ModelStateTracker,
    builder: Box<dyn SessionBuilder>,
}

impl SessionFactory {
    pub fn new(
        catalog: Arc<ModelCatalog>,
        tracker: ModelStateTracker,
        builder: impl SessionBuilder + 'static,
    ) -> Self {
        Self {
            catalog,
            tracker,
            builder: Box::new(builder),
        }
    }

    #[must_use]
    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    /// Create a session for `model_name`
    ///
    /// On failure the default model is tried exactly once with the same providers.
    ///
    /// # Errors
    /// - `FatalModelUnavailable` when both the requested and the default model fail
    #[instrument(skip(self), fields(providers = %providers))]
    pub fn create_session(
        &self,
        model_name: &str,
        providers: &ProviderSelection,
    ) -> Result<Box<dyn SegmentationSession>> {
        let requested_err = match self.try_build(model_name, providers) {
            Ok(session) => {
                tracing::info!("🧠 Loaded model '{model_name}' (providers: {providers})");
                return Ok(session);
            },
            Err(e) => e,
        };

        let fallback = self.catalog.default_model().name;
        tracing::warn!(
            "⚠️ Could not load model '{model_name}': {requested_err}. Falling back to default model '{fallback}'"
        );

        match self.try_build(fallback, providers) {
            Ok(session) => {
                tracing::info!("🧠 Loaded fallback model '{fallback}' (providers: {providers})");
                Ok(session)
            },
            Err(fallback_err) => {
                tracing::error!("❌ Default model '{fallback}' is unusable too: {fallback_err}");
                Err(BgRemovalError::FatalModelUnavailable {
                    requested: model_name.to_string(),
                    requested_reason: requested_err.to_string(),
                    fallback: fallback.to_string(),
                    fallback_reason: fallback_err.to_string(),
                })
            },
        }
    }

    fn try_build(
        &self,
        model_name: &str,
        providers: &ProviderSelection,
    ) -> Result<Box<dyn SegmentationSession>> {
        let descriptor = self
            .catalog
            .get(model_name)
            .ok_or_else(|| BgRemovalError::model_load(model_name, "not in the model catalog"))?;

        let artifact = self.tracker.artifact_path(descriptor).ok_or_else(|| {
            BgRemovalError::model_load(
                model_name,
                format!(
                    "no artifact named {}.{{onnx,pth}} in {}",
                    descriptor.file_stem,
                    self.tracker.models_dir().display()
                ),
            )
        })?;

        self.builder.build(descriptor, &artifact, providers)
    }
}
