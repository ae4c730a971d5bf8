//! ONNX Runtime session backend
//!
//! Maps a [`ProviderSelection`] onto `ort` execution providers, loads the model
//! artifact from disk and runs plain salient-object segmentation on it.

use crate::backends::tensor;
use crate::catalog::{ModelDescriptor, ModelFormat, PreprocessingConfig};
use crate::error::{BgRemovalError, Result};
use crate::providers::{Provider, ProviderSelection};
use crate::session::{SegmentationSession, SessionBuilder};
use image::{RgbImage, RgbaImage};
use ort::execution_providers::{
    CPUExecutionProvider, CUDAExecutionProvider, CoreMLExecutionProvider,
    ExecutionProviderDispatch, ROCmExecutionProvider,
};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;
use std::path::Path;

/// Builds ONNX Runtime sessions
#[derive(Debug, Clone)]
pub struct OnnxSessionBuilder {
    intra_threads: usize,
    optimize_graph: bool,
}

impl OnnxSessionBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            intra_threads: 0,
            optimize_graph: true,
        }
    }

    /// Set intra-op threads (0 = all available cores)
    #[must_use]
    pub fn with_intra_threads(mut self, threads: usize) -> Self {
        self.intra_threads = threads;
        self
    }

    #[must_use]
    pub fn with_graph_optimization(mut self, enabled: bool) -> Self {
        self.optimize_graph = enabled;
        self
    }

    fn execution_providers(providers: &ProviderSelection) -> Vec<ExecutionProviderDispatch> {
        let ProviderSelection::Detected(list) = providers else {
            log::debug!("No explicit providers, ONNX Runtime picks its defaults");
            return Vec::new();
        };

        list.iter()
            .map(|provider| match provider {
                Provider::Cuda => CUDAExecutionProvider::default().build(),
                Provider::Rocm => ROCmExecutionProvider::default().build(),
                Provider::CoreMl => CoreMLExecutionProvider::default().with_subgraphs(true).build(),
                Provider::Cpu => CPUExecutionProvider::default().build(),
            })
            .collect()
    }

    fn intra_threads(&self) -> usize {
        if self.intra_threads > 0 {
            self.intra_threads
        } else {
            std::thread::available_parallelism()
                .map(std::num::NonZeroUsize::get)
                .unwrap_or(4)
        }
    }
}

impl Default for OnnxSessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionBuilder for OnnxSessionBuilder {
    fn build(
        &self,
        descriptor: &ModelDescriptor,
        artifact: &Path,
        providers: &ProviderSelection,
    ) -> Result<Box<dyn SegmentationSession>> {
        let load_err = |reason: String| BgRemovalError::model_load(descriptor.name, reason);

        if descriptor.requires_prompt {
            return Err(load_err(
                "model needs point or box prompts and cannot run plain segmentation".to_string(),
            ));
        }

        let format = artifact
            .extension()
            .and_then(|e| e.to_str())
            .and_then(ModelFormat::from_extension);
        if format != Some(ModelFormat::Onnx) {
            return Err(load_err(format!(
                "{} is not an ONNX graph (legacy artifacts are not loadable)",
                artifact.display()
            )));
        }

        let optimization = if self.optimize_graph {
            GraphOptimizationLevel::Level3
        } else {
            GraphOptimizationLevel::Disable
        };

        let mut builder = Session::builder()
            .map_err(|e| load_err(format!("Failed to create session builder: {e}")))?
            .with_optimization_level(optimization)
            .map_err(|e| load_err(format!("Failed to set optimization level: {e}")))?
            .with_intra_threads(self.intra_threads())
            .map_err(|e| load_err(format!("Failed to set intra threads: {e}")))?;

        let execution_providers = Self::execution_providers(providers);
        if !execution_providers.is_empty() {
            builder = builder
                .with_execution_providers(execution_providers)
                .map_err(|e| load_err(format!("Failed to set execution providers: {e}")))?;
        }

        let session = builder
            .commit_from_file(artifact)
            .map_err(|e| load_err(format!("Failed to load {}: {e}", artifact.display())))?;

        log::debug!(
            "✅ ONNX Runtime session for '{}' created from {}",
            descriptor.name,
            artifact.display()
        );

        Ok(Box::new(OnnxSession {
            model_name: descriptor.name.to_string(),
            preprocessing: descriptor.preprocessing,
            session,
        }))
    }
}

/// Loaded ONNX Runtime session for one model
#[derive(Debug)]
pub struct OnnxSession {
    model_name: String,
    preprocessing: PreprocessingConfig,
    session: Session,
}

impl SegmentationSession for OnnxSession {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn segment(&mut self, image: &RgbImage) -> Result<RgbaImage> {
        let input = tensor::to_input_tensor(image, &self.preprocessing);
        log::debug!("🚀 Running '{}' on input {:?}", self.model_name, input.dim());

        let input_value = Value::from_array(input).map_err(|e| {
            BgRemovalError::inference(format!("Failed to convert input tensor: {e}"))
        })?;

        let outputs = self
            .session
            .run(ort::inputs![input_value])
            .map_err(|e| BgRemovalError::inference(format!("ONNX inference failed: {e}")))?;

        // Positional access: the first output is the mask for every supported model
        let first_key = outputs
            .keys()
            .next()
            .ok_or_else(|| BgRemovalError::inference("No output tensors found"))?;
        let prediction = outputs
            .get(first_key)
            .ok_or_else(|| BgRemovalError::inference("First output tensor not found"))?
            .try_extract_array::<f32>()
            .map_err(|e| BgRemovalError::inference(format!("Failed to extract output tensor: {e}")))?;

        let mask = tensor::mask_from_output(&prediction, self.preprocessing.activation)?;
        Ok(tensor::attach_mask(image, &mask))
    }
}
