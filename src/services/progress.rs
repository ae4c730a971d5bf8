//! Progress reporting service
//!
//! Separates stage-transition reporting from the pipeline so frontends can
//! print, collect or ignore progress as they see fit.

use crate::types::{PipelineStage, ProcessingTimings};
use instant::Instant;

/// Progress stages during background removal processing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStage {
    /// Detecting providers and loading the model
    Initialization,
    /// Loading and decoding input image
    ImageLoading,
    /// Converting to three channels
    Normalization,
    /// Running model inference
    Inference,
    /// Applying the transparency policy
    Compositing,
    /// Saving and verifying the result
    FileSaving,
    /// Processing completed
    Completed,
}

impl ProcessingStage {
    /// Get a human-readable description of the processing stage
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            ProcessingStage::Initialization => "Initializing model and providers",
            ProcessingStage::ImageLoading => "Loading input image",
            ProcessingStage::Normalization => "Normalizing to RGB",
            ProcessingStage::Inference => "Running segmentation",
            ProcessingStage::Compositing => "Applying transparency policy",
            ProcessingStage::FileSaving => "Saving result",
            ProcessingStage::Completed => "Processing completed",
        }
    }

    /// Get the typical progress percentage for this stage
    #[must_use]
    pub fn progress_percentage(&self) -> u8 {
        match self {
            ProcessingStage::Initialization => 5,
            ProcessingStage::ImageLoading => 10,
            ProcessingStage::Normalization => 20,
            ProcessingStage::Inference => 70,
            ProcessingStage::Compositing => 90,
            ProcessingStage::FileSaving => 98,
            ProcessingStage::Completed => 100,
        }
    }
}

impl From<PipelineStage> for ProcessingStage {
    fn from(stage: PipelineStage) -> Self {
        match stage {
            PipelineStage::Load => Self::ImageLoading,
            PipelineStage::Normalize => Self::Normalization,
            PipelineStage::Infer => Self::Inference,
            PipelineStage::ApplyPolicy => Self::Compositing,
            PipelineStage::Persist => Self::FileSaving,
        }
    }
}

/// Progress update containing stage and timing information
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    /// Current processing stage
    pub stage: ProcessingStage,
    /// Progress percentage (0-100)
    pub progress: u8,
    /// Human-readable stage description
    pub description: String,
    /// Elapsed time since processing started (milliseconds)
    pub elapsed_ms: u64,
}

impl ProgressUpdate {
    #[must_use]
    pub fn new(stage: ProcessingStage, start_time: Instant) -> Self {
        Self {
            progress: stage.progress_percentage(),
            description: stage.description().to_string(),
            elapsed_ms: start_time.elapsed().as_millis() as u64,
            stage,
        }
    }
}

/// Trait for reporting progress during background removal operations
pub trait ProgressReporter: Send + Sync {
    /// Report a stage transition
    fn report_progress(&self, update: ProgressUpdate);

    /// Report processing completion with final timings
    fn report_completion(&self, timings: &ProcessingTimings);

    /// Report the stage an invocation failed in
    fn report_error(&self, stage: ProcessingStage, error: &str);
}

/// No-op progress reporter that discards all progress updates
pub struct NoOpProgressReporter;

impl ProgressReporter for NoOpProgressReporter {
    fn report_progress(&self, _update: ProgressUpdate) {}

    fn report_completion(&self, _timings: &ProcessingTimings) {}

    fn report_error(&self, _stage: ProcessingStage, _error: &str) {}
}

/// Console progress reporter emitting one log line per stage transition
pub struct ConsoleProgressReporter {
    verbose: bool,
}

impl ConsoleProgressReporter {
    /// # Arguments
    /// * `verbose` - Whether to include elapsed time and a timing breakdown
    #[must_use]
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl ProgressReporter for ConsoleProgressReporter {
    fn report_progress(&self, update: ProgressUpdate) {
        if self.verbose {
            log::info!(
                "[{}%] {} ({}ms elapsed)",
                update.progress,
                update.description,
                update.elapsed_ms
            );
        } else {
            log::info!("[{}%] {}", update.progress, update.description);
        }
    }

    fn report_completion(&self, timings: &ProcessingTimings) {
        log::info!("✅ Background removal completed in {}ms", timings.total_ms);

        if self.verbose {
            log::info!("  📊 {}", timings.summary());
        }
    }

    fn report_error(&self, stage: ProcessingStage, error: &str) {
        log::error!("❌ Error during {}: {}", stage.description(), error);
    }
}
