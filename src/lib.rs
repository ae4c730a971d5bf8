#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]

//! # bgremove-manager
//!
//! Model acquisition, execution provider selection and single-image background
//! removal on top of ONNX Runtime.
//!
//! ## Features
//!
//! - **Model Catalog**: twelve segmentation models (`u2net` family, `isnet`, `silueta`,
//!   `birefnet`, `ben2`, `sam`) with sizes, file stems and download sources
//! - **Installed-Model Detection**: the models directory is the source of truth,
//!   with an advisory `models.txt` snapshot next to it
//! - **Concurrent Downloads**: one task per model, exactly one completion event per batch
//! - **Provider Selection**: CUDA > ROCm > `CoreML` > CPU, CPU always last
//! - **Session Fallback**: an unusable model falls back once to the smallest one (`u2netp`)
//! - **Inference Pipeline**: decode → normalize → infer → composite → persist
//! - **CLI Integration**: optional command-line interface (enable with `cli` feature)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bgremove_manager::{ManagerConfig, ModelManager, TransparencyPolicy};
//! use std::path::Path;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let mut manager = ModelManager::new(ManagerConfig::default())?;
//!
//! // Fetch whatever is not installed yet
//! manager
//!     .download_missing(|name, ok| println!("{name}: {}", if ok { "ok" } else { "failed" }))
//!     .await?;
//!
//! // Remove the background, keeping the alpha channel
//! let result = manager
//!     .process(
//!         Path::new("photo.png"),
//!         Path::new("photo_out.png"),
//!         "u2net",
//!         TransparencyPolicy::Keep,
//!     )
//!     .await?;
//! assert_eq!(result.channels, 4);
//! # Ok(())
//! # }
//! ```
//!
//! ### Feature Flags
//!
//! - `onnx` (default): ONNX Runtime sessions and provider detection
//! - `cli` (default): command-line interface, spinners and the log subscriber

pub mod backends;
pub mod catalog;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod download;
pub mod error;
pub mod manager;
pub mod pipeline;
pub mod providers;
pub mod services;
pub mod session;
pub mod state;
pub mod tracing_config;
pub mod types;

pub use backends::{MockMask, MockSession, MockSessionBuilder};
#[cfg(feature = "onnx")]
pub use backends::{OnnxSession, OnnxSessionBuilder};
pub use catalog::{format_size, ModelCatalog, ModelDescriptor, ModelFormat};
pub use config::{ManagerConfig, ManagerConfigBuilder};
pub use download::{
    BatchReport, DownloadBatch, DownloadEvent, DownloadOrchestrator, DownloadStatus,
    HttpModelDownloader, MockAcquirer, ModelAcquirer,
};
pub use error::{BgRemovalError, Result};
pub use manager::{
    ModelManager, ModelManagerBuilder, OperationState, ShutdownDecision, ShutdownGate,
    ShutdownHandle,
};
pub use pipeline::InferencePipeline;
pub use providers::{Provider, ProviderList, ProviderSelection, ProviderSelector};
pub use services::{
    ConsoleProgressReporter, ImageIOService, NoOpProgressReporter, ProcessingStage,
    ProgressReporter, ProgressUpdate,
};
pub use session::{SegmentationSession, SessionBuilder, SessionFactory};
pub use state::{InstalledModelSet, ModelStateTracker};
pub use types::{
    BackgroundColor, PipelineStage, PipelineState, ProcessedImage, ProcessingTimings,
    TransparencyPolicy,
};

#[cfg(feature = "cli")]
pub use tracing_config::init_cli_tracing;
pub use tracing_config::{TracingConfig, TracingFormat, TracingOutput};
