//! Session backends for segmentation models
//!
//! - ONNX Runtime backend (GPU acceleration through CUDA, ROCm or `CoreML`)
//! - Mock backend (synthetic masks, no model files)

pub mod mock;
pub mod tensor;

#[cfg(feature = "onnx")]
pub mod onnx;

pub use self::mock::{MockMask, MockSession, MockSessionBuilder};

#[cfg(feature = "onnx")]
pub use self::onnx::{OnnxSession, OnnxSessionBuilder};
