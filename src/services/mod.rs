//! Frontend-independent services used by the pipeline
//!
//! - [`ImageIOService`]: decoding, lossless persistence and write verification
//! - [`ProgressReporter`]: stage transition reporting

pub mod io;
pub mod progress;

pub use io::ImageIOService;
pub use progress::{
    ConsoleProgressReporter, NoOpProgressReporter, ProcessingStage, ProgressReporter,
    ProgressUpdate,
};
