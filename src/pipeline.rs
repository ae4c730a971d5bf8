//! End-to-end single-image background removal
//!
//! One invocation walks `Init → Loaded → Normalized → Inferred → Composited →
//! Persisted → Done`. Any stage may fail, which ends the invocation in
//! `Failed(stage)`; nothing is retried here.

use crate::error::{BgRemovalError, Result};
use crate::services::{
    ImageIOService, NoOpProgressReporter, ProcessingStage, ProgressReporter, ProgressUpdate,
};
use crate::session::SegmentationSession;
use crate::types::{
    BackgroundColor, PipelineState, ProcessedImage, ProcessingTimings, TransparencyPolicy,
};
use image::{DynamicImage, Rgb, RgbImage, RgbaImage};
use instant::Instant;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info as trace_info, instrument};

/// Runs decode, normalize, infer, composite and persist for one image
#[derive(Clone)]
pub struct InferencePipeline {
    reporter: Arc<dyn ProgressReporter>,
}

impl Default for InferencePipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl InferencePipeline {
    /// Pipeline without progress output
    #[must_use]
    pub fn new() -> Self {
        Self {
            reporter: Arc::new(NoOpProgressReporter),
        }
    }

    #[must_use]
    pub fn with_reporter(reporter: Arc<dyn ProgressReporter>) -> Self {
        Self { reporter }
    }

    /// Remove the background of `input` and write the result to `output` as PNG
    ///
    /// The output has four channels under [`TransparencyPolicy::Keep`] and three
    /// under [`TransparencyPolicy::Composite`].
    ///
    /// # Errors
    /// - `InputNotFound` if `input` does not exist (nothing is written)
    /// - `Decode` if `input` is not a readable image
    /// - `Inference` if the session fails or returns the wrong dimensions
    /// - `Io`/`Processing` if encoding or writing fails
    /// - `WriteVerification` if `output` is missing after the write
    #[instrument(
        skip(self, session),
        fields(
            input = %input.display(),
            output = %output.display(),
            model = %session.model_name(),
            policy = %policy
        )
    )]
    pub fn process(
        &self,
        input: &Path,
        output: &Path,
        session: &mut dyn SegmentationSession,
        policy: TransparencyPolicy,
    ) -> Result<ProcessedImage> {
        let mut run = Invocation::new(self.reporter.as_ref());
        let mut timings = ProcessingTimings::default();

        let decoded = run.stage(|| {
            let start = Instant::now();
            let image = ImageIOService::load_image(input)?;
            timings.decode_ms = elapsed_ms(start);
            Ok(image)
        })?;

        let rgb = run.stage(|| Ok(normalize(decoded)))?;

        let segmented = run.stage(|| {
            let start = Instant::now();
            let result = session.segment(&rgb)?;
            timings.inference_ms = elapsed_ms(start);
            if result.dimensions() != rgb.dimensions() {
                return Err(BgRemovalError::inference(format!(
                    "Session returned {:?} for a {:?} input",
                    result.dimensions(),
                    rgb.dimensions()
                )));
            }
            Ok(result)
        })?;
        trace_info!(inference_ms = timings.inference_ms, "🧠 Segmentation finished");

        let composed = run.stage(|| {
            let start = Instant::now();
            let image = apply_policy(segmented, policy);
            timings.composite_ms = elapsed_ms(start);
            let channels = image.color().channel_count();
            if channels != policy.output_channels() {
                return Err(BgRemovalError::processing(format!(
                    "'{policy}' produced {channels} channels, expected {}",
                    policy.output_channels()
                )));
            }
            Ok(image)
        })?;

        run.stage(|| {
            let start = Instant::now();
            ImageIOService::save_png(&composed, output)?;
            ImageIOService::verify_written(output)?;
            timings.encode_ms = elapsed_ms(start);
            Ok(())
        })?;

        run.finish()?;
        timings.total_ms = elapsed_ms(run.start);
        self.reporter.report_completion(&timings);

        let mut processed = ProcessedImage::new(composed);
        processed.timings = timings;
        processed.output_path = Some(output.to_path_buf());
        Ok(processed)
    }

    /// Run one invocation on a blocking worker thread
    ///
    /// The session moves into the task and is dropped when the invocation ends.
    /// Must be called from within a Tokio runtime.
    pub fn spawn(
        &self,
        input: PathBuf,
        output: PathBuf,
        mut session: Box<dyn SegmentationSession>,
        policy: TransparencyPolicy,
    ) -> JoinHandle<Result<ProcessedImage>> {
        let pipeline = self.clone();
        tokio::task::spawn_blocking(move || {
            pipeline.process(&input, &output, session.as_mut(), policy)
        })
    }
}

/// Tracks the state machine and reports transitions
struct Invocation<'a> {
    state: PipelineState,
    reporter: &'a dyn ProgressReporter,
    start: Instant,
}

impl<'a> Invocation<'a> {
    fn new(reporter: &'a dyn ProgressReporter) -> Self {
        Self {
            state: PipelineState::Init,
            reporter,
            start: Instant::now(),
        }
    }

    /// Run the pending stage and move to the next state
    fn stage<T>(&mut self, work: impl FnOnce() -> Result<T>) -> Result<T> {
        let stage = self.state.pending_stage().ok_or_else(|| {
            BgRemovalError::internal(format!("No stage pending in state {:?}", self.state))
        })?;
        let reported = ProcessingStage::from(stage);
        self.reporter
            .report_progress(ProgressUpdate::new(reported, self.start));

        match work() {
            Ok(value) => {
                self.state = self.state.advance()?;
                tracing::debug!(state = ?self.state, "Stage {stage} done");
                Ok(value)
            },
            Err(e) => {
                self.state = self.state.fail();
                tracing::warn!(state = ?self.state, error = %e, "Stage {stage} failed");
                self.reporter.report_error(reported, &e.to_string());
                Err(e)
            },
        }
    }

    fn finish(&mut self) -> Result<()> {
        self.state = self.state.advance()?;
        self.reporter
            .report_progress(ProgressUpdate::new(ProcessingStage::Completed, self.start));
        Ok(())
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

/// Convert any decoded image to three channels
///
/// Greyscale, palette-expanded, 16-bit and alpha inputs are converted, never rejected.
#[must_use]
pub fn normalize(image: DynamicImage) -> RgbImage {
    match image {
        DynamicImage::ImageRgb8(rgb) => rgb,
        other => other.to_rgb8(),
    }
}

/// Apply the transparency policy to a segmented image
#[must_use]
pub fn apply_policy(segmented: RgbaImage, policy: TransparencyPolicy) -> DynamicImage {
    match policy {
        TransparencyPolicy::Keep => DynamicImage::ImageRgba8(segmented),
        TransparencyPolicy::Composite(background) => {
            DynamicImage::ImageRgb8(composite(&segmented, background))
        },
    }
}

/// Flatten an RGBA image over a solid colour
#[must_use]
pub fn composite(image: &RgbaImage, background: BackgroundColor) -> RgbImage {
    let Rgb([br, bg_g, bb]) = background.to_rgb();
    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b, a] = image.get_pixel(x, y).0;
        let alpha = u32::from(a);
        let blend = |fg: u8, bg: u8| {
            ((u32::from(fg) * alpha + u32::from(bg) * (255 - alpha) + 127) / 255) as u8
        };
        Rgb([blend(r, br), blend(g, bg_g), blend(b, bb)])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::mock::{MockMask, MockSession};
    use image::{GrayImage, Luma, Rgba};
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingReporter {
        stages: Mutex<Vec<ProcessingStage>>,
        errors: Mutex<Vec<ProcessingStage>>,
    }

    impl ProgressReporter for RecordingReporter {
        fn report_progress(&self, update: ProgressUpdate) {
            self.stages.lock().unwrap().push(update.stage);
        }

        fn report_completion(&self, _timings: &ProcessingTimings) {}

        fn report_error(&self, stage: ProcessingStage, _error: &str) {
            self.errors.lock().unwrap().push(stage);
        }
    }

    struct WrongSizeSession;

    impl SegmentationSession for WrongSizeSession {
        fn model_name(&self) -> &str {
            "wrong-size"
        }

        fn segment(&mut self, _image: &RgbImage) -> Result<RgbaImage> {
            Ok(RgbaImage::new(1, 1))
        }
    }

    fn write_input(dir: &Path, name: &str, image: &DynamicImage) -> PathBuf {
        let path = dir.join(name);
        image.save(&path).unwrap();
        path
    }

    #[test]
    fn test_keep_policy_returns_four_channels() {
        let temp = TempDir::new().unwrap();
        let input = write_input(
            temp.path(),
            "solid.png",
            &DynamicImage::ImageRgb8(RgbImage::from_pixel(10, 10, Rgb([200, 30, 30]))),
        );
        let output = temp.path().join("solid_out.png");
        let mut session = MockSession::new("u2netp", MockMask::Constant(255));

        let result = InferencePipeline::new()
            .process(&input, &output, &mut session, TransparencyPolicy::Keep)
            .unwrap();

        assert_eq!(result.dimensions(), (10, 10));
        assert_eq!(result.channels, 4);
        assert_eq!(result.output_path.as_deref(), Some(output.as_path()));
        let written = image::open(&output).unwrap();
        assert_eq!(written.color(), image::ColorType::Rgba8);
    }

    #[test]
    fn test_composite_policy_has_no_alpha() {
        let temp = TempDir::new().unwrap();
        let input = write_input(
            temp.path(),
            "grey.png",
            &DynamicImage::ImageLuma8(GrayImage::from_pixel(6, 4, Luma([0]))),
        );
        let output = temp.path().join("grey_out.png");
        let mut session = MockSession::new("u2netp", MockMask::Constant(0));

        let result = InferencePipeline::new()
            .process(
                &input,
                &output,
                &mut session,
                TransparencyPolicy::Composite(BackgroundColor::WHITE),
            )
            .unwrap();

        assert_eq!(result.channels, 3);
        assert!(!result.has_alpha());
        let written = image::open(&output).unwrap();
        assert_eq!(written.color(), image::ColorType::Rgb8);
        // Fully transparent pixels become the background colour
        assert!(written.to_rgb8().pixels().all(|p| p.0 == [255, 255, 255]));
    }

    #[test]
    fn test_missing_input_writes_nothing() {
        let temp = TempDir::new().unwrap();
        let input = temp.path().join("missing.png");
        let output = temp.path().join("out").join("missing_out.png");
        let reporter = Arc::new(RecordingReporter::default());
        let mut session = MockSession::new("u2netp", MockMask::Constant(255));

        let err = InferencePipeline::with_reporter(reporter.clone())
            .process(&input, &output, &mut session, TransparencyPolicy::Keep)
            .unwrap_err();

        assert!(matches!(err, BgRemovalError::InputNotFound(_)));
        assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
        assert_eq!(
            *reporter.errors.lock().unwrap(),
            vec![ProcessingStage::ImageLoading]
        );
    }

    #[test]
    fn test_reports_every_stage_in_order() {
        let temp = TempDir::new().unwrap();
        let input = write_input(
            temp.path(),
            "in.png",
            &DynamicImage::ImageRgba8(RgbaImage::from_pixel(3, 3, Rgba([1, 2, 3, 4]))),
        );
        let reporter = Arc::new(RecordingReporter::default());
        let mut session = MockSession::new("u2netp", MockMask::Luminance);

        InferencePipeline::with_reporter(reporter.clone())
            .process(
                &input,
                &temp.path().join("out.png"),
                &mut session,
                TransparencyPolicy::Keep,
            )
            .unwrap();

        assert_eq!(
            *reporter.stages.lock().unwrap(),
            vec![
                ProcessingStage::ImageLoading,
                ProcessingStage::Normalization,
                ProcessingStage::Inference,
                ProcessingStage::Compositing,
                ProcessingStage::FileSaving,
                ProcessingStage::Completed,
            ]
        );
        assert!(reporter.errors.lock().unwrap().is_empty());
    }

    #[test]
    fn test_session_dimension_mismatch_fails_inference() {
        let temp = TempDir::new().unwrap();
        let input = write_input(
            temp.path(),
            "in.png",
            &DynamicImage::ImageRgb8(RgbImage::new(5, 5)),
        );
        let output = temp.path().join("out.png");

        let err = InferencePipeline::new()
            .process(&input, &output, &mut WrongSizeSession, TransparencyPolicy::Keep)
            .unwrap_err();
        assert!(matches!(err, BgRemovalError::Inference(_)));
        assert!(!output.exists());
    }

    #[test]
    fn test_composite_blending() {
        let image = RgbaImage::from_fn(3, 1, |x, _| match x {
            0 => Rgba([100, 100, 100, 255]),
            1 => Rgba([100, 100, 100, 0]),
            _ => Rgba([200, 0, 0, 128]),
        });
        let flat = composite(&image, BackgroundColor::new(0, 0, 255));
        assert_eq!(flat.get_pixel(0, 0).0, [100, 100, 100]);
        assert_eq!(flat.get_pixel(1, 0).0, [0, 0, 255]);
        assert_eq!(flat.get_pixel(2, 0).0, [100, 0, 127]);
    }

    #[test]
    fn test_normalize_converts_channels() {
        let grey = DynamicImage::ImageLuma8(GrayImage::from_pixel(2, 2, Luma([77])));
        assert_eq!(normalize(grey).get_pixel(1, 1).0, [77, 77, 77]);

        let rgba = DynamicImage::ImageRgba8(RgbaImage::from_pixel(2, 2, Rgba([1, 2, 3, 0])));
        assert_eq!(normalize(rgba).get_pixel(0, 0).0, [1, 2, 3]);
    }

    #[tokio::test]
    async fn test_spawn_runs_off_the_caller() {
        let temp = TempDir::new().unwrap();
        let input = write_input(
            temp.path(),
            "in.png",
            &DynamicImage::ImageRgb8(RgbImage::new(8, 8)),
        );
        let output = temp.path().join("out.png");
        let session = Box::new(MockSession::new("u2netp", MockMask::Constant(255)));

        let result = InferencePipeline::new()
            .spawn(input, output.clone(), session, TransparencyPolicy::Keep)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result.channels, 4);
        assert!(output.is_file());
    }
}
