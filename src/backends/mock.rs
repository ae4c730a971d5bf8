//! In-memory session backend for tests and dry runs
//!
//! No model file is ever parsed. The session produces a constant or
//! luminance-derived mask so pipeline behaviour can be checked deterministically.

use crate::catalog::ModelDescriptor;
use crate::error::{BgRemovalError, Result};
use crate::providers::ProviderSelection;
use crate::session::{SegmentationSession, SessionBuilder};
use image::{Rgba, RgbImage, RgbaImage};
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// How the mock session derives alpha values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockMask {
    /// Same alpha for every pixel
    Constant(u8),
    /// Alpha equals the pixel's mean intensity (bright = foreground)
    Luminance,
}

/// Builder that records every attempt and fails on demand
#[derive(Debug, Clone)]
pub struct MockSessionBuilder {
    failing: HashSet<String>,
    mask: MockMask,
    attempts: Arc<Mutex<Vec<String>>>,
}

impl MockSessionBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            failing: HashSet::new(),
            mask: MockMask::Constant(u8::MAX),
            attempts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Fail every build of `model` with `ModelLoad`
    #[must_use]
    pub fn failing_on(mut self, model: &str) -> Self {
        self.failing.insert(model.to_string());
        self
    }

    #[must_use]
    pub fn with_mask(mut self, mask: MockMask) -> Self {
        self.mask = mask;
        self
    }

    /// Shared log of model names passed to `build`, in call order
    #[must_use]
    pub fn attempts(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.attempts)
    }
}

impl Default for MockSessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionBuilder for MockSessionBuilder {
    fn build(
        &self,
        descriptor: &ModelDescriptor,
        artifact: &Path,
        providers: &ProviderSelection,
    ) -> Result<Box<dyn SegmentationSession>> {
        if let Ok(mut attempts) = self.attempts.lock() {
            attempts.push(descriptor.name.to_string());
        }

        if self.failing.contains(descriptor.name) {
            return Err(BgRemovalError::model_load(
                descriptor.name,
                format!("mock refused to load {}", artifact.display()),
            ));
        }

        log::debug!(
            "Mock session for '{}' from {} on {providers}",
            descriptor.name,
            artifact.display()
        );
        Ok(Box::new(MockSession {
            model_name: descriptor.name.to_string(),
            mask: self.mask,
        }))
    }
}

/// Session that attaches a synthetic mask
#[derive(Debug, Clone)]
pub struct MockSession {
    model_name: String,
    mask: MockMask,
}

impl MockSession {
    #[must_use]
    pub fn new(model_name: &str, mask: MockMask) -> Self {
        Self {
            model_name: model_name.to_string(),
            mask,
        }
    }
}

impl SegmentationSession for MockSession {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn segment(&mut self, image: &RgbImage) -> Result<RgbaImage> {
        let (width, height) = image.dimensions();
        Ok(RgbaImage::from_fn(width, height, |x, y| {
            let [r, g, b] = image.get_pixel(x, y).0;
            let alpha = match self.mask {
                MockMask::Constant(value) => value,
                MockMask::Luminance => {
                    ((u16::from(r) + u16::from(g) + u16::from(b)) / 3) as u8
                },
            };
            Rgba([r, g, b, alpha])
        }))
    }
}
