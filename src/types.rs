//! Core types for background removal operations

use crate::error::{BgRemovalError, Result};
use image::{ColorType, DynamicImage, GenericImageView};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Solid background colour used when flattening the alpha channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BackgroundColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl BackgroundColor {
    pub const WHITE: Self = Self::new(255, 255, 255);
    pub const BLACK: Self = Self::new(0, 0, 0);

    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    #[must_use]
    pub fn to_rgb(self) -> image::Rgb<u8> {
        image::Rgb([self.r, self.g, self.b])
    }

    fn from_name(name: &str) -> Option<Self> {
        let color = match name {
            "white" => Self::WHITE,
            "black" => Self::BLACK,
            "red" => Self::new(255, 0, 0),
            "green" => Self::new(0, 128, 0),
            "lime" => Self::new(0, 255, 0),
            "blue" => Self::new(0, 0, 255),
            "yellow" => Self::new(255, 255, 0),
            "cyan" => Self::new(0, 255, 255),
            "magenta" => Self::new(255, 0, 255),
            "gray" | "grey" => Self::new(128, 128, 128),
            _ => return None,
        };
        Some(color)
    }

    fn from_hex(hex: &str) -> Option<Self> {
        if !hex.is_ascii() {
            return None;
        }
        let channel = |s: &str| u8::from_str_radix(s, 16).ok();
        match hex.len() {
            6 => Some(Self::new(
                channel(hex.get(0..2)?)?,
                channel(hex.get(2..4)?)?,
                channel(hex.get(4..6)?)?,
            )),
            3 => {
                let short = |s: &str| channel(s).map(|v| v * 17);
                Some(Self::new(
                    short(hex.get(0..1)?)?,
                    short(hex.get(1..2)?)?,
                    short(hex.get(2..3)?)?,
                ))
            },
            _ => None,
        }
    }

    fn from_components(s: &str) -> Option<Self> {
        let parts: Vec<u8> = s
            .split(',')
            .map(|p| p.trim().parse::<u8>().ok())
            .collect::<Option<_>>()?;
        match parts.as_slice() {
            [r, g, b] => Some(Self::new(*r, *g, *b)),
            _ => None,
        }
    }
}

impl FromStr for BackgroundColor {
    type Err = BgRemovalError;

    /// Parse `#rrggbb`, `#rgb`, `r,g,b` or a basic colour name
    fn from_str(s: &str) -> Result<Self> {
        let value = s.trim().to_ascii_lowercase();
        let parsed = if let Some(hex) = value.strip_prefix('#') {
            Self::from_hex(hex)
        } else if value.contains(',') {
            Self::from_components(&value)
        } else {
            Self::from_name(&value)
        };
        parsed.ok_or_else(|| {
            BgRemovalError::invalid_config(format!(
                "Invalid background colour '{s}'. Use #rrggbb, r,g,b or a colour name such as white"
            ))
        })
    }
}

impl fmt::Display for BackgroundColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Rule for the alpha channel produced by segmentation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransparencyPolicy {
    /// Keep the four-channel result unchanged
    Keep,
    /// Flatten onto a solid colour, producing three channels
    Composite(BackgroundColor),
}

impl TransparencyPolicy {
    /// Build a policy from the CLI keep flag and optional colour
    ///
    /// # Errors
    /// - `keep` is false and no background colour was supplied
    pub fn from_keep_flag(keep: bool, background: Option<BackgroundColor>) -> Result<Self> {
        match (keep, background) {
            (true, _) => Ok(Self::Keep),
            (false, Some(color)) => Ok(Self::Composite(color)),
            (false, None) => Err(BgRemovalError::invalid_config(
                "A background colour is required when transparency is not kept",
            )),
        }
    }

    /// Number of channels in the output produced under this policy
    #[must_use]
    pub fn output_channels(self) -> u8 {
        match self {
            Self::Keep => 4,
            Self::Composite(_) => 3,
        }
    }
}

impl fmt::Display for TransparencyPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Keep => write!(f, "keep transparency"),
            Self::Composite(color) => write!(f, "composite onto {color}"),
        }
    }
}

/// Failable stages of one pipeline invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PipelineStage {
    Load,
    Normalize,
    Infer,
    ApplyPolicy,
    Persist,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Load => "load",
            Self::Normalize => "normalize",
            Self::Infer => "infer",
            Self::ApplyPolicy => "apply policy",
            Self::Persist => "persist",
        };
        f.write_str(name)
    }
}

/// Per-invocation state machine
///
/// `Init → Loaded → Normalized → Inferred → Composited → Persisted → Done`,
/// with `Failed` reachable from every non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineState {
    Init,
    Loaded,
    Normalized,
    Inferred,
    Composited,
    Persisted,
    Done,
    Failed(PipelineStage),
}

impl PipelineState {
    /// Stage that runs when leaving this state
    #[must_use]
    pub fn pending_stage(self) -> Option<PipelineStage> {
        match self {
            Self::Init => Some(PipelineStage::Load),
            Self::Loaded => Some(PipelineStage::Normalize),
            Self::Normalized => Some(PipelineStage::Infer),
            Self::Inferred => Some(PipelineStage::ApplyPolicy),
            Self::Composited => Some(PipelineStage::Persist),
            Self::Persisted | Self::Done | Self::Failed(_) => None,
        }
    }

    /// State reached when the pending stage succeeds
    ///
    /// # Errors
    /// - The state is terminal
    pub fn advance(self) -> Result<Self> {
        let next = match self {
            Self::Init => Self::Loaded,
            Self::Loaded => Self::Normalized,
            Self::Normalized => Self::Inferred,
            Self::Inferred => Self::Composited,
            Self::Composited => Self::Persisted,
            Self::Persisted => Self::Done,
            Self::Done | Self::Failed(_) => {
                return Err(BgRemovalError::internal(format!(
                    "Pipeline cannot advance from terminal state {self:?}"
                )))
            },
        };
        Ok(next)
    }

    /// State reached when the pending stage fails
    #[must_use]
    pub fn fail(self) -> Self {
        match self.pending_stage() {
            Some(stage) => Self::Failed(stage),
            None => self,
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed(_))
    }
}

/// Timing breakdown for one pipeline invocation
///
/// Recorded for observability only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingTimings {
    /// Image loading and decoding from file
    pub decode_ms: u64,

    /// Segmentation inference
    pub inference_ms: u64,

    /// Transparency policy application
    pub composite_ms: u64,

    /// Encoding, writing and verification
    pub encode_ms: u64,

    /// Total end-to-end processing time
    pub total_ms: u64,
}

impl ProcessingTimings {
    /// Share of the total spent in inference
    #[must_use]
    pub fn inference_ratio(&self) -> f64 {
        if self.total_ms == 0 {
            0.0
        } else {
            self.inference_ms as f64 / self.total_ms as f64
        }
    }

    /// Get timing summary for display
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "Total: {}ms | Decode: {}ms | Inference: {}ms ({:.0}%) | Composite: {}ms | Encode: {}ms",
            self.total_ms,
            self.decode_ms,
            self.inference_ms,
            self.inference_ratio() * 100.0,
            self.composite_ms,
            self.encode_ms
        )
    }
}

/// Result of one pipeline invocation
#[derive(Debug, Clone)]
pub struct ProcessedImage {
    /// The processed image (RGBA when transparency is kept, RGB when composited)
    pub image: DynamicImage,

    pub width: u32,
    pub height: u32,

    /// Number of colour channels, alpha included
    pub channels: u8,

    pub timings: ProcessingTimings,

    /// Where the image was persisted, if it was
    pub output_path: Option<PathBuf>,
}

impl ProcessedImage {
    #[must_use]
    pub fn new(image: DynamicImage) -> Self {
        let (width, height) = image.dimensions();
        let channels = image.color().channel_count();
        Self {
            image,
            width,
            height,
            channels,
            timings: ProcessingTimings::default(),
            output_path: None,
        }
    }

    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    #[must_use]
    pub fn has_alpha(&self) -> bool {
        self.image.color().has_alpha()
    }

    #[must_use]
    pub fn color_type(&self) -> ColorType {
        self.image.color()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{RgbImage, RgbaImage};

    #[test]
    fn test_background_color_parsing() {
        assert_eq!(
            "#ffffff".parse::<BackgroundColor>().unwrap(),
            BackgroundColor::WHITE
        );
        assert_eq!(
            "#0F8".parse::<BackgroundColor>().unwrap(),
            BackgroundColor::new(0, 255, 136)
        );
        assert_eq!(
            "10, 20,30".parse::<BackgroundColor>().unwrap(),
            BackgroundColor::new(10, 20, 30)
        );
        assert_eq!(
            "White".parse::<BackgroundColor>().unwrap(),
            BackgroundColor::WHITE
        );
        assert_eq!(
            "grey".parse::<BackgroundColor>().unwrap(),
            BackgroundColor::new(128, 128, 128)
        );
    }

    #[test]
    fn test_background_color_rejects_invalid() {
        for input in ["", "#12345", "#gggggg", "1,2", "256,0,0", "transparent", "#ééé"] {
            assert!(
                input.parse::<BackgroundColor>().is_err(),
                "'{input}' should be rejected"
            );
        }
    }

    #[test]
    fn test_background_color_display() {
        assert_eq!(BackgroundColor::new(255, 0, 16).to_string(), "#ff0010");
    }

    #[test]
    fn test_policy_requires_color_for_composite() {
        assert_eq!(
            TransparencyPolicy::from_keep_flag(true, None).unwrap(),
            TransparencyPolicy::Keep
        );
        assert_eq!(
            TransparencyPolicy::from_keep_flag(false, Some(BackgroundColor::BLACK)).unwrap(),
            TransparencyPolicy::Composite(BackgroundColor::BLACK)
        );
        assert!(TransparencyPolicy::from_keep_flag(false, None).is_err());
        assert_eq!(TransparencyPolicy::Keep.output_channels(), 4);
        assert_eq!(
            TransparencyPolicy::Composite(BackgroundColor::WHITE).output_channels(),
            3
        );
    }

    #[test]
    fn test_pipeline_state_machine() {
        let mut state = PipelineState::Init;
        let mut visited = vec![state];
        while !state.is_terminal() {
            state = state.advance().unwrap();
            visited.push(state);
        }
        assert_eq!(
            visited,
            vec![
                PipelineState::Init,
                PipelineState::Loaded,
                PipelineState::Normalized,
                PipelineState::Inferred,
                PipelineState::Composited,
                PipelineState::Persisted,
                PipelineState::Done,
            ]
        );
        assert!(PipelineState::Done.advance().is_err());
    }

    #[test]
    fn test_pipeline_state_failure() {
        assert_eq!(
            PipelineState::Init.fail(),
            PipelineState::Failed(PipelineStage::Load)
        );
        assert_eq!(
            PipelineState::Normalized.fail(),
            PipelineState::Failed(PipelineStage::Infer)
        );
        assert_eq!(
            PipelineState::Composited.fail(),
            PipelineState::Failed(PipelineStage::Persist)
        );
        let failed = PipelineState::Failed(PipelineStage::Infer);
        assert_eq!(failed.fail(), failed);
        assert!(failed.advance().is_err());
    }

    #[test]
    fn test_processed_image_channels() {
        let rgba = ProcessedImage::new(DynamicImage::ImageRgba8(RgbaImage::new(10, 4)));
        assert_eq!(rgba.dimensions(), (10, 4));
        assert_eq!(rgba.channels, 4);
        assert!(rgba.has_alpha());

        let rgb = ProcessedImage::new(DynamicImage::ImageRgb8(RgbImage::new(3, 3)));
        assert_eq!(rgb.channels, 3);
        assert!(!rgb.has_alpha());
    }

    #[test]
    fn test_timings_ratio() {
        let timings = ProcessingTimings {
            inference_ms: 50,
            total_ms: 200,
            ..ProcessingTimings::default()
        };
        assert!((timings.inference_ratio() - 0.25).abs() < f64::EPSILON);
        assert_eq!(ProcessingTimings::default().inference_ratio(), 0.0);
        assert!(timings.summary().contains("Inference: 50ms (25%)"));
    }
}
