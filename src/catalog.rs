//! Static registry of downloadable background removal models
//!
//! The catalog is fixed at process start. Every descriptor names one model artifact,
//! the file stem it is stored under inside the models directory, and the extensions
//! that count as "installed" for it.

use crate::error::{BgRemovalError, Result};
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

const MB: u64 = 1024 * 1024;

const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// On-disk artifact format of a model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ModelFormat {
    /// ONNX graph (newer models)
    Onnx,
    /// Serialized PyTorch weights (legacy models)
    Pth,
}

impl ModelFormat {
    /// File extension without the leading dot
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Onnx => "onnx",
            Self::Pth => "pth",
        }
    }

    /// Parse a file extension
    ///
    /// Matching is exact, so `u2net.ONNX` is not an artifact.
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "onnx" => Some(Self::Onnx),
            "pth" => Some(Self::Pth),
            _ => None,
        }
    }
}

/// Both extension families are accepted for every catalog model
pub const ALL_FORMATS: &[ModelFormat] = &[ModelFormat::Onnx, ModelFormat::Pth];

/// How the raw model output is turned into a 0..1 mask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MaskActivation {
    /// Rescale so the smallest output becomes 0 and the largest 1
    MinMax,
    /// Logistic sigmoid per value (models that emit logits)
    Sigmoid,
}

/// Preprocessing parameters for driving a model graph
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PreprocessingConfig {
    /// Square input side the graph expects
    pub input_size: u32,
    /// Per-channel mean subtracted after scaling to 0..1
    pub normalization_mean: [f32; 3],
    /// Per-channel standard deviation
    pub normalization_std: [f32; 3],
    /// Mask activation applied to the first output
    pub activation: MaskActivation,
}

impl PreprocessingConfig {
    const fn imagenet(input_size: u32, activation: MaskActivation) -> Self {
        Self {
            input_size,
            normalization_mean: IMAGENET_MEAN,
            normalization_std: IMAGENET_STD,
            activation,
        }
    }

    const fn centered(input_size: u32) -> Self {
        Self {
            input_size,
            normalization_mean: [0.5, 0.5, 0.5],
            normalization_std: [1.0, 1.0, 1.0],
            activation: MaskActivation::MinMax,
        }
    }
}

/// Static metadata identifying one downloadable model artifact
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelDescriptor {
    /// Unique catalog key
    pub name: &'static str,
    /// Approximate artifact size in bytes
    pub size_bytes: u64,
    /// File stem inside the models directory
    pub file_stem: &'static str,
    /// Extensions that count as an installed artifact
    pub formats: &'static [ModelFormat],
    /// One-line human description
    pub description: &'static str,
    /// Where the acquisition primitive fetches the ONNX artifact from
    pub url: &'static str,
    /// Graph input parameters
    pub preprocessing: PreprocessingConfig,
    /// Whether the model needs point/box prompts (not drivable as plain segmentation)
    pub requires_prompt: bool,
}

impl ModelDescriptor {
    /// Descriptor for a locally provided model with no download source
    ///
    /// Uses U2-Net style preprocessing (320px, ImageNet statistics).
    #[must_use]
    pub const fn local(name: &'static str, size_bytes: u64, file_stem: &'static str) -> Self {
        Self {
            name,
            size_bytes,
            file_stem,
            formats: ALL_FORMATS,
            description: "Locally provided model",
            url: "",
            preprocessing: PreprocessingConfig::imagenet(320, MaskActivation::MinMax),
            requires_prompt: false,
        }
    }

    /// File name the acquisition primitive writes (`<stem>.onnx`)
    #[must_use]
    pub fn artifact_file_name(&self) -> String {
        format!("{}.{}", self.file_stem, ModelFormat::Onnx.extension())
    }

    /// Whether `path` is an artifact of this model
    #[must_use]
    pub fn matches_artifact(&self, path: &Path) -> bool {
        let stem_matches = path
            .file_stem()
            .and_then(|s| s.to_str())
            .is_some_and(|stem| stem == self.file_stem);
        let format_allowed = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(ModelFormat::from_extension)
            .is_some_and(|format| self.formats.contains(&format));
        stem_matches && format_allowed
    }

    /// Candidate artifact paths inside `models_dir`, in preference order
    #[must_use]
    pub fn artifact_candidates(&self, models_dir: &Path) -> Vec<PathBuf> {
        self.formats
            .iter()
            .map(|format| models_dir.join(format!("{}.{}", self.file_stem, format.extension())))
            .collect()
    }

    /// Approximate size in whole megabytes
    #[must_use]
    pub fn size_mb(&self) -> u64 {
        self.size_bytes / MB
    }
}

macro_rules! descriptor {
    ($name:literal, $mb:literal, $stem:literal, $remote:literal, $pre:expr, $desc:literal) => {
        ModelDescriptor {
            name: $name,
            size_bytes: $mb * MB,
            file_stem: $stem,
            formats: ALL_FORMATS,
            description: $desc,
            url: concat!("https://github.com/danielgatis/rembg/releases/download/v0.0.0/", $remote),
            preprocessing: $pre,
            requires_prompt: false,
        }
    };
}

fn builtin_descriptors() -> Vec<ModelDescriptor> {
    use MaskActivation::{MinMax, Sigmoid};

    vec![
        descriptor!(
            "u2net",
            168,
            "u2net",
            "u2net.onnx",
            PreprocessingConfig::imagenet(320, MinMax),
            "General purpose background removal - most versatile"
        ),
        descriptor!(
            "u2netp",
            4,
            "u2netp",
            "u2netp.onnx",
            PreprocessingConfig::imagenet(320, MinMax),
            "Lightweight version - faster processing"
        ),
        descriptor!(
            "u2net_human_seg",
            168,
            "u2net_human_seg",
            "u2net_human_seg.onnx",
            PreprocessingConfig::imagenet(320, MinMax),
            "Optimized for human subjects and portraits"
        ),
        descriptor!(
            "u2net_cloth_seg",
            168,
            "u2net_cloth_seg",
            "u2net_cloth_seg.onnx",
            PreprocessingConfig::imagenet(768, MinMax),
            "Specialized for clothing and fashion items"
        ),
        descriptor!(
            "isnet-general-use",
            170,
            "isnet-general-use",
            "isnet-general-use.onnx",
            PreprocessingConfig::centered(1024),
            "High accuracy general model - best quality"
        ),
        descriptor!(
            "isnet-anime",
            168,
            "isnet-anime",
            "isnet-anime.onnx",
            PreprocessingConfig::centered(1024),
            "High accuracy segmentation for anime characters"
        ),
        descriptor!(
            "silueta",
            43,
            "silueta",
            "silueta.onnx",
            PreprocessingConfig::imagenet(320, MinMax),
            "Ultra-light model - minimal resource usage"
        ),
        ModelDescriptor {
            requires_prompt: true,
            ..descriptor!(
                "sam",
                400,
                "sam_vit_b_01ec64.decoder",
                "vit_b-decoder-quant.onnx",
                PreprocessingConfig::imagenet(1024, MinMax),
                "Segment Anything Model - pre-trained model for any use cases"
            )
        },
        descriptor!(
            "birefnet-general",
            928,
            "birefnet-general",
            "BiRefNet-general-epoch_244.onnx",
            PreprocessingConfig::imagenet(1024, Sigmoid),
            "BiRefNet general purpose - latest architecture"
        ),
        descriptor!(
            "birefnet-general-lite",
            214,
            "birefnet-general-lite",
            "BiRefNet-general-bb_swin_v1_tiny-epoch_232.onnx",
            PreprocessingConfig::imagenet(1024, Sigmoid),
            "Lightweight BiRefNet for faster processing"
        ),
        descriptor!(
            "birefnet-portrait",
            928,
            "birefnet-portrait",
            "BiRefNet-portrait-epoch_150.onnx",
            PreprocessingConfig::imagenet(1024, Sigmoid),
            "BiRefNet optimized for human portraits"
        ),
        descriptor!(
            "ben2-base",
            213,
            "ben2-base",
            "BEN2_Base.onnx",
            PreprocessingConfig::imagenet(1024, Sigmoid),
            "BEN2 base model - refined edges on complex subjects"
        ),
    ]
}

/// Immutable set of model descriptors keyed by name
#[derive(Debug, Clone)]
pub struct ModelCatalog {
    descriptors: Vec<ModelDescriptor>,
}

impl ModelCatalog {
    /// Build a catalog from descriptors
    ///
    /// # Errors
    /// - Empty descriptor list
    /// - Duplicate model names
    pub fn new(descriptors: Vec<ModelDescriptor>) -> Result<Self> {
        if descriptors.is_empty() {
            return Err(BgRemovalError::invalid_config(
                "Model catalog must contain at least one model",
            ));
        }

        let mut seen = HashSet::new();
        for descriptor in &descriptors {
            if !seen.insert(descriptor.name) {
                return Err(BgRemovalError::invalid_config(format!(
                    "Duplicate model name in catalog: {}",
                    descriptor.name
                )));
            }
        }

        Ok(Self { descriptors })
    }

    /// The built-in catalog of known models
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            descriptors: builtin_descriptors(),
        }
    }

    /// Look up a descriptor by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ModelDescriptor> {
        self.descriptors.iter().find(|d| d.name == name)
    }

    /// Whether `name` is a catalog key
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Iterate descriptors in catalog order
    pub fn iter(&self) -> impl Iterator<Item = &ModelDescriptor> {
        self.descriptors.iter()
    }

    /// All model names in catalog order
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.descriptors.iter().map(|d| d.name).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// The fallback model: the smallest catalog entry (first one on ties)
    #[must_use]
    pub fn default_model(&self) -> &ModelDescriptor {
        // min_by_key keeps the first of equal minimums
        self.descriptors
            .iter()
            .min_by_key(|d| d.size_bytes)
            .expect("catalog is never empty")
    }

    /// Approximate combined size of the named models (unknown names count as zero)
    #[must_use]
    pub fn total_size<'a, I>(&self, names: I) -> u64
    where
        I: IntoIterator<Item = &'a str>,
    {
        names
            .into_iter()
            .filter_map(|name| self.get(name))
            .map(|d| d.size_bytes)
            .sum()
    }
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Human-readable byte size (`4.0 MB`)
#[must_use]
pub fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    let unit = UNITS.get(unit_index).unwrap_or(&"B");
    if unit_index == 0 {
        format!("{bytes} {unit}")
    } else {
        format!("{size:.1} {unit}")
    }
}
