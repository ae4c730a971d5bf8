//! Execution provider detection and fallback ordering
//!
//! The runtime reports its backends as free-form identifiers. They are mapped onto the
//! closed [`Provider`] enumeration once, here, and from then on only the enumeration
//! and its static priority table are used.

use crate::error::{BgRemovalError, Result};
use std::fmt;
use std::str::FromStr;

/// Compute backend capable of executing a model graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Provider {
    /// NVIDIA CUDA GPU acceleration (fastest)
    Cuda,
    /// AMD ROCm GPU acceleration
    Rocm,
    /// Apple `CoreML` (Neural Engine / GPU)
    CoreMl,
    /// CPU execution, always available
    Cpu,
}

impl Provider {
    /// Static priority table, fastest first, universal fallback last
    pub const PRIORITY: [Provider; 4] = [Self::Cuda, Self::Rocm, Self::CoreMl, Self::Cpu];

    /// Position in the priority table (0 = fastest)
    #[must_use]
    pub fn priority(self) -> usize {
        match self {
            Self::Cuda => 0,
            Self::Rocm => 1,
            Self::CoreMl => 2,
            Self::Cpu => 3,
        }
    }

    /// Identifier the runtime uses for this provider
    #[must_use]
    pub fn runtime_identifier(self) -> &'static str {
        match self {
            Self::Cuda => "CUDAExecutionProvider",
            Self::Rocm => "ROCMExecutionProvider",
            Self::CoreMl => "CoreMLExecutionProvider",
            Self::Cpu => "CPUExecutionProvider",
        }
    }

    /// Map a runtime identifier onto the enumeration
    ///
    /// Unknown identifiers (TensorRT, DirectML, ...) return `None` and are ignored.
    #[must_use]
    pub fn from_runtime_identifier(identifier: &str) -> Option<Self> {
        Self::PRIORITY
            .into_iter()
            .find(|p| p.runtime_identifier().eq_ignore_ascii_case(identifier.trim()))
    }

    /// Whether this provider uses hardware acceleration
    #[must_use]
    pub fn is_accelerated(self) -> bool {
        !matches!(self, Self::Cpu)
    }

    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::Cuda => "NVIDIA GPU acceleration (requires CUDA toolkit and compatible GPU)",
            Self::Rocm => "AMD GPU acceleration (requires ROCm runtime)",
            Self::CoreMl => "Apple Silicon GPU acceleration (macOS only)",
            Self::Cpu => "Always available, uses CPU for inference",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cuda => write!(f, "cuda"),
            Self::Rocm => write!(f, "rocm"),
            Self::CoreMl => write!(f, "coreml"),
            Self::Cpu => write!(f, "cpu"),
        }
    }
}

impl FromStr for Provider {
    type Err = BgRemovalError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "cuda" => Ok(Self::Cuda),
            "rocm" => Ok(Self::Rocm),
            "coreml" => Ok(Self::CoreMl),
            "cpu" => Ok(Self::Cpu),
            other => Self::from_runtime_identifier(other).ok_or_else(|| {
                BgRemovalError::invalid_config(format!(
                    "Unknown execution provider '{other}'. Supported: cuda, rocm, coreml, cpu"
                ))
            }),
        }
    }
}

/// Ordered, non-empty provider sequence ending with the CPU fallback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderList(Vec<Provider>);

impl ProviderList {
    /// Build a list from detected providers
    ///
    /// Duplicates are removed, the order follows the priority table and CPU is
    /// always appended last whether or not it was detected.
    #[must_use]
    pub fn from_detected<I>(detected: I) -> Self
    where
        I: IntoIterator<Item = Provider>,
    {
        let mut providers: Vec<Provider> = detected
            .into_iter()
            .filter(|p| p.is_accelerated())
            .collect();
        providers.sort_by_key(|p| p.priority());
        providers.dedup();
        providers.push(Provider::Cpu);
        Self(providers)
    }

    /// The universal fallback alone
    #[must_use]
    pub fn cpu_only() -> Self {
        Self(vec![Provider::Cpu])
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Provider] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = Provider> + '_ {
        self.0.iter().copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; kept for API symmetry with `len`
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Most preferred provider
    #[must_use]
    pub fn preferred(&self) -> Provider {
        self.0.first().copied().unwrap_or(Provider::Cpu)
    }

    #[must_use]
    pub fn contains(&self, provider: Provider) -> bool {
        self.0.contains(&provider)
    }
}

impl fmt::Display for ProviderList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        write!(f, "[{}]", names.join(", "))
    }
}

/// Outcome of provider detection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderSelection {
    /// Providers detected from the runtime, in fallback order
    Detected(ProviderList),
    /// The runtime could not be queried; the session builder picks its own default
    RuntimeDefault,
}

impl ProviderSelection {
    /// Explicit provider list, if detection succeeded
    #[must_use]
    pub fn providers(&self) -> Option<&ProviderList> {
        match self {
            Self::Detected(list) => Some(list),
            Self::RuntimeDefault => None,
        }
    }
}

impl fmt::Display for ProviderSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Detected(list) => list.fmt(f),
            Self::RuntimeDefault => write!(f, "runtime default"),
        }
    }
}

/// Query the inference runtime for the backends it can use
pub trait ProviderProbe: Send + Sync {
    /// Runtime identifiers of available backends
    ///
    /// # Errors
    /// - The runtime cannot be queried at all (`ProviderDetection`)
    fn available_identifiers(&self) -> Result<Vec<String>>;
}

/// Probe that reports a fixed identifier list
#[derive(Debug, Clone, Default)]
pub struct StaticProviderProbe {
    identifiers: Vec<String>,
}

impl StaticProviderProbe {
    pub fn new<I, S>(identifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            identifiers: identifiers.into_iter().map(Into::into).collect(),
        }
    }
}

impl ProviderProbe for StaticProviderProbe {
    fn available_identifiers(&self) -> Result<Vec<String>> {
        Ok(self.identifiers.clone())
    }
}

/// Probe used when no runtime capability is compiled in
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableProviderProbe;

impl ProviderProbe for UnavailableProviderProbe {
    fn available_identifiers(&self) -> Result<Vec<String>> {
        Err(BgRemovalError::ProviderDetection(
            "no inference runtime available to query".to_string(),
        ))
    }
}

/// Probe backed by ONNX Runtime's provider availability checks
#[cfg(feature = "onnx")]
#[derive(Debug, Clone, Copy, Default)]
pub struct OrtProviderProbe;

#[cfg(feature = "onnx")]
impl ProviderProbe for OrtProviderProbe {
    fn available_identifiers(&self) -> Result<Vec<String>> {
        use ort::execution_providers::{
            CUDAExecutionProvider, CoreMLExecutionProvider, ExecutionProvider as _,
            ROCmExecutionProvider,
        };

        let checks = [
            (
                Provider::Cuda,
                CUDAExecutionProvider::default().is_available(),
            ),
            (
                Provider::Rocm,
                ROCmExecutionProvider::default().is_available(),
            ),
            (
                Provider::CoreMl,
                CoreMLExecutionProvider::default().is_available(),
            ),
        ];

        let total = checks.len();
        let mut identifiers = Vec::new();
        let mut failures = Vec::new();
        for (provider, check) in checks {
            match check {
                Ok(true) => identifiers.push(provider.runtime_identifier().to_string()),
                Ok(false) => log::debug!("{provider} execution provider is not available"),
                Err(e) => failures.push(format!("{provider}: {e}")),
            }
        }

        if failures.len() == total {
            return Err(BgRemovalError::ProviderDetection(failures.join("; ")));
        }

        identifiers.push(Provider::Cpu.runtime_identifier().to_string());
        Ok(identifiers)
    }
}

/// Availability of one provider, for diagnostics output
#[derive(Debug, Clone)]
pub struct ProviderInfo {
    pub provider: Provider,
    pub available: bool,
    pub description: &'static str,
}

/// Detects available providers and orders them for session creation
pub struct ProviderSelector {
    probe: Box<dyn ProviderProbe>,
}

impl ProviderSelector {
    pub fn new(probe: impl ProviderProbe + 'static) -> Self {
        Self {
            probe: Box::new(probe),
        }
    }

    /// Selector backed by the compiled-in runtime, or the unavailable probe
    #[must_use]
    pub fn with_runtime() -> Self {
        #[cfg(feature = "onnx")]
        {
            Self::new(OrtProviderProbe)
        }
        #[cfg(not(feature = "onnx"))]
        {
            Self::new(UnavailableProviderProbe)
        }
    }

    /// Detect available providers
    ///
    /// Returns a non-empty list ending with CPU, or `RuntimeDefault` when the
    /// runtime cannot be queried.
    pub fn detect(&self) -> ProviderSelection {
        match self.probe.available_identifiers() {
            Ok(identifiers) => {
                let detected: Vec<Provider> = identifiers
                    .iter()
                    .filter_map(|id| {
                        let provider = Provider::from_runtime_identifier(id);
                        if provider.is_none() {
                            log::debug!("Ignoring unsupported execution provider '{id}'");
                        }
                        provider
                    })
                    .collect();
                let list = ProviderList::from_detected(detected);
                log::info!(
                    "Detected execution providers: {} (runtime reported: {})",
                    list,
                    identifiers.join(", ")
                );
                ProviderSelection::Detected(list)
            },
            Err(e) => {
                log::warn!("Provider detection unavailable, using runtime defaults: {e}");
                ProviderSelection::RuntimeDefault
            },
        }
    }

    /// Availability of every known provider
    pub fn diagnostics(&self) -> Vec<ProviderInfo> {
        let selection = self.detect();
        Provider::PRIORITY
            .into_iter()
            .map(|provider| ProviderInfo {
                provider,
                available: match &selection {
                    ProviderSelection::Detected(list) => list.contains(provider),
                    ProviderSelection::RuntimeDefault => provider == Provider::Cpu,
                },
                description: provider.description(),
            })
            .collect()
    }
}

impl Default for ProviderSelector {
    fn default() -> Self {
        Self::with_runtime()
    }
}
