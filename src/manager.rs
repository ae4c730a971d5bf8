//! Controlling context tying catalog, provider detection, downloads and inference together
//!
//! [`ModelManager`] is the only writer of the [`InstalledModelSet`]. The set is
//! re-derived from disk after every download batch has fully completed, never
//! while tasks are still reporting.
//!
//! The operation state is published on a `watch` channel, so a close request
//! arriving through a [`ShutdownHandle`] sees `Busy` while a batch or an
//! inference is still in flight.

use crate::catalog::{ModelCatalog, ModelDescriptor};
use crate::config::ManagerConfig;
use crate::download::{BatchReport, DownloadOrchestrator, HttpModelDownloader, ModelAcquirer};
use crate::error::{BgRemovalError, Result};
use crate::pipeline::InferencePipeline;
use crate::providers::{ProviderInfo, ProviderSelection, ProviderSelector};
use crate::services::{
    ImageIOService, NoOpProgressReporter, ProcessingStage, ProgressReporter, ProgressUpdate,
};
use crate::session::{SegmentationSession, SessionBuilder, SessionFactory};
use crate::state::{InstalledModelSet, ModelStateTracker};
use crate::types::{ProcessedImage, TransparencyPolicy};
use instant::Instant;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;

/// What the controlling context is doing right now
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OperationState {
    #[default]
    Idle,
    Busy {
        /// Human-readable name of the running operation
        operation: String,
    },
}

impl OperationState {
    pub fn busy<S: Into<String>>(operation: S) -> Self {
        Self::Busy {
            operation: operation.into(),
        }
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Busy { .. })
    }
}

impl fmt::Display for OperationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Busy { operation } => write!(f, "busy ({operation})"),
        }
    }
}

/// Outcome of a close request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownDecision {
    Proceed,
    Cancel,
}

/// Decides whether the controlling context may close
pub struct ShutdownGate;

impl ShutdownGate {
    /// Closing while idle always proceeds. While busy, `confirm` is asked with a
    /// prompt naming the running operation, and only an explicit yes proceeds.
    pub fn evaluate<F>(state: &OperationState, confirm: F) -> ShutdownDecision
    where
        F: FnOnce(&str) -> bool,
    {
        match state {
            OperationState::Idle => ShutdownDecision::Proceed,
            OperationState::Busy { operation } => {
                let prompt = format!(
                    "'{operation}' is still running. Closing now may leave partially written files. Close anyway?"
                );
                if confirm(&prompt) {
                    log::warn!("⚠️ Closing while '{operation}' is still running");
                    ShutdownDecision::Proceed
                } else {
                    ShutdownDecision::Cancel
                }
            },
        }
    }
}

/// Read-only view of a manager's operation state, usable while it is busy
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    state: watch::Receiver<OperationState>,
}

impl ShutdownHandle {
    #[must_use]
    pub fn current(&self) -> OperationState {
        self.state.borrow().clone()
    }

    /// Evaluate a close request against the state at this moment
    pub fn request<F>(&self, confirm: F) -> ShutdownDecision
    where
        F: FnOnce(&str) -> bool,
    {
        ShutdownGate::evaluate(&self.current(), confirm)
    }
}

/// Publishes `Busy` on creation and `Idle` on drop
struct BusyGuard<'a> {
    state: &'a watch::Sender<OperationState>,
}

impl<'a> BusyGuard<'a> {
    fn enter<S: Into<String>>(state: &'a watch::Sender<OperationState>, operation: S) -> Self {
        state.send_replace(OperationState::busy(operation));
        Self { state }
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.state.send_replace(OperationState::Idle);
    }
}

/// Owns every component and the installed-model set
pub struct ModelManager {
    config: ManagerConfig,
    catalog: Arc<ModelCatalog>,
    tracker: ModelStateTracker,
    selector: ProviderSelector,
    factory: Arc<SessionFactory>,
    orchestrator: DownloadOrchestrator,
    pipeline: InferencePipeline,
    reporter: Arc<dyn ProgressReporter>,
    installed: InstalledModelSet,
    state: watch::Sender<OperationState>,
}

impl ModelManager {
    #[must_use]
    pub fn builder(config: ManagerConfig) -> ModelManagerBuilder {
        ModelManagerBuilder::new(config)
    }

    /// Manager with the ONNX runtime, HTTP downloads and the built-in catalog
    ///
    /// # Errors
    /// - Invalid configuration
    /// - HTTP client construction failure
    pub fn new(config: ManagerConfig) -> Result<Self> {
        Self::builder(config).build()
    }

    #[must_use]
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    #[must_use]
    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    #[must_use]
    pub fn models_dir(&self) -> &Path {
        self.tracker.models_dir()
    }

    /// Installed set as of the last [`refresh`](Self::refresh)
    #[must_use]
    pub fn installed(&self) -> &InstalledModelSet {
        &self.installed
    }

    #[must_use]
    pub fn state(&self) -> OperationState {
        self.state.borrow().clone()
    }

    /// Handle for close requests that may arrive while an operation runs
    #[must_use]
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            state: self.state.subscribe(),
        }
    }

    /// Re-derive the installed set from disk and rewrite the snapshot
    ///
    /// # Errors
    /// - The models directory cannot be read
    /// - The snapshot cannot be written
    pub fn refresh(&mut self) -> Result<&InstalledModelSet> {
        let installed = self.tracker.scan(&self.catalog)?;
        self.tracker.persist(&installed)?;
        self.installed = installed;
        Ok(&self.installed)
    }

    /// Catalog models without an artifact, in catalog order
    #[must_use]
    pub fn missing_models(&self) -> Vec<&ModelDescriptor> {
        self.catalog
            .iter()
            .filter(|d| !self.installed.contains(d.name))
            .collect()
    }

    pub fn detect_providers(&self) -> ProviderSelection {
        self.selector.detect()
    }

    pub fn provider_diagnostics(&self) -> Vec<ProviderInfo> {
        self.selector.diagnostics()
    }

    /// Acquire `names` concurrently, then refresh the installed set
    ///
    /// `on_item` fires once per distinct name as each acquisition finishes.
    ///
    /// # Errors
    /// - The models directory cannot be created
    /// - The rescan after the batch fails
    pub async fn download<I, S, F>(&mut self, names: I, on_item: F) -> Result<BatchReport>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: FnMut(&str, bool),
    {
        self.tracker.ensure_models_dir()?;

        let outcome = {
            let _busy = BusyGuard::enter(&self.state, "model download");
            self.orchestrator
                .run_batch(names, on_item, |report| {
                    log::info!(
                        "📦 Batch done: {} of {} model(s) acquired",
                        report.succeeded.len(),
                        report.total()
                    );
                })
                .await
        };

        let report = outcome?;
        self.refresh()?;
        Ok(report)
    }

    /// Acquire every catalog model that is not installed yet
    ///
    /// # Errors
    /// - Same as [`download`](Self::download)
    pub async fn download_missing<F>(&mut self, on_item: F) -> Result<BatchReport>
    where
        F: FnMut(&str, bool),
    {
        self.refresh()?;
        let missing: Vec<String> = self
            .missing_models()
            .into_iter()
            .map(|d| d.name.to_string())
            .collect();
        if missing.is_empty() {
            log::info!("✅ All {} models already installed", self.catalog.len());
        }
        self.download(missing, on_item).await
    }

    /// Run one background-removal invocation on a blocking worker
    ///
    /// The input is checked first. A requested catalog model that is not
    /// installed is downloaded on demand, and when that fails the default model
    /// is fetched instead so the fallback has something to load. Session
    /// creation and inference both run off the async caller.
    ///
    /// # Errors
    /// - `InputNotFound` before any model work when `input` is missing
    /// - `FatalModelUnavailable` from session creation
    /// - Any pipeline stage error
    pub async fn process(
        &mut self,
        input: &Path,
        output: &Path,
        model: &str,
        policy: TransparencyPolicy,
    ) -> Result<ProcessedImage> {
        ImageIOService::ensure_input(input)?;
        self.acquire_on_demand(model).await?;

        let _busy = BusyGuard::enter(&self.state, format!("processing {}", input.display()));
        let session = self.load_session(model).await?;

        self.pipeline
            .spawn(input.to_path_buf(), output.to_path_buf(), session, policy)
            .await
            .map_err(|e| BgRemovalError::internal(format!("Inference task failed: {e}")))?
    }

    /// Download `model`, or the default model if that fails, when not installed
    async fn acquire_on_demand(&mut self, model: &str) -> Result<()> {
        self.installed = self.tracker.scan(&self.catalog)?;
        let fallback = self.catalog.default_model().name;

        let mut candidates = vec![model];
        if model != fallback {
            candidates.push(fallback);
        }

        for name in candidates {
            if self.installed.contains(name) {
                return Ok(());
            }
            let Some(descriptor) = self.catalog.get(name) else {
                continue;
            };
            if descriptor.url.is_empty() || descriptor.requires_prompt {
                continue;
            }

            log::info!("📥 Model '{name}' is not installed, downloading it");
            let report = self.download([name], |_, _| {}).await?;
            if !report.all_succeeded() {
                log::warn!("⚠️ On-demand download of '{name}' failed");
            }
        }
        Ok(())
    }

    /// Create the session on a blocking worker, reporting the initialization stage
    async fn load_session(&self, model: &str) -> Result<Box<dyn SegmentationSession>> {
        let start = Instant::now();
        self.reporter
            .report_progress(ProgressUpdate::new(ProcessingStage::Initialization, start));

        let factory = Arc::clone(&self.factory);
        let providers = self.selector.detect();
        let name = model.to_string();
        let created = tokio::task::spawn_blocking(move || factory.create_session(&name, &providers))
            .await
            .map_err(|e| BgRemovalError::internal(format!("Session task failed: {e}")))
            .and_then(|session| session);

        if let Err(e) = &created {
            self.reporter
                .report_error(ProcessingStage::Initialization, &e.to_string());
        }
        created
    }

    /// Evaluate a close request against the current state
    pub fn request_shutdown<F>(&self, confirm: F) -> ShutdownDecision
    where
        F: FnOnce(&str) -> bool,
    {
        ShutdownGate::evaluate(&self.state(), confirm)
    }
}

/// Builder for [`ModelManager`]
///
/// Every collaborator defaults to the production implementation.
pub struct ModelManagerBuilder {
    config: ManagerConfig,
    catalog: Option<ModelCatalog>,
    selector: Option<ProviderSelector>,
    session_builder: Option<Box<dyn SessionBuilder>>,
    acquirer: Option<Arc<dyn ModelAcquirer>>,
    reporter: Option<Arc<dyn ProgressReporter>>,
}

impl ModelManagerBuilder {
    fn new(config: ManagerConfig) -> Self {
        Self {
            config,
            catalog: None,
            selector: None,
            session_builder: None,
            acquirer: None,
            reporter: None,
        }
    }

    #[must_use]
    pub fn catalog(mut self, catalog: ModelCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    #[must_use]
    pub fn provider_selector(mut self, selector: ProviderSelector) -> Self {
        self.selector = Some(selector);
        self
    }

    #[must_use]
    pub fn session_builder(mut self, builder: impl SessionBuilder + 'static) -> Self {
        self.session_builder = Some(Box::new(builder));
        self
    }

    #[must_use]
    pub fn acquirer(mut self, acquirer: impl ModelAcquirer + 'static) -> Self {
        self.acquirer = Some(Arc::new(acquirer));
        self
    }

    #[must_use]
    pub fn progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// Build the manager and take an initial scan of the models directory
    ///
    /// # Errors
    /// - Invalid configuration
    /// - No session builder and the `onnx` feature disabled
    /// - HTTP client construction failure
    /// - The models directory exists but cannot be read
    pub fn build(self) -> Result<ModelManager> {
        self.config.validate()?;

        let catalog = Arc::new(self.catalog.unwrap_or_default());
        let tracker = ModelStateTracker::from_config(&self.config);
        let session_builder = match self.session_builder {
            Some(builder) => builder,
            None => default_session_builder(&self.config)?,
        };
        let acquirer: Arc<dyn ModelAcquirer> = match self.acquirer {
            Some(acquirer) => acquirer,
            None => Arc::new(HttpModelDownloader::from_config(&self.config)?),
        };

        let factory = Arc::new(SessionFactory::new(
            Arc::clone(&catalog),
            tracker.clone(),
            session_builder,
        ));
        let orchestrator = DownloadOrchestrator::new(Arc::clone(&catalog), acquirer);
        let reporter: Arc<dyn ProgressReporter> = match self.reporter {
            Some(reporter) => reporter,
            None => Arc::new(NoOpProgressReporter),
        };
        let pipeline = InferencePipeline::with_reporter(Arc::clone(&reporter));
        let (state, _) = watch::channel(OperationState::Idle);
        let installed = tracker.scan(&catalog)?;

        log::debug!(
            "Model manager ready: {} of {} models installed in {}",
            installed.len(),
            catalog.len(),
            tracker.models_dir().display()
        );

        Ok(ModelManager {
            config: self.config,
            catalog,
            tracker,
            selector: self.selector.unwrap_or_default(),
            factory,
            orchestrator,
            pipeline,
            reporter,
            installed,
            state,
        })
    }
}

#[cfg(feature = "onnx")]
fn default_session_builder(config: &ManagerConfig) -> Result<Box<dyn SessionBuilder>> {
    Ok(Box::new(
        crate::backends::OnnxSessionBuilder::new()
            .with_intra_threads(config.intra_threads)
            .with_graph_optimization(config.optimize_graph),
    ))
}

#[cfg(not(feature = "onnx"))]
fn default_session_builder(_config: &ManagerConfig) -> Result<Box<dyn SessionBuilder>> {
    Err(BgRemovalError::invalid_config(
        "No session builder configured and the onnx feature is disabled",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::mock::MockSessionBuilder;
    use crate::download::MockAcquirer;
    use crate::providers::StaticProviderProbe;
    use image::{DynamicImage, RgbImage};
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::TempDir;

    fn config(temp: &TempDir) -> ManagerConfig {
        ManagerConfig::builder()
            .models_dir(temp.path().join("u2net"))
            .build()
            .unwrap()
    }

    fn manager_with(
        temp: &TempDir,
        acquirer: MockAcquirer,
        sessions: MockSessionBuilder,
    ) -> ModelManager {
        ModelManager::builder(config(temp))
            .provider_selector(ProviderSelector::new(StaticProviderProbe::new([
                "CPUExecutionProvider",
            ])))
            .session_builder(sessions)
            .acquirer(acquirer)
            .build()
            .unwrap()
    }

    fn manager(temp: &TempDir, acquirer: MockAcquirer) -> ModelManager {
        manager_with(temp, acquirer, MockSessionBuilder::new())
    }

    fn input_image(temp: &TempDir) -> PathBuf {
        let input = temp.path().join("in.png");
        DynamicImage::ImageRgb8(RgbImage::new(12, 7))
            .save(&input)
            .unwrap();
        input
    }

    #[test]
    fn test_shutdown_gate() {
        assert_eq!(
            ShutdownGate::evaluate(&OperationState::Idle, |_| panic!("no prompt when idle")),
            ShutdownDecision::Proceed
        );

        let busy = OperationState::busy("model download");
        let mut prompt = String::new();
        let decision = ShutdownGate::evaluate(&busy, |p| {
            prompt = p.to_string();
            false
        });
        assert_eq!(decision, ShutdownDecision::Cancel);
        assert!(prompt.contains("model download"));
        assert_eq!(ShutdownGate::evaluate(&busy, |_| true), ShutdownDecision::Proceed);
    }

    #[tokio::test]
    async fn test_close_request_sees_busy_during_batch() {
        let temp = TempDir::new().unwrap();
        let acquirer = MockAcquirer::new()
            .writing_to(temp.path().join("u2net"))
            .with_delay("u2net", Duration::from_millis(200));
        let mut manager = manager(&temp, acquirer);
        let handle = manager.shutdown_handle();
        let mut watcher = manager.shutdown_handle().state;

        let close_attempt = async move {
            drop(watcher.wait_for(OperationState::is_busy).await.unwrap());
            let mut prompt = String::new();
            let decision = handle.request(|p| {
                prompt = p.to_string();
                false
            });
            (decision, prompt)
        };

        let (report, (decision, prompt)) =
            tokio::join!(manager.download(["u2net"], |_, _| {}), close_attempt);

        assert!(report.unwrap().all_succeeded());
        assert_eq!(decision, ShutdownDecision::Cancel);
        assert!(prompt.contains("model download"), "{prompt}");

        // Back to idle once the batch is done
        assert_eq!(manager.state(), OperationState::Idle);
        assert_eq!(
            manager.request_shutdown(|_| panic!("no prompt when idle")),
            ShutdownDecision::Proceed
        );
    }

    #[tokio::test]
    async fn test_download_missing_installs_everything() {
        let temp = TempDir::new().unwrap();
        let models_dir = temp.path().join("u2net");
        let acquirer = MockAcquirer::new()
            .writing_to(&models_dir)
            .failing_on("sam");
        let mut manager = manager(&temp, acquirer);
        assert!(manager.installed().is_empty());
        assert_eq!(manager.missing_models().len(), 12);

        let items = Mutex::new(Vec::new());
        let report = manager
            .download_missing(|name, ok| items.lock().unwrap().push((name.to_string(), ok)))
            .await
            .unwrap();

        assert_eq!(items.lock().unwrap().len(), 12);
        assert_eq!(report.failed, vec!["sam"]);
        assert_eq!(manager.installed().len(), 11);
        assert_eq!(
            manager
                .missing_models()
                .iter()
                .map(|d| d.name)
                .collect::<Vec<_>>(),
            vec!["sam"]
        );
        assert!(!manager.state().is_busy());

        let snapshot = std::fs::read_to_string(temp.path().join("models.txt")).unwrap();
        assert_eq!(snapshot.lines().count(), 11);
        assert!(!snapshot.contains("sam"));
    }

    #[tokio::test]
    async fn test_download_nothing_missing() {
        let temp = TempDir::new().unwrap();
        let mut manager = manager(&temp, MockAcquirer::new());
        let report = manager.download(Vec::<String>::new(), |_, _| {}).await.unwrap();
        assert_eq!(report.total(), 0);
    }

    #[tokio::test]
    async fn test_process_falls_back_to_default_model() {
        let temp = TempDir::new().unwrap();
        let models_dir = temp.path().join("u2net");
        std::fs::create_dir_all(&models_dir).unwrap();
        std::fs::write(models_dir.join("u2netp.onnx"), b"weights").unwrap();

        let input = input_image(&temp);
        let output = temp.path().join("in_out.png");

        let acquirer = MockAcquirer::new();
        let calls = acquirer.calls();
        let mut manager = manager(&temp, acquirer);
        let result = manager
            .process(&input, &output, "nonexistent-model", TransparencyPolicy::Keep)
            .await
            .unwrap();

        assert_eq!(result.dimensions(), (12, 7));
        assert_eq!(result.channels, 4);
        assert!(output.is_file());
        assert!(calls.lock().unwrap().is_empty());
        assert_eq!(manager.state(), OperationState::Idle);
    }

    #[tokio::test]
    async fn test_process_acquires_missing_model_on_demand() {
        let temp = TempDir::new().unwrap();
        let acquirer = MockAcquirer::new().writing_to(temp.path().join("u2net"));
        let calls = acquirer.calls();
        let sessions = MockSessionBuilder::new();
        let attempts = sessions.attempts();
        let mut manager = manager_with(&temp, acquirer, sessions);

        let input = input_image(&temp);
        manager
            .process(&input, &temp.path().join("out.png"), "u2net", TransparencyPolicy::Keep)
            .await
            .unwrap();

        assert_eq!(*calls.lock().unwrap(), vec!["u2net".to_string()]);
        assert_eq!(*attempts.lock().unwrap(), vec!["u2net".to_string()]);
        assert!(manager.installed().contains("u2net"));
    }

    #[tokio::test]
    async fn test_process_acquires_default_when_requested_download_fails() {
        let temp = TempDir::new().unwrap();
        let acquirer = MockAcquirer::new()
            .writing_to(temp.path().join("u2net"))
            .failing_on("u2net");
        let calls = acquirer.calls();
        let sessions = MockSessionBuilder::new();
        let attempts = sessions.attempts();
        let mut manager = manager_with(&temp, acquirer, sessions);

        let input = input_image(&temp);
        manager
            .process(&input, &temp.path().join("out.png"), "u2net", TransparencyPolicy::Keep)
            .await
            .unwrap();

        assert_eq!(
            *calls.lock().unwrap(),
            vec!["u2net".to_string(), "u2netp".to_string()]
        );
        // The requested model never reached the builder, the fallback did
        assert_eq!(*attempts.lock().unwrap(), vec!["u2netp".to_string()]);
        assert!(manager.installed().contains("u2netp"));
        assert!(!manager.installed().contains("u2net"));
    }

    #[tokio::test]
    async fn test_process_fatal_when_nothing_can_be_acquired() {
        let temp = TempDir::new().unwrap();
        let acquirer = MockAcquirer::new()
            .failing_on("u2net")
            .failing_on("u2netp");
        let mut manager = manager(&temp, acquirer);

        let input = input_image(&temp);
        let output = temp.path().join("out.png");
        let err = manager
            .process(&input, &output, "u2net", TransparencyPolicy::Keep)
            .await
            .unwrap_err();
        assert!(err.is_fatal());
        assert!(!output.exists());
        assert!(!manager.state().is_busy());
    }

    #[tokio::test]
    async fn test_missing_input_checked_before_any_model_work() {
        let temp = TempDir::new().unwrap();
        let acquirer = MockAcquirer::new();
        let calls = acquirer.calls();
        let mut manager = manager(&temp, acquirer);

        let err = manager
            .process(
                &temp.path().join("in.png"),
                &temp.path().join("out.png"),
                "u2net",
                TransparencyPolicy::Keep,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, BgRemovalError::InputNotFound(_)));
        assert!(calls.lock().unwrap().is_empty());
        assert!(!temp.path().join("u2net").exists());
    }

    #[tokio::test]
    async fn test_initialization_stage_reported() {
        #[derive(Default)]
        struct Stages(Mutex<Vec<ProcessingStage>>);

        impl ProgressReporter for Stages {
            fn report_progress(&self, update: ProgressUpdate) {
                self.0.lock().unwrap().push(update.stage);
            }

            fn report_completion(&self, _timings: &crate::types::ProcessingTimings) {}

            fn report_error(&self, _stage: ProcessingStage, _error: &str) {}
        }

        let temp = TempDir::new().unwrap();
        let models_dir = temp.path().join("u2net");
        std::fs::create_dir_all(&models_dir).unwrap();
        std::fs::write(models_dir.join("u2netp.onnx"), b"weights").unwrap();

        let stages = Arc::new(Stages::default());
        let mut manager = ModelManager::builder(config(&temp))
            .provider_selector(ProviderSelector::new(StaticProviderProbe::new([
                "CPUExecutionProvider",
            ])))
            .session_builder(MockSessionBuilder::new())
            .acquirer(MockAcquirer::new())
            .progress_reporter(Arc::clone(&stages) as Arc<dyn ProgressReporter>)
            .build()
            .unwrap();

        let input = input_image(&temp);
        manager
            .process(&input, &temp.path().join("out.png"), "u2netp", TransparencyPolicy::Keep)
            .await
            .unwrap();

        let seen = stages.0.lock().unwrap();
        assert_eq!(seen.first(), Some(&ProcessingStage::Initialization));
        assert_eq!(seen.last(), Some(&ProcessingStage::Completed));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let temp = TempDir::new().unwrap();
        let mut config = config(&temp);
        config.download_timeout_secs = 0;
        let result = ModelManager::builder(config)
            .session_builder(MockSessionBuilder::new())
            .acquirer(MockAcquirer::new())
            .build();
        assert!(matches!(result, Err(BgRemovalError::InvalidConfig(_))));
    }
}
