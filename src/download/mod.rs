//! Concurrent model acquisition with one aggregated completion per batch
//!
//! Every model in a batch gets its own task on a [`JoinSet`]. A coordinator task
//! joins them in completion order and forwards [`DownloadEvent`]s over a channel to
//! whoever started the batch. The coordinator is the only place that tracks task
//! status, so no counter is shared between tasks. Exactly one
//! [`DownloadEvent::BatchDone`] closes every batch.

pub mod http;
pub mod mock;

pub use self::http::HttpModelDownloader;
pub use self::mock::MockAcquirer;

use crate::catalog::{ModelCatalog, ModelDescriptor};
use crate::error::{BgRemovalError, Result};
use async_trait::async_trait;
use futures::FutureExt;
use std::collections::{BTreeMap, BTreeSet};
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};

/// Primitive that makes one model artifact present locally
#[async_trait]
pub trait ModelAcquirer: Send + Sync {
    /// Resolve once the artifact exists locally or the attempt has failed
    ///
    /// # Errors
    /// - Network, storage or source errors for this model only
    async fn acquire(&self, descriptor: &ModelDescriptor) -> Result<PathBuf>;
}

/// Status of one model within a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl DownloadStatus {
    #[must_use]
    pub fn is_finished(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

/// One model's acquisition within a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    pub model: String,
    pub status: DownloadStatus,
}

/// Outcome of a whole batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Models whose artifact is now present, sorted
    pub succeeded: Vec<String>,
    /// Models whose acquisition failed, sorted
    pub failed: Vec<String>,
}

impl BatchReport {
    #[must_use]
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Progress message sent from the batch coordinator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadEvent {
    /// A task was spawned for `model`
    Started { model: String },
    /// `model` finished; sent exactly once per model
    ItemFinished { model: String, success: bool },
    /// Every model has reported; always the last event
    BatchDone(BatchReport),
}

/// Handle to a running batch
pub struct DownloadBatch {
    events: mpsc::UnboundedReceiver<DownloadEvent>,
    coordinator: JoinHandle<BatchReport>,
}

impl DownloadBatch {
    /// Next progress event, `None` once the batch is over
    pub async fn next_event(&mut self) -> Option<DownloadEvent> {
        self.events.recv().await
    }

    /// Wait for the whole batch, discarding remaining events
    ///
    /// # Errors
    /// - The coordinator task itself was cancelled
    pub async fn wait(self) -> Result<BatchReport> {
        drop(self.events);
        self.coordinator
            .await
            .map_err(|e| BgRemovalError::internal(format!("Download coordinator failed: {e}")))
    }
}

/// Acquires batches of models concurrently
#[derive(Clone)]
pub struct DownloadOrchestrator {
    catalog: Arc<ModelCatalog>,
    acquirer: Arc<dyn ModelAcquirer>,
}

impl DownloadOrchestrator {
    pub fn new(catalog: Arc<ModelCatalog>, acquirer: Arc<dyn ModelAcquirer>) -> Self {
        Self { catalog, acquirer }
    }

    /// Start acquiring every model in `names`
    ///
    /// Duplicate names collapse to one task. Names outside the catalog are
    /// reported as failed items. Must be called from within a Tokio runtime.
    pub fn request_batch<I, S>(&self, names: I) -> DownloadBatch
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: BTreeSet<String> = names.into_iter().map(Into::into).collect();
        let (tx, events) = mpsc::unbounded_channel();
        let catalog = Arc::clone(&self.catalog);
        let acquirer = Arc::clone(&self.acquirer);

        let coordinator = tokio::spawn(coordinate(catalog, acquirer, names, tx));
        DownloadBatch {
            events,
            coordinator,
        }
    }

    /// Run a batch to completion, delivering callbacks on the caller's task
    ///
    /// `on_item` fires once per distinct model, `on_batch_done` exactly once after
    /// all of them.
    ///
    /// # Errors
    /// - The coordinator task itself was cancelled
    pub async fn run_batch<I, S, F, G>(
        &self,
        names: I,
        mut on_item: F,
        on_batch_done: G,
    ) -> Result<BatchReport>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: FnMut(&str, bool),
        G: FnOnce(&BatchReport),
    {
        let mut batch = self.request_batch(names);
        let mut on_batch_done = Some(on_batch_done);
        while let Some(event) = batch.next_event().await {
            match event {
                DownloadEvent::Started { .. } => {},
                DownloadEvent::ItemFinished { model, success } => on_item(&model, success),
                DownloadEvent::BatchDone(report) => {
                    if let Some(done) = on_batch_done.take() {
                        done(&report);
                    }
                },
            }
        }
        batch.wait().await
    }
}

async fn coordinate(
    catalog: Arc<ModelCatalog>,
    acquirer: Arc<dyn ModelAcquirer>,
    names: BTreeSet<String>,
    events: mpsc::UnboundedSender<DownloadEvent>,
) -> BatchReport {
    // A closed receiver only means nobody is listening any more
    let send = |event: DownloadEvent| {
        let _ = events.send(event);
    };

    let mut tasks: BTreeMap<String, DownloadTask> = names
        .iter()
        .map(|name| {
            let task = DownloadTask {
                model: name.clone(),
                status: DownloadStatus::Pending,
            };
            (name.clone(), task)
        })
        .collect();

    log::info!("📥 Starting download batch of {} model(s)", tasks.len());

    let mut join_set = JoinSet::new();
    for task in tasks.values_mut() {
        let name = task.model.clone();
        let descriptor = catalog.get(&name).cloned();
        let acquirer = Arc::clone(&acquirer);

        join_set.spawn(async move {
            let result = match descriptor {
                Some(descriptor) => AssertUnwindSafe(acquirer.acquire(&descriptor))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|_| {
                        Err(BgRemovalError::acquisition(
                            &name,
                            "acquisition task panicked",
                        ))
                    }),
                None => Err(BgRemovalError::acquisition(
                    &name,
                    "not in the model catalog",
                )),
            };
            (name, result)
        });

        task.status = DownloadStatus::Running;
        send(DownloadEvent::Started {
            model: task.model.clone(),
        });
    }

    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok((name, result)) => {
                let success = match result {
                    Ok(path) => {
                        log::info!("✅ Downloaded '{name}' to {}", path.display());
                        true
                    },
                    Err(e) => {
                        log::warn!("❌ Download of '{name}' failed: {e}");
                        false
                    },
                };
                if let Some(task) = tasks.get_mut(&name) {
                    task.status = if success {
                        DownloadStatus::Succeeded
                    } else {
                        DownloadStatus::Failed
                    };
                }
                send(DownloadEvent::ItemFinished {
                    model: name,
                    success,
                });
            },
            // Task identity is lost here; the sweep below reports it as failed
            Err(e) => log::error!("Download task ended abnormally: {e}"),
        }
    }

    for task in tasks.values_mut().filter(|t| !t.status.is_finished()) {
        log::warn!("❌ Download of '{}' never reported, marking failed", task.model);
        task.status = DownloadStatus::Failed;
        send(DownloadEvent::ItemFinished {
            model: task.model.clone(),
            success: false,
        });
    }

    let mut report = BatchReport::default();
    for task in tasks.into_values() {
        match task.status {
            DownloadStatus::Succeeded => report.succeeded.push(task.model),
            _ => report.failed.push(task.model),
        }
    }

    log::info!(
        "📦 Download batch finished: {} succeeded, {} failed",
        report.succeeded.len(),
        report.failed.len()
    );
    send(DownloadEvent::BatchDone(report.clone()));
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    fn orchestrator(acquirer: MockAcquirer) -> DownloadOrchestrator {
        DownloadOrchestrator::new(Arc::new(ModelCatalog::builtin()), Arc::new(acquirer))
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_reports_every_item_once() {
        let acquirer = MockAcquirer::new()
            .with_delay("u2net", Duration::from_millis(300))
            .with_delay("silueta", Duration::from_millis(10))
            .failing_on("isnet-anime");
        let orchestrator = orchestrator(acquirer);

        let items = Arc::new(Mutex::new(Vec::new()));
        let done = Arc::new(Mutex::new(0));
        let items_cb = Arc::clone(&items);
        let done_cb = Arc::clone(&done);

        let report = orchestrator
            .run_batch(
                ["u2net", "silueta", "isnet-anime", "u2netp"],
                move |name, success| items_cb.lock().unwrap().push((name.to_string(), success)),
                move |_| *done_cb.lock().unwrap() += 1,
            )
            .await
            .unwrap();

        let items = items.lock().unwrap();
        assert_eq!(items.len(), 4);
        assert_eq!(*done.lock().unwrap(), 1);
        assert!(items.contains(&("isnet-anime".to_string(), false)));
        assert!(items.contains(&("u2net".to_string(), true)));
        // Slowest model completes last
        assert_eq!(items.last().unwrap().0, "u2net");

        assert_eq!(report.succeeded, vec!["silueta", "u2net", "u2netp"]);
        assert_eq!(report.failed, vec!["isnet-anime"]);
        assert_eq!(report.total(), 4);
    }

    #[tokio::test]
    async fn test_panicking_task_does_not_sink_batch() {
        let acquirer = MockAcquirer::new().panicking_on("sam");
        let orchestrator = orchestrator(acquirer);

        let mut batch = orchestrator.request_batch(["sam", "u2netp"]);
        let mut finished = Vec::new();
        let mut batch_done = 0;
        while let Some(event) = batch.next_event().await {
            match event {
                DownloadEvent::ItemFinished { model, success } => finished.push((model, success)),
                DownloadEvent::BatchDone(report) => {
                    batch_done += 1;
                    assert_eq!(report.failed, vec!["sam"]);
                    assert_eq!(report.succeeded, vec!["u2netp"]);
                },
                DownloadEvent::Started { .. } => {},
            }
        }
        assert_eq!(finished.len(), 2);
        assert_eq!(batch_done, 1);
    }

    #[tokio::test]
    async fn test_unknown_and_duplicate_names() {
        let acquirer = MockAcquirer::new();
        let calls = acquirer.calls();
        let orchestrator = orchestrator(acquirer);

        let report = orchestrator
            .request_batch(["u2netp", "u2netp", "not-a-model"])
            .wait()
            .await
            .unwrap();

        assert_eq!(report.succeeded, vec!["u2netp"]);
        assert_eq!(report.failed, vec!["not-a-model"]);
        assert_eq!(*calls.lock().unwrap(), vec!["u2netp".to_string()]);
    }

    #[tokio::test]
    async fn test_empty_batch_still_completes() {
        let orchestrator = orchestrator(MockAcquirer::new());
        let mut done = 0;
        let report = orchestrator
            .run_batch(Vec::<String>::new(), |_, _| panic!("no items expected"), |_| done += 1)
            .await
            .unwrap();
        assert_eq!(done, 1);
        assert_eq!(report.total(), 0);
    }

    #[tokio::test]
    async fn test_events_start_before_finish() {
        let orchestrator = orchestrator(MockAcquirer::new());
        let mut batch = orchestrator.request_batch(["u2netp"]);
        let mut events = Vec::new();
        while let Some(event) = batch.next_event().await {
            events.push(event);
        }
        assert_eq!(
            events,
            vec![
                DownloadEvent::Started {
                    model: "u2netp".to_string()
                },
                DownloadEvent::ItemFinished {
                    model: "u2netp".to_string(),
                    success: true
                },
                DownloadEvent::BatchDone(BatchReport {
                    succeeded: vec!["u2netp".to_string()],
                    failed: Vec::new(),
                }),
            ]
        );
    }
}
