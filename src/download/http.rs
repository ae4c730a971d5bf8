//! HTTP acquisition of model artifacts
//!
//! The response body is streamed into a temporary file inside the models directory
//! and renamed into place only after the last byte is written, so a scan never
//! sees a partial artifact.

use super::ModelAcquirer;
use crate::catalog::ModelDescriptor;
use crate::config::ManagerConfig;
use crate::error::{BgRemovalError, Result};
use async_trait::async_trait;
use futures_util::stream::TryStreamExt;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio_util::io::StreamReader;

/// Downloads model artifacts from their catalog URL
#[derive(Debug, Clone)]
pub struct HttpModelDownloader {
    client: Client,
    models_dir: PathBuf,
}

impl HttpModelDownloader {
    /// Create a downloader writing into `models_dir`
    ///
    /// # Errors
    /// - Failed to create HTTP client
    pub fn new<P: Into<PathBuf>>(models_dir: P, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BgRemovalError::network_error("Failed to create HTTP client", e))?;

        Ok(Self {
            client,
            models_dir: models_dir.into(),
        })
    }

    /// # Errors
    /// - Failed to create HTTP client
    pub fn from_config(config: &ManagerConfig) -> Result<Self> {
        Self::new(&config.models_dir, config.download_timeout())
    }

    #[must_use]
    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    fn existing_artifact(&self, descriptor: &ModelDescriptor) -> Option<PathBuf> {
        descriptor
            .artifact_candidates(&self.models_dir)
            .into_iter()
            .find(|path| path.is_file())
    }

    /// Stream `url` into `target` through a temporary file
    async fn download_file(&self, url: &str, target: &Path) -> Result<u64> {
        std::fs::create_dir_all(&self.models_dir).map_err(|e| {
            BgRemovalError::file_io_error("create models directory", &self.models_dir, &e)
        })?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| BgRemovalError::network_error(format!("Failed to download {url}"), e))?;

        if !response.status().is_success() {
            return Err(BgRemovalError::network_error(
                format!("HTTP error {} for {url}", response.status()),
                std::io::Error::new(std::io::ErrorKind::Other, "HTTP error"),
            ));
        }

        let total_size = response.content_length();

        let temp = tempfile::Builder::new()
            .prefix(".download-")
            .suffix(".part")
            .tempfile_in(&self.models_dir)
            .map_err(|e| BgRemovalError::file_io_error("create temporary file", &self.models_dir, &e))?;
        let temp_file = temp
            .reopen()
            .map_err(|e| BgRemovalError::file_io_error("open temporary file", temp.path(), &e))?;
        let mut file = tokio::fs::File::from_std(temp_file);

        let mut stream = StreamReader::new(
            response
                .bytes_stream()
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e)),
        );

        let downloaded = tokio::io::copy(&mut stream, &mut file)
            .await
            .map_err(|e| BgRemovalError::network_error("Failed to read download stream", e))?;

        file.flush()
            .await
            .map_err(|e| BgRemovalError::file_io_error("flush file", temp.path(), &e))?;
        file.sync_all()
            .await
            .map_err(|e| BgRemovalError::file_io_error("sync file", temp.path(), &e))?;
        drop(file);

        if let Some(expected) = total_size {
            if downloaded != expected {
                return Err(BgRemovalError::network_error(
                    format!("Incomplete download of {url}"),
                    std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        format!("received {downloaded} of {expected} bytes"),
                    ),
                ));
            }
        }

        temp.persist(target)
            .map_err(|e| BgRemovalError::file_io_error("move download into place", target, &e.error))?;

        Ok(downloaded)
    }
}

#[async_trait]
impl ModelAcquirer for HttpModelDownloader {
    async fn acquire(&self, descriptor: &ModelDescriptor) -> Result<PathBuf> {
        if let Some(existing) = self.existing_artifact(descriptor) {
            log::debug!(
                "'{}' already present at {}",
                descriptor.name,
                existing.display()
            );
            return Ok(existing);
        }

        if descriptor.url.is_empty() {
            return Err(BgRemovalError::acquisition(
                descriptor.name,
                "no download source configured",
            ));
        }

        let target = self.models_dir.join(descriptor.artifact_file_name());
        log::info!(
            "⬇️ Downloading '{}' (~{} MB) from {}",
            descriptor.name,
            descriptor.size_mb(),
            descriptor.url
        );

        let bytes = self
            .download_file(descriptor.url, &target)
            .await
            .map_err(|e| BgRemovalError::acquisition(descriptor.name, e.to_string()))?;

        log::debug!("Wrote {bytes} bytes to {}", target.display());
        Ok(target)
    }
}
