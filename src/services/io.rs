//! Image I/O operations service
//!
//! Reading never writes, and writing always produces PNG so the alpha channel
//! survives losslessly.

use crate::error::{BgRemovalError, Result};
use image::{DynamicImage, ImageFormat};
use std::path::Path;

/// Service for handling image file input/output operations
pub struct ImageIOService;

impl ImageIOService {
    /// Load and decode an image
    ///
    /// Format detection falls back to content sniffing when the extension is
    /// missing or wrong.
    ///
    /// # Errors
    /// - `InputNotFound` when `path` is not an existing file
    /// - `Decode` when the content is not a readable image
    pub fn load_image<P: AsRef<Path>>(path: P) -> Result<DynamicImage> {
        let path = path.as_ref();
        Self::ensure_input(path)?;

        match image::open(path) {
            Ok(img) => Ok(img),
            Err(e) => {
                log::debug!(
                    "Extension-based loading failed for {}: {e}. Attempting content-based detection.",
                    path.display()
                );
                let data = std::fs::read(path)
                    .map_err(|io_err| BgRemovalError::file_io_error("read image data", path, &io_err))?;
                image::load_from_memory(&data).map_err(|content_err| {
                    BgRemovalError::decode(format!(
                        "{} ({} bytes) is not a readable image: {content_err}",
                        path.display(),
                        data.len()
                    ))
                })
            },
        }
    }

    /// Fail with `InputNotFound` unless `path` is an existing file
    ///
    /// # Errors
    /// - `InputNotFound` when `path` is missing or not a regular file
    pub fn ensure_input<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        if path.is_file() {
            Ok(())
        } else {
            Err(BgRemovalError::InputNotFound(path.to_path_buf()))
        }
    }

    /// Write `image` as PNG, creating the parent directory if needed
    ///
    /// # Errors
    /// - The parent directory cannot be created
    /// - Encoding or writing fails
    pub fn save_png<P: AsRef<Path>>(image: &DynamicImage, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    BgRemovalError::file_io_error("create output directory", parent, &e)
                })?;
            }
        }

        image
            .save_with_format(path, ImageFormat::Png)
            .map_err(|e| match e {
                image::ImageError::IoError(io) => {
                    BgRemovalError::file_io_error("write output image", path, &io)
                },
                other => BgRemovalError::processing(format!(
                    "Failed to encode {} as PNG: {other}",
                    path.display()
                )),
            })
    }

    /// Re-check that a written artifact exists
    ///
    /// # Errors
    /// - `WriteVerification` when `path` is not a non-empty file
    pub fn verify_written<P: AsRef<Path>>(path: P) -> Result<u64> {
        let path = path.as_ref();
        match std::fs::metadata(path) {
            Ok(meta) if meta.is_file() && meta.len() > 0 => Ok(meta.len()),
            _ => Err(BgRemovalError::WriteVerification(path.to_path_buf())),
        }
    }
}
