//! Full-text access for library items
//!
//! Resolves an item key to its first PDF attachment, resolves the file, and
//! runs extraction plus formatting on a scoped [`PdfProcessor`]. The
//! processor lives inside a [`ProcessorGuard`], so teardown happens on every
//! exit path: success, failure, and the request future being dropped.

use std::ops::{Deref, DerefMut};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::time::Duration;

use crate::library::{Attachment, HasAttachments, LibraryError, LibrarySource};

use super::processor::{ExtractionError, PdfProcessor, TextExtractor};
use super::text::format_pdf_text;

/// Failures of [`DocumentAccessService::get_full_text`], most specific first
#[derive(Debug, Error)]
pub enum DocumentAccessError {
    #[error("Item '{0}' not found")]
    NotFound(String),

    #[error("No PDF attachment found for item '{0}'")]
    NoAttachment(String),

    #[error("File path not found for PDF attachment of item '{0}'")]
    NoFilePath(String),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Library(#[from] LibraryError),
}

/// Extraction counters
#[derive(Debug, Default)]
pub struct ExtractionStats {
    started: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    terminated: AtomicU64,
}

/// Point-in-time copy of [`ExtractionStats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionStatsSnapshot {
    pub started: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub workers_terminated: u64,
}

impl ExtractionStats {
    pub fn snapshot(&self) -> ExtractionStatsSnapshot {
        ExtractionStatsSnapshot {
            started: self.started.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            workers_terminated: self.terminated.load(Ordering::Relaxed),
        }
    }
}

/// Processor that is terminated when the guard drops
pub struct ProcessorGuard {
    processor: PdfProcessor,
    stats: Arc<ExtractionStats>,
}

impl Deref for ProcessorGuard {
    type Target = PdfProcessor;

    fn deref(&self) -> &PdfProcessor {
        &self.processor
    }
}

impl DerefMut for ProcessorGuard {
    fn deref_mut(&mut self) -> &mut PdfProcessor {
        &mut self.processor
    }
}

impl Drop for ProcessorGuard {
    fn drop(&mut self) {
        if self.processor.terminate() {
            self.stats.terminated.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// High-level PDF content access
#[derive(Clone)]
pub struct DocumentAccessService {
    library: Arc<dyn LibrarySource>,
    extractor: Arc<dyn TextExtractor>,
    timeout: Duration,
    stats: Arc<ExtractionStats>,
}

impl DocumentAccessService {
    pub fn new(
        library: Arc<dyn LibrarySource>,
        extractor: Arc<dyn TextExtractor>,
        timeout: Duration,
    ) -> Self {
        Self {
            library,
            extractor,
            timeout,
            stats: Arc::new(ExtractionStats::default()),
        }
    }

    pub fn stats(&self) -> ExtractionStatsSnapshot {
        self.stats.snapshot()
    }

    /// A fresh processor for one extraction call
    pub fn acquire_processor(&self) -> ProcessorGuard {
        ProcessorGuard {
            processor: PdfProcessor::new(Arc::clone(&self.extractor), self.timeout),
            stats: Arc::clone(&self.stats),
        }
    }

    /// First attachment, in attachment order, whose content type is exactly PDF
    pub async fn find_pdf_attachment(
        &self,
        item: &impl HasAttachments,
    ) -> Result<Option<Attachment>, LibraryError> {
        for id in item.attachment_ids() {
            if let Some(attachment) = self.library.attachment(*id).await? {
                if attachment.is_pdf() {
                    return Ok(Some(attachment));
                }
            }
        }
        Ok(None)
    }

    /// Extracted and normalized text of the item's PDF attachment
    pub async fn get_full_text(&self, item_key: &str) -> Result<String, DocumentAccessError> {
        let item = self
            .library
            .item_by_key(item_key)
            .await?
            .ok_or_else(|| DocumentAccessError::NotFound(item_key.to_string()))?;

        let attachment = self
            .find_pdf_attachment(&item)
            .await?
            .ok_or_else(|| DocumentAccessError::NoAttachment(item_key.to_string()))?;

        let path = self
            .library
            .attachment_file_path(&attachment)
            .await?
            .ok_or_else(|| DocumentAccessError::NoFilePath(item_key.to_string()))?;

        tracing::debug!(
            "Extracting text of {} (attachment {}) from {}",
            item_key,
            attachment.key,
            path.display()
        );
        self.extract_and_format(&path).await
    }

    async fn extract_and_format(&self, path: &Path) -> Result<String, DocumentAccessError> {
        let mut processor = self.acquire_processor();
        self.stats.started.fetch_add(1, Ordering::Relaxed);

        let pages = match processor.extract_text(path).await {
            Ok(pages) => pages,
            Err(e) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                tracing::warn!("Text extraction failed for {}: {}", path.display(), e);
                return Err(e.into());
            }
        };

        let text = format_pdf_text(&pages);
        self.stats.succeeded.fetch_add(1, Ordering::Relaxed);
        Ok(text)
    }
}
