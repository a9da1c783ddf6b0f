//! PDF text extraction worker
//!
//! Each [`PdfProcessor`] runs extraction on its own dedicated thread so a slow
//! or crashing document cannot stall the async runtime or other requests.
//! The caller waits for the worker with a timeout; [`PdfProcessor::terminate`]
//! releases the worker whether or not it is still running.
//!
//! lopdf cannot be interrupted mid-page, so a terminated worker that is still
//! busy is signalled through its cancellation flag and detached. It stops at
//! the next page boundary and its result is discarded.

use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use thiserror::Error;
use tokio::sync::oneshot;
use tokio::time::{timeout, Duration};

/// Default time a worker gets to extract a whole document
pub const DEFAULT_EXTRACTION_TIMEOUT_SECS: u64 = 60;

/// Text extraction errors
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Failed to read {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid PDF document: {0}")]
    InvalidDocument(String),

    #[error("Extraction worker crashed: {0}")]
    WorkerCrashed(String),

    #[error("Extraction timed out after {0:?}")]
    Timeout(Duration),

    #[error("Extraction cancelled")]
    Cancelled,

    #[error("Processor already terminated")]
    Terminated,
}

/// Engine turning a document into per-page raw text
///
/// Runs on the worker thread. Implementations should check `cancel` between
/// pages and return [`ExtractionError::Cancelled`] once it is set.
pub trait TextExtractor: Send + Sync + 'static {
    fn extract_pages(&self, path: &Path, cancel: &AtomicBool) -> Result<Vec<String>, ExtractionError>;
}

/// lopdf-based extractor, one string per page in page order
#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfExtractor;

impl TextExtractor for LopdfExtractor {
    fn extract_pages(&self, path: &Path, cancel: &AtomicBool) -> Result<Vec<String>, ExtractionError> {
        let metadata = std::fs::metadata(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ExtractionError::FileNotFound(path.to_path_buf())
            } else {
                ExtractionError::Unreadable {
                    path: path.to_path_buf(),
                    source: e,
                }
            }
        })?;
        if !metadata.is_file() {
            return Err(ExtractionError::FileNotFound(path.to_path_buf()));
        }

        let document = lopdf::Document::load(path)
            .map_err(|e| ExtractionError::InvalidDocument(e.to_string()))?;

        let page_numbers: Vec<u32> = document.get_pages().keys().copied().collect();
        let mut pages = Vec::with_capacity(page_numbers.len());
        for page_number in page_numbers {
            if cancel.load(Ordering::Relaxed) {
                return Err(ExtractionError::Cancelled);
            }
            // One bad page (odd font encoding, broken stream) should not cost the document
            match document.extract_text(&[page_number]) {
                Ok(text) => pages.push(text),
                Err(e) => {
                    tracing::warn!(
                        "Failed to extract page {} of {}: {}",
                        page_number,
                        path.display(),
                        e
                    );
                    pages.push(String::new());
                }
            }
        }

        tracing::debug!("Extracted {} pages from {}", pages.len(), path.display());
        Ok(pages)
    }
}

struct Worker {
    handle: thread::JoinHandle<()>,
    cancel: Arc<AtomicBool>,
}

/// Owns at most one extraction worker
///
/// Scoped to a single logical extraction call and never shared.
pub struct PdfProcessor {
    extractor: Arc<dyn TextExtractor>,
    timeout: Duration,
    worker: Option<Worker>,
    terminated: bool,
}

impl PdfProcessor {
    pub fn new(extractor: Arc<dyn TextExtractor>, timeout: Duration) -> Self {
        Self {
            extractor,
            timeout,
            worker: None,
            terminated: false,
        }
    }

    /// Extract raw per-page text from `path` on a fresh worker thread
    pub async fn extract_text(&mut self, path: &Path) -> Result<Vec<String>, ExtractionError> {
        if self.terminated {
            return Err(ExtractionError::Terminated);
        }
        self.release_worker();

        let (tx, rx) = oneshot::channel();
        let cancel = Arc::new(AtomicBool::new(false));
        let extractor = Arc::clone(&self.extractor);
        let worker_path = path.to_path_buf();
        let worker_cancel = Arc::clone(&cancel);

        let handle = thread::Builder::new()
            .name("pdf-extract".to_string())
            .spawn(move || {
                let result = panic::catch_unwind(AssertUnwindSafe(|| {
                    extractor.extract_pages(&worker_path, &worker_cancel)
                }))
                .unwrap_or_else(|payload| Err(ExtractionError::WorkerCrashed(panic_message(&*payload))));
                // Receiver is gone when the caller timed out or was cancelled
                let _ = tx.send(result);
            })
            .map_err(|e| ExtractionError::WorkerCrashed(format!("failed to spawn worker: {}", e)))?;

        self.worker = Some(Worker { handle, cancel });

        match timeout(self.timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(ExtractionError::WorkerCrashed(
                "worker exited without a result".to_string(),
            )),
            Err(_) => {
                tracing::warn!(
                    "Extraction of {} exceeded {:?}",
                    path.display(),
                    self.timeout
                );
                Err(ExtractionError::Timeout(self.timeout))
            }
        }
    }

    /// Release the worker; returns `true` only for the first call
    pub fn terminate(&mut self) -> bool {
        if self.terminated {
            return false;
        }
        self.terminated = true;
        self.release_worker();
        true
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    fn release_worker(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        worker.cancel.store(true, Ordering::Relaxed);
        if worker.handle.is_finished() {
            if worker.handle.join().is_err() {
                tracing::warn!("Extraction worker ended with a panic");
            }
        } else {
            tracing::debug!("Detaching busy extraction worker");
        }
    }
}

impl Drop for PdfProcessor {
    fn drop(&mut self) {
        self.terminate();
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Extractor returning canned pages, or failing in a chosen way
    pub enum FakeExtractor {
        Pages(Vec<String>),
        Fail,
        Panic,
        Hang(Duration),
    }

    impl FakeExtractor {
        pub fn pages(pages: &[&str]) -> Arc<Self> {
            Arc::new(Self::Pages(pages.iter().map(|p| p.to_string()).collect()))
        }
    }

    impl TextExtractor for FakeExtractor {
        fn extract_pages(&self, path: &Path, cancel: &AtomicBool) -> Result<Vec<String>, ExtractionError> {
            match self {
                Self::Pages(pages) => Ok(pages.clone()),
                Self::Fail => Err(ExtractionError::InvalidDocument(format!(
                    "{} is not a PDF",
                    path.display()
                ))),
                Self::Panic => panic!("extractor blew up"),
                Self::Hang(duration) => {
                    let deadline = std::time::Instant::now() + *duration;
                    while std::time::Instant::now() < deadline {
                        if cancel.load(Ordering::Relaxed) {
                            return Err(ExtractionError::Cancelled);
                        }
                        thread::sleep(Duration::from_millis(5));
                    }
                    Ok(Vec::new())
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::FakeExtractor;
    use super::*;

    fn processor(extractor: Arc<dyn TextExtractor>) -> PdfProcessor {
        PdfProcessor::new(extractor, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_extracts_pages_in_order() {
        let mut processor = processor(FakeExtractor::pages(&["one", "two"]));
        let pages = processor.extract_text(Path::new("/tmp/a.pdf")).await.unwrap();
        assert_eq!(pages, vec!["one", "two"]);
        assert!(processor.terminate());
    }

    #[tokio::test]
    async fn test_extractor_failure_propagates() {
        let mut processor = processor(Arc::new(FakeExtractor::Fail));
        let result = processor.extract_text(Path::new("/tmp/a.pdf")).await;
        assert!(matches!(result, Err(ExtractionError::InvalidDocument(_))));
    }

    #[tokio::test]
    async fn test_worker_panic_is_contained() {
        let mut processor = processor(Arc::new(FakeExtractor::Panic));
        let result = processor.extract_text(Path::new("/tmp/a.pdf")).await;
        match result {
            Err(ExtractionError::WorkerCrashed(message)) => {
                assert!(message.contains("extractor blew up"))
            }
            other => panic!("expected crash, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_timeout_detaches_worker() {
        let mut processor = PdfProcessor::new(
            Arc::new(FakeExtractor::Hang(Duration::from_secs(10))),
            Duration::from_millis(50),
        );
        let err = processor.extract_text(Path::new("/tmp/a.pdf")).await.unwrap_err();
        assert!(matches!(err, ExtractionError::Timeout(d) if d == Duration::from_millis(50)));
        assert_eq!(err.to_string(), "Extraction timed out after 50ms");
        assert!(processor.terminate());
    }

    #[tokio::test]
    async fn test_terminate_is_idempotent() {
        let mut processor = processor(FakeExtractor::pages(&[]));
        assert!(processor.terminate());
        assert!(!processor.terminate());
        assert!(processor.is_terminated());

        let result = processor.extract_text(Path::new("/tmp/a.pdf")).await;
        assert!(matches!(result, Err(ExtractionError::Terminated)));
    }

    #[test]
    fn test_lopdf_missing_file() {
        let cancel = AtomicBool::new(false);
        let result = LopdfExtractor.extract_pages(Path::new("/definitely/not/here.pdf"), &cancel);
        assert!(matches!(result, Err(ExtractionError::FileNotFound(_))));
    }

    #[test]
    fn test_lopdf_rejects_non_pdf() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, b"this is not a pdf").unwrap();

        let cancel = AtomicBool::new(false);
        let result = LopdfExtractor.extract_pages(file.path(), &cancel);
        assert!(matches!(result, Err(ExtractionError::InvalidDocument(_))));
    }

    #[test]
    fn test_lopdf_directory_is_not_a_document() {
        let dir = tempfile::tempdir().unwrap();
        let cancel = AtomicBool::new(false);
        let result = LopdfExtractor.extract_pages(dir.path(), &cancel);
        assert!(matches!(result, Err(ExtractionError::FileNotFound(_))));
    }
}
