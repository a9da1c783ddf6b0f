//! PDF full-text module
//!
//! - `text`: normalization of raw page text
//! - `processor`: extraction worker with timeout and teardown
//! - `service`: item key to formatted attachment text

mod processor;
mod service;
mod text;

pub use processor::{
    ExtractionError, LopdfExtractor, PdfProcessor, TextExtractor, DEFAULT_EXTRACTION_TIMEOUT_SECS,
};
pub use service::{
    DocumentAccessError, DocumentAccessService, ExtractionStats, ExtractionStatsSnapshot,
    ProcessorGuard,
};
pub use text::{format_pdf_text, page_marker};

#[cfg(test)]
pub(crate) use processor::testing;
