//! Application state management

use std::sync::Arc;

use crate::library::LibrarySource;
use crate::pdf::DocumentAccessService;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    library: Arc<dyn LibrarySource>,
    documents: DocumentAccessService,
}

impl AppState {
    pub fn new(library: Arc<dyn LibrarySource>, documents: DocumentAccessService) -> Self {
        Self {
            inner: Arc::new(AppStateInner { library, documents }),
        }
    }

    /// Get the library source
    pub fn library(&self) -> &dyn LibrarySource {
        self.inner.library.as_ref()
    }

    /// Get the full-text service
    pub fn documents(&self) -> &DocumentAccessService {
        &self.inner.documents
    }
}
