use std::sync::Arc;

use thematic_core::classifier::QuestionClassifier;
use thematic_db::CurationStore;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheap to clone: the store and config sit behind `Arc`, the classifier is
/// `Copy`.
#[derive(Clone)]
pub struct AppState {
    /// Persistence handle. `PgStore` in production, `MemoryStore` in tests.
    pub store: Arc<dyn CurationStore>,
    pub classifier: QuestionClassifier,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(store: Arc<dyn CurationStore>, config: ServerConfig) -> Self {
        Self {
            store,
            classifier: QuestionClassifier::default(),
            config: Arc::new(config),
        }
    }

    /// The store as the trait object the curation services take.
    pub fn store(&self) -> &dyn CurationStore {
        self.store.as_ref()
    }
}
