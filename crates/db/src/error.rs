use thematic_core::error::CoreError;

/// Error returned by curation services and stores.
///
/// Domain failures (missing references, illegal transitions, validation)
/// arrive as [`CoreError`]; anything the database reports is passed through
/// untouched so callers can inspect constraint names.
#[derive(Debug, thiserror::Error)]
pub enum CurationError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl CurationError {
    pub fn not_found(entity: &'static str, id: thematic_core::types::DbId) -> Self {
        CurationError::Core(CoreError::NotFound { entity, id })
    }
}
