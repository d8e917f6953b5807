use crate::types::DbId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid transition for {entity} {id}: cannot {action} from '{from}'")]
    InvalidTransition {
        entity: &'static str,
        id: DbId,
        from: String,
        action: String,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}
