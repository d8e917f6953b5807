//! Category models and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thematic_core::types::{DbId, Timestamp};

/// A row from the `categories` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Category {
    pub id: DbId,
    pub name: String,
    pub description: Option<String>,
    pub color: String,
    pub is_active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating a category. Without a colour the next free palette
/// colour is assigned.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCategory {
    pub name: String,
    pub description: Option<String>,
    pub color: Option<String>,
}

/// DTO for updating a category. Colour changes go through
/// `CategoryRepo::recolor` so labels can follow.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateCategory {
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

/// Result of recolouring a category.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryRecolor {
    pub category: Category,
    /// Labels whose colour followed the category.
    pub labels_updated: u64,
}
