//! Label models and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thematic_core::labels::{effective_label_color, has_custom_color};
use thematic_core::types::{DbId, Timestamp};

/// A row from the `labels` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Label {
    pub id: DbId,
    pub name: String,
    pub description: Option<String>,
    pub category_id: Option<DbId>,
    pub color: String,
    pub is_active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A label joined with its category colour and usage count, for listings.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct LabelWithUsage {
    pub id: DbId,
    pub name: String,
    pub description: Option<String>,
    pub category_id: Option<DbId>,
    pub category_name: Option<String>,
    pub category_color: Option<String>,
    pub color: String,
    pub is_active: bool,
    pub annotation_count: i64,
}

impl LabelWithUsage {
    pub fn has_custom_color(&self) -> bool {
        has_custom_color(&self.color, self.category_color.as_deref())
    }

    pub fn effective_color(&self) -> &str {
        effective_label_color(&self.color, self.category_color.as_deref())
    }
}

/// DTO for creating a label.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateLabel {
    pub name: String,
    pub description: Option<String>,
    pub category_id: Option<DbId>,
    /// Empty or absent inherits the category colour.
    pub color: Option<String>,
}

/// DTO for updating a label. `category_id: Some(None)` moves the label to
/// "uncategorised".
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateLabel {
    pub name: Option<String>,
    pub description: Option<String>,
    pub color: Option<String>,
    #[serde(default, deserialize_with = "double_option::deserialize")]
    pub category_id: Option<Option<DbId>>,
}

/// Distinguishes an absent field from an explicit `null`.
mod double_option {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Some)
    }
}

/// Resolved label update handed to the store. Unlike [`UpdateLabel`], the
/// colour has already been decided by the inheritance policy.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub color: Option<String>,
    /// `Some(None)` clears the category.
    pub category_id: Option<Option<DbId>>,
}
