//! Category and label maintenance.
//!
//! Colour decisions (palette assignment and inheritance) are made here
//! with the rules from [`thematic_core::labels`] and
//! [`thematic_core::palette`]; the store only persists the result.

use thematic_core::error::CoreError;
use thematic_core::labels::{
    color_after_recategorize, color_for_new_label, suggest_merges, validate_description,
    validate_name, LabelRef, MergeSuggestion,
};
use thematic_core::palette::{get_next_color, require_valid_color};
use thematic_core::types::DbId;

use crate::error::CurationError;
use crate::models::category::{Category, CategoryRecolor, CreateCategory, UpdateCategory};
use crate::models::label::{CreateLabel, Label, LabelPatch, LabelWithUsage, UpdateLabel};
use crate::models::merge::MergeOutcome;
use crate::store::CurationStore;

// ---------------------------------------------------------------------------
// Categories
// ---------------------------------------------------------------------------

/// First palette colour not used by any category.
pub async fn next_category_color(store: &dyn CurationStore) -> Result<String, CurationError> {
    let used = store.used_category_colors().await?;
    Ok(get_next_color(&used))
}

/// Create a category. Without an explicit colour the next free palette
/// colour is assigned.
pub async fn create_category(
    store: &dyn CurationStore,
    input: &CreateCategory,
) -> Result<Category, CurationError> {
    let name = validate_name("Category", &input.name)?;
    validate_description(input.description.as_deref())?;

    let color = match input.color.as_deref().map(str::trim) {
        Some(color) if !color.is_empty() => {
            require_valid_color(color)?;
            color.to_lowercase()
        }
        _ => next_category_color(store).await?,
    };

    let category = store
        .insert_category(name, input.description.as_deref(), &color)
        .await?;
    tracing::info!(category_id = category.id, name = %category.name, color = %category.color, "Category created");
    Ok(category)
}

pub async fn update_category(
    store: &dyn CurationStore,
    id: DbId,
    input: &UpdateCategory,
) -> Result<Category, CurationError> {
    let name = input
        .name
        .as_deref()
        .map(|n| validate_name("Category", n))
        .transpose()?;
    validate_description(input.description.as_deref())?;

    store
        .update_category(id, name, input.description.as_deref(), input.is_active)
        .await?
        .ok_or_else(|| CurationError::not_found("Category", id))
}

/// Change a category colour. Labels inheriting the old colour follow;
/// `force` recolours every label of the category.
pub async fn recolor_category(
    store: &dyn CurationStore,
    id: DbId,
    color: &str,
    force: bool,
) -> Result<CategoryRecolor, CurationError> {
    require_valid_color(color)?;
    let color = color.to_lowercase();

    let recolor = store
        .recolor_category(id, &color, force)
        .await?
        .ok_or_else(|| CurationError::not_found("Category", id))?;
    tracing::info!(
        category_id = id,
        color = %color,
        force,
        labels_updated = recolor.labels_updated,
        "Category recoloured",
    );
    Ok(recolor)
}

/// Move the labels of `source_ids` into `target_id` and delete the sources.
/// Returns the number of labels moved.
pub async fn merge_categories(
    store: &dyn CurationStore,
    source_ids: &[DbId],
    target_id: DbId,
) -> Result<u64, CurationError> {
    if source_ids.is_empty() {
        return Err(CoreError::Validation("At least one source category is required".to_string()).into());
    }
    if source_ids.contains(&target_id) {
        return Err(CoreError::Validation(format!(
            "Target category {target_id} cannot also be a merge source"
        ))
        .into());
    }

    match store.merge_categories(source_ids, target_id).await? {
        MergeOutcome::Merged(moved) => {
            tracing::info!(?source_ids, target_id, moved, "Categories merged");
            Ok(moved)
        }
        MergeOutcome::Missing(id) => Err(CurationError::not_found("Category", id)),
        MergeOutcome::Colliding(_) => Err(CoreError::Internal(
            "category merge reported colliding annotations".to_string(),
        )
        .into()),
    }
}

/// Delete a category. Its labels become uncategorised.
pub async fn delete_category(store: &dyn CurationStore, id: DbId) -> Result<(), CurationError> {
    if !store.delete_category(id).await? {
        return Err(CurationError::not_found("Category", id));
    }
    tracing::info!(category_id = id, "Category deleted");
    Ok(())
}

// ---------------------------------------------------------------------------
// Labels
// ---------------------------------------------------------------------------

/// Create a label. Without its own colour the label inherits its category's.
pub async fn create_label(
    store: &dyn CurationStore,
    input: &CreateLabel,
) -> Result<Label, CurationError> {
    let name = validate_name("Label", &input.name)?;
    validate_description(input.description.as_deref())?;

    let category_color = match input.category_id {
        Some(category_id) => Some(require_category(store, category_id).await?.color),
        None => None,
    };
    let color = color_for_new_label(input.color.as_deref(), category_color.as_deref())?;

    let label = store
        .insert_label(name, input.description.as_deref(), input.category_id, &color)
        .await?;
    tracing::info!(label_id = label.id, name = %label.name, category_id = ?label.category_id, "Label created");
    Ok(label)
}

/// Rename, describe, recolour, or recategorise a label.
///
/// An empty colour resets the label to its category colour. Moving to
/// another category carries inherited colours along and keeps custom ones.
pub async fn update_label(
    store: &dyn CurationStore,
    id: DbId,
    input: &UpdateLabel,
) -> Result<Label, CurationError> {
    let current = store
        .find_label(id)
        .await?
        .ok_or_else(|| CurationError::not_found("Label", id))?;

    let name = input
        .name
        .as_deref()
        .map(|n| validate_name("Label", n).map(str::to_string))
        .transpose()?;
    validate_description(input.description.as_deref())?;

    let old_category_color = category_color(store, current.category_id).await?;
    let new_category_id = input.category_id.unwrap_or(current.category_id);
    let new_category_color = match input.category_id {
        Some(_) => category_color(store, new_category_id).await?,
        None => old_category_color.clone(),
    };

    let color = match input.color.as_deref() {
        Some(requested) => Some(color_for_new_label(
            Some(requested),
            new_category_color.as_deref(),
        )?),
        None if input.category_id.is_some() => Some(color_after_recategorize(
            &current.color,
            old_category_color.as_deref(),
            new_category_color.as_deref(),
        )),
        None => None,
    };

    let patch = LabelPatch {
        name,
        description: input.description.clone(),
        color,
        category_id: input.category_id,
    };
    let label = store
        .update_label(id, &patch)
        .await?
        .ok_or_else(|| CurationError::not_found("Label", id))?;
    tracing::info!(label_id = id, "Label updated");
    Ok(label)
}

/// Soft-delete (`false`) or restore (`true`) a label.
pub async fn set_label_active(
    store: &dyn CurationStore,
    id: DbId,
    is_active: bool,
) -> Result<(), CurationError> {
    if !store.set_label_active(id, is_active).await? {
        return Err(CurationError::not_found("Label", id));
    }
    tracing::info!(label_id = id, is_active, "Label active flag changed");
    Ok(())
}

pub async fn list_labels(store: &dyn CurationStore) -> Result<Vec<LabelWithUsage>, CurationError> {
    store.list_labels_with_usage().await
}

/// Groups of active labels that look like duplicates of each other.
pub async fn merge_suggestions(
    store: &dyn CurationStore,
) -> Result<Vec<MergeSuggestion>, CurationError> {
    let labels = store.list_labels(false).await?;
    let refs: Vec<LabelRef<'_>> = labels
        .iter()
        .map(|l| LabelRef {
            id: l.id,
            name: &l.name,
            category_id: l.category_id,
        })
        .collect();
    Ok(suggest_merges(&refs))
}

async fn require_category(store: &dyn CurationStore, id: DbId) -> Result<Category, CurationError> {
    store
        .find_category(id)
        .await?
        .ok_or_else(|| CurationError::not_found("Category", id))
}

async fn category_color(
    store: &dyn CurationStore,
    id: Option<DbId>,
) -> Result<Option<String>, CurationError> {
    match id {
        Some(id) => Ok(Some(require_category(store, id).await?.color)),
        None => Ok(None),
    }
}
