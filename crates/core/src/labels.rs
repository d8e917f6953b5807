//! Label and category policy: name rules, colour inheritance, and duplicate
//! detection for merge suggestions.
//!
//! A label without a colour of its own shows its category's colour. A label
//! counts as having a custom colour when it differs from its category's, and
//! keeps that colour when the category is recoloured. Uncategorised labels
//! fall back to [`NEUTRAL_GRAY`].

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::CoreError;
use crate::palette::{require_valid_color, NEUTRAL_GRAY};
use crate::types::DbId;

/// Maximum length for label and category names.
pub const MAX_NAME_LENGTH: usize = 100;

/// Maximum length for label and category descriptions.
pub const MAX_DESCRIPTION_LENGTH: usize = 1_000;

/* --------------------------------------------------------------------------
Names
-------------------------------------------------------------------------- */

/// Validate a label or category name. Returns the trimmed name.
pub fn validate_name<'a>(kind: &str, name: &'a str) -> Result<&'a str, CoreError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation(format!("{kind} name must not be empty")));
    }
    if trimmed.chars().count() > MAX_NAME_LENGTH {
        return Err(CoreError::Validation(format!(
            "{kind} name must be at most {MAX_NAME_LENGTH} characters"
        )));
    }
    Ok(trimmed)
}

pub fn validate_description(description: Option<&str>) -> Result<(), CoreError> {
    match description {
        Some(d) if d.chars().count() > MAX_DESCRIPTION_LENGTH => Err(CoreError::Validation(
            format!("Description must be at most {MAX_DESCRIPTION_LENGTH} characters"),
        )),
        _ => Ok(()),
    }
}

/// Key used to spot near-duplicate label names: lower-cased with spaces,
/// hyphens and underscores removed.
pub fn normalize_label_name(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '_'))
        .collect()
}

/* --------------------------------------------------------------------------
Colour inheritance
-------------------------------------------------------------------------- */

/// Whether the label's colour was set independently of its category.
///
/// Uncategorised labels always count as custom.
pub fn has_custom_color(label_color: &str, category_color: Option<&str>) -> bool {
    match category_color {
        None => true,
        Some(cat) => !label_color.eq_ignore_ascii_case(cat),
    }
}

/// Colour shown for a label.
pub fn effective_label_color<'a>(label_color: &'a str, category_color: Option<&'a str>) -> &'a str {
    match category_color {
        Some(cat) if !has_custom_color(label_color, Some(cat)) => cat,
        _ => label_color,
    }
}

/// Colour stored for a newly created label. An absent, empty, or neutral
/// request inherits the category colour.
pub fn color_for_new_label(
    requested: Option<&str>,
    category_color: Option<&str>,
) -> Result<String, CoreError> {
    match requested.map(str::trim) {
        Some(color) if !color.is_empty() && !color.eq_ignore_ascii_case(NEUTRAL_GRAY) => {
            require_valid_color(color)?;
            Ok(color.to_lowercase())
        }
        _ => Ok(category_color.unwrap_or(NEUTRAL_GRAY).to_lowercase()),
    }
}

/// Colour a label should carry after moving between categories. Inherited
/// colours follow the new category; custom colours are kept.
pub fn color_after_recategorize(
    current: &str,
    old_category_color: Option<&str>,
    new_category_color: Option<&str>,
) -> String {
    let inherited = match old_category_color {
        Some(old) => !has_custom_color(current, Some(old)),
        None => current.eq_ignore_ascii_case(NEUTRAL_GRAY),
    };
    if inherited {
        new_category_color.unwrap_or(NEUTRAL_GRAY).to_lowercase()
    } else {
        current.to_string()
    }
}

/// Labels that must be recoloured when their category changes from
/// `old_category_color`. With `force`, every label follows the category.
pub fn labels_following_category<'a, I>(old_category_color: &str, labels: I, force: bool) -> Vec<DbId>
where
    I: IntoIterator<Item = (DbId, &'a str)>,
{
    labels
        .into_iter()
        .filter(|(_, color)| force || !has_custom_color(color, Some(old_category_color)))
        .map(|(id, _)| id)
        .collect()
}

/* --------------------------------------------------------------------------
Merge suggestions
-------------------------------------------------------------------------- */

/// Minimal view of a label needed to suggest merges.
#[derive(Debug, Clone, Copy)]
pub struct LabelRef<'a> {
    pub id: DbId,
    pub name: &'a str,
    pub category_id: Option<DbId>,
}

/// A group of labels in one category whose names normalise to the same key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeSuggestion {
    pub category_id: Option<DbId>,
    pub normalized_name: String,
    /// Ordered by id; the first entry is the natural merge target.
    pub label_ids: Vec<DbId>,
}

/// Group near-duplicate labels within each category. Only groups with two
/// or more labels are returned, ordered by category then key.
pub fn suggest_merges(labels: &[LabelRef<'_>]) -> Vec<MergeSuggestion> {
    let mut groups: BTreeMap<(Option<DbId>, String), Vec<DbId>> = BTreeMap::new();
    for label in labels {
        groups
            .entry((label.category_id, normalize_label_name(label.name)))
            .or_default()
            .push(label.id);
    }

    groups
        .into_iter()
        .filter(|(_, ids)| ids.len() > 1)
        .map(|((category_id, normalized_name), mut label_ids)| {
            label_ids.sort_unstable();
            MergeSuggestion {
                category_id,
                normalized_name,
                label_ids,
            }
        })
        .collect()
}
