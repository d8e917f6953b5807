//! In-process [`CurationStore`] with the same semantics as [`PgStore`].
//!
//! Every write works on a copy of the state and swaps it in only when the
//! whole operation succeeded, so a failing write leaves nothing behind.
//! [`FaultPoint`] fails a write half way through to exercise that.
//!
//! [`PgStore`]: crate::PgStore

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use thematic_core::annotation::{ActionType, AnnotationStatus};
use thematic_core::error::CoreError;
use thematic_core::labels::{has_custom_color, labels_following_category};
use thematic_core::palette::NEUTRAL_GRAY;
use thematic_core::types::DbId;
use tokio::sync::Mutex;

use crate::error::CurationError;
use crate::models::annotation_action::{AnnotationAction, NewAnnotationAction};
use crate::models::category::{Category, CategoryRecolor};
use crate::models::cell_annotation::{
    CellAnnotation, EditUpdate, EditedAnnotation, InsertOutcome, NewCellAnnotation,
    ReviewCounts, ReviewUpdate,
};
use crate::models::label::{Label, LabelPatch, LabelWithUsage};
use crate::models::merge::MergeOutcome;
use crate::models::text_cell::{CellClassification, ClassificationStats, CreateTextCell, TextCell};
use crate::store::CurationStore;

/// Where an injected failure interrupts a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultPoint {
    /// Label merge and reassignment fail after annotations were repointed.
    AfterRepoint,
    /// A classification batch fails after its first cell was written.
    AfterFirstClassification,
}

#[derive(Debug, Clone, Default)]
struct State {
    last_id: DbId,
    cells: BTreeMap<DbId, TextCell>,
    categories: BTreeMap<DbId, Category>,
    labels: BTreeMap<DbId, Label>,
    annotations: BTreeMap<DbId, CellAnnotation>,
    actions: Vec<AnnotationAction>,
}

#[derive(Debug, Default)]
struct Inner {
    state: State,
    fault: Option<FaultPoint>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every write that reaches `point` until [`Self::clear_fault`].
    pub async fn inject_fault(&self, point: FaultPoint) {
        self.inner.lock().await.fault = Some(point);
    }

    pub async fn clear_fault(&self) {
        self.inner.lock().await.fault = None;
    }

    /// Seed a text cell. Ingestion lives outside the curation services.
    pub async fn insert_cell(&self, input: CreateTextCell) -> Result<TextCell, CurationError> {
        self.write(move |state, _| {
            let now = Utc::now();
            let cell = TextCell {
                id: state.next_id(),
                document_id: input.document_id,
                sheet_name: input.sheet_name,
                row_index: input.row_index,
                column_index: input.column_index,
                column_name: input.column_name,
                text_content: input.text_content,
                question_type: None,
                classification_confidence: None,
                is_annotatable: None,
                created_at: now,
                updated_at: now,
            };
            state.cells.insert(cell.id, cell.clone());
            Ok(cell)
        })
        .await
    }

    async fn read<T>(&self, f: impl FnOnce(&State) -> T) -> T {
        let inner = self.inner.lock().await;
        f(&inner.state)
    }

    async fn write<T, F>(&self, f: F) -> Result<T, CurationError>
    where
        F: FnOnce(&mut State, Option<FaultPoint>) -> Result<T, CurationError>,
    {
        let mut inner = self.inner.lock().await;
        let mut working = inner.state.clone();
        let out = f(&mut working, inner.fault)?;
        inner.state = working;
        Ok(out)
    }
}

fn injected(point: FaultPoint) -> CurationError {
    CoreError::Internal(format!("injected fault at {point:?}")).into()
}

// ---------------------------------------------------------------------------
// State helpers
// ---------------------------------------------------------------------------

impl State {
    fn next_id(&mut self) -> DbId {
        self.last_id += 1;
        self.last_id
    }

    fn in_document(&self, text_cell_id: DbId, document_id: Option<DbId>) -> bool {
        match document_id {
            None => true,
            Some(doc) => self
                .cells
                .get(&text_cell_id)
                .is_some_and(|cell| cell.document_id == doc),
        }
    }

    fn record(&mut self, action: NewAnnotationAction) {
        let id = self.next_id();
        self.actions.push(AnnotationAction {
            id,
            annotation_id: action.annotation_id,
            text_cell_id: action.text_cell_id,
            label_id: action.label_id,
            action_type: action.action_type.as_str().to_string(),
            from_status: action.from_status,
            to_status: action.to_status,
            performed_by: action.performed_by,
            target_user_id: action.target_user_id,
            notes: action.notes,
            was_ai_generated: action.was_ai_generated,
            ai_confidence: action.ai_confidence,
            ai_model: action.ai_model,
            ai_provider: action.ai_provider,
            created_at: Utc::now(),
        });
    }

    /// Remove an annotation; audit rows keep their cell but lose the link.
    fn remove_annotation(&mut self, id: DbId) -> Option<CellAnnotation> {
        let removed = self.annotations.remove(&id)?;
        for action in &mut self.actions {
            if action.annotation_id == Some(id) {
                action.annotation_id = None;
            }
        }
        Some(removed)
    }

    fn remove_label(&mut self, id: DbId) {
        self.labels.remove(&id);
        for action in &mut self.actions {
            if action.label_id == Some(id) {
                action.label_id = None;
            }
        }
    }

    fn ensure_unique_label_name(&self, name: &str, except: Option<DbId>) -> Result<(), CurationError> {
        if self
            .labels
            .values()
            .any(|l| l.name == name && Some(l.id) != except)
        {
            return Err(CoreError::Conflict(format!("Label '{name}' already exists")).into());
        }
        Ok(())
    }

    fn ensure_unique_category_name(
        &self,
        name: &str,
        except: Option<DbId>,
    ) -> Result<(), CurationError> {
        if self
            .categories
            .values()
            .any(|c| c.name == name && Some(c.id) != except)
        {
            return Err(CoreError::Conflict(format!("Category '{name}' already exists")).into());
        }
        Ok(())
    }

    fn pending_for(&self, text_cell_id: DbId, label_id: DbId) -> Option<&CellAnnotation> {
        self.annotations.values().find(|a| {
            a.text_cell_id == text_cell_id
                && a.label_id == label_id
                && a.status == AnnotationStatus::PendingReview.as_str()
        })
    }

    fn insert_annotation_row(
        &mut self,
        new: &NewCellAnnotation,
        reviewed_by: Option<DbId>,
    ) -> Result<CellAnnotation, CurationError> {
        if !self.cells.contains_key(&new.text_cell_id) {
            return Err(CurationError::not_found("TextCell", new.text_cell_id));
        }
        if !self.labels.contains_key(&new.label_id) {
            return Err(CurationError::not_found("Label", new.label_id));
        }
        let is_human_active = new.status == AnnotationStatus::Active && !new.is_ai_generated;
        if is_human_active
            && self.annotations.values().any(|a| {
                a.text_cell_id == new.text_cell_id
                    && a.label_id == new.label_id
                    && a.created_by == new.created_by
                    && a.status == AnnotationStatus::Active.as_str()
                    && !a.is_ai_generated
            })
        {
            return Err(CoreError::Conflict(format!(
                "Label {} is already attached to text cell {} by this user",
                new.label_id, new.text_cell_id
            ))
            .into());
        }

        let now = Utc::now();
        let row = CellAnnotation {
            id: self.next_id(),
            text_cell_id: new.text_cell_id,
            label_id: new.label_id,
            created_by: new.created_by,
            is_ai_generated: new.is_ai_generated,
            ai_confidence: new.ai_confidence,
            ai_model: new.ai_model.clone(),
            ai_provider: new.ai_provider.clone(),
            status: new.status.as_str().to_string(),
            reviewed_by,
            reviewed_at: reviewed_by.map(|_| now),
            created_at: now,
            updated_at: now,
        };
        self.annotations.insert(row.id, row.clone());
        Ok(row)
    }

    /// Set a review outcome on a row currently in `expected`. Returns the row
    /// before and after the change.
    fn review(
        &mut self,
        id: DbId,
        expected: AnnotationStatus,
        new_status: AnnotationStatus,
        reviewer_id: DbId,
    ) -> Option<(CellAnnotation, CellAnnotation)> {
        let row = self
            .annotations
            .get_mut(&id)
            .filter(|a| a.status == expected.as_str())?;
        let before = row.clone();
        let now = Utc::now();
        row.status = new_status.as_str().to_string();
        row.reviewed_by = Some(reviewer_id);
        row.reviewed_at = Some(now);
        row.updated_at = now;
        Some((before, row.clone()))
    }

    /// First id among the target and sources with no label, target first.
    fn first_missing_label(&self, source_ids: &[DbId], target_id: DbId) -> Option<DbId> {
        std::iter::once(&target_id)
            .chain(source_ids)
            .find(|id| !self.labels.contains_key(id))
            .copied()
    }

    /// Cells where moving `source_ids` onto `target_id` would leave two
    /// pending proposals, or two active annotations by one author, with the
    /// same label. Sorted and deduplicated.
    fn colliding_cells(&self, source_ids: &[DbId], target_id: DbId) -> Vec<DbId> {
        let mut slots: HashMap<(DbId, Option<DbId>), usize> = HashMap::new();
        for annotation in self
            .annotations
            .values()
            .filter(|a| a.label_id == target_id || source_ids.contains(&a.label_id))
        {
            let slot = if annotation.status == AnnotationStatus::PendingReview.as_str() {
                (annotation.text_cell_id, None)
            } else if annotation.status == AnnotationStatus::Active.as_str()
                && !annotation.is_ai_generated
                && annotation.created_by.is_some()
            {
                (annotation.text_cell_id, annotation.created_by)
            } else {
                continue;
            };
            *slots.entry(slot).or_default() += 1;
        }

        let cells: BTreeSet<DbId> = slots
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|((cell_id, _), _)| cell_id)
            .collect();
        cells.into_iter().collect()
    }

    /// Move annotations from `source_ids` onto `target_id`, writing a
    /// `merge` audit row for each. Callers check [`State::colliding_cells`]
    /// first.
    fn repoint(&mut self, source_ids: &[DbId], target_id: DbId, performed_by: Option<DbId>) -> u64 {
        let moving: Vec<CellAnnotation> = self
            .annotations
            .values()
            .filter(|a| source_ids.contains(&a.label_id))
            .cloned()
            .collect();
        for annotation in &moving {
            let mut action = NewAnnotationAction::for_annotation(
                annotation,
                ActionType::Merge,
                performed_by,
                Some(annotation.status.as_str()),
            )
            .with_notes(Some(format!("merged from label {}", annotation.label_id)));
            action.label_id = Some(target_id);
            self.record(action);
        }

        let now = Utc::now();
        let mut repointed = 0;
        for annotation in self.annotations.values_mut() {
            if source_ids.contains(&annotation.label_id) {
                annotation.label_id = target_id;
                annotation.updated_at = now;
                repointed += 1;
            }
        }
        repointed
    }
}

fn by_position(a: &TextCell, b: &TextCell) -> std::cmp::Ordering {
    (a.document_id, a.row_index, a.column_index, a.id).cmp(&(
        b.document_id,
        b.row_index,
        b.column_index,
        b.id,
    ))
}

// ---------------------------------------------------------------------------
// CurationStore
// ---------------------------------------------------------------------------

#[async_trait]
impl CurationStore for MemoryStore {
    async fn health_check(&self) -> Result<(), CurationError> {
        Ok(())
    }

    // --- text cells --------------------------------------------------------

    async fn find_cell(&self, id: DbId) -> Result<Option<TextCell>, CurationError> {
        Ok(self.read(|s| s.cells.get(&id).cloned()).await)
    }

    async fn list_cells(
        &self,
        document_id: Option<DbId>,
        only_unclassified: bool,
    ) -> Result<Vec<TextCell>, CurationError> {
        let mut cells = self
            .read(|s| {
                s.cells
                    .values()
                    .filter(|c| document_id.is_none_or(|doc| c.document_id == doc))
                    .filter(|c| !only_unclassified || !c.is_classified())
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .await;
        cells.sort_by(by_position);
        Ok(cells)
    }

    async fn update_cell_classifications(
        &self,
        batch: &[CellClassification],
    ) -> Result<u64, CurationError> {
        self.write(|state, fault| {
            let now = Utc::now();
            let mut updated = 0;
            for (i, item) in batch.iter().enumerate() {
                if let Some(cell) = state.cells.get_mut(&item.text_cell_id) {
                    cell.question_type = Some(item.question_type.as_str().to_string());
                    cell.classification_confidence = Some(item.confidence);
                    cell.is_annotatable = Some(item.is_annotatable);
                    cell.updated_at = now;
                    updated += 1;
                }
                if i == 0 && fault == Some(FaultPoint::AfterFirstClassification) {
                    return Err(injected(FaultPoint::AfterFirstClassification));
                }
            }
            Ok(updated)
        })
        .await
    }

    async fn list_annotatable_cells(
        &self,
        document_id: Option<DbId>,
        min_confidence: f64,
    ) -> Result<Vec<TextCell>, CurationError> {
        let mut cells = self
            .read(|s| {
                s.cells
                    .values()
                    .filter(|c| document_id.is_none_or(|doc| c.document_id == doc))
                    .filter(|c| c.is_annotatable != Some(false))
                    .filter(|c| {
                        c.classification_confidence
                            .is_none_or(|conf| conf >= min_confidence)
                    })
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .await;
        cells.sort_by(by_position);
        Ok(cells)
    }

    async fn classification_stats(
        &self,
        document_id: Option<DbId>,
    ) -> Result<ClassificationStats, CurationError> {
        Ok(self
            .read(|s| {
                let mut stats = ClassificationStats::default();
                for cell in s
                    .cells
                    .values()
                    .filter(|c| document_id.is_none_or(|doc| c.document_id == doc))
                {
                    stats.total_cells += 1;
                    match cell.is_annotatable {
                        Some(true) => stats.annotatable += 1,
                        Some(false) => stats.non_annotatable += 1,
                        None => {}
                    }
                    match &cell.question_type {
                        Some(question_type) => {
                            *stats.by_type.entry(question_type.clone()).or_default() += 1;
                        }
                        None => stats.not_classified += 1,
                    }
                }
                stats
            })
            .await)
    }

    // --- categories --------------------------------------------------------

    async fn find_category(&self, id: DbId) -> Result<Option<Category>, CurationError> {
        Ok(self.read(|s| s.categories.get(&id).cloned()).await)
    }

    async fn list_categories(&self, include_inactive: bool) -> Result<Vec<Category>, CurationError> {
        let mut categories = self
            .read(|s| {
                s.categories
                    .values()
                    .filter(|c| include_inactive || c.is_active)
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .await;
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn used_category_colors(&self) -> Result<Vec<String>, CurationError> {
        Ok(self
            .read(|s| s.categories.values().map(|c| c.color.clone()).collect())
            .await)
    }

    async fn insert_category(
        &self,
        name: &str,
        description: Option<&str>,
        color: &str,
    ) -> Result<Category, CurationError> {
        self.write(|state, _| {
            state.ensure_unique_category_name(name, None)?;
            let now = Utc::now();
            let category = Category {
                id: state.next_id(),
                name: name.to_string(),
                description: description.map(str::to_string),
                color: color.to_string(),
                is_active: true,
                created_at: now,
                updated_at: now,
            };
            state.categories.insert(category.id, category.clone());
            Ok(category)
        })
        .await
    }

    async fn update_category(
        &self,
        id: DbId,
        name: Option<&str>,
        description: Option<&str>,
        is_active: Option<bool>,
    ) -> Result<Option<Category>, CurationError> {
        self.write(|state, _| {
            if let Some(name) = name {
                state.ensure_unique_category_name(name, Some(id))?;
            }
            let Some(category) = state.categories.get_mut(&id) else {
                return Ok(None);
            };
            if let Some(name) = name {
                category.name = name.to_string();
            }
            if let Some(description) = description {
                category.description = Some(description.to_string());
            }
            if let Some(is_active) = is_active {
                category.is_active = is_active;
            }
            category.updated_at = Utc::now();
            Ok(Some(category.clone()))
        })
        .await
    }

    async fn recolor_category(
        &self,
        id: DbId,
        color: &str,
        force: bool,
    ) -> Result<Option<CategoryRecolor>, CurationError> {
        self.write(|state, _| {
            let now = Utc::now();
            let Some(category) = state.categories.get_mut(&id) else {
                return Ok(None);
            };
            let old_color = std::mem::replace(&mut category.color, color.to_string());
            category.updated_at = now;
            let category = category.clone();

            let following = labels_following_category(
                &old_color,
                state
                    .labels
                    .values()
                    .filter(|l| l.category_id == Some(id))
                    .map(|l| (l.id, l.color.as_str())),
                force,
            );
            for label_id in &following {
                if let Some(label) = state.labels.get_mut(label_id) {
                    label.color = color.to_string();
                    label.updated_at = now;
                }
            }

            Ok(Some(CategoryRecolor {
                category,
                labels_updated: following.len() as u64,
            }))
        })
        .await
    }

    async fn merge_categories(
        &self,
        source_ids: &[DbId],
        target_id: DbId,
    ) -> Result<MergeOutcome, CurationError> {
        self.write(|state, _| {
            if let Some(missing) = std::iter::once(&target_id)
                .chain(source_ids)
                .find(|id| !state.categories.contains_key(id))
            {
                return Ok(MergeOutcome::Missing(*missing));
            }

            let target_color = state.categories[&target_id].color.clone();
            let source_colors: BTreeMap<DbId, String> = source_ids
                .iter()
                .map(|id| (*id, state.categories[id].color.clone()))
                .collect();

            let now = Utc::now();
            let mut moved = 0;
            for label in state.labels.values_mut() {
                let Some(source_color) = label.category_id.and_then(|c| source_colors.get(&c))
                else {
                    continue;
                };
                if !has_custom_color(&label.color, Some(source_color)) {
                    label.color = target_color.clone();
                }
                label.category_id = Some(target_id);
                label.updated_at = now;
                moved += 1;
            }

            for id in source_ids {
                state.categories.remove(id);
            }
            Ok(MergeOutcome::Merged(moved))
        })
        .await
    }

    async fn delete_category(&self, id: DbId) -> Result<bool, CurationError> {
        self.write(|state, _| {
            let Some(category) = state.categories.remove(&id) else {
                return Ok(false);
            };
            let now = Utc::now();
            for label in state
                .labels
                .values_mut()
                .filter(|l| l.category_id == Some(id))
            {
                if !has_custom_color(&label.color, Some(&category.color)) {
                    label.color = NEUTRAL_GRAY.to_string();
                }
                label.category_id = None;
                label.updated_at = now;
            }
            Ok(true)
        })
        .await
    }

    // --- labels ------------------------------------------------------------

    async fn find_label(&self, id: DbId) -> Result<Option<Label>, CurationError> {
        Ok(self.read(|s| s.labels.get(&id).cloned()).await)
    }

    async fn list_labels(&self, include_inactive: bool) -> Result<Vec<Label>, CurationError> {
        let mut labels = self
            .read(|s| {
                s.labels
                    .values()
                    .filter(|l| include_inactive || l.is_active)
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .await;
        labels.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(labels)
    }

    async fn list_labels_with_usage(&self) -> Result<Vec<LabelWithUsage>, CurationError> {
        let mut labels = self
            .read(|s| {
                s.labels
                    .values()
                    .map(|l| {
                        let category = l.category_id.and_then(|c| s.categories.get(&c));
                        LabelWithUsage {
                            id: l.id,
                            name: l.name.clone(),
                            description: l.description.clone(),
                            category_id: l.category_id,
                            category_name: category.map(|c| c.name.clone()),
                            category_color: category.map(|c| c.color.clone()),
                            color: l.color.clone(),
                            is_active: l.is_active,
                            annotation_count: s
                                .annotations
                                .values()
                                .filter(|a| a.label_id == l.id)
                                .count() as i64,
                        }
                    })
                    .collect::<Vec<_>>()
            })
            .await;
        // Uncategorised labels last.
        labels.sort_by(|a, b| {
            (a.category_name.is_none(), &a.category_name, &a.name).cmp(&(
                b.category_name.is_none(),
                &b.category_name,
                &b.name,
            ))
        });
        Ok(labels)
    }

    async fn insert_label(
        &self,
        name: &str,
        description: Option<&str>,
        category_id: Option<DbId>,
        color: &str,
    ) -> Result<Label, CurationError> {
        self.write(|state, _| {
            state.ensure_unique_label_name(name, None)?;
            if let Some(category_id) = category_id {
                if !state.categories.contains_key(&category_id) {
                    return Err(CurationError::not_found("Category", category_id));
                }
            }
            let now = Utc::now();
            let label = Label {
                id: state.next_id(),
                name: name.to_string(),
                description: description.map(str::to_string),
                category_id,
                color: color.to_string(),
                is_active: true,
                created_at: now,
                updated_at: now,
            };
            state.labels.insert(label.id, label.clone());
            Ok(label)
        })
        .await
    }

    async fn update_label(
        &self,
        id: DbId,
        patch: &LabelPatch,
    ) -> Result<Option<Label>, CurationError> {
        self.write(|state, _| {
            if let Some(name) = &patch.name {
                state.ensure_unique_label_name(name, Some(id))?;
            }
            if let Some(Some(category_id)) = patch.category_id {
                if !state.categories.contains_key(&category_id) {
                    return Err(CurationError::not_found("Category", category_id));
                }
            }
            let Some(label) = state.labels.get_mut(&id) else {
                return Ok(None);
            };
            if let Some(name) = &patch.name {
                label.name = name.clone();
            }
            if let Some(description) = &patch.description {
                label.description = Some(description.clone());
            }
            if let Some(color) = &patch.color {
                label.color = color.clone();
            }
            if let Some(category_id) = patch.category_id {
                label.category_id = category_id;
            }
            label.updated_at = Utc::now();
            Ok(Some(label.clone()))
        })
        .await
    }

    async fn set_label_active(&self, id: DbId, is_active: bool) -> Result<bool, CurationError> {
        self.write(|state, _| {
            let Some(label) = state.labels.get_mut(&id) else {
                return Ok(false);
            };
            label.is_active = is_active;
            label.updated_at = Utc::now();
            Ok(true)
        })
        .await
    }

    async fn delete_label(&self, id: DbId) -> Result<bool, CurationError> {
        self.write(|state, _| {
            if !state.labels.contains_key(&id) {
                return Ok(false);
            }
            if state.annotations.values().any(|a| a.label_id == id) {
                return Err(CoreError::Conflict(format!(
                    "Label {id} is referenced by annotations"
                ))
                .into());
            }
            state.remove_label(id);
            Ok(true)
        })
        .await
    }

    async fn count_label_annotations(&self, id: DbId) -> Result<i64, CurationError> {
        Ok(self
            .read(|s| s.annotations.values().filter(|a| a.label_id == id).count() as i64)
            .await)
    }

    async fn merge_labels(
        &self,
        source_ids: &[DbId],
        target_id: DbId,
        performed_by: Option<DbId>,
    ) -> Result<MergeOutcome, CurationError> {
        self.write(|state, fault| {
            if let Some(missing) = state.first_missing_label(source_ids, target_id) {
                return Ok(MergeOutcome::Missing(missing));
            }
            let colliding = state.colliding_cells(source_ids, target_id);
            if !colliding.is_empty() {
                return Ok(MergeOutcome::Colliding(colliding));
            }
            let repointed = state.repoint(source_ids, target_id, performed_by);
            if fault == Some(FaultPoint::AfterRepoint) {
                return Err(injected(FaultPoint::AfterRepoint));
            }
            for id in source_ids {
                state.remove_label(*id);
            }
            Ok(MergeOutcome::Merged(repointed))
        })
        .await
    }

    async fn reassign_label_annotations(
        &self,
        from_id: DbId,
        to_id: DbId,
        performed_by: Option<DbId>,
    ) -> Result<MergeOutcome, CurationError> {
        self.write(|state, fault| {
            let sources = [from_id];
            if let Some(missing) = state.first_missing_label(&sources, to_id) {
                return Ok(MergeOutcome::Missing(missing));
            }
            let colliding = state.colliding_cells(&sources, to_id);
            if !colliding.is_empty() {
                return Ok(MergeOutcome::Colliding(colliding));
            }
            let moved = state.repoint(&sources, to_id, performed_by);
            if fault == Some(FaultPoint::AfterRepoint) {
                return Err(injected(FaultPoint::AfterRepoint));
            }
            Ok(MergeOutcome::Merged(moved))
        })
        .await
    }

    // --- annotations -------------------------------------------------------

    async fn find_annotation(&self, id: DbId) -> Result<Option<CellAnnotation>, CurationError> {
        Ok(self.read(|s| s.annotations.get(&id).cloned()).await)
    }

    async fn list_cell_annotations(
        &self,
        text_cell_id: DbId,
    ) -> Result<Vec<CellAnnotation>, CurationError> {
        Ok(self
            .read(|s| {
                s.annotations
                    .values()
                    .filter(|a| a.text_cell_id == text_cell_id)
                    .cloned()
                    .collect()
            })
            .await)
    }

    async fn insert_annotation(
        &self,
        new: NewCellAnnotation,
    ) -> Result<InsertOutcome, CurationError> {
        self.write(move |state, _| {
            if new.status == AnnotationStatus::PendingReview {
                if let Some(existing) = state.pending_for(new.text_cell_id, new.label_id) {
                    return Ok(InsertOutcome::DuplicatePending(existing.clone()));
                }
            }
            let row = state.insert_annotation_row(&new, None)?;
            state.record(NewAnnotationAction::created(&row));
            Ok(InsertOutcome::Created(row))
        })
        .await
    }

    async fn apply_review(
        &self,
        update: ReviewUpdate,
    ) -> Result<Option<CellAnnotation>, CurationError> {
        self.write(move |state, _| {
            let Some((before, after)) = state.review(
                update.annotation_id,
                update.expected_status,
                update.new_status,
                update.reviewer_id,
            ) else {
                return Ok(None);
            };
            state.record(
                NewAnnotationAction::for_annotation(
                    &before,
                    update.action,
                    Some(update.reviewer_id),
                    Some(update.new_status.as_str()),
                )
                .with_notes(update.notes),
            );
            Ok(Some(after))
        })
        .await
    }

    async fn replace_with_label(
        &self,
        edit: EditUpdate,
    ) -> Result<Option<EditedAnnotation>, CurationError> {
        self.write(move |state, _| {
            let Some((current, original)) = state.review(
                edit.annotation_id,
                AnnotationStatus::PendingReview,
                AnnotationStatus::Rejected,
                edit.reviewer_id,
            ) else {
                return Ok(None);
            };

            let replacement = state.insert_annotation_row(
                &NewCellAnnotation {
                    text_cell_id: current.text_cell_id,
                    label_id: edit.new_label_id,
                    created_by: Some(edit.reviewer_id),
                    is_ai_generated: false,
                    ai_confidence: current.ai_confidence,
                    ai_model: current.ai_model.clone(),
                    ai_provider: current.ai_provider.clone(),
                    status: AnnotationStatus::Active,
                },
                Some(edit.reviewer_id),
            )?;

            let notes = edit.notes.or_else(|| {
                Some(format!(
                    "label {} replaced by {} (annotation {})",
                    current.label_id, edit.new_label_id, replacement.id
                ))
            });
            let mut action = NewAnnotationAction::for_annotation(
                &current,
                ActionType::Edit,
                Some(edit.reviewer_id),
                Some(AnnotationStatus::Rejected.as_str()),
            )
            .with_notes(notes);
            action.label_id = Some(edit.new_label_id);
            state.record(action);

            Ok(Some(EditedAnnotation {
                original,
                replacement,
            }))
        })
        .await
    }

    async fn delete_annotation(
        &self,
        id: DbId,
        performed_by: Option<DbId>,
    ) -> Result<Option<CellAnnotation>, CurationError> {
        self.write(|state, _| {
            let Some(current) = state.annotations.get(&id).cloned() else {
                return Ok(None);
            };
            state.record(NewAnnotationAction::for_annotation(
                &current,
                ActionType::Delete,
                performed_by,
                None,
            ));
            state.remove_annotation(id);
            Ok(Some(current))
        })
        .await
    }

    async fn list_pending(
        &self,
        document_id: Option<DbId>,
    ) -> Result<Vec<CellAnnotation>, CurationError> {
        Ok(self
            .read(|s| {
                s.annotations
                    .values()
                    .filter(|a| a.status == AnnotationStatus::PendingReview.as_str())
                    .filter(|a| s.in_document(a.text_cell_id, document_id))
                    .cloned()
                    .collect()
            })
            .await)
    }

    async fn review_counts(
        &self,
        document_id: Option<DbId>,
    ) -> Result<ReviewCounts, CurationError> {
        Ok(self
            .read(|s| {
                let mut counts = ReviewCounts::default();
                let mut annotated = HashSet::new();
                for a in s
                    .annotations
                    .values()
                    .filter(|a| s.in_document(a.text_cell_id, document_id))
                {
                    let status = AnnotationStatus::from_str(&a.status).ok();
                    if status.is_some_and(|st| st.is_current()) {
                        annotated.insert(a.text_cell_id);
                    }
                    if !a.is_ai_generated {
                        continue;
                    }
                    counts.total += 1;
                    match status {
                        Some(AnnotationStatus::PendingReview) => counts.pending += 1,
                        Some(AnnotationStatus::Accepted) => counts.accepted += 1,
                        Some(AnnotationStatus::Rejected) => counts.rejected += 1,
                        _ => {}
                    }
                }
                counts.annotated_cells = annotated.len() as i64;
                counts
            })
            .await)
    }

    async fn list_cell_actions(
        &self,
        text_cell_id: DbId,
    ) -> Result<Vec<AnnotationAction>, CurationError> {
        Ok(self
            .read(|s| {
                s.actions
                    .iter()
                    .filter(|a| a.text_cell_id == Some(text_cell_id))
                    .cloned()
                    .collect()
            })
            .await)
    }
}
