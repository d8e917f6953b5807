//! Integration tests for label merge, reassignment, and deletion against a
//! real database.
//!
//! Exercises `LabelRepo` and the lifecycle service to verify that:
//! - Merging moves every annotation onto the target and removes the sources
//! - A failure part way through a merge leaves the data untouched
//! - A missing label aborts the merge before anything changes
//! - Rows that would collide on the target abort the merge
//! - Used labels cannot be hard-deleted

use assert_matches::assert_matches;
use sqlx::PgPool;
use thematic_core::annotation::AnnotationOrigin;
use thematic_core::error::CoreError;
use thematic_db::lifecycle;
use thematic_db::models::cell_annotation::NewCellAnnotation;
use thematic_db::models::merge::MergeOutcome;
use thematic_db::models::text_cell::CreateTextCell;
use thematic_db::repositories::{CellAnnotationRepo, LabelRepo, TextCellRepo};
use thematic_db::{CurationError, PgStore};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const AUTHOR: i64 = 11;

async fn new_cell(pool: &PgPool, row: i32) -> i64 {
    TextCellRepo::create(
        pool,
        &CreateTextCell {
            document_id: 1,
            sheet_name: Some("Risposte".to_string()),
            row_index: row,
            column_index: 2,
            column_name: Some("Come utilizzi l'IA nel tuo lavoro?".to_string()),
            text_content: format!("risposta {row}"),
        },
    )
    .await
    .unwrap()
    .id
}

async fn new_label(pool: &PgPool, name: &str) -> i64 {
    LabelRepo::create(pool, name, None, None, "#6c757d")
        .await
        .unwrap()
        .id
}

/// Attach `k` human annotations of `label_id`, each on a fresh cell.
async fn annotate(pool: &PgPool, label_id: i64, k: i32, first_row: i32) {
    for row in first_row..first_row + k {
        let cell = new_cell(pool, row).await;
        let new = NewCellAnnotation::new(cell, label_id, AnnotationOrigin::Human { user_id: AUTHOR });
        CellAnnotationRepo::insert_active(pool, &new).await.unwrap();
    }
}

async fn total_annotations(pool: &PgPool) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM cell_annotations")
        .fetch_one(pool)
        .await
        .unwrap()
}

// ---------------------------------------------------------------------------
// Test: merge repoints k(A)+k(B) annotations onto C
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn merge_moves_all_annotations_to_target(pool: PgPool) {
    let a = new_label(&pool, "A").await;
    let b = new_label(&pool, "B").await;
    let c = new_label(&pool, "C").await;
    annotate(&pool, a, 2, 0).await;
    annotate(&pool, b, 3, 10).await;
    annotate(&pool, c, 4, 20).await;
    let before = total_annotations(&pool).await;

    let outcome = LabelRepo::merge(&pool, &[a, b], c, Some(99)).await.unwrap();

    assert_eq!(outcome, MergeOutcome::Merged(5));
    assert_eq!(LabelRepo::count_annotations(&pool, c).await.unwrap(), 9);
    assert!(LabelRepo::find_by_id(&pool, a).await.unwrap().is_none());
    assert!(LabelRepo::find_by_id(&pool, b).await.unwrap().is_none());
    assert_eq!(total_annotations(&pool).await, before);

    let merge_rows: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM annotation_actions WHERE action_type = 'merge'")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(merge_rows, 5);
}

// ---------------------------------------------------------------------------
// Test: a failure after repointing rolls the whole merge back
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn merge_failure_leaves_pre_state(pool: PgPool) {
    let a = new_label(&pool, "A").await;
    let b = new_label(&pool, "B").await;
    let c = new_label(&pool, "C").await;
    annotate(&pool, a, 2, 0).await;
    annotate(&pool, b, 2, 10).await;
    annotate(&pool, c, 1, 20).await;

    // Deleting label B fails, which happens after every annotation moved.
    sqlx::query(
        "CREATE FUNCTION refuse_label_delete() RETURNS trigger AS $$ \
         BEGIN RAISE EXCEPTION 'label delete refused'; END \
         $$ LANGUAGE plpgsql",
    )
    .execute(&pool)
    .await
    .unwrap();
    sqlx::query(
        "CREATE TRIGGER refuse_b_delete BEFORE DELETE ON labels \
         FOR EACH ROW WHEN (OLD.name = 'B') EXECUTE FUNCTION refuse_label_delete()",
    )
    .execute(&pool)
    .await
    .unwrap();

    let actions_before: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM annotation_actions")
        .fetch_one(&pool)
        .await
        .unwrap();

    let result = LabelRepo::merge(&pool, &[a, b], c, None).await;
    assert!(result.is_err());

    assert_eq!(LabelRepo::count_annotations(&pool, a).await.unwrap(), 2);
    assert_eq!(LabelRepo::count_annotations(&pool, b).await.unwrap(), 2);
    assert_eq!(LabelRepo::count_annotations(&pool, c).await.unwrap(), 1);
    assert!(LabelRepo::find_by_id(&pool, a).await.unwrap().is_some());

    let actions_after: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM annotation_actions")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(actions_after, actions_before);
}

// ---------------------------------------------------------------------------
// Test: a missing label aborts before any change
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn merge_with_missing_label_is_not_found(pool: PgPool) {
    let a = new_label(&pool, "A").await;
    let c = new_label(&pool, "C").await;
    annotate(&pool, a, 1, 0).await;
    let store = PgStore::new(pool.clone());

    let err = lifecycle::merge(&store, &[a, 404_404], c, None).await.unwrap_err();
    assert_matches!(
        err,
        CurationError::Core(CoreError::NotFound { entity: "Label", id: 404_404 })
    );

    let err = lifecycle::merge(&store, &[a], 505_505, None).await.unwrap_err();
    assert_matches!(
        err,
        CurationError::Core(CoreError::NotFound { id: 505_505, .. })
    );

    assert_eq!(LabelRepo::count_annotations(&pool, a).await.unwrap(), 1);
}

// ---------------------------------------------------------------------------
// Test: a merge that would stack two rows on one cell is refused
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn merge_refuses_colliding_pending_proposals(pool: PgPool) {
    let a = new_label(&pool, "A").await;
    let c = new_label(&pool, "C").await;
    let cell = new_cell(&pool, 0).await;
    let store = PgStore::new(pool.clone());

    lifecycle::create_ai(&store, cell, a, Default::default()).await.unwrap();
    lifecycle::create_ai(&store, cell, c, Default::default()).await.unwrap();
    let before = total_annotations(&pool).await;

    let outcome = LabelRepo::merge(&pool, &[a], c, None).await.unwrap();
    assert_eq!(outcome, MergeOutcome::Colliding(vec![cell]));

    let err = lifecycle::merge(&store, &[a], c, None).await.unwrap_err();
    assert_matches!(err, CurationError::Core(CoreError::Conflict(_)));

    assert_eq!(total_annotations(&pool).await, before);
    assert_eq!(LabelRepo::count_annotations(&pool, a).await.unwrap(), 1);
    assert!(LabelRepo::find_by_id(&pool, a).await.unwrap().is_some());
    let pending = CellAnnotationRepo::list_pending(&pool, Some(1)).await.unwrap();
    assert_eq!(pending.len(), 2);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn reassign_refuses_same_author_on_same_cell(pool: PgPool) {
    let a = new_label(&pool, "A").await;
    let c = new_label(&pool, "C").await;
    let cell = new_cell(&pool, 0).await;
    let store = PgStore::new(pool.clone());

    lifecycle::create_human(&store, cell, a, AUTHOR).await.unwrap();
    lifecycle::create_human(&store, cell, c, AUTHOR).await.unwrap();
    lifecycle::create_human(&store, cell, a, AUTHOR + 1).await.unwrap();

    let err = lifecycle::reassign(&store, a, c, None).await.unwrap_err();
    assert_matches!(err, CurationError::Core(CoreError::Conflict(_)));
    assert_eq!(LabelRepo::count_annotations(&pool, a).await.unwrap(), 2);
    assert_eq!(LabelRepo::count_annotations(&pool, c).await.unwrap(), 1);
}

// ---------------------------------------------------------------------------
// Test: used labels cannot be deleted; reassignment frees them
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn used_label_delete_is_blocked_until_reassigned(pool: PgPool) {
    let a = new_label(&pool, "A").await;
    let c = new_label(&pool, "C").await;
    annotate(&pool, a, 2, 0).await;
    let store = PgStore::new(pool.clone());

    let err = lifecycle::delete_label(&store, a).await.unwrap_err();
    assert_matches!(err, CurationError::Core(CoreError::Conflict(_)));

    let moved = lifecycle::reassign(&store, a, c, None).await.unwrap();
    assert_eq!(moved, 2);

    lifecycle::delete_label(&store, a).await.unwrap();
    assert!(LabelRepo::find_by_id(&pool, a).await.unwrap().is_none());
    assert_eq!(LabelRepo::count_annotations(&pool, c).await.unwrap(), 2);
}
