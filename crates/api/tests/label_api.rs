//! HTTP-level tests for label and category maintenance endpoints.

mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use common::{body_json, delete, get, post_json, put_json};
use serde_json::json;
use thematic_core::palette::{DEFAULT_COLORS, NEUTRAL_GRAY};
use thematic_db::MemoryStore;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn create(store: &Arc<MemoryStore>, uri: &str, body: serde_json::Value) -> serde_json::Value {
    let response = post_json(common::build_test_app(store.clone()), uri, body).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["data"].clone()
}

/// Attach one human annotation of `label_id` on a fresh cell.
async fn annotate(store: &Arc<MemoryStore>, label_id: i64, row: i32) {
    let cell = common::seed_cell(store, 1, row, "Perché usi l'IA?", "risparmio tempo").await;
    create(
        store,
        "/api/v1/annotations",
        json!({ "text_cell_id": cell.id, "label_id": label_id, "user_id": 1 }),
    )
    .await;
}

// ---------------------------------------------------------------------------
// Categories and colours
// ---------------------------------------------------------------------------

#[tokio::test]
async fn categories_take_palette_colors_and_labels_inherit() {
    let store = Arc::new(MemoryStore::new());

    let first = create(&store, "/api/v1/categories", json!({ "name": "Benefici" })).await;
    let second = create(&store, "/api/v1/categories", json!({ "name": "Rischi" })).await;
    assert_eq!(first["color"], DEFAULT_COLORS[0]);
    assert_eq!(second["color"], DEFAULT_COLORS[1]);

    let label = create(
        &store,
        "/api/v1/labels",
        json!({ "name": "Efficienza", "category_id": first["id"] }),
    )
    .await;
    assert_eq!(label["color"], DEFAULT_COLORS[0]);

    let next = body_json(get(common::build_test_app(store), "/api/v1/palette/next").await).await;
    assert_eq!(next["data"]["color"], DEFAULT_COLORS[2]);
}

#[tokio::test]
async fn invalid_category_color_returns_400() {
    let store = Arc::new(MemoryStore::new());
    let response = post_json(
        common::build_test_app(store),
        "/api/v1/categories",
        json!({ "name": "Benefici", "color": "blue" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn recolor_and_delete_category() {
    let store = Arc::new(MemoryStore::new());
    let category = create(&store, "/api/v1/categories", json!({ "name": "Benefici" })).await;
    let category_id = category["id"].as_i64().unwrap();
    let inherited = create(
        &store,
        "/api/v1/labels",
        json!({ "name": "Efficienza", "category_id": category_id }),
    )
    .await;
    create(
        &store,
        "/api/v1/labels",
        json!({ "name": "Creatività", "category_id": category_id, "color": "#059669" }),
    )
    .await;

    let response = post_json(
        common::build_test_app(store.clone()),
        &format!("/api/v1/categories/{category_id}/recolor"),
        json!({ "color": "#7c3aed" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["labels_updated"], 1);

    let response = delete(
        common::build_test_app(store.clone()),
        &format!("/api/v1/categories/{category_id}"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let label = body_json(
        get(
            common::build_test_app(store),
            &format!("/api/v1/labels/{}", inherited["id"]),
        )
        .await,
    )
    .await;
    assert_eq!(label["data"]["category_id"], serde_json::Value::Null);
    assert_eq!(label["data"]["color"], NEUTRAL_GRAY);
}

// ---------------------------------------------------------------------------
// Label updates
// ---------------------------------------------------------------------------

#[tokio::test]
async fn duplicate_label_name_conflicts() {
    let store = Arc::new(MemoryStore::new());
    create(&store, "/api/v1/labels", json!({ "name": "Fiducia" })).await;

    let response = post_json(
        common::build_test_app(store),
        "/api/v1/labels",
        json!({ "name": "Fiducia" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn inactive_label_cannot_be_used() {
    let store = Arc::new(MemoryStore::new());
    let label = create(&store, "/api/v1/labels", json!({ "name": "Fiducia" })).await;
    let label_id = label["id"].as_i64().unwrap();
    let cell = common::seed_cell(&store, 1, 0, "Ti fidi dell'IA?", "Non sempre").await;

    let response = put_json(
        common::build_test_app(store.clone()),
        &format!("/api/v1/labels/{label_id}/active"),
        json!({ "is_active": false }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = post_json(
        common::build_test_app(store),
        "/api/v1/annotations",
        json!({ "text_cell_id": cell.id, "label_id": label_id, "user_id": 1 }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn rename_label() {
    let store = Arc::new(MemoryStore::new());
    let label = create(&store, "/api/v1/labels", json!({ "name": "Fiducia" })).await;

    let response = put_json(
        common::build_test_app(store),
        &format!("/api/v1/labels/{}", label["id"]),
        json!({ "name": "Fiducia nell'IA", "description": "Quanto si fida" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["name"], "Fiducia nell'IA");
    assert_eq!(json["data"]["description"], "Quanto si fida");
}

// ---------------------------------------------------------------------------
// Merge, reassign, delete
// ---------------------------------------------------------------------------

#[tokio::test]
async fn merge_sums_usage_onto_target() {
    let store = Arc::new(MemoryStore::new());
    let a = create(&store, "/api/v1/labels", json!({ "name": "A" })).await["id"].as_i64().unwrap();
    let b = create(&store, "/api/v1/labels", json!({ "name": "B" })).await["id"].as_i64().unwrap();
    let c = create(&store, "/api/v1/labels", json!({ "name": "C" })).await["id"].as_i64().unwrap();
    annotate(&store, a, 0).await;
    annotate(&store, a, 1).await;
    annotate(&store, b, 2).await;
    annotate(&store, c, 3).await;

    let response = post_json(
        common::build_test_app(store.clone()),
        "/api/v1/labels/merge",
        json!({ "source_ids": [a, b], "target_id": c, "performed_by": 9 }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["repointed"], 3);
    assert_eq!(json["data"]["target_label_id"], c);

    let labels = body_json(get(common::build_test_app(store), "/api/v1/labels").await).await;
    let labels = labels["data"].as_array().unwrap();
    assert_eq!(labels.len(), 1);
    assert_eq!(labels[0]["id"], c);
    assert_eq!(labels[0]["annotation_count"], 4);
}

#[tokio::test]
async fn merge_with_missing_source_changes_nothing() {
    let store = Arc::new(MemoryStore::new());
    let a = create(&store, "/api/v1/labels", json!({ "name": "A" })).await["id"].as_i64().unwrap();
    let c = create(&store, "/api/v1/labels", json!({ "name": "C" })).await["id"].as_i64().unwrap();
    annotate(&store, a, 0).await;

    let response = post_json(
        common::build_test_app(store.clone()),
        "/api/v1/labels/merge",
        json!({ "source_ids": [a, 777], "target_id": c }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let labels = body_json(get(common::build_test_app(store), "/api/v1/labels").await).await;
    assert_eq!(labels["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn merge_that_would_stack_one_authors_rows_returns_409() {
    let store = Arc::new(MemoryStore::new());
    let a = create(&store, "/api/v1/labels", json!({ "name": "A" })).await["id"].as_i64().unwrap();
    let c = create(&store, "/api/v1/labels", json!({ "name": "C" })).await["id"].as_i64().unwrap();
    let cell = common::seed_cell(&store, 1, 0, "Perché usi l'IA?", "risparmio tempo").await;
    for label_id in [a, c] {
        create(
            &store,
            "/api/v1/annotations",
            json!({ "text_cell_id": cell.id, "label_id": label_id, "user_id": 1 }),
        )
        .await;
    }

    let response = post_json(
        common::build_test_app(store.clone()),
        "/api/v1/labels/merge",
        json!({ "source_ids": [a], "target_id": c }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let json = body_json(response).await;
    assert_eq!(json["code"], "CONFLICT");

    let labels = body_json(get(common::build_test_app(store), "/api/v1/labels").await).await;
    let labels = labels["data"].as_array().unwrap();
    assert_eq!(labels.len(), 2);
    assert!(labels.iter().all(|l| l["annotation_count"] == 1));
}

#[tokio::test]
async fn merge_into_itself_returns_400() {
    let store = Arc::new(MemoryStore::new());
    let a = create(&store, "/api/v1/labels", json!({ "name": "A" })).await["id"].as_i64().unwrap();

    let response = post_json(
        common::build_test_app(store),
        "/api/v1/labels/merge",
        json!({ "source_ids": [a], "target_id": a }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn used_label_delete_conflicts_until_reassigned() {
    let store = Arc::new(MemoryStore::new());
    let a = create(&store, "/api/v1/labels", json!({ "name": "A" })).await["id"].as_i64().unwrap();
    let c = create(&store, "/api/v1/labels", json!({ "name": "C" })).await["id"].as_i64().unwrap();
    annotate(&store, a, 0).await;

    let response = delete(common::build_test_app(store.clone()), &format!("/api/v1/labels/{a}")).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = post_json(
        common::build_test_app(store.clone()),
        &format!("/api/v1/labels/{a}/reassign"),
        json!({ "to_label_id": c }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["reassigned"], 1);

    let response = delete(common::build_test_app(store), &format!("/api/v1/labels/{a}")).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn merge_suggestions_group_near_duplicates() {
    let store = Arc::new(MemoryStore::new());
    let first = create(&store, "/api/v1/labels", json!({ "name": "Work-Life" })).await;
    let second = create(&store, "/api/v1/labels", json!({ "name": "work life" })).await;
    create(&store, "/api/v1/labels", json!({ "name": "Fiducia" })).await;

    let json = body_json(
        get(common::build_test_app(store), "/api/v1/labels/merge-suggestions").await,
    )
    .await;
    let suggestions = json["data"].as_array().unwrap();
    assert_eq!(suggestions.len(), 1);
    assert_eq!(suggestions[0]["normalized_name"], "worklife");
    assert_eq!(suggestions[0]["label_ids"], json!([first["id"], second["id"]]));
}
