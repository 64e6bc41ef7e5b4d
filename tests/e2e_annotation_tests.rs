//! End-to-end tests for the annotation lifecycle.

mod common;

use common::*;
use reqwest::StatusCode;
use serde_json::{json, Value};
use trackboxd_server::store::EngagementStore;

#[tokio::test]
async fn create_annotation_returns_the_stored_row() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated(server.base_url.clone()).await;

    let response = client
        .create_annotation(TRACK_1_ID, 42.5, "love this bridge")
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["trackId"], TRACK_1_ID);
    assert_eq!(body["timestamp"], 42.5);
    assert_eq!(body["text"], "love this bridge");
    assert_eq!(body["isPublic"], true);

    // Visible via both the single-row and the per-track endpoints.
    let id = body["id"].as_str().unwrap();
    let response = client.get_annotation(id).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = client.get_track_annotations(TRACK_1_ID).await;
    let listed: Value = response.json().await.unwrap();
    assert_eq!(listed.as_array().unwrap().len(), 1);
    assert_eq!(listed[0]["id"], *id);
}

#[tokio::test]
async fn short_text_is_rejected_and_stores_nothing() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated(server.base_url.clone()).await;

    // "hi  " trims to 2 characters.
    let response = client.create_annotation(TRACK_1_ID, 10.0, "hi  ").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("at least 5 characters"));

    let response = client.get_track_annotations(TRACK_1_ID).await;
    let listed: Value = response.json().await.unwrap();
    assert!(listed.as_array().unwrap().is_empty());
    assert!(server.store.get_catalog_item(TRACK_1_ID).unwrap().is_none());
}

#[tokio::test]
async fn negative_timestamp_is_rejected() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated(server.base_url.clone()).await;

    let response = client
        .create_annotation(TRACK_1_ID, -1.0, "valid text here")
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn annotation_update_rewrites_fields() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated(server.base_url.clone()).await;

    let response = client
        .create_annotation(TRACK_1_ID, 42.5, "love this bridge")
        .await;
    let created: Value = response.json().await.unwrap();
    let id = created["id"].as_str().unwrap();

    let response = client
        .update_annotation(id, json!({ "text": "love this outro", "timestamp": 200.0 }))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let updated: Value = response.json().await.unwrap();
    assert_eq!(updated["text"], "love this outro");
    assert_eq!(updated["timestamp"], 200.0);
}

#[tokio::test]
async fn update_revalidates_text() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated(server.base_url.clone()).await;

    let response = client
        .create_annotation(TRACK_1_ID, 42.5, "love this bridge")
        .await;
    let created: Value = response.json().await.unwrap();
    let id = created["id"].as_str().unwrap();

    let response = client.update_annotation(id, json!({ "text": "nah" })).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = client.get_annotation(id).await;
    let unchanged: Value = response.json().await.unwrap();
    assert_eq!(unchanged["text"], "love this bridge");
}

#[tokio::test]
async fn other_users_cannot_update_or_delete() {
    let server = TestServer::spawn().await;
    let owner = TestClient::authenticated(server.base_url.clone()).await;
    let other =
        TestClient::authenticated_as(server.base_url.clone(), OTHER_USER, OTHER_PASS).await;

    let response = owner
        .create_annotation(TRACK_1_ID, 42.5, "love this bridge")
        .await;
    let created: Value = response.json().await.unwrap();
    let id = created["id"].as_str().unwrap();

    let response = other
        .update_annotation(id, json!({ "text": "sneaky edit" }))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = other.delete_annotation(id).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = owner.get_annotation(id).await;
    let unchanged: Value = response.json().await.unwrap();
    assert_eq!(unchanged["text"], "love this bridge");
}

#[tokio::test]
async fn delete_removes_the_row_and_decrements_the_counter() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated(server.base_url.clone()).await;

    let response = client
        .create_annotation(TRACK_1_ID, 42.5, "love this bridge")
        .await;
    let created: Value = response.json().await.unwrap();
    let id = created["id"].as_str().unwrap();

    let item = server.store.get_catalog_item(TRACK_1_ID).unwrap().unwrap();
    assert_eq!(item.annotation_count, 1);

    let response = client.delete_annotation(id).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = client.get_annotation(id).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let item = server.store.get_catalog_item(TRACK_1_ID).unwrap().unwrap();
    assert_eq!(item.annotation_count, 0);
}

#[tokio::test]
async fn annotations_are_listed_oldest_timestamp_first() {
    let server = TestServer::spawn().await;
    let client = TestClient::authenticated(server.base_url.clone()).await;

    client
        .create_annotation(TRACK_1_ID, 120.0, "late in the song")
        .await;
    client
        .create_annotation(TRACK_1_ID, 3.0, "right at the start")
        .await;

    let response = client.get_track_annotations(TRACK_1_ID).await;
    let listed: Value = response.json().await.unwrap();
    let listed = listed.as_array().unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0]["timestamp"], 3.0);
    assert_eq!(listed[1]["timestamp"], 120.0);
}
