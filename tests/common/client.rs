//! HTTP client for end-to-end tests
//!
//! This module provides a high-level HTTP client that wraps reqwest
//! and provides methods for all trackboxd-server endpoints.
//!
//! When API routes or request formats change, update only this file.

use super::constants::*;
use reqwest::Response;
use serde_json::{json, Value};
use std::time::Duration;

/// HTTP test client with cookie-based session management
pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    /// The base URL of the test server
    pub base_url: String,
}

impl TestClient {
    /// Creates a new unauthenticated client
    ///
    /// Use this for testing authentication flows.
    /// For most tests, use `authenticated()` instead.
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .cookie_store(true) // Automatically handle session cookies
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self { client, base_url }
    }

    /// Creates a client pre-authenticated as the regular test user
    ///
    /// # Panics
    ///
    /// Panics if authentication fails (indicates test infrastructure problem).
    pub async fn authenticated(base_url: String) -> Self {
        Self::authenticated_as(base_url, TEST_USER, TEST_PASS).await
    }

    /// Creates a client pre-authenticated as a specific seeded user
    pub async fn authenticated_as(base_url: String, handle: &str, password: &str) -> Self {
        let client = Self::new(base_url);

        let response = client.login(handle, password).await;
        assert_eq!(
            response.status(),
            reqwest::StatusCode::CREATED,
            "Test user authentication failed: {:?}",
            response.text().await
        );

        client
    }

    // ========================================================================
    // Authentication Endpoints
    // ========================================================================

    /// POST /api/auth/signup
    pub async fn signup(&self, handle: &str, password: &str) -> Response {
        self.client
            .post(format!("{}/api/auth/signup", self.base_url))
            .json(&json!({ "handle": handle, "password": password }))
            .send()
            .await
            .expect("Signup request failed")
    }

    /// POST /api/auth/login
    pub async fn login(&self, handle: &str, password: &str) -> Response {
        self.client
            .post(format!("{}/api/auth/login", self.base_url))
            .json(&json!({ "handle": handle, "password": password }))
            .send()
            .await
            .expect("Login request failed")
    }

    /// GET /api/auth/logout
    pub async fn logout(&self) -> Response {
        self.client
            .get(format!("{}/api/auth/logout", self.base_url))
            .send()
            .await
            .expect("Logout request failed")
    }

    // ========================================================================
    // Annotation Endpoints
    // ========================================================================

    /// POST /api/annotate
    pub async fn create_annotation(&self, track_id: &str, timestamp: f64, text: &str) -> Response {
        self.client
            .post(format!("{}/api/annotate", self.base_url))
            .json(&json!({
                "trackId": track_id,
                "timestamp": timestamp,
                "text": text,
            }))
            .send()
            .await
            .expect("Create annotation request failed")
    }

    /// PUT /api/annotate
    pub async fn update_annotation(&self, annotation_id: &str, body: Value) -> Response {
        let mut body = body;
        body["annotationId"] = json!(annotation_id);
        self.client
            .put(format!("{}/api/annotate", self.base_url))
            .json(&body)
            .send()
            .await
            .expect("Update annotation request failed")
    }

    /// DELETE /api/annotate?id={id}
    pub async fn delete_annotation(&self, annotation_id: &str) -> Response {
        self.client
            .delete(format!(
                "{}/api/annotate?id={}",
                self.base_url, annotation_id
            ))
            .send()
            .await
            .expect("Delete annotation request failed")
    }

    /// GET /api/annotate?id={id}
    pub async fn get_annotation(&self, annotation_id: &str) -> Response {
        self.client
            .get(format!(
                "{}/api/annotate?id={}",
                self.base_url, annotation_id
            ))
            .send()
            .await
            .expect("Get annotation request failed")
    }

    /// GET /api/annotate/{track_id}
    pub async fn get_track_annotations(&self, track_id: &str) -> Response {
        self.client
            .get(format!("{}/api/annotate/{}", self.base_url, track_id))
            .send()
            .await
            .expect("Get track annotations request failed")
    }

    // ========================================================================
    // Like Endpoints
    // ========================================================================

    /// POST /api/like/{target_type}
    pub async fn like(&self, target_type: &str, id: &str) -> Response {
        self.client
            .post(format!("{}/api/like/{}", self.base_url, target_type))
            .json(&json!({ "id": id }))
            .send()
            .await
            .expect("Like request failed")
    }

    /// DELETE /api/like/{target_type}?id={id}
    pub async fn unlike(&self, target_type: &str, id: &str) -> Response {
        self.client
            .delete(format!(
                "{}/api/like/{}?id={}",
                self.base_url, target_type, id
            ))
            .send()
            .await
            .expect("Unlike request failed")
    }

    /// GET /api/like/{target_type}?id={id}
    pub async fn like_status(&self, target_type: &str, id: &str) -> Response {
        self.client
            .get(format!(
                "{}/api/like/{}?id={}",
                self.base_url, target_type, id
            ))
            .send()
            .await
            .expect("Like status request failed")
    }

    /// GET /api/like/{target_type}?ids={ids}
    pub async fn like_status_batch(&self, target_type: &str, ids: &[&str]) -> Response {
        self.client
            .get(format!(
                "{}/api/like/{}?ids={}",
                self.base_url,
                target_type,
                ids.join(",")
            ))
            .send()
            .await
            .expect("Batch like status request failed")
    }

    // ========================================================================
    // Review Endpoints
    // ========================================================================

    /// POST /api/review
    pub async fn create_review(&self, item_id: &str, item_type: &str, rating: f64) -> Response {
        self.client
            .post(format!("{}/api/review", self.base_url))
            .json(&json!({
                "itemId": item_id,
                "itemType": item_type,
                "rating": rating,
                "text": "solid record",
            }))
            .send()
            .await
            .expect("Create review request failed")
    }

    /// PUT /api/review/actions/{id}
    pub async fn update_review(&self, review_id: &str, body: Value) -> Response {
        self.client
            .put(format!(
                "{}/api/review/actions/{}",
                self.base_url, review_id
            ))
            .json(&body)
            .send()
            .await
            .expect("Update review request failed")
    }

    /// DELETE /api/review/actions/{id}
    pub async fn delete_review(&self, review_id: &str) -> Response {
        self.client
            .delete(format!(
                "{}/api/review/actions/{}",
                self.base_url, review_id
            ))
            .send()
            .await
            .expect("Delete review request failed")
    }

    /// GET /api/review/{id}
    pub async fn get_review(&self, review_id: &str) -> Response {
        self.client
            .get(format!("{}/api/review/{}", self.base_url, review_id))
            .send()
            .await
            .expect("Get review request failed")
    }

    /// GET /api/review/distribution/{item_id}
    pub async fn get_review_distribution(&self, item_id: &str) -> Response {
        self.client
            .get(format!(
                "{}/api/review/distribution/{}",
                self.base_url, item_id
            ))
            .send()
            .await
            .expect("Review distribution request failed")
    }

    /// GET /api/review/item/{item_id}
    pub async fn get_item_reviews(&self, item_id: &str) -> Response {
        self.client
            .get(format!("{}/api/review/item/{}", self.base_url, item_id))
            .send()
            .await
            .expect("Item reviews request failed")
    }

    // ========================================================================
    // Catalog Endpoints
    // ========================================================================

    /// GET /api/songs/{id}
    pub async fn get_song(&self, id: &str) -> Response {
        self.client
            .get(format!("{}/api/songs/{}", self.base_url, id))
            .send()
            .await
            .expect("Get song request failed")
    }

    /// GET /api/songs/search?q={q}
    pub async fn search_songs(&self, query: &str) -> Response {
        self.client
            .get(format!("{}/api/songs/search?q={}", self.base_url, query))
            .send()
            .await
            .expect("Search request failed")
    }

    /// GET /api/albums/{id}
    pub async fn get_album(&self, id: &str) -> Response {
        self.client
            .get(format!("{}/api/albums/{}", self.base_url, id))
            .send()
            .await
            .expect("Get album request failed")
    }

    /// POST /api/playlists
    pub async fn create_playlist(&self, body: Value) -> Response {
        self.client
            .post(format!("{}/api/playlists", self.base_url))
            .json(&body)
            .send()
            .await
            .expect("Create playlist request failed")
    }

    /// GET /api/playlists/mine
    pub async fn get_my_playlists(&self) -> Response {
        self.client
            .get(format!("{}/api/playlists/mine", self.base_url))
            .send()
            .await
            .expect("My playlists request failed")
    }

    /// GET /api/playlists/mirror/{id}
    pub async fn get_playlist_mirror(&self, id: &str) -> Response {
        self.client
            .get(format!("{}/api/playlists/mirror/{}", self.base_url, id))
            .send()
            .await
            .expect("Playlist mirror request failed")
    }

    // ========================================================================
    // Activity and Profile Endpoints
    // ========================================================================

    /// GET /api/activity
    pub async fn get_activity(&self) -> Response {
        self.client
            .get(format!("{}/api/activity", self.base_url))
            .send()
            .await
            .expect("Activity request failed")
    }

    /// GET /api/activity/me
    pub async fn get_my_activity(&self) -> Response {
        self.client
            .get(format!("{}/api/activity/me", self.base_url))
            .send()
            .await
            .expect("My activity request failed")
    }

    /// GET /api/users/me
    pub async fn get_me(&self) -> Response {
        self.client
            .get(format!("{}/api/users/me", self.base_url))
            .send()
            .await
            .expect("Get profile request failed")
    }

    /// GET /api/users/me/reviews
    pub async fn get_my_reviews(&self) -> Response {
        self.client
            .get(format!("{}/api/users/me/reviews", self.base_url))
            .send()
            .await
            .expect("My reviews request failed")
    }

    /// GET /api/users/me/annotations
    pub async fn get_my_annotations(&self) -> Response {
        self.client
            .get(format!("{}/api/users/me/annotations", self.base_url))
            .send()
            .await
            .expect("My annotations request failed")
    }

    /// PUT /api/users/me
    pub async fn update_me(&self, body: Value) -> Response {
        self.client
            .put(format!("{}/api/users/me", self.base_url))
            .json(&body)
            .send()
            .await
            .expect("Update profile request failed")
    }
}
