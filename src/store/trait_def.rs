use anyhow::Result;
use std::collections::{BTreeMap, HashMap};

use super::models::*;
use crate::engagement::EngagementError;
use crate::user::auth::{AuthToken, AuthTokenValue, PasswordCredentials};

/// Store for engagements (likes, reviews, annotations), the catalog item
/// mirror rows carrying their denormalized counters, playlist mirrors and the
/// activity feed.
///
/// Every mutating operation that touches a counter runs the row mutation, the
/// counter adjustment, the catalog-item upsert and the activity row in one
/// SQLite transaction, so counters cannot drift from row counts.
pub trait EngagementStore: Send + Sync {
    // ------------------------------------------------------------------ users
    fn create_user(&self, handle: &str) -> Result<i64, EngagementError>;
    fn get_user(&self, user_id: i64) -> Result<Option<User>>;
    fn get_user_id(&self, handle: &str) -> Option<i64>;
    fn update_user_profile(
        &self,
        user_id: i64,
        update: &UserProfileUpdate,
    ) -> Result<(), EngagementError>;

    // ---------------------------------------------------------- catalog items
    fn get_catalog_item(&self, item_id: &str) -> Result<Option<CatalogItem>>;

    // ------------------------------------------------------------------ likes
    fn like(
        &self,
        user_id: i64,
        target_type: TargetType,
        target_id: &str,
    ) -> Result<Like, EngagementError>;
    fn unlike(
        &self,
        user_id: i64,
        target_type: TargetType,
        target_id: &str,
    ) -> Result<(), EngagementError>;
    fn is_liked(&self, user_id: i64, target_type: TargetType, target_id: &str) -> Result<bool>;
    /// Batch status lookup, one query per page the UI renders.
    fn like_status(
        &self,
        user_id: i64,
        target_type: TargetType,
        target_ids: &[String],
    ) -> Result<HashMap<String, bool>>;
    fn liked_ids(&self, user_id: i64, target_type: TargetType) -> Result<Vec<String>>;

    // ---------------------------------------------------------------- reviews
    fn create_review(&self, new_review: NewReview) -> Result<Review, EngagementError>;
    fn update_review(
        &self,
        review_id: &str,
        user_id: i64,
        update: ReviewUpdate,
    ) -> Result<Review, EngagementError>;
    fn delete_review(&self, review_id: &str, user_id: i64) -> Result<(), EngagementError>;
    fn get_review(&self, review_id: &str) -> Result<Option<Review>>;
    /// Public reviews for an item, plus the viewer's own private ones.
    fn reviews_for_item(&self, item_id: &str, viewer: Option<i64>) -> Result<Vec<Review>>;
    fn reviews_for_user(&self, user_id: i64) -> Result<Vec<Review>>;
    /// Count of reviews per half-star bucket, all buckets present.
    fn rating_distribution(&self, item_id: &str) -> Result<BTreeMap<String, i64>>;

    // ------------------------------------------------------------ annotations
    fn create_annotation(
        &self,
        new_annotation: NewAnnotation,
    ) -> Result<Annotation, EngagementError>;
    fn update_annotation(
        &self,
        annotation_id: &str,
        user_id: i64,
        update: AnnotationUpdate,
    ) -> Result<Annotation, EngagementError>;
    fn delete_annotation(&self, annotation_id: &str, user_id: i64)
        -> Result<(), EngagementError>;
    fn get_annotation(&self, annotation_id: &str) -> Result<Option<Annotation>>;
    /// Public annotations on a track plus the viewer's own, oldest first by
    /// position in the track. `author` narrows to a single user's annotations.
    fn annotations_for_track(
        &self,
        track_id: &str,
        viewer: Option<i64>,
        author: Option<i64>,
    ) -> Result<Vec<Annotation>>;
    fn annotations_for_user(&self, user_id: i64) -> Result<Vec<Annotation>>;

    // -------------------------------------------------------------- playlists
    fn mirror_playlist(&self, playlist: PlaylistMirror) -> Result<(), EngagementError>;
    fn get_playlist(&self, playlist_id: &str) -> Result<Option<PlaylistMirror>>;
    fn playlists_for_user(&self, user_id: i64) -> Result<Vec<PlaylistMirror>>;

    // --------------------------------------------------------------- activity
    fn recent_activity(&self, limit: usize) -> Result<Vec<Activity>>;
    fn activity_for_user(&self, user_id: i64, limit: usize) -> Result<Vec<Activity>>;
}

/// Session tokens and password credentials.
pub trait AuthStore: Send + Sync {
    fn add_auth_token(&self, token: AuthToken) -> Result<()>;
    fn get_auth_token(&self, value: &AuthTokenValue) -> Option<AuthToken>;
    fn delete_auth_token(&self, value: &AuthTokenValue) -> Option<AuthToken>;
    fn touch_auth_token(&self, value: &AuthTokenValue) -> Result<()>;

    fn get_password_credentials(&self, user_id: i64) -> Option<PasswordCredentials>;
    fn set_password_credentials(&self, credentials: PasswordCredentials) -> Result<()>;
}

pub trait FullStore: EngagementStore + AuthStore {}

impl<T: EngagementStore + AuthStore> FullStore for T {}
