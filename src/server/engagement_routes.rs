//! Handlers for likes, reviews, annotations, activity and profiles.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

use super::error::ApiError;
use super::session::Session;
use super::state::{GuardedStore, ServerState};
use crate::store::{
    AnnotationUpdate, ItemType, NewAnnotation, NewReview, ReviewUpdate, TargetType,
    UserProfileUpdate,
};

fn parse_target_type(raw: &str) -> Result<TargetType, ApiError> {
    TargetType::from_str(raw)
        .map_err(|_| ApiError::bad_request(format!("unknown target type: {}", raw)))
}

// ------------------------------------------------------------------ annotate

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct CreateAnnotationBody {
    track_id: String,
    timestamp: f64,
    text: String,
    #[serde(default = "default_true")]
    is_public: bool,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct UpdateAnnotationBody {
    annotation_id: String,
    timestamp: Option<f64>,
    text: Option<String>,
    is_public: Option<bool>,
}

#[derive(Deserialize, Debug)]
struct IdQuery {
    id: String,
}

#[derive(Deserialize, Debug)]
struct AnnotationListQuery {
    user: Option<i64>,
}

fn default_true() -> bool {
    true
}

async fn get_annotation(
    _session: Session,
    State(store): State<GuardedStore>,
    Query(query): Query<IdQuery>,
) -> Result<Response, ApiError> {
    match store.get_annotation(&query.id)? {
        Some(annotation) => Ok(Json(annotation).into_response()),
        None => Err(ApiError::not_found("annotation not found")),
    }
}

async fn post_annotation(
    session: Session,
    State(store): State<GuardedStore>,
    Json(body): Json<CreateAnnotationBody>,
) -> Result<Response, ApiError> {
    let annotation = store.create_annotation(NewAnnotation {
        user_id: session.user_id,
        track_id: body.track_id,
        timestamp: body.timestamp,
        text: body.text,
        is_public: body.is_public,
    })?;
    Ok((StatusCode::CREATED, Json(annotation)).into_response())
}

async fn put_annotation(
    session: Session,
    State(store): State<GuardedStore>,
    Json(body): Json<UpdateAnnotationBody>,
) -> Result<Response, ApiError> {
    let annotation = store.update_annotation(
        &body.annotation_id,
        session.user_id,
        AnnotationUpdate {
            timestamp: body.timestamp,
            text: body.text,
            is_public: body.is_public,
        },
    )?;
    Ok(Json(annotation).into_response())
}

async fn delete_annotation(
    session: Session,
    State(store): State<GuardedStore>,
    Query(query): Query<IdQuery>,
) -> Result<Response, ApiError> {
    store.delete_annotation(&query.id, session.user_id)?;
    Ok(StatusCode::OK.into_response())
}

async fn get_track_annotations(
    session: Option<Session>,
    State(store): State<GuardedStore>,
    Path(track_id): Path<String>,
    Query(query): Query<AnnotationListQuery>,
) -> Result<Response, ApiError> {
    let viewer = session.map(|s| s.user_id);
    let annotations = store.annotations_for_track(&track_id, viewer, query.user)?;
    Ok(Json(annotations).into_response())
}

// ---------------------------------------------------------------------- like

#[derive(Deserialize, Debug)]
struct LikeBody {
    id: String,
}

#[derive(Deserialize, Debug)]
struct LikeStatusQuery {
    id: Option<String>,
    /// Comma separated batch of ids.
    ids: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LikeStatusResponse {
    is_liked: bool,
}

async fn get_like_status(
    session: Session,
    State(store): State<GuardedStore>,
    Path(target_type): Path<String>,
    Query(query): Query<LikeStatusQuery>,
) -> Result<Response, ApiError> {
    let target_type = parse_target_type(&target_type)?;
    if let Some(id) = query.id {
        let is_liked = store.is_liked(session.user_id, target_type, &id)?;
        return Ok(Json(LikeStatusResponse { is_liked }).into_response());
    }
    if let Some(ids) = query.ids {
        let ids: Vec<String> = ids
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        let status: HashMap<String, bool> = store.like_status(session.user_id, target_type, &ids)?;
        return Ok(Json(status).into_response());
    }
    // No id filter: the caller wants everything they liked of this type.
    let ids = store.liked_ids(session.user_id, target_type)?;
    Ok(Json(ids).into_response())
}

async fn post_like(
    session: Session,
    State(store): State<GuardedStore>,
    Path(target_type): Path<String>,
    Json(body): Json<LikeBody>,
) -> Result<Response, ApiError> {
    let target_type = parse_target_type(&target_type)?;
    let like = store.like(session.user_id, target_type, &body.id)?;
    Ok((StatusCode::CREATED, Json(like)).into_response())
}

async fn delete_like(
    session: Session,
    State(store): State<GuardedStore>,
    Path(target_type): Path<String>,
    Query(query): Query<IdQuery>,
) -> Result<Response, ApiError> {
    let target_type = parse_target_type(&target_type)?;
    store.unlike(session.user_id, target_type, &query.id)?;
    Ok(StatusCode::OK.into_response())
}

// -------------------------------------------------------------------- review

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct CreateReviewBody {
    item_id: String,
    item_type: ItemType,
    rating: f64,
    text: Option<String>,
    #[serde(default = "default_true")]
    is_public: bool,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct UpdateReviewBody {
    rating: Option<f64>,
    text: Option<String>,
    is_public: Option<bool>,
}

async fn post_review(
    session: Session,
    State(store): State<GuardedStore>,
    Json(body): Json<CreateReviewBody>,
) -> Result<Response, ApiError> {
    let review = store.create_review(NewReview {
        user_id: session.user_id,
        item_id: body.item_id,
        item_type: body.item_type,
        rating: body.rating,
        text: body.text,
        is_public: body.is_public,
    })?;
    Ok((StatusCode::CREATED, Json(review)).into_response())
}

async fn put_review(
    session: Session,
    State(store): State<GuardedStore>,
    Path(id): Path<String>,
    Json(body): Json<UpdateReviewBody>,
) -> Result<Response, ApiError> {
    let review = store.update_review(
        &id,
        session.user_id,
        ReviewUpdate {
            rating: body.rating,
            text: body.text,
            is_public: body.is_public,
        },
    )?;
    Ok(Json(review).into_response())
}

async fn delete_review(
    session: Session,
    State(store): State<GuardedStore>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    store.delete_review(&id, session.user_id)?;
    Ok(StatusCode::OK.into_response())
}

async fn get_review(
    _session: Session,
    State(store): State<GuardedStore>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    match store.get_review(&id)? {
        Some(review) => Ok(Json(review).into_response()),
        None => Err(ApiError::not_found("review not found")),
    }
}

async fn get_review_distribution(
    _session: Session,
    State(store): State<GuardedStore>,
    Path(item_id): Path<String>,
) -> Result<Response, ApiError> {
    let distribution = store.rating_distribution(&item_id)?;
    Ok(Json(distribution).into_response())
}

async fn get_item_reviews(
    session: Option<Session>,
    State(store): State<GuardedStore>,
    Path(item_id): Path<String>,
) -> Result<Response, ApiError> {
    let viewer = session.map(|s| s.user_id);
    let reviews = store.reviews_for_item(&item_id, viewer)?;
    Ok(Json(reviews).into_response())
}

// ------------------------------------------------------------------ activity

async fn get_activity(
    _session: Session,
    State(state): State<ServerState>,
) -> Result<Response, ApiError> {
    let feed = state
        .store
        .recent_activity(state.config.activity_feed_limit)?;
    Ok(Json(feed).into_response())
}

async fn get_my_activity(
    session: Session,
    State(state): State<ServerState>,
) -> Result<Response, ApiError> {
    let feed = state
        .store
        .activity_for_user(session.user_id, state.config.activity_feed_limit)?;
    Ok(Json(feed).into_response())
}

// --------------------------------------------------------------------- users

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct UpdateProfileBody {
    email: Option<String>,
    display_name: Option<String>,
    image_url: Option<String>,
    country: Option<String>,
    spotify_url: Option<String>,
}

async fn get_me(
    session: Session,
    State(store): State<GuardedStore>,
) -> Result<Response, ApiError> {
    match store.get_user(session.user_id)? {
        Some(user) => Ok(Json(user).into_response()),
        None => Err(ApiError::not_found("user not found")),
    }
}

async fn put_me(
    session: Session,
    State(store): State<GuardedStore>,
    Json(body): Json<UpdateProfileBody>,
) -> Result<Response, ApiError> {
    store.update_user_profile(
        session.user_id,
        &UserProfileUpdate {
            email: body.email,
            display_name: body.display_name,
            image_url: body.image_url,
            country: body.country,
            spotify_url: body.spotify_url,
        },
    )?;
    match store.get_user(session.user_id)? {
        Some(user) => Ok(Json(user).into_response()),
        None => Err(ApiError::not_found("user not found")),
    }
}

async fn get_my_reviews(
    session: Session,
    State(store): State<GuardedStore>,
) -> Result<Response, ApiError> {
    Ok(Json(store.reviews_for_user(session.user_id)?).into_response())
}

async fn get_my_annotations(
    session: Session,
    State(store): State<GuardedStore>,
) -> Result<Response, ApiError> {
    Ok(Json(store.annotations_for_user(session.user_id)?).into_response())
}

pub fn make_engagement_routes(state: ServerState) -> Router {
    Router::new()
        .route("/annotate", get(get_annotation))
        .route("/annotate", post(post_annotation))
        .route("/annotate", put(put_annotation))
        .route("/annotate", delete(delete_annotation))
        .route("/annotate/{track_id}", get(get_track_annotations))
        .route("/like/{target_type}", get(get_like_status))
        .route("/like/{target_type}", post(post_like))
        .route("/like/{target_type}", delete(delete_like))
        .route("/review", post(post_review))
        .route("/review/actions/{id}", put(put_review))
        .route("/review/actions/{id}", delete(delete_review))
        .route("/review/distribution/{item_id}", get(get_review_distribution))
        .route("/review/item/{item_id}", get(get_item_reviews))
        .route("/review/{id}", get(get_review))
        .route("/activity", get(get_activity))
        .route("/activity/me", get(get_my_activity))
        .route("/users/me", get(get_me))
        .route("/users/me", put(put_me))
        .route("/users/me/reviews", get(get_my_reviews))
        .route("/users/me/annotations", get(get_my_annotations))
        .with_state(state)
}
