//! Catalog proxy handlers: Spotify reads with local stats merged in, and
//! playlist creation with a local mirror.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use super::error::ApiError;
use super::session::Session;
use super::state::ServerState;
use crate::engagement::MAX_PLAYLIST_URIS;
use crate::spotify::{Album, Catalog, Playlist, SearchResults, Track};
use crate::store::{ItemStats, PlaylistMirror};

fn require_catalog(state: &ServerState) -> Result<Arc<dyn Catalog>, ApiError> {
    state
        .catalog
        .clone()
        .ok_or_else(ApiError::catalog_unavailable)
}

fn stats_for(state: &ServerState, item_id: &str) -> Result<ItemStats, ApiError> {
    Ok(state
        .store
        .get_catalog_item(item_id)?
        .map(|item| item.stats())
        .unwrap_or_default())
}

#[derive(Serialize)]
struct TrackWithStats {
    #[serde(flatten)]
    track: Track,
    stats: ItemStats,
}

#[derive(Serialize)]
struct AlbumWithStats {
    #[serde(flatten)]
    album: Album,
    stats: ItemStats,
}

#[derive(Serialize)]
struct PlaylistWithStats {
    #[serde(flatten)]
    playlist: Playlist,
    stats: ItemStats,
}

async fn get_song(
    _session: Session,
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let catalog = require_catalog(&state)?;
    let track = catalog.get_track(&id).await?;
    let stats = stats_for(&state, &track.id)?;
    Ok(Json(TrackWithStats { track, stats }).into_response())
}

#[derive(Deserialize, Debug)]
struct SearchQuery {
    q: String,
    #[serde(default = "default_search_type")]
    r#type: String,
    #[serde(default = "default_search_limit")]
    limit: usize,
}

fn default_search_type() -> String {
    "track".to_string()
}

fn default_search_limit() -> usize {
    20
}

async fn search(
    _session: Session,
    State(state): State<ServerState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<SearchResults>, ApiError> {
    if query.q.trim().is_empty() {
        return Err(ApiError::bad_request("query must not be empty"));
    }
    let catalog = require_catalog(&state)?;
    let results = catalog
        .search(&query.q, &query.r#type, query.limit)
        .await?;
    Ok(Json(results))
}

async fn get_album(
    _session: Session,
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let catalog = require_catalog(&state)?;
    let album = catalog.get_album(&id).await?;
    let stats = stats_for(&state, &album.id)?;
    Ok(Json(AlbumWithStats { album, stats }).into_response())
}

async fn get_playlist(
    _session: Session,
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let catalog = require_catalog(&state)?;
    let playlist = catalog.get_playlist(&id).await?;
    let stats = stats_for(&state, &playlist.id)?;
    Ok(Json(PlaylistWithStats { playlist, stats }).into_response())
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct CreatePlaylistBody {
    name: String,
    description: Option<String>,
    #[serde(default)]
    uris: Vec<String>,
    #[serde(default)]
    is_public: bool,
    #[serde(default)]
    is_collaborative: bool,
}

async fn post_playlist(
    session: Session,
    State(state): State<ServerState>,
    Json(body): Json<CreatePlaylistBody>,
) -> Result<Response, ApiError> {
    if body.name.trim().is_empty() {
        return Err(ApiError::bad_request("playlist name must not be empty"));
    }
    if body.uris.len() > MAX_PLAYLIST_URIS {
        return Err(ApiError::bad_request(format!(
            "at most {} track URIs per playlist",
            MAX_PLAYLIST_URIS
        )));
    }
    // Spotify rejects public collaborative playlists, enforce it here
    // instead of trusting the client.
    let is_public = body.is_public && !body.is_collaborative;

    let catalog = require_catalog(&state)?;
    let created = catalog
        .create_playlist(
            body.name.trim(),
            body.description.as_deref(),
            is_public,
            body.is_collaborative,
        )
        .await?;
    if !body.uris.is_empty() {
        catalog.add_playlist_items(&created.id, &body.uris).await?;
    }

    let mirror = PlaylistMirror {
        id: created.id.clone(),
        user_id: session.user_id,
        name: created.name.clone(),
        description: created.description.clone(),
        is_public,
        is_collaborative: body.is_collaborative,
        created: SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0),
    };
    state.store.mirror_playlist(mirror)?;

    Ok((StatusCode::CREATED, Json(created)).into_response())
}

async fn get_my_playlists(
    session: Session,
    State(state): State<ServerState>,
) -> Result<Response, ApiError> {
    let playlists = state.store.playlists_for_user(session.user_id)?;
    Ok(Json(playlists).into_response())
}

async fn get_playlist_mirror(
    _session: Session,
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    match state.store.get_playlist(&id)? {
        Some(playlist) => Ok(Json(playlist).into_response()),
        None => Err(ApiError::not_found("playlist not found")),
    }
}

async fn catalog_health(State(state): State<ServerState>) -> Response {
    Json(json!({ "catalogConfigured": state.catalog.is_some() })).into_response()
}

pub fn make_catalog_routes(state: ServerState) -> Router {
    Router::new()
        .route("/songs/search", get(search))
        .route("/songs/{id}", get(get_song))
        .route("/albums/{id}", get(get_album))
        .route("/playlists", post(post_playlist))
        .route("/playlists/mine", get(get_my_playlists))
        .route("/playlists/mirror/{id}", get(get_playlist_mirror))
        .route("/playlists/{id}", get(get_playlist))
        .route("/catalog/health", get(catalog_health))
        .with_state(state)
}
