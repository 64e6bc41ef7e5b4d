//! Test fixture creation: the engagement database and the mock catalog.

use super::constants::*;
use anyhow::{bail, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Mutex;
use tempfile::TempDir;
use trackboxd_server::spotify::{
    Album, AlbumRef, ArtistRef, Catalog, Paging, Playlist, PlaylistOwner, SearchResults, Track,
};
use trackboxd_server::store::{AuthStore, EngagementStore, SqliteEngagementStore};
use trackboxd_server::user::auth::PasswordCredentials;

/// Creates a temporary engagement database seeded with the two test users.
/// Returns (temp_dir, db_path).
pub fn create_test_db_with_users() -> Result<(TempDir, PathBuf)> {
    let dir = TempDir::new()?;
    let db_path = dir.path().join("engagement.db");

    let store = SqliteEngagementStore::new(&db_path)?;
    for (handle, password) in [(TEST_USER, TEST_PASS), (OTHER_USER, OTHER_PASS)] {
        let user_id = store
            .create_user(handle)
            .map_err(|e| anyhow::anyhow!("failed to create test user: {}", e))?;
        let credentials = PasswordCredentials::from_plain_password(user_id, password)?;
        store.set_password_credentials(credentials)?;
    }

    Ok((dir, db_path))
}

fn mock_track(id: &str, name: &str) -> Track {
    Track {
        id: id.to_string(),
        name: name.to_string(),
        artists: vec![ArtistRef {
            id: "artist-1".to_string(),
            name: "The Test Band".to_string(),
        }],
        album: Some(AlbumRef {
            id: ALBUM_1_ID.to_string(),
            name: ALBUM_1_NAME.to_string(),
            images: Vec::new(),
            release_date: Some("2024-01-01".to_string()),
        }),
        duration_ms: Some(180_000),
        preview_url: None,
        popularity: Some(50),
    }
}

/// Catalog stub serving a fixed pair of tracks and one album, and recording
/// playlist writes for assertions.
pub struct MockCatalog {
    /// URIs passed to add_playlist_items, flattened across calls.
    pub added_uris: Mutex<Vec<String>>,
}

impl MockCatalog {
    pub fn new() -> Self {
        Self {
            added_uris: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Catalog for MockCatalog {
    async fn get_track(&self, id: &str) -> Result<Track> {
        match id {
            TRACK_1_ID => Ok(mock_track(TRACK_1_ID, TRACK_1_NAME)),
            TRACK_2_ID => Ok(mock_track(TRACK_2_ID, TRACK_2_NAME)),
            _ => bail!("Request /v1/tracks/{} failed with status 404", id),
        }
    }

    async fn get_album(&self, id: &str) -> Result<Album> {
        if id != ALBUM_1_ID {
            bail!("Request /v1/albums/{} failed with status 404", id);
        }
        Ok(Album {
            id: ALBUM_1_ID.to_string(),
            name: ALBUM_1_NAME.to_string(),
            artists: vec![ArtistRef {
                id: "artist-1".to_string(),
                name: "The Test Band".to_string(),
            }],
            images: Vec::new(),
            release_date: Some("2024-01-01".to_string()),
            total_tracks: Some(2),
            tracks: Some(Paging {
                items: vec![
                    mock_track(TRACK_1_ID, TRACK_1_NAME),
                    mock_track(TRACK_2_ID, TRACK_2_NAME),
                ],
                total: Some(2),
                next: None,
            }),
        })
    }

    async fn get_playlist(&self, id: &str) -> Result<Playlist> {
        bail!("Request /v1/playlists/{} failed with status 404", id)
    }

    async fn search(&self, query: &str, _types: &str, _limit: usize) -> Result<SearchResults> {
        let matches: Vec<Track> = [
            mock_track(TRACK_1_ID, TRACK_1_NAME),
            mock_track(TRACK_2_ID, TRACK_2_NAME),
        ]
        .into_iter()
        .filter(|t| t.name.to_lowercase().contains(&query.to_lowercase()))
        .collect();
        Ok(SearchResults {
            tracks: Some(Paging {
                total: Some(matches.len() as u64),
                items: matches,
                next: None,
            }),
            albums: None,
            playlists: None,
        })
    }

    async fn create_playlist(
        &self,
        name: &str,
        description: Option<&str>,
        public: bool,
        collaborative: bool,
    ) -> Result<Playlist> {
        Ok(Playlist {
            id: CREATED_PLAYLIST_ID.to_string(),
            name: name.to_string(),
            description: description.map(str::to_string),
            public: Some(public),
            collaborative,
            owner: Some(PlaylistOwner {
                id: "spotify-user".to_string(),
                display_name: Some("Spotify User".to_string()),
            }),
            images: Vec::new(),
            tracks: None,
        })
    }

    async fn add_playlist_items(&self, _playlist_id: &str, uris: &[String]) -> Result<()> {
        self.added_uris.lock().unwrap().extend_from_slice(uris);
        Ok(())
    }
}
