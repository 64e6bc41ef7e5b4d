//! HTTP client for the Spotify Web API.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::json;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

use super::models::{Album, CurrentUser, Playlist, SearchResults, TokenResponse, Track};

/// Playlist item additions above this size are split into multiple requests.
pub const PLAYLIST_ADD_CHUNK_SIZE: usize = 100;

/// Tokens are refreshed this long before their advertised expiry.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(30);

/// Read and write access to the upstream music catalog.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn get_track(&self, id: &str) -> Result<Track>;
    async fn get_album(&self, id: &str) -> Result<Album>;
    async fn get_playlist(&self, id: &str) -> Result<Playlist>;
    async fn search(&self, query: &str, types: &str, limit: usize) -> Result<SearchResults>;

    /// Creates a playlist in the linked account and returns it.
    async fn create_playlist(
        &self,
        name: &str,
        description: Option<&str>,
        public: bool,
        collaborative: bool,
    ) -> Result<Playlist>;

    /// Appends track URIs to a playlist, chunking requests as needed.
    async fn add_playlist_items(&self, playlist_id: &str, uris: &[String]) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct SpotifyCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: Option<String>,
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_valid(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

pub struct SpotifyClient {
    client: reqwest::Client,
    credentials: SpotifyCredentials,
    api_base_url: String,
    accounts_base_url: String,
    app_token: Mutex<Option<CachedToken>>,
    user_token: Mutex<Option<CachedToken>>,
}

impl SpotifyClient {
    pub fn new(credentials: SpotifyCredentials) -> Self {
        Self::with_base_urls(
            credentials,
            "https://api.spotify.com".to_string(),
            "https://accounts.spotify.com".to_string(),
        )
    }

    /// Base URL override for tests pointing at a local stub.
    pub fn with_base_urls(
        credentials: SpotifyCredentials,
        api_base_url: String,
        accounts_base_url: String,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(20))
            .build()
            .expect("Failed to create HTTP client");
        Self {
            client,
            credentials,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            accounts_base_url: accounts_base_url.trim_end_matches('/').to_string(),
            app_token: Mutex::new(None),
            user_token: Mutex::new(None),
        }
    }

    fn basic_auth_header(&self) -> String {
        let pair = format!(
            "{}:{}",
            self.credentials.client_id, self.credentials.client_secret
        );
        format!("Basic {}", BASE64.encode(pair))
    }

    async fn request_token(&self, form: &[(&str, &str)]) -> Result<CachedToken> {
        let url = format!("{}/api/token", self.accounts_base_url);
        let response = self
            .client
            .post(&url)
            .header("Authorization", self.basic_auth_header())
            .form(form)
            .send()
            .await
            .context("Failed to reach token endpoint")?;

        if !response.status().is_success() {
            bail!("Token request failed with status {}", response.status());
        }

        let token: TokenResponse = response
            .json()
            .await
            .context("Failed to parse token response")?;
        let lifetime = Duration::from_secs(token.expires_in)
            .saturating_sub(TOKEN_EXPIRY_MARGIN);
        Ok(CachedToken {
            value: token.access_token,
            expires_at: Instant::now() + lifetime,
        })
    }

    /// App-level token for catalog reads, via the client credentials grant.
    async fn app_token(&self) -> Result<String> {
        let mut cached = self.app_token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.is_valid() {
                return Ok(token.value.clone());
            }
        }
        debug!("Requesting new client credentials token");
        let token = self
            .request_token(&[("grant_type", "client_credentials")])
            .await?;
        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }

    /// User-level token for playlist writes, via the refresh token grant.
    async fn user_token(&self) -> Result<String> {
        let refresh_token = self
            .credentials
            .refresh_token
            .as_deref()
            .context("No refresh token configured, playlist writes are unavailable")?;

        let mut cached = self.user_token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.is_valid() {
                return Ok(token.value.clone());
            }
        }
        debug!("Requesting new refresh token grant");
        let token = self
            .request_token(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .await?;
        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let token = self.app_token().await?;
        let url = format!("{}{}", self.api_base_url, path);
        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {}", path))?;

        if !response.status().is_success() {
            bail!("Request {} failed with status {}", path, response.status());
        }
        response
            .json()
            .await
            .with_context(|| format!("Failed to parse response for {}", path))
    }

    async fn current_user(&self, token: &str) -> Result<CurrentUser> {
        let url = format!("{}/v1/me", self.api_base_url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .context("Failed to fetch current user")?;
        if !response.status().is_success() {
            bail!(
                "Current user request failed with status {}",
                response.status()
            );
        }
        response
            .json()
            .await
            .context("Failed to parse current user response")
    }
}

#[async_trait]
impl Catalog for SpotifyClient {
    async fn get_track(&self, id: &str) -> Result<Track> {
        self.get_json(&format!("/v1/tracks/{}", id)).await
    }

    async fn get_album(&self, id: &str) -> Result<Album> {
        self.get_json(&format!("/v1/albums/{}", id)).await
    }

    async fn get_playlist(&self, id: &str) -> Result<Playlist> {
        self.get_json(&format!("/v1/playlists/{}", id)).await
    }

    async fn search(&self, query: &str, types: &str, limit: usize) -> Result<SearchResults> {
        self.get_json(&format!(
            "/v1/search?q={}&type={}&limit={}",
            urlencoding::encode(query),
            types,
            limit
        ))
        .await
    }

    async fn create_playlist(
        &self,
        name: &str,
        description: Option<&str>,
        public: bool,
        collaborative: bool,
    ) -> Result<Playlist> {
        let token = self.user_token().await?;
        let user = self.current_user(&token).await?;

        let url = format!("{}/v1/users/{}/playlists", self.api_base_url, user.id);
        let body = json!({
            "name": name,
            "description": description.unwrap_or(""),
            "public": public,
            "collaborative": collaborative,
        });
        let response = self
            .client
            .post(&url)
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await
            .context("Failed to create playlist")?;
        if !response.status().is_success() {
            bail!(
                "Playlist creation failed with status {}",
                response.status()
            );
        }
        response
            .json()
            .await
            .context("Failed to parse created playlist")
    }

    async fn add_playlist_items(&self, playlist_id: &str, uris: &[String]) -> Result<()> {
        let token = self.user_token().await?;
        let url = format!("{}/v1/playlists/{}/tracks", self.api_base_url, playlist_id);
        for chunk in uris.chunks(PLAYLIST_ADD_CHUNK_SIZE) {
            let response = self
                .client
                .post(&url)
                .bearer_auth(&token)
                .json(&json!({ "uris": chunk }))
                .send()
                .await
                .with_context(|| format!("Failed to add items to playlist {}", playlist_id))?;
            if !response.status().is_success() {
                bail!(
                    "Adding playlist items failed with status {}",
                    response.status()
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_credentials() -> SpotifyCredentials {
        SpotifyCredentials {
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
            refresh_token: None,
        }
    }

    #[test]
    fn basic_auth_header_encodes_credentials() {
        let client = SpotifyClient::new(test_credentials());
        assert_eq!(client.basic_auth_header(), "Basic aWQ6c2VjcmV0");
    }

    #[test]
    fn base_url_trailing_slash_is_stripped() {
        let client = SpotifyClient::with_base_urls(
            test_credentials(),
            "http://localhost:9900/".to_string(),
            "http://localhost:9901/".to_string(),
        );
        assert_eq!(client.api_base_url, "http://localhost:9900");
        assert_eq!(client.accounts_base_url, "http://localhost:9901");
    }

    #[tokio::test]
    async fn playlist_writes_require_a_refresh_token() {
        let client = SpotifyClient::new(test_credentials());
        let err = client.user_token().await.unwrap_err();
        assert!(err.to_string().contains("No refresh token"));
    }
}
