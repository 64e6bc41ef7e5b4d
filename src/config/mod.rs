mod file_config;

pub use file_config::{FileConfig, SpotifyFileConfig};

use crate::server::RequestsLoggingLevel;
use anyhow::{bail, Result};
use clap::ValueEnum;
use std::path::PathBuf;

pub const DEFAULT_ACTIVITY_FEED_LIMIT: usize = 50;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_dir: Option<PathBuf>,
    pub port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub frontend_dir_path: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Core settings
    pub db_dir: PathBuf,
    pub port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub frontend_dir_path: Option<String>,
    pub activity_feed_limit: usize,

    // Upstream catalog credentials, absent when the server runs store-only
    pub spotify: Option<SpotifySettings>,
}

#[derive(Debug, Clone)]
pub struct SpotifySettings {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: Option<String>,
    pub api_base_url: Option<String>,
    pub accounts_base_url: Option<String>,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        // TOML overrides CLI for each field
        let db_dir = file
            .db_dir
            .map(PathBuf::from)
            .or_else(|| cli.db_dir.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("db_dir must be specified via --db-dir or in config file")
            })?;

        if !db_dir.exists() {
            bail!("Database directory does not exist: {:?}", db_dir);
        }
        if !db_dir.is_dir() {
            bail!("db_dir is not a directory: {:?}", db_dir);
        }

        let port = file.port.unwrap_or(cli.port);

        let logging_level = file
            .logging_level
            .and_then(|s| parse_logging_level(&s))
            .unwrap_or_else(|| cli.logging_level.clone());

        let frontend_dir_path = file
            .frontend_dir_path
            .or_else(|| cli.frontend_dir_path.clone());

        let activity_feed_limit = file
            .activity_feed_limit
            .unwrap_or(DEFAULT_ACTIVITY_FEED_LIMIT);

        let spotify = match file.spotify {
            Some(s) => match (s.client_id, s.client_secret) {
                (Some(client_id), Some(client_secret)) => Some(SpotifySettings {
                    client_id,
                    client_secret,
                    refresh_token: s.refresh_token,
                    api_base_url: s.api_base_url,
                    accounts_base_url: s.accounts_base_url,
                }),
                (None, None) => None,
                _ => bail!("Both spotify.client_id and spotify.client_secret must be set"),
            },
            None => None,
        };

        Ok(Self {
            db_dir,
            port,
            logging_level,
            frontend_dir_path,
            activity_feed_limit,
            spotify,
        })
    }

    pub fn engagement_db_path(&self) -> PathBuf {
        self.db_dir.join("engagement.db")
    }
}

/// Parses a logging level string into RequestsLoggingLevel.
/// Uses clap's ValueEnum trait for parsing.
fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}
