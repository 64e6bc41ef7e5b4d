use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::{fmt::Debug, path::PathBuf};
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use trackboxd_server::config::{AppConfig, CliConfig, FileConfig};
use trackboxd_server::server::{run_server, RequestsLoggingLevel, ServerConfig};
use trackboxd_server::spotify::{Catalog, SpotifyClient, SpotifyCredentials};
use trackboxd_server::store::SqliteEngagementStore;

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(msg).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Directory holding the SQLite database files.
    #[clap(long, value_parser = parse_path)]
    pub db_dir: Option<PathBuf>,

    /// Path to a TOML config file (Spotify credentials live here).
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 3001)]
    pub port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// Path to the frontend directory to be statically served.
    #[clap(long)]
    pub frontend_dir_path: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .unwrap();

    let file_config = match &cli_args.config {
        Some(path) => Some(FileConfig::load(path)?),
        None => None,
    };
    let cli_config = CliConfig {
        db_dir: cli_args.db_dir,
        port: cli_args.port,
        logging_level: cli_args.logging_level,
        frontend_dir_path: cli_args.frontend_dir_path,
    };
    let config = AppConfig::resolve(&cli_config, file_config)?;

    let db_path = config.engagement_db_path();
    info!("Opening SQLite engagement database at {:?}...", db_path);
    let store = Arc::new(SqliteEngagementStore::new(&db_path)?);

    let catalog: Option<Arc<dyn Catalog>> = match &config.spotify {
        Some(spotify) => {
            info!("Spotify catalog configured");
            let credentials = SpotifyCredentials {
                client_id: spotify.client_id.clone(),
                client_secret: spotify.client_secret.clone(),
                refresh_token: spotify.refresh_token.clone(),
            };
            let client = match (&spotify.api_base_url, &spotify.accounts_base_url) {
                (Some(api), Some(accounts)) => {
                    SpotifyClient::with_base_urls(credentials, api.clone(), accounts.clone())
                }
                _ => SpotifyClient::new(credentials),
            };
            Some(Arc::new(client) as Arc<dyn Catalog>)
        }
        None => {
            info!("No Spotify credentials, catalog endpoints will respond 503");
            None
        }
    };

    let server_config = ServerConfig {
        requests_logging_level: config.logging_level.clone(),
        port: config.port,
        frontend_dir_path: config.frontend_dir_path.clone(),
        activity_feed_limit: config.activity_feed_limit,
    };

    info!("Ready to serve at port {}!", server_config.port);
    run_server(server_config, store, catalog).await
}
