//! Test server lifecycle management
//!
//! This module manages spawning and shutting down test HTTP servers.
//! Each test gets an isolated server with its own database and mock catalog.

use super::constants::*;
use super::fixtures::{create_test_db_with_users, MockCatalog};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;
use trackboxd_server::server::{make_app, RequestsLoggingLevel, ServerConfig};
use trackboxd_server::spotify::Catalog;
use trackboxd_server::store::SqliteEngagementStore;
use trackboxd_server::FullStore;

/// Test server instance with isolated database and mock catalog
///
/// When dropped, the server gracefully shuts down and temp resources are cleaned up.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// The port the server is listening on
    pub port: u16,

    /// Store handle for direct database access in tests
    pub store: Arc<dyn FullStore>,

    /// The mock catalog, for asserting on playlist writes
    pub catalog: Arc<MockCatalog>,

    // Private fields - keep resources alive until drop
    _temp_db_dir: TempDir,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    /// Spawns a new test server on a random port with the mock catalog.
    pub async fn spawn() -> Self {
        Self::spawn_inner(true).await
    }

    /// Spawns a server without catalog credentials, so proxy endpoints
    /// respond 503.
    pub async fn spawn_without_catalog() -> Self {
        Self::spawn_inner(false).await
    }

    async fn spawn_inner(with_catalog: bool) -> Self {
        let (temp_db_dir, db_path) =
            create_test_db_with_users().expect("Failed to create test database");

        let store: Arc<dyn FullStore> =
            Arc::new(SqliteEngagementStore::new(&db_path).expect("Failed to open store"));
        let store_for_test = store.clone();

        let mock_catalog = Arc::new(MockCatalog::new());
        let catalog: Option<Arc<dyn Catalog>> = if with_catalog {
            Some(mock_catalog.clone() as Arc<dyn Catalog>)
        } else {
            None
        };

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");

        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();

        let base_url = format!("http://127.0.0.1:{}", port);

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let config = ServerConfig {
            port,
            requests_logging_level: RequestsLoggingLevel::None,
            frontend_dir_path: None,
            activity_feed_limit: 50,
        };

        let app = make_app(config, store, catalog).expect("Failed to build app");

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Server failed");
        });

        let server = Self {
            base_url,
            port,
            store: store_for_test,
            catalog: mock_catalog,
            _temp_db_dir: temp_db_dir,
            _shutdown_tx: Some(shutdown_tx),
        };

        server.wait_for_ready().await;

        server
    }

    /// Waits for the server to become ready by polling the home endpoint
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(format!("{}/", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => {
                    return;
                }
                _ => {
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
