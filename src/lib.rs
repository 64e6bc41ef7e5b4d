//! Trackboxd Server Library
//!
//! This library exposes the internal modules for testing and potential reuse.

pub mod config;
pub mod engagement;
pub mod server;
pub mod spotify;
pub mod sqlite_persistence;
pub mod store;
pub mod user;

// Re-export commonly used types for convenience
pub use server::{run_server, RequestsLoggingLevel};
pub use store::{EngagementStore, FullStore, SqliteEngagementStore};
