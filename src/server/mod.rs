pub mod config;
mod catalog_routes;
mod engagement_routes;
mod error;
mod http_layers;
pub mod server;
mod session;
pub mod state;

pub use config::ServerConfig;
pub use http_layers::*;
pub use server::{make_app, run_server};
