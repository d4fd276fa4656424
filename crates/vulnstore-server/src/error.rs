// Startup errors for the server binary

use std::net::SocketAddr;

use thiserror::Error;
use vulnstore_lib::utils::config::ConfigError;

#[derive(Error, Debug)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Database connection failed: {0}")]
    Connection(String),

    #[error("HTTP client setup failed: {0}")]
    HttpClient(String),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Serve(std::io::Error),
}
