use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::http::HeaderValue;
use tracing_subscriber::EnvFilter;

use crate::domain::Locale;

pub const DEFAULT_DATABASE: &str = "bursar.db";
pub const DEFAULT_BIND: &str = "127.0.0.1:3000";
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Resolved settings for the HTTP server.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub database: String,
    pub bind: String,
    pub allow_origin: Option<String>,
    pub locale: Locale,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            database: DEFAULT_DATABASE.to_string(),
            bind: DEFAULT_BIND.to_string(),
            allow_origin: None,
            locale: Locale::default(),
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        self.bind
            .parse()
            .with_context(|| format!("Invalid bind address: {}", self.bind))
    }

    /// CORS origin header, when one is configured.
    pub fn allow_origin_header(&self) -> Result<Option<HeaderValue>> {
        self.allow_origin
            .as_deref()
            .map(|origin| {
                origin
                    .parse::<HeaderValue>()
                    .with_context(|| format!("Invalid CORS origin: {}", origin))
            })
            .transpose()
    }
}

/// clap value parser for `--locale`.
pub fn parse_locale(s: &str) -> Result<Locale, String> {
    Locale::from_str(s).ok_or_else(|| format!("unsupported locale '{}', expected es or en", s))
}

/// Install the global tracing subscriber. `RUST_LOG` wins over `level`.
pub fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL));

    // A second call (tests, embedding) keeps the first subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
