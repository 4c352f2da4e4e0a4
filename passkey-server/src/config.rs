//! Server configuration module
//!
//! Handles loading configuration from environment variables with sensible defaults.
//! Relying-party settings live in [`passkey_core::WebAuthnConfig`].

use std::net::SocketAddr;

use crate::verifier_client;

/// Default address of the remote verification service
pub const DEFAULT_VERIFIER_URL: &str = "http://127.0.0.1:8081";

/// Server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port (default: 3000)
    pub port: u16,
    /// Server host (default: 127.0.0.1)
    pub host: [u8; 4],
    /// Allowed CORS origins, comma-separated (default: allow all in dev)
    pub allowed_origins: Option<Vec<String>>,
    /// Request body limit in KB (default: 64)
    pub body_limit_kb: usize,
    /// Request timeout in seconds (default: 30)
    pub timeout_secs: u64,
    /// Enable rate limiting (default: false for tests, true when loaded from env)
    pub rate_limit_enabled: bool,
    /// Rate limit: requests per second (default: 10)
    pub rate_limit_per_sec: u64,
    /// Rate limit: burst size (default: 20)
    pub rate_limit_burst: u32,
    /// Base URL of the verification service
    pub verifier_url: String,
    /// Timeout for a single verifier call in seconds (default: 10)
    pub verifier_timeout_secs: u64,
    /// Interval between expired-challenge sweeps in seconds, 0 disables (default: 60)
    pub ledger_sweep_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            host: [127, 0, 0, 1],
            allowed_origins: None, // None = allow all (dev mode)
            body_limit_kb: 64,
            timeout_secs: 30,
            rate_limit_enabled: false, // Disabled by default (for tests)
            rate_limit_per_sec: 10,
            rate_limit_burst: 20,
            verifier_url: DEFAULT_VERIFIER_URL.to_string(),
            verifier_timeout_secs: verifier_client::DEFAULT_TIMEOUT.as_secs(),
            ledger_sweep_secs: 60,
        }
    }
}

fn parsed_var<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let host = std::env::var("HOST")
            .ok()
            .map(|h| parse_host(&h))
            .unwrap_or(defaults.host);

        let allowed_origins = std::env::var("ALLOWED_ORIGINS")
            .ok()
            .map(|origins| parse_origins(&origins));

        // Rate limiting enabled by default in production, can be disabled with RATE_LIMIT_ENABLED=false
        let rate_limit_enabled = std::env::var("RATE_LIMIT_ENABLED")
            .map(|v| v.to_lowercase() != "false")
            .unwrap_or(true);

        let verifier_url = std::env::var("VERIFIER_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(defaults.verifier_url);

        Self {
            port: parsed_var("PORT", defaults.port),
            host,
            allowed_origins,
            body_limit_kb: parsed_var("BODY_LIMIT_KB", defaults.body_limit_kb),
            timeout_secs: parsed_var("REQUEST_TIMEOUT_SECS", defaults.timeout_secs),
            rate_limit_enabled,
            rate_limit_per_sec: parsed_var("RATE_LIMIT_PER_SEC", defaults.rate_limit_per_sec),
            rate_limit_burst: parsed_var("RATE_LIMIT_BURST", defaults.rate_limit_burst),
            verifier_url,
            verifier_timeout_secs: parsed_var(
                "VERIFIER_TIMEOUT_SECS",
                defaults.verifier_timeout_secs,
            ),
            ledger_sweep_secs: parsed_var("LEDGER_SWEEP_SECS", defaults.ledger_sweep_secs),
        }
    }

    /// Get socket address from config
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::from((self.host, self.port))
    }
}

fn parse_host(host: &str) -> [u8; 4] {
    if host == "0.0.0.0" {
        [0, 0, 0, 0]
    } else {
        [127, 0, 0, 1]
    }
}

fn parse_origins(origins: &str) -> Vec<String> {
    origins
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
