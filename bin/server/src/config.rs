//! Server configuration from flags and environment variables.

use crate::rate_limit::{RateLimitConfig, RateLimitLayer};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// LoopHub JSON-RPC server.
#[derive(Debug, Clone, Parser)]
#[command(name = "loophub-server", version, about = "LoopHub community forum server")]
pub struct ServerConfig {
    /// Address to listen on.
    #[arg(long, env = "LOOPHUB_BIND", default_value = "127.0.0.1:3030")]
    pub bind: SocketAddr,

    /// RocksDB data directory.
    #[arg(long, env = "LOOPHUB_DATA_DIR", default_value = "loophub_data")]
    pub data_dir: PathBuf,

    /// Session lifetime.
    #[arg(long, env = "LOOPHUB_SESSION_TTL_HOURS", default_value_t = 720)]
    pub session_ttl_hours: u64,

    /// Read requests allowed per IP per 10 seconds.
    #[arg(long, env = "LOOPHUB_READ_RATE", default_value_t = 1000)]
    pub read_rate: u32,

    /// Write requests allowed per IP per 10 seconds.
    #[arg(long, env = "LOOPHUB_WRITE_RATE", default_value_t = 100)]
    pub write_rate: u32,

    /// Take the client IP from X-Forwarded-For / X-Real-IP. Only enable
    /// behind a reverse proxy that sets them.
    #[arg(long, env = "TRUST_PROXY_HEADERS")]
    pub trust_proxy_headers: bool,
}

impl ServerConfig {
    pub fn session_ttl_ms(&self) -> u64 {
        self.session_ttl_hours.saturating_mul(60 * 60 * 1_000)
    }

    pub fn rate_limit_layer(&self) -> RateLimitLayer {
        let window = |requests_per_window| RateLimitConfig {
            requests_per_window,
            window_duration: Duration::from_secs(10),
            cleanup_interval: Duration::from_secs(300),
        };
        RateLimitLayer::new(window(self.read_rate), window(self.write_rate))
            .trust_proxy_headers(self.trust_proxy_headers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::try_parse_from(["loophub-server"]).unwrap();
        assert_eq!(config.bind, "127.0.0.1:3030".parse().unwrap());
        assert_eq!(config.session_ttl_ms(), 30 * 24 * 60 * 60 * 1_000);
        assert!(config.write_rate < config.read_rate);
    }

    #[test]
    fn test_flags() {
        let config = ServerConfig::try_parse_from([
            "loophub-server",
            "--bind",
            "0.0.0.0:8080",
            "--data-dir",
            "/tmp/lh",
            "--session-ttl-hours",
            "1",
            "--trust-proxy-headers",
        ])
        .unwrap();
        assert_eq!(config.bind.port(), 8080);
        assert_eq!(config.data_dir, PathBuf::from("/tmp/lh"));
        assert_eq!(config.session_ttl_ms(), 3_600_000);
        assert!(config.trust_proxy_headers);
    }
}
