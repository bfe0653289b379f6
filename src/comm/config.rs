use crate::comm::error::CommInitError;
use std::net::SocketAddr;
use tracing::warn;

/// Comm module configuration
#[derive(Debug, Clone)]
pub struct CommConfig {
    /// Listen address (default: 127.0.0.1)
    pub listen_addr: String,
    /// Listen port (default: 9710)
    pub listen_port: u16,
    /// Server identifier returned by discovery (default: terminal-server)
    pub server_name: String,
    /// Maximum payload size in bytes, both directions (default: 65000)
    pub max_payload_bytes: usize,
    /// Deduplication table capacity per client (default: 256)
    pub dedup_capacity: usize,
    /// Deduplication entry TTL in seconds (default: 300)
    pub dedup_ttl_secs: u64,
    /// Deadline for a tool reply; None waits for as long as the command runs
    pub response_timeout_secs: Option<u64>,
}

impl Default for CommConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1".to_string(),
            listen_port: 9710,
            server_name: "terminal-server".to_string(),
            max_payload_bytes: 65000,
            dedup_capacity: 256,
            dedup_ttl_secs: 300,
            response_timeout_secs: None,
        }
    }
}

/// Parse an environment variable, logging a warning if the value is present but invalid.
fn parse_env_var<T: std::str::FromStr>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(v) => match v.parse() {
            Ok(parsed) => parsed,
            Err(_) => {
                warn!(var = name, value = %v, "Invalid env var value, using default");
                default
            }
        },
        Err(_) => default,
    }
}

impl CommConfig {
    /// Load from environment variables
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let mut config = CommConfig::default();

        if let Ok(addr) = std::env::var("TERMINAL_LISTEN_ADDR") {
            config.listen_addr = addr;
        }
        if let Ok(name) = std::env::var("TERMINAL_SERVER_NAME") {
            config.server_name = name;
        }
        config.listen_port = parse_env_var("TERMINAL_LISTEN_PORT", config.listen_port);
        config.max_payload_bytes =
            parse_env_var("TERMINAL_MAX_PAYLOAD_BYTES", config.max_payload_bytes);
        config.dedup_capacity = parse_env_var("TERMINAL_DEDUP_CAPACITY", config.dedup_capacity);
        config.dedup_ttl_secs = parse_env_var("TERMINAL_DEDUP_TTL_SECS", config.dedup_ttl_secs);
        config.response_timeout_secs = std::env::var("TERMINAL_RESPONSE_TIMEOUT_SECS")
            .ok()
            .and_then(|v| match v.parse() {
                Ok(secs) => Some(secs),
                Err(_) => {
                    warn!(var = "TERMINAL_RESPONSE_TIMEOUT_SECS", value = %v, "Invalid env var value, ignoring");
                    None
                }
            });

        config
    }

    /// Returns the socket address to bind to
    pub fn bind_addr(&self) -> Result<SocketAddr, CommInitError> {
        let addr = format!("{}:{}", self.listen_addr, self.listen_port);
        addr.parse()
            .map_err(|e: std::net::AddrParseError| CommInitError::InvalidAddress(addr, e.to_string()))
    }
}
