//! Gateway configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`).

use std::net::SocketAddr;
use std::time::Duration;

/// Secret used when `JWT_SECRET` is not set. Only suitable for local runs.
pub const DEFAULT_JWT_SECRET: &str = "dev-secret";

const DEFAULT_ALLOWED_ORIGINS: &str = "https://mcp-todo-ui.vercel.app,http://localhost:3000";

/// Top-level gateway configuration.
///
/// Loaded once at startup via [`GatewayConfig::from_env`].
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Socket address to bind the HTTP server to (e.g. `0.0.0.0:3000`).
    pub listen_addr: SocketAddr,

    /// Redis connection string for the notification bus.
    pub redis_url: String,

    /// When `false` the gateway runs without a bus (local fan-out only).
    pub bus_enabled: bool,

    /// Upper bound on the startup bus connect attempt.
    pub bus_connect_timeout: Duration,

    /// Shared HS256 secret for bearer tokens.
    pub jwt_secret: String,

    /// Lifetime of tokens minted by `GET /token`, in seconds.
    pub token_ttl_secs: i64,

    /// Path of the WebSocket endpoint.
    pub ws_path: String,

    /// Origins allowed by CORS.
    pub allowed_origins: Vec<String>,

    /// Timeout applied to REST requests.
    pub request_timeout: Duration,

    /// Emit logs as JSON lines instead of the human-readable format.
    pub log_json: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            redis_url: "redis://127.0.0.1:6379".to_string(),
            bus_enabled: true,
            bus_connect_timeout: Duration::from_secs(5),
            jwt_secret: DEFAULT_JWT_SECRET.to_string(),
            token_ttl_secs: 3600,
            ws_path: "/mcp/ws".to_string(),
            allowed_origins: split_list(DEFAULT_ALLOWED_ORIGINS),
            request_timeout: Duration::from_secs(30),
            log_json: false,
        }
    }
}

impl GatewayConfig {
    /// Loads configuration from environment variables.
    ///
    /// Falls back to sensible defaults when a variable is not set.
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns an error if `LISTEN_ADDR` is set but cannot be parsed as
    /// a [`SocketAddr`].
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let listen_addr: SocketAddr = match std::env::var("LISTEN_ADDR") {
            Ok(addr) => addr.parse()?,
            Err(_) => SocketAddr::from(([0, 0, 0, 0], parse_env("PORT", 3000u16))),
        };

        let redis_url = std::env::var("REDIS_URL").unwrap_or(defaults.redis_url);
        let bus_enabled = parse_env_bool("BUS_ENABLED", defaults.bus_enabled);
        let bus_connect_timeout = Duration::from_secs(parse_env("BUS_CONNECT_TIMEOUT_SECS", 5));

        let jwt_secret = std::env::var("JWT_SECRET").unwrap_or(defaults.jwt_secret);
        let token_ttl_secs = parse_env("TOKEN_TTL_SECS", defaults.token_ttl_secs);

        let ws_path = std::env::var("WS_PATH").unwrap_or(defaults.ws_path);
        let allowed_origins = std::env::var("ALLOWED_ORIGINS")
            .map(|v| split_list(&v))
            .unwrap_or(defaults.allowed_origins);
        let request_timeout = Duration::from_secs(parse_env("REQUEST_TIMEOUT_SECS", 30));
        let log_json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

        Ok(Self {
            listen_addr,
            redis_url,
            bus_enabled,
            bus_connect_timeout,
            jwt_secret,
            token_ttl_secs,
            ws_path,
            allowed_origins,
            request_timeout,
            log_json,
        })
    }

    /// Returns `true` if the built-in development secret is in use.
    #[must_use]
    pub fn uses_default_secret(&self) -> bool {
        self.jwt_secret == DEFAULT_JWT_SECRET
    }
}

/// Parses an environment variable as `T`, returning `default` on missing
/// or invalid values.
fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Parses an environment variable as a boolean. Accepts `"true"`, `"1"`,
/// `"false"`, `"0"` (case-insensitive). Returns `default` otherwise.
fn parse_env_bool(key: &str, default: bool) -> bool {
    let value = std::env::var(key).ok().map(|v| v.trim().to_ascii_lowercase());
    match value.as_deref() {
        Some("true" | "1") => true,
        Some("false" | "0") => false,
        _ => default,
    }
}

/// Splits a comma-separated list, dropping blanks.
fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = GatewayConfig::default();
        assert_eq!(config.listen_addr.port(), 3000);
        assert_eq!(config.ws_path, "/mcp/ws");
        assert!(config.bus_enabled);
        assert!(config.uses_default_secret());
        assert_eq!(config.allowed_origins.len(), 2);
    }

    #[test]
    fn split_list_trims_and_skips_blanks() {
        assert_eq!(
            split_list(" a , ,b,"),
            vec!["a".to_string(), "b".to_string()]
        );
    }

    #[test]
    fn missing_variable_uses_default() {
        assert_eq!(parse_env("TODO_GATEWAY_UNSET_VARIABLE", 7u64), 7);
        assert!(parse_env_bool("TODO_GATEWAY_UNSET_VARIABLE", true));
    }
}
