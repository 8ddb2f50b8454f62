//! Configuration management

use hn_ingest::db::DbConfig;

// ============================================================================
// Server Configuration Constants
// ============================================================================

/// Default server host binding.
pub const DEFAULT_SERVER_HOST: &str = "127.0.0.1";

/// Default server port.
pub const DEFAULT_SERVER_PORT: u16 = 8000;

/// Default shutdown timeout in seconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Default read-API pool size.
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 10;

/// Default CORS allowed origin for local development.
pub const DEFAULT_CORS_ALLOWED_ORIGIN: &str = "http://localhost:3000";

/// Default per-client request budget.
pub const DEFAULT_RATE_LIMIT_REQUESTS_PER_MINUTE: u64 = 10;

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DbConfig,
    pub cors: CorsConfig,
    pub auth: AuthConfig,
    pub rate_limit: RateLimitConfig,
    /// Run the ETL scheduler inside the server process.
    pub etl_enabled: bool,
}

/// Server-specific configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub shutdown_timeout_secs: u64,
}

/// CORS configuration
#[derive(Debug, Clone)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allow_credentials: bool,
}

#[derive(Clone)]
pub struct AuthConfig {
    pub api_key: String,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("api_key", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub requests_per_minute: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: DEFAULT_RATE_LIMIT_REQUESTS_PER_MINUTE,
        }
    }
}

fn parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.parse().ok())
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let mut database = DbConfig::from_env()?;
        if std::env::var("DB_MAX_CONNECTIONS").is_err() {
            database.max_connections = DEFAULT_DATABASE_MAX_CONNECTIONS;
        }

        let config = Config {
            server: ServerConfig {
                host: std::env::var("HN_HOST").unwrap_or_else(|_| DEFAULT_SERVER_HOST.to_string()),
                port: parsed("HN_PORT").unwrap_or(DEFAULT_SERVER_PORT),
                shutdown_timeout_secs: parsed("HN_SHUTDOWN_TIMEOUT")
                    .unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT_SECS),
            },
            database,
            cors: CorsConfig {
                allowed_origins: std::env::var("CORS_ALLOWED_ORIGINS")
                    .unwrap_or_else(|_| DEFAULT_CORS_ALLOWED_ORIGIN.to_string())
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
                allow_credentials: parsed("CORS_ALLOW_CREDENTIALS").unwrap_or(false),
            },
            auth: AuthConfig {
                api_key: hn_common::error::require_env("API_KEY")?,
            },
            rate_limit: RateLimitConfig {
                requests_per_minute: parsed("RATE_LIMIT_REQUESTS_PER_MINUTE")
                    .unwrap_or(DEFAULT_RATE_LIMIT_REQUESTS_PER_MINUTE),
            },
            etl_enabled: parsed("ETL_ENABLED").unwrap_or(false),
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("Server port must be greater than 0");
        }

        if self.database.max_connections == 0 {
            anyhow::bail!("Database max_connections must be greater than 0");
        }

        if self.auth.api_key.trim().is_empty() {
            anyhow::bail!("API_KEY cannot be empty");
        }

        if self.rate_limit.requests_per_minute == 0 {
            anyhow::bail!("RATE_LIMIT_REQUESTS_PER_MINUTE must be greater than 0");
        }

        // Browsers reject a wildcard origin combined with credentials.
        if self.cors.allow_credentials && self.cors.allowed_origins.iter().any(|o| o == "*") {
            anyhow::bail!("CORS_ALLOW_CREDENTIALS cannot be used with a wildcard origin");
        }

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: [&str; 10] = [
        "DATABASE_URL",
        "DB_MAX_CONNECTIONS",
        "HN_HOST",
        "HN_PORT",
        "API_KEY",
        "CORS_ALLOWED_ORIGINS",
        "CORS_ALLOW_CREDENTIALS",
        "RATE_LIMIT_REQUESTS_PER_MINUTE",
        "ETL_ENABLED",
        "HN_SHUTDOWN_TIMEOUT",
    ];

    fn clear_env() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_load_defaults() {
        clear_env();
        std::env::set_var("DATABASE_URL", "postgresql://localhost/hn");
        std::env::set_var("API_KEY", "secret");

        let config = Config::load().unwrap();
        assert_eq!(config.server.host, DEFAULT_SERVER_HOST);
        assert_eq!(config.server.port, DEFAULT_SERVER_PORT);
        assert_eq!(config.database.max_connections, DEFAULT_DATABASE_MAX_CONNECTIONS);
        assert_eq!(config.rate_limit.requests_per_minute, 10);
        assert_eq!(config.cors.allowed_origins, vec![DEFAULT_CORS_ALLOWED_ORIGIN]);
        assert!(!config.etl_enabled);
        assert!(!format!("{:?}", config).contains("secret"));
        clear_env();
    }

    #[test]
    #[serial]
    fn test_load_requires_api_key() {
        clear_env();
        std::env::set_var("DATABASE_URL", "postgresql://localhost/hn");

        let err = Config::load().unwrap_err();
        assert!(err.to_string().contains("API_KEY"));
        clear_env();
    }

    #[test]
    #[serial]
    fn test_load_overrides() {
        clear_env();
        std::env::set_var("DATABASE_URL", "postgresql://localhost/hn");
        std::env::set_var("API_KEY", "secret");
        std::env::set_var("HN_PORT", "9100");
        std::env::set_var("CORS_ALLOWED_ORIGINS", "https://a.example, https://b.example");
        std::env::set_var("RATE_LIMIT_REQUESTS_PER_MINUTE", "60");
        std::env::set_var("ETL_ENABLED", "true");

        let config = Config::load().unwrap();
        assert_eq!(config.server.port, 9100);
        assert_eq!(
            config.cors.allowed_origins,
            vec!["https://a.example", "https://b.example"]
        );
        assert_eq!(config.rate_limit.requests_per_minute, 60);
        assert!(config.etl_enabled);
        clear_env();
    }

    #[test]
    #[serial]
    fn test_zero_rate_limit_rejected() {
        clear_env();
        std::env::set_var("DATABASE_URL", "postgresql://localhost/hn");
        std::env::set_var("API_KEY", "secret");
        std::env::set_var("RATE_LIMIT_REQUESTS_PER_MINUTE", "0");

        assert!(Config::load().is_err());
        clear_env();
    }
}
