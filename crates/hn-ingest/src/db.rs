//! PostgreSQL connection settings, pool creation and migrations

use sqlx::migrate::Migrator;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Migrations shared by the ingest worker and the read API.
pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

/// Database operation errors with contextual information
#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database query failed: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Database migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Database configuration error: {0}. Set DATABASE_URL or DB_USER/DB_PASSWORD/DB_HOST/DB_PORT/DB_NAME.")]
    Config(String),
}

pub type DbResult<T> = Result<T, DbError>;

/// Where the database lives: a full URL, or the individual parts.
#[derive(Clone)]
pub enum DbTarget {
    Url(String),
    Parts {
        host: String,
        port: u16,
        user: String,
        password: String,
        database: String,
    },
}

impl std::fmt::Debug for DbTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DbTarget::Url(_) => f.write_str("Url(<redacted>)"),
            DbTarget::Parts {
                host,
                port,
                user,
                database,
                ..
            } => f
                .debug_struct("Parts")
                .field("host", host)
                .field("port", port)
                .field("user", user)
                .field("database", database)
                .finish_non_exhaustive(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub target: DbTarget,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: Option<u64>,
}

impl DbConfig {
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            target: DbTarget::Url(url.into()),
            max_connections: 2,
            min_connections: 0,
            connect_timeout_secs: 10,
            idle_timeout_secs: Some(600),
        }
    }

    /// Load from `DATABASE_URL`, or from `DB_USER`, `DB_PASSWORD`, `DB_HOST`,
    /// `DB_PORT` and `DB_NAME` when no URL is given. Pool sizing comes from
    /// `DB_MAX_CONNECTIONS`, `DB_MIN_CONNECTIONS`, `DB_CONNECT_TIMEOUT` and
    /// `DB_IDLE_TIMEOUT`.
    pub fn from_env() -> DbResult<Self> {
        let target = match std::env::var("DATABASE_URL") {
            Ok(url) if !url.trim().is_empty() => DbTarget::Url(url),
            _ => DbTarget::Parts {
                host: required("DB_HOST")?,
                port: required("DB_PORT")?
                    .parse()
                    .map_err(|_| DbError::Config("DB_PORT must be a port number".to_string()))?,
                user: required("DB_USER")?,
                password: required("DB_PASSWORD")?,
                database: required("DB_NAME")?,
            },
        };

        let defaults = Self::from_url(String::new());

        Ok(Self {
            target,
            max_connections: parsed("DB_MAX_CONNECTIONS").unwrap_or(defaults.max_connections),
            min_connections: parsed("DB_MIN_CONNECTIONS").unwrap_or(defaults.min_connections),
            connect_timeout_secs: parsed("DB_CONNECT_TIMEOUT")
                .unwrap_or(defaults.connect_timeout_secs),
            idle_timeout_secs: parsed("DB_IDLE_TIMEOUT").or(defaults.idle_timeout_secs),
        })
    }

    pub fn connect_options(&self) -> DbResult<PgConnectOptions> {
        match &self.target {
            DbTarget::Url(url) => Ok(PgConnectOptions::from_str(url)?),
            DbTarget::Parts {
                host,
                port,
                user,
                password,
                database,
            } => Ok(PgConnectOptions::new()
                .host(host)
                .port(*port)
                .username(user)
                .password(password)
                .database(database)),
        }
    }
}

fn required(name: &str) -> DbResult<String> {
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(DbError::Config(format!("{} not set", name))),
    }
}

fn parsed<T: FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.parse().ok())
}

pub async fn create_pool(config: &DbConfig) -> DbResult<PgPool> {
    let mut options = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs));

    if let Some(idle_timeout) = config.idle_timeout_secs {
        options = options.idle_timeout(Duration::from_secs(idle_timeout));
    }

    let pool = options.connect_with(config.connect_options()?).await?;

    tracing::debug!(
        max_connections = config.max_connections,
        target = ?config.target,
        "Database connection pool created"
    );

    Ok(pool)
}

pub async fn run_migrations(pool: &PgPool) -> DbResult<()> {
    MIGRATOR.run(pool).await?;
    tracing::info!("Database migrations completed");
    Ok(())
}

pub async fn health_check(pool: &PgPool) -> DbResult<()> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .map(|_| ())
        .map_err(DbError::from)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serial_test::serial;

    const DB_VARS: [&str; 6] = [
        "DATABASE_URL",
        "DB_HOST",
        "DB_PORT",
        "DB_USER",
        "DB_PASSWORD",
        "DB_NAME",
    ];

    fn clear_env() {
        for var in DB_VARS {
            std::env::remove_var(var);
        }
        std::env::remove_var("DB_MAX_CONNECTIONS");
    }

    #[test]
    #[serial]
    fn test_config_from_url() {
        clear_env();
        std::env::set_var("DATABASE_URL", "postgresql://localhost/hn_test");
        std::env::set_var("DB_MAX_CONNECTIONS", "4");

        let config = DbConfig::from_env().unwrap();
        assert!(matches!(config.target, DbTarget::Url(ref u) if u.ends_with("/hn_test")));
        assert_eq!(config.max_connections, 4);
        clear_env();
    }

    #[test]
    #[serial]
    fn test_config_from_parts() {
        clear_env();
        std::env::set_var("DB_HOST", "db.internal");
        std::env::set_var("DB_PORT", "5433");
        std::env::set_var("DB_USER", "etl");
        std::env::set_var("DB_PASSWORD", "p@ss:word/1");
        std::env::set_var("DB_NAME", "hn");

        let config = DbConfig::from_env().unwrap();
        let options = config.connect_options().unwrap();
        assert_eq!(options.get_host(), "db.internal");
        assert_eq!(options.get_port(), 5433);
        assert_eq!(options.get_database(), Some("hn"));

        let debug = format!("{:?}", config);
        assert!(!debug.contains("p@ss"));
        clear_env();
    }

    #[test]
    #[serial]
    fn test_config_missing_parts() {
        clear_env();
        std::env::set_var("DB_HOST", "db.internal");
        let err = DbConfig::from_env().unwrap_err();
        assert!(err.to_string().contains("DB_PORT"));
        clear_env();
    }
}
