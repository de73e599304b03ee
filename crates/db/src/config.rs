use std::str::FromStr;
use std::time::Duration;

use sqlx::postgres::PgConnectOptions;
use ultitracker_core::naming::validate_schema_name;

use crate::error::DbError;

/// Default schema holding every table.
pub const DEFAULT_SCHEMA: &str = "ultitracker";

/// Database connection settings.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Full connection URL; when set it overrides the individual parts.
    pub database_url: Option<String>,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,
    /// Schema that holds the catalog tables; put first on the `search_path`.
    pub schema: String,
    pub max_connections: u32,
    /// Attempts made to open the pool before giving up.
    pub connect_retries: u32,
    /// Fixed sleep between connection attempts.
    pub connect_backoff: Duration,
}

impl DbConfig {
    /// Load database configuration from environment variables.
    ///
    /// | Env Var                 | Default        |
    /// |-------------------------|----------------|
    /// | `DATABASE_URL`          | unset          |
    /// | `POSTGRES_HOSTNAME`     | `localhost`    |
    /// | `POSTGRES_PORT`         | `5432`         |
    /// | `POSTGRES_USERNAME`     | `postgres`     |
    /// | `POSTGRES_PASSWORD`     | empty          |
    /// | `POSTGRES_DATABASE`     | `ultitracker`  |
    /// | `POSTGRES_SCHEMA`       | `ultitracker`  |
    /// | `DB_MAX_CONNECTIONS`    | `10`           |
    /// | `DB_CONNECT_RETRIES`    | `5`            |
    /// | `DB_CONNECT_BACKOFF_MS` | `1000`         |
    ///
    /// # Panics
    ///
    /// Panics if a numeric variable does not parse or the schema name is
    /// not a plain identifier.
    pub fn from_env() -> Self {
        let database_url = std::env::var("DATABASE_URL").ok().filter(|s| !s.is_empty());
        let host = env_or("POSTGRES_HOSTNAME", "localhost");
        let port: u16 = env_or("POSTGRES_PORT", "5432")
            .parse()
            .expect("POSTGRES_PORT must be a valid u16");
        let username = env_or("POSTGRES_USERNAME", "postgres");
        let password = env_or("POSTGRES_PASSWORD", "");
        let database = env_or("POSTGRES_DATABASE", "ultitracker");

        let schema = env_or("POSTGRES_SCHEMA", DEFAULT_SCHEMA);
        if let Err(e) = validate_schema_name(&schema) {
            panic!("POSTGRES_SCHEMA is invalid: {e}");
        }

        let max_connections: u32 = env_or("DB_MAX_CONNECTIONS", "10")
            .parse()
            .expect("DB_MAX_CONNECTIONS must be a valid u32");
        let connect_retries: u32 = env_or("DB_CONNECT_RETRIES", "5")
            .parse()
            .expect("DB_CONNECT_RETRIES must be a valid u32");
        let backoff_ms: u64 = env_or("DB_CONNECT_BACKOFF_MS", "1000")
            .parse()
            .expect("DB_CONNECT_BACKOFF_MS must be a valid u64");

        Self {
            database_url,
            host,
            port,
            username,
            password,
            database,
            schema,
            max_connections,
            connect_retries,
            connect_backoff: Duration::from_millis(backoff_ms),
        }
    }

    /// Build connection options with the configured schema first on the
    /// `search_path`, so repositories can use unqualified table names.
    pub fn connect_options(&self) -> Result<PgConnectOptions, DbError> {
        let options = match &self.database_url {
            Some(url) => PgConnectOptions::from_str(url)?,
            None => PgConnectOptions::new()
                .host(&self.host)
                .port(self.port)
                .username(&self.username)
                .password(&self.password)
                .database(&self.database),
        };

        self.scope_to_schema(options)
    }

    /// Put the configured schema first on the `search_path` of `options`.
    pub fn scope_to_schema(&self, options: PgConnectOptions) -> Result<PgConnectOptions, DbError> {
        validate_schema_name(&self.schema).map_err(|e| DbError::Config(e.to_string()))?;
        // Startup options split on whitespace, so the list carries no spaces.
        Ok(options.options([("search_path", format!("{},public", self.schema))]))
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
