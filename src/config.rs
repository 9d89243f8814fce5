use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use deadpool_postgres::SslMode;

/// Signing secret used when running locally without `JWT_SECRET`.
const LOCAL_JWT_SECRET: &str = "chirp-local-development-secret-do-not-deploy";

/// Secrets shorter than this are rejected in production.
const MIN_PRODUCTION_SECRET_LEN: usize = 32;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub request_timeout: Duration,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub environment: Environment,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub target: DatabaseTarget,
    pub max_connections: usize,
    pub connection_timeout: Duration,
}

/// Where the connection pool points. A full `DATABASE_URL` wins over the
/// individual `DATABASE_*` parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum DatabaseTarget {
    Url(String),
    Params {
        host: String,
        port: u16,
        database: String,
        username: String,
        password: String,
        ssl_mode: SslMode,
    },
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_lifetime: Duration,
    pub bcrypt_cost: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    Local,
    Production,
}

impl Config {
    /// Reads the process environment. `.env` is loaded once by `main`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup so that parsing
    /// can be exercised without mutating the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = Environment::from_name(lookup("ENV").as_deref());

        let port = parse_or(&lookup, "PORT", 8080u16)?;
        let request_timeout = Duration::from_secs(parse_or(&lookup, "REQUEST_TIMEOUT", 30u64)?);

        let config = Config {
            port,
            request_timeout,
            database: DatabaseConfig::from_lookup(&lookup)?,
            auth: AuthConfig::from_lookup(&lookup, &environment)?,
            environment,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.port == 0 {
            anyhow::bail!("PORT must be greater than 0");
        }

        if self.request_timeout.is_zero() {
            anyhow::bail!("REQUEST_TIMEOUT must be greater than 0");
        }

        self.database.validate()?;
        self.auth.validate(&self.environment)?;

        Ok(())
    }
}

impl DatabaseConfig {
    fn from_lookup<F>(lookup: &F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let target = match lookup("DATABASE_URL") {
            Some(url) => DatabaseTarget::Url(url.trim().to_string()),
            None => DatabaseTarget::Params {
                host: lookup("DATABASE_HOST").unwrap_or_else(|| "localhost".to_string()),
                port: parse_or(lookup, "DATABASE_PORT", 5432u16)?,
                database: require(lookup, "DATABASE_NAME")?,
                username: require(lookup, "DATABASE_USERNAME")?,
                password: require(lookup, "DATABASE_PASSWORD")?,
                ssl_mode: parse_ssl_mode(
                    lookup("DATABASE_SSL_MODE").as_deref().unwrap_or("prefer"),
                )?,
            },
        };

        let max_connections = parse_or(lookup, "DATABASE_MAX_CONNECTIONS", 10usize)?;
        let connection_timeout_secs = parse_or(lookup, "DATABASE_CONNECTION_TIMEOUT", 30u64)?;

        Ok(DatabaseConfig {
            target,
            max_connections,
            connection_timeout: Duration::from_secs(connection_timeout_secs),
        })
    }

    pub fn validate(&self) -> Result<()> {
        match &self.target {
            DatabaseTarget::Url(url) => {
                if !url.starts_with("postgresql://") && !url.starts_with("postgres://") {
                    anyhow::bail!("DATABASE_URL must start with 'postgresql://' or 'postgres://'");
                }
            }
            DatabaseTarget::Params { host, port, database, username, .. } => {
                if host.trim().is_empty() {
                    anyhow::bail!("Database host cannot be empty");
                }
                if *port == 0 {
                    anyhow::bail!("Database port must be greater than 0");
                }
                if database.trim().is_empty() {
                    anyhow::bail!("Database name cannot be empty");
                }
                if username.trim().is_empty() {
                    anyhow::bail!("Database username cannot be empty");
                }
            }
        }

        if self.max_connections == 0 {
            anyhow::bail!("DATABASE_MAX_CONNECTIONS must be greater than 0");
        }

        if self.connection_timeout.is_zero() {
            anyhow::bail!("DATABASE_CONNECTION_TIMEOUT must be greater than 0");
        }

        Ok(())
    }

    /// Host description that is safe to log (no credentials).
    pub fn describe(&self) -> String {
        match &self.target {
            DatabaseTarget::Url(url) => {
                let without_scheme = url.split("://").nth(1).unwrap_or(url);
                let host_part = without_scheme.rsplit('@').next().unwrap_or(without_scheme);
                host_part.split('?').next().unwrap_or(host_part).to_string()
            }
            DatabaseTarget::Params { host, port, database, .. } => {
                format!("{}:{}/{}", host, port, database)
            }
        }
    }
}

impl AuthConfig {
    fn from_lookup<F>(lookup: &F, environment: &Environment) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let jwt_secret = match lookup("JWT_SECRET") {
            Some(secret) => secret,
            None if environment.is_production() => {
                anyhow::bail!("JWT_SECRET environment variable is required in production")
            }
            None => {
                tracing::warn!("JWT_SECRET not set, using the local development secret");
                LOCAL_JWT_SECRET.to_string()
            }
        };

        let token_lifetime = Duration::from_secs(parse_or(lookup, "JWT_EXPIRES_IN", 86_400u64)?);
        let bcrypt_cost = parse_or(lookup, "BCRYPT_COST", bcrypt::DEFAULT_COST)?;

        Ok(AuthConfig {
            jwt_secret,
            token_lifetime,
            bcrypt_cost,
        })
    }

    pub fn validate(&self, environment: &Environment) -> Result<()> {
        if self.jwt_secret.trim().is_empty() {
            anyhow::bail!("JWT_SECRET cannot be empty");
        }

        if environment.is_production() && self.jwt_secret.len() < MIN_PRODUCTION_SECRET_LEN {
            anyhow::bail!(
                "JWT_SECRET must be at least {} characters in production",
                MIN_PRODUCTION_SECRET_LEN
            );
        }

        if self.token_lifetime.is_zero() {
            anyhow::bail!("JWT_EXPIRES_IN must be greater than 0");
        }

        if !(4..=31).contains(&self.bcrypt_cost) {
            anyhow::bail!("BCRYPT_COST must be between 4 and 31");
        }

        Ok(())
    }
}

impl Environment {
    /// `production` or `prod` select production; anything else is local.
    pub fn from_name(name: Option<&str>) -> Self {
        match name.map(str::trim) {
            Some("production") | Some("prod") => Environment::Production,
            _ => Environment::Local,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

fn require<F>(lookup: &F, key: &str) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).with_context(|| format!("{} environment variable is required", key))
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{} has an invalid value '{}'", key, raw)),
        None => Ok(default),
    }
}

fn parse_ssl_mode(raw: &str) -> Result<SslMode> {
    match raw.trim() {
        "disable" => Ok(SslMode::Disable),
        "prefer" => Ok(SslMode::Prefer),
        "require" => Ok(SslMode::Require),
        other => anyhow::bail!(
            "Invalid DATABASE_SSL_MODE '{}'. Must be one of: disable, prefer, require",
            other
        ),
    }
}
