use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub session: SessionConfig,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_size: u32,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub cookie_secure: bool,
    /// Sessions not written to for this many days are treated as gone and purged.
    pub idle_days: i64,
}

/// Reads configuration from the process environment. `.env` is expected to be loaded already
/// (see `bootstrap::init_env`).
pub fn load() -> Result<AppConfig> {
    let url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let pool_size = parse_or("DB_POOL_SIZE", 10)?;
    let host = std::env::var("SERVER_HOST").unwrap_or("0.0.0.0".to_string());
    let port = parse_or("SERVER_PORT", 3000)?;
    let cookie_secure = parse_or("SESSION_COOKIE_SECURE", false)?;
    let idle_days = parse_or("SESSION_IDLE_DAYS", 14)?;

    Ok(AppConfig {
        database: DatabaseConfig { url, pool_size },
        server: ServerConfig { host, port },
        session: SessionConfig {
            cookie_secure,
            idle_days,
        },
    })
}

fn parse_or<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value: {raw}")),
        Err(_) => Ok(default),
    }
}
