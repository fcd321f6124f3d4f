// src/config.rs

use std::env;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{key} has an invalid value: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Runtime settings, read once at startup and carried in `AppState`.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_expiry: Duration,
    pub refresh_token_expiry: Duration,
    pub bind_addr: String,
    pub port: u16,
    pub db_max_connections: u32,
    pub db_timeout: Duration,
    pub admin_email: String,
    pub admin_password: String,
    pub seed_on_start: bool,
    /// Browser origins allowed by CORS. `*` allows any origin.
    pub cors_origins: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;

        let jwt_secret = match env::var("JWT_SECRET") {
            Ok(s) if !s.is_empty() => s,
            _ if env::var("APP_ENV").as_deref() == Ok("development") => {
                log::warn!("JWT_SECRET not set, using development secret");
                "change-me".to_string()
            }
            _ => return Err(ConfigError::Missing("JWT_SECRET")),
        };

        Ok(Self {
            database_url,
            jwt_secret,
            jwt_expiry: duration_var("JWT_EXPIRY", "24h")?,
            refresh_token_expiry: duration_var("REFRESH_TOKEN_EXPIRY", "7d")?,
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: parsed_var("PORT", 8080)?,
            db_max_connections: parsed_var("DB_MAX_CONNECTIONS", 10)?,
            db_timeout: duration_var("DB_TIMEOUT", "10s")?,
            admin_email: env::var("ADMIN_EMAIL").unwrap_or_else(|_| "admin@ejewel.com".to_string()),
            admin_password: env::var("ADMIN_PASSWORD").unwrap_or_else(|_| "admin123".to_string()),
            seed_on_start: parsed_var("SEED_ON_START", true)?,
            cors_origins: origins_var("CORS_ALLOWED_ORIGINS")?,
        })
    }

    /// Settings for tests and tooling that never touch the environment.
    pub fn for_tests(database_url: &str, jwt_secret: &str) -> Self {
        Self {
            database_url: database_url.to_string(),
            jwt_secret: jwt_secret.to_string(),
            jwt_expiry: Duration::from_secs(24 * 3600),
            refresh_token_expiry: Duration::from_secs(7 * 24 * 3600),
            bind_addr: "127.0.0.1".to_string(),
            port: 0,
            db_max_connections: 2,
            db_timeout: Duration::from_secs(5),
            admin_email: "admin@ejewel.com".to_string(),
            admin_password: "admin123".to_string(),
            seed_on_start: false,
            cors_origins: vec!["*".to_string()],
        }
    }
}

fn parsed_var<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
        _ => Ok(default),
    }
}

fn duration_var(key: &'static str, default: &str) -> Result<Duration, ConfigError> {
    let raw = env::var(key).unwrap_or_else(|_| default.to_string());
    parse_duration(&raw).ok_or(ConfigError::Invalid { key, value: raw })
}

fn origins_var(key: &'static str) -> Result<Vec<String>, ConfigError> {
    let raw = env::var(key).unwrap_or_else(|_| "*".to_string());
    parse_origins(&raw).ok_or(ConfigError::Invalid { key, value: raw })
}

/// Comma-separated origins. Each is `*` or an `http(s)://` origin without a
/// trailing slash. An empty list is rejected.
pub fn parse_origins(raw: &str) -> Option<Vec<String>> {
    let origins: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(String::from)
        .collect();
    let valid = |o: &String| {
        o == "*" || ((o.starts_with("http://") || o.starts_with("https://")) && !o.ends_with('/'))
    };
    (!origins.is_empty() && origins.iter().all(valid)).then_some(origins)
}

/// Parses `<n>[smhd]`. A bare number is read as seconds.
pub fn parse_duration(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    let (digits, unit) = match raw.char_indices().find(|(_, c)| !c.is_ascii_digit()) {
        Some((idx, _)) => raw.split_at(idx),
        None => (raw, "s"),
    };
    let n: u64 = digits.parse().ok()?;
    let secs = match unit {
        "s" => n,
        "m" => n.checked_mul(60)?,
        "h" => n.checked_mul(3600)?,
        "d" => n.checked_mul(86_400)?,
        _ => return None,
    };
    Some(Duration::from_secs(secs))
}
