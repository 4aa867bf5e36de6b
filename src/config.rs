use std::str::FromStr;

use crate::ConfigError;

pub const DATABASE_URL: &str = "DATABASE_URL";
pub const BIND_ADDR: &str = "BIND_ADDR";
pub const JWT_SECRET: &str = "JWT_SECRET";
pub const TOKEN_TTL_HOURS: &str = "TOKEN_TTL_HOURS";
pub const ROOM_CODE_DIGITS: &str = "ROOM_CODE_DIGITS";
pub const DB_MAX_CONNECTIONS: &str = "DB_MAX_CONNECTIONS";
pub const RUST_LOG: &str = "RUST_LOG";

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub jwt_secret: String,
    pub token_ttl: time::Duration,
    pub room_code_digits: u32,
    pub db_max_connections: u32,
    pub log_level: String,
}

impl Config {
    /// Reads settings from the process environment (and `.env`, if loaded).
    pub fn from_env() -> Result<Config, ConfigError> {
        Self::from_lookup(|key| dotenv::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Config, ConfigError> {
        let jwt_secret = lookup(JWT_SECRET)
            .filter(|secret| !secret.is_empty())
            .ok_or(ConfigError::Missing(JWT_SECRET))?;

        let room_code_digits = parse_or(&lookup, ROOM_CODE_DIGITS, 6)?;
        if !(4..=9).contains(&room_code_digits) {
            return Err(ConfigError::Invalid {
                key: ROOM_CODE_DIGITS,
                value: room_code_digits.to_string(),
            });
        }

        Ok(Config {
            database_url: lookup(DATABASE_URL).unwrap_or_else(|| "sqlite://twosome.db".to_owned()),
            bind_addr: lookup(BIND_ADDR).unwrap_or_else(|| "0.0.0.0:8080".to_owned()),
            jwt_secret,
            token_ttl: time::Duration::hours(parse_or(&lookup, TOKEN_TTL_HOURS, 168)?),
            room_code_digits,
            db_max_connections: parse_or(&lookup, DB_MAX_CONNECTIONS, 16)?,
            log_level: lookup(RUST_LOG).unwrap_or_else(|| "info".to_owned()),
        })
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}
