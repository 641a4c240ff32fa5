use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

use anyhow::{bail, Context, Result};

use crate::engine::DEFAULT_OVULATION_DAY;

/// Longest cycle offset accepted for `OVULATION_DAY`.
pub const MAX_OVULATION_DAY: i64 = 60;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub db_max_connections: u32,
    pub ovulation_day: i64,
}

impl Config {
    /// Reads the process environment. Call after `dotenvy::dotenv()`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let database_url = lookup("DATABASE_URL").context("DATABASE_URL must be set")?;
        let config = Self {
            database_url,
            bind_addr: parse_or(&lookup, "BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 3050)))?,
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", 5)?,
            ovulation_day: parse_or(&lookup, "OVULATION_DAY", DEFAULT_OVULATION_DAY)?,
        };

        // The fertile window starts three days before ovulation.
        if !(4..=MAX_OVULATION_DAY).contains(&config.ovulation_day) {
            bail!(
                "OVULATION_DAY must be between 4 and {}, got {}",
                MAX_OVULATION_DAY,
                config.ovulation_day
            );
        }
        Ok(config)
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid {key}: `{raw}`")),
        None => Ok(default),
    }
}
