use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::db::DbConfig;
use crate::retry::{BackoffPolicy, RetryPolicy};

/// Which store backend serves rooms and the roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Postgres,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            other => bail!("unknown store backend '{other}'; use 'memory' or 'postgres'"),
        }
    }
}

/// Limits applied by the occupancy service to store calls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServiceConfig {
    /// Deadline for each individual store call.
    pub store_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            store_timeout: Duration::from_millis(5000),
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub log_level: String,
    pub dev_mode: bool,
    pub store: StoreBackend,
    pub database: DbConfig,
    pub rooms_file: Option<PathBuf>,
    pub roster_file: Option<PathBuf>,
    pub service: ServiceConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let listen_addr = match (var("SENTRYDASH_LISTEN_ADDR"), var("PORT")) {
            (Some(addr), _) => addr,
            (None, Some(port)) => format!("0.0.0.0:{}", port.trim()),
            (None, None) => "0.0.0.0:3000".to_string(),
        }
        .parse()
        .context("invalid SENTRYDASH_LISTEN_ADDR/PORT")?;

        let log_level = var("SENTRYDASH_LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        let dev_mode = var("SENTRYDASH_DEV")
            .map(|v| v == "1" || v.to_lowercase() == "true")
            .unwrap_or(false);

        let store = match var("SENTRYDASH_STORE") {
            Some(v) => v.parse()?,
            None => StoreBackend::Memory,
        };

        let defaults = DbConfig::default();
        let database = DbConfig {
            database_url: var("DATABASE_URL").unwrap_or(defaults.database_url.clone()),
            max_connections: parse_or(&var, "DB_MAX_CONNECTIONS", defaults.max_connections)?,
            min_connections: parse_or(&var, "DB_MIN_CONNECTIONS", defaults.min_connections)?,
            ..defaults
        };
        if store == StoreBackend::Postgres && var("DATABASE_URL").is_none() {
            bail!("DATABASE_URL is required when SENTRYDASH_STORE=postgres");
        }

        let service_defaults = ServiceConfig::default();
        let backoff_defaults = service_defaults.retry.backoff;
        let max_attempts = parse_or(
            &var,
            "SENTRYDASH_CAS_MAX_ATTEMPTS",
            service_defaults.retry.max_attempts,
        )?;
        if max_attempts == 0 {
            bail!("SENTRYDASH_CAS_MAX_ATTEMPTS must be at least 1");
        }
        let service = ServiceConfig {
            store_timeout: millis_or(
                &var,
                "SENTRYDASH_STORE_TIMEOUT_MS",
                service_defaults.store_timeout,
            )?,
            retry: RetryPolicy {
                max_attempts,
                backoff: BackoffPolicy {
                    base: millis_or(&var, "SENTRYDASH_CAS_BACKOFF_BASE_MS", backoff_defaults.base)?,
                    max: millis_or(&var, "SENTRYDASH_CAS_BACKOFF_MAX_MS", backoff_defaults.max)?,
                    ..backoff_defaults
                },
            },
        };
        if service.store_timeout.is_zero() {
            bail!("SENTRYDASH_STORE_TIMEOUT_MS must be greater than zero");
        }

        Ok(Self {
            listen_addr,
            log_level,
            dev_mode,
            store,
            database,
            rooms_file: var("SENTRYDASH_ROOMS_FILE").map(PathBuf::from),
            roster_file: var("SENTRYDASH_ROSTER_FILE").map(PathBuf::from),
            service,
        })
    }
}

fn parse_or<T, F>(var: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(v) => v
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {key}: '{v}'")),
        None => Ok(default),
    }
}

fn millis_or<F>(var: &F, key: &str, default: Duration) -> Result<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    let fallback = u64::try_from(default.as_millis()).unwrap_or(u64::MAX);
    parse_or(var, key, fallback).map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults() {
        let c = config(&[]).unwrap();
        assert_eq!(c.listen_addr, "0.0.0.0:3000".parse().unwrap());
        assert_eq!(c.store, StoreBackend::Memory);
        assert_eq!(c.log_level, "info");
        assert!(!c.dev_mode);
        assert_eq!(c.service.store_timeout, Duration::from_millis(5000));
        assert_eq!(c.service.retry.max_attempts, 8);
        assert_eq!(c.service.retry.backoff.base, Duration::from_millis(10));
        assert_eq!(c.service.retry.backoff.max, Duration::from_millis(500));
        assert!(c.rooms_file.is_none());
    }

    #[test]
    fn port_is_used_when_no_listen_addr() {
        let c = config(&[("PORT", "8081")]).unwrap();
        assert_eq!(c.listen_addr.port(), 8081);

        let c = config(&[("PORT", "8081"), ("SENTRYDASH_LISTEN_ADDR", "127.0.0.1:9000")]).unwrap();
        assert_eq!(c.listen_addr, "127.0.0.1:9000".parse().unwrap());
    }

    #[test]
    fn overrides_are_parsed() {
        let c = config(&[
            ("SENTRYDASH_DEV", "true"),
            ("SENTRYDASH_STORE", "postgres"),
            ("DATABASE_URL", "postgres://db/sentrydash"),
            ("DB_MAX_CONNECTIONS", "4"),
            ("SENTRYDASH_STORE_TIMEOUT_MS", "250"),
            ("SENTRYDASH_CAS_MAX_ATTEMPTS", "3"),
            ("SENTRYDASH_ROOMS_FILE", "data/rooms.json"),
        ])
        .unwrap();
        assert!(c.dev_mode);
        assert_eq!(c.store, StoreBackend::Postgres);
        assert_eq!(c.database.max_connections, 4);
        assert_eq!(c.database.database_url, "postgres://db/sentrydash");
        assert_eq!(c.service.store_timeout, Duration::from_millis(250));
        assert_eq!(c.service.retry.max_attempts, 3);
        assert_eq!(c.rooms_file, Some(PathBuf::from("data/rooms.json")));
    }

    #[test]
    fn invalid_values_fail() {
        assert!(config(&[("SENTRYDASH_STORE", "cosmos")]).is_err());
        assert!(config(&[("SENTRYDASH_CAS_MAX_ATTEMPTS", "zero")]).is_err());
        assert!(config(&[("SENTRYDASH_CAS_MAX_ATTEMPTS", "0")]).is_err());
        assert!(config(&[("SENTRYDASH_STORE_TIMEOUT_MS", "0")]).is_err());
        assert!(config(&[("SENTRYDASH_STORE", "postgres")]).is_err());
        assert!(config(&[("SENTRYDASH_LISTEN_ADDR", "nowhere")]).is_err());
    }
}
