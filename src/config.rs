use anyhow::Context;
use std::net::{IpAddr, SocketAddr};

/// Runtime settings, read from the environment (and `.env` if present).
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub max_connections: u32,
    pub host: IpAddr,
    pub port: u16,
    /// Run every task write inside a single transaction.
    pub atomic_writes: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite:tasks.db?mode=rwc".to_string(),
            max_connections: 5,
            host: IpAddr::from([127, 0, 0, 1]),
            port: 3000,
            atomic_writes: false,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let database_url = lookup("DATABASE_URL").unwrap_or(defaults.database_url);

        let max_connections = match lookup("DATABASE_MAX_CONNECTIONS") {
            Some(value) => value
                .parse()
                .with_context(|| format!("Invalid DATABASE_MAX_CONNECTIONS: {}", value))?,
            None => defaults.max_connections,
        };

        let host = match lookup("HOST") {
            Some(value) => value
                .parse()
                .with_context(|| format!("Invalid HOST: {}", value))?,
            None => defaults.host,
        };

        let port = match lookup("PORT") {
            Some(value) => value
                .parse()
                .with_context(|| format!("Invalid PORT: {}", value))?,
            None => defaults.port,
        };

        let atomic_writes = match lookup("TASKS_ATOMIC_WRITES") {
            Some(value) => parse_flag(&value)
                .with_context(|| format!("Invalid TASKS_ATOMIC_WRITES: {}", value))?,
            None => defaults.atomic_writes,
        };

        Ok(Self {
            database_url,
            max_connections,
            host,
            port,
            atomic_writes,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn parse_flag(value: &str) -> anyhow::Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => anyhow::bail!("expected a boolean, got {:?}", other),
    }
}
