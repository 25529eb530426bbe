use std::time::Duration;

use anyhow::{anyhow, Context};

use crate::sweeper::ExpiryPolicy;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    Memory,
    Sqlite(String),
    Firebase { url: String, auth: Option<String> },
}

impl Backend {
    pub fn kind(&self) -> &'static str {
        match self {
            Backend::Memory => "memory",
            Backend::Sqlite(_) => "sqlite",
            Backend::Firebase { .. } => "firebase",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub bind: String,
    pub backend: Backend,
    pub expiry: ExpiryPolicy,
}

impl Config {
    /// Reads `.env` and the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| dotenv::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let bind = lookup("CHAT_BIND").unwrap_or_else(|| "0.0.0.0:8080".to_owned());

        let database_url = lookup("DATABASE_URL");
        let kind = lookup("CHAT_STORE").unwrap_or_else(|| {
            let kind = if database_url.is_some() { "sqlite" } else { "memory" };
            kind.to_owned()
        });

        let backend = match kind.as_str() {
            "memory" => Backend::Memory,
            "sqlite" => Backend::Sqlite(
                database_url.ok_or_else(|| anyhow!("CHAT_STORE=sqlite needs DATABASE_URL"))?,
            ),
            "firebase" => Backend::Firebase {
                url: lookup("FIREBASE_DATABASE_URL")
                    .ok_or_else(|| anyhow!("CHAT_STORE=firebase needs FIREBASE_DATABASE_URL"))?,
                auth: lookup("FIREBASE_AUTH"),
            },
            other => return Err(anyhow!("unknown CHAT_STORE {other:?}")),
        };

        let defaults = ExpiryPolicy::default();
        let expiry = ExpiryPolicy {
            ttl: secs(&lookup, "CHAT_MESSAGE_TTL_SECS")?.unwrap_or(defaults.ttl),
            interval: secs(&lookup, "CHAT_SWEEP_INTERVAL_SECS")?.unwrap_or(defaults.interval),
        };
        if expiry.interval.is_zero() {
            return Err(anyhow!("CHAT_SWEEP_INTERVAL_SECS must be positive"));
        }

        Ok(Self { bind, backend, expiry })
    }
}

fn secs(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> anyhow::Result<Option<Duration>> {
    lookup(key)
        .map(|v| v.parse::<u64>().map(Duration::from_secs).with_context(|| format!("{key}={v:?}")))
        .transpose()
}
