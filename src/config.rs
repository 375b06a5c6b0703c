use anyhow::Context;
use serde::Deserialize;

/// Prefixes guarded by the access gateway when `PROTECTED_PATH_PREFIXES` is unset.
pub const DEFAULT_PROTECTED_PREFIXES: &[&str] = &["/api/profile"];

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub db_max_connections: u32,
    pub jwt: JwtConfig,
    pub protected_prefixes: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let database_url = var("DATABASE_URL").context("DATABASE_URL is not set")?;

        let secret = var("JWT_SECRET").context("JWT_SECRET is not set")?;
        if secret.trim().is_empty() {
            anyhow::bail!("JWT_SECRET is empty");
        }

        let db_max_connections = var("DB_MAX_CONNECTIONS")
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(10);

        let protected_prefixes = var("PROTECTED_PATH_PREFIXES")
            .map(|v| parse_prefixes(&v))
            .unwrap_or_else(default_prefixes);

        Ok(Self {
            database_url,
            db_max_connections,
            jwt: JwtConfig { secret },
            protected_prefixes,
        })
    }
}

pub fn default_prefixes() -> Vec<String> {
    DEFAULT_PROTECTED_PREFIXES
        .iter()
        .map(|p| p.to_string())
        .collect()
}

fn parse_prefixes(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}
