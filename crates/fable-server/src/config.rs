use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, bail};

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub admin_nickname: Option<String>,
    pub lock_timeout: chrono::Duration,
    pub sweep_interval: Duration,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let jwt_secret = get("FABLE_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("FABLE_JWT_SECRET is unset or still a placeholder; set it in your .env file");
        }

        let db_path = get("FABLE_DB_PATH").unwrap_or_else(|| "fable.db".into()).into();
        let host = get("FABLE_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = get("FABLE_PORT")
            .unwrap_or_else(|| "3018".into())
            .parse()
            .context("FABLE_PORT must be a port number")?;
        let admin_nickname = get("FABLE_ADMIN_NICKNAME").filter(|n| !n.trim().is_empty());

        let lock_timeout_secs = seconds(&get, "FABLE_LOCK_TIMEOUT_SECS", 600)?;
        let sweep_interval_secs = seconds(&get, "FABLE_SWEEP_INTERVAL_SECS", 60)?;

        Ok(Self {
            jwt_secret,
            db_path,
            host,
            port,
            admin_nickname,
            lock_timeout: chrono::Duration::seconds(lock_timeout_secs as i64),
            sweep_interval: Duration::from_secs(sweep_interval_secs),
        })
    }
}

fn seconds(get: &impl Fn(&str) -> Option<String>, key: &str, default: u64) -> anyhow::Result<u64> {
    let secs = match get(key) {
        Some(raw) => raw.parse().with_context(|| format!("{key} must be a whole number of seconds"))?,
        None => default,
    };
    if secs == 0 {
        bail!("{key} must be greater than zero");
    }
    Ok(secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_with_only_a_secret() {
        let config = load(&[("FABLE_JWT_SECRET", "s3cr3t")]).unwrap();
        assert_eq!(config.port, 3018);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.db_path, PathBuf::from("fable.db"));
        assert_eq!(config.lock_timeout, chrono::Duration::minutes(10));
        assert_eq!(config.sweep_interval, Duration::from_secs(60));
        assert!(config.admin_nickname.is_none());
    }

    #[test]
    fn placeholder_or_missing_secret_is_rejected() {
        assert!(load(&[]).is_err());
        assert!(load(&[("FABLE_JWT_SECRET", "dev-secret-change-me")]).is_err());
    }

    #[test]
    fn bad_numbers_are_rejected() {
        assert!(load(&[("FABLE_JWT_SECRET", "x"), ("FABLE_PORT", "http")]).is_err());
        assert!(load(&[("FABLE_JWT_SECRET", "x"), ("FABLE_LOCK_TIMEOUT_SECS", "0")]).is_err());
        let config = load(&[("FABLE_JWT_SECRET", "x"), ("FABLE_ADMIN_NICKNAME", "keeper")]).unwrap();
        assert_eq!(config.admin_nickname.as_deref(), Some("keeper"));
    }
}
