use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::warn;

/// Secrets that must never protect a real deployment.
const PLACEHOLDER_SECRETS: &[&str] = &["dev-secret-change-me", "change-me-to-a-random-string"];

const DEFAULT_PORT: u16 = 3000;

/// Accepted session lifetimes: one hour to ten years.
const SESSION_TTL_RANGE: std::ops::RangeInclusive<i64> = 1..=87_600;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub static_dir: PathBuf,
    pub session_secret: String,
    pub session_ttl_hours: i64,
    pub secure_cookies: bool,
    pub google: Option<GoogleConfig>,
}

#[derive(Debug, Clone)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    pub callback_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; `from_env` passes the process
    /// environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let host = var("TURPS_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port = match var("PORT") {
            Some(p) => p.trim().parse().with_context(|| format!("PORT is not a port number: {p}"))?,
            None => DEFAULT_PORT,
        };

        let session_secret = var("TURPS_SESSION_SECRET").unwrap_or_else(|| "dev-secret-change-me".into());
        if PLACEHOLDER_SECRETS.contains(&session_secret.as_str()) {
            warn!("TURPS_SESSION_SECRET is unset or a placeholder; sessions are forgeable by anyone who reads this source");
        }

        let session_ttl_hours = match var("TURPS_SESSION_TTL_HOURS") {
            Some(h) => h.trim().parse().context("TURPS_SESSION_TTL_HOURS must be an integer")?,
            None => 168,
        };
        if !SESSION_TTL_RANGE.contains(&session_ttl_hours) {
            anyhow::bail!(
                "TURPS_SESSION_TTL_HOURS must be between {} and {}, got {}",
                SESSION_TTL_RANGE.start(),
                SESSION_TTL_RANGE.end(),
                session_ttl_hours
            );
        }

        let secure_cookies = var("TURPS_SECURE_COOKIES")
            .map(|v| matches!(v.trim(), "1" | "true" | "yes"))
            .unwrap_or(false);

        let google = match (var("GOOGLE_CLIENT_ID"), var("GOOGLE_CLIENT_SECRET")) {
            (Some(client_id), Some(client_secret)) => Some(GoogleConfig {
                client_id,
                client_secret,
                callback_url: var("GOOGLE_CALLBACK_URL")
                    .unwrap_or_else(|| format!("http://localhost:{port}/auth/google/chat")),
            }),
            _ => None,
        };

        Ok(Self {
            host,
            port,
            db_path: var("TURPS_DB_PATH").unwrap_or_else(|| "turps.db".into()).into(),
            static_dir: var("TURPS_STATIC_DIR").unwrap_or_else(|| "public".into()).into(),
            session_secret,
            session_ttl_hours,
            secure_cookies,
            google,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<Config> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.db_path, PathBuf::from("turps.db"));
        assert_eq!(config.session_ttl_hours, 168);
        assert!(!config.secure_cookies);
        assert!(config.google.is_none());
    }

    #[test]
    fn empty_port_uses_default() {
        let config = load(&[("PORT", "")]).unwrap();
        assert_eq!(config.port, 3000);

        let config = load(&[("PORT", "8080")]).unwrap();
        assert_eq!(config.port, 8080);

        assert!(load(&[("PORT", "not-a-port")]).is_err());
    }

    #[test]
    fn session_ttl_must_be_in_range() {
        assert_eq!(load(&[("TURPS_SESSION_TTL_HOURS", "24")]).unwrap().session_ttl_hours, 24);
        assert_eq!(load(&[("TURPS_SESSION_TTL_HOURS", "87600")]).unwrap().session_ttl_hours, 87_600);

        for bad in ["0", "-5", "87601", "2000000000000"] {
            assert!(load(&[("TURPS_SESSION_TTL_HOURS", bad)]).is_err(), "{bad}");
        }
    }

    #[test]
    fn google_needs_both_credentials() {
        assert!(load(&[("GOOGLE_CLIENT_ID", "id")]).unwrap().google.is_none());

        let config = load(&[
            ("GOOGLE_CLIENT_ID", "id"),
            ("GOOGLE_CLIENT_SECRET", "secret"),
            ("PORT", "4000"),
        ])
        .unwrap();
        let google = config.google.unwrap();
        assert_eq!(google.callback_url, "http://localhost:4000/auth/google/chat");
    }
}
