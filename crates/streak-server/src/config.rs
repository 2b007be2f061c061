use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use chrono::TimeDelta;
use tracing::{info, warn};

/// Placeholder JWT secrets that are only acceptable for local development.
const PLACEHOLDER_SECRETS: &[&str] = &["dev-secret-change-me", "change-me-to-a-random-string"];

const MAX_TOKEN_TTL_MINUTES: i64 = 60 * 24 * 365;

pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub token_ttl: TimeDelta,
    pub max_upload_bytes: usize,
    pub gemini: Option<GeminiConfig>,
}

pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

impl Config {
    pub fn load() -> Result<Self> {
        let jwt_secret = var_or("STREAK_JWT_SECRET", "dev-secret-change-me");
        if PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            warn!("STREAK_JWT_SECRET is a placeholder; tokens are forgeable. Set it in .env");
        }

        let gemini = match env::var("GEMINI_API_KEY") {
            Ok(api_key) if !api_key.trim().is_empty() => Some(GeminiConfig {
                api_key,
                model: var_or("GEMINI_MODEL", "gemini-1.5-flash"),
                base_url: var_or("GEMINI_BASE_URL", "https://generativelanguage.googleapis.com"),
            }),
            _ => {
                warn!("GEMINI_API_KEY not set, /predict will answer 503");
                None
            }
        };

        Ok(Self {
            host: var_or("STREAK_HOST", "0.0.0.0"),
            port: parse_or("STREAK_PORT", "8000")?,
            db_path: var_or("STREAK_DB_PATH", "streak.db").into(),
            jwt_secret,
            token_ttl: token_ttl(parse_or("STREAK_TOKEN_TTL_MINUTES", "30")?)?,
            max_upload_bytes: parse_or("STREAK_MAX_UPLOAD_BYTES", "10485760")?,
            gemini,
        })
    }
}

/// Token lifetime; must be positive and at most a year.
fn token_ttl(minutes: i64) -> Result<TimeDelta> {
    if minutes <= 0 || minutes > MAX_TOKEN_TTL_MINUTES {
        bail!("STREAK_TOKEN_TTL_MINUTES must be between 1 and {MAX_TOKEN_TTL_MINUTES}, got {minutes}");
    }
    TimeDelta::try_minutes(minutes)
        .with_context(|| format!("STREAK_TOKEN_TTL_MINUTES {minutes} is out of range"))
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    })
}

fn parse_or<T>(key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    let raw = var_or(key, default);
    raw.parse::<T>()
        .map_err(|e| anyhow::anyhow!("{e}"))
        .with_context(|| format!("invalid {key} value {raw:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_ttl_must_be_positive_and_bounded() {
        assert_eq!(token_ttl(30).unwrap(), TimeDelta::minutes(30));
        assert!(token_ttl(0).is_err());
        assert!(token_ttl(-5).is_err());
        assert!(token_ttl(i64::MAX).is_err());
        assert!(token_ttl(MAX_TOKEN_TTL_MINUTES + 1).is_err());
    }
}
