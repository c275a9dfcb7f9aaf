use std::path::PathBuf;

use anyhow::Context;
use tracing::warn;

/// Placeholder JWT secrets that should never reach production.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

/// Token lifetimes accepted from `HUB_TOKEN_TTL_DAYS`, in days.
const TOKEN_TTL_DAYS: std::ops::RangeInclusive<i64> = 1..=3650;

#[derive(Debug, Clone)]
pub struct HubConfig {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub token_ttl_days: i64,
    /// Accounts registering with this email are created as admins.
    pub admin_email: Option<String>,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "dev-secret-change-me".into(),
            db_path: PathBuf::from("rules-hub.db"),
            host: "0.0.0.0".into(),
            port: 3000,
            token_ttl_days: 30,
            admin_email: None,
        }
    }
}

impl HubConfig {
    /// Read `HUB_*` variables, falling back to the defaults. Malformed numbers are errors.
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let jwt_secret = std::env::var("HUB_JWT_SECRET").unwrap_or(defaults.jwt_secret);
        if PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            warn!("HUB_JWT_SECRET is unset or still a placeholder; tokens are forgeable");
        }

        let port = match std::env::var("HUB_PORT") {
            Ok(v) => v.parse().with_context(|| format!("invalid HUB_PORT '{v}'"))?,
            Err(_) => defaults.port,
        };
        let token_ttl_days = match std::env::var("HUB_TOKEN_TTL_DAYS") {
            Ok(v) => parse_ttl_days(&v)?,
            Err(_) => defaults.token_ttl_days,
        };

        Ok(Self {
            jwt_secret,
            db_path: std::env::var("HUB_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
            host: std::env::var("HUB_HOST").unwrap_or(defaults.host),
            port,
            token_ttl_days,
            admin_email: std::env::var("HUB_ADMIN_EMAIL")
                .ok()
                .map(|e| e.trim().to_lowercase())
                .filter(|e| !e.is_empty()),
        })
    }

    pub fn is_admin_email(&self, email: &str) -> bool {
        self.admin_email.as_deref() == Some(email)
    }
}

fn parse_ttl_days(raw: &str) -> anyhow::Result<i64> {
    let days: i64 = raw
        .trim()
        .parse()
        .with_context(|| format!("invalid HUB_TOKEN_TTL_DAYS '{raw}'"))?;
    anyhow::ensure!(
        TOKEN_TTL_DAYS.contains(&days),
        "HUB_TOKEN_TTL_DAYS must be between {} and {}, got {days}",
        TOKEN_TTL_DAYS.start(),
        TOKEN_TTL_DAYS.end()
    );
    Ok(days)
}
