use std::env;
use std::net::SocketAddr;
use anyhow::{Context, Result};
use zeroize::Zeroizing;

/// Placeholder secret shipped in sample env files. Never accepted.
const PLACEHOLDER_SECRET: &str = "change-this-secret";
/// Minimum length of the session secret in bytes.
pub const MIN_SECRET_LEN: usize = 32;

/// The application's configuration.
#[derive(Clone)]
pub struct Config {
    /// The URL of the PostgreSQL database. `None` selects the in-memory store.
    pub database_url: Option<String>,
    /// The duration of a session in days.
    pub session_duration_days: i64,
    /// The key used to sign session tokens.
    pub session_secret: Zeroizing<Vec<u8>>,
    /// The address the HTTP server binds to.
    pub bind_addr: SocketAddr,
    /// Whether the session cookie carries the `Secure` attribute.
    pub cookie_secure: bool,
}

impl Config {
    /// Creates a new `Config` from environment variables.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `Config`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Creates a new `Config` from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let secret = Zeroizing::new(
            lookup("SESSION_SECRET")
                .context("SESSION_SECRET must be set (generate with: openssl rand -hex 32)")?,
        );

        if secret.as_str() == PLACEHOLDER_SECRET {
            anyhow::bail!("SESSION_SECRET is still the placeholder value, set a real secret");
        }

        if secret.len() < MIN_SECRET_LEN {
            anyhow::bail!("SESSION_SECRET must be at least {} bytes", MIN_SECRET_LEN);
        }

        let session_duration_days: i64 = lookup("SESSION_DURATION_DAYS")
            .unwrap_or_else(|| "7".to_string())
            .parse()
            .context("Invalid SESSION_DURATION_DAYS")?;

        if !(1..=365).contains(&session_duration_days) {
            anyhow::bail!("SESSION_DURATION_DAYS must be between 1 and 365");
        }

        let bind_addr = lookup("BIND_ADDR")
            .unwrap_or_else(|| "127.0.0.1:3000".to_string())
            .parse()
            .context("Invalid BIND_ADDR")?;

        let cookie_secure = lookup("COOKIE_SECURE")
            .unwrap_or_else(|| "true".to_string())
            .parse()
            .context("COOKIE_SECURE must be true or false")?;

        Ok(Self {
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            session_duration_days,
            session_secret: Zeroizing::new(secret.as_bytes().to_vec()),
            bind_addr,
            cookie_secure,
        })
    }

    /// Session lifetime in seconds, used for the cookie `Max-Age`.
    pub fn session_max_age_secs(&self) -> i64 {
        self.session_duration_days * 86400
    }
}
