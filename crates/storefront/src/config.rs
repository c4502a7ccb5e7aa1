//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! None. Without a remote the storefront runs on in-memory collections.
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `STOREFRONT_REMOTE_URL` - Base URL of the hosted document API
//! - `STOREFRONT_REMOTE_API_KEY` - API key (required when the URL is set, high entropy)
//! - `STOREFRONT_REMOTE_PROJECT_ID` - Project sent as `X-Project-Id`
//! - `STOREFRONT_REMOTE_POLL_SECS` - Subscription poll interval (default: 5)
//! - `STOREFRONT_MIRROR_DIR` - Directory of the offline mirror (disabled if unset)
//! - `STOREFRONT_SEED_FILE` - JSON file seeding the in-memory collections
//! - `STOREFRONT_SEARCH_DEBOUNCE_MS` - Search debounce (default: 300)
//! - `STOREFRONT_PRODUCTS_LIMIT` - Products visible (default: 200)
//! - `STOREFRONT_ORDERS_LIMIT` - Orders visible (default: 100)
//! - `STOREFRONT_MAX_LINE_QTY` - Largest quantity per cart line (default: 50)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Hosted document API; in-memory collections when `None`
    pub remote: Option<RemoteConfig>,
    /// Offline mirror directory; no offline fallback when `None`
    pub mirror_dir: Option<PathBuf>,
    /// Records loaded into the in-memory collections at startup
    pub seed_file: Option<PathBuf>,
    /// Catalog, search and cart tunables
    pub catalog: CatalogConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Hosted document API configuration.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct RemoteConfig {
    pub base_url: Url,
    pub api_key: SecretString,
    pub project_id: Option<String>,
    pub poll_interval: Duration,
}

impl std::fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &"[REDACTED]")
            .field("project_id", &self.project_id)
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

/// Catalog, search and cart tunables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogConfig {
    pub products_limit: usize,
    pub orders_limit: usize,
    pub search_debounce: Duration,
    pub max_line_qty: u32,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            products_limit: 200,
            orders_limit: 100,
            search_debounce: Duration::from_millis(300),
            max_line_qty: 50,
        }
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is invalid, or if the remote API
    /// key is missing or fails validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Same as [`Self::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env(&lookup);

        let host = env.parse_or("STOREFRONT_HOST", IpAddr::from([127, 0, 0, 1]))?;
        let port = env.parse_or("STOREFRONT_PORT", 3000_u16)?;
        let remote = RemoteConfig::from_env(&env)?;

        let defaults = CatalogConfig::default();
        let catalog = CatalogConfig {
            products_limit: env.parse_or("STOREFRONT_PRODUCTS_LIMIT", defaults.products_limit)?,
            orders_limit: env.parse_or("STOREFRONT_ORDERS_LIMIT", defaults.orders_limit)?,
            search_debounce: Duration::from_millis(
                env.parse_or("STOREFRONT_SEARCH_DEBOUNCE_MS", 300_u64)?,
            ),
            max_line_qty: env.parse_or("STOREFRONT_MAX_LINE_QTY", defaults.max_line_qty)?,
        };
        if catalog.max_line_qty == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "STOREFRONT_MAX_LINE_QTY".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            host,
            port,
            remote,
            mirror_dir: env.optional("STOREFRONT_MIRROR_DIR").map(PathBuf::from),
            seed_file: env.optional("STOREFRONT_SEED_FILE").map(PathBuf::from),
            catalog,
            sentry_dsn: env.optional("SENTRY_DSN"),
            sentry_environment: env.optional("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl RemoteConfig {
    fn from_env(env: &Env<'_>) -> Result<Option<Self>, ConfigError> {
        let Some(raw_url) = env.optional("STOREFRONT_REMOTE_URL") else {
            return Ok(None);
        };
        let base_url = Url::parse(&raw_url).map_err(|e| {
            ConfigError::InvalidEnvVar("STOREFRONT_REMOTE_URL".to_string(), e.to_string())
        })?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidEnvVar(
                "STOREFRONT_REMOTE_URL".to_string(),
                "must be an http(s) URL".to_string(),
            ));
        }

        let api_key = env.validated_secret("STOREFRONT_REMOTE_API_KEY")?;
        let poll_secs: u64 = env.parse_or("STOREFRONT_REMOTE_POLL_SECS", 5_u64)?;

        Ok(Some(Self {
            base_url,
            api_key,
            project_id: env.optional("STOREFRONT_REMOTE_PROJECT_ID"),
            poll_interval: Duration::from_secs(poll_secs.max(1)),
        }))
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Variable source with the lookup helpers.
struct Env<'a>(&'a dyn Fn(&str) -> Option<String>);

impl Env<'_> {
    /// Get an optional variable. Empty values count as unset.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|value| !value.trim().is_empty())
    }

    /// Get a required variable.
    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key)
            .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
    }

    /// Parse a variable, falling back to `default` when unset.
    fn parse_or<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.optional(key).map_or(Ok(default), |value| {
            value
                .trim()
                .parse::<T>()
                .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
        })
    }

    /// Load and validate a secret.
    fn validated_secret(&self, key: &str) -> Result<SecretString, ConfigError> {
        let value = self.required(key)?;
        validate_secret_strength(&value, key)?;
        Ok(SecretString::from(value))
    }
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    if let Some(pattern) = PLACEHOLDER_PATTERNS.iter().find(|p| lower.contains(*p)) {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!("appears to be a placeholder (contains '{pattern}')"),
        ));
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated key."
            ),
        ));
    }

    Ok(())
}
