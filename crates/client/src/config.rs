//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! All variables are optional.
//!
//! - `MEDIBOOK_ENV` - `production` or `development` (default: development).
//!   Selects the default API base URL.
//! - `MEDIBOOK_API_URL` - Override for the API base URL
//! - `MEDIBOOK_STATE_DIR` - Directory holding the persisted session
//!   (default: .medibook)
//! - `MEDIBOOK_HTTP_TIMEOUT_SECS` - Per-request timeout (default: 30)
//! - `MEDIBOOK_POLL_INTERVAL_SECS` - Cart / order polling period (default: 30)
//! - `MEDIBOOK_CATALOG_TTL_SECS` - Catalog cache lifetime (default: 300)
//! - `SENTRY_DSN` - Sentry error tracking DSN

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use url::Url;

/// Production API base URL.
pub const PRODUCTION_API_URL: &str = "https://api.medibook.in/api";

/// Local development API base URL.
pub const DEVELOPMENT_API_URL: &str = "http://localhost:5000/api";

/// Name of the file holding persisted session state inside the state dir.
pub const SESSION_FILE_NAME: &str = "session.json";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Deployment environment, which picks the default API base URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    Production,
    #[default]
    Development,
}

impl Environment {
    /// Default API base URL for this environment.
    #[must_use]
    pub const fn default_api_url(self) -> &'static str {
        match self {
            Self::Production => PRODUCTION_API_URL,
            Self::Development => DEVELOPMENT_API_URL,
        }
    }

    /// Lowercase name, as accepted by `MEDIBOOK_ENV`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Production => "production",
            Self::Development => "development",
        }
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Self::Production),
            "development" | "dev" | "local" => Ok(Self::Development),
            other => Err(format!("unknown environment '{other}'")),
        }
    }
}

/// Medibook client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Which deployment this client talks to
    pub environment: Environment,
    /// API base URL; endpoint paths are appended to it
    pub api_url: Url,
    /// Directory holding the persisted session file
    pub state_dir: PathBuf,
    /// Per-request timeout
    pub http_timeout: Duration,
    /// Cart and order polling period
    pub poll_interval: Duration,
    /// Catalog cache lifetime
    pub catalog_ttl: Duration,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
}

impl ClientConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but cannot be parsed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env(&lookup);

        let environment = env
            .get("MEDIBOOK_ENV")
            .map(|v| {
                v.parse::<Environment>()
                    .map_err(|e| ConfigError::InvalidEnvVar("MEDIBOOK_ENV".to_string(), e))
            })
            .transpose()?
            .unwrap_or_default();

        let api_url_raw = env
            .get("MEDIBOOK_API_URL")
            .unwrap_or_else(|| environment.default_api_url().to_string());
        let api_url = parse_api_url(&api_url_raw)?;

        let state_dir = PathBuf::from(env.get_or_default("MEDIBOOK_STATE_DIR", ".medibook"));
        let http_timeout = env.get_secs("MEDIBOOK_HTTP_TIMEOUT_SECS", 30)?;
        let poll_interval = env.get_secs("MEDIBOOK_POLL_INTERVAL_SECS", 30)?;
        let catalog_ttl = env.get_secs("MEDIBOOK_CATALOG_TTL_SECS", 300)?;
        let sentry_dsn = env.get("SENTRY_DSN");

        Ok(Self {
            environment,
            api_url,
            state_dir,
            http_timeout,
            poll_interval,
            catalog_ttl,
            sentry_dsn,
        })
    }

    /// Path of the persisted session file.
    #[must_use]
    pub fn session_file(&self) -> PathBuf {
        self.state_dir.join(SESSION_FILE_NAME)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

struct Env<'a, F: Fn(&str) -> Option<String>>(&'a F);

impl<F: Fn(&str) -> Option<String>> Env<'_, F> {
    /// Get an optional variable, treating blank values as unset.
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    /// Get a variable with a default value.
    fn get_or_default(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    /// Get a positive number of seconds.
    fn get_secs(&self, key: &str, default: u64) -> Result<Duration, ConfigError> {
        let Some(raw) = self.get(key) else {
            return Ok(Duration::from_secs(default));
        };
        match raw.trim().parse::<u64>() {
            Ok(0) => Err(ConfigError::InvalidEnvVar(
                key.to_string(),
                "must be greater than zero".to_string(),
            )),
            Ok(secs) => Ok(Duration::from_secs(secs)),
            Err(e) => Err(ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
        }
    }
}

/// Parse and sanity-check the API base URL.
fn parse_api_url(raw: &str) -> Result<Url, ConfigError> {
    let invalid = |msg: String| ConfigError::InvalidEnvVar("MEDIBOOK_API_URL".to_string(), msg);

    let url = Url::parse(raw.trim()).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }
    if url.cannot_be_a_base() {
        return Err(invalid("must be a base URL".to_string()));
    }
    Ok(url)
}
