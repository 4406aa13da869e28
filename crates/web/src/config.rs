//! Application configuration loaded from environment variables.
//!
//! Variables are read from the process environment after loading
//! `key/.env` and then `.env` (both optional, earlier files win).
//!
//! # Environment Variables
//!
//! ## Deployment
//! - `ENV_TYPE` - `docker`, `lolipop-test` or `lolipop-prod` (default: docker)
//! - `ENV_DB` - `sqlite` or `mysql` (default: sqlite)
//! - `DATABASE_URI_DOCKER` / `DATABASE_URI_LOLIPOP_TEST` / `DATABASE_URI_LOLIPOP_PROD`
//!   - MySQL connection strings, one per deployment
//! - `DATA_DIR` - Directory holding the SQLite file (default: data)
//!
//! ## HTTP
//! - `SECRET_KEY` - Session signing secret (default: an unsafe development key)
//! - `BASE_PATH` - URL sub-directory the app is served under (lolipop only)
//! - `SITE_ROOT_URL` - Public root URL of the hosting site
//! - `SCRIPT_NAME` - Front-controller path injected by a CGI host (e.g. `/index.cgi`)
//! - `HOST` - Bind address (default: 0.0.0.0)
//! - `PORT` - Listen port (default: 5000)
//! - `STATIC_DIR` - Static asset directory (default: crates/web/static)
//!
//! ## Email
//! - `SMTP_SERVER`, `SMTP_PORT` (default: 465), `EMAIL_ADDRESS`, `EMAIL_PASS`
//!
//! ## Observability
//! - `LOG_DIR` - Directory for `app.log` (default: logs)
//! - `SENTRY_DSN` - Sentry error tracking DSN

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use roster_core::{DatabaseBackend, DeploymentMode, Email, UnknownSetting};
use secrecy::SecretString;
use thiserror::Error;

/// Secret used when `SECRET_KEY` is not set.
pub const DEFAULT_SECRET_KEY: &str = "default-unsafe-key";

/// Location of the optional dotenv file with deployment secrets.
const KEY_DOTENV_PATH: &str = "key/.env";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error(transparent)]
    UnknownSetting(#[from] UnknownSetting),
    #[error("Cannot prepare data directory {path}: {source}")]
    DataDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Roster application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Session signing secret
    pub secret_key: SecretString,
    /// True when `SECRET_KEY` was absent and the development key is in use
    pub secret_key_is_default: bool,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// URL sub-directory without trailing slash (empty when served at the root)
    pub base_path: String,
    /// Public root URL of the hosting site, without trailing slash
    pub site_root_url: String,
    /// Front-controller path prepended to generated URLs (empty when absent)
    pub script_name: String,
    /// Named deployment environment
    pub deployment: DeploymentMode,
    /// Database selection
    pub database: DatabaseConfig,
    /// SMTP settings; `None` disables the email form
    pub email: Option<EmailConfig>,
    /// Required SMTP variables left unset while other SMTP variables are set
    pub email_missing: Vec<&'static str>,
    /// Directory for the application log file
    pub log_dir: PathBuf,
    /// Directory served under `/static`
    pub static_dir: PathBuf,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
}

/// Database selection settings.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Backend kind (`ENV_DB`)
    pub backend: DatabaseBackend,
    /// Directory that holds the SQLite file
    pub data_dir: PathBuf,
    /// Per-deployment MySQL connection strings
    pub uris: DatabaseUris,
}

/// MySQL connection strings, one per deployment mode.
///
/// Any of them may be absent; a missing one only fails when it is the one
/// selected and a connection is attempted.
#[derive(Debug, Clone, Default)]
pub struct DatabaseUris {
    pub docker: Option<SecretString>,
    pub lolipop_test: Option<SecretString>,
    pub lolipop_prod: Option<SecretString>,
}

/// SMTP configuration for the notification form.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    /// SMTP server hostname
    pub smtp_host: String,
    /// SMTP server port (465 uses implicit TLS, anything else STARTTLS)
    pub smtp_port: u16,
    /// Sender and recipient of notifications, also the SMTP login
    pub address: Email,
    /// SMTP password
    pub password: SecretString,
}

impl AppConfig {
    /// Load configuration from environment variables.
    ///
    /// Loads `key/.env` and `.env` if present (missing files are ignored).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is malformed or names an unknown
    /// deployment or backend.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::from_path(KEY_DOTENV_PATH);
        let _ = dotenvy::dotenv();

        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// See [`AppConfig::from_env`].
    pub fn from_vars<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(&lookup);

        let (secret_key, secret_key_is_default) = vars.get("SECRET_KEY").map_or_else(
            || (SecretString::from(DEFAULT_SECRET_KEY), true),
            |key| (SecretString::from(key), false),
        );

        let host = vars
            .get_or("HOST", "0.0.0.0")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("HOST".to_string(), e.to_string()))?;
        let port = vars
            .get_or("PORT", "5000")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("PORT".to_string(), e.to_string()))?;

        let deployment = vars.get_or("ENV_TYPE", "docker").parse::<DeploymentMode>()?;
        let database = DatabaseConfig {
            backend: vars.get_or("ENV_DB", "sqlite").parse::<DatabaseBackend>()?,
            data_dir: PathBuf::from(vars.get_or("DATA_DIR", "data")),
            uris: DatabaseUris {
                docker: vars.get("DATABASE_URI_DOCKER").map(SecretString::from),
                lolipop_test: vars.get("DATABASE_URI_LOLIPOP_TEST").map(SecretString::from),
                lolipop_prod: vars.get("DATABASE_URI_LOLIPOP_PROD").map(SecretString::from),
            },
        };

        Ok(Self {
            secret_key,
            secret_key_is_default,
            host,
            port,
            base_path: normalize_base_path(&vars.get_or("BASE_PATH", "")),
            site_root_url: vars.get_or("SITE_ROOT_URL", "").trim_end_matches('/').to_string(),
            script_name: normalize_base_path(&vars.get_or("SCRIPT_NAME", "")),
            deployment,
            database,
            email: EmailConfig::from_vars(&vars)?,
            email_missing: EmailConfig::missing_vars(&vars),
            log_dir: PathBuf::from(vars.get_or("LOG_DIR", "logs")),
            static_dir: PathBuf::from(vars.get_or("STATIC_DIR", "crates/web/static")),
            sentry_dsn: vars.get("SENTRY_DSN"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether session cookies should carry the `Secure` flag.
    #[must_use]
    pub fn is_https(&self) -> bool {
        self.site_root_url.starts_with("https://")
    }

    /// Path of the SQLite database file.
    #[must_use]
    pub fn sqlite_path(&self) -> PathBuf {
        self.database.sqlite_path()
    }
}

impl DatabaseConfig {
    /// File name of the SQLite database inside the data directory.
    pub const SQLITE_FILE_NAME: &'static str = "app.sqlite3";

    /// Path of the SQLite database file.
    #[must_use]
    pub fn sqlite_path(&self) -> PathBuf {
        self.data_dir.join(Self::SQLITE_FILE_NAME)
    }

    /// SQLite settings rooted at `data_dir`, as used by tests and tooling.
    #[must_use]
    pub fn sqlite_in(data_dir: &Path) -> Self {
        Self {
            backend: DatabaseBackend::Sqlite,
            data_dir: data_dir.to_path_buf(),
            uris: DatabaseUris::default(),
        }
    }
}

impl EmailConfig {
    /// Variables that must all be set to enable the email form.
    pub const REQUIRED_VARS: [&'static str; 3] = ["SMTP_SERVER", "EMAIL_ADDRESS", "EMAIL_PASS"];

    /// Required variables that are unset although SMTP was partly configured.
    fn missing_vars<F>(vars: &Vars<'_, F>) -> Vec<&'static str>
    where
        F: Fn(&str) -> Option<String>,
    {
        let any_set = Self::REQUIRED_VARS
            .iter()
            .chain(&["SMTP_PORT"])
            .any(|key| vars.get(key).is_some());
        if !any_set {
            return Vec::new();
        }
        Self::REQUIRED_VARS
            .into_iter()
            .filter(|key| vars.get(key).is_none())
            .collect()
    }

    fn from_vars<F>(vars: &Vars<'_, F>) -> Result<Option<Self>, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let (Some(smtp_host), Some(address), Some(password)) = (
            vars.get("SMTP_SERVER"),
            vars.get("EMAIL_ADDRESS"),
            vars.get("EMAIL_PASS"),
        ) else {
            return Ok(None);
        };

        let smtp_port = vars
            .get_or("SMTP_PORT", "465")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("SMTP_PORT".to_string(), e.to_string()))?;
        let address = Email::parse(&address)
            .map_err(|e| ConfigError::InvalidEnvVar("EMAIL_ADDRESS".to_string(), e.to_string()))?;

        Ok(Some(Self {
            smtp_host,
            smtp_port,
            address,
            password: SecretString::from(password),
        }))
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Variable lookup that treats empty values as unset.
struct Vars<'a, F>(&'a F);

impl<F> Vars<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Get an optional variable.
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|value| !value.trim().is_empty())
    }

    /// Get a variable with a default value.
    fn get_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }
}

/// Trim a path prefix to `/segment[/segment...]` form, or empty.
fn normalize_base_path(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() || trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}
