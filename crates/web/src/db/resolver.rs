//! Environment resolver: `(ENV_DB, ENV_TYPE)` → connection descriptor.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use roster_core::{DatabaseBackend, DeploymentMode};
use secrecy::{ExposeSecret, SecretString};
use url::Url;

use crate::config::{ConfigError, DatabaseConfig, DatabaseUris};

/// Where and how to connect.
#[derive(Debug, Clone)]
pub enum ConnectionDescriptor {
    /// Local SQLite file (already created by [`resolve`]).
    Sqlite { path: PathBuf },
    /// External MySQL server selected by deployment mode.
    MySql {
        deployment: DeploymentMode,
        /// Name of the variable the URI came from.
        var: &'static str,
        /// `None` when that variable is unset; connecting then fails.
        uri: Option<SecretString>,
    },
}

impl ConnectionDescriptor {
    /// Backend this descriptor targets.
    #[must_use]
    pub const fn backend(&self) -> DatabaseBackend {
        match self {
            Self::Sqlite { .. } => DatabaseBackend::Sqlite,
            Self::MySql { .. } => DatabaseBackend::MySql,
        }
    }

    /// The full connection URI, credentials included.
    ///
    /// Returns `None` for a MySQL descriptor whose variable is unset.
    #[must_use]
    pub fn expose_uri(&self) -> Option<String> {
        match self {
            Self::Sqlite { path } => Some(format!("sqlite://{}", path.display())),
            Self::MySql { uri, .. } => uri.as_ref().map(|uri| uri.expose_secret().to_string()),
        }
    }

    /// The URI with any password masked, for logs.
    #[must_use]
    pub fn redacted(&self) -> String {
        match self {
            Self::Sqlite { .. } => self.expose_uri().unwrap_or_default(),
            Self::MySql { uri: None, var, .. } => format!("<{var} unset>"),
            Self::MySql { uri: Some(uri), .. } => redact_password(uri.expose_secret()),
        }
    }
}

/// The variable holding the MySQL URI for `deployment`.
#[must_use]
pub const fn uri_var(deployment: DeploymentMode) -> &'static str {
    match deployment {
        DeploymentMode::Docker => "DATABASE_URI_DOCKER",
        DeploymentMode::LolipopTest => "DATABASE_URI_LOLIPOP_TEST",
        DeploymentMode::LolipopProd => "DATABASE_URI_LOLIPOP_PROD",
    }
}

/// Resolve the connection descriptor for the configured backend.
///
/// For SQLite the data directory and an empty database file are created if
/// absent, so the first connection never fails on a missing file.
///
/// # Errors
///
/// Returns `ConfigError::DataDir` if the SQLite file cannot be created.
pub fn resolve(
    database: &DatabaseConfig,
    deployment: DeploymentMode,
) -> Result<ConnectionDescriptor, ConfigError> {
    match database.backend {
        DatabaseBackend::Sqlite => {
            let path = database.sqlite_path();
            ensure_sqlite_file(&path)?;
            Ok(ConnectionDescriptor::Sqlite { path })
        }
        DatabaseBackend::MySql => Ok(ConnectionDescriptor::MySql {
            deployment,
            var: uri_var(deployment),
            uri: select_uri(&database.uris, deployment).cloned(),
        }),
    }
}

fn select_uri(uris: &DatabaseUris, deployment: DeploymentMode) -> Option<&SecretString> {
    match deployment {
        DeploymentMode::Docker => uris.docker.as_ref(),
        DeploymentMode::LolipopTest => uris.lolipop_test.as_ref(),
        DeploymentMode::LolipopProd => uris.lolipop_prod.as_ref(),
    }
}

/// Create `path` (and its parent directory) as an empty file if missing.
fn ensure_sqlite_file(path: &Path) -> Result<(), ConfigError> {
    let to_config_error = |source| ConfigError::DataDir {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(to_config_error)?;
    }

    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(to_config_error)?;

    Ok(())
}

fn redact_password(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(mut url) => {
            if url.password().is_some() {
                let _ = url.set_password(Some("****"));
            }
            url.to_string()
        }
        Err(_) => "<unparseable uri>".to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn mysql_config() -> DatabaseConfig {
        DatabaseConfig {
            backend: DatabaseBackend::MySql,
            data_dir: PathBuf::from("unused"),
            uris: DatabaseUris {
                docker: Some(SecretString::from("mysql://root:pw@db:3306/app")),
                lolipop_test: Some(SecretString::from("mysql://u:pw@test.host/app_test")),
                lolipop_prod: Some(SecretString::from("mysql://u:pw@prod.host/app")),
            },
        }
    }

    #[test]
    fn test_every_valid_combination_yields_a_uri() {
        let dir = tempfile::tempdir().unwrap();

        for backend in DatabaseBackend::ALL {
            for deployment in DeploymentMode::ALL {
                let mut config = mysql_config();
                config.backend = backend;
                config.data_dir = dir.path().to_path_buf();

                let descriptor = resolve(&config, deployment).unwrap();
                assert_eq!(descriptor.backend(), backend);
                let uri = descriptor.expose_uri().unwrap();
                assert!(!uri.is_empty(), "{backend}/{deployment} produced empty uri");
            }
        }
    }

    #[test]
    fn test_mysql_uri_follows_deployment() {
        let config = mysql_config();

        let uri = |mode| resolve(&config, mode).unwrap().expose_uri().unwrap();
        assert!(uri(DeploymentMode::Docker).contains("@db:3306"));
        assert!(uri(DeploymentMode::LolipopTest).contains("test.host"));
        assert!(uri(DeploymentMode::LolipopProd).contains("prod.host"));
    }

    #[test]
    fn test_missing_mysql_uri_is_not_a_resolution_error() {
        let mut config = mysql_config();
        config.uris.lolipop_test = None;

        let descriptor = resolve(&config, DeploymentMode::LolipopTest).unwrap();
        assert!(descriptor.expose_uri().is_none());
        assert_eq!(descriptor.redacted(), "<DATABASE_URI_LOLIPOP_TEST unset>");
    }

    #[test]
    fn test_sqlite_file_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let config = DatabaseConfig::sqlite_in(&dir.path().join("nested/data"));

        let descriptor = resolve(&config, DeploymentMode::Docker).unwrap();
        let ConnectionDescriptor::Sqlite { path } = descriptor else {
            panic!("expected sqlite descriptor");
        };
        assert!(path.is_file());
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 0);

        // Second resolution leaves the existing file alone.
        std::fs::write(&path, b"x").unwrap();
        resolve(&config, DeploymentMode::Docker).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"x");
    }

    #[test]
    fn test_redacted_masks_password() {
        let descriptor = resolve(&mysql_config(), DeploymentMode::Docker).unwrap();
        let redacted = descriptor.redacted();
        assert!(redacted.contains("****"));
        assert!(!redacted.contains(":pw@"));
    }
}
