//! Deployment settings: which environment we run in and which database
//! backend stores the data.
//!
//! Both are read from plain strings (`ENV_TYPE`, `ENV_DB`) and parsed once at
//! startup; everything downstream matches on the enums.

use core::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A setting value that names no known variant.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown {setting} value '{value}' (expected one of: {expected})")]
pub struct UnknownSetting {
    /// The setting being parsed (e.g. `ENV_TYPE`).
    pub setting: &'static str,
    /// The rejected value.
    pub value: String,
    /// Comma-separated list of accepted values.
    pub expected: &'static str,
}

/// Named deployment environment (`ENV_TYPE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum DeploymentMode {
    /// Containerized development; the app owns the whole origin.
    #[default]
    Docker,
    /// Shared-hosting staging, served under a URL sub-directory.
    LolipopTest,
    /// Shared-hosting production, served under a URL sub-directory.
    LolipopProd,
}

impl DeploymentMode {
    /// All modes, in declaration order.
    pub const ALL: [Self; 3] = [Self::Docker, Self::LolipopTest, Self::LolipopProd];

    /// The `ENV_TYPE` spelling of this mode.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Docker => "docker",
            Self::LolipopTest => "lolipop-test",
            Self::LolipopProd => "lolipop-prod",
        }
    }

    /// Whether the app runs in a container that owns the full origin.
    #[must_use]
    pub const fn is_containerized(self) -> bool {
        matches!(self, Self::Docker)
    }
}

impl fmt::Display for DeploymentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeploymentMode {
    type Err = UnknownSetting;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "docker" => Ok(Self::Docker),
            "lolipop-test" => Ok(Self::LolipopTest),
            "lolipop-prod" => Ok(Self::LolipopProd),
            other => Err(UnknownSetting {
                setting: "ENV_TYPE",
                value: other.to_owned(),
                expected: "docker, lolipop-test, lolipop-prod",
            }),
        }
    }
}

/// Database backend kind (`ENV_DB`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    /// External MySQL server.
    MySql,
    /// Local SQLite file.
    #[default]
    Sqlite,
}

impl DatabaseBackend {
    /// All backends, in declaration order.
    pub const ALL: [Self; 2] = [Self::MySql, Self::Sqlite];

    /// The `ENV_DB` spelling of this backend.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MySql => "mysql",
            Self::Sqlite => "sqlite",
        }
    }
}

impl fmt::Display for DatabaseBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatabaseBackend {
    type Err = UnknownSetting;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mysql" => Ok(Self::MySql),
            "sqlite" => Ok(Self::Sqlite),
            other => Err(UnknownSetting {
                setting: "ENV_DB",
                value: other.to_owned(),
                expected: "mysql, sqlite",
            }),
        }
    }
}
