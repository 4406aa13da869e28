//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::db::{Database, UserStore};
use crate::services::Notifier;
use crate::urls::UrlNormalizer;

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`. Built once by [`crate::create_app`]; there
/// is no global state.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AppConfig,
    database: Database,
    users: Arc<dyn UserStore>,
    notifier: Option<Arc<dyn Notifier>>,
    urls: UrlNormalizer,
}

impl AppState {
    /// Create the state with the database's own user store.
    #[must_use]
    pub fn new(
        config: AppConfig,
        database: Database,
        notifier: Option<Arc<dyn Notifier>>,
    ) -> Self {
        let users = database.user_store();
        Self::with_store(config, database, users, notifier)
    }

    /// Create the state with an explicit user store.
    #[must_use]
    pub fn with_store(
        config: AppConfig,
        database: Database,
        users: Arc<dyn UserStore>,
        notifier: Option<Arc<dyn Notifier>>,
    ) -> Self {
        let urls = UrlNormalizer::new(
            config.deployment,
            config.base_path.clone(),
            config.script_name.clone(),
        );

        Self {
            inner: Arc::new(AppStateInner {
                config,
                database,
                users,
                notifier,
                urls,
            }),
        }
    }

    /// Get a reference to the application configuration.
    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    /// The pool, for readiness checks.
    #[must_use]
    pub fn database(&self) -> &Database {
        &self.inner.database
    }

    /// The user repository selected at startup.
    #[must_use]
    pub fn users(&self) -> &dyn UserStore {
        self.inner.users.as_ref()
    }

    /// The mailer, if SMTP is configured.
    #[must_use]
    pub fn notifier(&self) -> Option<&dyn Notifier> {
        self.inner.notifier.as_deref()
    }

    #[must_use]
    pub fn urls(&self) -> &UrlNormalizer {
        &self.inner.urls
    }
}
