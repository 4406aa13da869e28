//! Integration tests for Roster.
//!
//! Each test assembles the real application (resolver, bootstrap, schema
//! sync, router and middleware) on a SQLite file in a temporary directory
//! and drives it through `axum-test`.
//!
//! ```bash
//! cargo test -p roster-integration-tests
//! ```

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum_test::TestServer;
use roster_web::bootstrap::{self, RetryPolicy};
use roster_web::config::AppConfig;
use roster_web::db::{self, Database};
use roster_web::services::{EmailError, Notifier, OutgoingEmail};
use roster_web::state::AppState;
use tempfile::TempDir;

/// Retry policy for tests: SQLite is always reachable.
pub const FAST: RetryPolicy = RetryPolicy {
    attempts: 1,
    backoff: Duration::ZERO,
};

/// A running application on a throwaway SQLite database.
pub struct TestContext {
    pub server: TestServer,
    pub state: AppState,
    _dir: TempDir,
}

impl TestContext {
    /// Docker deployment, no SMTP.
    ///
    /// # Panics
    ///
    /// Panics if the application cannot start.
    pub async fn new() -> Self {
        Self::with_env(&[]).await
    }

    /// Start with extra variables on top of the test defaults.
    ///
    /// # Panics
    ///
    /// Panics if the application cannot start.
    pub async fn with_env(vars: &[(&str, &str)]) -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let config = test_config(&dir, vars);
        let state = roster_web::prepare(config, FAST)
            .await
            .expect("prepare application");
        Self::serve(state, dir)
    }

    /// Start with `notifier` in place of SMTP.
    ///
    /// # Panics
    ///
    /// Panics if the application cannot start.
    pub async fn with_notifier(notifier: Arc<dyn Notifier>) -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let config = test_config(&dir, &[]);

        let descriptor = db::resolve(&config.database, config.deployment).expect("resolve");
        let database = Database::open(&descriptor).expect("open database");
        bootstrap::ensure_database(&database, FAST)
            .await
            .expect("bootstrap");
        db::synchronize(&database, config.deployment)
            .await
            .expect("synchronize");

        let state = AppState::new(config, database, Some(notifier));
        Self::serve(state, dir)
    }

    fn serve(state: AppState, dir: TempDir) -> Self {
        let server = TestServer::builder()
            .save_cookies()
            .build(roster_web::create_app(state.clone()))
            .expect("build test server");
        Self {
            server,
            state,
            _dir: dir,
        }
    }

    /// Load the index page and return the CSRF token rendered into its forms.
    ///
    /// # Panics
    ///
    /// Panics if the page has no token.
    pub async fn csrf_token(&self) -> String {
        let html = self.server.get("/").await.text();
        extract_csrf_token(&html).expect("csrf token in page")
    }

    /// Submit a form with the session's CSRF token added.
    pub async fn post_form(&self, path: &str, fields: &[(&str, &str)]) -> axum_test::TestResponse {
        let token = self.csrf_token().await;
        let mut form: Vec<(&str, &str)> = vec![("csrf_token", token.as_str())];
        form.extend_from_slice(fields);
        self.server.post(path).form(&form).await
    }

    /// Body of the index page.
    pub async fn index_html(&self) -> String {
        self.server.get("/").await.text()
    }

    /// Make every `INSERT` or `DELETE` on the users table fail.
    ///
    /// # Panics
    ///
    /// Panics if the database is not SQLite or the trigger cannot be created.
    pub async fn reject_user_writes(&self, operation: WriteOperation) {
        let Database::Sqlite(pool) = self.state.database() else {
            panic!("test context always runs on SQLite");
        };
        let keyword = operation.keyword();
        let statement = format!(
            "CREATE TRIGGER reject_{keyword} BEFORE {keyword} ON users_sqlite \
             BEGIN SELECT RAISE(ABORT, 'writes disabled'); END"
        );
        sqlx::query(&statement)
            .execute(pool)
            .await
            .expect("create trigger");
    }
}

/// Statement kind blocked by [`TestContext::reject_user_writes`].
#[derive(Debug, Clone, Copy)]
pub enum WriteOperation {
    Insert,
    Delete,
}

impl WriteOperation {
    const fn keyword(self) -> &'static str {
        match self {
            Self::Insert => "INSERT",
            Self::Delete => "DELETE",
        }
    }
}

/// Configuration pointing every path into `dir`.
///
/// # Panics
///
/// Panics if the configuration is invalid.
#[must_use]
pub fn test_config(dir: &TempDir, vars: &[(&str, &str)]) -> AppConfig {
    let static_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../web/static");
    let data_dir = dir.path().join("data");
    let log_dir = dir.path().join("logs");

    let mut map: HashMap<String, String> = HashMap::from([
        ("SECRET_KEY".to_string(), "integration-test-secret".to_string()),
        ("ENV_DB".to_string(), "sqlite".to_string()),
        ("ENV_TYPE".to_string(), "docker".to_string()),
        ("DATA_DIR".to_string(), data_dir.display().to_string()),
        ("LOG_DIR".to_string(), log_dir.display().to_string()),
        ("STATIC_DIR".to_string(), static_dir.display().to_string()),
    ]);
    for (key, value) in vars {
        map.insert((*key).to_string(), (*value).to_string());
    }

    AppConfig::from_vars(|key| map.get(key).cloned()).expect("valid test config")
}

/// The `value` of the first `csrf_token` input in `html`.
#[must_use]
pub fn extract_csrf_token(html: &str) -> Option<String> {
    const MARKER: &str = r#"name="csrf_token" value=""#;
    let start = html.find(MARKER)? + MARKER.len();
    let rest = html.get(start..)?;
    let end = rest.find('"')?;
    rest.get(..end).map(ToString::to_string)
}

/// Records every message instead of sending it.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<OutgoingEmail>>,
    fail: bool,
}

impl RecordingNotifier {
    /// A notifier whose every send fails.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Messages sent so far.
    ///
    /// # Panics
    ///
    /// Panics if the lock is poisoned.
    #[must_use]
    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().expect("lock").clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), EmailError> {
        if self.fail {
            return Err(EmailError::InvalidAddress("unreachable".to_string()));
        }
        self.sent.lock().expect("lock").push(email.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_csrf_token() {
        let html = r#"<input type="hidden" name="csrf_token" value="abc-123_x">"#;
        assert_eq!(extract_csrf_token(html).as_deref(), Some("abc-123_x"));
        assert_eq!(extract_csrf_token("<form></form>"), None);
    }
}
