//! Session middleware configuration.
//!
//! Sessions live in process memory; the cookie carries only the session ID,
//! signed with a key derived from `SECRET_KEY`.

use secrecy::ExposeSecret;
use sha2::{Digest, Sha512};
use tower_sessions::{
    Expiry, MemoryStore, SessionManagerLayer,
    cookie::{Key, SameSite, time::Duration},
    service::SignedCookie,
};

use crate::config::AppConfig;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "roster_session";

/// Session expiry time in seconds (1 day of inactivity).
const SESSION_EXPIRY_SECONDS: i64 = 24 * 60 * 60;

/// Create the session layer with an in-memory store.
#[must_use]
pub fn create_session_layer(config: &AppConfig) -> SessionManagerLayer<MemoryStore, SignedCookie> {
    SessionManagerLayer::new(MemoryStore::default())
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(Duration::seconds(
            SESSION_EXPIRY_SECONDS,
        )))
        .with_secure(config.is_https())
        .with_same_site(SameSite::Lax)
        .with_http_only(true)
        .with_path(cookie_path(config))
        .with_signed(signing_key(config))
}

/// Derive the 64-byte cookie signing key from `SECRET_KEY`.
fn signing_key(config: &AppConfig) -> Key {
    let digest = Sha512::digest(config.secret_key.expose_secret().as_bytes());
    Key::from(digest.as_slice())
}

/// Browsers see the application under `BASE_PATH` outside Docker.
fn cookie_path(config: &AppConfig) -> String {
    if config.deployment.is_containerized() || config.base_path.is_empty() {
        "/".to_string()
    } else {
        config.base_path.clone()
    }
}
