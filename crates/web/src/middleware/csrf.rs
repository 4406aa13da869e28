//! CSRF protection.
//!
//! Every session carries one random token. Pages render it into each form as
//! the `csrf_token` field; JavaScript callers may send it in `X-CSRFToken`
//! instead. Requests with an unsafe method must present the token or are
//! rejected with 400 before reaching a handler.

use axum::{
    body::{Body, to_bytes},
    extract::{FromRequestParts, Request},
    http::{Method, StatusCode, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use tower_sessions::Session;

use crate::models::session::keys;

/// Form field carrying the token.
pub const CSRF_FIELD: &str = "csrf_token";

/// Header carrying the token.
pub const CSRF_HEADER: &str = "x-csrftoken";

/// Largest form body buffered while looking for the token.
const MAX_FORM_BYTES: usize = 64 * 1024;

/// The current session's CSRF token.
#[derive(Clone, Debug)]
pub struct CsrfToken(pub String);

impl CsrfToken {
    /// 32 random bytes, URL-safe base64.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::rng().fill_bytes(&mut bytes);
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    #[must_use]
    pub fn value(&self) -> &str {
        &self.0
    }

    fn matches(&self, submitted: &str) -> bool {
        let expected = self.0.as_bytes();
        let submitted = submitted.as_bytes();
        expected.len() == submitted.len()
            && expected
                .iter()
                .zip(submitted)
                .fold(0u8, |acc, (a, b)| acc | (a ^ b))
                == 0
    }
}

/// Issue the session token and verify it on unsafe methods.
///
/// Must run inside the session layer.
pub async fn csrf_middleware(session: Session, mut request: Request, next: Next) -> Response {
    let token = match session_token(&session).await {
        Ok(token) => token,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load CSRF token from session");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    if is_safe(request.method()) {
        request.extensions_mut().insert(token);
        return next.run(request).await;
    }

    let header = request
        .headers()
        .get(CSRF_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(String::from);

    let (parts, body) = request.into_parts();
    let Ok(bytes) = to_bytes(body, MAX_FORM_BYTES).await else {
        return reject("request body too large");
    };

    let submitted = header.or_else(|| form_field(&bytes, CSRF_FIELD));
    match submitted {
        Some(value) if token.matches(&value) => {}
        Some(_) => return reject("The CSRF token is invalid."),
        None => return reject("The CSRF token is missing."),
    }

    let mut request = Request::from_parts(parts, Body::from(bytes));
    request.extensions_mut().insert(token);
    next.run(request).await
}

async fn session_token(session: &Session) -> Result<CsrfToken, tower_sessions::session::Error> {
    if let Some(existing) = session.get::<String>(keys::CSRF_TOKEN).await? {
        return Ok(CsrfToken(existing));
    }
    let token = CsrfToken::generate();
    session.insert(keys::CSRF_TOKEN, token.value()).await?;
    Ok(token)
}

const fn is_safe(method: &Method) -> bool {
    matches!(
        *method,
        Method::GET | Method::HEAD | Method::OPTIONS | Method::TRACE
    )
}

fn form_field(body: &[u8], name: &str) -> Option<String> {
    url::form_urlencoded::parse(body)
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

fn reject(reason: &'static str) -> Response {
    tracing::warn!(reason, "CSRF check failed");
    (StatusCode::BAD_REQUEST, format!("Bad Request: {reason}")).into_response()
}

/// Extractor to get the CSRF token from request extensions.
impl<S> FromRequestParts<S> for CsrfToken
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<Self>().cloned().unwrap_or_else(|| {
            tracing::warn!(
                "CSRF token not found in request extensions - middleware may be misconfigured"
            );
            Self(String::new())
        }))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::{
        Router, middleware,
        routing::{get, post},
    };
    use axum_test::TestServer;
    use tower_sessions::{MemoryStore, SessionManagerLayer};

    use super::*;

    fn server() -> TestServer {
        let app = Router::new()
            .route("/token", get(|token: CsrfToken| async move { token.0 }))
            .route("/submit", post(|body: String| async move { body }))
            .layer(middleware::from_fn(csrf_middleware))
            .layer(SessionManagerLayer::new(MemoryStore::default()).with_secure(false));
        TestServer::builder().save_cookies().build(app).unwrap()
    }

    #[test]
    fn test_generated_tokens_are_distinct_and_url_safe() {
        let a = CsrfToken::generate();
        let b = CsrfToken::generate();
        assert_ne!(a.value(), b.value());
        assert_eq!(a.value().len(), 43);
        assert!(
            a.value()
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }

    #[test]
    fn test_form_field_decodes() {
        assert_eq!(
            form_field(b"username=a+b&csrf_token=x%2Dy", CSRF_FIELD).as_deref(),
            Some("x-y")
        );
        assert_eq!(form_field(b"username=a", CSRF_FIELD), None);
    }

    #[tokio::test]
    async fn test_post_without_token_is_rejected() {
        let server = server();
        server.get("/token").await.assert_status_ok();

        let response = server
            .post("/submit")
            .form(&[("username", "mallory")])
            .expect_failure()
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_post_with_wrong_token_is_rejected() {
        let server = server();
        server.get("/token").await.assert_status_ok();

        server
            .post("/submit")
            .form(&[("csrf_token", "forged")])
            .expect_failure()
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_post_with_form_token_reaches_handler_with_body_intact() {
        let server = server();
        let token = server.get("/token").await.text();

        let response = server
            .post("/submit")
            .form(&[("csrf_token", token.as_str()), ("username", "alice")])
            .await;
        response.assert_status_ok();
        assert!(response.text().contains("username=alice"));
    }

    #[tokio::test]
    async fn test_post_with_header_token_is_accepted() {
        let server = server();
        let token = server.get("/token").await.text();

        server
            .post("/submit")
            .add_header(CSRF_HEADER, token)
            .text("payload")
            .await
            .assert_status_ok();
    }

    #[tokio::test]
    async fn test_token_is_stable_within_a_session() {
        let server = server();
        let first = server.get("/token").await.text();
        let second = server.get("/token").await.text();
        assert_eq!(first, second);
    }
}
