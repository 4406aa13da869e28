//! HTTP middleware stack.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layers (hub per request, HTTP transaction)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. Session layer (tower-sessions, in-memory store, signed cookie)
//! 5. CSRF (issue token, verify unsafe methods)

pub mod csrf;
pub mod flash;
pub mod request_id;
pub mod session;

pub use csrf::{CSRF_FIELD, CSRF_HEADER, CsrfToken, csrf_middleware};
pub use flash::{push_flash, take_flashes};
pub use request_id::request_id_middleware;
pub use session::create_session_layer;
