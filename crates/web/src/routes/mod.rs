//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                  - User list, registration and email forms
//! GET  /test              - Routing check page
//! POST /register_name     - Add one user (field `username`)
//! POST /delete_all_users  - Delete every user
//! POST /send_email        - Send a plain-text email to the configured address
//! GET  /health            - Liveness
//! GET  /health/ready      - Database readiness
//! ```
//!
//! Every POST form carries `csrf_token`; see [`crate::middleware::csrf`].
//! Handlers redirect (303) back to the index through the URL normalizer.

pub mod email;
pub mod health;
pub mod pages;
pub mod users;

use axum::{
    Router,
    response::Redirect,
    routing::{get, post},
};

use crate::state::AppState;
use crate::urls::Route;

/// Create all page and form routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(Route::Index.path(), get(pages::index))
        .route(Route::Test.path(), get(pages::test_page))
        .route(Route::RegisterName.path(), post(users::register))
        .route(Route::DeleteAllUsers.path(), post(users::delete_all))
        .route(Route::SendEmail.path(), post(email::send_email))
}

/// Create the health check routes.
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route(Route::Health.path(), get(health::health))
        .route(Route::Ready.path(), get(health::readiness))
}

/// Redirect to the index page as the browser sees it.
fn back_to_index(state: &AppState) -> Redirect {
    Redirect::to(&state.urls().url_for(Route::Index))
}
