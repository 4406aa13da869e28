//! Rendered pages.

use askama::Template;
use askama_web::WebTemplate;
use axum::{extract::State, response::IntoResponse};
use tower_sessions::Session;
use tracing::instrument;

use crate::error::Result;
use crate::middleware::{CsrfToken, take_flashes};
use crate::models::{Flash, User};
use crate::state::AppState;
use crate::urls::Route;

/// Shown in the title and header.
pub const SITE_NAME: &str = "Roster";

/// Normalized URLs every page links to.
#[derive(Debug, Clone)]
pub struct Links {
    pub index: String,
    pub test: String,
    pub register_name: String,
    pub delete_all_users: String,
    pub send_email: String,
    pub stylesheet: String,
}

/// Values shared by every template.
#[derive(Debug, Clone)]
pub struct PageContext {
    pub site_name: &'static str,
    pub base_path: String,
    pub site_root_url: String,
    pub links: Links,
}

impl PageContext {
    #[must_use]
    pub fn new(state: &AppState) -> Self {
        let urls = state.urls();
        Self {
            site_name: SITE_NAME,
            base_path: urls.base_path().to_string(),
            site_root_url: state.config().site_root_url.clone(),
            links: Links {
                index: urls.url_for(Route::Index),
                test: urls.url_for(Route::Test),
                register_name: urls.url_for(Route::RegisterName),
                delete_all_users: urls.url_for(Route::DeleteAllUsers),
                send_email: urls.url_for(Route::SendEmail),
                stylesheet: urls.static_url("style.css"),
            },
        }
    }
}

/// Index page template.
#[derive(Template, WebTemplate)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub page: PageContext,
    pub users: Vec<User>,
    pub flashes: Vec<Flash>,
    pub csrf_token: String,
    pub email_enabled: bool,
}

/// Routing check template.
#[derive(Template, WebTemplate)]
#[template(path = "test.html")]
pub struct TestTemplate {
    pub page: PageContext,
}

/// List every user, oldest first, with any pending flash messages.
#[instrument(skip_all)]
pub async fn index(
    State(state): State<AppState>,
    session: Session,
    csrf: CsrfToken,
) -> Result<impl IntoResponse> {
    tracing::info!("Index page requested");

    let users = state.users().list_all().await?;
    let flashes = take_flashes(&session).await;

    Ok(IndexTemplate {
        page: PageContext::new(&state),
        users,
        flashes,
        csrf_token: csrf.0,
        email_enabled: state.notifier().is_some(),
    })
}

/// Static page used to check routing under a sub-directory.
#[instrument(skip_all)]
pub async fn test_page(State(state): State<AppState>) -> impl IntoResponse {
    TestTemplate {
        page: PageContext::new(&state),
    }
}
