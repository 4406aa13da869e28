//! User registration and bulk deletion.

use axum::{Form, extract::State, response::Redirect};
use roster_core::{UserName, UserNameError};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use super::back_to_index;
use crate::error::add_breadcrumb;
use crate::middleware::push_flash;
use crate::models::Flash;
use crate::state::AppState;

/// Registration form.
#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    #[serde(default)]
    pub username: String,
}

/// Add one user. Blank names are rejected without touching storage.
#[instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<RegisterForm>,
) -> Redirect {
    let flash = match UserName::parse(&form.username) {
        Err(UserNameError::Empty) => Flash::error("名前を入力してください。"),
        Err(UserNameError::TooLong { max }) => {
            Flash::error(format!("名前は{max}文字以内で入力してください。"))
        }
        Ok(name) => match state.users().create(&name).await {
            Ok(user) => {
                tracing::info!(user_id = user.id.as_i64(), "User registered");
                add_breadcrumb(
                    "users",
                    "Registered user",
                    &[("user_id", user.id.to_string())],
                );
                Flash::success(format!("「{}」を登録しました。", user.name))
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to register user");
                Flash::error("登録に失敗しました。")
            }
        },
    };

    push_flash(&session, flash).await;
    back_to_index(&state)
}

/// Delete every user in one transaction.
#[instrument(skip_all)]
pub async fn delete_all(State(state): State<AppState>, session: Session) -> Redirect {
    let flash = match state.users().delete_all().await {
        Ok(count) => {
            tracing::info!(count, "Deleted all users");
            add_breadcrumb("users", "Deleted all users", &[("count", count.to_string())]);
            Flash::success(format!("{count} 件削除しました。"))
        }
        Err(e) => {
            let event_id = sentry::capture_error(&e);
            tracing::error!(error = %e, sentry_event_id = %event_id, "Failed to delete users");
            Flash::error("削除中にエラーが発生しました。")
        }
    };

    push_flash(&session, flash).await;
    back_to_index(&state)
}
