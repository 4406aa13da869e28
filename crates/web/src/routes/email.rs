//! Send-email form.

use axum::{Form, extract::State, response::Redirect};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use super::back_to_index;
use crate::middleware::push_flash;
use crate::models::Flash;
use crate::services::OutgoingEmail;
use crate::state::AppState;

/// Email form.
#[derive(Debug, Deserialize)]
pub struct SendEmailForm {
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub body: String,
}

/// Send the message to the configured address. No retry.
#[instrument(skip_all)]
pub async fn send_email(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<SendEmailForm>,
) -> Redirect {
    let flash = match OutgoingEmail::compose(&form.subject, &form.body) {
        Err(e) => {
            tracing::debug!(reason = %e, "Email form rejected");
            Flash::error("件名と本文を入力してください。")
        }
        Ok(email) => match state.notifier() {
            None => {
                tracing::warn!("Email requested but SMTP is not configured");
                Flash::error("メール送信は設定されていません。")
            }
            Some(notifier) => match notifier.send(&email).await {
                Ok(()) => Flash::success("メールを送信しました。"),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to send email");
                    Flash::error("メール送信に失敗しました。")
                }
            },
        },
    };

    push_flash(&session, flash).await;
    back_to_index(&state)
}
