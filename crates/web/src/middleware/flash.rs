//! Flash messages: a queue in the session, drained by the next page render.

use tower_sessions::Session;

use crate::models::{Flash, session::keys};

/// Queue `flash` for the next rendered page.
///
/// A session store failure is logged and the message dropped; flashes never
/// fail the request.
pub async fn push_flash(session: &Session, flash: Flash) {
    let mut queue = match session.get::<Vec<Flash>>(keys::FLASHES).await {
        Ok(queue) => queue.unwrap_or_default(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read flash queue");
            Vec::new()
        }
    };
    queue.push(flash);

    if let Err(e) = session.insert(keys::FLASHES, queue).await {
        tracing::warn!(error = %e, "Failed to store flash message");
    }
}

/// Remove and return every queued flash, oldest first.
pub async fn take_flashes(session: &Session) -> Vec<Flash> {
    match session.remove::<Vec<Flash>>(keys::FLASHES).await {
        Ok(queue) => queue.unwrap_or_default(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to drain flash queue");
            Vec::new()
        }
    }
}
