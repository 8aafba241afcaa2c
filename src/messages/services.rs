//! Inbox: gated anonymous sends, owner listing and deletion, and the
//! acceptance flag that gates sends.

use time::OffsetDateTime;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;
use crate::users::repo_types::Message;

pub const CONTENT_MIN: usize = 10;
pub const CONTENT_MAX: usize = 300;

pub fn validate_content(content: &str) -> Result<(), AppError> {
    let len = content.chars().count();
    if content.trim().is_empty() || len < CONTENT_MIN {
        return Err(AppError::Validation(
            "Content must be at least 10 characters long".into(),
        ));
    }
    if len > CONTENT_MAX {
        return Err(AppError::Validation(
            "Content must be at most 300 characters long".into(),
        ));
    }
    Ok(())
}

/// Appends an anonymous message to a verified user's inbox.
///
/// Nothing about the sender is taken as input, stored, or logged.
#[instrument(skip(state, content))]
pub async fn send(
    state: &AppState,
    target_username: &str,
    content: &str,
    now: OffsetDateTime,
) -> Result<Message, AppError> {
    validate_content(content)?;

    let target = state
        .store
        .find_by_username(target_username)
        .await?
        .filter(|u| u.is_verified)
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    if !target.is_accepting_messages {
        return Err(AppError::NotAccepting);
    }

    let message = Message {
        id: Uuid::new_v4(),
        content: content.to_string(),
        created_at: now,
    };
    // The insert re-checks the flag, so a toggle racing this send wins.
    if !state.store.append_message(target.id, &message).await? {
        warn!(user_id = %target.id, "inbox closed during send");
        return Err(AppError::NotAccepting);
    }
    info!(user_id = %target.id, message_id = %message.id, "message delivered");
    Ok(message)
}

pub async fn list(state: &AppState, user_id: Uuid) -> Result<Vec<Message>, AppError> {
    Ok(state.store.list_messages(user_id).await?)
}

#[instrument(skip(state))]
pub async fn delete(state: &AppState, user_id: Uuid, message_id: Uuid) -> Result<(), AppError> {
    if !state.store.delete_message(user_id, message_id).await? {
        return Err(AppError::NotFound(
            "Message not found or already deleted".into(),
        ));
    }
    info!(%user_id, %message_id, "message deleted");
    Ok(())
}

pub async fn accepting(state: &AppState, user_id: Uuid) -> Result<bool, AppError> {
    state
        .store
        .accepting_messages(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))
}

#[instrument(skip(state))]
pub async fn set_accepting(state: &AppState, user_id: Uuid, value: bool) -> Result<bool, AppError> {
    let flag = state
        .store
        .set_accepting_messages(user_id, value)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;
    info!(%user_id, accepting = flag, "acceptance flag updated");
    Ok(flag)
}
