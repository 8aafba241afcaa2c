use axum::{
    extract::{Path, State},
    routing::{delete, get, post},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::jwt::AuthUser,
    error::{ApiResponse, AppError},
    state::AppState,
};

use super::dto::{AcceptMessagesRequest, AcceptanceStatus, MessagesResponse, SendMessageRequest};
use super::services;

pub fn public_routes() -> Router<AppState> {
    Router::new().route("/send-message", post(send_message))
}

pub fn owner_routes() -> Router<AppState> {
    Router::new()
        .route("/accept-messages", get(get_accepting).post(set_accepting))
        .route("/get-messages", get(get_messages))
        .route("/delete-message/:message_id", delete(delete_message))
}

#[instrument(skip(state, payload))]
pub async fn send_message(
    State(state): State<AppState>,
    Json(payload): Json<SendMessageRequest>,
) -> Result<Json<ApiResponse>, AppError> {
    services::send(
        &state,
        payload.username.trim(),
        &payload.content,
        OffsetDateTime::now_utc(),
    )
    .await?;
    Ok(Json(ApiResponse::ok("Message sent successfully")))
}

#[instrument(skip(state))]
pub async fn get_accepting(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<AcceptanceStatus>, AppError> {
    let flag = services::accepting(&state, user_id).await?;
    Ok(Json(AcceptanceStatus {
        success: true,
        message: None,
        is_accepting_messages: flag,
    }))
}

#[instrument(skip(state, payload))]
pub async fn set_accepting(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<AcceptMessagesRequest>,
) -> Result<Json<AcceptanceStatus>, AppError> {
    let flag = services::set_accepting(&state, user_id, payload.accept_messages).await?;
    Ok(Json(AcceptanceStatus {
        success: true,
        message: Some("Message acceptance status updated successfully".into()),
        is_accepting_messages: flag,
    }))
}

#[instrument(skip(state))]
pub async fn get_messages(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<MessagesResponse>, AppError> {
    let messages = services::list(&state, user_id).await?;
    Ok(Json(MessagesResponse {
        success: true,
        messages,
    }))
}

#[instrument(skip(state))]
pub async fn delete_message(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(message_id): Path<String>,
) -> Result<Json<ApiResponse>, AppError> {
    // A malformed id cannot name one of the caller's messages.
    let message_id = Uuid::parse_str(&message_id)
        .map_err(|_| AppError::NotFound("Message not found or already deleted".into()))?;
    services::delete(&state, user_id, message_id).await?;
    Ok(Json(ApiResponse::ok("Message deleted")))
}
