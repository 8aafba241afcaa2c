use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::instrument;

use crate::{
    auth::{
        dto::{
            AuthResponse, PublicUser, RefreshRequest, ResendCodeRequest, SignInRequest,
            SignUpRequest, UsernameQuery, VerifyCodeRequest,
        },
        jwt::AuthUser,
        otp::{self, VerifyOutcome},
        registration::{register, RegisterInput},
        services,
        validation::is_well_formed_code,
    },
    error::{ApiResponse, AppError},
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/sign-up", post(sign_up))
        .route("/verify-code", post(verify_code))
        .route("/resend-code", post(resend_code))
        .route("/check-username-unique", get(check_username_unique))
        .route("/sign-in", post(sign_in))
        .route("/refresh", post(refresh))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

#[instrument(skip(state, payload))]
pub async fn sign_up(
    State(state): State<AppState>,
    Json(payload): Json<SignUpRequest>,
) -> Result<(StatusCode, Json<ApiResponse>), AppError> {
    let input = RegisterInput {
        username: payload.username,
        email: payload.email,
        password: payload.password,
    };
    register(&state, input, OffsetDateTime::now_utc()).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(
            "User registered successfully. Please verify your email",
        )),
    ))
}

#[instrument(skip(state, payload), fields(username = %payload.username))]
pub async fn verify_code(
    State(state): State<AppState>,
    Json(payload): Json<VerifyCodeRequest>,
) -> Result<Json<ApiResponse>, AppError> {
    let code = payload.code.trim();
    if !is_well_formed_code(code) {
        return Err(AppError::Validation(
            "Verification code must be 6 digits".into(),
        ));
    }
    let username = payload.username.trim();
    let message = match otp::verify(&state, username, code, OffsetDateTime::now_utc()).await? {
        VerifyOutcome::Verified => "Account verified successfully",
        VerifyOutcome::AlreadyVerified => "Account is already verified",
    };
    Ok(Json(ApiResponse::ok(message)))
}

#[instrument(skip(state, payload), fields(username = %payload.username))]
pub async fn resend_code(
    State(state): State<AppState>,
    Json(payload): Json<ResendCodeRequest>,
) -> Result<Json<ApiResponse>, AppError> {
    otp::resend(&state, payload.username.trim(), OffsetDateTime::now_utc()).await?;
    Ok(Json(ApiResponse::ok(
        "A new verification code has been sent to your email",
    )))
}

#[instrument(skip(state))]
pub async fn check_username_unique(
    State(state): State<AppState>,
    Query(query): Query<UsernameQuery>,
) -> Result<Json<ApiResponse>, AppError> {
    let username = query.username.unwrap_or_default();
    services::check_username(&state, username.trim()).await?;
    Ok(Json(ApiResponse::ok("Username is available")))
}

#[instrument(skip(state, payload))]
pub async fn sign_in(
    State(state): State<AppState>,
    Json(payload): Json<SignInRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let response = services::sign_in(&state, &payload.identifier, &payload.password).await?;
    Ok(Json(response))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let response = services::refresh(&state, &payload.refresh_token).await?;
    Ok(Json(response))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<PublicUser>, AppError> {
    Ok(Json(services::profile(&state, user_id).await?))
}
