use axum::extract::FromRef;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::auth::dto::{AuthResponse, PublicUser};
use crate::auth::jwt::{JwtKeys, TokenKind};
use crate::auth::password::{verify_against_dummy, verify_password};
use crate::auth::validation::{normalize_email, username_errors};
use crate::error::AppError;
use crate::state::AppState;
use crate::users::repo_types::User;

fn invalid_credentials() -> AppError {
    AppError::Authentication("Invalid credentials".into())
}

fn issue_tokens(state: &AppState, user: &User) -> Result<AuthResponse, AppError> {
    let keys = JwtKeys::from_ref(state);
    Ok(AuthResponse {
        access_token: keys.sign_access(user.id)?,
        refresh_token: keys.sign_refresh(user.id)?,
        user: PublicUser::from(user),
    })
}

/// Reports whether a username can still be claimed. Only verified accounts
/// hold a name for good.
#[instrument(skip(state))]
pub async fn check_username(state: &AppState, username: &str) -> Result<(), AppError> {
    let errors = username_errors(username);
    if !errors.is_empty() {
        return Err(AppError::Validation(errors.join(",")));
    }
    match state.store.find_by_username(username).await? {
        Some(u) if u.is_verified => Err(AppError::Conflict("Username is already taken".into())),
        _ => Ok(()),
    }
}

#[instrument(skip(state, password))]
pub async fn sign_in(
    state: &AppState,
    identifier: &str,
    password: &str,
) -> Result<AuthResponse, AppError> {
    let identifier = identifier.trim();
    let lookup = if identifier.contains('@') {
        normalize_email(identifier)
    } else {
        identifier.to_string()
    };

    let Some(user) = state.store.find_by_identifier(&lookup).await? else {
        verify_against_dummy(password);
        warn!("sign-in for unknown account");
        return Err(invalid_credentials());
    };

    if !verify_password(password, &user.password_hash)? {
        warn!(user_id = %user.id, "sign-in with wrong password");
        return Err(invalid_credentials());
    }

    if !user.is_verified {
        warn!(user_id = %user.id, "sign-in before verification");
        return Err(AppError::Authentication(
            "Please verify your account before signing in".into(),
        ));
    }

    info!(user_id = %user.id, "user signed in");
    issue_tokens(state, &user)
}

#[instrument(skip(state, refresh_token))]
pub async fn refresh(state: &AppState, refresh_token: &str) -> Result<AuthResponse, AppError> {
    let keys = JwtKeys::from_ref(state);
    let claims = keys
        .verify_kind(refresh_token, TokenKind::Refresh)
        .map_err(|_| AppError::Authentication("Invalid or expired token".into()))?;

    let user = state
        .store
        .find_by_id(claims.sub)
        .await?
        .filter(|u| u.is_verified)
        .ok_or_else(|| AppError::Authentication("User not found".into()))?;

    issue_tokens(state, &user)
}

pub async fn profile(state: &AppState, user_id: Uuid) -> Result<PublicUser, AppError> {
    let user = state
        .store
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::Authentication("User not found".into()))?;
    Ok(PublicUser::from(&user))
}
