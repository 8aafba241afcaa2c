//! Sign-up: resolves username/email collisions and decides whether to
//! create, reject, or reissue an existing unverified record.

use time::OffsetDateTime;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::auth::otp;
use crate::auth::password::hash_password;
use crate::auth::validation::{is_valid_email, normalize_email, username_errors, PASSWORD_MIN};
use crate::error::AppError;
use crate::state::AppState;
use crate::users::repo_types::{IssuedOtp, NewUser, UniqueViolation, User, UserCredentials};

#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    Created(Uuid),
    Reissued(Uuid),
}

impl RegisterOutcome {
    pub fn user_id(&self) -> Uuid {
        match self {
            RegisterOutcome::Created(id) | RegisterOutcome::Reissued(id) => *id,
        }
    }
}

/// Validated and normalised sign-up input.
struct Candidate {
    username: String,
    email: String,
    password: String,
}

fn validate(input: RegisterInput) -> Result<Candidate, AppError> {
    let username = input.username.trim().to_string();
    let errors = username_errors(&username);
    if !errors.is_empty() {
        return Err(AppError::Validation(errors.join(",")));
    }
    let email = normalize_email(&input.email);
    if !is_valid_email(&email) {
        return Err(AppError::Validation("Invalid Email Address".into()));
    }
    if input.password.chars().count() < PASSWORD_MIN {
        return Err(AppError::Validation(
            "password must be at least 6 character".into(),
        ));
    }
    Ok(Candidate {
        username,
        email,
        password: input.password,
    })
}

fn email_taken() -> AppError {
    AppError::Conflict("User already exists with this email".into())
}

fn username_taken() -> AppError {
    AppError::Conflict("Username is already taken".into())
}

fn map_store(err: anyhow::Error) -> AppError {
    if err.is::<UniqueViolation>() {
        return AppError::Conflict("Username or email is already in use".into());
    }
    AppError::Internal(err)
}

/// Overwrites an unverified record in place. Fails if someone verified it first.
async fn reissue(
    state: &AppState,
    holder: &User,
    credentials: &UserCredentials,
    otp: &IssuedOtp,
) -> Result<(), AppError> {
    let updated = state
        .store
        .overwrite_unverified(holder.id, credentials, otp)
        .await
        .map_err(map_store)?;
    if !updated {
        return Err(username_taken());
    }
    Ok(())
}

/// Runs the sign-up decision table and mails the resulting code.
///
/// 1. verified holder of the username: rejected, nothing written;
/// 2. unverified holder: its credentials and code are overwritten;
/// 3. the email belongs to an account: rejected when verified, otherwise
///    that record takes the new username and credentials;
/// 4. otherwise a fresh unverified record is created.
///
/// An email failure is reported after the write and leaves the code valid.
#[instrument(skip(state, input), fields(username = %input.username))]
pub async fn register(
    state: &AppState,
    input: RegisterInput,
    now: OffsetDateTime,
) -> Result<RegisterOutcome, AppError> {
    let candidate = validate(input)?;

    let by_username = state.store.find_by_username(&candidate.username).await?;
    if by_username.as_ref().is_some_and(|u| u.is_verified) {
        warn!("username already taken by a verified account");
        return Err(username_taken());
    }
    let by_email = state.store.find_by_email(&candidate.email).await?;

    let password_hash = hash_password(&candidate.password)?;
    let credentials = UserCredentials {
        username: candidate.username,
        email: candidate.email,
        password_hash,
    };
    let otp = IssuedOtp::mint(now);

    let outcome = match (by_username, by_email) {
        (Some(holder), by_email) => {
            if let Some(other) = by_email.filter(|o| o.id != holder.id) {
                warn!(holder_id = %holder.id, other_id = %other.id, "email belongs to another account");
                return Err(email_taken());
            }
            reissue(state, &holder, &credentials, &otp).await?;
            info!(user_id = %holder.id, "unverified username reissued");
            RegisterOutcome::Reissued(holder.id)
        }
        (None, Some(existing)) if existing.is_verified => {
            warn!(user_id = %existing.id, "email already registered");
            return Err(email_taken());
        }
        (None, Some(existing)) => {
            reissue(state, &existing, &credentials, &otp).await?;
            info!(user_id = %existing.id, "unverified email reissued");
            RegisterOutcome::Reissued(existing.id)
        }
        (None, None) => {
            let user = state
                .store
                .create_user(NewUser {
                    credentials: credentials.clone(),
                    otp: otp.clone(),
                    created_at: now,
                })
                .await
                .map_err(map_store)?;
            info!(user_id = %user.id, "user registered");
            RegisterOutcome::Created(user.id)
        }
    };

    let user = state
        .store
        .find_by_id(outcome.user_id())
        .await?
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("registered user vanished")))?;
    otp::deliver(state, &user, &otp).await?;

    Ok(outcome)
}
