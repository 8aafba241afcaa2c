//! One-time verification codes: minting, persistence, delivery and checking.

use rand::{rngs::OsRng, Rng};
use time::{Duration, OffsetDateTime};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::mail::VerificationEmail;
use crate::state::AppState;
use crate::users::repo_types::{IssuedOtp, UniqueViolation, User};

/// How long an issued code stays valid. The email copy promises 10 minutes.
pub const OTP_VALIDITY: Duration = Duration::minutes(10);

impl IssuedOtp {
    pub fn mint(now: OffsetDateTime) -> Self {
        Self {
            code: generate_code(),
            expires_at: now + OTP_VALIDITY,
        }
    }
}

/// Six digits from the OS RNG, never starting with zero.
pub fn generate_code() -> String {
    OsRng.gen_range(100_000..1_000_000u32).to_string()
}

/// A wrong code is always a mismatch; a right one past its expiry is expired.
pub fn check_code(
    stored_code: &str,
    expires_at: OffsetDateTime,
    presented: &str,
    now: OffsetDateTime,
) -> Result<(), AppError> {
    if stored_code != presented {
        return Err(AppError::Mismatch);
    }
    if now >= expires_at {
        return Err(AppError::Expired);
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    Verified,
    AlreadyVerified,
}

/// Mints a fresh code for an unverified account and stores it over the old one.
pub async fn issue(state: &AppState, user_id: Uuid, now: OffsetDateTime) -> Result<IssuedOtp, AppError> {
    let otp = IssuedOtp::mint(now);
    if !state.store.set_verify_code(user_id, &otp).await? {
        return Err(AppError::NotFound("No unverified account to issue a code for".into()));
    }
    info!(%user_id, "verification code issued");
    Ok(otp)
}

/// Hands the code to the email collaborator. The stored code is kept on failure.
pub async fn deliver(state: &AppState, user: &User, otp: &IssuedOtp) -> Result<(), AppError> {
    let email = VerificationEmail {
        to: user.email.clone(),
        display_name: user.username.clone(),
        code: otp.code.clone(),
    };
    state.mailer.send_verification(&email).await.map_err(|e| {
        warn!(error = %e, user_id = %user.id, "verification email failed");
        AppError::Upstream("Failed to send verification email".into())
    })
}

#[instrument(skip(state, presented))]
pub async fn verify(
    state: &AppState,
    username: &str,
    presented: &str,
    now: OffsetDateTime,
) -> Result<VerifyOutcome, AppError> {
    let user = state
        .store
        .find_by_username(username)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    if user.is_verified {
        return Ok(VerifyOutcome::AlreadyVerified);
    }

    check_code(&user.verify_code, user.verify_code_expiry, presented, now).map_err(|e| {
        warn!(user_id = %user.id, reason = %e, "verification rejected");
        e
    })?;

    match state.store.mark_verified(user.id).await {
        Ok(true) => {
            info!(user_id = %user.id, "account verified");
            Ok(VerifyOutcome::Verified)
        }
        Ok(false) => Ok(VerifyOutcome::AlreadyVerified),
        Err(e) if e.is::<UniqueViolation>() => {
            Err(AppError::Conflict("Username is already taken".into()))
        }
        Err(e) => Err(e.into()),
    }
}

/// Reissues and re-sends the code of an unverified account.
#[instrument(skip(state))]
pub async fn resend(state: &AppState, username: &str, now: OffsetDateTime) -> Result<(), AppError> {
    let user = state
        .store
        .find_by_username(username)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;
    if user.is_verified {
        return Err(AppError::Conflict("Account is already verified".into()));
    }
    let otp = issue(state, user.id, now).await?;
    deliver(state, &user, &otp).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::registration::{register, RegisterInput};
    use time::macros::datetime;

    const T0: OffsetDateTime = datetime!(2026-01-01 12:00 UTC);

    #[test]
    fn minted_code_is_six_digits_and_expires_after_validity() {
        for _ in 0..100 {
            let otp = IssuedOtp::mint(T0);
            assert_eq!(otp.code.len(), 6);
            assert!(otp.code.bytes().all(|b| b.is_ascii_digit()));
            assert_eq!(otp.expires_at - T0, Duration::minutes(10));
        }
    }

    #[test]
    fn check_code_orders_mismatch_before_expiry() {
        let expiry = T0 + OTP_VALIDITY;
        assert!(check_code("123456", expiry, "123456", T0).is_ok());
        assert!(matches!(
            check_code("123456", expiry, "654321", T0),
            Err(AppError::Mismatch)
        ));
        assert!(matches!(
            check_code("123456", expiry, "123456", expiry),
            Err(AppError::Expired)
        ));
        assert!(matches!(
            check_code("123456", expiry, "000000", expiry + Duration::hours(1)),
            Err(AppError::Mismatch)
        ));
    }

    async fn registered(state: &AppState) -> User {
        register(
            state,
            RegisterInput {
                username: "sam000".into(),
                email: "sam@x.com".into(),
                password: "12345678".into(),
            },
            T0,
        )
        .await
        .expect("register");
        state.store.find_by_username("sam000").await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn verify_with_right_code_flips_flag_once() {
        let state = AppState::fake();
        let user = registered(&state).await;

        let first = verify(&state, "sam000", &user.verify_code, T0 + Duration::minutes(1))
            .await
            .unwrap();
        assert_eq!(first, VerifyOutcome::Verified);
        let second = verify(&state, "sam000", &user.verify_code, T0 + Duration::minutes(2))
            .await
            .unwrap();
        assert_eq!(second, VerifyOutcome::AlreadyVerified);

        let stored = state.store.find_by_id(user.id).await.unwrap().unwrap();
        assert!(stored.is_verified);
    }

    #[tokio::test]
    async fn verify_after_expiry_leaves_account_unverified() {
        let state = AppState::fake();
        let user = registered(&state).await;

        let err = verify(&state, "sam000", &user.verify_code, user.verify_code_expiry)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Expired));
        let stored = state.store.find_by_id(user.id).await.unwrap().unwrap();
        assert!(!stored.is_verified);
    }

    #[tokio::test]
    async fn verify_with_wrong_code_is_a_mismatch() {
        let state = AppState::fake();
        let user = registered(&state).await;
        let wrong = if user.verify_code == "999999" { "100000" } else { "999999" };

        let err = verify(&state, "sam000", wrong, T0).await.unwrap_err();
        assert!(matches!(err, AppError::Mismatch));
    }

    #[tokio::test]
    async fn verify_unknown_user_is_not_found() {
        let state = AppState::fake();
        let err = verify(&state, "ghost", "123456", T0).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn resend_replaces_code_and_mails_it() {
        let (state, mailer) = AppState::fake_with_recording_mailer();
        let user = registered(&state).await;

        let later = T0 + Duration::minutes(30);
        resend(&state, "sam000", later).await.expect("resend");

        let stored = state.store.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(stored.verify_code_expiry, later + OTP_VALIDITY);
        let sent = mailer.last().await.expect("email sent");
        assert_eq!(sent.code, stored.verify_code);
        assert_eq!(sent.to, "sam@x.com");

        verify(&state, "sam000", &stored.verify_code, later + Duration::minutes(1))
            .await
            .expect("fresh code verifies");
    }

    #[tokio::test]
    async fn resend_refuses_verified_accounts() {
        let state = AppState::fake();
        let user = registered(&state).await;
        verify(&state, "sam000", &user.verify_code, T0).await.unwrap();

        let err = resend(&state, "sam000", T0).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }
}
