use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,          // argon2 PHC string
    #[serde(skip_serializing)]
    pub verify_code: String,
    #[serde(skip_serializing)]
    pub verify_code_expiry: OffsetDateTime,
    pub is_verified: bool,
    pub is_accepting_messages: bool,
    pub created_at: OffsetDateTime,
}

/// One anonymous message in a user's inbox. Carries nothing about the sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// A verification code and the instant it stops being valid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedOtp {
    pub code: String,
    pub expires_at: OffsetDateTime,
}

/// Username, email and password hash written together on create or reissue.
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub credentials: UserCredentials,
    pub otp: IssuedOtp,
    pub created_at: OffsetDateTime,
}

/// Raised by stores when a write would break a uniqueness rule
/// (email, or username among verified accounts).
#[derive(Debug, thiserror::Error)]
#[error("unique constraint violated: {0}")]
pub struct UniqueViolation(pub String);
