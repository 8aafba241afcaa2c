use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use uuid::Uuid;

use crate::db::Database;
use crate::users::repo_types::{IssuedOtp, Message, NewUser, UniqueViolation, User, UserCredentials};

/// Persistence for user records and their inboxes.
///
/// Every mutating method is a single statement against one user, so callers
/// get per-user atomicity without explicit transactions.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>>;
    /// Prefers a verified holder when several records share the name.
    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>>;
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    /// Looks up by email or username, for sign-in.
    async fn find_by_identifier(&self, identifier: &str) -> anyhow::Result<Option<User>>;

    async fn create_user(&self, new: NewUser) -> anyhow::Result<User>;
    /// Rewrites credentials and code of an unverified record. Returns false
    /// when the record is gone or got verified in the meantime.
    async fn overwrite_unverified(
        &self,
        id: Uuid,
        credentials: &UserCredentials,
        otp: &IssuedOtp,
    ) -> anyhow::Result<bool>;
    async fn set_verify_code(&self, id: Uuid, otp: &IssuedOtp) -> anyhow::Result<bool>;
    async fn mark_verified(&self, id: Uuid) -> anyhow::Result<bool>;

    async fn accepting_messages(&self, id: Uuid) -> anyhow::Result<Option<bool>>;
    async fn set_accepting_messages(&self, id: Uuid, value: bool) -> anyhow::Result<Option<bool>>;

    /// Appends only while the owner accepts messages; false otherwise.
    async fn append_message(&self, user_id: Uuid, message: &Message) -> anyhow::Result<bool>;
    /// Newest first; equal timestamps come back latest-inserted first.
    async fn list_messages(&self, user_id: Uuid) -> anyhow::Result<Vec<Message>>;
    async fn delete_message(&self, user_id: Uuid, message_id: Uuid) -> anyhow::Result<bool>;
}

const USER_COLUMNS: &str = "id, username, email, password_hash, verify_code, \
     verify_code_expiry, is_verified, is_accepting_messages, created_at";

pub struct PgUserStore {
    db: Arc<Database>,
}

impl PgUserStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

fn map_unique(err: sqlx::Error, what: &str) -> anyhow::Error {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            anyhow::Error::new(UniqueViolation(what.to_string()))
        }
        _ => anyhow::Error::new(err).context(what.to_string()),
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let pool = self.db.connect().await?;
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("find user by id")?;
        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        let pool = self.db.connect().await?;
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users
            WHERE username = $1
            ORDER BY is_verified DESC, created_at DESC
            LIMIT 1
            "#
        ))
        .bind(username)
        .fetch_optional(pool)
        .await
        .context("find user by username")?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let pool = self.db.connect().await?;
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(pool)
        .await
        .context("find user by email")?;
        Ok(user)
    }

    async fn find_by_identifier(&self, identifier: &str) -> anyhow::Result<Option<User>> {
        let pool = self.db.connect().await?;
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users
            WHERE email = $1 OR username = $1
            ORDER BY is_verified DESC, created_at DESC
            LIMIT 1
            "#
        ))
        .bind(identifier)
        .fetch_optional(pool)
        .await
        .context("find user by identifier")?;
        Ok(user)
    }

    async fn create_user(&self, new: NewUser) -> anyhow::Result<User> {
        let pool = self.db.connect().await?;
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (id, username, email, password_hash, verify_code,
                               verify_code_expiry, is_verified, is_accepting_messages, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, FALSE, TRUE, $7)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&new.credentials.username)
        .bind(&new.credentials.email)
        .bind(&new.credentials.password_hash)
        .bind(&new.otp.code)
        .bind(new.otp.expires_at)
        .bind(new.created_at)
        .fetch_one(pool)
        .await
        .map_err(|e| map_unique(e, "create user"))?;
        Ok(user)
    }

    async fn overwrite_unverified(
        &self,
        id: Uuid,
        credentials: &UserCredentials,
        otp: &IssuedOtp,
    ) -> anyhow::Result<bool> {
        let pool = self.db.connect().await?;
        let res = sqlx::query(
            r#"
            UPDATE users
               SET username = $2, email = $3, password_hash = $4,
                   verify_code = $5, verify_code_expiry = $6
             WHERE id = $1 AND NOT is_verified
            "#,
        )
        .bind(id)
        .bind(&credentials.username)
        .bind(&credentials.email)
        .bind(&credentials.password_hash)
        .bind(&otp.code)
        .bind(otp.expires_at)
        .execute(pool)
        .await
        .map_err(|e| map_unique(e, "overwrite unverified user"))?;
        Ok(res.rows_affected() > 0)
    }

    async fn set_verify_code(&self, id: Uuid, otp: &IssuedOtp) -> anyhow::Result<bool> {
        let pool = self.db.connect().await?;
        let res = sqlx::query(
            r#"
            UPDATE users
               SET verify_code = $2, verify_code_expiry = $3
             WHERE id = $1 AND NOT is_verified
            "#,
        )
        .bind(id)
        .bind(&otp.code)
        .bind(otp.expires_at)
        .execute(pool)
        .await
        .context("set verify code")?;
        Ok(res.rows_affected() > 0)
    }

    async fn mark_verified(&self, id: Uuid) -> anyhow::Result<bool> {
        let pool = self.db.connect().await?;
        let res = sqlx::query("UPDATE users SET is_verified = TRUE WHERE id = $1 AND NOT is_verified")
            .bind(id)
            .execute(pool)
            .await
            .map_err(|e| map_unique(e, "mark user verified"))?;
        Ok(res.rows_affected() > 0)
    }

    async fn accepting_messages(&self, id: Uuid) -> anyhow::Result<Option<bool>> {
        let pool = self.db.connect().await?;
        let flag = sqlx::query_scalar::<_, bool>(
            "SELECT is_accepting_messages FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("read accepting flag")?;
        Ok(flag)
    }

    async fn set_accepting_messages(&self, id: Uuid, value: bool) -> anyhow::Result<Option<bool>> {
        let pool = self.db.connect().await?;
        let flag = sqlx::query_scalar::<_, bool>(
            r#"
            UPDATE users SET is_accepting_messages = $2
             WHERE id = $1
            RETURNING is_accepting_messages
            "#,
        )
        .bind(id)
        .bind(value)
        .fetch_optional(pool)
        .await
        .context("write accepting flag")?;
        Ok(flag)
    }

    async fn append_message(&self, user_id: Uuid, message: &Message) -> anyhow::Result<bool> {
        let pool = self.db.connect().await?;
        let res = sqlx::query(
            r#"
            INSERT INTO messages (id, user_id, content, created_at)
            SELECT $1, id, $3, $4
              FROM users
             WHERE id = $2 AND is_accepting_messages
            "#,
        )
        .bind(message.id)
        .bind(user_id)
        .bind(&message.content)
        .bind(message.created_at)
        .execute(pool)
        .await
        .context("append message")?;
        Ok(res.rows_affected() > 0)
    }

    async fn list_messages(&self, user_id: Uuid) -> anyhow::Result<Vec<Message>> {
        let pool = self.db.connect().await?;
        let rows = sqlx::query_as::<_, Message>(
            r#"
            SELECT id, content, created_at
              FROM messages
             WHERE user_id = $1
             ORDER BY created_at DESC, seq DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
        .context("list messages")?;
        Ok(rows)
    }

    async fn delete_message(&self, user_id: Uuid, message_id: Uuid) -> anyhow::Result<bool> {
        let pool = self.db.connect().await?;
        let res = sqlx::query("DELETE FROM messages WHERE id = $1 AND user_id = $2")
            .bind(message_id)
            .bind(user_id)
            .execute(pool)
            .await
            .context("delete message")?;
        Ok(res.rows_affected() > 0)
    }
}
