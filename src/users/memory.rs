use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::users::repo::UserStore;
use crate::users::repo_types::{IssuedOtp, Message, NewUser, UniqueViolation, User, UserCredentials};

#[derive(Default)]
struct Inner {
    users: Vec<User>,
    inboxes: HashMap<Uuid, Vec<Message>>,
}

impl Inner {
    fn email_taken(&self, email: &str, except: Option<Uuid>) -> bool {
        self.users
            .iter()
            .any(|u| u.email == email && Some(u.id) != except)
    }

    fn verified_username_taken(&self, username: &str, except: Option<Uuid>) -> bool {
        self.users
            .iter()
            .any(|u| u.is_verified && u.username == username && Some(u.id) != except)
    }

    fn user_mut(&mut self, id: Uuid) -> Option<&mut User> {
        self.users.iter_mut().find(|u| u.id == id)
    }
}

/// In-memory store mirroring the Postgres constraints, for tests.
#[derive(Default)]
pub struct MemoryUserStore {
    inner: Mutex<Inner>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn user_count(&self) -> usize {
        self.inner.lock().await.users.len()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let inner = self.inner.lock().await;
        Ok(inner.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        let inner = self.inner.lock().await;
        let mut found: Vec<&User> = inner.users.iter().filter(|u| u.username == username).collect();
        found.sort_by(|a, b| {
            b.is_verified
                .cmp(&a.is_verified)
                .then(b.created_at.cmp(&a.created_at))
        });
        Ok(found.first().map(|u| (*u).clone()))
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let inner = self.inner.lock().await;
        Ok(inner.users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_by_identifier(&self, identifier: &str) -> anyhow::Result<Option<User>> {
        if let Some(user) = self.find_by_email(identifier).await? {
            return Ok(Some(user));
        }
        self.find_by_username(identifier).await
    }

    async fn create_user(&self, new: NewUser) -> anyhow::Result<User> {
        let mut inner = self.inner.lock().await;
        if inner.email_taken(&new.credentials.email, None) {
            return Err(UniqueViolation("create user".into()).into());
        }
        let user = User {
            id: Uuid::new_v4(),
            username: new.credentials.username,
            email: new.credentials.email,
            password_hash: new.credentials.password_hash,
            verify_code: new.otp.code,
            verify_code_expiry: new.otp.expires_at,
            is_verified: false,
            is_accepting_messages: true,
            created_at: new.created_at,
        };
        inner.users.push(user.clone());
        Ok(user)
    }

    async fn overwrite_unverified(
        &self,
        id: Uuid,
        credentials: &UserCredentials,
        otp: &IssuedOtp,
    ) -> anyhow::Result<bool> {
        let mut inner = self.inner.lock().await;
        if inner.email_taken(&credentials.email, Some(id)) {
            return Err(UniqueViolation("overwrite unverified user".into()).into());
        }
        let Some(user) = inner.user_mut(id).filter(|u| !u.is_verified) else {
            return Ok(false);
        };
        user.username = credentials.username.clone();
        user.email = credentials.email.clone();
        user.password_hash = credentials.password_hash.clone();
        user.verify_code = otp.code.clone();
        user.verify_code_expiry = otp.expires_at;
        Ok(true)
    }

    async fn set_verify_code(&self, id: Uuid, otp: &IssuedOtp) -> anyhow::Result<bool> {
        let mut inner = self.inner.lock().await;
        let Some(user) = inner.user_mut(id).filter(|u| !u.is_verified) else {
            return Ok(false);
        };
        user.verify_code = otp.code.clone();
        user.verify_code_expiry = otp.expires_at;
        Ok(true)
    }

    async fn mark_verified(&self, id: Uuid) -> anyhow::Result<bool> {
        let mut inner = self.inner.lock().await;
        let username = match inner.users.iter().find(|u| u.id == id && !u.is_verified) {
            Some(u) => u.username.clone(),
            None => return Ok(false),
        };
        if inner.verified_username_taken(&username, Some(id)) {
            return Err(UniqueViolation("mark user verified".into()).into());
        }
        if let Some(user) = inner.user_mut(id) {
            user.is_verified = true;
        }
        Ok(true)
    }

    async fn accepting_messages(&self, id: Uuid) -> anyhow::Result<Option<bool>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .users
            .iter()
            .find(|u| u.id == id)
            .map(|u| u.is_accepting_messages))
    }

    async fn set_accepting_messages(&self, id: Uuid, value: bool) -> anyhow::Result<Option<bool>> {
        let mut inner = self.inner.lock().await;
        Ok(inner.user_mut(id).map(|u| {
            u.is_accepting_messages = value;
            value
        }))
    }

    async fn append_message(&self, user_id: Uuid, message: &Message) -> anyhow::Result<bool> {
        let mut inner = self.inner.lock().await;
        let accepting = inner
            .users
            .iter()
            .any(|u| u.id == user_id && u.is_accepting_messages);
        if !accepting {
            return Ok(false);
        }
        inner.inboxes.entry(user_id).or_default().push(message.clone());
        Ok(true)
    }

    async fn list_messages(&self, user_id: Uuid) -> anyhow::Result<Vec<Message>> {
        let inner = self.inner.lock().await;
        let mut messages = inner.inboxes.get(&user_id).cloned().unwrap_or_default();
        // Inboxes are kept in insertion order; reversing first makes the
        // stable sort put the latest insert first among equal timestamps.
        messages.reverse();
        messages.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(messages)
    }

    async fn delete_message(&self, user_id: Uuid, message_id: Uuid) -> anyhow::Result<bool> {
        let mut inner = self.inner.lock().await;
        let Some(inbox) = inner.inboxes.get_mut(&user_id) else {
            return Ok(false);
        };
        let before = inbox.len();
        inbox.retain(|m| m.id != message_id);
        Ok(inbox.len() != before)
    }
}
