use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::delivery::{CodeDelivery, CodeMessage, CodePurpose};
use crate::auth::{TokenIssuer, TokenUse};
use crate::broker::{Permission, ScopedCredential};

const MIN_PASSWORD_LENGTH: usize = 8;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("credential does not grant {required} access to user pool '{pool}'")]
    AccessDenied { pool: String, required: Permission },

    #[error("The username or password is incorrect")]
    NotAuthorized,

    #[error("User does not exist")]
    UserNotFound,

    #[error("User already exists")]
    UsernameExists,

    #[error("Password must be at least {0} characters")]
    InvalidPassword(usize),

    #[error("User is not confirmed")]
    NotConfirmed,

    #[error("User is already confirmed")]
    AlreadyConfirmed,

    #[error("Invalid verification code")]
    CodeMismatch,

    #[error("{0}")]
    Delivery(String),

    #[error("Token issuing failed: {0}")]
    Token(String),
}

/// Tokens handed back by a successful login or refresh
#[derive(Debug, Clone, Serialize)]
pub struct AuthenticationResult {
    pub id_token: String,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub token_type: String,
}

#[derive(Debug, Clone)]
struct UserRecord {
    subject_id: Uuid,
    email: Option<String>,
    salt: String,
    password_hash: String,
    created_at: DateTime<Utc>,
    confirmed: bool,
    confirmation_code: Option<String>,
    reset_code: Option<String>,
}

impl UserRecord {
    fn set_password(&mut self, password: &str) {
        self.salt = Uuid::new_v4().simple().to_string();
        self.password_hash = UserPool::hash_password(&self.salt, password);
    }

    fn password_matches(&self, password: &str) -> bool {
        UserPool::hash_password(&self.salt, password) == self.password_hash
    }
}

/// Six-digit one-time code
fn one_time_code() -> String {
    format!("{:06}", Uuid::new_v4().as_u128() % 1_000_000)
}

fn check_password(password: &str) -> Result<(), PoolError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(PoolError::InvalidPassword(MIN_PASSWORD_LENGTH));
    }
    Ok(())
}

/// User registered in the pool, as returned to callers
#[derive(Debug, Clone, Serialize)]
pub struct PoolUser {
    pub subject_id: Uuid,
    pub username: String,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// In-process user pool issuing tokens the gateway's JWT directory accepts.
/// Administrative calls need a credential scoped to the pool. New users stay
/// unconfirmed until they echo back the code sent through `delivery`.
pub struct UserPool {
    id: String,
    tokens: TokenIssuer,
    delivery: Arc<dyn CodeDelivery>,
    users: RwLock<HashMap<String, UserRecord>>,
}

impl UserPool {
    pub fn new(id: impl Into<String>, tokens: TokenIssuer, delivery: Arc<dyn CodeDelivery>) -> Self {
        Self {
            id: id.into(),
            tokens,
            delivery,
            users: RwLock::new(HashMap::new()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Pool operations under `credential`; every admin call changes pool state
    /// or mints tokens, so write access is required.
    pub fn admin<'a>(&'a self, credential: &ScopedCredential) -> Result<PoolAdmin<'a>, PoolError> {
        if !credential.permits(Permission::Write, &self.id, Utc::now()) {
            return Err(PoolError::AccessDenied {
                pool: self.id.clone(),
                required: Permission::Write,
            });
        }
        Ok(PoolAdmin { pool: self })
    }

    fn hash_password(salt: &str, password: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(salt.as_bytes());
        hasher.update(password.as_bytes());
        hasher.finalize().iter().map(|b| format!("{:02x}", b)).collect()
    }

    async fn send_code(
        &self,
        username: &str,
        email: Option<String>,
        purpose: CodePurpose,
        code: String,
    ) -> Result<(), PoolError> {
        let message = CodeMessage {
            username: username.to_string(),
            email,
            purpose,
            code,
        };
        self.delivery
            .deliver(message)
            .await
            .map_err(|e| PoolError::Delivery(e.to_string()))
    }

    fn authenticate(&self, subject_id: &Uuid, username: &str, refresh_token: Option<String>) -> Result<AuthenticationResult, PoolError> {
        let sub = subject_id.to_string();
        let issue = |token_use| {
            self.tokens
                .issue(&sub, username, token_use)
                .map_err(|e| PoolError::Token(e.to_string()))
        };

        Ok(AuthenticationResult {
            id_token: issue(TokenUse::Id)?,
            access_token: issue(TokenUse::Access)?,
            refresh_token: match refresh_token {
                Some(token) => token,
                None => issue(TokenUse::Refresh)?,
            },
            expires_in: self.tokens.expires_in_secs(),
            token_type: "Bearer".to_string(),
        })
    }
}

pub struct PoolAdmin<'a> {
    pool: &'a UserPool,
}

impl PoolAdmin<'_> {
    /// Register an unconfirmed user and send it a confirmation code. A failed
    /// delivery leaves the user registered; the code can be resent.
    pub async fn create_user(&self, username: &str, password: &str, email: Option<String>) -> Result<PoolUser, PoolError> {
        check_password(password)?;

        let code = one_time_code();
        let user = {
            let mut users = self.pool.users.write().await;
            if users.contains_key(username) {
                return Err(PoolError::UsernameExists);
            }

            let mut record = UserRecord {
                subject_id: Uuid::new_v4(),
                email,
                salt: String::new(),
                password_hash: String::new(),
                created_at: Utc::now(),
                confirmed: false,
                confirmation_code: Some(code.clone()),
                reset_code: None,
            };
            record.set_password(password);
            let user = PoolUser {
                subject_id: record.subject_id,
                username: username.to_string(),
                email: record.email.clone(),
                created_at: record.created_at,
            };
            users.insert(username.to_string(), record);
            user
        };

        tracing::info!("Created user '{}' in pool '{}'", username, self.pool.id);
        self.pool
            .send_code(username, user.email.clone(), CodePurpose::ConfirmSignUp, code)
            .await?;
        Ok(user)
    }

    /// Confirm a sign-up with the code sent at registration
    pub async fn confirm_sign_up(&self, username: &str, code: &str) -> Result<(), PoolError> {
        let mut users = self.pool.users.write().await;
        let record = users.get_mut(username).ok_or(PoolError::UserNotFound)?;
        if record.confirmed {
            return Err(PoolError::AlreadyConfirmed);
        }
        if record.confirmation_code.as_deref() != Some(code) {
            return Err(PoolError::CodeMismatch);
        }

        record.confirmed = true;
        record.confirmation_code = None;
        tracing::info!("Confirmed user '{}' in pool '{}'", username, self.pool.id);
        Ok(())
    }

    /// Replace an unconfirmed user's code and send the new one
    pub async fn resend_confirmation_code(&self, username: &str) -> Result<(), PoolError> {
        let code = one_time_code();
        let email = {
            let mut users = self.pool.users.write().await;
            let record = users.get_mut(username).ok_or(PoolError::UserNotFound)?;
            if record.confirmed {
                return Err(PoolError::AlreadyConfirmed);
            }
            record.confirmation_code = Some(code.clone());
            record.email.clone()
        };

        self.pool
            .send_code(username, email, CodePurpose::ConfirmSignUp, code)
            .await
    }

    /// Start a password reset by sending a reset code
    pub async fn forgot_password(&self, username: &str) -> Result<(), PoolError> {
        let code = one_time_code();
        let email = {
            let mut users = self.pool.users.write().await;
            let record = users.get_mut(username).ok_or(PoolError::UserNotFound)?;
            if !record.confirmed {
                return Err(PoolError::NotConfirmed);
            }
            record.reset_code = Some(code.clone());
            record.email.clone()
        };

        tracing::info!("Password reset requested for '{}' in pool '{}'", username, self.pool.id);
        self.pool
            .send_code(username, email, CodePurpose::ResetPassword, code)
            .await
    }

    /// Finish a password reset. The code is spent only when the new password is accepted.
    pub async fn confirm_forgot_password(&self, username: &str, code: &str, password: &str) -> Result<(), PoolError> {
        let mut users = self.pool.users.write().await;
        let record = users.get_mut(username).ok_or(PoolError::UserNotFound)?;
        if !record.confirmed {
            return Err(PoolError::NotConfirmed);
        }
        if record.reset_code.as_deref() != Some(code) {
            return Err(PoolError::CodeMismatch);
        }
        check_password(password)?;

        record.set_password(password);
        record.reset_code = None;
        tracing::info!("Reset password for '{}' in pool '{}'", username, self.pool.id);
        Ok(())
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<AuthenticationResult, PoolError> {
        let users = self.pool.users.read().await;
        let record = users.get(username).ok_or(PoolError::UserNotFound)?;

        if !record.password_matches(password) {
            return Err(PoolError::NotAuthorized);
        }
        if !record.confirmed {
            return Err(PoolError::NotConfirmed);
        }

        self.pool.authenticate(&record.subject_id, username, None)
    }

    /// Mint new id/access tokens; the refresh token itself is returned unchanged
    pub async fn refresh(&self, username: &str, refresh_token: &str) -> Result<AuthenticationResult, PoolError> {
        let claims = self
            .pool
            .tokens
            .verify(refresh_token)
            .map_err(|_| PoolError::NotAuthorized)?;
        if claims.token_use != TokenUse::Refresh || claims.username != username {
            return Err(PoolError::NotAuthorized);
        }

        let users = self.pool.users.read().await;
        let record = users.get(username).ok_or(PoolError::NotAuthorized)?;
        if record.subject_id.to_string() != claims.sub {
            return Err(PoolError::NotAuthorized);
        }

        self.pool
            .authenticate(&record.subject_id, username, Some(refresh_token.to_string()))
    }

    /// Replace the password of the user an access token was issued to
    pub async fn change_password(&self, access_token: &str, previous: &str, proposed: &str) -> Result<(), PoolError> {
        let claims = self
            .pool
            .tokens
            .verify(access_token)
            .map_err(|_| PoolError::NotAuthorized)?;
        if claims.token_use != TokenUse::Access {
            return Err(PoolError::NotAuthorized);
        }

        let mut users = self.pool.users.write().await;
        let record = users.get_mut(&claims.username).ok_or(PoolError::NotAuthorized)?;
        if record.subject_id.to_string() != claims.sub || !record.password_matches(previous) {
            return Err(PoolError::NotAuthorized);
        }
        check_password(proposed)?;

        record.set_password(proposed);

        tracing::info!("Changed password for '{}' in pool '{}'", claims.username, self.pool.id);
        Ok(())
    }
}
