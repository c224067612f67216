use std::fmt;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

/// What a one-time code lets its holder do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CodePurpose {
    ConfirmSignUp,
    ResetPassword,
}

impl fmt::Display for CodePurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodePurpose::ConfirmSignUp => f.write_str("sign-up confirmation"),
            CodePurpose::ResetPassword => f.write_str("password reset"),
        }
    }
}

/// One-time code addressed to a pool user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeMessage {
    pub username: String,
    pub email: Option<String>,
    pub purpose: CodePurpose,
    pub code: String,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("code delivery failed: {0}")]
pub struct DeliveryError(pub String);

/// Out-of-band channel (mail, SMS) that carries codes to users
#[async_trait]
pub trait CodeDelivery: Send + Sync {
    async fn deliver(&self, message: CodeMessage) -> Result<(), DeliveryError>;
}

/// Delivery for deployments without a mail channel: the code goes to the
/// debug log only.
#[derive(Debug, Default)]
pub struct LogDelivery;

#[async_trait]
impl CodeDelivery for LogDelivery {
    async fn deliver(&self, message: CodeMessage) -> Result<(), DeliveryError> {
        tracing::info!(
            "Sending {} code to '{}' at {}",
            message.purpose,
            message.username,
            message.email.as_deref().unwrap_or("<no address>")
        );
        tracing::debug!("{} code for '{}': {}", message.purpose, message.username, message.code);
        Ok(())
    }
}
