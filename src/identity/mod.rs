//! Identity directory contract and the directories the gateway can verify against.

pub mod delivery;
pub mod introspect;
pub mod jwt;
pub mod pool;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use delivery::{CodeDelivery, CodeMessage, CodePurpose, DeliveryError, LogDelivery};
pub use introspect::IntrospectionDirectory;
pub use jwt::JwtIdentityDirectory;
pub use pool::{AuthenticationResult, PoolError, UserPool};

/// Identity resolved from a verified bearer token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub id: String,
    pub username: String,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("token rejected: {0}")]
    Rejected(String),

    #[error("identity directory unavailable: {0}")]
    Unavailable(String),
}

/// Verifies opaque bearer tokens issued to subjects
#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    async fn verify(&self, token: &str) -> Result<Subject, IdentityError>;

    /// Short name for logs
    fn name(&self) -> &'static str;
}
