use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

use super::{Permission, ScopedCredential};

/// Parameters of one assume-role exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssumeRoleRequest {
    pub role_id: String,
    pub session_name: String,
    pub permission: Permission,
    pub target_resource_id: String,
    pub duration: Duration,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TrustError {
    #[error("trust relationship rejected: {0}")]
    Rejected(String),

    #[error("trust authority unavailable: {0}")]
    Unavailable(String),
}

/// Issues short-lived credentials for pre-provisioned roles
#[async_trait]
pub trait TrustAuthority: Send + Sync {
    async fn assume_role(&self, request: AssumeRoleRequest) -> Result<ScopedCredential, TrustError>;
}

/// In-process trust authority. Only roles whose trust policy names this
/// gateway's principal can be assumed.
pub struct LocalTrustAuthority {
    principal_id: String,
    trusted_roles: HashSet<String>,
    signing_secret: Vec<u8>,
    max_duration: Duration,
}

impl LocalTrustAuthority {
    pub fn new(principal_id: impl Into<String>, signing_secret: impl Into<Vec<u8>>) -> Self {
        Self {
            principal_id: principal_id.into(),
            trusted_roles: HashSet::new(),
            signing_secret: signing_secret.into(),
            max_duration: Duration::from_secs(60 * 60),
        }
    }

    /// Allow the gateway principal to assume `role_id`
    pub fn trust(mut self, role_id: impl Into<String>) -> Self {
        self.trusted_roles.insert(role_id.into());
        self
    }

    fn derive_secret(&self, session_name: &str, key_id: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.signing_secret);
        hasher.update(self.principal_id.as_bytes());
        hasher.update(session_name.as_bytes());
        hasher.update(key_id.as_bytes());
        hasher
            .finalize()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect()
    }
}

#[async_trait]
impl TrustAuthority for LocalTrustAuthority {
    async fn assume_role(&self, request: AssumeRoleRequest) -> Result<ScopedCredential, TrustError> {
        if self.signing_secret.is_empty() {
            return Err(TrustError::Unavailable("signing secret not configured".to_string()));
        }
        if !self.trusted_roles.contains(&request.role_id) {
            return Err(TrustError::Rejected(format!(
                "principal '{}' is not trusted by role '{}'",
                self.principal_id, request.role_id
            )));
        }
        if request.duration.is_zero() {
            return Err(TrustError::Rejected("credential duration must be positive".to_string()));
        }

        let duration = request.duration.min(self.max_duration);
        let expires_at = Utc::now()
            + chrono::Duration::from_std(duration)
                .map_err(|e| TrustError::Rejected(format!("invalid credential duration: {}", e)))?;

        let access_key_id = format!("ASIA{}", &Uuid::new_v4().simple().to_string()[..16].to_uppercase());
        let secret_access_key = self.derive_secret(&request.session_name, &access_key_id);

        Ok(ScopedCredential {
            access_key_id,
            secret_access_key,
            session_token: Uuid::new_v4().to_string(),
            role_id: request.role_id,
            session_name: request.session_name,
            permission: request.permission,
            target_resource_id: request.target_resource_id,
            expires_at,
        })
    }
}
