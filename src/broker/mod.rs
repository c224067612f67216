pub mod trust;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::routing::route::{Route, Verb};

pub use trust::{AssumeRoleRequest, LocalTrustAuthority, TrustAuthority, TrustError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Permission {
    Read,
    Write,
}

impl Permission {
    /// Scope policy: reads for GET, writes for everything that mutates or proxies
    pub fn for_verb(verb: Verb) -> Self {
        match verb {
            Verb::Get => Permission::Read,
            Verb::Post | Verb::Delete | Verb::Proxy => Permission::Write,
        }
    }

    /// Write access includes read access
    pub fn allows(self, required: Permission) -> bool {
        self == Permission::Write || required == Permission::Read
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Permission::Read => f.write_str("READ"),
            Permission::Write => f.write_str("WRITE"),
        }
    }
}

/// Pre-provisioned role granting one permission level on one resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CredentialScope {
    pub principal_role_id: String,
    pub permission: Permission,
    pub target_resource_id: String,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScopeError {
    #[error("No {permission} scope provisioned for '{target}'")]
    NotProvisioned { permission: Permission, target: String },

    #[error("{permission} scope for '{target}' is already provisioned with role '{existing}'")]
    AlreadyProvisioned {
        permission: Permission,
        target: String,
        existing: String,
    },
}

/// The fixed set of credential scopes, one per (permission, target resource)
#[derive(Debug, Default)]
pub struct ScopeCatalog {
    scopes: HashMap<(Permission, String), Arc<CredentialScope>>,
}

impl ScopeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn provision(
        &mut self,
        permission: Permission,
        target_resource_id: impl Into<String>,
        principal_role_id: impl Into<String>,
    ) -> Result<Arc<CredentialScope>, ScopeError> {
        let target = target_resource_id.into();
        let role = principal_role_id.into();
        let key = (permission, target.clone());

        if let Some(existing) = self.scopes.get(&key) {
            if existing.principal_role_id == role {
                return Ok(Arc::clone(existing));
            }
            return Err(ScopeError::AlreadyProvisioned {
                permission,
                target,
                existing: existing.principal_role_id.clone(),
            });
        }

        let scope = Arc::new(CredentialScope {
            principal_role_id: role,
            permission,
            target_resource_id: target,
        });
        tracing::debug!(
            "Provisioned {} scope on '{}' via role '{}'",
            scope.permission,
            scope.target_resource_id,
            scope.principal_role_id
        );
        self.scopes.insert(key, Arc::clone(&scope));
        Ok(scope)
    }

    /// Scope a route bound under `verb` on `target` must use
    pub fn scope_for(&self, verb: Verb, target: &str) -> Result<Arc<CredentialScope>, ScopeError> {
        let permission = Permission::for_verb(verb);
        self.scopes
            .get(&(permission, target.to_string()))
            .cloned()
            .ok_or_else(|| ScopeError::NotProvisioned {
                permission,
                target: target.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }
}

/// Short-lived credential handed to exactly one handler invocation
#[derive(Clone, Serialize)]
pub struct ScopedCredential {
    pub access_key_id: String,
    #[serde(skip_serializing)]
    pub secret_access_key: String,
    #[serde(skip_serializing)]
    pub session_token: String,
    pub role_id: String,
    pub session_name: String,
    pub permission: Permission,
    pub target_resource_id: String,
    pub expires_at: DateTime<Utc>,
}

impl ScopedCredential {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Whether this credential may perform `required` on `resource` at `now`
    pub fn permits(&self, required: Permission, resource: &str, now: DateTime<Utc>) -> bool {
        !self.is_expired(now) && self.target_resource_id == resource && self.permission.allows(required)
    }
}

impl fmt::Debug for ScopedCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedCredential")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &"<redacted>")
            .field("role_id", &self.role_id)
            .field("session_name", &self.session_name)
            .field("permission", &self.permission)
            .field("target_resource_id", &self.target_resource_id)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GrantError {
    #[error("Role '{role}' refused the credential exchange: {reason}")]
    Rejected { role: String, reason: String },

    #[error("Trust authority unavailable: {0}")]
    Unavailable(String),

    #[error("Credential exchange timed out after {0:?}")]
    Timeout(Duration),
}

/// Exchanges a route's bound scope for a short-lived credential
pub struct RoleBroker {
    authority: Arc<dyn TrustAuthority>,
    timeout: Duration,
    credential_ttl: Duration,
}

impl RoleBroker {
    pub fn new(authority: Arc<dyn TrustAuthority>, timeout: Duration, credential_ttl: Duration) -> Self {
        Self {
            authority,
            timeout,
            credential_ttl,
        }
    }

    pub async fn grant(&self, route: &Route) -> Result<ScopedCredential, GrantError> {
        let scope = route.scope();
        let request = AssumeRoleRequest {
            role_id: scope.principal_role_id.clone(),
            session_name: session_name(route),
            permission: scope.permission,
            target_resource_id: scope.target_resource_id.clone(),
            duration: self.credential_ttl,
        };

        let credential = match tokio::time::timeout(self.timeout, self.authority.assume_role(request)).await {
            Err(_) => {
                tracing::error!("Credential exchange for {} timed out after {:?}", route, self.timeout);
                return Err(GrantError::Timeout(self.timeout));
            }
            Ok(Err(TrustError::Rejected(reason))) => {
                tracing::warn!("Role '{}' rejected exchange for {}: {}", scope.principal_role_id, route, reason);
                return Err(GrantError::Rejected {
                    role: scope.principal_role_id.clone(),
                    reason,
                });
            }
            Ok(Err(TrustError::Unavailable(reason))) => {
                tracing::error!("Trust authority unavailable for {}: {}", route, reason);
                return Err(GrantError::Unavailable(reason));
            }
            Ok(Ok(credential)) => credential,
        };

        // An authority that hands back a different scope than requested is not trusted
        if credential.permission != scope.permission
            || credential.target_resource_id != scope.target_resource_id
            || credential.role_id != scope.principal_role_id
        {
            tracing::error!("Trust authority returned a credential outside the bound scope for {}", route);
            return Err(GrantError::Rejected {
                role: scope.principal_role_id.clone(),
                reason: "issued credential does not match the requested scope".to_string(),
            });
        }

        tracing::debug!(
            "Granted {} credential {} on '{}' for {}",
            credential.permission,
            credential.access_key_id,
            credential.target_resource_id,
            route
        );
        Ok(credential)
    }
}

/// Session name recorded by the trust authority, e.g. `GET_destinations`
fn session_name(route: &Route) -> String {
    let path: String = route
        .path()
        .trim_matches('/')
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("{}_{}", route.verb().as_str(), path.trim_end_matches('_'))
}
