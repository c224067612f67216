use async_trait::async_trait;

use super::{IdentityDirectory, IdentityError, Subject};
use crate::auth::{TokenIssuer, TokenUse};

/// Verifies pool-issued JWTs locally with the pool's shared secret
pub struct JwtIdentityDirectory {
    tokens: TokenIssuer,
}

impl JwtIdentityDirectory {
    pub fn new(tokens: TokenIssuer) -> Self {
        Self { tokens }
    }
}

#[async_trait]
impl IdentityDirectory for JwtIdentityDirectory {
    async fn verify(&self, token: &str) -> Result<Subject, IdentityError> {
        let claims = self
            .tokens
            .verify(token)
            .map_err(|e| IdentityError::Rejected(e.to_string()))?;

        // Refresh tokens only buy new tokens from the identity proxy
        if claims.token_use == TokenUse::Refresh {
            return Err(IdentityError::Rejected("refresh tokens cannot authorize requests".to_string()));
        }

        Ok(Subject {
            id: claims.sub,
            username: claims.username,
        })
    }

    fn name(&self) -> &'static str {
        "jwt"
    }
}
