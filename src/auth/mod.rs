use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::IdentityConfig;

/// What a token may be used for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenUse {
    Id,
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(rename = "cognito:username")]
    pub username: String,
    pub token_use: TokenUse,
    pub iss: String,
    pub aud: String,
    pub exp: i64,
    pub iat: i64,
}

#[derive(Debug)]
pub enum TokenError {
    TokenGeneration(String),
    InvalidToken(String),
    InvalidSecret,
}

impl std::fmt::Display for TokenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenError::TokenGeneration(msg) => write!(f, "JWT generation error: {}", msg),
            TokenError::InvalidToken(msg) => write!(f, "Invalid JWT token: {}", msg),
            TokenError::InvalidSecret => write!(f, "Invalid JWT secret"),
        }
    }
}

impl std::error::Error for TokenError {}

/// Signs and checks the HS256 tokens of one user pool / client pair
#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    audience: String,
    expiry: Duration,
}

impl TokenIssuer {
    pub fn new(
        secret: &str,
        issuer: impl Into<String>,
        audience: impl Into<String>,
        expiry_secs: u64,
    ) -> Result<Self, TokenError> {
        if secret.is_empty() {
            return Err(TokenError::InvalidSecret);
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer: issuer.into(),
            audience: audience.into(),
            expiry: Duration::seconds(expiry_secs as i64),
        })
    }

    pub fn from_config(config: &IdentityConfig) -> Result<Self, TokenError> {
        Self::new(
            &config.token_secret,
            &config.user_pool_id,
            &config.client_id,
            config.token_expiry_secs,
        )
    }

    pub fn expires_in_secs(&self) -> i64 {
        self.expiry.num_seconds()
    }

    pub fn issue(&self, sub: &str, username: &str, token_use: TokenUse) -> Result<String, TokenError> {
        let now = Utc::now();
        // Refresh tokens outlive the id/access pair
        let lifetime = match token_use {
            TokenUse::Refresh => self.expiry * 24,
            _ => self.expiry,
        };
        let claims = Claims {
            sub: sub.to_string(),
            username: username.to_string(),
            token_use,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            exp: (now + lifetime).timestamp(),
            iat: now.timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| TokenError::TokenGeneration(e.to_string()))
    }

    /// Decode a token and check signature, expiry, issuer and audience
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::default();
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_audience(&[self.audience.as_str()]);

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| TokenError::InvalidToken(e.to_string()))
    }
}
