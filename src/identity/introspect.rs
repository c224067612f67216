use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{IdentityDirectory, IdentityError, Subject};

#[derive(Debug, Deserialize)]
struct IntrospectionResponse {
    active: bool,
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    username: Option<String>,
}

/// Delegates verification to a remote introspection endpoint
/// (`POST {token, client_id}` answered with `{active, sub, username}`).
pub struct IntrospectionDirectory {
    client: reqwest::Client,
    url: String,
    client_id: String,
}

impl IntrospectionDirectory {
    pub fn new(url: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            client_id: client_id.into(),
        }
    }
}

#[async_trait]
impl IdentityDirectory for IntrospectionDirectory {
    async fn verify(&self, token: &str) -> Result<Subject, IdentityError> {
        let response = self
            .client
            .post(&self.url)
            .json(&json!({ "token": token, "client_id": self.client_id }))
            .send()
            .await
            .map_err(|e| IdentityError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(IdentityError::Unavailable(format!("introspection returned {}", status)));
        }
        if !status.is_success() {
            return Err(IdentityError::Rejected(format!("introspection returned {}", status)));
        }

        let body: IntrospectionResponse = response
            .json()
            .await
            .map_err(|e| IdentityError::Unavailable(format!("unreadable introspection response: {}", e)))?;

        if !body.active {
            return Err(IdentityError::Rejected("token is not active".to_string()));
        }

        let id = body
            .sub
            .ok_or_else(|| IdentityError::Rejected("introspection response has no subject".to_string()))?;
        let username = body.username.unwrap_or_else(|| id.clone());

        Ok(Subject { id, username })
    }

    fn name(&self) -> &'static str {
        "introspection"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unreachable_endpoint_is_unavailable_not_rejected() {
        // Port 9 (discard) on localhost is not expected to run an HTTP server
        let directory = IntrospectionDirectory::new("http://127.0.0.1:9/introspect", "client");
        let err = directory.verify("token").await.unwrap_err();
        assert!(matches!(err, IdentityError::Unavailable(_)));
    }

    #[test]
    fn parses_inactive_responses_without_subject() {
        let body: IntrospectionResponse = serde_json::from_str(r#"{"active": false}"#).unwrap();
        assert!(!body.active);
        assert!(body.sub.is_none());
    }
}
