#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{json, Value};

use travelmap_gateway::config::AppConfig;
use travelmap_gateway::identity::{CodeDelivery, CodeMessage, CodePurpose, DeliveryError};

pub const PASSWORD: &str = "correct horse battery";

/// Collects the codes the user pool sends out
#[derive(Default)]
pub struct Mailbox {
    messages: Mutex<Vec<CodeMessage>>,
}

impl Mailbox {
    pub fn code(&self, username: &str, purpose: CodePurpose) -> Option<String> {
        self.messages
            .lock()
            .ok()?
            .iter()
            .rev()
            .find(|m| m.username == username && m.purpose == purpose)
            .map(|m| m.code.clone())
    }
}

#[async_trait]
impl CodeDelivery for Mailbox {
    async fn deliver(&self, message: CodeMessage) -> Result<(), DeliveryError> {
        self.messages
            .lock()
            .map_err(|e| DeliveryError(e.to_string()))?
            .push(message);
        Ok(())
    }
}

/// A gateway serving on an ephemeral local port for the life of one test
pub struct TestServer {
    pub base_url: String,
    pub client: reqwest::Client,
    pub mailbox: Arc<Mailbox>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Latest code of `purpose` mailed to `username`
    pub fn code(&self, username: &str, purpose: CodePurpose) -> Result<String> {
        self.mailbox
            .code(username, purpose)
            .with_context(|| format!("no {} code mailed to {}", purpose, username))
    }
}

pub async fn spawn_server() -> Result<TestServer> {
    spawn_with(AppConfig::development()).await
}

pub async fn spawn_with(config: AppConfig) -> Result<TestServer> {
    let mailbox = Arc::new(Mailbox::default());
    let app = travelmap_gateway::api::app_with_delivery(&config, mailbox.clone())
        .context("failed to assemble gateway")?;

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .context("failed to bind test listener")?;
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            eprintln!("test server stopped: {}", e);
        }
    });

    Ok(TestServer {
        base_url: format!("http://{}", addr),
        client: reqwest::Client::new(),
        mailbox,
    })
}

/// Register `username` without confirming it
pub async fn register(server: &TestServer, username: &str) -> Result<()> {
    let res = server
        .client
        .post(server.url("/auth/create_user"))
        .json(&json!({
            "username": username,
            "password": PASSWORD,
            "email": format!("{}@example.com", username)
        }))
        .send()
        .await?;
    anyhow::ensure!(res.status() == StatusCode::NO_CONTENT, "create_user returned {}", res.status());
    Ok(())
}

/// Register `username`, confirm it with the mailed code and log in; returns
/// the login response body
pub async fn sign_up(server: &TestServer, username: &str) -> Result<Value> {
    register(server, username).await?;

    let code = server.code(username, CodePurpose::ConfirmSignUp)?;
    let res = server
        .client
        .post(server.url("/auth/verify_user"))
        .json(&json!({ "username": username, "confirmation_code": code }))
        .send()
        .await?;
    anyhow::ensure!(res.status() == StatusCode::NO_CONTENT, "verify_user returned {}", res.status());

    let res = server
        .client
        .post(server.url("/auth/login"))
        .json(&json!({ "username": username, "password": PASSWORD }))
        .send()
        .await?;
    anyhow::ensure!(res.status() == StatusCode::OK, "login returned {}", res.status());
    Ok(res.json::<Value>().await?)
}

/// Id token for a freshly registered user
pub async fn id_token(server: &TestServer, username: &str) -> Result<String> {
    let tokens = sign_up(server, username).await?;
    tokens["id_token"]
        .as_str()
        .map(str::to_string)
        .context("login response has no id_token")
}

pub fn paris() -> Value {
    json!({
        "place_id": "p1",
        "name": "Paris",
        "country": "France",
        "country_code": "FR",
        "latitude": 48.85,
        "longitude": 2.35
    })
}
