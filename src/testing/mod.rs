//! Fakes and fixtures shared by the unit tests

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::StatusCode;
use chrono::{DateTime, Utc};

use crate::bootstrap::{self, RouteHandlers};
use crate::broker::{
    AssumeRoleRequest, CredentialScope, Permission, RoleBroker, ScopeCatalog, ScopedCredential, TrustAuthority,
    TrustError,
};
use crate::dispatch::{Dispatcher, Handler, HandlerError, HandlerPayload, HandlerResponse};
use crate::identity::{
    CodeDelivery, CodeMessage, CodePurpose, DeliveryError, IdentityDirectory, IdentityError, Subject,
};
use crate::middleware::auth::Authorizer;
use crate::schema::Schema;

pub const TABLE: &str = "test-destinations";
pub const POOL: &str = "test-pool";
pub const VALID_TOKEN: &str = "valid-token";

fn scope(permission: Permission, target: &str, role: &str) -> Arc<CredentialScope> {
    Arc::new(CredentialScope {
        principal_role_id: role.to_string(),
        permission,
        target_resource_id: target.to_string(),
    })
}

pub fn read_scope() -> Arc<CredentialScope> {
    scope(Permission::Read, TABLE, "role/read")
}

pub fn write_scope() -> Arc<CredentialScope> {
    scope(Permission::Write, TABLE, "role/write")
}

pub fn destination_schema() -> Schema {
    bootstrap::destination_schema().expect("destination schema is well formed")
}

pub fn credential(permission: Permission, expires_at: DateTime<Utc>) -> ScopedCredential {
    ScopedCredential {
        access_key_id: "ASIATESTKEY000000001".to_string(),
        secret_access_key: "test-secret-access-key".to_string(),
        session_token: "test-session-token".to_string(),
        role_id: format!("role/{}", permission.to_string().to_lowercase()),
        session_name: "test_session".to_string(),
        permission,
        target_resource_id: TABLE.to_string(),
        expires_at,
    }
}

pub fn credential_for(permission: Permission, resource: &str) -> ScopedCredential {
    ScopedCredential {
        target_resource_id: resource.to_string(),
        ..credential(permission, Utc::now() + chrono::Duration::minutes(15))
    }
}

/// Handler that records every payload and answers with a scripted response
pub struct CountingHandler {
    pub count: AtomicUsize,
    payloads: Mutex<Vec<HandlerPayload>>,
    response: Mutex<Result<HandlerResponse, HandlerError>>,
    hanging: AtomicBool,
}

impl CountingHandler {
    pub fn ok() -> Self {
        Self {
            count: AtomicUsize::new(0),
            payloads: Mutex::new(Vec::new()),
            response: Mutex::new(Ok(HandlerResponse {
                status: StatusCode::OK,
                content_type: Some("application/json"),
                body: Bytes::from_static(b"[]"),
            })),
            hanging: AtomicBool::new(false),
        }
    }

    pub fn respond_with(&self, response: HandlerResponse) {
        *self.response.lock().unwrap() = Ok(response);
    }

    pub fn fail_with(&self, message: &str) {
        *self.response.lock().unwrap() = Err(HandlerError::Failed(message.to_string()));
    }

    pub fn hang(&self) {
        self.hanging.store(true, Ordering::SeqCst);
    }

    /// The scripted successful response
    pub fn response(&self) -> HandlerResponse {
        self.response.lock().unwrap().clone().unwrap()
    }

    pub fn last_payload(&self) -> Option<HandlerPayload> {
        self.payloads.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Handler for CountingHandler {
    async fn invoke(&self, payload: HandlerPayload) -> Result<HandlerResponse, HandlerError> {
        self.count.fetch_add(1, Ordering::SeqCst);
        self.payloads.lock().unwrap().push(payload);
        if self.hanging.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        self.response.lock().unwrap().clone()
    }
}

enum DirectoryMode {
    Users(HashMap<String, Subject>),
    Unavailable,
    Hanging,
}

/// Identity directory with a fixed token table
pub struct StaticDirectory {
    mode: DirectoryMode,
    calls: Arc<AtomicUsize>,
}

impl StaticDirectory {
    fn with_mode(mode: DirectoryMode) -> Self {
        Self {
            mode,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_user(token: &str, username: &str) -> Self {
        let subject = Subject {
            id: format!("sub-{}", username),
            username: username.to_string(),
        };
        Self::with_mode(DirectoryMode::Users(HashMap::from([(token.to_string(), subject)])))
    }

    pub fn unavailable() -> Self {
        Self::with_mode(DirectoryMode::Unavailable)
    }

    pub fn hanging() -> Self {
        Self::with_mode(DirectoryMode::Hanging)
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl IdentityDirectory for StaticDirectory {
    async fn verify(&self, token: &str) -> Result<Subject, IdentityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.mode {
            DirectoryMode::Users(users) => users
                .get(token)
                .cloned()
                .ok_or_else(|| IdentityError::Rejected("unknown token".to_string())),
            DirectoryMode::Unavailable => Err(IdentityError::Unavailable("directory offline".to_string())),
            DirectoryMode::Hanging => {
                std::future::pending::<()>().await;
                Err(IdentityError::Unavailable("unreachable".to_string()))
            }
        }
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

#[derive(Clone, Copy)]
enum AuthorityMode {
    Granting,
    Rejecting,
    Unavailable,
    Hanging,
    Escalating,
}

/// Trust authority that records each exchange and answers per its script
pub struct ScriptedAuthority {
    mode: AuthorityMode,
    requests: Mutex<Vec<AssumeRoleRequest>>,
}

impl ScriptedAuthority {
    fn with_mode(mode: AuthorityMode) -> Self {
        Self {
            mode,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn granting() -> Self {
        Self::with_mode(AuthorityMode::Granting)
    }

    pub fn rejecting() -> Self {
        Self::with_mode(AuthorityMode::Rejecting)
    }

    pub fn unavailable() -> Self {
        Self::with_mode(AuthorityMode::Unavailable)
    }

    pub fn hanging() -> Self {
        Self::with_mode(AuthorityMode::Hanging)
    }

    /// Hands out write credentials whatever was asked for
    pub fn escalating() -> Self {
        Self::with_mode(AuthorityMode::Escalating)
    }

    pub fn requests(&self) -> Vec<AssumeRoleRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl TrustAuthority for ScriptedAuthority {
    async fn assume_role(&self, request: AssumeRoleRequest) -> Result<ScopedCredential, TrustError> {
        self.requests.lock().unwrap().push(request.clone());
        let permission = match self.mode {
            AuthorityMode::Rejecting => return Err(TrustError::Rejected("scripted rejection".to_string())),
            AuthorityMode::Unavailable => return Err(TrustError::Unavailable("scripted outage".to_string())),
            AuthorityMode::Hanging => {
                std::future::pending::<()>().await;
                return Err(TrustError::Unavailable("unreachable".to_string()));
            }
            AuthorityMode::Escalating => Permission::Write,
            AuthorityMode::Granting => request.permission,
        };
        Ok(ScopedCredential {
            role_id: request.role_id,
            session_name: request.session_name,
            permission,
            target_resource_id: request.target_resource_id,
            ..credential_for(permission, TABLE)
        })
    }
}

/// Code delivery that keeps every message instead of sending it
#[derive(Default)]
pub struct RecordingDelivery {
    failing: bool,
    messages: Mutex<Vec<CodeMessage>>,
}

impl RecordingDelivery {
    /// Records each message, then reports the channel as down
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn messages(&self) -> Vec<CodeMessage> {
        self.messages.lock().unwrap().clone()
    }

    /// Most recent code of `purpose` sent to `username`
    pub fn last_code(&self, username: &str, purpose: CodePurpose) -> Option<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|m| m.username == username && m.purpose == purpose)
            .map(|m| m.code.clone())
    }
}

#[async_trait]
impl CodeDelivery for RecordingDelivery {
    async fn deliver(&self, message: CodeMessage) -> Result<(), DeliveryError> {
        self.messages.lock().unwrap().push(message);
        if self.failing {
            return Err(DeliveryError("scripted outage".to_string()));
        }
        Ok(())
    }
}

/// A dispatcher over the gateway's route table with counting handlers
pub struct Fixture {
    pub dispatcher: Dispatcher,
    pub list: Arc<CountingHandler>,
    pub create: Arc<CountingHandler>,
    pub delete: Arc<CountingHandler>,
    pub proxy: Arc<CountingHandler>,
    pub directory: Arc<StaticDirectory>,
    pub authority: Arc<ScriptedAuthority>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::build(StaticDirectory::with_user(VALID_TOKEN, "alice"), ScriptedAuthority::granting())
    }

    pub fn with_authority(authority: ScriptedAuthority) -> Self {
        Self::build(StaticDirectory::with_user(VALID_TOKEN, "alice"), authority)
    }

    pub fn with_directory(directory: StaticDirectory) -> Self {
        Self::build(directory, ScriptedAuthority::granting())
    }

    fn build(directory: StaticDirectory, authority: ScriptedAuthority) -> Self {
        let list = Arc::new(CountingHandler::ok());
        let create = Arc::new(CountingHandler::ok());
        let delete = Arc::new(CountingHandler::ok());
        let proxy = Arc::new(CountingHandler::ok());
        let directory = Arc::new(directory);
        let authority = Arc::new(authority);

        let mut catalog = ScopeCatalog::new();
        catalog.provision(Permission::Read, TABLE, "role/read").unwrap();
        catalog.provision(Permission::Write, TABLE, "role/write").unwrap();
        catalog.provision(Permission::Write, POOL, "role/pool").unwrap();

        let handlers = RouteHandlers {
            identity_proxy: proxy.clone(),
            list_destinations: list.clone(),
            create_destination: create.clone(),
            delete_destination: delete.clone(),
        };
        let tree = bootstrap::route_table(&catalog, POOL, TABLE, handlers).unwrap();

        let dispatcher = Dispatcher::new(
            tree,
            bootstrap::schemas().unwrap(),
            Authorizer::new(directory.clone(), Duration::from_millis(100)),
            RoleBroker::new(authority.clone(), Duration::from_millis(100), Duration::from_secs(900)),
            Duration::from_secs(1),
        );

        Self {
            dispatcher,
            list,
            create,
            delete,
            proxy,
            directory,
            authority,
        }
    }

    pub fn total_invocations(&self) -> usize {
        [&self.list, &self.create, &self.delete, &self.proxy]
            .iter()
            .map(|h| h.count.load(Ordering::SeqCst))
            .sum()
    }
}
