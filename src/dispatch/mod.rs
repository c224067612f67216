//! Per-request pipeline: resolve, authorize, validate, credential, invoke.

pub mod error;
pub mod invoke;

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use axum::body::Bytes;
use axum::http::Method;

use crate::broker::RoleBroker;
use crate::identity::Subject;
use crate::middleware::auth::Authorizer;
use crate::middleware::validate_request::RequestValidator;
use crate::routing::route::{Authorization, Route, RouteSummary};
use crate::routing::tree::{segments, ResourceTree};
use crate::schema::SchemaRegistry;

pub use error::{GatewayError, GrantFailure, Upstream};
pub use invoke::{Handler, HandlerError, HandlerPayload, HandlerResponse};

/// Inbound request as the gateway sees it, independent of the HTTP server
#[derive(Debug, Clone)]
pub struct GatewayRequest {
    pub method: Method,
    pub path: String,
    pub raw_query: String,
    pub authorization: Option<String>,
    pub body: Bytes,
}

impl GatewayRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            raw_query: String::new(),
            authorization: None,
            body: Bytes::new(),
        }
    }

    pub fn with_query(mut self, raw_query: impl Into<String>) -> Self {
        self.raw_query = raw_query.into();
        self
    }

    pub fn with_authorization(mut self, value: impl Into<String>) -> Self {
        self.authorization = Some(value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Decoded query parameters; the last value wins for repeated names
    pub fn query(&self) -> HashMap<String, String> {
        url::form_urlencoded::parse(self.raw_query.as_bytes())
            .into_owned()
            .collect()
    }
}

/// Where a request is in the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchStage {
    Received,
    Authorizing,
    Validating,
    Credentialing,
    Invoking,
    Responded,
    Failed,
}

impl fmt::Display for DispatchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DispatchStage::Received => "RECEIVED",
            DispatchStage::Authorizing => "AUTHORIZING",
            DispatchStage::Validating => "VALIDATING",
            DispatchStage::Credentialing => "CREDENTIALING",
            DispatchStage::Invoking => "INVOKING",
            DispatchStage::Responded => "RESPONDED",
            DispatchStage::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// State of one request; lives only as long as its dispatch call
pub struct RequestContext<'a> {
    pub identity: Option<Subject>,
    pub route: &'a Route,
    pub raw_query: &'a str,
    pub raw_body: &'a Bytes,
    stage: DispatchStage,
}

impl<'a> RequestContext<'a> {
    fn new(route: &'a Route, request: &'a GatewayRequest) -> Self {
        Self {
            identity: None,
            route,
            raw_query: &request.raw_query,
            raw_body: &request.body,
            stage: DispatchStage::Received,
        }
    }

    pub fn stage(&self) -> DispatchStage {
        self.stage
    }

    fn advance(&mut self, next: DispatchStage) {
        tracing::debug!("{}: {} -> {}", self.route, self.stage, next);
        self.stage = next;
    }

    fn fail(&mut self, err: GatewayError) -> GatewayError {
        tracing::info!("{}: {} -> FAILED ({})", self.route, self.stage, err);
        self.stage = DispatchStage::Failed;
        err
    }
}

/// Runs every request through Authorizer -> Validator -> Role Broker ->
/// Handler, stopping at the first failure. Everything it holds is read-only
/// after construction and shared across concurrent requests.
pub struct Dispatcher {
    tree: ResourceTree,
    schemas: SchemaRegistry,
    authorizer: Authorizer,
    broker: RoleBroker,
    handler_deadline: Duration,
}

impl Dispatcher {
    pub fn new(
        tree: ResourceTree,
        schemas: SchemaRegistry,
        authorizer: Authorizer,
        broker: RoleBroker,
        handler_deadline: Duration,
    ) -> Self {
        Self {
            tree,
            schemas,
            authorizer,
            broker,
            handler_deadline,
        }
    }

    pub fn routes(&self) -> Vec<RouteSummary> {
        self.tree.routes().into_iter().map(RouteSummary::from).collect()
    }

    pub async fn dispatch(&self, request: GatewayRequest) -> Result<HandlerResponse, GatewayError> {
        let path_segments = segments(&request.path);
        let resolution = self
            .tree
            .resolve(&path_segments, &request.method)
            .ok_or_else(|| {
                tracing::debug!("No route for {} {}", request.method, request.path);
                GatewayError::RouteNotFound {
                    method: request.method.to_string(),
                    path: request.path.clone(),
                }
            })?;
        let route = resolution.route;
        let mut ctx = RequestContext::new(route, &request);

        if route.authorization() == Authorization::IdentityRequired {
            ctx.advance(DispatchStage::Authorizing);
            match self.authorizer.authorize(request.authorization.as_deref()).await {
                Ok(subject) => ctx.identity = Some(subject),
                Err(err) => return Err(ctx.fail(err.into())),
            }
        }

        ctx.advance(DispatchStage::Validating);
        let query = request.query();
        let body = (!request.body.is_empty()).then_some(&request.body[..]);
        if let Err(err) = RequestValidator::new(&self.schemas).validate(route, &query, body) {
            return Err(ctx.fail(err.into()));
        }

        ctx.advance(DispatchStage::Credentialing);
        let credential = match self.broker.grant(route).await {
            Ok(credential) => credential,
            Err(err) => return Err(ctx.fail(err.into())),
        };

        ctx.advance(DispatchStage::Invoking);
        let payload = HandlerPayload {
            method: request.method.clone(),
            path: request.path.clone(),
            proxy_path: resolution.proxy_path,
            query,
            body: ctx.raw_body.clone(),
            subject: ctx.identity.clone(),
            credential,
        };

        let outcome = tokio::time::timeout(self.handler_deadline, route.handler().invoke(payload)).await;
        let response = match outcome {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => {
                tracing::error!("Handler for {} failed: {}", route, err);
                return Err(ctx.fail(GatewayError::HandlerFailure(err.to_string())));
            }
            Err(_) => {
                tracing::error!("Handler for {} exceeded its {:?} deadline", route, self.handler_deadline);
                return Err(ctx.fail(GatewayError::HandlerFailure(format!(
                    "handler did not finish within {:?}",
                    self.handler_deadline
                ))));
            }
        };

        ctx.advance(DispatchStage::Responded);
        tracing::info!("{} {} -> {}", request.method, request.path, response.status);
        Ok(response)
    }
}
