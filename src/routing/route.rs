use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use axum::http::Method;
use serde::Serialize;

use crate::broker::CredentialScope;
use crate::dispatch::invoke::Handler;
use crate::schema::SchemaId;

/// Verb a route is bound under. `Proxy` matches every method and every sub-path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verb {
    Get,
    Post,
    Delete,
    Proxy,
}

impl Verb {
    /// Specific verb for an HTTP method; `None` for methods only a proxy can serve
    pub fn from_method(method: &Method) -> Option<Self> {
        match *method {
            Method::GET => Some(Verb::Get),
            Method::POST => Some(Verb::Post),
            Method::DELETE => Some(Verb::Delete),
            _ => None,
        }
    }

    /// Verbs whose requests carry a body that can be schema-validated
    pub fn carries_body(self) -> bool {
        matches!(self, Verb::Post)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Verb::Get => "GET",
            Verb::Post => "POST",
            Verb::Delete => "DELETE",
            Verb::Proxy => "ANY",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Authorization {
    /// The target does its own checking (e.g. the identity exchange proxy)
    None,
    IdentityRequired,
}

/// Declarative input requirements checked before a handler runs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Validator {
    pub required_query_params: BTreeSet<String>,
    pub required_body_schema: Option<SchemaId>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn require_query(mut self, name: impl Into<String>) -> Self {
        self.required_query_params.insert(name.into());
        self
    }

    pub fn require_body(mut self, schema: impl Into<SchemaId>) -> Self {
        self.required_body_schema = Some(schema.into());
        self
    }
}

/// Identifier of a node in the resource tree arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) usize);

/// A handler bound under a verb at a resource, together with its credential scope
pub struct Route {
    pub(crate) resource: Option<NodeId>,
    pub(crate) path: String,
    verb: Verb,
    authorization: Authorization,
    validator: Option<Validator>,
    scope: Arc<CredentialScope>,
    handler: Arc<dyn Handler>,
}

impl Route {
    pub fn new(
        verb: Verb,
        authorization: Authorization,
        scope: Arc<CredentialScope>,
        handler: Arc<dyn Handler>,
    ) -> Self {
        Self {
            resource: None,
            path: String::new(),
            verb,
            authorization,
            validator: None,
            scope,
            handler,
        }
    }

    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn verb(&self) -> Verb {
        self.verb
    }

    pub fn authorization(&self) -> Authorization {
        self.authorization
    }

    pub fn validator(&self) -> Option<&Validator> {
        self.validator.as_ref()
    }

    pub fn scope(&self) -> &Arc<CredentialScope> {
        &self.scope
    }

    pub fn handler(&self) -> &Arc<dyn Handler> {
        &self.handler
    }

    /// Node the route is bound to; `None` until bound into a tree
    pub fn resource(&self) -> Option<NodeId> {
        self.resource
    }

    /// Bound path, e.g. `/destinations` or `/auth/*`
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("verb", &self.verb)
            .field("path", &self.path)
            .field("authorization", &self.authorization)
            .field("validator", &self.validator)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.verb, self.path)
    }
}

/// Summary of a bound route, as listed on the service root and by the CLI
#[derive(Debug, Clone, Serialize)]
pub struct RouteSummary {
    pub verb: Verb,
    pub path: String,
    pub authorization: Authorization,
    pub validator: Option<Validator>,
    pub permission: crate::broker::Permission,
    pub target_resource: String,
}

impl From<&Route> for RouteSummary {
    fn from(route: &Route) -> Self {
        Self {
            verb: route.verb,
            path: route.path.clone(),
            authorization: route.authorization,
            validator: route.validator.clone(),
            permission: route.scope.permission,
            target_resource: route.scope.target_resource_id.clone(),
        }
    }
}
