//! Builds the gateway's fixed route graph and collaborators from configuration.
//! Everything assembled here is read-only once `build_gateway` returns.

use std::sync::Arc;

use thiserror::Error;

use crate::auth::{TokenError, TokenIssuer};
use crate::broker::{LocalTrustAuthority, Permission, RoleBroker, ScopeCatalog, ScopeError};
use crate::config::AppConfig;
use crate::dispatch::{Dispatcher, Handler};
use crate::handlers::{CreateDestination, DeleteDestination, IdentityProxy, ListDestinations};
use crate::identity::{
    CodeDelivery, IdentityDirectory, IntrospectionDirectory, JwtIdentityDirectory, LogDelivery, UserPool,
};
use crate::middleware::auth::Authorizer;
use crate::routing::{Authorization, ResourceTree, Route, RouteError, Validator, Verb};
use crate::schema::{FieldType, Schema, SchemaError, SchemaRegistry};
use crate::store::Table;

pub const DESTINATION_SCHEMA: &str = "destination";

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("credential scope error: {0}")]
    Scope(#[from] ScopeError),

    #[error("route error: {0}")]
    Route(#[from] RouteError),

    #[error("token issuer error: {0}")]
    Token(#[from] TokenError),
}

pub fn destination_schema() -> Result<Schema, SchemaError> {
    Schema::new(
        DESTINATION_SCHEMA,
        ["place_id", "name", "country", "country_code", "latitude", "longitude"],
        [
            ("place_id", FieldType::String),
            ("name", FieldType::String),
            ("country", FieldType::String),
            ("country_code", FieldType::String),
            ("latitude", FieldType::Number),
            ("longitude", FieldType::Number),
        ],
    )
}

pub fn schemas() -> Result<SchemaRegistry, SchemaError> {
    let mut registry = SchemaRegistry::new();
    registry.register(destination_schema()?)?;
    Ok(registry)
}

/// One scope per (permission, resource) the routes need
pub fn provision_scopes(config: &AppConfig) -> Result<ScopeCatalog, ScopeError> {
    let mut catalog = ScopeCatalog::new();
    catalog.provision(Permission::Read, &config.storage.table_name, &config.storage.read_role_id)?;
    catalog.provision(Permission::Write, &config.storage.table_name, &config.storage.write_role_id)?;
    catalog.provision(
        Permission::Write,
        &config.identity.user_pool_id,
        &config.identity.user_pool_access_role_id,
    )?;
    Ok(catalog)
}

/// Compute targets for each bound route
pub struct RouteHandlers {
    pub identity_proxy: Arc<dyn Handler>,
    pub list_destinations: Arc<dyn Handler>,
    pub create_destination: Arc<dyn Handler>,
    pub delete_destination: Arc<dyn Handler>,
}

/// The gateway's route table:
///
/// | Verb   | Path          | Auth     | Validation            |
/// |--------|---------------|----------|-----------------------|
/// | ANY    | /auth/*       | none     | none                  |
/// | GET    | /destinations | identity | query `user`          |
/// | POST   | /destinations | identity | body `destination`    |
/// | DELETE | /destinations | identity | query `place_id`      |
pub fn route_table(
    catalog: &ScopeCatalog,
    pool_id: &str,
    table_name: &str,
    handlers: RouteHandlers,
) -> Result<ResourceTree, BootstrapError> {
    let mut tree = ResourceTree::new();

    tree.bind(
        &["auth"],
        Route::new(
            Verb::Proxy,
            Authorization::None,
            catalog.scope_for(Verb::Proxy, pool_id)?,
            handlers.identity_proxy,
        ),
    )?;

    tree.bind(
        &["destinations"],
        Route::new(
            Verb::Get,
            Authorization::IdentityRequired,
            catalog.scope_for(Verb::Get, table_name)?,
            handlers.list_destinations,
        )
        .with_validator(Validator::new().require_query("user")),
    )?;

    tree.bind(
        &["destinations"],
        Route::new(
            Verb::Post,
            Authorization::IdentityRequired,
            catalog.scope_for(Verb::Post, table_name)?,
            handlers.create_destination,
        )
        .with_validator(Validator::new().require_body(DESTINATION_SCHEMA)),
    )?;

    tree.bind(
        &["destinations"],
        Route::new(
            Verb::Delete,
            Authorization::IdentityRequired,
            catalog.scope_for(Verb::Delete, table_name)?,
            handlers.delete_destination,
        )
        .with_validator(Validator::new().require_query("place_id")),
    )?;

    Ok(tree)
}

/// A fully wired gateway plus the stores behind its handlers
pub struct Gateway {
    pub dispatcher: Arc<Dispatcher>,
    pub table: Arc<Table>,
    pub pool: Arc<UserPool>,
}

pub fn build_gateway(config: &AppConfig) -> Result<Gateway, BootstrapError> {
    build_gateway_with_delivery(config, Arc::new(LogDelivery))
}

/// Same as [`build_gateway`], sending user pool codes through `delivery`
pub fn build_gateway_with_delivery(
    config: &AppConfig,
    delivery: Arc<dyn CodeDelivery>,
) -> Result<Gateway, BootstrapError> {
    let tokens = TokenIssuer::from_config(&config.identity)?;
    let table = Arc::new(Table::new(&config.storage.table_name));
    let pool = Arc::new(UserPool::new(&config.identity.user_pool_id, tokens.clone(), delivery));

    let directory: Arc<dyn IdentityDirectory> = match &config.identity.introspection_url {
        Some(url) => {
            tracing::info!("Verifying identity tokens via introspection at {}", url);
            Arc::new(IntrospectionDirectory::new(url, &config.identity.client_id))
        }
        None => Arc::new(JwtIdentityDirectory::new(tokens)),
    };

    if config.broker.signing_secret.is_empty() {
        tracing::warn!("No credential signing secret configured; every credential exchange will fail");
    }
    let authority = LocalTrustAuthority::new(&config.broker.principal_id, config.broker.signing_secret.as_bytes())
        .trust(&config.storage.read_role_id)
        .trust(&config.storage.write_role_id)
        .trust(&config.identity.user_pool_access_role_id);

    let catalog = provision_scopes(config)?;
    let handlers = RouteHandlers {
        identity_proxy: Arc::new(IdentityProxy::new(pool.clone())),
        list_destinations: Arc::new(ListDestinations::new(table.clone())),
        create_destination: Arc::new(CreateDestination::new(table.clone())),
        delete_destination: Arc::new(DeleteDestination::new(table.clone())),
    };
    let tree = route_table(&catalog, &config.identity.user_pool_id, &config.storage.table_name, handlers)?;

    let dispatcher = Dispatcher::new(
        tree,
        schemas()?,
        Authorizer::new(directory, config.identity.verify_timeout()),
        RoleBroker::new(
            Arc::new(authority),
            config.broker.exchange_timeout(),
            config.broker.credential_ttl(),
        ),
        config.api.handler_deadline(),
    );

    for route in dispatcher.routes() {
        tracing::info!(
            "Route {} {} -> {} on '{}'",
            route.verb,
            route.path,
            route.permission,
            route.target_resource
        );
    }

    Ok(Gateway {
        dispatcher: Arc::new(dispatcher),
        table,
        pool,
    })
}
