//! HTTP surface: service endpoints plus a fallback that hands every other
//! request to the dispatcher.

use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    extract::{DefaultBodyLimit, State},
    http::{header, HeaderMap, HeaderValue, Method, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::bootstrap::{build_gateway, build_gateway_with_delivery, BootstrapError};
use crate::config::{AppConfig, Environment, SecurityConfig};
use crate::dispatch::{Dispatcher, GatewayRequest, HandlerResponse};
use crate::error::ApiError;
use crate::identity::CodeDelivery;
use crate::middleware::{authorization_header, ApiResponse, ApiResult};

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub environment: Environment,
}

/// Build the gateway for `config` and wrap it in a router
pub fn app(config: &AppConfig) -> Result<Router, BootstrapError> {
    let gateway = build_gateway(config)?;
    Ok(router(gateway.dispatcher, config))
}

/// [`app`] with user pool codes sent through `delivery`
pub fn app_with_delivery(config: &AppConfig, delivery: Arc<dyn CodeDelivery>) -> Result<Router, BootstrapError> {
    let gateway = build_gateway_with_delivery(config, delivery)?;
    Ok(router(gateway.dispatcher, config))
}

pub fn router(dispatcher: Arc<Dispatcher>, config: &AppConfig) -> Router {
    let state = AppState {
        dispatcher,
        environment: config.environment,
    };

    let router = Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .fallback(gateway)
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(cors_layer(&config.security))
                .layer(DefaultBodyLimit::max(config.api.max_request_size_bytes)),
        );

    if config.api.enable_request_logging {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    if !security.enable_cors {
        return CorsLayer::new();
    }
    if security.cors_origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any)
}

async fn root(State(state): State<AppState>) -> ApiResult<Value> {
    Ok(ApiResponse::success(json!({
        "name": "travelmap-gateway",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Authenticated API gateway for travel map destinations",
        "environment": state.environment,
        "routes": state.dispatcher.routes(),
    })))
}

async fn health() -> ApiResult<Value> {
    Ok(ApiResponse::success(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now(),
    })))
}

/// Adapt any request outside the service endpoints into a dispatch
async fn gateway(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    // An unreadable header counts as no token; protected routes then reject it
    let authorization = authorization_header(&headers).unwrap_or_else(|e| {
        tracing::warn!("{} {}: {}", method, uri.path(), e);
        None
    });

    let mut request = GatewayRequest::new(method, uri.path()).with_body(body);
    if let Some(query) = uri.query() {
        request = request.with_query(query);
    }
    if let Some(value) = authorization {
        request = request.with_authorization(value);
    }

    let response = state.dispatcher.dispatch(request).await?;
    Ok(into_http(response))
}

fn into_http(response: HandlerResponse) -> Response {
    let mut http = Body::from(response.body).into_response();
    *http.status_mut() = response.status;
    if let Some(content_type) = response.content_type {
        http.headers_mut()
            .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    }
    http
}
