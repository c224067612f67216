use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub identity: IdentityConfig,
    pub storage: StorageConfig,
    pub broker: BrokerConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

/// Identity directory identifiers and token verification settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    pub user_pool_id: String,
    pub client_id: String,
    pub user_pool_access_role_id: String,
    #[serde(skip_serializing)]
    pub token_secret: String,
    /// When set, tokens are verified by this introspection endpoint instead of locally
    pub introspection_url: Option<String>,
    pub verify_timeout_ms: u64,
    pub token_expiry_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub table_name: String,
    pub read_role_id: String,
    pub write_role_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Principal the gateway presents when assuming roles
    pub principal_id: String,
    #[serde(skip_serializing)]
    pub signing_secret: String,
    pub exchange_timeout_ms: u64,
    pub credential_ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub port: u16,
    pub handler_deadline_secs: u64,
    pub enable_request_logging: bool,
    pub max_request_size_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
}

impl IdentityConfig {
    pub fn verify_timeout(&self) -> Duration {
        Duration::from_millis(self.verify_timeout_ms)
    }
}

impl BrokerConfig {
    pub fn exchange_timeout(&self) -> Duration {
        Duration::from_millis(self.exchange_timeout_ms)
    }

    pub fn credential_ttl(&self) -> Duration {
        Duration::from_secs(self.credential_ttl_secs)
    }
}

impl ApiConfig {
    pub fn handler_deadline(&self) -> Duration {
        Duration::from_secs(self.handler_deadline_secs)
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") | Ok("beta") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Identity directory
        if let Ok(v) = env::var("USER_POOL_ID") {
            self.identity.user_pool_id = v;
        }
        if let Ok(v) = env::var("CLIENT_ID") {
            self.identity.client_id = v;
        }
        if let Ok(v) = env::var("USER_POOL_ACCESS_ROLE_ARN") {
            self.identity.user_pool_access_role_id = v;
        }
        if let Ok(v) = env::var("IDENTITY_TOKEN_SECRET") {
            self.identity.token_secret = v;
        }
        if let Ok(v) = env::var("IDENTITY_INTROSPECTION_URL") {
            self.identity.introspection_url = Some(v).filter(|s| !s.trim().is_empty());
        }
        if let Ok(v) = env::var("IDENTITY_VERIFY_TIMEOUT_MS") {
            self.identity.verify_timeout_ms = v.parse().unwrap_or(self.identity.verify_timeout_ms);
        }
        if let Ok(v) = env::var("IDENTITY_TOKEN_EXPIRY_SECS") {
            self.identity.token_expiry_secs = v.parse().unwrap_or(self.identity.token_expiry_secs);
        }

        // Storage
        if let Ok(v) = env::var("DYNAMO_TABLE_NAME") {
            self.storage.table_name = v;
        }
        if let Ok(v) = env::var("DYNAMO_READ_ROLE_ARN") {
            self.storage.read_role_id = v;
        }
        if let Ok(v) = env::var("DYNAMO_WRITE_ROLE_ARN") {
            self.storage.write_role_id = v;
        }

        // Role broker
        if let Ok(v) = env::var("BROKER_PRINCIPAL_ID") {
            self.broker.principal_id = v;
        }
        if let Ok(v) = env::var("BROKER_SIGNING_SECRET") {
            self.broker.signing_secret = v;
        }
        if let Ok(v) = env::var("CREDENTIAL_EXCHANGE_TIMEOUT_MS") {
            self.broker.exchange_timeout_ms = v.parse().unwrap_or(self.broker.exchange_timeout_ms);
        }
        if let Ok(v) = env::var("CREDENTIAL_TTL_SECS") {
            self.broker.credential_ttl_secs = v.parse().unwrap_or(self.broker.credential_ttl_secs);
        }

        // API overrides
        if let Some(port) = env::var("GATEWAY_PORT")
            .ok()
            .or_else(|| env::var("PORT").ok())
            .and_then(|s| s.parse::<u16>().ok())
        {
            self.api.port = port;
        }
        if let Ok(v) = env::var("HANDLER_DEADLINE_SECS") {
            self.api.handler_deadline_secs = v.parse().unwrap_or(self.api.handler_deadline_secs);
        }
        if let Ok(v) = env::var("API_ENABLE_REQUEST_LOGGING") {
            self.api.enable_request_logging = v.parse().unwrap_or(self.api.enable_request_logging);
        }
        if let Ok(v) = env::var("API_MAX_REQUEST_SIZE_BYTES") {
            self.api.max_request_size_bytes = v.parse().unwrap_or(self.api.max_request_size_bytes);
        }

        // Security overrides
        if let Ok(v) = env::var("SECURITY_ENABLE_CORS") {
            self.security.enable_cors = v.parse().unwrap_or(self.security.enable_cors);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v.split(',').map(|s| s.trim().to_string()).collect();
        }

        self
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            identity: IdentityConfig {
                user_pool_id: "local-user-pool".to_string(),
                client_id: "local-client".to_string(),
                user_pool_access_role_id: "role/travelmap-user-pool-access".to_string(),
                token_secret: "development-identity-secret".to_string(),
                introspection_url: None,
                verify_timeout_ms: 3_000,
                token_expiry_secs: 60 * 60,
            },
            storage: StorageConfig {
                table_name: "travelmap-destinations".to_string(),
                read_role_id: "role/travelmap-table-read".to_string(),
                write_role_id: "role/travelmap-table-write".to_string(),
            },
            broker: BrokerConfig {
                principal_id: "travelmap-gateway".to_string(),
                signing_secret: "development-broker-secret".to_string(),
                exchange_timeout_ms: 3_000,
                credential_ttl_secs: 15 * 60,
            },
            api: ApiConfig {
                port: 3000,
                handler_deadline_secs: 30,
                enable_request_logging: true,
                max_request_size_bytes: 1024 * 1024, // 1MB
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
            },
        }
    }

    pub fn staging() -> Self {
        let mut config = Self::development();
        config.environment = Environment::Staging;
        config.identity.token_secret = String::new();
        config.broker.signing_secret = String::new();
        config.identity.verify_timeout_ms = 2_000;
        config.broker.exchange_timeout_ms = 2_000;
        config.security.cors_origins = vec!["https://beta.travelmap.example.com".to_string()];
        config
    }

    pub fn production() -> Self {
        let mut config = Self::staging();
        config.environment = Environment::Production;
        config.api.enable_request_logging = false;
        config.broker.credential_ttl_secs = 15 * 60;
        config.security.cors_origins = vec!["https://travelmap.example.com".to_string()];
        config
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}
