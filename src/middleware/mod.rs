pub mod auth;
pub mod response;
pub mod validate_request;

pub use auth::{authorization_header, bearer_token, AuthError, Authorizer};
pub use response::{ApiResponse, ApiResult};
pub use validate_request::{RequestValidator, ValidationError};
