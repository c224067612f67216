// handlers/mod.rs - Compute targets behind the gateway's routes
//
// Each handler receives a validated payload plus a credential scoped to the
// one resource it touches, and knows nothing about the dispatch pipeline.

pub mod auth;         // ANY /auth/* - identity exchange proxy
pub mod destinations; // GET/POST/DELETE /destinations

pub use auth::IdentityProxy;
pub use destinations::{CreateDestination, DeleteDestination, ListDestinations};
