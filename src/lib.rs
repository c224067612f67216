pub mod api;
pub mod auth;
pub mod bootstrap;
pub mod broker;
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod identity;
pub mod middleware;
pub mod routing;
pub mod schema;
pub mod store;

#[cfg(test)]
pub mod testing;
