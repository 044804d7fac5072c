//! OAuth 1.0a service-provider core and pluggable authentication handlers.

pub mod endpoints;
pub mod handler;
pub mod http;
pub mod memory;
pub mod rate_limiter;
pub mod request;
pub mod server;
pub mod signature;
pub mod store;
pub mod types;
