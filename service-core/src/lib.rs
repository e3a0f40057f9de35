//! service-core: Shared infrastructure for the escrow payment services.
//!
//! Error envelope, base configuration, request-id and metrics middleware,
//! tracing setup and HMAC signature helpers.
pub mod config;
pub mod error;
pub mod middleware;
pub mod observability;
pub mod utils;
