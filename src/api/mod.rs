//! REST API server module
//!
//! Axum server exposing the marketplace operations plus the `/ws` change
//! feed. Write endpoints authenticate with an `apikey` payload field;
//! token-bucket middleware keeps search and write load within configured
//! rates.

pub mod handlers;
mod rate_limiter;
mod server;
mod types;

pub use server::ApiServer;
pub use types::ApiResponse;
