//! Live change feed
//!
//! Mutations publish `ChangeEvent`s to a broadcast hub; WebSocket clients
//! subscribe to collection topics and receive matching events as JSON.

pub mod handlers;
pub mod manager;

pub use handlers::serve_changes;
pub use manager::{ChangeEvent, ChangeHub};
