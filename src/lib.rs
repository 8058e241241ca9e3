//! Uslugo - Local Services Marketplace Backend
//!
//! Geospatial proximity search over registered professionals and a
//! compare-and-swap booking lifecycle, served over a REST API with a
//! WebSocket change feed.

pub mod api;
pub mod db;
pub mod error;
pub mod external;
pub mod geo;
pub mod lifecycle;
pub mod scheduler;
pub mod security;
pub mod services;
pub mod state;
pub mod websocket;

pub use error::{AppError, Result};
pub use state::AppState;
