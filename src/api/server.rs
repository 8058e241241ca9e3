//! HTTP server for the marketplace REST API
//!
//! Binds from settings, serves until the owned stop signal fires.
//! Middleware order: rate limiting, CORS, request tracing.

use crate::api::handlers;
use crate::api::rate_limiter::{rate_limit_middleware, RateLimiterState};
use crate::error::{AppError, Result};
use crate::state::AppState;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::oneshot;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// REST API server manager
pub struct ApiServer {
    state: Arc<AppState>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl ApiServer {
    pub fn new(state: Arc<AppState>) -> Self {
        Self {
            state,
            shutdown_tx: None,
        }
    }

    /// Start the server on the configured host and port
    pub async fn start(&mut self) -> Result<SocketAddr> {
        let settings = self.state.sqlite.get_settings()?;
        let addr: SocketAddr = format!("{}:{}", settings.host, settings.port)
            .parse()
            .map_err(|e| AppError::Config(format!("Invalid listen address: {}", e)))?;

        info!(
            "Rate limits: API={}/s, Search={}/s, Write={}/s",
            settings.api_rate_limit, settings.search_rate_limit, settings.write_rate_limit
        );
        let rate_limiter = Arc::new(RateLimiterState::new(
            settings.api_rate_limit,
            settings.search_rate_limit,
            settings.write_rate_limit,
        ));

        // Allow all origins for local development
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        let app = Router::new()
            // Health check
            .route("/health", get(handlers::health_check))
            .route("/", get(handlers::health_check))
            // Change feed
            .route("/ws", get(handlers::change_feed))
            // Search and suggestions
            .route("/api/v1/search", post(handlers::search))
            .route("/api/v1/geocode", post(handlers::geocode))
            .route("/api/v1/categorize", post(handlers::categorize))
            // Users
            .route("/api/v1/users", post(handlers::upsert_user))
            // Providers
            .route(
                "/api/v1/providers",
                get(handlers::list_providers).post(handlers::register_provider),
            )
            .route("/api/v1/providers/:id", get(handlers::get_provider))
            .route("/api/v1/providers/:id/location", post(handlers::provider_location))
            .route("/api/v1/providers/:id/status", post(handlers::provider_status))
            .route("/api/v1/providers/:id/reviews", get(handlers::provider_reviews))
            // Bookings
            .route(
                "/api/v1/bookings",
                get(handlers::list_bookings).post(handlers::create_booking),
            )
            .route("/api/v1/bookings/:id", get(handlers::get_booking))
            .route("/api/v1/bookings/:id/transition", post(handlers::transition_booking))
            .route("/api/v1/bookings/:id/review", post(handlers::review_booking))
            // Marketplace jobs
            .route(
                "/api/v1/jobs",
                get(handlers::list_jobs).post(handlers::publish_job),
            )
            .route(
                "/api/v1/jobs/:id/proposals",
                get(handlers::list_proposals).post(handlers::create_proposal),
            )
            .route("/api/v1/jobs/:id/accept", post(handlers::accept_proposal))
            // Chats
            .route(
                "/api/v1/chats",
                get(handlers::list_chats).post(handlers::open_chat),
            )
            .route(
                "/api/v1/chats/:id/messages",
                get(handlers::list_messages).post(handlers::send_message),
            )
            // API keys
            .route("/api/v1/apikeys", post(handlers::create_api_key))
            .route("/api/v1/apikeys/revoke", post(handlers::revoke_api_key))
            // Settings
            .route(
                "/api/v1/settings",
                get(handlers::get_settings).post(handlers::update_settings),
            )
            // Payments
            .route("/api/v1/payments/intent", post(handlers::payment_intent))
            .route("/api/v1/payments/confirm", post(handlers::payment_confirm))
            .route("/api/v1/payments/onboarding", post(handlers::payment_onboarding))
            .with_state(self.state.clone())
            .layer(middleware::from_fn_with_state(
                rate_limiter,
                rate_limit_middleware,
            ))
            .layer(cors)
            .layer(TraceLayer::new_for_http());

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        self.shutdown_tx = Some(shutdown_tx);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| AppError::Config(format!("Failed to bind {}: {}", addr, e)))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| AppError::Config(format!("Failed to read bound address: {}", e)))?;

        info!("Starting Uslugo API server on {}", local_addr);

        tokio::spawn(async move {
            let server = axum::serve(listener, app).with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                info!("API server shutting down");
            });

            if let Err(e) = server.await {
                error!("API server error: {}", e);
            }
        });

        Ok(local_addr)
    }

    /// Stop the server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
            info!("API server stop signal sent");
        }
    }

    /// Check if server is running
    pub fn is_running(&self) -> bool {
        self.shutdown_tx.is_some()
    }
}

impl Drop for ApiServer {
    fn drop(&mut self) {
        self.stop();
    }
}
