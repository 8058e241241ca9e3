//! REST API endpoint handlers
//!
//! Read endpoints degrade store failures to empty results; clients render
//! those as empty states rather than error dialogs. Booking transition
//! violations are the exception and surface as explicit 409 errors.

use crate::api::types::*;
use crate::db::sqlite::models::{Booking, Chat, Message, Provider, Proposal, Review, User};
use crate::error::{AppError, Result};
use crate::external::types::{CategorySuggestion, GeocodedAddress, OnboardingLink, SplitPayment};
use crate::security;
use crate::services::booking_service::CreateBookingRequest;
use crate::services::provider_service::RegisterProviderRequest as RegisterProvider;
use crate::services::job_service::PublishJobRequest;
use crate::services::search_service::{ProviderHit, SearchQuery};
use crate::services::{
    BookingService, CategoryService, ChatService, JobService, PaymentService, ProviderService,
    SearchService,
};
use crate::state::AppState;
use crate::websocket::serve_changes;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Json, Path, Query, State};
use axum::response::IntoResponse;
use serde::Deserialize;
use std::sync::Arc;
use tracing::warn;

/// Validate the `apikey` payload field against the hashed key table
fn authenticate(state: &AppState, apikey: &str) -> Result<()> {
    state
        .sqlite
        .validate_api_key_hash(&security::hash_api_key(apikey))
}

// ============================================================================
// Health check
// ============================================================================

/// GET /health
pub async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::<Empty>::success_with_message(
        "Uslugo API is running",
    ))
}

// ============================================================================
// Search and suggestions
// ============================================================================

/// POST /api/v1/search
///
/// A search that cannot reach the store comes back as zero hits; the
/// client shows "no professionals found" instead of an error banner.
pub async fn search(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<ApiResponse<Vec<ProviderHit>>>> {
    let query = SearchQuery {
        lat: req.lat,
        lng: req.lng,
        radius_m: req.radius_m,
        category: req.category,
    };
    match SearchService::search(&state, &query) {
        Ok(hits) => Ok(Json(ApiResponse::success(hits))),
        Err(AppError::StoreUnavailable(e)) => {
            warn!("Search degraded to empty result: {}", e);
            Ok(Json(ApiResponse::success(Vec::new())))
        }
        Err(e) => Err(e),
    }
}

/// POST /api/v1/geocode
pub async fn geocode(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GeocodeRequest>,
) -> Result<Json<ApiResponse<GeocodedAddress>>> {
    let geocoded = state.geocode_cached(&req.address).await?;
    Ok(Json(ApiResponse::success(geocoded)))
}

/// POST /api/v1/categorize
pub async fn categorize(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CategorizeRequest>,
) -> Result<Json<ApiResponse<CategorySuggestion>>> {
    let suggestion = CategoryService::suggest(&state, &req.description).await?;
    Ok(Json(ApiResponse::success(suggestion)))
}

// ============================================================================
// Users
// ============================================================================

/// POST /api/v1/users
pub async fn upsert_user(
    State(state): State<Arc<AppState>>,
    Json(req): Json<UpsertUserRequest>,
) -> Result<Json<ApiResponse<User>>> {
    authenticate(&state, &req.apikey)?;
    let user = state.sqlite.upsert_user(&req.id, &req.display_name, &req.role)?;
    Ok(Json(ApiResponse::success(user)))
}

// ============================================================================
// Providers
// ============================================================================

/// POST /api/v1/providers
pub async fn register_provider(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterProviderRequest>,
) -> Result<Json<ApiResponse<Provider>>> {
    authenticate(&state, &req.apikey)?;
    let provider = ProviderService::register(
        &state,
        &RegisterProvider {
            user_id: req.user_id,
            display_name: req.display_name,
            categories: req.categories,
            base_price: req.base_price,
            lat: req.lat,
            lng: req.lng,
            address: req.address,
        },
    )
    .await?;
    Ok(Json(ApiResponse::success(provider)))
}

/// GET /api/v1/providers
pub async fn list_providers(
    State(state): State<Arc<AppState>>,
) -> Json<ApiResponse<Vec<Provider>>> {
    let providers = state.sqlite.list_providers().unwrap_or_else(|e| {
        warn!("Provider listing degraded to empty result: {}", e);
        Vec::new()
    });
    Json(ApiResponse::success(providers))
}

/// GET /api/v1/providers/:id
pub async fn get_provider(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Provider>>> {
    Ok(Json(ApiResponse::success(ProviderService::get(&state, &id)?)))
}

/// POST /api/v1/providers/:id/location
pub async fn provider_location(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<ProviderLocationRequest>,
) -> Result<Json<ApiResponse<Provider>>> {
    authenticate(&state, &req.apikey)?;
    let provider =
        ProviderService::relocate(&state, &id, req.lat, req.lng, req.address.as_deref()).await?;
    Ok(Json(ApiResponse::success(provider)))
}

/// POST /api/v1/providers/:id/status
pub async fn provider_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<ProviderStatusRequest>,
) -> Result<Json<ApiResponse<Provider>>> {
    authenticate(&state, &req.apikey)?;
    let provider = ProviderService::set_status(&state, &id, req.online, req.busy)?;
    Ok(Json(ApiResponse::success(provider)))
}

/// GET /api/v1/providers/:id/reviews
pub async fn provider_reviews(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Json<ApiResponse<Vec<Review>>> {
    let reviews = ProviderService::reviews(&state, &id).unwrap_or_else(|e| {
        warn!("Review listing degraded to empty result: {}", e);
        Vec::new()
    });
    Json(ApiResponse::success(reviews))
}

// ============================================================================
// Bookings
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ActorQuery {
    pub actor_id: String,
}

/// POST /api/v1/bookings
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateBookingApiRequest>,
) -> Result<Json<ApiResponse<Booking>>> {
    authenticate(&state, &req.apikey)?;
    let booking = BookingService::create(
        &state,
        &CreateBookingRequest {
            source: req.source,
            client_id: req.client_id,
            host_id: req.host_id,
            category: req.category,
            description: req.description,
            total_amount: req.total_amount,
            service_lat: req.service_lat,
            service_lng: req.service_lng,
            service_address: req.service_address,
        },
    )?;
    Ok(Json(ApiResponse::success(booking)))
}

/// GET /api/v1/bookings?actor_id=...
pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ActorQuery>,
) -> Json<ApiResponse<Vec<Booking>>> {
    let bookings = BookingService::list_for_actor(&state, &query.actor_id).unwrap_or_else(|e| {
        warn!("Booking listing degraded to empty result: {}", e);
        Vec::new()
    });
    Json(ApiResponse::success(bookings))
}

/// GET /api/v1/bookings/:id
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Booking>>> {
    Ok(Json(ApiResponse::success(BookingService::get(&state, &id)?)))
}

/// POST /api/v1/bookings/:id/transition
///
/// Invalid transitions are surfaced explicitly (409), never degraded.
pub async fn transition_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<TransitionRequest>,
) -> Result<Json<ApiResponse<Booking>>> {
    authenticate(&state, &req.apikey)?;
    let booking = BookingService::transition(
        &state,
        &id,
        req.action,
        req.actor,
        req.actor_id.as_deref(),
    )?;
    Ok(Json(ApiResponse::success(booking)))
}

/// POST /api/v1/bookings/:id/review
pub async fn review_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<ReviewRequest>,
) -> Result<Json<ApiResponse<Review>>> {
    authenticate(&state, &req.apikey)?;
    let review =
        BookingService::submit_review(&state, &id, &req.client_id, req.rating, &req.comment)?;
    Ok(Json(ApiResponse::success(review)))
}

// ============================================================================
// Marketplace jobs
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CategoryQuery {
    pub category: Option<String>,
}

/// POST /api/v1/jobs
pub async fn publish_job(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PublishJobApiRequest>,
) -> Result<Json<ApiResponse<Booking>>> {
    authenticate(&state, &req.apikey)?;
    let booking = JobService::publish(
        &state,
        &PublishJobRequest {
            client_id: req.client_id,
            description: req.description,
            category: req.category,
            service_lat: req.service_lat,
            service_lng: req.service_lng,
            service_address: req.service_address,
        },
    )
    .await?;
    Ok(Json(ApiResponse::success(booking)))
}

/// GET /api/v1/jobs?category=...
pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CategoryQuery>,
) -> Json<ApiResponse<Vec<Booking>>> {
    let jobs = JobService::list_open(&state, query.category.as_deref()).unwrap_or_else(|e| {
        warn!("Job listing degraded to empty result: {}", e);
        Vec::new()
    });
    Json(ApiResponse::success(jobs))
}

/// POST /api/v1/jobs/:id/proposals
pub async fn create_proposal(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<ProposalRequest>,
) -> Result<Json<ApiResponse<Proposal>>> {
    authenticate(&state, &req.apikey)?;
    let proposal = JobService::propose(&state, &id, &req.host_id, req.price, &req.message)?;
    Ok(Json(ApiResponse::success(proposal)))
}

/// GET /api/v1/jobs/:id/proposals
pub async fn list_proposals(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Json<ApiResponse<Vec<Proposal>>> {
    let proposals = JobService::list_proposals(&state, &id).unwrap_or_else(|e| {
        warn!("Proposal listing degraded to empty result: {}", e);
        Vec::new()
    });
    Json(ApiResponse::success(proposals))
}

/// POST /api/v1/jobs/:id/accept
pub async fn accept_proposal(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<AcceptProposalRequest>,
) -> Result<Json<ApiResponse<Booking>>> {
    authenticate(&state, &req.apikey)?;
    let booking = JobService::accept_proposal(&state, &id, &req.proposal_id, &req.client_id)?;
    Ok(Json(ApiResponse::success(booking)))
}

// ============================================================================
// Chats
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

/// POST /api/v1/chats
pub async fn open_chat(
    State(state): State<Arc<AppState>>,
    Json(req): Json<OpenChatRequest>,
) -> Result<Json<ApiResponse<Chat>>> {
    authenticate(&state, &req.apikey)?;
    let chat = ChatService::open(
        &state,
        req.booking_id.as_deref(),
        &req.client_id,
        &req.host_id,
    )?;
    Ok(Json(ApiResponse::success(chat)))
}

/// GET /api/v1/chats?user_id=...
pub async fn list_chats(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UserQuery>,
) -> Json<ApiResponse<Vec<Chat>>> {
    let chats = ChatService::list_for_user(&state, &query.user_id).unwrap_or_else(|e| {
        warn!("Chat listing degraded to empty result: {}", e);
        Vec::new()
    });
    Json(ApiResponse::success(chats))
}

/// GET /api/v1/chats/:id/messages?limit=...
pub async fn list_messages(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<LimitQuery>,
) -> Json<ApiResponse<Vec<Message>>> {
    let messages = ChatService::messages(&state, &id, query.limit.unwrap_or(100))
        .unwrap_or_else(|e| {
            warn!("Message listing degraded to empty result: {}", e);
            Vec::new()
        });
    Json(ApiResponse::success(messages))
}

/// POST /api/v1/chats/:id/messages
pub async fn send_message(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<SendMessageRequest>,
) -> Result<Json<ApiResponse<Message>>> {
    authenticate(&state, &req.apikey)?;
    let message = ChatService::send(&state, &id, &req.sender_id, &req.body)?;
    Ok(Json(ApiResponse::success(message)))
}

// ============================================================================
// Payments
// ============================================================================

/// POST /api/v1/payments/intent
pub async fn payment_intent(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PaymentIntentRequest>,
) -> Result<Json<ApiResponse<SplitPayment>>> {
    authenticate(&state, &req.apikey)?;
    let split = PaymentService::start_payment(&state, &req.booking_id).await?;
    Ok(Json(ApiResponse::success(split)))
}

/// POST /api/v1/payments/confirm
pub async fn payment_confirm(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PaymentConfirmRequest>,
) -> Result<Json<ApiResponse<Booking>>> {
    authenticate(&state, &req.apikey)?;
    let booking = PaymentService::confirm_payment(&state, &req.booking_id)?;
    Ok(Json(ApiResponse::success(booking)))
}

/// POST /api/v1/payments/onboarding
pub async fn payment_onboarding(
    State(state): State<Arc<AppState>>,
    Json(req): Json<OnboardingRequest>,
) -> Result<Json<ApiResponse<OnboardingLink>>> {
    authenticate(&state, &req.apikey)?;
    let link = PaymentService::onboarding_link(&state, &req.host_id, &req.return_url).await?;
    Ok(Json(ApiResponse::success(link)))
}

// ============================================================================
// API keys
// ============================================================================

/// POST /api/v1/apikeys
pub async fn create_api_key(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ApiKeyRequest>,
) -> Result<Json<ApiResponse<CreatedApiKey>>> {
    authenticate(&state, &req.apikey)?;
    let key = security::generate_api_key();
    state
        .sqlite
        .create_api_key(&req.name, &security::hash_api_key(&key))?;
    Ok(Json(ApiResponse::success(CreatedApiKey {
        name: req.name,
        key,
    })))
}

/// POST /api/v1/apikeys/revoke
pub async fn revoke_api_key(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ApiKeyRequest>,
) -> Result<Json<ApiResponse<Empty>>> {
    authenticate(&state, &req.apikey)?;
    if !state.sqlite.revoke_api_key(&req.name)? {
        return Err(AppError::NotFound(format!("api key {}", req.name)));
    }
    Ok(Json(ApiResponse::success_with_message("Key revoked")))
}

// ============================================================================
// Settings
// ============================================================================

/// GET /api/v1/settings
pub async fn get_settings(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<crate::db::sqlite::models::Settings>>> {
    Ok(Json(ApiResponse::success(state.sqlite.get_settings()?)))
}

/// POST /api/v1/settings
///
/// Host/port changes take effect on the next server start.
pub async fn update_settings(
    State(state): State<Arc<AppState>>,
    Json(req): Json<UpdateSettingsRequest>,
) -> Result<Json<ApiResponse<crate::db::sqlite::models::Settings>>> {
    authenticate(&state, &req.apikey)?;
    let settings = state.sqlite.update_settings(
        req.host,
        req.port,
        req.platform_fee_percent,
        req.default_radius_m,
        req.max_radius_m,
        req.validity_days,
    )?;
    Ok(Json(ApiResponse::success(settings)))
}

// ============================================================================
// Change feed
// ============================================================================

/// GET /ws
pub async fn change_feed(
    State(state): State<Arc<AppState>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let hub = state.hub.clone();
    ws.on_upgrade(move |socket| serve_changes(socket, hub))
}
