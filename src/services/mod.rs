//! Business logic services
//!
//! Called by the REST API handlers and schedulers. Services own
//! validation, snapshot assembly and change-event publication; the
//! database layer owns persistence and atomicity.

pub mod booking_service;
pub mod category_service;
pub mod chat_service;
pub mod job_service;
pub mod payment_service;
pub mod provider_service;
pub mod search_service;

pub use booking_service::BookingService;
pub use category_service::CategoryService;
pub use chat_service::ChatService;
pub use job_service::JobService;
pub use payment_service::PaymentService;
pub use provider_service::ProviderService;
pub use search_service::SearchService;
