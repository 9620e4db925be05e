//! HTTP boundary for ChatRelay: routes, SSE presentation, auth and rate limiting.

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod presenter;
pub mod rate_limit;
pub mod router;
pub mod state;

pub use error::ApiError;
pub use rate_limit::RateLimiter;
pub use router::{router, run_http};
pub use state::AppState;
