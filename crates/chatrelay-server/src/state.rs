use crate::rate_limit::RateLimiter;
use chatrelay_core::{ConversationService, Settings};
use std::sync::Arc;

/// Everything the handlers and middleware share. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ConversationService>,
    /// Shared secret; `None` leaves the routes open.
    pub api_key: Option<Arc<str>>,
    pub limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(service: ConversationService, settings: &Settings) -> Self {
        let api_key = settings
            .auth_enabled()
            .then(|| Arc::from(settings.server.api_key.as_str()));
        Self {
            service: Arc::new(service),
            api_key,
            limiter: Arc::new(RateLimiter::new(
                settings.rate_limit.rps,
                settings.rate_limit.burst,
            )),
        }
    }
}
