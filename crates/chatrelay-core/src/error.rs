use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("No user message found")]
    NoUserContent,

    #[error("Gateway unavailable: {0}")]
    GatewayUnavailable(String),

    #[error("Gateway rejected request (status {status}): {body}")]
    GatewayRejected { status: u16, body: String },

    #[error("Upstream stream interrupted: {0}")]
    UpstreamInterrupted(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RelayError {
    pub fn rejected(status: u16, body: impl Into<String>) -> Self {
        Self::GatewayRejected {
            status,
            body: body.into(),
        }
    }

    /// True for the failures that happen before any fragment exists, i.e. the
    /// ones that keep `ConversationService::process_message` from returning a stream.
    pub fn is_gateway_failure(&self) -> bool {
        matches!(
            self,
            Self::GatewayUnavailable(_) | Self::GatewayRejected { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;
