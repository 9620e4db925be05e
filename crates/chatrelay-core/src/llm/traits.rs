use crate::error::RelayError;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// One role-tagged utterance. Never mutated after construction; the store hands
/// out clones.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Live fragment sequence produced by a gateway, in generation order.
///
/// The stream ending means normal completion. An `Err` item means the upstream
/// broke mid-reply; consumers treat it as the end of the sequence.
pub type FragmentStream = BoxStream<'static, Result<String, RelayError>>;

/// The model capability the relay depends on.
///
/// Implementations must not retry on their own. A failure to start the call is
/// returned as `Err` before any fragment exists.
#[async_trait::async_trait]
pub trait ModelGateway: Send + Sync {
    async fn stream(&self, context: &[Turn]) -> Result<FragmentStream, RelayError>;
}
