pub mod error;
pub mod llm;
pub mod context;
pub mod config;
pub mod constants;
pub mod service;

// Re-export key types
pub use error::RelayError;
pub use llm::{FragmentStream, ModelGateway, OpenAiGateway, Role, Turn};
pub use context::ConversationStore;
pub use config::Settings;
pub use service::{ConversationService, ReplyStream};
