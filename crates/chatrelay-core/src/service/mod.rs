mod conversation;
mod reply;

pub use conversation::ConversationService;
pub use reply::ReplyStream;
