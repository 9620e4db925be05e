mod history;

pub use history::ConversationStore;
