use crate::constants::defaults;
use crate::llm::Turn;
use std::sync::{PoisonError, RwLock};

/// The single process-wide conversation.
///
/// The full record only ever grows; `context` trims to the most recent
/// `window` turns for the model. Each append is one write section and each
/// read one shared section, so readers never see a half-appended turn.
pub struct ConversationStore {
    turns: RwLock<Vec<Turn>>,
    window: usize,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self {
            turns: RwLock::new(Vec::new()),
            window: defaults::HISTORY_WINDOW,
        }
    }

    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window;
        self
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn append(&self, turn: Turn) {
        // A panic elsewhere cannot leave a half-pushed Vec, so a poisoned
        // lock still guards consistent data.
        let mut turns = self.turns.write().unwrap_or_else(PoisonError::into_inner);
        turns.push(turn);
    }

    /// Copy of the last `window` turns, oldest first.
    pub fn context(&self) -> Vec<Turn> {
        let turns = self.turns.read().unwrap_or_else(PoisonError::into_inner);
        let start = turns.len().saturating_sub(self.window);
        turns[start..].to_vec()
    }

    /// Copy of the whole record.
    pub fn all(&self) -> Vec<Turn> {
        let turns = self.turns.read().unwrap_or_else(PoisonError::into_inner);
        turns.clone()
    }

    pub fn len(&self) -> usize {
        self.turns
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new()
    }
}
