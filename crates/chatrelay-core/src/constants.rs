/// ChatRelay centralized constants.
/// Defaults, endpoints and wire markers live here.

// ─── Models ───────────────────────────────────────────────────────────────────

pub mod models {
    pub const DEFAULT_GROQ_MODEL: &str = "llama-3.3-70b-versatile";
}

// ─── API Endpoints ────────────────────────────────────────────────────────────

pub mod endpoints {
    pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai";
    /// Appended to the base URL of any OpenAI-compatible provider.
    pub const CHAT_COMPLETIONS_PATH: &str = "/v1/chat/completions";
}

// ─── Default Settings ─────────────────────────────────────────────────────────

pub mod defaults {
    pub const PORT: u16 = 8080;
    pub const MAX_TOKENS: u32 = 1024;
    pub const HISTORY_WINDOW: usize = 20;
    pub const RATE_LIMIT_RPS: u32 = 10;
    pub const RATE_LIMIT_BURST: u32 = 20;
    pub const API_KEY_ENV: &str = "GROQ_API_KEY";
    pub const DEFAULT_MODEL: &str = super::models::DEFAULT_GROQ_MODEL;
}

// ─── Environment Variables ────────────────────────────────────────────────────

pub mod env {
    pub const CONFIG_PATH: &str = "CHATRELAY_CONFIG";
    pub const PORT: &str = "PORT";
    pub const API_KEY: &str = "API_KEY";
    pub const MODEL: &str = "MODEL";
    pub const MAX_TOKENS: &str = "MAX_TOKENS";
    pub const LLM_BASE_URL: &str = "LLM_BASE_URL";
    pub const HISTORY_WINDOW: &str = "HISTORY_WINDOW";
    pub const RATE_LIMIT_RPS: &str = "RATE_LIMIT_RPS";
    pub const RATE_LIMIT_BURST: &str = "RATE_LIMIT_BURST";
}

// ─── Server-Sent Events ───────────────────────────────────────────────────────

pub mod sse {
    pub const DATA_PREFIX: &str = "data: ";
    /// Terminal marker, both from the upstream provider and towards our callers.
    pub const DONE_MARKER: &str = "[DONE]";
}
