mod gemini;
mod session;

pub use gemini::{
    DEFAULT_GEMINI_BASE_URL, DEFAULT_GEMINI_MODEL, GeminiChat, GeminiClient, GeminiConfig,
    SYSTEM_INSTRUCTION,
};
pub use session::{BoxFuture, ChatSession, SessionError, SessionFactory, SessionResult};
