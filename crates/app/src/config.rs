use std::path::PathBuf;

use salus_i18n::Lang;
use salus_llm::{GeminiConfig, SessionResult};
use salus_storage::DEFAULT_HISTORY_RELATIVE_PATH;

/// Startup configuration resolved once from the process environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub gemini: GeminiConfig,
    pub history_path: PathBuf,
    pub lang: Lang,
}

impl AppConfig {
    /// Requires `GEMINI_API_KEY`; honors optional `GEMINI_MODEL`,
    /// `GEMINI_BASE_URL` and `SALUS_HISTORY_PATH` overrides. The locale is
    /// picked once here and toggled only by explicit user action afterwards.
    pub fn from_env() -> SessionResult<Self> {
        let gemini = GeminiConfig::from_env()?;
        let history_path = std::env::var_os("SALUS_HISTORY_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_HISTORY_RELATIVE_PATH));

        Ok(Self {
            gemini,
            history_path,
            lang: Lang::from_env(),
        })
    }
}
