use std::time::Duration;

use serde::{Deserialize, Serialize};
use snafu::{OptionExt, ResultExt, ensure};

use salus_core::{Message, MessagePart, Role};

use crate::session::{
    BoxFuture, BuildHttpClientSnafu, ChatSession, DecodeResponseSnafu, EmptyReplySnafu,
    MissingApiKeySnafu, SendRequestSnafu, SessionFactory, SessionResult, UpstreamStatusSnafu,
};

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Steers the remote model for the whole conversation; sent once per
/// request as the session-level system instruction.
pub const SYSTEM_INSTRUCTION: &str = "You are a friendly and helpful health expert. Your goal is to provide accurate and easy-to-understand information about health-related topics, including analyzing images of products to identify their functions and potential hazards. Always prioritize safety and suggest consulting a professional for medical advice.";

// A send that never resolves would leave the conversation permanently
// pending; the upstream cap bounds every request instead.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into().trim().to_string(),
            model: DEFAULT_GEMINI_MODEL.to_string(),
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
        }
    }

    /// Reads the required `GEMINI_API_KEY` plus optional `GEMINI_MODEL` and
    /// `GEMINI_BASE_URL` overrides. A missing or blank key is a
    /// configuration error the caller must treat as fatal at startup.
    pub fn from_env() -> SessionResult<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
            .context(MissingApiKeySnafu {
                stage: "config-from-env",
            })?;

        let mut config = Self::new(api_key);
        if let Ok(model) = std::env::var("GEMINI_MODEL")
            && !model.trim().is_empty()
        {
            config.model = model.trim().to_string();
        }
        if let Ok(base_url) = std::env::var("GEMINI_BASE_URL")
            && !base_url.trim().is_empty()
        {
            config.base_url = base_url.trim().to_string();
        }

        Ok(config)
    }
}

/// One prior turn in the wire shape the generate-content endpoint expects.
/// Reuses the domain part type because the persisted JSON and the wire JSON
/// share the same `text`/`inlineData` spelling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Content {
    pub role: Role,
    pub parts: Vec<MessagePart>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    system_instruction: SystemInstruction<'a>,
    contents: &'a [Content],
}

#[derive(Debug, Serialize)]
struct SystemInstruction<'a> {
    parts: [SystemPart<'a>; 1],
}

#[derive(Debug, Serialize)]
struct SystemPart<'a> {
    text: &'a str,
}

impl<'a> SystemInstruction<'a> {
    fn from_text(text: &'a str) -> Self {
        Self {
            parts: [SystemPart { text }],
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

pub(crate) fn to_wire_content(message: &Message) -> Content {
    Content {
        role: message.role,
        parts: message.parts.clone(),
    }
}

fn extract_reply_text(response: &GenerateContentResponse) -> Option<String> {
    let content = response.candidates.first()?.content.as_ref()?;
    let text = content
        .parts
        .iter()
        .filter_map(|part| part.text.as_deref())
        .collect::<Vec<_>>()
        .join("");

    if text.trim().is_empty() { None } else { Some(text) }
}

/// Session factory backed by the Gemini generate-content REST endpoint.
pub struct GeminiClient {
    http: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> SessionResult<Self> {
        ensure!(
            !config.api_key.trim().is_empty(),
            MissingApiKeySnafu {
                stage: "gemini-client-new",
            }
        );

        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context(BuildHttpClientSnafu {
                stage: "build-http-client",
            })?;

        Ok(Self { http, config })
    }
}

impl GeminiClient {
    fn make_session(&self, history: &[Message]) -> GeminiChat {
        let history = history.iter().map(to_wire_content).collect::<Vec<_>>();
        tracing::debug!(
            model = %self.config.model,
            seeded_turn_count = history.len(),
            "starting chat session"
        );

        GeminiChat {
            http: self.http.clone(),
            config: self.config.clone(),
            system_instruction: SYSTEM_INSTRUCTION.to_string(),
            history,
        }
    }
}

impl SessionFactory for GeminiClient {
    fn start_session(&self, history: &[Message]) -> Box<dyn ChatSession> {
        Box::new(self.make_session(history))
    }
}

/// Stateful handle for one conversation, mirroring the upstream SDK's chat
/// object: the endpoint itself is stateless, so every send posts the full
/// accumulated history plus the new user turn.
pub struct GeminiChat {
    http: reqwest::Client,
    config: GeminiConfig,
    system_instruction: String,
    history: Vec<Content>,
}

impl GeminiChat {
    async fn send_inner(&mut self, parts: Vec<MessagePart>) -> SessionResult<String> {
        let user_turn = Content {
            role: Role::User,
            parts,
        };
        let mut contents = self.history.clone();
        contents.push(user_turn.clone());

        let request = GenerateContentRequest {
            system_instruction: SystemInstruction::from_text(&self.system_instruction),
            contents: &contents,
        };
        let url = format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        );

        let response = self
            .http
            .post(&url)
            .query(&[("key", self.config.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .context(SendRequestSnafu {
                stage: "send-generate-content",
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable response body>".to_string());
            tracing::warn!(
                model = %self.config.model,
                status = status.as_u16(),
                "chat service rejected the request"
            );
            return UpstreamStatusSnafu {
                stage: "generate-content-status",
                status: status.as_u16(),
                body,
            }
            .fail();
        }

        let payload: GenerateContentResponse =
            response.json().await.context(DecodeResponseSnafu {
                stage: "decode-generate-content",
            })?;
        let reply = extract_reply_text(&payload).context(EmptyReplySnafu {
            stage: "extract-reply-text",
        })?;

        // The turn is committed only after a successful reply, so a failed
        // send leaves the session history exactly as it was.
        self.history.push(user_turn);
        self.history.push(Content {
            role: Role::Model,
            parts: vec![MessagePart::text(reply.clone())],
        });

        Ok(reply)
    }
}

impl ChatSession for GeminiChat {
    fn send_message<'a>(&'a mut self, parts: Vec<MessagePart>) -> BoxFuture<'a, SessionResult<String>> {
        Box::pin(self.send_inner(parts))
    }
}
