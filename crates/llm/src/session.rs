use std::future::Future;
use std::pin::Pin;

use snafu::Snafu;

use salus_core::{Message, MessagePart};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
pub type SessionResult<T> = Result<T, SessionError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SessionError {
    #[snafu(display("GEMINI_API_KEY environment variable is not set"))]
    MissingApiKey { stage: &'static str },
    #[snafu(display("failed to build HTTP client: {source}"))]
    BuildHttpClient {
        stage: &'static str,
        source: reqwest::Error,
    },
    #[snafu(display("request to the chat service failed: {source}"))]
    SendRequest {
        stage: &'static str,
        source: reqwest::Error,
    },
    #[snafu(display("chat service returned status {status}: {body}"))]
    UpstreamStatus {
        stage: &'static str,
        status: u16,
        body: String,
    },
    #[snafu(display("failed to decode chat service response: {source}"))]
    DecodeResponse {
        stage: &'static str,
        source: reqwest::Error,
    },
    #[snafu(display("chat service returned no usable reply text"))]
    EmptyReply { stage: &'static str },
    #[snafu(display("chat session has not been started; call start_session first"))]
    NotStarted { stage: &'static str },
}

/// One ongoing multi-turn exchange with the remote model.
///
/// A session is seeded with prior history and a fixed system instruction at
/// creation time and diverges only through `send_message` calls. Exactly one
/// session handle is expected to exist at a time; re-initializing replaces
/// it wholesale rather than resuming it.
pub trait ChatSession: Send {
    /// Sends the ordered parts of exactly one new user turn and resolves to
    /// the model's textual reply. Any rejection surfaces as a `SessionError`
    /// carrying the upstream detail.
    fn send_message<'a>(&'a mut self, parts: Vec<MessagePart>) -> BoxFuture<'a, SessionResult<String>>;
}

/// Creates sessions from prior conversation history.
///
/// The mapping to the wire role/parts shape must preserve part ordering and
/// the text/inline-image distinction exactly; stripping a leading synthetic
/// greeting is the caller's responsibility, not the factory's.
pub trait SessionFactory: Send + Sync {
    fn start_session(&self, history: &[Message]) -> Box<dyn ChatSession>;
}
