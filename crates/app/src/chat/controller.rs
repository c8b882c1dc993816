use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose};

use salus_core::{ImageInput, Message, MessagePart, Role};
use salus_i18n::{self as i18n, Lang};
use salus_llm::{ChatSession, SessionError, SessionFactory};
use salus_storage::HistoryStore;

/// Result of one send attempt. `Ignored` covers both empty input and an
/// attempt made while another send is still in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Ignored,
    Replied(Message),
    Failed(Message),
}

/// Two-phase send lifecycle. `Pending` acts as the mutual-exclusion latch
/// over the single session handle: a second send is rejected outright while
/// one round trip is outstanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum SendPhase {
    #[default]
    Idle,
    Pending,
}

/// Owns the canonical message list and drives the request/response cycle
/// against the remote chat session.
///
/// Every observable mutation of the conversation is mirrored to the history
/// store immediately (write-through). Remote failures never escape this
/// type: each one becomes a conversation-visible model message plus a
/// transient banner string, and the latch is cleared on every path so the
/// caller can always submit again.
pub struct ChatController {
    factory: Arc<dyn SessionFactory>,
    store: HistoryStore,
    session: Option<Box<dyn ChatSession>>,
    conversation: Vec<Message>,
    lang: Lang,
    phase: SendPhase,
    banner: Option<String>,
}

impl ChatController {
    /// Restores the persisted conversation, or starts a fresh one holding a
    /// single localized greeting. Malformed persisted data has already been
    /// discarded by the store; load I/O errors are demoted to a fresh start
    /// because history is a convenience, not a correctness requirement.
    pub fn initialize(factory: Arc<dyn SessionFactory>, store: HistoryStore, lang: Lang) -> Self {
        let conversation = match store.load() {
            Ok(Some(messages)) => messages,
            Ok(None) => vec![greeting(lang)],
            Err(error) => {
                tracing::warn!(error = %error, "failed to load chat history; starting fresh");
                vec![greeting(lang)]
            }
        };

        Self {
            factory,
            store,
            session: None,
            conversation,
            lang,
            phase: SendPhase::Idle,
            banner: None,
        }
    }

    /// Establishes the remote session from the current conversation,
    /// replacing any prior handle. The leading synthetic greeting stays
    /// visible locally but is stripped from the seed history because the
    /// remote exchange is expected to open with a user turn.
    pub fn start_session(&mut self) {
        let history = match self.conversation.first() {
            Some(first) if first.role == Role::Model => &self.conversation[1..],
            _ => self.conversation.as_slice(),
        };
        self.session = Some(self.factory.start_session(history));
    }

    /// Sends one user turn and reconciles the outcome into the conversation.
    ///
    /// The user message is appended and persisted before the remote call is
    /// issued, so it is always visible ahead of the corresponding reply or
    /// error. A send attempted with nothing to say, or while another send
    /// is pending, has no observable effect.
    pub async fn send(&mut self, text: &str, image: Option<ImageInput>) -> SendOutcome {
        if self.phase == SendPhase::Pending {
            tracing::debug!("send ignored; another send is in flight");
            return SendOutcome::Ignored;
        }

        let text = text.trim();
        if text.is_empty() && image.is_none() {
            return SendOutcome::Ignored;
        }

        self.banner = None;
        let parts = self.build_user_parts(text, image);
        self.push_message(Message::new(Role::User, parts.clone()));
        self.phase = SendPhase::Pending;

        let result = match self.session.as_mut() {
            Some(session) => session.send_message(parts).await,
            None => Err(SessionError::NotStarted {
                stage: "controller-send",
            }),
        };
        self.phase = SendPhase::Idle;

        match result {
            Ok(reply) => {
                let message = Message::text(Role::Model, reply);
                self.push_message(message.clone());
                SendOutcome::Replied(message)
            }
            Err(error) => {
                let detail = error.to_string();
                tracing::warn!(error = %detail, "send failed");

                let message = Message::text(
                    Role::Model,
                    i18n::translate_with(
                        self.lang,
                        "chat_error_message",
                        &[("errorMessage", &detail)],
                    ),
                );
                self.push_message(message.clone());
                self.banner = Some(i18n::translate_with(
                    self.lang,
                    "error_message",
                    &[("errorMessage", &detail)],
                ));
                SendOutcome::Failed(message)
            }
        }
    }

    pub fn toggle_lang(&mut self) {
        self.lang = self.lang.toggled();
    }

    pub fn conversation(&self) -> &[Message] {
        &self.conversation
    }

    pub fn lang(&self) -> Lang {
        self.lang
    }

    pub fn is_pending(&self) -> bool {
        self.phase == SendPhase::Pending
    }

    /// Takes the transient banner error, if a send has failed since the
    /// last call. Each new send attempt clears it.
    pub fn take_banner(&mut self) -> Option<String> {
        self.banner.take()
    }

    // Image part first, then text; an image-only send gets the localized
    // analysis prompt as its caption so user parts are never empty.
    fn build_user_parts(&self, text: &str, image: Option<ImageInput>) -> Vec<MessagePart> {
        let mut parts = Vec::new();

        if let Some(image) = image {
            parts.push(MessagePart::inline_image(
                image.mime_type,
                general_purpose::STANDARD.encode(&image.data),
            ));
        }

        let prompt = if text.is_empty() {
            i18n::translate(self.lang, "image_analysis_prompt")
        } else {
            text.to_string()
        };
        parts.push(MessagePart::text(prompt));

        parts
    }

    fn push_message(&mut self, message: Message) {
        self.conversation.push(message);
        if let Err(error) = self.store.save(&self.conversation) {
            // Persistence is best-effort mirroring; a failed write must not
            // take down the send cycle.
            tracing::warn!(error = %error, "failed to persist chat history");
        }
    }
}

fn greeting(lang: Lang) -> Message {
    Message::text(Role::Model, i18n::translate(lang, "initial_message"))
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;

    use salus_llm::{BoxFuture, SessionResult};

    struct FakeSession {
        replies: Vec<SessionResult<String>>,
        calls: Arc<Mutex<Vec<Vec<MessagePart>>>>,
    }

    impl ChatSession for FakeSession {
        fn send_message<'a>(
            &'a mut self,
            parts: Vec<MessagePart>,
        ) -> BoxFuture<'a, SessionResult<String>> {
            self.calls.lock().unwrap().push(parts);
            let next = if self.replies.is_empty() {
                Ok(String::new())
            } else {
                self.replies.remove(0)
            };
            Box::pin(async move { next })
        }
    }

    #[derive(Default)]
    struct FakeFactory {
        replies: Mutex<Vec<SessionResult<String>>>,
        calls: Arc<Mutex<Vec<Vec<MessagePart>>>>,
        seeded: Arc<Mutex<Vec<Vec<Message>>>>,
    }

    impl FakeFactory {
        fn scripted(replies: Vec<SessionResult<String>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies),
                ..Self::default()
            })
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    impl SessionFactory for FakeFactory {
        fn start_session(&self, history: &[Message]) -> Box<dyn ChatSession> {
            self.seeded.lock().unwrap().push(history.to_vec());
            Box::new(FakeSession {
                replies: std::mem::take(&mut *self.replies.lock().unwrap()),
                calls: Arc::clone(&self.calls),
            })
        }
    }

    fn quota_error() -> SessionError {
        SessionError::UpstreamStatus {
            stage: "test",
            status: 429,
            body: "quota exceeded".to_string(),
        }
    }

    fn controller_in(
        dir: &tempfile::TempDir,
        factory: Arc<FakeFactory>,
        lang: Lang,
    ) -> ChatController {
        let store = HistoryStore::new(dir.path().join("history.json"));
        ChatController::initialize(factory, store, lang)
    }

    #[test]
    fn initialize_without_history_yields_localized_greeting() {
        let dir = tempfile::tempdir().expect("tempdir");
        let controller = controller_in(&dir, FakeFactory::scripted(vec![]), Lang::Zh);

        assert_eq!(controller.conversation().len(), 1);
        let greeting = &controller.conversation()[0];
        assert_eq!(greeting.role, Role::Model);
        assert_eq!(
            greeting.parts,
            vec![MessagePart::text(i18n::translate(Lang::Zh, "initial_message"))]
        );
    }

    #[test]
    fn initialize_restores_persisted_conversation() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = HistoryStore::new(dir.path().join("history.json"));
        let persisted = vec![
            Message::text(Role::User, "Hi"),
            Message::text(Role::Model, "Hello!"),
        ];
        store.save(&persisted).expect("seed");

        let controller = controller_in(&dir, FakeFactory::scripted(vec![]), Lang::En);

        assert_eq!(controller.conversation(), persisted.as_slice());
    }

    #[test]
    fn start_session_strips_leading_greeting() {
        let dir = tempfile::tempdir().expect("tempdir");
        let factory = FakeFactory::scripted(vec![]);
        let mut controller = controller_in(&dir, Arc::clone(&factory), Lang::En);

        controller.start_session();

        let seeded = factory.seeded.lock().unwrap();
        assert_eq!(seeded.len(), 1);
        assert!(seeded[0].is_empty());
    }

    #[test]
    fn start_session_keeps_history_opening_with_user_turn() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = HistoryStore::new(dir.path().join("history.json"));
        let persisted = vec![
            Message::text(Role::User, "Hi"),
            Message::text(Role::Model, "Hello!"),
        ];
        store.save(&persisted).expect("seed");
        let factory = FakeFactory::scripted(vec![]);
        let mut controller = controller_in(&dir, Arc::clone(&factory), Lang::En);

        controller.start_session();

        let seeded = factory.seeded.lock().unwrap();
        assert_eq!(seeded[0], persisted);
    }

    #[tokio::test]
    async fn text_send_appends_user_then_model_message() {
        let dir = tempfile::tempdir().expect("tempdir");
        let factory = FakeFactory::scripted(vec![Ok("Hi there".to_string())]);
        let mut controller = controller_in(&dir, Arc::clone(&factory), Lang::En);
        controller.start_session();

        let outcome = controller.send("Hello", None).await;

        let conversation = controller.conversation();
        assert_eq!(conversation.len(), 3);
        assert_eq!(conversation[1].role, Role::User);
        assert_eq!(conversation[1].parts, vec![MessagePart::text("Hello")]);
        assert_eq!(conversation[2].role, Role::Model);
        assert_eq!(conversation[2].parts, vec![MessagePart::text("Hi there")]);
        assert_eq!(outcome, SendOutcome::Replied(conversation[2].clone()));

        let calls = factory.calls.lock().unwrap();
        assert_eq!(calls.as_slice(), &[vec![MessagePart::text("Hello")]]);
    }

    #[tokio::test]
    async fn conversation_is_persisted_after_each_mutation() {
        let dir = tempfile::tempdir().expect("tempdir");
        let factory = FakeFactory::scripted(vec![Ok("Hi there".to_string())]);
        let mut controller = controller_in(&dir, factory, Lang::En);
        controller.start_session();

        controller.send("Hello", None).await;

        let store = HistoryStore::new(dir.path().join("history.json"));
        let persisted = store.load().expect("load").expect("present");
        assert_eq!(persisted, controller.conversation());
    }

    #[tokio::test]
    async fn image_only_send_synthesizes_analysis_prompt() {
        let dir = tempfile::tempdir().expect("tempdir");
        let factory = FakeFactory::scripted(vec![Ok("Looks safe.".to_string())]);
        let mut controller = controller_in(&dir, Arc::clone(&factory), Lang::En);
        controller.start_session();

        let image = ImageInput {
            data: vec![1, 2, 3],
            mime_type: "image/png".to_string(),
        };
        controller.send("   ", Some(image)).await;

        let user_message = &controller.conversation()[1];
        assert_eq!(
            user_message.parts,
            vec![
                MessagePart::inline_image("image/png", "AQID"),
                MessagePart::text(i18n::translate(Lang::En, "image_analysis_prompt")),
            ]
        );
    }

    #[tokio::test]
    async fn image_with_caption_keeps_caption_text() {
        let dir = tempfile::tempdir().expect("tempdir");
        let factory = FakeFactory::scripted(vec![Ok("ok".to_string())]);
        let mut controller = controller_in(&dir, factory, Lang::En);
        controller.start_session();

        let image = ImageInput {
            data: vec![9],
            mime_type: "image/jpeg".to_string(),
        };
        controller.send("what is this?", Some(image)).await;

        let user_message = &controller.conversation()[1];
        assert!(matches!(
            user_message.parts[0],
            MessagePart::InlineImage { .. }
        ));
        assert_eq!(user_message.parts[1], MessagePart::text("what is this?"));
    }

    #[tokio::test]
    async fn blank_send_is_ignored() {
        let dir = tempfile::tempdir().expect("tempdir");
        let factory = FakeFactory::scripted(vec![]);
        let mut controller = controller_in(&dir, Arc::clone(&factory), Lang::En);
        controller.start_session();

        let outcome = controller.send("   ", None).await;

        assert_eq!(outcome, SendOutcome::Ignored);
        assert_eq!(controller.conversation().len(), 1);
        assert_eq!(factory.call_count(), 0);
    }

    #[tokio::test]
    async fn send_while_pending_has_no_observable_effect() {
        let dir = tempfile::tempdir().expect("tempdir");
        let factory = FakeFactory::scripted(vec![]);
        let mut controller = controller_in(&dir, Arc::clone(&factory), Lang::En);
        controller.start_session();
        controller.phase = SendPhase::Pending;

        let outcome = controller.send("Hello", None).await;

        assert_eq!(outcome, SendOutcome::Ignored);
        assert_eq!(controller.conversation().len(), 1);
        assert_eq!(factory.call_count(), 0);
        assert!(controller.is_pending());
    }

    #[tokio::test]
    async fn failure_appends_error_message_and_sets_banner() {
        let dir = tempfile::tempdir().expect("tempdir");
        let factory = FakeFactory::scripted(vec![Err(quota_error())]);
        let mut controller = controller_in(&dir, factory, Lang::En);
        controller.start_session();

        let outcome = controller.send("Hello", None).await;

        // Exactly one user message and one model-authored error message.
        let conversation = controller.conversation();
        assert_eq!(conversation.len(), 3);
        assert_eq!(conversation[2].role, Role::Model);
        let MessagePart::Text { text } = &conversation[2].parts[0] else {
            panic!("error message should be text");
        };
        assert!(text.contains("quota exceeded"));
        assert!(text.starts_with("Sorry, I encountered an error:"));

        assert!(matches!(outcome, SendOutcome::Failed(_)));
        let banner = controller.take_banner().expect("banner");
        assert!(banner.contains("quota exceeded"));
        assert!(banner.starts_with("Failed to get response:"));
        assert!(!controller.is_pending());
    }

    #[tokio::test]
    async fn send_without_session_reports_failure_without_crashing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let factory = FakeFactory::scripted(vec![]);
        let mut controller = controller_in(&dir, factory, Lang::En);

        let outcome = controller.send("Hello", None).await;

        assert!(matches!(outcome, SendOutcome::Failed(_)));
        let banner = controller.take_banner().expect("banner");
        assert!(banner.contains("has not been started"));
        assert!(!controller.is_pending());
    }

    #[tokio::test]
    async fn latch_clears_after_failure_so_next_send_proceeds() {
        let dir = tempfile::tempdir().expect("tempdir");
        let factory = FakeFactory::scripted(vec![
            Err(quota_error()),
            Ok("Recovered".to_string()),
        ]);
        let mut controller = controller_in(&dir, Arc::clone(&factory), Lang::En);
        controller.start_session();

        controller.send("first", None).await;
        let outcome = controller.send("second", None).await;

        assert!(matches!(outcome, SendOutcome::Replied(_)));
        assert_eq!(factory.call_count(), 2);
        // The failure banner was superseded by the successful attempt.
        assert_eq!(controller.take_banner(), None);
    }

    #[tokio::test]
    async fn localized_error_strings_follow_active_lang() {
        let dir = tempfile::tempdir().expect("tempdir");
        let factory = FakeFactory::scripted(vec![Err(quota_error())]);
        let mut controller = controller_in(&dir, factory, Lang::Zh);
        controller.start_session();

        controller.send("你好", None).await;

        let banner = controller.take_banner().expect("banner");
        assert!(banner.starts_with("获取回复失败:"));
    }

    #[test]
    fn toggle_lang_flips_active_locale() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut controller = controller_in(&dir, FakeFactory::scripted(vec![]), Lang::En);

        controller.toggle_lang();
        assert_eq!(controller.lang(), Lang::Zh);
        controller.toggle_lang();
        assert_eq!(controller.lang(), Lang::En);
    }
}
