//! The per-user conversation state machine.
//!
//! ```text
//!                  upload ok                 summary / translate_lang
//! AwaitingDocument ─────────▶ RootMenu ─────────────────────────────▶ Processing
//!        ▲   ▲  upload failed   │  ▲ translate_menu                      │
//!        │   └──────────────────┘  │      ▼                              │
//!        │                         │  TranslateTargetSelect ─────────────┘
//!        └── stale / no document ──┘                     result applied ──▶ RootMenu
//! ```
//!
//! Session locks are held only while reading or updating state, never across
//! extraction or completion calls. Long work runs on a snapshot of the
//! document; when it finishes the session is re-locked and the result is
//! applied only if that document is still current. Results for a document
//! that was replaced in the meantime are discarded.

use crate::config::AssistantConfig;
use crate::error::AssistError;
use crate::language::{DetectedLanguage, LanguageClassifier, LanguageCode};
use crate::pipeline::extract::{ensure_pdf, PdfiumExtractor, TextExtractor};
use crate::pipeline::format::format;
use crate::pipeline::llm::{Completer, LlmCompleter};
use crate::pipeline::transform::{Operation, TransformEngine};
use crate::session::action::{
    ActionKind, ActionRef, DocumentId, Inbound, Outbound, TranslateScope, UserId,
};
use crate::session::messages::{self, Notice};
use crate::session::store::{Document, LanguageSource, MenuState, Session, SessionStore};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Entry point for the chat transport: one call per inbound event.
pub struct DocumentAssistant {
    store: SessionStore,
    extractor: Arc<dyn TextExtractor>,
    classifier: LanguageClassifier,
    engine: TransformEngine,
    config: AssistantConfig,
}

impl DocumentAssistant {
    pub fn new(
        config: AssistantConfig,
        completer: Arc<dyn Completer>,
        extractor: Arc<dyn TextExtractor>,
    ) -> Self {
        Self {
            store: SessionStore::new(config.session_idle_ttl()),
            extractor,
            classifier: LanguageClassifier::new(Arc::clone(&completer)),
            engine: TransformEngine::new(completer, &config),
            config,
        }
    }

    /// Production wiring: the configured LLM provider and pdfium.
    pub fn from_config(config: AssistantConfig) -> Result<Self, AssistError> {
        let completer = Arc::new(LlmCompleter::from_config(&config)?);
        Ok(Self::new(config, completer, Arc::new(PdfiumExtractor::new())))
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn config(&self) -> &AssistantConfig {
        &self.config
    }

    /// Handle one event and return the effects to deliver, in order.
    ///
    /// Never fails: every error is logged and turned into a localized notice,
    /// and the session is left in a stable menu state.
    pub async fn handle(&self, user: UserId, event: Inbound) -> Vec<Outbound> {
        match event {
            Inbound::DocumentReceived { bytes, mime_type } => {
                self.on_document(user, bytes, mime_type).await
            }
            Inbound::ButtonPressed { action_id } => self.on_button(user, &action_id).await,
            Inbound::TextReceived { content } => self.on_text(user, &content).await,
        }
    }

    async fn on_document(
        &self,
        user: UserId,
        bytes: Vec<u8>,
        mime_type: Option<String>,
    ) -> Vec<Outbound> {
        let id = self.store.next_document_id();
        let session = self.store.session(user);
        {
            let mut s = session.lock().await;
            s.clear_document();
            s.pending_upload = Some(id);
        }
        info!(
            "User {}: document {} received ({} bytes, {})",
            user,
            id,
            bytes.len(),
            mime_type.as_deref().unwrap_or("no mime type")
        );

        let outcome = self.load(bytes).await;

        let mut s = session.lock().await;
        if s.pending_upload != Some(id) {
            info!("User {}: document {} superseded by a newer upload", user, id);
            return vec![text(Notice::Superseded, s.user_language)];
        }
        s.pending_upload = None;

        match outcome {
            Ok((raw_text, language)) => {
                let chars = raw_text.chars().count();
                let language_label = language.label.clone();
                s.install_document(Document {
                    id,
                    raw_text,
                    language,
                });
                let lang = s.user_language;
                vec![
                    text(
                        Notice::DocumentReady {
                            language_label,
                            chars,
                        },
                        lang,
                    ),
                    Outbound::Menu(messages::root_menu(lang, id)),
                ]
            }
            Err(e) => {
                warn!("User {}: document {} rejected: {}", user, id, e);
                s.clear_document();
                vec![text(Notice::from(&e), s.user_language)]
            }
        }
    }

    /// Validate, extract and classify an upload. No session lock is held.
    async fn load(&self, bytes: Vec<u8>) -> Result<(String, DetectedLanguage), AssistError> {
        ensure_pdf(&bytes)?;
        let raw_text = self.extractor.extract_text(bytes).await?;
        if raw_text.trim().is_empty() {
            return Err(AssistError::EmptyText);
        }
        info!("Extracted {} chars", raw_text.chars().count());

        let label = self.classifier.classify_document_language(&raw_text).await;
        info!("Document language: {}", label);
        Ok((raw_text, DetectedLanguage::from_label(label)))
    }

    async fn on_button(&self, user: UserId, action_id: &str) -> Vec<Outbound> {
        let session = self.store.session(user);
        let mut s = session.lock().await;
        let lang = s.user_language;

        let action = match ActionRef::parse(action_id) {
            Ok(action) => action,
            Err(e) => {
                warn!("User {}: {}", user, e);
                return match s.document_id() {
                    Some(doc) => vec![Outbound::Menu(messages::root_menu(lang, doc))],
                    None => vec![text(Notice::SendPdf, lang)],
                };
            }
        };

        let Some(document) = s.document.clone() else {
            debug!("User {}: {} with no document", user, action_id);
            s.clear_document();
            return vec![text(Notice::ResendDocument, lang)];
        };
        if let Err(e) = check_current(&s, action) {
            info!("User {}: {}: {}", user, action_id, e);
            return vec![text(Notice::from(&e), lang)];
        }
        if let MenuState::Processing { operation } = s.menu {
            debug!("User {}: busy with {:?}, ignoring {}", user, operation, action_id);
            return vec![text(Notice::Busy, lang)];
        }

        let (operation, source) = match action.kind {
            ActionKind::Transform(operation) => (operation, document.raw_text.clone()),
            ActionKind::TranslateMenu => {
                s.menu = MenuState::TranslateTargetSelect { scope: None };
                return vec![Outbound::Menu(messages::scope_menu(lang, document.id))];
            }
            ActionKind::TranslateScope(scope) => {
                s.menu = MenuState::TranslateTargetSelect { scope: Some(scope) };
                return vec![Outbound::Menu(messages::target_menu(lang, document.id))];
            }
            ActionKind::TranslateTo(target) => {
                let scope = match s.menu {
                    MenuState::TranslateTargetSelect { scope: Some(scope) } => scope,
                    _ => TranslateScope::FullDocument,
                };
                let source = match scope {
                    TranslateScope::FullDocument => document.raw_text.clone(),
                    TranslateScope::Summary => match s.last_artifact.clone() {
                        Some(artifact) => artifact,
                        None => {
                            debug!("User {}: no artifact to translate", user);
                            s.menu = MenuState::RootMenu;
                            return vec![text(Notice::ResendDocument, lang)];
                        }
                    },
                };
                (Operation::Translate(target), source)
            }
        };

        s.menu = MenuState::Processing { operation };
        drop(s);

        let guard = ProcessingGuard {
            session: Arc::clone(&session),
            document: document.id,
            armed: true,
        };
        self.run_operation(user, guard, &document, operation, &source, lang)
            .await
    }

    /// Run `operation` outside the lock and apply the result if `document`
    /// is still the session's current document.
    async fn run_operation(
        &self,
        user: UserId,
        guard: ProcessingGuard,
        document: &Document,
        operation: Operation,
        source: &str,
        lang: LanguageCode,
    ) -> Vec<Outbound> {
        info!(
            "User {}: {:?} on document {} ({} chars)",
            user,
            operation,
            document.id,
            source.chars().count()
        );
        let result = self.engine.run(source, operation, lang, &self.config).await;

        let session = Arc::clone(&guard.session);
        let mut s = session.lock().await;
        guard.disarm();
        if !s.is_current(document.id) {
            info!(
                "User {}: discarding {:?} result for replaced document {}",
                user, operation, document.id
            );
            return vec![text(Notice::Superseded, s.user_language)];
        }
        s.menu = MenuState::RootMenu;
        let lang = s.user_language;
        let menu = Outbound::Menu(messages::root_menu(lang, document.id));

        match result {
            Ok(output) => {
                debug!("User {}: {:?} stats {:?}", user, operation, output.stats);
                let message = messages::result_message(operation, lang, &output.text);
                s.last_artifact = Some(output.text);
                vec![
                    Outbound::Text(format(&message, self.config.message_limit)),
                    menu,
                ]
            }
            Err(e) => {
                warn!("User {}: {:?} failed: {}", user, operation, e);
                vec![text(Notice::from(&e), lang), menu]
            }
        }
    }

    async fn on_text(&self, user: UserId, content: &str) -> Vec<Outbound> {
        let content = content.trim();
        if let Some(command) = command_name(content) {
            let lang = self.store.session(user).lock().await.user_language;
            let notice = match command.as_str() {
                "start" | "help" => Notice::Welcome,
                _ => Notice::SendPdf,
            };
            return vec![text(notice, lang)];
        }

        let lang = self.classifier.classify_user_language(content).await;
        let session = self.store.session(user);
        let mut s = session.lock().await;
        if lang != s.user_language {
            debug!("User {}: language {} → {}", user, s.user_language, lang);
        }
        s.user_language = lang;
        s.language_source = LanguageSource::User;
        vec![text(Notice::SendPdf, lang)]
    }
}

/// Puts the session back in `RootMenu` when an operation is abandoned
/// (future dropped or panicked) before its result was applied.
struct ProcessingGuard {
    session: Arc<tokio::sync::Mutex<Session>>,
    document: DocumentId,
    armed: bool,
}

impl ProcessingGuard {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for ProcessingGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let document = self.document;
        if let Ok(mut s) = self.session.try_lock() {
            release_processing(&mut s, document);
            return;
        }
        // Lock contended: finish the reset on the runtime.
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let session = Arc::clone(&self.session);
            handle.spawn(async move {
                release_processing(&mut *session.lock().await, document);
            });
        }
    }
}

fn release_processing(session: &mut Session, document: DocumentId) {
    if session.is_current(document) && matches!(session.menu, MenuState::Processing { .. }) {
        warn!("Operation on document {} abandoned, session released", document);
        session.menu = MenuState::RootMenu;
    }
}

/// A tagged action must refer to the session's current document.
fn check_current(session: &Session, action: ActionRef) -> Result<(), AssistError> {
    match action.document {
        Some(id) if !session.is_current(id) => Err(AssistError::StaleState),
        _ => Ok(()),
    }
}

/// `"/start@my_bot args"` → `"start"`.
fn command_name(content: &str) -> Option<String> {
    let rest = content.strip_prefix('/')?;
    let word = rest.split_whitespace().next().unwrap_or("");
    let name = word.split('@').next().unwrap_or("");
    Some(name.to_lowercase())
}

fn text(notice: Notice, lang: LanguageCode) -> Outbound {
    Outbound::Text(notice.render(lang))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CompletionError;
    use crate::prompts::CLASSIFIER_PERSONA;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Answers classifier prompts with a fixed label, everything else with
    /// "salida" and counts the transform calls.
    struct EchoCompleter {
        label: &'static str,
        transform_calls: Mutex<usize>,
    }

    #[async_trait]
    impl Completer for EchoCompleter {
        async fn complete(
            &self,
            system: &str,
            _user: &str,
            _temperature: f32,
        ) -> Result<String, CompletionError> {
            if system == CLASSIFIER_PERSONA {
                return Ok(self.label.to_string());
            }
            *self.transform_calls.lock().unwrap() += 1;
            Ok("salida".into())
        }
    }

    struct FixedExtractor(String);

    #[async_trait]
    impl TextExtractor for FixedExtractor {
        async fn extract_text(&self, _bytes: Vec<u8>) -> Result<String, AssistError> {
            Ok(self.0.clone())
        }
    }

    fn assistant(text: &str) -> (DocumentAssistant, Arc<EchoCompleter>) {
        let completer = Arc::new(EchoCompleter {
            label: "español",
            transform_calls: Mutex::new(0),
        });
        let assistant = DocumentAssistant::new(
            AssistantConfig::default(),
            completer.clone(),
            Arc::new(FixedExtractor(text.to_string())),
        );
        (assistant, completer)
    }

    fn pdf() -> Inbound {
        Inbound::DocumentReceived {
            bytes: b"%PDF-1.7 test".to_vec(),
            mime_type: Some("application/pdf".into()),
        }
    }

    fn press(id: &str) -> Inbound {
        Inbound::ButtonPressed {
            action_id: id.to_string(),
        }
    }

    async fn menu_state(assistant: &DocumentAssistant, user: UserId) -> MenuState {
        assistant.store().session(user).lock().await.menu
    }

    #[test]
    fn command_names_are_normalised() {
        assert_eq!(command_name("/Start"), Some("start".into()));
        assert_eq!(command_name("/help@docbot now"), Some("help".into()));
        assert_eq!(command_name("hola"), None);
    }

    #[tokio::test]
    async fn upload_shows_root_menu() {
        let (assistant, _) = assistant("contenido del documento");
        let out = assistant.handle(UserId(1), pdf()).await;

        assert_eq!(out.len(), 2);
        assert!(matches!(&out[1], Outbound::Menu(m) if m.options.len() == 5));
        assert_eq!(menu_state(&assistant, UserId(1)).await, MenuState::RootMenu);
    }

    #[tokio::test]
    async fn non_pdf_upload_is_rejected_without_extraction() {
        let (assistant, completer) = assistant("texto");
        let out = assistant
            .handle(
                UserId(1),
                Inbound::DocumentReceived {
                    bytes: b"PK\x03\x04".to_vec(),
                    mime_type: Some("application/zip".into()),
                },
            )
            .await;
        assert_eq!(out, vec![Outbound::Text(Notice::NotAPdf.render(LanguageCode::Es))]);
        assert_eq!(*completer.transform_calls.lock().unwrap(), 0);
        assert_eq!(
            menu_state(&assistant, UserId(1)).await,
            MenuState::AwaitingDocument
        );
    }

    #[tokio::test]
    async fn translate_menu_walks_scope_then_target() {
        let (assistant, completer) = assistant("texto del documento");
        assistant.handle(UserId(1), pdf()).await;
        let doc = assistant.store().session(UserId(1)).lock().await.document_id().unwrap();

        let out = assistant
            .handle(UserId(1), press(&format!("translate_menu@{doc}")))
            .await;
        assert!(matches!(&out[0], Outbound::Menu(m) if m.options.len() == 2));

        let out = assistant
            .handle(UserId(1), press(&format!("translate_scope_full@{doc}")))
            .await;
        assert!(matches!(&out[0], Outbound::Menu(m) if m.options.len() == 6));
        assert_eq!(
            menu_state(&assistant, UserId(1)).await,
            MenuState::TranslateTargetSelect {
                scope: Some(TranslateScope::FullDocument)
            }
        );

        let out = assistant
            .handle(UserId(1), press(&format!("translate_lang_en@{doc}")))
            .await;
        assert!(matches!(&out[0], Outbound::Text(t) if t.ends_with("salida")));
        assert_eq!(*completer.transform_calls.lock().unwrap(), 1);
        assert_eq!(menu_state(&assistant, UserId(1)).await, MenuState::RootMenu);
    }

    #[tokio::test]
    async fn translating_missing_artifact_asks_to_resend() {
        let (assistant, completer) = assistant("texto");
        assistant.handle(UserId(1), pdf()).await;
        assistant.handle(UserId(1), press("translate_menu")).await;
        assistant.handle(UserId(1), press("translate_scope_summary")).await;

        let out = assistant.handle(UserId(1), press("translate_lang_fr")).await;

        assert_eq!(
            out,
            vec![Outbound::Text(Notice::ResendDocument.render(LanguageCode::Es))]
        );
        assert_eq!(*completer.transform_calls.lock().unwrap(), 0);
        assert_eq!(menu_state(&assistant, UserId(1)).await, MenuState::RootMenu);
    }

    #[tokio::test]
    async fn summary_artifact_can_be_translated() {
        let (assistant, completer) = assistant("texto");
        assistant.handle(UserId(1), pdf()).await;
        assistant.handle(UserId(1), press("summary_short")).await;
        assert_eq!(
            assistant.store().session(UserId(1)).lock().await.last_artifact.as_deref(),
            Some("salida")
        );

        assistant.handle(UserId(1), press("translate_menu")).await;
        assistant.handle(UserId(1), press("translate_scope_summary")).await;
        let out = assistant.handle(UserId(1), press("translate_lang_de")).await;

        assert!(matches!(&out[0], Outbound::Text(t) if t.contains("Deutsch")));
        // One map call plus one reduce call for the summary, one for the translation.
        assert_eq!(*completer.transform_calls.lock().unwrap(), 3);
    }

    #[tokio::test]
    async fn busy_session_rejects_new_operations() {
        let (assistant, completer) = assistant("texto");
        assistant.handle(UserId(1), pdf()).await;
        assistant.store().session(UserId(1)).lock().await.menu = MenuState::Processing {
            operation: Operation::KeyPoints,
        };

        let out = assistant.handle(UserId(1), press("summary_long")).await;

        assert_eq!(out, vec![Outbound::Text(Notice::Busy.render(LanguageCode::Es))]);
        assert_eq!(*completer.transform_calls.lock().unwrap(), 0);
    }

    /// Classifies instantly, never finishes a transform.
    struct StallingCompleter;

    #[async_trait]
    impl Completer for StallingCompleter {
        async fn complete(
            &self,
            system: &str,
            _user: &str,
            _temperature: f32,
        ) -> Result<String, CompletionError> {
            if system == CLASSIFIER_PERSONA {
                return Ok("español".into());
            }
            tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
            Ok("tarde".into())
        }
    }

    #[tokio::test]
    async fn aborted_operation_releases_the_session() {
        let assistant = Arc::new(DocumentAssistant::new(
            AssistantConfig::default(),
            Arc::new(StallingCompleter),
            Arc::new(FixedExtractor("texto".into())),
        ));
        assistant.handle(UserId(1), pdf()).await;

        let task = {
            let assistant = Arc::clone(&assistant);
            tokio::spawn(async move { assistant.handle(UserId(1), press("summary_short")).await })
        };
        while !matches!(
            menu_state(&assistant, UserId(1)).await,
            MenuState::Processing { .. }
        ) {
            tokio::task::yield_now().await;
        }

        task.abort();
        assert!(task.await.unwrap_err().is_cancelled());
        assert_eq!(menu_state(&assistant, UserId(1)).await, MenuState::RootMenu);

        let out = assistant.handle(UserId(1), press("translate_menu")).await;
        assert!(matches!(&out[0], Outbound::Menu(m) if m.options.len() == 2));
    }

    #[tokio::test]
    async fn abandoned_guard_leaves_a_replaced_document_alone() {
        let (assistant, _) = assistant("texto");
        assistant.handle(UserId(1), pdf()).await;
        let session = assistant.store().session(UserId(1));
        let stale = DocumentId(999);
        session.lock().await.menu = MenuState::Processing {
            operation: Operation::KeyPoints,
        };

        drop(ProcessingGuard {
            session: Arc::clone(&session),
            document: stale,
            armed: true,
        });

        assert_eq!(
            session.lock().await.menu,
            MenuState::Processing {
                operation: Operation::KeyPoints
            }
        );
    }

    #[tokio::test]
    async fn unknown_action_redisplays_the_menu() {
        let (assistant, _) = assistant("texto");
        let out = assistant.handle(UserId(1), press("bogus")).await;
        assert_eq!(out, vec![Outbound::Text(Notice::SendPdf.render(LanguageCode::Es))]);

        assistant.handle(UserId(1), pdf()).await;
        let out = assistant.handle(UserId(1), press("bogus")).await;
        assert!(matches!(&out[0], Outbound::Menu(_)));
    }

    #[tokio::test]
    async fn text_reclassifies_user_language() {
        let completer = Arc::new(EchoCompleter {
            label: "en",
            transform_calls: Mutex::new(0),
        });
        let assistant = DocumentAssistant::new(
            AssistantConfig::default(),
            completer,
            Arc::new(FixedExtractor("x".into())),
        );

        let out = assistant
            .handle(
                UserId(5),
                Inbound::TextReceived {
                    content: "hello there".into(),
                },
            )
            .await;

        assert_eq!(out, vec![Outbound::Text(Notice::SendPdf.render(LanguageCode::En))]);
        let session = assistant.store().session(UserId(5));
        let s = session.lock().await;
        assert_eq!(s.user_language, LanguageCode::En);
        assert_eq!(s.language_source, LanguageSource::User);
    }

    #[tokio::test]
    async fn start_command_welcomes_without_classifying() {
        let (assistant, _) = assistant("x");
        let out = assistant
            .handle(
                UserId(1),
                Inbound::TextReceived {
                    content: "/start".into(),
                },
            )
            .await;
        assert_eq!(out, vec![Outbound::Text(Notice::Welcome.render(LanguageCode::Es))]);
    }
}
