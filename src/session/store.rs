//! Per-user session state and the store that owns it.
//!
//! The store is a plain table behind a short-lived `std::sync::Mutex`; each
//! value is an `Arc<tokio::sync::Mutex<Session>>`, so all reads and writes of
//! one user's session are mutually exclusive while different users never
//! contend beyond the table lookup.
//!
//! Idle sessions are evicted. A sweep runs at most once per
//! [`SWEEP_INTERVAL`] as a side effect of [`SessionStore::session`], and on
//! demand via [`SessionStore::evict_idle`]. Sessions currently borrowed by a
//! handler are never evicted.

use crate::language::{DetectedLanguage, LanguageCode};
use crate::pipeline::transform::Operation;
use crate::session::action::{DocumentId, TranslateScope, UserId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Minimum time between two automatic idle sweeps.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// An extracted document. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub id: DocumentId,
    pub raw_text: String,
    pub language: DetectedLanguage,
}

impl Document {
    pub fn char_count(&self) -> usize {
        self.raw_text.chars().count()
    }
}

/// Where the session's notice language came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LanguageSource {
    #[default]
    Default,
    /// Adopted from the detected language of an uploaded document.
    Document,
    /// Classified from text the user wrote. Never overridden by a document.
    User,
}

/// Which menu the user is looking at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MenuState {
    #[default]
    AwaitingDocument,
    RootMenu,
    /// `scope` is `None` until the user picks one in the scope submenu.
    TranslateTargetSelect { scope: Option<TranslateScope> },
    Processing { operation: Operation },
}

impl MenuState {
    pub fn requires_document(self) -> bool {
        !matches!(self, MenuState::AwaitingDocument)
    }
}

/// Conversation state of one user.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub user_language: LanguageCode,
    pub language_source: LanguageSource,
    pub document: Option<Arc<Document>>,
    /// Last transform output for `document`, untruncated.
    pub last_artifact: Option<String>,
    pub menu: MenuState,
    /// Id reserved by the upload currently being extracted, if any.
    pub pending_upload: Option<DocumentId>,
}

impl Session {
    /// Drop the document and its artifact and wait for a new upload.
    pub fn clear_document(&mut self) {
        self.document = None;
        self.last_artifact = None;
        self.menu = MenuState::AwaitingDocument;
    }

    /// Install `document`, discarding any previous document and artifact.
    pub fn install_document(&mut self, document: Document) {
        if self.language_source != LanguageSource::User {
            if let Some(code) = document.language.code {
                self.user_language = code;
                self.language_source = LanguageSource::Document;
            }
        }
        self.document = Some(Arc::new(document));
        self.last_artifact = None;
        self.menu = MenuState::RootMenu;
    }

    /// Id of the current document, if any.
    pub fn document_id(&self) -> Option<DocumentId> {
        self.document.as_ref().map(|d| d.id)
    }

    pub fn is_current(&self, id: DocumentId) -> bool {
        self.document_id() == Some(id)
    }
}

struct Entry {
    session: Arc<tokio::sync::Mutex<Session>>,
    last_active: Instant,
}

/// All live sessions, keyed by user.
pub struct SessionStore {
    entries: Mutex<HashMap<UserId, Entry>>,
    idle_ttl: Option<Duration>,
    last_sweep: Mutex<Instant>,
    next_document: AtomicU64,
}

impl SessionStore {
    /// `idle_ttl = None` keeps sessions for the process lifetime.
    pub fn new(idle_ttl: Option<Duration>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            idle_ttl,
            last_sweep: Mutex::new(Instant::now()),
            next_document: AtomicU64::new(1),
        }
    }

    /// The session of `user`, created on first access.
    pub fn session(&self, user: UserId) -> Arc<tokio::sync::Mutex<Session>> {
        let now = Instant::now();
        let mut entries = self.entries();
        if self.sweep_due(now) {
            self.sweep(&mut entries, now);
        }
        let entry = entries.entry(user).or_insert_with(|| {
            debug!("New session for user {}", user);
            Entry {
                session: Arc::new(tokio::sync::Mutex::new(Session::default())),
                last_active: now,
            }
        });
        entry.last_active = now;
        Arc::clone(&entry.session)
    }

    /// Reserve a fresh, never reused document id.
    pub fn next_document_id(&self) -> DocumentId {
        DocumentId(self.next_document.fetch_add(1, Ordering::Relaxed))
    }

    /// Remove sessions idle longer than the TTL. Returns how many were removed.
    pub fn evict_idle(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries();
        self.sweep(&mut entries, now)
    }

    /// Forget `user`'s session. Returns whether one existed.
    pub fn remove(&self, user: UserId) -> bool {
        self.entries().remove(&user).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<UserId, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn sweep_due(&self, now: Instant) -> bool {
        if self.idle_ttl.is_none() {
            return false;
        }
        let mut last = self.last_sweep.lock().unwrap_or_else(PoisonError::into_inner);
        if now.saturating_duration_since(*last) >= SWEEP_INTERVAL {
            *last = now;
            true
        } else {
            false
        }
    }

    fn sweep(&self, entries: &mut HashMap<UserId, Entry>, now: Instant) -> usize {
        let Some(ttl) = self.idle_ttl else {
            return 0;
        };
        let before = entries.len();
        entries.retain(|_, entry| {
            let idle = now.saturating_duration_since(entry.last_active);
            // Someone else holds the Arc: a handler is still using it.
            idle < ttl || Arc::strong_count(&entry.session) > 1
        });
        let evicted = before - entries.len();
        if evicted > 0 {
            info!("Evicted {} idle sessions ({} remain)", evicted, entries.len());
        }
        evicted
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document(id: u64, label: &str) -> Document {
        Document {
            id: DocumentId(id),
            raw_text: "texto".into(),
            language: DetectedLanguage::from_label(label),
        }
    }

    #[tokio::test]
    async fn sessions_are_created_once_per_user() {
        let store = SessionStore::default();
        let a = store.session(UserId(1));
        let b = store.session(UserId(1));
        assert!(Arc::ptr_eq(&a, &b));
        store.session(UserId(2));
        assert_eq!(store.len(), 2);
        assert_eq!(a.lock().await.menu, MenuState::AwaitingDocument);
    }

    #[test]
    fn document_ids_are_monotonic() {
        let store = SessionStore::default();
        let first = store.next_document_id();
        let second = store.next_document_id();
        assert!(second > first);
    }

    #[test]
    fn zero_ttl_evicts_unborrowed_sessions() {
        let store = SessionStore::new(Some(Duration::ZERO));
        let held = store.session(UserId(1));
        drop(store.session(UserId(2)));

        assert_eq!(store.evict_idle(), 1);
        assert_eq!(store.len(), 1);
        drop(held);
        assert_eq!(store.evict_idle(), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn no_ttl_never_evicts() {
        let store = SessionStore::new(None);
        drop(store.session(UserId(1)));
        assert_eq!(store.evict_idle(), 0);
        assert!(store.remove(UserId(1)));
        assert!(!store.remove(UserId(1)));
    }

    #[test]
    fn install_replaces_document_and_artifact() {
        let mut session = Session::default();
        session.install_document(document(1, "inglés"));
        session.last_artifact = Some("resumen".into());

        session.install_document(document(2, "ruso"));

        assert!(session.is_current(DocumentId(2)));
        assert!(session.last_artifact.is_none());
        assert_eq!(session.menu, MenuState::RootMenu);
        assert_eq!(session.user_language, LanguageCode::Ru);
        assert_eq!(session.language_source, LanguageSource::Document);
    }

    #[test]
    fn user_language_wins_over_document_language() {
        let mut session = Session {
            user_language: LanguageCode::En,
            language_source: LanguageSource::User,
            ..Default::default()
        };
        session.install_document(document(1, "ruso"));
        assert_eq!(session.user_language, LanguageCode::En);
    }

    #[test]
    fn unknown_document_language_keeps_default() {
        let mut session = Session::default();
        session.install_document(document(1, "unknown"));
        assert_eq!(session.user_language, LanguageCode::Es);
        assert_eq!(session.language_source, LanguageSource::Default);
    }

    #[test]
    fn clearing_returns_to_awaiting_document() {
        let mut session = Session::default();
        session.install_document(document(3, "español"));
        session.clear_document();
        assert!(session.document.is_none());
        assert!(!session.menu.requires_document());
    }
}
