//! Language codes and language detection.
//!
//! Detection always fails open: a wrong guess only degrades which language
//! notices are written in, so no classification problem is ever allowed to
//! block the pipeline. Document detection falls back to the
//! [`UNKNOWN_LANGUAGE_LABEL`] sentinel, user detection to [`LanguageCode::Es`].

use crate::pipeline::chunk::prefix;
use crate::pipeline::llm::Completer;
use crate::prompts::{self, CLASSIFIER_PERSONA, UNKNOWN_LANGUAGE_LABEL};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Characters of a document sampled for language detection.
pub const DOCUMENT_SAMPLE_CHARS: usize = 4000;

/// Characters of a user message sampled for language detection.
pub const USER_SAMPLE_CHARS: usize = 1000;

/// A language the assistant can talk to the user in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LanguageCode {
    #[default]
    Es,
    En,
    Ru,
}

impl LanguageCode {
    pub const ALL: [LanguageCode; 3] = [LanguageCode::Es, LanguageCode::En, LanguageCode::Ru];

    /// Two-letter ISO 639-1 code.
    pub fn code(self) -> &'static str {
        match self {
            LanguageCode::Es => "es",
            LanguageCode::En => "en",
            LanguageCode::Ru => "ru",
        }
    }

    /// Parse an exact two-letter code (case-insensitive, surrounding
    /// whitespace and punctuation ignored).
    pub fn from_code(s: &str) -> Option<Self> {
        let cleaned = s
            .trim()
            .trim_matches(|c: char| !c.is_alphanumeric())
            .to_lowercase();
        match cleaned.as_str() {
            "es" => Some(LanguageCode::Es),
            "en" => Some(LanguageCode::En),
            "ru" => Some(LanguageCode::Ru),
            _ => None,
        }
    }

    /// Name of the language in Spanish, as used inside prompts.
    pub fn spanish_name(self) -> &'static str {
        match self {
            LanguageCode::Es => "español",
            LanguageCode::En => "inglés",
            LanguageCode::Ru => "ruso",
        }
    }
}

impl fmt::Display for LanguageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A language documents can be translated into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetLanguage {
    Es,
    En,
    Ru,
    Pt,
    Fr,
    De,
}

impl TargetLanguage {
    /// Order in which targets are offered in the language submenu.
    pub const ALL: [TargetLanguage; 6] = [
        TargetLanguage::Es,
        TargetLanguage::En,
        TargetLanguage::Ru,
        TargetLanguage::Pt,
        TargetLanguage::Fr,
        TargetLanguage::De,
    ];

    pub fn code(self) -> &'static str {
        match self {
            TargetLanguage::Es => "es",
            TargetLanguage::En => "en",
            TargetLanguage::Ru => "ru",
            TargetLanguage::Pt => "pt",
            TargetLanguage::Fr => "fr",
            TargetLanguage::De => "de",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.code() == code)
    }

    /// Name of the language in Spanish, as used inside prompts.
    pub fn spanish_name(self) -> &'static str {
        match self {
            TargetLanguage::Es => "español",
            TargetLanguage::En => "inglés",
            TargetLanguage::Ru => "ruso",
            TargetLanguage::Pt => "portugués",
            TargetLanguage::Fr => "francés",
            TargetLanguage::De => "alemán",
        }
    }

    /// Endonym with flag, used as a button label in every UI language.
    pub fn native_label(self) -> &'static str {
        match self {
            TargetLanguage::Es => "🇪🇸 Español",
            TargetLanguage::En => "🇬🇧 English",
            TargetLanguage::Ru => "🇷🇺 Русский",
            TargetLanguage::Pt => "🇵🇹 Português",
            TargetLanguage::Fr => "🇫🇷 Français",
            TargetLanguage::De => "🇩🇪 Deutsch",
        }
    }
}

// Synonyms per supported language, in the three supported languages plus
// the unaccented spellings models tend to produce.
const EN_SYNONYMS: &[&str] = &["inglés", "ingles", "english", "английский", "англ"];
const RU_SYNONYMS: &[&str] = &["ruso", "russian", "русский", "русск"];
const ES_SYNONYMS: &[&str] = &["español", "espanol", "castellano", "spanish", "испанский"];

/// Map a free-form language name to a supported code.
///
/// Exact codes map to themselves (so the function is idempotent on its own
/// output); otherwise names are matched by substring against known synonyms.
/// Anything unmatched maps to [`LanguageCode::Es`].
pub fn normalize_language_label(label: &str) -> LanguageCode {
    if let Some(code) = LanguageCode::from_code(label) {
        return code;
    }
    let lowered = label.trim().to_lowercase();
    let matches = |synonyms: &[&str]| synonyms.iter().any(|s| lowered.contains(s));
    if matches(EN_SYNONYMS) {
        LanguageCode::En
    } else if matches(RU_SYNONYMS) {
        LanguageCode::Ru
    } else if matches(ES_SYNONYMS) {
        LanguageCode::Es
    } else {
        debug!("Unmatched language label {:?}, using es", label);
        LanguageCode::Es
    }
}

/// Detected language of a document.
///
/// `code` is `None` when detection returned the unknown sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectedLanguage {
    /// Free-form language name in the default locale, or `"unknown"`.
    pub label: String,
    pub code: Option<LanguageCode>,
}

impl DetectedLanguage {
    pub fn from_label(label: impl Into<String>) -> Self {
        let label = label.into();
        let code = if label == UNKNOWN_LANGUAGE_LABEL {
            None
        } else {
            Some(normalize_language_label(&label))
        };
        Self { label, code }
    }

    pub fn unknown() -> Self {
        Self::from_label(UNKNOWN_LANGUAGE_LABEL)
    }

    pub fn is_unknown(&self) -> bool {
        self.code.is_none()
    }
}

/// Language detection over the completion collaborator (temperature 0).
#[derive(Clone)]
pub struct LanguageClassifier {
    completer: Arc<dyn Completer>,
}

impl LanguageClassifier {
    pub fn new(completer: Arc<dyn Completer>) -> Self {
        Self { completer }
    }

    /// Name the language of a document from its first 4000 characters.
    ///
    /// Returns `"unknown"` on empty input, empty output or any failure.
    pub async fn classify_document_language(&self, sample_text: &str) -> String {
        let sample = prefix(sample_text, DOCUMENT_SAMPLE_CHARS);
        if sample.trim().is_empty() {
            return UNKNOWN_LANGUAGE_LABEL.to_string();
        }
        match self
            .completer
            .complete(CLASSIFIER_PERSONA, &prompts::document_language_prompt(sample), 0.0)
            .await
        {
            Ok(answer) => {
                let label = clean_label(&answer);
                debug!("Document language detected: {:?}", label);
                if label.is_empty() {
                    UNKNOWN_LANGUAGE_LABEL.to_string()
                } else {
                    label
                }
            }
            Err(e) => {
                warn!("Document language detection failed: {}", e);
                UNKNOWN_LANGUAGE_LABEL.to_string()
            }
        }
    }

    /// Detect the language a user writes in from the first 1000 characters.
    ///
    /// The model must answer exactly `es`, `en` or `ru`; anything else, or a
    /// failure, resolves to [`LanguageCode::Es`].
    pub async fn classify_user_language(&self, sample_text: &str) -> LanguageCode {
        let sample = prefix(sample_text, USER_SAMPLE_CHARS);
        if sample.trim().is_empty() {
            return LanguageCode::default();
        }
        match self
            .completer
            .complete(CLASSIFIER_PERSONA, &prompts::user_language_prompt(sample), 0.0)
            .await
        {
            Ok(answer) => LanguageCode::from_code(&answer).unwrap_or_else(|| {
                debug!("Unexpected user-language answer {:?}, using default", answer);
                LanguageCode::default()
            }),
            Err(e) => {
                warn!("User language detection failed: {}", e);
                LanguageCode::default()
            }
        }
    }
}

/// First line of a model answer, without surrounding quotes or punctuation.
fn clean_label(answer: &str) -> String {
    answer
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("")
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CompletionError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct FixedCompleter {
        answer: Result<String, CompletionError>,
        prompts: Mutex<Vec<(String, f32)>>,
    }

    impl FixedCompleter {
        fn new(answer: Result<&str, CompletionError>) -> Arc<Self> {
            Arc::new(Self {
                answer: answer.map(str::to_string),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Completer for FixedCompleter {
        async fn complete(
            &self,
            _system: &str,
            user: &str,
            temperature: f32,
        ) -> Result<String, CompletionError> {
            self.prompts.lock().unwrap().push((user.to_string(), temperature));
            self.answer.clone()
        }
    }

    #[test]
    fn normalize_known_names() {
        assert_eq!(normalize_language_label("Inglés"), LanguageCode::En);
        assert_eq!(normalize_language_label("English"), LanguageCode::En);
        assert_eq!(normalize_language_label("русский язык"), LanguageCode::Ru);
        assert_eq!(normalize_language_label("ruso"), LanguageCode::Ru);
        assert_eq!(normalize_language_label("Castellano"), LanguageCode::Es);
    }

    #[test]
    fn normalize_spanish_names_in_every_ui_language() {
        for label in ["Español", "espanol", "Spanish", "испанский язык"] {
            assert_eq!(normalize_language_label(label), LanguageCode::Es, "label={label}");
        }
    }

    #[test]
    fn normalize_unmatched_defaults_to_es() {
        assert_eq!(normalize_language_label("francés"), LanguageCode::Es);
        assert_eq!(normalize_language_label(""), LanguageCode::Es);
        assert_eq!(normalize_language_label("unknown"), LanguageCode::Es);
    }

    #[test]
    fn normalize_is_idempotent_on_codes() {
        for label in ["inglés", "ruso", "español", "klingon", "EN", " ru "] {
            let once = normalize_language_label(label);
            assert_eq!(normalize_language_label(once.code()), once, "label={label}");
        }
    }

    #[test]
    fn target_codes_round_trip() {
        for t in TargetLanguage::ALL {
            assert_eq!(TargetLanguage::from_code(t.code()), Some(t));
        }
        assert_eq!(TargetLanguage::from_code("it"), None);
    }

    #[test]
    fn detected_language_unknown_has_no_code() {
        assert!(DetectedLanguage::unknown().is_unknown());
        assert_eq!(
            DetectedLanguage::from_label("inglés").code,
            Some(LanguageCode::En)
        );
    }

    #[tokio::test]
    async fn document_language_uses_4000_char_sample_at_temperature_zero() {
        let completer = FixedCompleter::new(Ok("  \"Inglés.\"\n"));
        let classifier = LanguageClassifier::new(completer.clone());
        let text = "w".repeat(10_000);

        let label = classifier.classify_document_language(&text).await;

        assert_eq!(label, "Inglés");
        let prompts = completer.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert_eq!(prompts[0].1, 0.0);
        assert!(prompts[0].0.contains(&"w".repeat(4000)));
        assert!(!prompts[0].0.contains(&"w".repeat(4001)));
    }

    #[tokio::test]
    async fn document_language_failure_is_unknown() {
        let completer = FixedCompleter::new(Err(CompletionError::Timeout { secs: 60 }));
        let classifier = LanguageClassifier::new(completer);
        assert_eq!(classifier.classify_document_language("hola").await, "unknown");
    }

    #[tokio::test]
    async fn empty_document_sample_skips_the_call() {
        let completer = FixedCompleter::new(Ok("español"));
        let classifier = LanguageClassifier::new(completer.clone());
        assert_eq!(classifier.classify_document_language("   ").await, "unknown");
        assert!(completer.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn user_language_accepts_exact_codes_only() {
        let classifier = LanguageClassifier::new(FixedCompleter::new(Ok("ru")));
        assert_eq!(classifier.classify_user_language("привет").await, LanguageCode::Ru);

        let classifier = LanguageClassifier::new(FixedCompleter::new(Ok("English")));
        assert_eq!(classifier.classify_user_language("hello").await, LanguageCode::Es);

        let classifier = LanguageClassifier::new(FixedCompleter::new(Ok("fr")));
        assert_eq!(classifier.classify_user_language("bonjour").await, LanguageCode::Es);
    }

    #[tokio::test]
    async fn user_language_failure_defaults_to_es() {
        let classifier = LanguageClassifier::new(FixedCompleter::new(Err(
            CompletionError::Api {
                detail: "boom".into(),
            },
        )));
        assert_eq!(classifier.classify_user_language("hello").await, LanguageCode::Es);
    }

    #[tokio::test]
    async fn user_language_sample_is_1000_chars() {
        let completer = FixedCompleter::new(Ok("en"));
        let classifier = LanguageClassifier::new(completer.clone());
        classifier.classify_user_language(&"q".repeat(5000)).await;
        let prompts = completer.prompts.lock().unwrap();
        assert!(prompts[0].0.contains(&"q".repeat(1000)));
        assert!(!prompts[0].0.contains(&"q".repeat(1001)));
    }
}
