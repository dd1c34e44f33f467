//! Localized user-facing text: notices, menus and result headers.
//!
//! Everything the user reads comes from here, in the session's language.
//! Internal error detail never reaches these strings; it is logged instead.

use crate::error::AssistError;
use crate::language::{LanguageCode, TargetLanguage};
use crate::pipeline::transform::Operation;
use crate::prompts::UNKNOWN_LANGUAGE_LABEL;
use crate::session::action::{
    ActionKind, ActionRef, DocumentId, MenuOption, MenuSpec, TranslateScope,
};

/// A short, non-technical message for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Welcome,
    SendPdf,
    ResendDocument,
    NotAPdf,
    ExtractionFailed,
    /// Decoded, but no text layer (likely a scanned PDF).
    EmptyText,
    AiError,
    /// An operation is already running for this document.
    Busy,
    /// A late result for a replaced document was discarded.
    Superseded,
    DocumentReady {
        language_label: String,
        chars: usize,
    },
}

impl Notice {
    pub fn render(&self, lang: LanguageCode) -> String {
        use LanguageCode::*;
        match (self, lang) {
            (Notice::Welcome, Es) => "👋 ¡Hola! Envíame un documento PDF y podré resumirlo, \
extraer sus puntos clave, explicarlo de forma sencilla o traducirlo."
                .into(),
            (Notice::Welcome, En) => "👋 Hi! Send me a PDF document and I can summarize it, \
extract its key points, explain it simply or translate it."
                .into(),
            (Notice::Welcome, Ru) => "👋 Привет! Отправьте мне PDF-документ, и я смогу кратко \
изложить его, выделить ключевые идеи, объяснить простыми словами или перевести."
                .into(),

            (Notice::SendPdf, Es) => "📄 Envíame un archivo PDF para empezar.".into(),
            (Notice::SendPdf, En) => "📄 Send me a PDF file to get started.".into(),
            (Notice::SendPdf, Ru) => "📄 Отправьте PDF-файл, чтобы начать.".into(),

            (Notice::ResendDocument, Es) => {
                "⚠️ No encuentro el documento. Por favor, envíalo de nuevo.".into()
            }
            (Notice::ResendDocument, En) => {
                "⚠️ I can't find the document. Please send it again.".into()
            }
            (Notice::ResendDocument, Ru) => {
                "⚠️ Документ не найден. Пожалуйста, отправьте его ещё раз.".into()
            }

            (Notice::NotAPdf, Es) => "❌ El archivo no es un PDF.".into(),
            (Notice::NotAPdf, En) => "❌ The file is not a PDF.".into(),
            (Notice::NotAPdf, Ru) => "❌ Этот файл не является PDF.".into(),

            (Notice::ExtractionFailed, Es) => {
                "❌ No pude leer el PDF. Prueba a enviarlo de nuevo.".into()
            }
            (Notice::ExtractionFailed, En) => {
                "❌ I couldn't read the PDF. Try sending it again.".into()
            }
            (Notice::ExtractionFailed, Ru) => {
                "❌ Не удалось прочитать PDF. Попробуйте отправить его снова.".into()
            }

            (Notice::EmptyText, Es) => "❌ No se encontró texto en el PDF. \
Puede ser un documento escaneado."
                .into(),
            (Notice::EmptyText, En) => "❌ No text was found in the PDF. \
It may be a scanned document."
                .into(),
            (Notice::EmptyText, Ru) => "❌ В PDF не найден текст. \
Возможно, это отсканированный документ."
                .into(),

            (Notice::AiError, Es) => {
                "⚠️ Hubo un problema con el servicio de IA. Inténtalo de nuevo.".into()
            }
            (Notice::AiError, En) => {
                "⚠️ There was a problem with the AI service. Please try again.".into()
            }
            (Notice::AiError, Ru) => {
                "⚠️ Возникла проблема с сервисом ИИ. Попробуйте ещё раз.".into()
            }

            (Notice::Busy, Es) => "⏳ Todavía estoy trabajando en tu solicitud anterior.".into(),
            (Notice::Busy, En) => "⏳ I'm still working on your previous request.".into(),
            (Notice::Busy, Ru) => "⏳ Я ещё обрабатываю ваш предыдущий запрос.".into(),

            (Notice::Superseded, Es) => "ℹ️ Recibiste un documento nuevo; \
descarté el resultado del anterior."
                .into(),
            (Notice::Superseded, En) => "ℹ️ A new document arrived; \
I discarded the result for the previous one."
                .into(),
            (Notice::Superseded, Ru) => "ℹ️ Получен новый документ; \
результат для предыдущего отброшен."
                .into(),

            (
                Notice::DocumentReady {
                    language_label,
                    chars,
                },
                lang,
            ) => {
                let label = display_label(language_label, lang);
                match lang {
                    Es => format!(
                        "✅ Documento recibido ({chars} caracteres). Idioma detectado: {label}."
                    ),
                    En => format!(
                        "✅ Document received ({chars} characters). Detected language: {label}."
                    ),
                    Ru => format!("✅ Документ получен ({chars} символов). Определённый язык: {label}."),
                }
            }
        }
    }
}

impl From<&AssistError> for Notice {
    fn from(err: &AssistError) -> Self {
        match err {
            AssistError::NotAPdf { .. } => Notice::NotAPdf,
            AssistError::EmptyText => Notice::EmptyText,
            AssistError::StaleState => Notice::ResendDocument,
            AssistError::FileNotFound { .. }
            | AssistError::InvalidInput { .. }
            | AssistError::DownloadFailed { .. }
            | AssistError::DownloadTimeout { .. }
            | AssistError::Extraction { .. } => Notice::ExtractionFailed,
            AssistError::Completion(_)
            | AssistError::ProviderNotConfigured { .. }
            | AssistError::InvalidConfig(_)
            | AssistError::Internal(_) => Notice::AiError,
        }
    }
}

fn display_label(label: &str, lang: LanguageCode) -> String {
    if label != UNKNOWN_LANGUAGE_LABEL {
        return label.to_string();
    }
    match lang {
        LanguageCode::Es => "desconocido",
        LanguageCode::En => "unknown",
        LanguageCode::Ru => "не определён",
    }
    .to_string()
}

/// Heading placed above a transform result.
pub fn result_header(operation: Operation, lang: LanguageCode) -> String {
    use LanguageCode::*;
    match (operation, lang) {
        (Operation::ShortSummary, Es) => "📝 Resumen corto".into(),
        (Operation::ShortSummary, En) => "📝 Short summary".into(),
        (Operation::ShortSummary, Ru) => "📝 Краткое содержание".into(),
        (Operation::LongSummary, Es) => "📚 Resumen largo".into(),
        (Operation::LongSummary, En) => "📚 Long summary".into(),
        (Operation::LongSummary, Ru) => "📚 Подробное содержание".into(),
        (Operation::KeyPoints, Es) => "📌 Puntos clave".into(),
        (Operation::KeyPoints, En) => "📌 Key points".into(),
        (Operation::KeyPoints, Ru) => "📌 Ключевые идеи".into(),
        (Operation::SimpleExplanation, Es) => "🧒 Explicación sencilla".into(),
        (Operation::SimpleExplanation, En) => "🧒 Simple explanation".into(),
        (Operation::SimpleExplanation, Ru) => "🧒 Простое объяснение".into(),
        (Operation::Translate(target), Es) => format!("🌐 Traducción ({})", target.native_label()),
        (Operation::Translate(target), En) => format!("🌐 Translation ({})", target.native_label()),
        (Operation::Translate(target), Ru) => format!("🌐 Перевод ({})", target.native_label()),
    }
}

/// Result message body: header, blank line, text.
pub fn result_message(operation: Operation, lang: LanguageCode, text: &str) -> String {
    format!("{}\n\n{}", result_header(operation, lang), text)
}

fn option(label: impl Into<String>, kind: ActionKind, document: DocumentId) -> MenuOption {
    MenuOption {
        label: label.into(),
        action_id: ActionRef::new(kind, document).encode(),
    }
}

/// The operations menu shown once a document is loaded.
pub fn root_menu(lang: LanguageCode, document: DocumentId) -> MenuSpec {
    use LanguageCode::*;
    let (prompt, labels) = match lang {
        Es => (
            "¿Qué quieres hacer con el documento?",
            ["📝 Resumen corto", "📚 Resumen largo", "📌 Puntos clave", "🧒 Explicación sencilla", "🌐 Traducir"],
        ),
        En => (
            "What would you like to do with the document?",
            ["📝 Short summary", "📚 Long summary", "📌 Key points", "🧒 Simple explanation", "🌐 Translate"],
        ),
        Ru => (
            "Что сделать с документом?",
            ["📝 Кратко", "📚 Подробно", "📌 Ключевые идеи", "🧒 Простыми словами", "🌐 Перевести"],
        ),
    };
    let kinds = [
        ActionKind::Transform(Operation::ShortSummary),
        ActionKind::Transform(Operation::LongSummary),
        ActionKind::Transform(Operation::KeyPoints),
        ActionKind::Transform(Operation::SimpleExplanation),
        ActionKind::TranslateMenu,
    ];
    MenuSpec {
        prompt: prompt.into(),
        options: labels
            .into_iter()
            .zip(kinds)
            .map(|(label, kind)| option(label, kind, document))
            .collect(),
    }
}

/// What to translate: the whole document or the last result.
pub fn scope_menu(lang: LanguageCode, document: DocumentId) -> MenuSpec {
    let (prompt, full, summary) = match lang {
        LanguageCode::Es => ("¿Qué quieres traducir?", "📄 Documento completo", "📝 Último resultado"),
        LanguageCode::En => ("What should I translate?", "📄 Full document", "📝 Last result"),
        LanguageCode::Ru => ("Что перевести?", "📄 Весь документ", "📝 Последний результат"),
    };
    MenuSpec {
        prompt: prompt.into(),
        options: vec![
            option(full, ActionKind::TranslateScope(TranslateScope::FullDocument), document),
            option(summary, ActionKind::TranslateScope(TranslateScope::Summary), document),
        ],
    }
}

/// Target-language choices, labelled by endonym.
pub fn target_menu(lang: LanguageCode, document: DocumentId) -> MenuSpec {
    let prompt = match lang {
        LanguageCode::Es => "¿A qué idioma?",
        LanguageCode::En => "Into which language?",
        LanguageCode::Ru => "На какой язык?",
    };
    MenuSpec {
        prompt: prompt.into(),
        options: TargetLanguage::ALL
            .into_iter()
            .map(|t| option(t.native_label(), ActionKind::TranslateTo(t), document))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CompletionError;

    #[test]
    fn every_notice_is_localized() {
        let notices = [
            Notice::Welcome,
            Notice::SendPdf,
            Notice::ResendDocument,
            Notice::NotAPdf,
            Notice::ExtractionFailed,
            Notice::EmptyText,
            Notice::AiError,
            Notice::Busy,
            Notice::Superseded,
        ];
        for notice in notices {
            let es = notice.render(LanguageCode::Es);
            let en = notice.render(LanguageCode::En);
            let ru = notice.render(LanguageCode::Ru);
            assert!(!es.is_empty());
            assert_ne!(es, en, "{notice:?}");
            assert_ne!(en, ru, "{notice:?}");
        }
    }

    #[test]
    fn document_ready_mentions_label_and_size() {
        let text = Notice::DocumentReady {
            language_label: "inglés".into(),
            chars: 7000,
        }
        .render(LanguageCode::Es);
        assert!(text.contains("inglés"));
        assert!(text.contains("7000"));

        let unknown = Notice::DocumentReady {
            language_label: UNKNOWN_LANGUAGE_LABEL.into(),
            chars: 1,
        }
        .render(LanguageCode::Es);
        assert!(unknown.contains("desconocido"));
    }

    #[test]
    fn errors_map_to_non_technical_notices() {
        let err = AssistError::Completion(CompletionError::Api {
            detail: "HTTP 500 from upstream".into(),
        });
        let notice = Notice::from(&err);
        assert_eq!(notice, Notice::AiError);
        assert!(!notice.render(LanguageCode::En).contains("500"));
        assert_eq!(Notice::from(&AssistError::EmptyText), Notice::EmptyText);
        assert_eq!(Notice::from(&AssistError::StaleState), Notice::ResendDocument);
    }

    #[test]
    fn menus_are_tagged_with_the_document() {
        let menu = root_menu(LanguageCode::En, DocumentId(7));
        let ids: Vec<&str> = menu.options.iter().map(|o| o.action_id.as_str()).collect();
        assert_eq!(
            ids,
            [
                "summary_short@7",
                "summary_long@7",
                "key_points@7",
                "simple_explanation@7",
                "translate_menu@7"
            ]
        );
        assert_eq!(target_menu(LanguageCode::Ru, DocumentId(7)).options.len(), 6);
        assert_eq!(
            scope_menu(LanguageCode::Es, DocumentId(7)).options[1].action_id,
            "translate_scope_summary@7"
        );
    }

    #[test]
    fn result_message_has_header_and_blank_line() {
        let msg = result_message(Operation::KeyPoints, LanguageCode::En, "- a\n- b");
        assert_eq!(msg, "📌 Key points\n\n- a\n- b");
    }
}
