//! Prompts for every completion the assistant issues.
//!
//! Centralising prompts here gives a single place to tune wording, and lets
//! unit tests inspect them without a live model. Prompts are written in the
//! assistant's default locale (Spanish); answers are steered into the user's
//! language by an explicit "respond in …" clause.

use crate::language::{LanguageCode, TargetLanguage};

/// Persona for summaries, key points and explanations.
pub const ANALYST_PERSONA: &str = "Eres un experto en análisis y resumen de textos. \
Respondes de forma clara y fiel al contenido, sin inventar información ni añadir comentarios sobre la tarea.";

/// Persona for language identification.
pub const CLASSIFIER_PERSONA: &str = "Eres un experto en identificación de idiomas. \
Respondes únicamente con lo que se te pide, sin explicaciones.";

/// Instruction for a five-line summary.
pub const SHORT_SUMMARY_INSTRUCTION: &str = "Resume este texto en 5 líneas:";

/// Instruction for a detailed summary.
pub const LONG_SUMMARY_INSTRUCTION: &str = "Haz un resumen detallado de este texto:";

/// Instruction for bullet-point key ideas.
pub const KEY_POINTS_INSTRUCTION: &str = "Extrae los puntos clave del texto en viñetas:";

/// Instruction for an explanation a child could follow.
pub const SIMPLE_EXPLANATION_INSTRUCTION: &str =
    "Explica este texto como si fuera para un niño de 10 años:";

/// Returned by the transform engine when the source has no text at all.
pub const NO_TEXT_SENTINEL: &str = "No se encontró texto extraíble en el documento.";

/// Label returned by document-language detection when it cannot decide.
pub const UNKNOWN_LANGUAGE_LABEL: &str = "unknown";

/// Persona for translation into `target`.
pub fn translator_persona(target: TargetLanguage) -> String {
    format!(
        "Eres un traductor profesional al {}. Traduces de forma fiel y natural, \
conservando el formato, los nombres propios y las cifras. Devuelves solo la traducción.",
        target.spanish_name()
    )
}

/// Instruction for translating a chunk into `target`.
pub fn translation_instruction(target: TargetLanguage) -> String {
    format!(
        "Traduce este texto al {} de forma clara y natural:",
        target.spanish_name()
    )
}

/// Append the "respond in the user's language" clause to an instruction.
pub fn in_user_language(instruction: &str, user_language: LanguageCode) -> String {
    format!(
        "{} (responde en {})",
        instruction.trim_end_matches(':'),
        user_language.spanish_name()
    ) + ":"
}

/// Inline marker substituted for a chunk whose translation failed.
pub fn translation_error_marker(chunk: usize, total: usize) -> String {
    format!("[Error al traducir la sección {chunk} de {total}]")
}

/// User prompt for one map-phase call.
pub fn map_prompt(instruction: &str, chunk: &str) -> String {
    format!("{instruction}\n\n{chunk}")
}

/// User prompt for one reduce-phase call merging ordered partial results.
pub fn merge_prompt(instruction: &str, partials: &[String]) -> String {
    let total = partials.len();
    let mut prompt = format!(
        "A continuación tienes {total} resultados parciales, en orden, obtenidos de fragmentos \
consecutivos de un mismo documento. Los cortes entre fragmentos pueden caer a mitad de frase. \
Combínalos en un único resultado coherente y sin repeticiones que cumpla esta instrucción original: \
«{}»\n",
        instruction.trim_end_matches(':')
    );
    for (i, partial) in partials.iter().enumerate() {
        prompt.push_str(&format!("\n--- Parte {} de {} ---\n{}\n", i + 1, total, partial));
    }
    prompt
}

/// User prompt asking for the free-form name of a document's language.
pub fn document_language_prompt(sample: &str) -> String {
    format!(
        "¿En qué idioma está escrito el siguiente texto? Responde solo con el nombre del idioma, \
en español y en una sola palabra.\n\n\"\"\"{sample}\"\"\""
    )
}

/// User prompt asking for exactly one supported language code.
pub fn user_language_prompt(sample: &str) -> String {
    format!(
        "Identifica el idioma del siguiente mensaje. Responde exactamente con uno de estos \
códigos y nada más: es, en, ru.\n\n\"\"\"{sample}\"\"\""
    )
}
