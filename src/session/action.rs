//! Inbound events, outbound effects, and the button-action codec.
//!
//! Button callbacks arrive as flat strings. They are decoded exactly once,
//! here, into an [`ActionRef`]; the state machine only ever matches on the
//! structured [`ActionKind`].
//!
//! Menus produced by the assistant tag every action with the id of the
//! document they were rendered for (`summary_short@17`), so a press on a menu
//! belonging to a replaced document is detected instead of silently applied
//! to the new one. Untagged ids are accepted as well.

use crate::language::TargetLanguage;
use crate::pipeline::transform::Operation;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Stable identifier of an end user, as provided by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of one uploaded document, unique within a session store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentId(pub u64);

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An event delivered by the chat transport.
#[derive(Debug, Clone)]
pub enum Inbound {
    DocumentReceived {
        bytes: Vec<u8>,
        mime_type: Option<String>,
    },
    ButtonPressed {
        action_id: String,
    },
    TextReceived {
        content: String,
    },
}

/// An effect for the chat transport to deliver, in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Outbound {
    Text(String),
    Menu(MenuSpec),
}

/// A declarative menu: a prompt and ordered `(label, action id)` buttons.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuSpec {
    pub prompt: String,
    pub options: Vec<MenuOption>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuOption {
    pub label: String,
    pub action_id: String,
}

/// Which text a translation applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TranslateScope {
    FullDocument,
    /// The last artifact produced for the current document.
    Summary,
}

/// A decoded button action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    /// Run a summary-family operation on the full document.
    Transform(Operation),
    /// Open the translation scope submenu.
    TranslateMenu,
    TranslateScope(TranslateScope),
    TranslateTo(TargetLanguage),
}

impl ActionKind {
    /// The wire id of this action, without a document tag.
    pub fn id(&self) -> String {
        match self {
            ActionKind::Transform(Operation::ShortSummary) => "summary_short".into(),
            ActionKind::Transform(Operation::LongSummary) => "summary_long".into(),
            ActionKind::Transform(Operation::KeyPoints) => "key_points".into(),
            ActionKind::Transform(Operation::SimpleExplanation) => "simple_explanation".into(),
            ActionKind::Transform(Operation::Translate(t)) | ActionKind::TranslateTo(t) => {
                format!("translate_lang_{}", t.code())
            }
            ActionKind::TranslateMenu => "translate_menu".into(),
            ActionKind::TranslateScope(TranslateScope::FullDocument) => {
                "translate_scope_full".into()
            }
            ActionKind::TranslateScope(TranslateScope::Summary) => "translate_scope_summary".into(),
        }
    }
}

impl FromStr for ActionKind {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let kind = match s {
            "summary_short" => ActionKind::Transform(Operation::ShortSummary),
            "summary_long" => ActionKind::Transform(Operation::LongSummary),
            "key_points" => ActionKind::Transform(Operation::KeyPoints),
            "simple_explanation" => ActionKind::Transform(Operation::SimpleExplanation),
            "translate_menu" => ActionKind::TranslateMenu,
            "translate_scope_full" => ActionKind::TranslateScope(TranslateScope::FullDocument),
            "translate_scope_summary" => ActionKind::TranslateScope(TranslateScope::Summary),
            other => other
                .strip_prefix("translate_lang_")
                .and_then(TargetLanguage::from_code)
                .map(ActionKind::TranslateTo)
                .ok_or_else(|| UnknownAction(s.to_string()))?,
        };
        Ok(kind)
    }
}

/// A callback string that does not name any known action.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown action id '{0}'")]
pub struct UnknownAction(pub String);

/// A decoded action plus the document its menu was rendered for, if tagged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionRef {
    pub kind: ActionKind,
    pub document: Option<DocumentId>,
}

impl ActionRef {
    pub fn new(kind: ActionKind, document: DocumentId) -> Self {
        Self {
            kind,
            document: Some(document),
        }
    }

    /// Decode `action` or `action@<document id>`.
    pub fn parse(raw: &str) -> Result<Self, UnknownAction> {
        let raw = raw.trim();
        let (id, document) = match raw.split_once('@') {
            Some((id, doc)) => {
                let doc = doc
                    .parse::<u64>()
                    .map_err(|_| UnknownAction(raw.to_string()))?;
                (id, Some(DocumentId(doc)))
            }
            None => (raw, None),
        };
        Ok(Self {
            kind: id.parse()?,
            document,
        })
    }

    /// Encode for use as button callback data.
    pub fn encode(&self) -> String {
        match self.document {
            Some(doc) => format!("{}@{}", self.kind.id(), doc),
            None => self.kind.id(),
        }
    }
}
