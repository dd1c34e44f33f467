//! Conversation layer: what the user sees and which document a click means.
//!
//! - [`action`]   inbound events, outbound effects, the button-action codec
//! - [`messages`] localized notices, menus and result headers
//! - [`store`]    per-user [`store::Session`] state and the [`store::SessionStore`]
//! - [`machine`]  [`machine::DocumentAssistant`], the transition table

pub mod action;
pub mod machine;
pub mod messages;
pub mod store;
