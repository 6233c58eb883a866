use serde::{Deserialize, Serialize};

use crate::{
    error::MistralError,
    history::{AuthorRole, ConversationTurn},
};

/// Roles accepted by the chat endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireRole {
    System,
    User,
    Assistant,
}

impl From<AuthorRole> for WireRole {
    /// Tool results have no role of their own on the wire and are sent as assistant turns.
    fn from(role: AuthorRole) -> Self {
        match role {
            AuthorRole::System => Self::System,
            AuthorRole::User => Self::User,
            AuthorRole::Assistant | AuthorRole::Tool => Self::Assistant,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireMessage {
    pub role: WireRole,
    pub content: String,
}

impl WireMessage {
    pub fn new(role: WireRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(WireRole::User, content)
    }
}

impl From<&ConversationTurn> for WireMessage {
    fn from(turn: &ConversationTurn) -> Self {
        Self::new(turn.role.into(), turn.text.clone())
    }
}

/// Translate a conversation into the chat endpoint's message list.
///
/// The endpoint rejects requests that do not end on a user turn (a templated
/// prompt often produces a lone system turn), so the final message is always
/// sent with the user role.
///
/// # Errors
///
/// [`MistralError::EmptyHistory`] when there is nothing to send.
pub fn translate_history<'a, I>(turns: I) -> Result<Vec<WireMessage>, MistralError>
where
    I: IntoIterator<Item = &'a ConversationTurn>,
{
    let mut messages: Vec<WireMessage> = turns.into_iter().map(WireMessage::from).collect();

    let Some(last) = messages.last_mut() else {
        return Err(MistralError::EmptyHistory);
    };
    if last.role != WireRole::User {
        tracing::debug!(role = ?last.role, "coercing trailing message role to user");
        last.role = WireRole::User;
    }

    Ok(messages)
}
