use derive_more::{Deref, IntoIterator};
use serde::{Deserialize, Serialize};
use strum::{Display, IntoStaticStr};

/// Author of one turn in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, IntoStaticStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AuthorRole {
    System,
    User,
    Assistant,
    Tool,
}

/// One role-tagged message of a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: AuthorRole,
    pub text: String,
    /// Model that produced the turn, for assistant turns generated by a service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
}

impl ConversationTurn {
    pub fn new(role: AuthorRole, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            model_id: None,
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(AuthorRole::System, text)
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(AuthorRole::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(AuthorRole::Assistant, text)
    }

    pub fn tool(text: impl Into<String>) -> Self {
        Self::new(AuthorRole::Tool, text)
    }

    #[must_use]
    pub fn with_model_id(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = Some(model_id.into());
        self
    }
}

/// Ordered, caller-owned conversation history.
///
/// Services only read it, except for streaming chat which appends the
/// assembled assistant reply once the stream completes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Deref, IntoIterator)]
#[into_iterator(owned, ref)]
pub struct ChatHistory(Vec<ConversationTurn>);

impl ChatHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, turn: ConversationTurn) {
        self.0.push(turn);
    }

    pub fn add_message(&mut self, role: AuthorRole, text: impl Into<String>) {
        self.push(ConversationTurn::new(role, text));
    }

    pub fn add_system_message(&mut self, text: impl Into<String>) {
        self.add_message(AuthorRole::System, text);
    }

    pub fn add_user_message(&mut self, text: impl Into<String>) {
        self.add_message(AuthorRole::User, text);
    }

    pub fn add_assistant_message(&mut self, text: impl Into<String>) {
        self.add_message(AuthorRole::Assistant, text);
    }
}

impl From<Vec<ConversationTurn>> for ChatHistory {
    fn from(turns: Vec<ConversationTurn>) -> Self {
        Self(turns)
    }
}

impl FromIterator<ConversationTurn> for ChatHistory {
    fn from_iter<I: IntoIterator<Item = ConversationTurn>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
