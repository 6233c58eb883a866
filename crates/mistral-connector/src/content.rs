use serde::{Deserialize, Serialize};

use crate::{
    MistralError,
    history::{AuthorRole, ConversationTurn},
    response::{ChatResponse, Usage},
    stream::StreamDelta,
    tool::ToolCall,
};

/// Choice treated as the result of a call
pub const PRIMARY_CHOICE: u32 = 0;

/// Final assistant message of a chat call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssembledMessage {
    pub role: AuthorRole,
    pub text: String,
    pub model_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

impl AssembledMessage {
    /// Build the message from the first choice of a non-streaming response.
    ///
    /// # Errors
    ///
    /// [`MistralError::ResponseShape`] when the response has no choices.
    pub fn from_response(response: ChatResponse) -> Result<Self, MistralError> {
        let ChatResponse {
            model,
            choices,
            usage,
            ..
        } = response;

        let choice = choices
            .into_iter()
            .next()
            .ok_or_else(|| MistralError::ResponseShape("response contained no choices".to_string()))?;

        Ok(Self {
            role: AuthorRole::Assistant,
            text: choice.message.content.unwrap_or_default(),
            model_id: model,
            usage,
            tool_calls: choice.message.tool_calls.unwrap_or_default(),
            finish_reason: choice.finish_reason,
        })
    }

    /// History turn for this message
    pub fn into_turn(self) -> ConversationTurn {
        let turn = ConversationTurn::assistant(self.text);
        if self.model_id.is_empty() {
            turn
        } else {
            turn.with_model_id(self.model_id)
        }
    }
}

/// Concatenates streamed fragments of the primary choice in arrival order.
#[derive(Debug, Clone, Default)]
pub struct StreamAccumulator {
    text: String,
    model_id: Option<String>,
    finish_reason: Option<String>,
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one delta in. Deltas for other choices are ignored.
    pub fn push(&mut self, delta: &StreamDelta) {
        if delta.choice_index != PRIMARY_CHOICE {
            return;
        }
        self.text.push_str(&delta.content);
        if let Some(model) = delta.model.as_deref().filter(|m| !m.is_empty()) {
            self.model_id.get_or_insert_with(|| model.to_string());
        }
        if delta.is_final() {
            self.finish_reason.clone_from(&delta.finish_reason);
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn finish_reason(&self) -> Option<&str> {
        self.finish_reason.as_deref()
    }

    /// Assistant turn holding the accumulated text. The model id reported by the
    /// stream wins over `fallback_model`.
    pub fn finish(self, fallback_model: &str) -> ConversationTurn {
        let model_id = self
            .model_id
            .unwrap_or_else(|| fallback_model.to_string());
        let turn = ConversationTurn::assistant(self.text);
        if model_id.is_empty() {
            turn
        } else {
            turn.with_model_id(model_id)
        }
    }
}
