use bon::Builder;
use serde::{Deserialize, Serialize};

use crate::{
    message::WireMessage,
    settings::{CompletionKind, ExecutionSettings, MAX_SAMPLING, MIN_SAMPLING, clamp},
    tool::Tool,
};

/// Body of a `v1/chat/completions` call.
///
/// Built through [`ChatRequest::from_settings`], which clamps sampling values
/// and fills in defaults, so what serializes here is always in range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<WireMessage>,
    pub stream: bool,
    pub safe_prompt: bool,
    pub temperature: f64,
    pub top_p: f64,
    pub max_tokens: Option<u32>,
    pub random_seed: Option<i64>,
    /// Always present, empty when no tools are offered
    pub tools: Vec<Tool>,
}

impl ChatRequest {
    /// Merge translated messages with execution settings into a wire request.
    pub fn from_settings(
        model: impl Into<String>,
        messages: Vec<WireMessage>,
        settings: &ExecutionSettings,
        kind: CompletionKind,
        stream: bool,
    ) -> Self {
        Self {
            model: model.into(),
            messages,
            stream,
            safe_prompt: settings.safe_prompt,
            temperature: clamp(settings.temperature, MIN_SAMPLING, MAX_SAMPLING),
            top_p: clamp(settings.top_p, MIN_SAMPLING, MAX_SAMPLING),
            max_tokens: Some(settings.max_tokens.unwrap_or_else(|| kind.default_max_tokens())),
            random_seed: settings.seed,
            tools: settings.tools.iter().cloned().map(Tool::from).collect(),
        }
    }
}

/// Body of a `v1/embeddings` call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder)]
pub struct EmbeddingsRequest {
    #[builder(into)]
    pub model: String,
    /// Texts to embed, one vector is returned per entry
    #[builder(into)]
    pub input: Vec<String>,
}
