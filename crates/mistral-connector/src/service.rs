//! Services exposed to a host that owns conversation histories and settings.
//!
//! Each service wraps a [`Mistral`] client and one model id. Calls translate the
//! history, shape a [`ChatRequest`] and hand back either an
//! [`AssembledMessage`] or a lazy sequence of [`StreamDelta`]s.

use std::collections::BTreeMap;

use async_stream::try_stream;
use futures_util::{FutureExt, StreamExt, future::BoxFuture, stream::BoxStream};

use crate::{
    AssembledMessage, CancellationToken, ChatHistory, ChatRequest, CommonRequestError,
    EmbeddingsRequest, Mistral, MistralError, StreamAccumulator, StreamDelta,
    history::ConversationTurn,
    message::translate_history,
    settings::{CompletionKind, ExecutionSettings},
};

/// Attribute key holding the model id
pub const MODEL_ID_KEY: &str = "ModelId";

/// Chat completion over a caller-owned history.
pub trait ChatCompletionService: Send + Sync {
    /// Read-only service metadata such as [`MODEL_ID_KEY`].
    fn attributes(&self) -> &BTreeMap<String, String>;

    /// Complete the conversation in one call.
    fn generate_chat_response<'a>(
        &'a self,
        history: &'a ChatHistory,
        settings: Option<&'a ExecutionSettings>,
        cancel: CancellationToken,
    ) -> BoxFuture<'a, Result<AssembledMessage, MistralError>>;

    /// Stream the completion. Every delta is handed out as soon as it is parsed.
    ///
    /// Once the stream completes normally the assembled assistant turn is
    /// appended to `history`. Failures and cancellation leave it untouched.
    fn stream_chat_response<'a>(
        &'a self,
        history: &'a mut ChatHistory,
        settings: Option<&'a ExecutionSettings>,
        cancel: CancellationToken,
    ) -> BoxStream<'a, Result<StreamDelta, MistralError>>;
}

/// Completion of a single prompt string, routed through the chat endpoint.
pub trait TextGenerationService: Send + Sync {
    fn generate_text<'a>(
        &'a self,
        prompt: &'a str,
        settings: Option<&'a ExecutionSettings>,
        cancel: CancellationToken,
    ) -> BoxFuture<'a, Result<AssembledMessage, MistralError>>;

    fn stream_text<'a>(
        &'a self,
        prompt: &'a str,
        settings: Option<&'a ExecutionSettings>,
        cancel: CancellationToken,
    ) -> BoxStream<'a, Result<StreamDelta, MistralError>>;
}

pub trait TextEmbeddingService: Send + Sync {
    fn attributes(&self) -> &BTreeMap<String, String>;

    /// One vector per input text, in input order.
    fn generate_embeddings<'a>(
        &'a self,
        texts: &'a [String],
        cancel: CancellationToken,
    ) -> BoxFuture<'a, Result<Vec<Vec<f32>>, MistralError>>;
}

/// A token cancelled after the last delta still counts as a cancelled call.
fn ensure_not_cancelled(cancel: &CancellationToken) -> Result<(), CommonRequestError> {
    if cancel.is_cancelled() {
        tracing::debug!("stream cancelled, history left unchanged");
        return Err(CommonRequestError::Cancelled);
    }
    Ok(())
}

fn model_attributes(model: &str) -> BTreeMap<String, String> {
    let mut attributes = BTreeMap::new();
    if !model.is_empty() {
        attributes.insert(MODEL_ID_KEY.to_string(), model.to_string());
    }
    attributes
}

/// Chat and text generation against one Mistral chat model.
#[derive(Debug, Clone)]
pub struct MistralChatCompletion {
    client: Mistral,
    model: String,
    attributes: BTreeMap<String, String>,
}

impl MistralChatCompletion {
    pub fn new(model: impl Into<String>, client: Mistral) -> Self {
        let model = model.into();
        Self {
            attributes: model_attributes(&model),
            client,
            model,
        }
    }

    /// Build the service with a client configured from the environment.
    ///
    /// # Errors
    ///
    /// [`MistralError::MissingApiKey`] when `MISTRAL_API_KEY` is not set.
    pub fn from_env(model: impl Into<String>) -> Result<Self, MistralError> {
        Ok(Self::new(model, Mistral::load_from_env()?))
    }

    pub fn model_id(&self) -> &str {
        &self.model
    }

    fn chat_request<'t, I>(
        &self,
        turns: I,
        settings: Option<&ExecutionSettings>,
        kind: CompletionKind,
        stream: bool,
    ) -> Result<ChatRequest, MistralError>
    where
        I: IntoIterator<Item = &'t ConversationTurn>,
    {
        let messages = translate_history(turns)?;
        let settings = ExecutionSettings::resolve(settings);
        Ok(ChatRequest::from_settings(
            self.model.clone(),
            messages,
            &settings,
            kind,
            stream,
        ))
    }

    async fn complete<'t, I>(
        &self,
        turns: I,
        settings: Option<&ExecutionSettings>,
        kind: CompletionKind,
        cancel: &CancellationToken,
    ) -> Result<AssembledMessage, MistralError>
    where
        I: IntoIterator<Item = &'t ConversationTurn>,
    {
        let request = self.chat_request(turns, settings, kind, false)?;
        let response = self.client.send(&request, cancel).await?;
        let message = AssembledMessage::from_response(response)?;
        tracing::debug!(
            model_id = %message.model_id,
            finish_reason = message.finish_reason.as_deref().unwrap_or_default(),
            "chat response assembled"
        );
        Ok(message)
    }
}

impl ChatCompletionService for MistralChatCompletion {
    fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    fn generate_chat_response<'a>(
        &'a self,
        history: &'a ChatHistory,
        settings: Option<&'a ExecutionSettings>,
        cancel: CancellationToken,
    ) -> BoxFuture<'a, Result<AssembledMessage, MistralError>> {
        async move {
            tracing::info!(action = "generate_chat_response", model_id = %self.model, "action details");
            self.complete(history, settings, CompletionKind::Chat, &cancel)
                .await
        }
        .boxed()
    }

    fn stream_chat_response<'a>(
        &'a self,
        history: &'a mut ChatHistory,
        settings: Option<&'a ExecutionSettings>,
        cancel: CancellationToken,
    ) -> BoxStream<'a, Result<StreamDelta, MistralError>> {
        let stream = try_stream! {
            tracing::info!(action = "stream_chat_response", model_id = %self.model, "action details");

            let request = self.chat_request(&*history, settings, CompletionKind::Chat, true)?;
            let mut deltas = self.client.stream(&request, cancel.clone());
            let mut accumulator = StreamAccumulator::new();

            while let Some(delta) = deltas.next().await {
                let delta = delta?;
                accumulator.push(&delta);
                yield delta;
            }

            ensure_not_cancelled(&cancel)?;

            history.push(accumulator.finish(&self.model));
        };

        Box::pin(stream)
    }
}

impl TextGenerationService for MistralChatCompletion {
    fn generate_text<'a>(
        &'a self,
        prompt: &'a str,
        settings: Option<&'a ExecutionSettings>,
        cancel: CancellationToken,
    ) -> BoxFuture<'a, Result<AssembledMessage, MistralError>> {
        async move {
            tracing::info!(action = "generate_text", model_id = %self.model, "action details");
            let turn = ConversationTurn::user(prompt);
            self.complete([&turn], settings, CompletionKind::Text, &cancel)
                .await
        }
        .boxed()
    }

    fn stream_text<'a>(
        &'a self,
        prompt: &'a str,
        settings: Option<&'a ExecutionSettings>,
        cancel: CancellationToken,
    ) -> BoxStream<'a, Result<StreamDelta, MistralError>> {
        let stream = try_stream! {
            tracing::info!(action = "stream_text", model_id = %self.model, "action details");

            let turn = ConversationTurn::user(prompt);
            let request = self.chat_request([&turn], settings, CompletionKind::Text, true)?;
            let mut deltas = self.client.stream(&request, cancel);

            while let Some(delta) = deltas.next().await {
                yield delta?;
            }
        };

        Box::pin(stream)
    }
}

/// Text embeddings from one Mistral embedding model.
#[derive(Debug, Clone)]
pub struct MistralTextEmbedding {
    client: Mistral,
    model: String,
    attributes: BTreeMap<String, String>,
}

impl MistralTextEmbedding {
    pub fn new(model: impl Into<String>, client: Mistral) -> Self {
        let model = model.into();
        Self {
            attributes: model_attributes(&model),
            client,
            model,
        }
    }

    /// # Errors
    ///
    /// [`MistralError::MissingApiKey`] when `MISTRAL_API_KEY` is not set.
    pub fn from_env(model: impl Into<String>) -> Result<Self, MistralError> {
        Ok(Self::new(model, Mistral::load_from_env()?))
    }

    pub fn model_id(&self) -> &str {
        &self.model
    }
}

impl TextEmbeddingService for MistralTextEmbedding {
    fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    fn generate_embeddings<'a>(
        &'a self,
        texts: &'a [String],
        cancel: CancellationToken,
    ) -> BoxFuture<'a, Result<Vec<Vec<f32>>, MistralError>> {
        async move {
            tracing::info!(action = "generate_embeddings", model_id = %self.model, count = texts.len(), "action details");

            if texts.is_empty() {
                return Ok(Vec::new());
            }

            let request = EmbeddingsRequest::builder()
                .model(self.model.clone())
                .input(texts.to_vec())
                .build();
            let response = self.client.create_embeddings(&request, &cancel).await?;

            let mut data = response.data;
            if data.len() != texts.len() {
                return Err(MistralError::ResponseShape(format!(
                    "expected {} embeddings, got {}",
                    texts.len(),
                    data.len()
                )));
            }
            data.sort_by_key(|item| item.index);

            Ok(data.into_iter().map(|item| item.embedding).collect())
        }
        .boxed()
    }
}
