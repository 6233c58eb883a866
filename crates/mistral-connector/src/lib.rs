#![cfg_attr(not(test), deny(unsafe_code))]
#![warn(clippy::pedantic, clippy::unwrap_used)]

//! Mistral chat completion, streaming chat and embedding connector.
//!
//! [`Mistral`] is the raw client over the HTTP endpoints. The services in
//! [`service`] adapt it to conversation histories and execution settings.

pub mod content;
pub mod error;
pub mod history;
mod internal;
pub mod message;
pub mod model;
pub mod request;
pub mod response;
pub mod service;
pub mod settings;
pub mod stream;
pub mod tool;

pub use content::{AssembledMessage, StreamAccumulator};
pub use error::{CommonRequestError, MistralError};
pub use history::{AuthorRole, ChatHistory, ConversationTurn};
pub use message::{WireMessage, WireRole, translate_history};
pub use model::Model;
pub use request::{ChatRequest, EmbeddingsRequest};
pub use response::{
    ChatCompletionChunk, ChatResponse, Choice, EmbeddingData, EmbeddingsResponse, Usage,
};
pub use service::{
    ChatCompletionService, MODEL_ID_KEY, MistralChatCompletion, MistralTextEmbedding,
    TextEmbeddingService, TextGenerationService,
};
pub use settings::{CompletionKind, ExecutionSettings};
pub use stream::StreamDelta;
pub use tool::{FunctionDefinition, Tool, ToolCall};

pub use connector_common::CancellationToken;

use bon::Builder;
use core::fmt;
use futures_util::stream::BoxStream;
#[cfg(feature = "leaky-bucket")]
use leaky_bucket::RateLimiter;
#[cfg(feature = "leaky-bucket")]
use std::sync::Arc;

use crate::internal::MistralRequestHelper;

pub const BASE_URL: &str = "https://api.mistral.ai";

const API_KEY_VAR: &str = "MISTRAL_API_KEY";
const BASE_URL_VAR: &str = "MISTRAL_BASE_URL";

/// Client for the Mistral HTTP API.
///
/// Holds one static API key. The `reqwest::Client` is shared, never mutated,
/// and may be supplied by the caller.
#[derive(Clone, Builder)]
pub struct Mistral {
    #[builder(into)]
    pub(crate) api_key: String,
    #[builder(default)]
    pub(crate) client: reqwest::Client,
    #[cfg(feature = "leaky-bucket")]
    pub(crate) leaky_bucket: Option<Arc<RateLimiter>>,
    #[builder(default = BASE_URL.to_string(), into)]
    pub(crate) base_url: String,
}

impl Mistral {
    /// Create a new Mistral client with the provided API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            client: reqwest::Client::new(),
            #[cfg(feature = "leaky-bucket")]
            leaky_bucket: None,
            base_url: BASE_URL.to_string(),
        }
    }

    /// Build a client from `MISTRAL_API_KEY` and, if set, `MISTRAL_BASE_URL`.
    ///
    /// # Errors
    ///
    /// [`MistralError::MissingApiKey`] when the key is unset or empty.
    pub fn load_from_env() -> Result<Self, MistralError> {
        let api_key = std::env::var(API_KEY_VAR)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or(MistralError::MissingApiKey)?;

        let client = match std::env::var(BASE_URL_VAR) {
            Ok(base_url) if !base_url.trim().is_empty() => {
                Self::builder().api_key(api_key).base_url(base_url).build()
            }
            _ => Self::builder().api_key(api_key).build(),
        };
        Ok(client)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request_helper(&self) -> MistralRequestHelper {
        MistralRequestHelper::new(self.client.clone(), &self.base_url, &self.api_key)
    }

    #[cfg(feature = "leaky-bucket")]
    async fn throttle(&self) {
        if let Some(ref limiter) = self.leaky_bucket {
            limiter.acquire_one().await;
        }
    }

    #[cfg(not(feature = "leaky-bucket"))]
    #[allow(clippy::unused_async)]
    async fn throttle(&self) {}
}

impl Mistral {
    /// Send a non-streaming chat completion request.
    ///
    /// # Errors
    ///
    /// Transport failures, non-2xx statuses, undecodable bodies and cancellation.
    pub async fn send(
        &self,
        request: &ChatRequest,
        cancel: &CancellationToken,
    ) -> Result<ChatResponse, MistralError> {
        self.throttle().await;
        self.request_helper().send_chat_request(request, cancel).await
    }

    /// Stream a chat completion as lazily parsed deltas.
    ///
    /// The request is sent with `stream: true` regardless of the flag on `request`.
    pub fn stream(
        &self,
        request: &ChatRequest,
        cancel: CancellationToken,
    ) -> BoxStream<'static, Result<StreamDelta, MistralError>> {
        use async_stream::try_stream;
        use futures_util::StreamExt;

        let helper = self.request_helper();
        let mut request_data = request.clone();
        request_data.stream = true;
        let client = self.clone();

        Box::pin(try_stream! {
            client.throttle().await;

            let mut stream = helper.stream_chat_request(request_data, cancel);
            while let Some(result) = stream.next().await {
                yield result?;
            }
        })
    }

    /// Create embeddings
    ///
    /// # Errors
    ///
    /// Transport failures, non-2xx statuses, undecodable bodies and cancellation.
    pub async fn create_embeddings(
        &self,
        request: &EmbeddingsRequest,
        cancel: &CancellationToken,
    ) -> Result<EmbeddingsResponse, MistralError> {
        self.throttle().await;
        self.request_helper().create_embeddings(request, cancel).await
    }
}

impl fmt::Debug for Mistral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mistral")
            .field("api_key", &"[REDACTED]")
            .field("client", &self.client)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}
