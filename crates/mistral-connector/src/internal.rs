use crate::{
    ChatRequest, ChatResponse, EmbeddingsRequest, EmbeddingsResponse, MistralError,
    stream::{StreamDelta, delta_stream},
};
use async_stream::try_stream;
use connector_common::{
    CancellationToken,
    request_builder::{AuthMethod, Endpoint, RequestBuilder, RequestConfig},
};
use futures_util::{StreamExt, stream::BoxStream};

const CHAT_COMPLETIONS: &str = "v1/chat/completions";
const EMBEDDINGS: &str = "v1/embeddings";

/// Sent on every request
const USER_AGENT: &str = concat!("mistral-connector/", env!("CARGO_PKG_VERSION"));

/// Endpoint calls on top of the common request builder.
#[derive(Clone)]
pub struct MistralRequestHelper {
    request_builder: RequestBuilder,
}

impl std::fmt::Debug for MistralRequestHelper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MistralRequestHelper")
            .field("base_url", &self.request_builder.config().base_url)
            .finish_non_exhaustive()
    }
}

impl MistralRequestHelper {
    pub fn new(client: reqwest::Client, base_url: &str, api_key: &str) -> Self {
        let config = RequestConfig::new(base_url)
            .with_auth(AuthMethod::Bearer(api_key.to_string()))
            .with_header("accept", "application/json")
            .with_user_agent(USER_AGENT);

        Self {
            request_builder: RequestBuilder::new(client, config),
        }
    }

    /// Send a non-streaming chat completion request
    pub async fn send_chat_request(
        &self,
        request: &ChatRequest,
        cancel: &CancellationToken,
    ) -> Result<ChatResponse, MistralError> {
        let endpoint = Endpoint::post(CHAT_COMPLETIONS);

        Ok(self
            .request_builder
            .request_json(&endpoint, Some(request), cancel)
            .await?)
    }

    /// Stream a chat completion request.
    ///
    /// Nothing is sent until the stream is first polled. A non-2xx answer is
    /// the first and only item.
    pub fn stream_chat_request(
        &self,
        request: ChatRequest,
        cancel: CancellationToken,
    ) -> BoxStream<'static, Result<StreamDelta, MistralError>> {
        let helper = self.clone();
        let endpoint = Endpoint::post(CHAT_COMPLETIONS).with_header("accept", "text/event-stream");

        Box::pin(try_stream! {
            let parser = helper
                .request_builder
                .open_stream(&endpoint, Some(&request), &cancel)
                .await?;

            let mut deltas = delta_stream(parser);
            while let Some(delta) = deltas.next().await {
                yield delta?;
            }
        })
    }

    /// Generate embeddings
    pub async fn create_embeddings(
        &self,
        request: &EmbeddingsRequest,
        cancel: &CancellationToken,
    ) -> Result<EmbeddingsResponse, MistralError> {
        let endpoint = Endpoint::post(EMBEDDINGS);

        Ok(self
            .request_builder
            .request_json(&endpoint, Some(request), cancel)
            .await?)
    }
}
