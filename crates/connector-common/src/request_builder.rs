use crate::{
    error::{self, CommonRequestError},
    streaming::LineEventParser,
};
use reqwest::{Method, RequestBuilder as ReqwestRequestBuilder, Response};
use serde::{Serialize, de::DeserializeOwned};
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;

/// Authentication method for API requests
#[derive(Clone)]
pub enum AuthMethod {
    /// Bearer token authentication (Authorization: Bearer <token>)
    Bearer(String),
    /// API key header (e.g., x-api-key: <key>)
    ApiKey { header_name: String, key: String },
}

impl std::fmt::Debug for AuthMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bearer(_) => f.debug_tuple("Bearer").field(&"[REDACTED]").finish(),
            Self::ApiKey { header_name, .. } => f
                .debug_struct("ApiKey")
                .field("header_name", header_name)
                .field("key", &"[REDACTED]")
                .finish(),
        }
    }
}

/// Represents an API endpoint with its configuration
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub path: String,
    pub method: Method,
    pub extra_headers: Option<HashMap<String, String>>,
}

impl Endpoint {
    pub fn new(path: impl Into<String>, method: Method) -> Self {
        Self {
            path: path.into(),
            method,
            extra_headers: None,
        }
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(path, Method::POST)
    }

    #[must_use]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value.into());
        self
    }
}

/// Configuration for request building
#[derive(Debug, Clone)]
pub struct RequestConfig {
    pub base_url: String,
    pub auth: Option<AuthMethod>,
    pub default_headers: HashMap<String, String>,
    pub user_agent: Option<String>,
}

impl RequestConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            auth: None,
            default_headers: HashMap::new(),
            user_agent: None,
        }
    }

    #[must_use]
    pub fn with_auth(mut self, auth: AuthMethod) -> Self {
        self.auth = Some(auth);
        self
    }

    #[must_use]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Full URL for an endpoint path
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Executes authenticated JSON requests against one API.
///
/// The `reqwest::Client` is shared and never mutated: credentials and headers
/// are attached to each outgoing request, so concurrent calls cannot observe
/// each other's state.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    client: reqwest::Client,
    config: RequestConfig,
}

impl RequestBuilder {
    pub fn new(client: reqwest::Client, config: RequestConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &RequestConfig {
        &self.config
    }

    /// Build a reqwest RequestBuilder for the given endpoint
    pub fn build_request(&self, endpoint: &Endpoint) -> ReqwestRequestBuilder {
        let url = self.config.url(&endpoint.path);
        let mut req = self.client.request(endpoint.method.clone(), &url);

        if let Some(ref auth) = self.config.auth {
            req = match auth {
                AuthMethod::Bearer(token) => req.bearer_auth(token),
                AuthMethod::ApiKey { header_name, key } => req.header(header_name, key),
            };
        }

        // Endpoint headers replace defaults of the same name.
        let overrides = endpoint.extra_headers.as_ref();
        for (key, value) in &self.config.default_headers {
            if overrides.is_some_and(|h| h.keys().any(|k| k.eq_ignore_ascii_case(key))) {
                continue;
            }
            req = req.header(key, value);
        }

        if let Some(headers) = overrides {
            for (key, value) in headers {
                req = req.header(key, value);
            }
        }

        if let Some(ref user_agent) = self.config.user_agent {
            req = req.header(reqwest::header::USER_AGENT, user_agent);
        }

        req
    }

    /// Send a request with an optional JSON body.
    ///
    /// Any 2xx response is returned untouched. Anything else has its full body
    /// read and is turned into [`CommonRequestError::Status`]; nothing is retried.
    pub async fn send<B: Serialize + ?Sized>(
        &self,
        endpoint: &Endpoint,
        body: Option<&B>,
        cancel: &CancellationToken,
    ) -> Result<Response, CommonRequestError> {
        if cancel.is_cancelled() {
            return Err(CommonRequestError::Cancelled);
        }

        let mut req = self.build_request(endpoint);
        if let Some(body) = body {
            req = req.json(body);
        }

        tracing::debug!(method = %endpoint.method, path = %endpoint.path, "sending request");

        let response = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(CommonRequestError::Cancelled),
            response = req.send() => response?,
        };

        let status = response.status();
        tracing::debug!(status = status.as_u16(), path = %endpoint.path, "response received");

        if status.is_success() {
            return Ok(response);
        }

        let bytes = read_body(response, cancel).await?;
        tracing::warn!(status = status.as_u16(), path = %endpoint.path, "request failed");
        Err(error::parse_error_response(status, &bytes))
    }

    /// Send a request and decode the JSON response body.
    pub async fn request_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        endpoint: &Endpoint,
        body: Option<&B>,
        cancel: &CancellationToken,
    ) -> Result<T, CommonRequestError> {
        let response = self.send(endpoint, body, cancel).await?;
        let status = response.status();
        let bytes = read_body(response, cancel).await?;

        serde_json::from_slice::<T>(&bytes).map_err(|e| {
            CommonRequestError::UnexpectedResponse(format!(
                "HTTP {} but failed to decode JSON: {}; body: {}",
                status.as_u16(),
                e,
                String::from_utf8_lossy(&bytes)
            ))
        })
    }

    /// Send a request and hand the successful response body to a line event parser.
    pub async fn open_stream<B: Serialize + ?Sized>(
        &self,
        endpoint: &Endpoint,
        body: Option<&B>,
        cancel: &CancellationToken,
    ) -> Result<LineEventParser, CommonRequestError> {
        let response = self.send(endpoint, body, cancel).await?;
        Ok(LineEventParser::new(response, cancel.clone()))
    }
}

/// Read a whole response body, giving up early if the call is cancelled
async fn read_body(
    response: Response,
    cancel: &CancellationToken,
) -> Result<bytes::Bytes, CommonRequestError> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(CommonRequestError::Cancelled),
        bytes = response.bytes() => Ok(bytes?),
    }
}
