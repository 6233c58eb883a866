use thiserror::Error;

/// Errors raised by the shared transport and stream plumbing
#[derive(Error, Debug)]
pub enum CommonRequestError {
    /// The HTTP exchange itself failed (connect, TLS, body read)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status
    #[error("HTTP {status}: {}", status_detail(.message, .body))]
    Status {
        status: u16,
        reason: Option<String>,
        body: String,
        message: Option<String>,
    },

    /// JSON serialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A stream line could not be decoded into the expected event shape
    #[error("Invalid event data: {0}")]
    InvalidEventData(String),

    /// A successful response body did not have the expected shape
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    /// UTF-8 conversion error
    #[error("UTF-8 conversion error: {0}")]
    Utf8Error(#[from] std::string::FromUtf8Error),

    /// The caller cancelled the in-flight call
    #[error("Request was cancelled")]
    Cancelled,
}

impl CommonRequestError {
    /// Status code of a non-success response, if this is one.
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Raw body of a non-success response, if this is one.
    #[must_use]
    pub fn raw_body(&self) -> Option<&str> {
        match self {
            Self::Status { body, .. } => Some(body),
            _ => None,
        }
    }
}

fn status_detail<'a>(message: &'a Option<String>, body: &'a str) -> &'a str {
    message.as_deref().unwrap_or(body)
}

/// Build a [`CommonRequestError::Status`] from a failed response's status and full body.
pub fn parse_error_response(status: reqwest::StatusCode, body: &[u8]) -> CommonRequestError {
    let message = serde_json::from_slice::<serde_json::Value>(body)
        .ok()
        .and_then(|json| extract_error_message(&json));

    CommonRequestError::Status {
        status: status.as_u16(),
        reason: status.canonical_reason().map(str::to_string),
        body: String::from_utf8_lossy(body).into_owned(),
        message,
    }
}

/// Extract a human readable message from the usual JSON error layouts
fn extract_error_message(json: &serde_json::Value) -> Option<String> {
    // {"error": {"message": "..."}}
    if let Some(message) = json
        .get("error")
        .and_then(|error| error.get("message"))
        .and_then(serde_json::Value::as_str)
    {
        return Some(message.to_string());
    }

    // {"error": "..."}
    if let Some(message) = json.get("error").and_then(serde_json::Value::as_str) {
        return Some(message.to_string());
    }

    // {"message": "..."}
    json.get("message")
        .and_then(serde_json::Value::as_str)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn keeps_raw_body_and_status() {
        let err = parse_error_response(StatusCode::UNAUTHORIZED, br#"{"error":"invalid key"}"#);

        assert_eq!(err.status_code(), Some(401));
        assert!(err.raw_body().unwrap().contains("invalid key"));
        match err {
            CommonRequestError::Status { reason, message, .. } => {
                assert_eq!(reason.as_deref(), Some("Unauthorized"));
                assert_eq!(message.as_deref(), Some("invalid key"));
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[test]
    fn extracts_nested_message() {
        let err = parse_error_response(
            StatusCode::BAD_REQUEST,
            br#"{"object":"error","error":{"message":"bad model","type":"invalid_request"}}"#,
        );
        assert_eq!(err.to_string(), "HTTP 400: bad model");
    }

    #[test]
    fn falls_back_to_raw_body_for_non_json() {
        let err = parse_error_response(StatusCode::BAD_GATEWAY, b"upstream down");
        assert_eq!(err.to_string(), "HTTP 502: upstream down");
        assert_eq!(err.raw_body(), Some("upstream down"));
    }
}
