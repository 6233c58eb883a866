use crate::error::CommonRequestError;
use bytes::Bytes;
use futures_util::{
    Stream, StreamExt,
    stream::{self, BoxStream},
};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

/// Framing prefix stripped from event lines before decoding
pub const DATA_PREFIX: &str = "data: ";

/// Payload some servers send as an explicit end-of-stream marker
pub const DONE_MARKER: &str = "[DONE]";

/// Incremental parser for newline-delimited event streams.
///
/// Bytes are pulled from the underlying stream only when no complete line is
/// buffered, so each event is decoded and handed out before the next read.
/// Lines may be split across chunks arbitrarily; an incomplete tail is kept
/// until its newline arrives (or the stream ends).
///
/// The parser owns the byte stream and releases the response body as soon as
/// the stream is exhausted, ends on `[DONE]`, fails or is cancelled, or when
/// [`LineEventParser::release`] is called.
pub struct LineEventParser {
    byte_stream: BoxStream<'static, Result<Bytes, CommonRequestError>>,
    buffer: Vec<u8>,
    exhausted: bool,
    released: bool,
    cancel: CancellationToken,
}

impl std::fmt::Debug for LineEventParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineEventParser")
            .field("buffered", &self.buffer.len())
            .field("exhausted", &self.exhausted)
            .field("released", &self.released)
            .finish_non_exhaustive()
    }
}

impl LineEventParser {
    /// Parse the body of a successful streaming response.
    pub fn new(response: reqwest::Response, cancel: CancellationToken) -> Self {
        Self::from_stream(response.bytes_stream(), cancel)
    }

    /// Parse an arbitrary byte stream.
    pub fn from_stream<S, E>(stream: S, cancel: CancellationToken) -> Self
    where
        S: Stream<Item = Result<Bytes, E>> + Send + 'static,
        E: Into<CommonRequestError>,
    {
        Self {
            byte_stream: stream.map(|chunk| chunk.map_err(Into::into)).boxed(),
            buffer: Vec::new(),
            exhausted: false,
            released: false,
            cancel,
        }
    }

    /// Fail with [`CommonRequestError::Cancelled`] if the call was cancelled,
    /// releasing the body first.
    pub fn check_cancelled(&mut self) -> Result<(), CommonRequestError> {
        if self.cancel.is_cancelled() {
            self.release();
            return Err(CommonRequestError::Cancelled);
        }
        Ok(())
    }

    /// Drop the underlying byte stream, closing the response body.
    ///
    /// Buffered data is discarded and every later read reports end of stream.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.byte_stream = stream::empty::<Result<Bytes, CommonRequestError>>().boxed();
        self.buffer.clear();
        self.exhausted = true;
        self.released = true;
        tracing::debug!("event stream body released");
    }

    /// Whether the response body has been dropped.
    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Next raw line, without its terminator. `None` once the stream is exhausted.
    ///
    /// Cancellation is checked before every read from the underlying stream.
    /// Exhaustion, cancellation and read failures all release the body.
    pub async fn next_line(&mut self) -> Result<Option<String>, CommonRequestError> {
        let line = self.read_line().await;
        if line.is_err() {
            self.release();
        }
        line
    }

    async fn read_line(&mut self) -> Result<Option<String>, CommonRequestError> {
        loop {
            self.check_cancelled()?;

            if let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
                let mut line = self.buffer.drain(..=pos).collect::<Vec<u8>>();
                line.pop();
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                return Ok(Some(String::from_utf8(line)?));
            }

            if self.exhausted {
                if self.buffer.is_empty() {
                    self.release();
                    return Ok(None);
                }
                let line = String::from_utf8(std::mem::take(&mut self.buffer))?;
                return Ok(Some(line));
            }

            let chunk = tokio::select! {
                biased;
                () = self.cancel.cancelled() => return Err(CommonRequestError::Cancelled),
                chunk = self.byte_stream.next() => chunk,
            };

            match chunk {
                Some(chunk) => self.buffer.extend_from_slice(&chunk?),
                None => self.exhausted = true,
            }
        }
    }

    /// Next decoded event payload. `None` at end of stream or on the `[DONE]` marker.
    ///
    /// Empty lines are skipped. A leading `data: ` is stripped; lines without it
    /// are decoded as-is. A payload that fails to decode is a fatal error.
    pub async fn next_event<T: DeserializeOwned>(
        &mut self,
    ) -> Result<Option<T>, CommonRequestError> {
        while let Some(line) = self.next_line().await? {
            let Some(payload) = event_payload(&line) else {
                continue;
            };

            if payload == DONE_MARKER {
                tracing::debug!("event stream reached end marker");
                self.release();
                return Ok(None);
            }

            tracing::trace!(payload, "decoding stream event");
            return match serde_json::from_str(payload) {
                Ok(event) => Ok(Some(event)),
                Err(e) => {
                    self.release();
                    Err(CommonRequestError::InvalidEventData(format!(
                        "JSON parse error: {e}; line: {line}"
                    )))
                }
            };
        }

        Ok(None)
    }
}

/// Payload of one event line, or `None` for lines that carry nothing.
fn event_payload(line: &str) -> Option<&str> {
    if line.trim().is_empty() {
        return None;
    }
    // Surrounding whitespace is trimmed on purpose; it is never part of a JSON payload.
    let payload = line.strip_prefix(DATA_PREFIX).unwrap_or(line).trim();
    (!payload.is_empty()).then_some(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;
    use serde_json::Value;

    fn parser(chunks: &[&'static str]) -> LineEventParser {
        let chunks: Vec<Result<Bytes, CommonRequestError>> = chunks
            .iter()
            .map(|chunk| Ok(Bytes::from_static(chunk.as_bytes())))
            .collect();
        LineEventParser::from_stream(stream::iter(chunks), CancellationToken::new())
    }

    #[tokio::test]
    async fn strips_prefix_and_skips_empty_lines() {
        let mut parser = parser(&["data: {\"a\":1}\n\n", "\r\n{\"a\":2}\n"]);

        let first: Value = parser.next_event().await.unwrap().unwrap();
        let second: Value = parser.next_event().await.unwrap().unwrap();
        assert_eq!(first["a"], 1);
        assert_eq!(second["a"], 2);
        assert!(parser.next_event::<Value>().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn joins_lines_split_across_chunks() {
        let mut parser = parser(&["data: {\"text\":", "\"hel", "lo\"}\r", "\ndata: {\"text\":\"x\"}"]);

        let first: Value = parser.next_event().await.unwrap().unwrap();
        assert_eq!(first["text"], "hello");

        // Unterminated final line is still decoded once the stream ends.
        let second: Value = parser.next_event().await.unwrap().unwrap();
        assert_eq!(second["text"], "x");
        assert!(parser.next_event::<Value>().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn stops_at_done_marker() {
        let mut parser = parser(&["data: {\"n\":1}\n", "data: [DONE]\n", "data: {\"n\":2}\n"]);

        assert!(parser.next_event::<Value>().await.unwrap().is_some());
        assert!(parser.next_event::<Value>().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn invalid_json_is_fatal() {
        let mut parser = parser(&["data: {not json}\n", "data: {\"n\":1}\n"]);

        let err = parser.next_event::<Value>().await.unwrap_err();
        assert!(matches!(err, CommonRequestError::InvalidEventData(_)));
    }

    #[tokio::test]
    async fn observes_cancellation_between_reads() {
        let cancel = CancellationToken::new();
        let chunks: Vec<Result<Bytes, CommonRequestError>> = vec![
            Ok(Bytes::from_static(b"{\"n\":1}\n")),
            Ok(Bytes::from_static(b"{\"n\":2}\n")),
        ];
        let mut parser = LineEventParser::from_stream(stream::iter(chunks), cancel.clone());

        assert!(parser.next_event::<Value>().await.unwrap().is_some());
        cancel.cancel();
        let err = parser.next_event::<Value>().await.unwrap_err();
        assert!(matches!(err, CommonRequestError::Cancelled));
    }

    #[test]
    fn event_payload_framing() {
        assert_eq!(event_payload(""), None);
        assert_eq!(event_payload("   "), None);
        assert_eq!(event_payload("data: {}"), Some("{}"));
        assert_eq!(event_payload("{}"), Some("{}"));
        assert_eq!(event_payload("data: "), None);
    }

    #[tokio::test]
    async fn releases_body_on_done_marker() {
        let mut parser = parser(&["data: {\"n\":1}\n", "data: [DONE]\n", "data: {\"n\":2}\n"]);

        assert!(parser.next_event::<Value>().await.unwrap().is_some());
        assert!(!parser.is_released());
        assert!(parser.next_event::<Value>().await.unwrap().is_none());
        assert!(parser.is_released());
        assert!(parser.next_line().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn releases_body_on_failure_and_cancellation() {
        let mut parser = parser(&["data: {not json}\n"]);
        assert!(parser.next_event::<Value>().await.is_err());
        assert!(parser.is_released());

        let cancel = CancellationToken::new();
        let mut parser = LineEventParser::from_stream(
            stream::iter(vec![Ok::<_, CommonRequestError>(Bytes::from_static(b"{}\n"))]),
            cancel.clone(),
        );
        cancel.cancel();
        assert!(matches!(parser.check_cancelled(), Err(CommonRequestError::Cancelled)));
        assert!(parser.is_released());
    }
}
