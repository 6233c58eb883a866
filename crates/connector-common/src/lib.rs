#![cfg_attr(not(test), deny(unsafe_code))]
#![warn(clippy::pedantic, clippy::unwrap_used)]

//! Shared HTTP plumbing for chat connectors
//!
//! Authenticated JSON requests with status-code error mapping, and an
//! incremental parser for newline-delimited event streams. Both observe a
//! caller supplied [`CancellationToken`].

pub mod error;
pub mod request_builder;
pub mod streaming;

pub use error::CommonRequestError;
pub use request_builder::{AuthMethod, Endpoint, RequestBuilder, RequestConfig};
pub use streaming::LineEventParser;

/// Re-export common types for convenience
pub use futures_util::stream::BoxStream;
pub use tokio_util::sync::CancellationToken;
