use async_stream::try_stream;
use connector_common::LineEventParser;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::{MistralError, response::ChatCompletionChunk};

/// One incremental piece of a streamed completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamDelta {
    pub choice_index: u32,
    pub role: Option<String>,
    /// Text added by this event, empty when the event carried none
    pub content: String,
    pub finish_reason: Option<String>,
    /// Model id reported by the event, if any
    pub model: Option<String>,
}

impl StreamDelta {
    /// Whether the server marked generation as finished with this delta.
    pub fn is_final(&self) -> bool {
        self.finish_reason.as_deref().is_some_and(|r| !r.is_empty())
    }
}

/// Split one stream event into per-choice deltas, in the order the server sent them
pub fn chunk_deltas(chunk: ChatCompletionChunk) -> impl Iterator<Item = StreamDelta> {
    let model = (!chunk.model.is_empty()).then_some(chunk.model);
    chunk.choices.into_iter().map(move |choice| StreamDelta {
        choice_index: choice.index,
        role: choice.delta.role,
        content: choice.delta.content.unwrap_or_default(),
        finish_reason: choice.finish_reason,
        model: model.clone(),
    })
}

/// Turn a line event stream into a lazy sequence of deltas.
///
/// Each delta is yielded before the next line is read. The sequence ends when
/// the transport is exhausted or right after the first delta carrying a finish
/// reason; anything after that is never read. Cancellation is checked before
/// every delta, including between choices of one event. Decode errors and
/// cancellation end the sequence with an error. The response body is released
/// before the last item is handed out on every exit path, or when the
/// transport reports its end.
pub fn delta_stream(mut parser: LineEventParser) -> BoxStream<'static, Result<StreamDelta, MistralError>> {
    Box::pin(try_stream! {
        while let Some(chunk) = parser.next_event::<ChatCompletionChunk>().await? {
            for delta in chunk_deltas(chunk) {
                parser.check_cancelled()?;

                if delta.is_final() {
                    tracing::debug!(
                        choice = delta.choice_index,
                        reason = delta.finish_reason.as_deref().unwrap_or_default(),
                        "stream finished"
                    );
                    parser.release();
                    yield delta;
                    return;
                }
                yield delta;
            }
        }
    })
}
