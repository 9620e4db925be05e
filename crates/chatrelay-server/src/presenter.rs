//! Renders a reply stream as Server-Sent Events.
//!
//! Each fragment becomes `data: {"content":"<fragment>"}` and the stream always
//! finishes with `data: [DONE]` once the reply closes, whether the model
//! finished or the upstream broke.

use axum::response::sse::{Event, Sse};
use chatrelay_core::constants::sse::DONE_MARKER;
use chatrelay_core::ReplyStream;
use futures::{Stream, StreamExt};
use std::convert::Infallible;

pub fn fragment_event(fragment: &str) -> Event {
    Event::default().data(serde_json::json!({ "content": fragment }).to_string())
}

pub fn done_event() -> Event {
    Event::default().data(DONE_MARKER)
}

pub fn sse_response(reply: ReplyStream) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let fragments = reply.map(|fragment| Ok(fragment_event(&fragment)));
    let done = futures::stream::once(async { Ok(done_event()) });
    Sse::new(fragments.chain(done))
}
