use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// The caller's end of one relayed reply.
///
/// Yields fragments in the order the gateway produced them and ends once the
/// relay has committed the assistant turn. Dropping it cancels the relay.
pub struct ReplyStream {
    rx: mpsc::Receiver<String>,
}

impl ReplyStream {
    pub(crate) fn new(rx: mpsc::Receiver<String>) -> Self {
        Self { rx }
    }

    pub async fn next_fragment(&mut self) -> Option<String> {
        self.rx.recv().await
    }

    /// Drain the whole reply into one string.
    pub async fn collect_text(mut self) -> String {
        let mut text = String::new();
        while let Some(fragment) = self.rx.recv().await {
            text.push_str(&fragment);
        }
        text
    }
}

impl Stream for ReplyStream {
    type Item = String;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<String>> {
        self.rx.poll_recv(cx)
    }
}
