use crate::context::ConversationStore;
use crate::error::RelayError;
use crate::llm::{FragmentStream, ModelGateway, Turn};
use crate::service::ReplyStream;
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::Instrument;
use uuid::Uuid;

/// Slots between the relay task and the caller. One is the smallest bounded
/// tokio channel, so the gateway is read at most one fragment ahead of the caller.
const RELAY_DEPTH: usize = 1;

/// Drives one conversational turn at a time: user turn in, relayed reply out,
/// assistant turn committed once the reply ends.
pub struct ConversationService {
    store: Arc<ConversationStore>,
    gateway: Arc<dyn ModelGateway>,
}

enum RelayEnd {
    Completed,
    Interrupted(String),
    CallerGone,
}

enum RelayStep {
    Upstream(Option<Result<String, RelayError>>),
    CallerGone,
}

impl ConversationService {
    pub fn new(store: ConversationStore, gateway: Arc<dyn ModelGateway>) -> Self {
        Self {
            store: Arc::new(store),
            gateway,
        }
    }

    /// Append the user turn, call the gateway with the context window, and
    /// return the reply stream as soon as the gateway call has started.
    ///
    /// Only a gateway that fails to start yields `Err`; the user turn stays in
    /// history either way. Anything that goes wrong later just ends the stream.
    pub async fn process_message(
        &self,
        user_text: impl Into<String>,
    ) -> Result<ReplyStream, RelayError> {
        let turn_id = Uuid::new_v4();

        self.store.append(Turn::user(user_text));
        let context = self.store.context();
        tracing::debug!(%turn_id, context_turns = context.len(), "user turn appended");

        let upstream = match self.gateway.stream(&context).await {
            Ok(upstream) => upstream,
            Err(e) => {
                tracing::warn!(%turn_id, "model gateway call failed: {}", e);
                return Err(e);
            }
        };

        let (tx, rx) = mpsc::channel(RELAY_DEPTH);
        let store = Arc::clone(&self.store);
        tokio::spawn(
            relay(upstream, tx, store).instrument(tracing::info_span!("relay", %turn_id)),
        );

        Ok(ReplyStream::new(rx))
    }

    /// Full conversation record, oldest first.
    pub fn history(&self) -> Vec<Turn> {
        self.store.all()
    }

    /// The turns the next gateway call would see.
    pub fn context(&self) -> Vec<Turn> {
        self.store.context()
    }

    pub fn context_window(&self) -> usize {
        self.store.window()
    }
}

async fn relay(
    mut upstream: FragmentStream,
    tx: mpsc::Sender<String>,
    store: Arc<ConversationStore>,
) {
    let mut reply = String::new();
    let mut fragments = 0usize;

    let end = loop {
        let step = tokio::select! {
            biased;
            _ = tx.closed() => RelayStep::CallerGone,
            next = upstream.next() => RelayStep::Upstream(next),
        };

        match step {
            RelayStep::CallerGone => break RelayEnd::CallerGone,
            RelayStep::Upstream(None) => break RelayEnd::Completed,
            RelayStep::Upstream(Some(Err(e))) => break RelayEnd::Interrupted(e.to_string()),
            RelayStep::Upstream(Some(Ok(fragment))) => {
                if tx.send(fragment.clone()).await.is_err() {
                    break RelayEnd::CallerGone;
                }
                reply.push_str(&fragment);
                fragments += 1;
            }
        }
    };

    // Dropping the upstream here aborts the provider connection on cancellation.
    drop(upstream);

    let chars = reply.chars().count();
    let committed = !reply.is_empty();
    if committed {
        store.append(Turn::assistant(reply));
    }

    match end {
        RelayEnd::Completed => {
            tracing::info!(fragments, chars, committed, "relay completed");
        }
        RelayEnd::Interrupted(reason) => {
            tracing::warn!(fragments, chars, committed, "upstream interrupted: {}", reason);
        }
        RelayEnd::CallerGone => {
            tracing::info!(fragments, chars, committed, "caller disconnected, relay cancelled");
        }
    }

    // Closed only after the commit, so a caller that drained the stream
    // always sees the assistant turn.
    drop(tx);
}
