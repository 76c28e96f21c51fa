//! Conversation controller: turn-taking between the user and the resolver.
//!
//! A submission is split in two so the front end can clear its input buffer
//! between the user turn being recorded and the resolver being awaited:
//! [`ConversationController::begin`] records the user turn and raises the
//! processing flag, [`ConversationController::complete`] awaits the resolver
//! and records exactly one assistant turn.

use std::sync::Arc;

use crate::backend::{Resolution, ResponseResolver};
use crate::error::BackendError;
use crate::state::{BusyGuard, BusyKind, Message, SharedState};

/// Assistant turn recorded when the resolver cannot be reached.
pub const CONNECTIVITY_ERROR: &str =
    "Sorry, I couldn't reach the document assistant. Please check your connection and try again.";

/// A submission whose user turn is recorded and whose reply is outstanding.
///
/// Holds the processing flag; dropping it without completing releases the
/// flag without recording a reply.
#[derive(Debug)]
pub struct PendingTurn {
    query: String,
    guard: BusyGuard,
}

impl PendingTurn {
    #[cfg(test)]
    pub(crate) fn query(&self) -> &str {
        &self.query
    }
}

#[derive(Clone)]
pub struct ConversationController {
    state: SharedState,
    resolver: Arc<dyn ResponseResolver>,
}

impl ConversationController {
    pub fn new(state: SharedState, resolver: Arc<dyn ResponseResolver>) -> Self {
        Self { state, resolver }
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    /// Record the user turn and raise the processing flag.
    ///
    /// Returns `None`, leaving the state untouched, when the trimmed query is
    /// empty or a reply is already outstanding.
    pub fn begin(&self, query: &str) -> Option<PendingTurn> {
        let query = query.trim();
        if query.is_empty() {
            return None;
        }

        let accepted = self.state.update(|s| {
            if s.is_processing {
                return false;
            }
            s.messages.push(Message::user(query));
            s.is_processing = true;
            true
        });

        if !accepted {
            tracing::debug!("Submission ignored while a reply is outstanding");
            return None;
        }

        tracing::info!(query_len = query.len(), "Query submitted");
        Some(PendingTurn {
            query: query.to_string(),
            guard: BusyGuard::assume(self.state.clone(), BusyKind::Processing),
        })
    }

    /// Await the resolver and record its reply, or the connectivity apology
    /// if it fails. The processing flag is lowered after the reply is
    /// recorded.
    pub async fn complete(&self, turn: PendingTurn) {
        let PendingTurn { query, guard } = turn;

        // Run the resolver on its own task so a panic inside it still ends in
        // exactly one assistant turn.
        let resolver = Arc::clone(&self.resolver);
        let outcome = match tokio::spawn(async move { resolver.resolve(&query).await }).await {
            Ok(result) => result,
            Err(join) => Err(BackendError::Unavailable(join.to_string())),
        };

        let reply = match outcome {
            Ok(Resolution { content, sources }) => {
                tracing::info!(sources = sources.len(), "Reply received");
                Message::assistant(content, sources)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Resolver failed");
                Message::assistant(CONNECTIVITY_ERROR, Vec::new())
            }
        };

        self.state.update(|s| s.messages.push(reply));
        drop(guard);
    }

    /// `begin` then `complete`. Returns false if the submission was ignored.
    pub async fn submit(&self, query: &str) -> bool {
        match self.begin(query) {
            Some(turn) => {
                self.complete(turn).await;
                true
            }
            None => false,
        }
    }
}
