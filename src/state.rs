//! UI-agnostic session state
//!
//! Holds the conversation log and the document status that every front end
//! (terminal UI, headless commands) renders. The state lives in a single
//! [`SharedState`] container owned by the session and handed to the
//! controller, the document library and the view.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A cited document fragment supporting an assistant reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub title: String,
    /// Page/section reference or a URI, depending on the backend
    pub locator: String,
}

impl Source {
    pub fn new(title: impl Into<String>, locator: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            locator: locator.into(),
        }
    }
}

/// A single turn in the conversation. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub role: Role,
    pub content: String,
    pub sources: Vec<Source>,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content.into(), Vec::new())
    }

    pub fn assistant(content: impl Into<String>, sources: Vec<Source>) -> Self {
        Self::new(Role::Assistant, content.into(), sources)
    }

    fn new(role: Role, content: String, sources: Vec<Source>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content,
            sources,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Pending,
    Indexed,
}

impl DocumentStatus {
    /// Anything the service reports other than "indexed" is still pending.
    pub fn from_wire(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("indexed") {
            DocumentStatus::Indexed
        } else {
            DocumentStatus::Pending
        }
    }

    pub fn is_indexed(&self) -> bool {
        matches!(self, DocumentStatus::Indexed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub name: String,
    pub status: DocumentStatus,
}

/// Which busy flag a [`BusyGuard`] holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusyKind {
    Processing,
    Indexing,
}

/// Session state. One instance per session, no persistence.
#[derive(Debug, Clone, Default)]
pub struct ChatState {
    pub messages: Vec<Message>,
    pub is_processing: bool,
    pub documents: Vec<Document>,
    pub is_indexing: bool,
    pub indexed_count: usize,
    /// Generation of the listing last applied
    listing_generation: u64,
}

impl ChatState {
    pub fn is_busy(&self, kind: BusyKind) -> bool {
        match kind {
            BusyKind::Processing => self.is_processing,
            BusyKind::Indexing => self.is_indexing,
        }
    }

    fn set_busy(&mut self, kind: BusyKind, value: bool) {
        match kind {
            BusyKind::Processing => self.is_processing = value,
            BusyKind::Indexing => self.is_indexing = value,
        }
    }

    /// Replace the document set with a fresh listing.
    ///
    /// A document already indexed keeps that status even if the listing
    /// reports it pending again; the aggregate count is taken as reported.
    pub fn apply_documents(&mut self, documents: Vec<Document>, indexed_count: usize) {
        let previous = std::mem::take(&mut self.documents);
        self.documents = documents
            .into_iter()
            .map(|mut doc| {
                let was_indexed = previous
                    .iter()
                    .any(|old| old.id == doc.id && old.status.is_indexed());
                if was_indexed {
                    doc.status = DocumentStatus::Indexed;
                }
                doc
            })
            .collect();
        self.indexed_count = indexed_count;
    }

    /// Apply a listing tagged with the generation its refresh was issued
    /// under. Returns false, leaving the documents alone, if a newer
    /// listing has already been applied.
    pub fn apply_listing(
        &mut self,
        generation: u64,
        documents: Vec<Document>,
        indexed_count: usize,
    ) -> bool {
        if generation <= self.listing_generation {
            return false;
        }
        self.listing_generation = generation;
        self.apply_documents(documents, indexed_count);
        true
    }

    pub fn pending_count(&self) -> usize {
        self.documents
            .iter()
            .filter(|d| !d.status.is_indexed())
            .count()
    }
}

/// Injectable container for the session's [`ChatState`].
///
/// Cloning shares the same state. Each lock is held only for the length of
/// one transition, never across an await point.
#[derive(Debug, Clone, Default)]
pub struct SharedState {
    inner: Arc<Mutex<ChatState>>,
}

impl SharedState {
    pub fn new(state: ChatState) -> Self {
        Self {
            inner: Arc::new(Mutex::new(state)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ChatState> {
        // Every transition leaves the state consistent, so a poisoned lock
        // still holds usable data.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run a read-only projection against the current state.
    pub fn read<R>(&self, f: impl FnOnce(&ChatState) -> R) -> R {
        f(&self.lock())
    }

    pub(crate) fn update<R>(&self, f: impl FnOnce(&mut ChatState) -> R) -> R {
        f(&mut self.lock())
    }

    pub fn snapshot(&self) -> ChatState {
        self.read(ChatState::clone)
    }

    pub fn message_count(&self) -> usize {
        self.read(|s| s.messages.len())
    }

    pub fn is_busy(&self, kind: BusyKind) -> bool {
        self.read(|s| s.is_busy(kind))
    }

    /// Raise a busy flag, or return `None` if it is already raised.
    pub fn try_acquire(&self, kind: BusyKind) -> Option<BusyGuard> {
        let acquired = self.update(|s| {
            if s.is_busy(kind) {
                false
            } else {
                s.set_busy(kind, true);
                true
            }
        });
        acquired.then(|| BusyGuard::assume(self.clone(), kind))
    }
}

/// A raised busy flag. Lowered when the guard is dropped, whichever way the
/// owning task ends (settled, failed, panicked or aborted).
#[derive(Debug)]
pub struct BusyGuard {
    state: SharedState,
    kind: BusyKind,
}

impl BusyGuard {
    /// Wrap a flag the caller already raised inside its own transition.
    pub(crate) fn assume(state: SharedState, kind: BusyKind) -> Self {
        Self { state, kind }
    }

    #[cfg(test)]
    pub(crate) fn kind(&self) -> BusyKind {
        self.kind
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        let kind = self.kind;
        self.state.update(|s| s.set_busy(kind, false));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, status: DocumentStatus) -> Document {
        Document {
            id: id.to_string(),
            name: format!("{}.pdf", id),
            status,
        }
    }

    #[test]
    fn test_messages_get_unique_ids() {
        let a = Message::user("hello");
        let b = Message::user("hello");
        assert_ne!(a.id, b.id);
        assert_eq!(a.role, Role::User);
        assert!(a.sources.is_empty());
    }

    #[test]
    fn test_status_from_wire() {
        assert_eq!(DocumentStatus::from_wire("indexed"), DocumentStatus::Indexed);
        assert_eq!(DocumentStatus::from_wire("INDEXED "), DocumentStatus::Indexed);
        assert_eq!(DocumentStatus::from_wire("pending"), DocumentStatus::Pending);
        assert_eq!(DocumentStatus::from_wire("processing"), DocumentStatus::Pending);
    }

    #[test]
    fn test_apply_documents_keeps_indexed_status() {
        let mut state = ChatState::default();
        state.apply_documents(vec![doc("a", DocumentStatus::Indexed)], 1);

        state.apply_documents(
            vec![
                doc("a", DocumentStatus::Pending),
                doc("b", DocumentStatus::Pending),
            ],
            1,
        );

        assert_eq!(state.documents[0].status, DocumentStatus::Indexed);
        assert_eq!(state.documents[1].status, DocumentStatus::Pending);
        assert_eq!(state.pending_count(), 1);
    }

    #[test]
    fn test_apply_documents_takes_reported_count() {
        let mut state = ChatState::default();
        state.apply_documents(vec![doc("a", DocumentStatus::Indexed)], 5);
        assert_eq!(state.indexed_count, 5);

        state.apply_documents(Vec::new(), 0);
        assert_eq!(state.indexed_count, 0);
        assert!(state.documents.is_empty());
    }

    #[test]
    fn test_older_listing_is_discarded() {
        let mut state = ChatState::default();
        assert!(state.apply_listing(2, vec![doc("new", DocumentStatus::Pending)], 0));

        assert!(!state.apply_listing(1, vec![doc("old", DocumentStatus::Indexed)], 1));
        assert!(!state.apply_listing(2, Vec::new(), 0));

        assert_eq!(state.documents.len(), 1);
        assert_eq!(state.documents[0].id, "new");
        assert_eq!(state.indexed_count, 0);

        assert!(state.apply_listing(3, Vec::new(), 0));
        assert!(state.documents.is_empty());
    }

    #[test]
    fn test_busy_guard_releases_on_drop() {
        let shared = SharedState::default();

        let guard = shared.try_acquire(BusyKind::Processing).unwrap();
        assert!(shared.is_busy(BusyKind::Processing));
        assert!(!shared.is_busy(BusyKind::Indexing));
        assert!(shared.try_acquire(BusyKind::Processing).is_none());

        drop(guard);
        assert!(!shared.is_busy(BusyKind::Processing));
        assert!(shared.try_acquire(BusyKind::Processing).is_some());
    }

    #[test]
    fn test_busy_flags_are_independent() {
        let shared = SharedState::default();
        let _indexing = shared.try_acquire(BusyKind::Indexing).unwrap();
        let processing = shared.try_acquire(BusyKind::Processing);
        assert!(processing.is_some());
        assert_eq!(processing.unwrap().kind(), BusyKind::Processing);
    }

    #[tokio::test]
    async fn test_busy_guard_releases_when_task_aborted() {
        let shared = SharedState::default();
        let guard = shared.try_acquire(BusyKind::Indexing).unwrap();

        let handle = tokio::spawn(async move {
            let _guard = guard;
            std::future::pending::<()>().await;
        });
        handle.abort();
        let _ = handle.await;

        assert!(!shared.is_busy(BusyKind::Indexing));
    }
}
