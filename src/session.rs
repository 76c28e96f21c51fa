//! One application session: the state container plus everything that
//! mutates it.

use std::time::Duration;

use tokio::task::JoinHandle;

use crate::backend::{Backend, BackendKind};
use crate::config::Settings;
use crate::controller::ConversationController;
use crate::documents::DocumentLibrary;
use crate::error::BackendError;
use crate::state::{ChatState, SharedState};

pub struct Session {
    state: SharedState,
    controller: ConversationController,
    library: DocumentLibrary,
    kind: BackendKind,
    poller: Option<JoinHandle<()>>,
}

impl Session {
    /// Wire the configured backend. Nothing is fetched yet.
    pub fn from_settings(settings: &Settings) -> Result<Self, BackendError> {
        let backend = match settings.backend {
            BackendKind::Local => Backend::local(),
            BackendKind::Remote => Backend::remote(&settings.api_url, settings.request_timeout)?,
        };
        Ok(Self::new(backend))
    }

    pub fn new(backend: Backend) -> Self {
        let state = SharedState::new(ChatState::default());
        tracing::info!(backend = backend.kind.as_str(), "Session created");
        Self {
            controller: ConversationController::new(state.clone(), backend.resolver),
            library: DocumentLibrary::new(state.clone(), backend.gateway),
            state,
            kind: backend.kind,
            poller: None,
        }
    }

    /// Start polling document status; the first refresh runs immediately.
    pub fn start(&mut self, poll_interval: Duration) {
        if self.poller.is_none() {
            self.poller = Some(self.library.spawn_polling(poll_interval));
        }
    }

    /// Stop polling. Work already in flight is abandoned.
    pub fn shutdown(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.abort();
            tracing::info!("Document polling stopped");
        }
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    pub fn controller(&self) -> &ConversationController {
        &self.controller
    }

    pub fn library(&self) -> &DocumentLibrary {
        &self.library
    }

    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    #[cfg(test)]
    pub(crate) fn is_polling(&self) -> bool {
        self.poller.as_ref().is_some_and(|p| !p.is_finished())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shutdown();
    }
}
