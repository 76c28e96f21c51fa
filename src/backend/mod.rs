//! Pluggable backends for answering questions and managing documents.
//!
//! Both capabilities come in exactly two variants: [`LocalBackend`] answers
//! from canned data, [`RemoteBackend`] talks to the document service over
//! HTTP. One is chosen at startup and the rest of the crate only sees the
//! trait objects.

pub mod local;
pub mod remote;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::BackendError;
use crate::state::{Document, Source};

pub use local::LocalBackend;
pub use remote::RemoteBackend;

/// An assistant reply and the sources that support it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub content: String,
    pub sources: Vec<Source>,
}

/// The document set and aggregate indexed count, as last reported.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DocumentSnapshot {
    pub documents: Vec<Document>,
    pub indexed_count: usize,
}

/// Produces an assistant reply for a user query.
#[async_trait]
pub trait ResponseResolver: Send + Sync {
    async fn resolve(&self, query: &str) -> Result<Resolution, BackendError>;
}

/// Registers documents with the knowledge base and reports their status.
#[async_trait]
pub trait DocumentGateway: Send + Sync {
    async fn refresh(&self) -> Result<DocumentSnapshot, BackendError>;

    async fn ingest(&self, file: &Path) -> Result<(), BackendError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Local,
    Remote,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Local => "local",
            BackendKind::Remote => "remote",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "local" | "mock" => Some(BackendKind::Local),
            "remote" | "http" => Some(BackendKind::Remote),
            _ => None,
        }
    }

    pub fn all() -> Vec<BackendKind> {
        vec![BackendKind::Local, BackendKind::Remote]
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            BackendKind::Local => "Local (offline demo)",
            BackendKind::Remote => "Document service",
        }
    }
}

/// The two capabilities wired for one session.
#[derive(Clone)]
pub struct Backend {
    pub kind: BackendKind,
    pub resolver: Arc<dyn ResponseResolver>,
    pub gateway: Arc<dyn DocumentGateway>,
}

impl Backend {
    pub fn local() -> Self {
        let backend = Arc::new(LocalBackend::new());
        Self {
            kind: BackendKind::Local,
            resolver: backend.clone(),
            gateway: backend,
        }
    }

    pub fn remote(base_url: &str, timeout: Duration) -> Result<Self, BackendError> {
        let backend = Arc::new(RemoteBackend::with_timeout(base_url, timeout)?);
        Ok(Self {
            kind: BackendKind::Remote,
            resolver: backend.clone(),
            gateway: backend,
        })
    }
}
