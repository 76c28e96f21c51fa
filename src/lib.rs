pub mod backend;
pub mod config;
pub mod controller;
pub mod documents;
pub mod error;
pub mod logging;
pub mod session;
pub mod state;

// Re-export main types for convenience
pub use backend::{Backend, BackendKind, DocumentGateway, LocalBackend, RemoteBackend, ResponseResolver};
pub use config::{Config, Overrides, Settings};
pub use controller::{ConversationController, CONNECTIVITY_ERROR};
pub use documents::DocumentLibrary;
pub use error::BackendError;
pub use session::Session;
pub use state::{ChatState, Document, DocumentStatus, Message, Role, SharedState, Source};
