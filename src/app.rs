use std::path::PathBuf;

use ratatui::layout::Rect;
use ratatui::widgets::ListState;

use docchat::{BackendKind, Session, Settings};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusPane {
    Chat,
    Documents,
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,
    pub focus: FocusPane,

    // Query input
    pub query_input: String,
    pub query_cursor: usize, // cursor position in query_input (chars)

    // Thread view
    pub chat_scroll: u16,
    pub chat_height: u16, // Height of chat area for scroll calculations
    pub chat_lines: u16,  // Wrapped height of the whole thread, measured at render
    seen_messages: usize,

    // Documents panel
    pub show_documents: bool,
    pub documents_state: ListState,

    // Upload prompt
    pub show_upload_prompt: bool,
    pub upload_input: String,
    pub upload_cursor: usize,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // Panel areas for mouse hit-testing (updated during render)
    pub chat_area: Option<Rect>,
    pub documents_area: Option<Rect>,

    pub api_url: String,
    pub session: Session,
}

impl App {
    pub fn new(session: Session, settings: &Settings) -> Self {
        Self {
            should_quit: false,
            input_mode: InputMode::Editing,
            focus: FocusPane::Chat,

            query_input: String::new(),
            query_cursor: 0,

            chat_scroll: 0,
            chat_height: 0,
            chat_lines: 0,
            seen_messages: 0,

            show_documents: true,
            documents_state: ListState::default(),

            show_upload_prompt: false,
            upload_input: String::new(),
            upload_cursor: 0,

            animation_frame: 0,

            chat_area: None,
            documents_area: None,

            api_url: settings.api_url.clone(),
            session,
        }
    }

    pub fn backend_label(&self) -> String {
        match self.session.kind() {
            BackendKind::Local => "local".to_string(),
            BackendKind::Remote => self.api_url.clone(),
        }
    }

    pub fn is_processing(&self) -> bool {
        self.session.state().read(|s| s.is_processing)
    }

    pub fn is_indexing(&self) -> bool {
        self.session.state().read(|s| s.is_indexing)
    }

    /// Send the typed query. Refused while a reply is outstanding.
    pub fn submit_query(&mut self) {
        if self.is_processing() {
            return;
        }
        let Some(turn) = self.session.controller().begin(&self.query_input) else {
            return;
        };

        self.query_input.clear();
        self.query_cursor = 0;

        let controller = self.session.controller().clone();
        tokio::spawn(async move { controller.complete(turn).await });
    }

    pub fn open_upload_prompt(&mut self) {
        if self.is_indexing() {
            return;
        }
        self.show_upload_prompt = true;
        self.upload_input.clear();
        self.upload_cursor = 0;
    }

    pub fn close_upload_prompt(&mut self) {
        self.show_upload_prompt = false;
        self.upload_input.clear();
        self.upload_cursor = 0;
    }

    pub fn submit_upload(&mut self) {
        let path = self.upload_input.trim().to_string();
        self.close_upload_prompt();
        if path.is_empty() || self.is_indexing() {
            return;
        }

        let library = self.session.library().clone();
        tokio::spawn(async move {
            library.ingest(expand_home(&path)).await;
        });
    }

    pub fn request_refresh(&self) {
        let library = self.session.library().clone();
        tokio::spawn(async move {
            library.refresh().await;
        });
    }

    pub fn toggle_documents(&mut self) {
        self.show_documents = !self.show_documents;
        if !self.show_documents {
            self.focus = FocusPane::Chat;
        }
    }

    pub fn cycle_focus(&mut self) {
        self.focus = match self.focus {
            FocusPane::Chat if self.show_documents => FocusPane::Documents,
            _ => FocusPane::Chat,
        };
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.is_processing() || self.is_indexing() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    /// Scroll to the newest entry whenever the thread changed length.
    /// Call after `chat_lines` and `chat_height` are current. Returns true
    /// if it scrolled.
    pub fn follow_new_messages(&mut self, message_count: usize) -> bool {
        if message_count == self.seen_messages {
            return false;
        }
        self.seen_messages = message_count;
        self.scroll_chat_to_end();
        true
    }

    pub fn scroll_chat_to_end(&mut self) {
        self.chat_scroll = self.chat_lines.saturating_sub(self.chat_height);
    }

    pub fn scroll_chat_down(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_add(lines);
    }

    pub fn scroll_chat_up(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
    }

    pub fn documents_nav_down(&mut self) {
        let len = self.session.state().read(|s| s.documents.len());
        if len > 0 {
            let i = self.documents_state.selected().unwrap_or(0);
            self.documents_state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn documents_nav_up(&mut self) {
        let i = self.documents_state.selected().unwrap_or(0);
        self.documents_state.select(Some(i.saturating_sub(1)));
    }

    pub fn shutdown(&mut self) {
        self.session.shutdown();
    }
}

fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

#[cfg(test)]
pub(crate) fn local_app() -> App {
    use docchat::{Config, Overrides};

    let overrides = Overrides {
        backend: Some(BackendKind::Local),
        api_url: None,
    };
    let settings = Config::new().resolve_with(&overrides, |_| None).unwrap();
    let session = Session::from_settings(&settings).unwrap();
    App::new(session, &settings)
}
