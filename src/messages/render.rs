//! Render state - data structure sent from App layer to UI for rendering

use crate::app::session::ActiveSubscription;
use crate::messages::ui_events::InputMode;
use crate::models::{DraftField, ReceivedMessage, SessionStatus, TextField};

/// Complete state needed by the UI to render
#[derive(Debug, Clone, Default)]
pub struct RenderState {
    // Session
    pub status: SessionStatus,
    pub server: Option<String>,
    pub servers: Vec<String>,
    pub subscription: Option<ActiveSubscription>,
    pub messages: Vec<ReceivedMessage>,

    // Drafts
    pub subscribe_subject: TextField,
    pub publish_subject: TextField,
    pub publish_payload: TextField,

    // UI state
    pub focus: DraftField,
    pub input_mode: InputMode,
    /// Lines scrolled up from the newest message
    pub log_scroll: u16,
    pub show_help: bool,
}
