//! App state - pure data structure with no I/O logic

use crate::app::session::Session;
use crate::config::Config;
use crate::messages::ui_events::InputMode;
use crate::messages::RenderState;
use crate::models::DraftField;

/// Main application state - the session plus what only the UI cares about
#[derive(Default)]
pub struct AppState {
    pub session: Session,

    // UI state
    pub focus: DraftField,
    pub input_mode: InputMode,
    pub log_scroll: u16,

    // Popups
    pub show_help: bool,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        AppState {
            session: Session::new(config.servers.clone(), &config.subject, &config.publish_subject),
            ..Default::default()
        }
    }

    /// Convert state to RenderState for UI
    pub fn to_render_state(&self) -> RenderState {
        let session = &self.session;
        RenderState {
            status: session.status(),
            server: session.server().map(str::to_string),
            servers: session.servers().to_vec(),
            subscription: session.subscription().cloned(),
            messages: session.log().to_vec(),
            subscribe_subject: session.field(DraftField::SubscribeSubject).clone(),
            publish_subject: session.field(DraftField::PublishSubject).clone(),
            publish_payload: session.field(DraftField::PublishPayload).clone(),
            focus: self.focus,
            input_mode: self.input_mode,
            log_scroll: self.log_scroll,
            show_help: self.show_help,
        }
    }
}
